//! Printing of effect summaries in the internal round-trip grammar.
//!
//! The output is deterministic so dumps can be compared in golden-file
//! tests: argument blocks in ascending index order (gaps skipped), within a
//! block the escape entries in recorded order followed by the side-effect
//! claims in `read`, `write`, `copy`, `destroy` order, and the `[global: …]`
//! block last. The global block is printed whenever a side-effect summary
//! has been computed, even an empty one; an uncomputed summary prints no
//! global block at all, which is how the distinction survives a round-trip.
use std::fmt;

use emberir::path::ProjectionPath;

use crate::effects::{ArgumentEffect, EscapeKind, FunctionEffects};

fn arrow(exclusive: bool) -> &'static str {
    if exclusive { "=>" } else { "->" }
}

fn write_path_suffix(f: &mut fmt::Formatter<'_>, path: &ProjectionPath) -> fmt::Result {
    if path.is_empty() {
        Ok(())
    } else {
        write!(f, ".{}", path)
    }
}

fn write_entry(f: &mut fmt::Formatter<'_>, effect: &ArgumentEffect) -> fmt::Result {
    let keyword = if effect.kind.is_not_escaping() {
        "noescape"
    } else {
        "escape"
    };
    write!(f, "{keyword}")?;
    if !effect.is_derived {
        write!(f, "!")?;
    }
    write_path_suffix(f, &effect.path_pattern)?;
    match &effect.kind {
        EscapeKind::NotEscaping => Ok(()),
        EscapeKind::ToReturn { to_path, exclusive } => {
            write!(f, " {} %r", arrow(*exclusive))?;
            write_path_suffix(f, to_path)
        }
        EscapeKind::ToArgument {
            index,
            to_path,
            exclusive,
        } => {
            write!(f, " {} %{}", arrow(*exclusive), index)?;
            write_path_suffix(f, to_path)
        }
    }
}

/// One escape fact as it would appear in a dump, prefixed with its
/// argument: `%1: escape!.s0 => %0.c1`.
impl fmt::Display for ArgumentEffect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}: ", self.argument_index)?;
        write_entry(f, self)
    }
}

impl fmt::Display for FunctionEffects {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let computed = self.side_effects.try_as_computed_ref();

        let mut indices: Vec<usize> = self
            .escape_effects
            .arguments
            .iter()
            .map(|effect| effect.argument_index)
            .collect();
        if let Some(side_effects) = computed {
            indices.extend(
                side_effects
                    .arguments
                    .iter()
                    .enumerate()
                    .filter(|(_, argument)| !argument.is_empty())
                    .map(|(index, _)| index),
            );
        }
        indices.sort_unstable();
        indices.dedup();

        for index in indices {
            write!(f, "[%{index}: ")?;
            let mut first = true;
            for effect in self
                .escape_effects
                .arguments
                .iter()
                .filter(|effect| effect.argument_index == index)
            {
                if !first {
                    write!(f, ", ")?;
                }
                first = false;
                write_entry(f, effect)?;
            }
            if let Some(argument) = computed.and_then(|side_effects| side_effects.arguments.get(index)) {
                for (path, keyword) in [
                    (&argument.read, "read"),
                    (&argument.write, "write"),
                    (&argument.copy, "copy"),
                    (&argument.destroy, "destroy"),
                ] {
                    if let Some(path) = path {
                        if !first {
                            write!(f, ", ")?;
                        }
                        first = false;
                        write!(f, "{keyword}")?;
                        write_path_suffix(f, path)?;
                    }
                }
            }
            write!(f, "]")?;
        }

        if let Some(side_effects) = computed {
            let global = &side_effects.global;
            write!(f, "[global: ")?;
            let mut first = true;
            for (active, keyword) in [
                (global.memory.read, "read"),
                (global.memory.write, "write"),
                (global.ownership.copy, "copy"),
                (global.ownership.destroy, "destroy"),
                (global.allocates, "allocate"),
                (global.is_deinit_barrier, "deinit_barrier"),
            ] {
                if active {
                    if !first {
                        write!(f, ", ")?;
                    }
                    first = false;
                    write!(f, "{keyword}")?;
                }
            }
            write!(f, "]")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use emberir::path::ProjectionPath;

    use crate::effects::{
        ArgumentEffect, ComputedSideEffects, EscapeKind, FunctionEffects, SideEffects,
    };

    fn path(text: &str) -> ProjectionPath {
        ProjectionPath::parse(text).unwrap()
    }

    #[test]
    fn empty_summary_prints_nothing() {
        assert_eq!(FunctionEffects::new().to_string(), "");
    }

    #[test]
    fn uncomputed_side_effects_print_no_global_block() {
        let mut effects = FunctionEffects::new();
        effects.escape_effects.push(ArgumentEffect::derived(
            EscapeKind::NotEscaping,
            0,
            ProjectionPath::empty(),
        ));
        assert_eq!(effects.to_string(), "[%0: noescape]");
    }

    #[test]
    fn computed_bottom_prints_an_empty_global_block() {
        let mut effects = FunctionEffects::new();
        effects.side_effects = ComputedSideEffects::Computed(SideEffects::default());
        assert_eq!(effects.to_string(), "[global: ]");
    }

    #[test]
    fn blocks_are_grouped_and_ordered_by_argument() {
        let mut effects = FunctionEffects::new();
        effects.escape_effects.push(ArgumentEffect::derived(
            EscapeKind::ToReturn {
                to_path: path("c1"),
                exclusive: true,
            },
            3,
            path("s0"),
        ));
        effects.escape_effects.push(ArgumentEffect::declared(
            EscapeKind::NotEscaping,
            0,
            ProjectionPath::empty(),
        ));

        let mut side_effects = SideEffects::default();
        side_effects.argument_effects_mut(0).read = Some(path("v**"));
        side_effects.argument_effects_mut(3).write = Some(ProjectionPath::empty());
        side_effects.global.memory.write = true;
        side_effects.global.is_deinit_barrier = true;
        effects.side_effects = ComputedSideEffects::Computed(side_effects);

        assert_eq!(
            effects.to_string(),
            "[%0: noescape!, read.v**][%3: escape.s0 => %r.c1, write][global: write, deinit_barrier]"
        );
    }

    #[test]
    fn single_effects_print_with_their_argument() {
        let effect = ArgumentEffect::declared(
            EscapeKind::ToArgument {
                index: 0,
                to_path: path("c1"),
                exclusive: true,
            },
            1,
            path("s0"),
        );
        assert_eq!(effect.to_string(), "%1: escape!.s0 => %0.c1");

        let effect = ArgumentEffect::derived(EscapeKind::NotEscaping, 2, ProjectionPath::empty());
        assert_eq!(effect.to_string(), "%2: noescape");
    }
}
