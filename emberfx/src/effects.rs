//! The effect summary data model and its algebra.
//!
//! A [`FunctionEffects`] value summarizes, per function, everything an
//! optimizer is allowed to assume about an uninlined call: which arguments
//! can escape ([`EscapeEffects`]), and what the call may read, write, copy,
//! destroy or allocate ([`SideEffects`]). Summaries form a lattice: the
//! all-true [`GlobalEffects`] is the top ("assume everything"), the default
//! all-false value is the bottom ("proven effect-free"), and [`merge`]
//! computes the least upper bound across alternative execution paths or call
//! targets.
//!
//! Soundness rule: information may only ever be *widened*. Anything unknown
//! is the top, an entry that cannot be represented is dropped towards the
//! top, and no operation in this module narrows a claim.
//!
//! [`merge`]: GlobalEffects::merge
use emberir::function::EffectAttribute;
use emberir::path::ProjectionPath;
use smallvec::SmallVec;
use strum::{EnumIs, EnumTryAs};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// What a function may do to memory it can reach.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MemoryEffects {
    pub read: bool,
    pub write: bool,
}

impl MemoryEffects {
    pub fn merge(&mut self, other: &MemoryEffects) {
        self.read |= other.read;
        self.write |= other.write;
    }
}

/// Which ownership operations a function may perform on non-trivial values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OwnershipEffects {
    pub copy: bool,
    pub destroy: bool,
}

impl OwnershipEffects {
    pub fn merge(&mut self, other: &OwnershipEffects) {
        self.copy |= other.copy;
        self.destroy |= other.destroy;
    }
}

/// Argument-independent effects of a function.
///
/// `Default` is the lattice bottom (proven effect-free);
/// [`GlobalEffects::worst`] is the top. `destroy` implications matter for
/// destructor reordering: a function that may destroy a value may run
/// arbitrary deinitializers, which is why derived summaries usually pair
/// `destroy` with `is_deinit_barrier`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GlobalEffects {
    pub memory: MemoryEffects,
    pub ownership: OwnershipEffects,
    /// The function may allocate in an observable way.
    pub allocates: bool,
    /// The function must not be reordered across the destruction of values
    /// that are still lexically alive.
    pub is_deinit_barrier: bool,
}

impl GlobalEffects {
    /// The lattice top: assume every effect.
    pub const fn worst() -> GlobalEffects {
        GlobalEffects {
            memory: MemoryEffects {
                read: true,
                write: true,
            },
            ownership: OwnershipEffects {
                copy: true,
                destroy: true,
            },
            allocates: true,
            is_deinit_barrier: true,
        }
    }

    /// Pointwise OR. Commutative, associative, idempotent and monotone;
    /// the correct combination for "effects of A or effects of B".
    pub fn merge(&mut self, other: &GlobalEffects) {
        self.memory.merge(&other.memory);
        self.ownership.merge(&other.ownership);
        self.allocates |= other.allocates;
        self.is_deinit_barrier |= other.is_deinit_barrier;
    }

    /// The effects promised by a declared [`EffectAttribute`], starting from
    /// the worst case and clearing what the attribute rules out.
    ///
    /// Only consult this when no derived [`SideEffects`] summary exists; a
    /// derived summary is always at least as precise.
    pub fn defined_by(attribute: EffectAttribute) -> GlobalEffects {
        let mut effects = GlobalEffects::worst();
        match attribute {
            EffectAttribute::None => {}
            EffectAttribute::ReadNone => {
                effects.memory.read = false;
                effects.memory.write = false;
                effects.ownership.destroy = false;
                effects.allocates = false;
            }
            EffectAttribute::ReadOnly => {
                effects.memory.write = false;
                effects.ownership.destroy = false;
                effects.allocates = false;
            }
            EffectAttribute::ReleaseNone => {
                effects.ownership.destroy = false;
            }
        }
        effects
    }
}

/// The side effects of one function argument: four independent claims, each
/// bounded to a projection path within the argument.
///
/// An absent path is a *proof of absence* for that effect on the whole
/// argument; a present, empty path claims the effect on the argument value
/// itself. The two must never be conflated. Claims cover the argument and
/// its reachable sub-structure; anything only reachable through a further
/// indirection (load, then touch what was loaded) belongs to
/// [`SideEffects::global`] instead.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ArgumentEffects {
    pub read: Option<ProjectionPath>,
    pub write: Option<ProjectionPath>,
    pub copy: Option<ProjectionPath>,
    pub destroy: Option<ProjectionPath>,
}

impl ArgumentEffects {
    pub fn is_empty(&self) -> bool {
        self.read.is_none()
            && self.write.is_none()
            && self.copy.is_none()
            && self.destroy.is_none()
    }

    /// Pointwise join: absent stays absent only if absent on both sides;
    /// two present paths join into a pattern covering both.
    pub fn merge(&mut self, other: &ArgumentEffects) {
        merge_optional_path(&mut self.read, other.read.as_ref());
        merge_optional_path(&mut self.write, other.write.as_ref());
        merge_optional_path(&mut self.copy, other.copy.as_ref());
        merge_optional_path(&mut self.destroy, other.destroy.as_ref());
    }
}

fn merge_optional_path(mine: &mut Option<ProjectionPath>, other: Option<&ProjectionPath>) {
    if let Some(other) = other {
        *mine = match mine.take() {
            Some(existing) => Some(existing.merge(other)),
            None => Some(other.clone()),
        };
    }
}

/// A derived side-effect summary: per-argument claims plus global effects.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SideEffects {
    /// Index i describes argument i. The list may be shorter than the
    /// argument list: a missing trailing entry means the argument is proven
    /// effect-free, not that it is unknown. Producers must only omit what
    /// they can prove.
    pub arguments: Vec<ArgumentEffects>,
    pub global: GlobalEffects,
}

impl SideEffects {
    /// The per-argument claims for `index`. Past the end of the recorded
    /// list this is the empty (proven effect-free) value.
    pub fn effects_on_argument(&self, index: usize) -> ArgumentEffects {
        self.arguments.get(index).cloned().unwrap_or_default()
    }

    /// Grow the argument list as needed and hand out the entry for `index`.
    pub fn argument_effects_mut(&mut self, index: usize) -> &mut ArgumentEffects {
        if index >= self.arguments.len() {
            self.arguments.resize_with(index + 1, Default::default);
        }
        &mut self.arguments[index]
    }

    /// One [`GlobalEffects`] covering everything in this summary: `global`
    /// widened by "some argument has a read/write/copy/destroy claim" per
    /// field. Used when a caller needs a single answer regardless of which
    /// argument was responsible.
    pub fn accumulated(&self) -> GlobalEffects {
        let mut result = self.global;
        for argument in &self.arguments {
            result.memory.read |= argument.read.is_some();
            result.memory.write |= argument.write.is_some();
            result.ownership.copy |= argument.copy.is_some();
            result.ownership.destroy |= argument.destroy.is_some();
        }
        result
    }

    /// Pointwise join of two summaries. A missing trailing argument entry is
    /// the bottom, so the shorter list merges as "no claims" there.
    pub fn merge(&mut self, other: &SideEffects) {
        if other.arguments.len() > self.arguments.len() {
            self.arguments
                .resize_with(other.arguments.len(), Default::default);
        }
        for (mine, theirs) in self.arguments.iter_mut().zip(&other.arguments) {
            mine.merge(theirs);
        }
        self.global.merge(&other.global);
    }
}

/// A side-effect summary that may not have been computed yet.
///
/// `Unknown` is not "no effects": every consumer must widen it to
/// [`GlobalEffects::worst`]. This is a dedicated enum rather than an
/// `Option` so the worst-case arm cannot be skipped with a stray
/// `unwrap_or_default`.
#[derive(Debug, Clone, Default, PartialEq, Eq, EnumIs, EnumTryAs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ComputedSideEffects {
    #[default]
    Unknown,
    Computed(SideEffects),
}

impl ComputedSideEffects {
    /// The accumulated global effects, or the worst case when no summary
    /// has been computed.
    pub fn accumulated(&self) -> GlobalEffects {
        match self {
            ComputedSideEffects::Unknown => GlobalEffects::worst(),
            ComputedSideEffects::Computed(side_effects) => side_effects.accumulated(),
        }
    }

    /// The computed summary, installing the bottom (proven effect-free)
    /// value first when nothing has been computed yet. For producers that
    /// are about to record claims; consumers must keep going through
    /// [`accumulated`](Self::accumulated).
    pub fn computed_or_default(&mut self) -> &mut SideEffects {
        if self.is_unknown() {
            *self = ComputedSideEffects::Computed(SideEffects::default());
        }
        match self {
            ComputedSideEffects::Computed(side_effects) => side_effects,
            ComputedSideEffects::Unknown => unreachable!("just replaced with Computed"),
        }
    }

    /// Join: `Unknown` is the top and absorbs everything.
    pub fn merge(&mut self, other: &ComputedSideEffects) {
        match (&mut *self, other) {
            (ComputedSideEffects::Computed(mine), ComputedSideEffects::Computed(theirs)) => {
                mine.merge(theirs)
            }
            (ComputedSideEffects::Unknown, _) => {}
            (_, ComputedSideEffects::Unknown) => *self = ComputedSideEffects::Unknown,
        }
    }
}

/// How (or whether) one argument escapes a function.
#[derive(Debug, Clone, PartialEq, Eq, EnumIs, EnumTryAs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EscapeKind {
    /// The matched part of the argument does not escape the function.
    NotEscaping,
    /// The matched part escapes into the returned value at `to_path`.
    /// `exclusive` means no other source reaches that target.
    ToReturn {
        to_path: ProjectionPath,
        exclusive: bool,
    },
    /// The matched part escapes into argument `index` at `to_path`.
    ToArgument {
        index: usize,
        to_path: ProjectionPath,
        exclusive: bool,
    },
}

/// One escape fact about one argument.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ArgumentEffect {
    pub kind: EscapeKind,
    /// The argument the fact is about. Index 0 denotes the indirect-result
    /// slot for functions that have exactly one.
    pub argument_index: usize,
    /// Which part of the argument the fact covers. The empty pattern covers
    /// the whole argument, reachable sub-structure included.
    pub path_pattern: ProjectionPath,
    /// `false` for facts declared in source by the author, `true` for facts
    /// derived by analysis.
    pub is_derived: bool,
}

impl ArgumentEffect {
    /// An analysis-derived effect.
    pub fn derived(kind: EscapeKind, argument_index: usize, path_pattern: ProjectionPath) -> Self {
        ArgumentEffect {
            kind,
            argument_index,
            path_pattern,
            is_derived: true,
        }
    }

    /// A source-declared effect.
    pub fn declared(kind: EscapeKind, argument_index: usize, path_pattern: ProjectionPath) -> Self {
        ArgumentEffect {
            kind,
            argument_index,
            path_pattern,
            is_derived: false,
        }
    }

    /// Remap this effect onto a signature whose argument indices are
    /// shifted by `result_arg_delta`, returning [`None`] when the effect
    /// cannot be represented there.
    ///
    /// A source index that would become negative drops the effect; dropping
    /// is sound, it merely widens what the consumer must assume. A shift of
    /// exactly one converts between "escapes to the return" and "escapes to
    /// the single indirect-result slot" (argument 0); any other shift
    /// across that boundary drops the effect as well.
    pub fn copied(&self, result_arg_delta: isize) -> Option<ArgumentEffect> {
        let argument_index = self.argument_index.checked_add_signed(result_arg_delta)?;
        let kind = match &self.kind {
            EscapeKind::NotEscaping => EscapeKind::NotEscaping,
            EscapeKind::ToReturn { to_path, exclusive } => {
                if result_arg_delta > 0 {
                    if result_arg_delta != 1 {
                        return None;
                    }
                    EscapeKind::ToArgument {
                        index: 0,
                        to_path: to_path.clone(),
                        exclusive: *exclusive,
                    }
                } else {
                    EscapeKind::ToReturn {
                        to_path: to_path.clone(),
                        exclusive: *exclusive,
                    }
                }
            }
            EscapeKind::ToArgument {
                index,
                to_path,
                exclusive,
            } => match index.checked_add_signed(result_arg_delta) {
                Some(shifted) => EscapeKind::ToArgument {
                    index: shifted,
                    to_path: to_path.clone(),
                    exclusive: *exclusive,
                },
                None if result_arg_delta == -1 => EscapeKind::ToReturn {
                    to_path: to_path.clone(),
                    exclusive: *exclusive,
                },
                None => return None,
            },
        };
        Some(ArgumentEffect {
            kind,
            argument_index,
            path_pattern: self.path_pattern.clone(),
            is_derived: self.is_derived,
        })
    }
}

/// The escape facts of a function: an unordered collection of
/// [`ArgumentEffect`]. Several entries may concern the same argument with
/// different path patterns; for queries, any matching entry wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EscapeEffects {
    pub arguments: SmallVec<[ArgumentEffect; 2]>,
}

impl EscapeEffects {
    pub fn is_empty(&self) -> bool {
        self.arguments.is_empty()
    }

    pub fn push(&mut self, effect: ArgumentEffect) {
        self.arguments.push(effect);
    }

    /// Whether the value at `path` within argument `argument_index` may
    /// escape the function. Conservatively true unless a
    /// [`EscapeKind::NotEscaping`] entry for that argument covers the path.
    ///
    /// With `analyze_addresses` the query `path` is an address: its trailing
    /// "last class indirection plus value fields" suffix is stripped first,
    /// because the address of class-held storage can never itself escape;
    /// only the object holding it, or the value loaded out of it, can.
    pub fn can_escape(
        &self,
        argument_index: usize,
        path: &ProjectionPath,
        analyze_addresses: bool,
    ) -> bool {
        let reduced;
        let query = if analyze_addresses {
            reduced = path.pop_last_class_and_values();
            &reduced
        } else {
            path
        };
        !self.arguments.iter().any(|effect| {
            effect.kind.is_not_escaping()
                && effect.argument_index == argument_index
                // The empty pattern covers the whole argument, so every
                // queried path is contained in it.
                && (effect.path_pattern.is_empty() || query.matches(&effect.path_pattern))
        })
    }
}

/// The complete effect summary of one function.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FunctionEffects {
    pub escape_effects: EscapeEffects,
    pub side_effects: ComputedSideEffects,
}

impl FunctionEffects {
    /// A fresh summary: no escape facts, side effects not yet computed.
    pub fn new() -> Self {
        Self::default()
    }

    /// See [`ComputedSideEffects::accumulated`]: the one-value global
    /// summary, worst-case when nothing has been computed.
    pub fn accumulated_side_effects(&self) -> GlobalEffects {
        self.side_effects.accumulated()
    }

    /// See [`EscapeEffects::can_escape`].
    pub fn can_escape(
        &self,
        argument_index: usize,
        path: &ProjectionPath,
        analyze_addresses: bool,
    ) -> bool {
        self.escape_effects
            .can_escape(argument_index, path, analyze_addresses)
    }

    /// The summary for a signature-transformed clone of the summarized
    /// function, with argument indices shifted by `result_arg_delta`.
    ///
    /// Escape facts are remapped entry by entry (see
    /// [`ArgumentEffect::copied`]); entries that cannot be represented are
    /// dropped, siblings are kept. Side effects never survive an index
    /// shift: their per-path claims would silently attach to the wrong
    /// argument, so the clone starts with [`ComputedSideEffects::Unknown`].
    pub fn copied_from(source: &FunctionEffects, result_arg_delta: isize) -> FunctionEffects {
        FunctionEffects {
            escape_effects: EscapeEffects {
                arguments: source
                    .escape_effects
                    .arguments
                    .iter()
                    .filter_map(|effect| effect.copied(result_arg_delta))
                    .collect(),
            },
            side_effects: ComputedSideEffects::Unknown,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_global_effects() -> Vec<GlobalEffects> {
        let mut all = Vec::with_capacity(64);
        for bits in 0u8..64 {
            all.push(GlobalEffects {
                memory: MemoryEffects {
                    read: bits & 1 != 0,
                    write: bits & 2 != 0,
                },
                ownership: OwnershipEffects {
                    copy: bits & 4 != 0,
                    destroy: bits & 8 != 0,
                },
                allocates: bits & 16 != 0,
                is_deinit_barrier: bits & 32 != 0,
            });
        }
        all
    }

    fn merged(mut a: GlobalEffects, b: &GlobalEffects) -> GlobalEffects {
        a.merge(b);
        a
    }

    #[test]
    fn merge_is_commutative() {
        let all = all_global_effects();
        for &a in &all {
            for &b in &all {
                assert_eq!(merged(a, &b), merged(b, &a), "{a:?} + {b:?}");
            }
        }
    }

    #[test]
    fn merge_is_associative() {
        let all = all_global_effects();
        for &a in &all {
            for &b in &all {
                for &c in &all {
                    assert_eq!(
                        merged(merged(a, &b), &c),
                        merged(a, &merged(b, &c)),
                        "{a:?} + {b:?} + {c:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn merge_is_idempotent() {
        for &a in &all_global_effects() {
            assert_eq!(merged(a, &a), a);
        }
    }

    #[test]
    fn merge_identity_and_absorption() {
        let bottom = GlobalEffects::default();
        let worst = GlobalEffects::worst();
        for &a in &all_global_effects() {
            assert_eq!(merged(a, &bottom), a, "bottom is the identity");
            assert_eq!(merged(a, &worst), worst, "worst absorbs");
        }
    }

    #[test]
    fn accumulated_widens_global_by_argument_claims() {
        let mut side_effects = SideEffects::default();
        side_effects.global.allocates = true;
        side_effects.argument_effects_mut(1).read = Some(ProjectionPath::empty());
        side_effects.argument_effects_mut(2).destroy =
            Some(ProjectionPath::new([emberir::path::Projection::StructField(0)]));

        let accumulated = side_effects.accumulated();
        assert!(accumulated.memory.read);
        assert!(!accumulated.memory.write);
        assert!(!accumulated.ownership.copy);
        assert!(accumulated.ownership.destroy);
        assert!(accumulated.allocates);
        assert!(!accumulated.is_deinit_barrier);
    }

    #[test]
    fn unknown_side_effects_accumulate_to_worst() {
        let effects = FunctionEffects::new();
        assert!(effects.side_effects.is_unknown());
        assert_eq!(effects.accumulated_side_effects(), GlobalEffects::worst());
    }

    #[test]
    fn defined_by_attribute_clears_promised_fields() {
        use emberir::function::EffectAttribute;

        assert_eq!(
            GlobalEffects::defined_by(EffectAttribute::None),
            GlobalEffects::worst()
        );

        let read_none = GlobalEffects::defined_by(EffectAttribute::ReadNone);
        assert!(!read_none.memory.read);
        assert!(!read_none.memory.write);
        assert!(read_none.ownership.copy, "readnone says nothing about copies");
        assert!(!read_none.ownership.destroy);
        assert!(!read_none.allocates);
        assert!(read_none.is_deinit_barrier);

        let read_only = GlobalEffects::defined_by(EffectAttribute::ReadOnly);
        assert!(read_only.memory.read);
        assert!(!read_only.memory.write);
        assert!(!read_only.ownership.destroy);
        assert!(!read_only.allocates);

        let release_none = GlobalEffects::defined_by(EffectAttribute::ReleaseNone);
        assert!(release_none.memory.read && release_none.memory.write);
        assert!(!release_none.ownership.destroy);
        assert!(release_none.allocates);
    }

    #[test]
    fn argument_effects_merge_joins_paths() {
        use emberir::path::Projection;

        let mut a = ArgumentEffects {
            read: Some(ProjectionPath::new([Projection::StructField(0)])),
            ..Default::default()
        };
        let b = ArgumentEffects {
            read: Some(ProjectionPath::new([Projection::StructField(1)])),
            write: Some(ProjectionPath::empty()),
            ..Default::default()
        };
        a.merge(&b);

        let read = a.read.expect("read claim survives a merge");
        assert_eq!(read.to_string(), "v**");
        assert_eq!(a.write, Some(ProjectionPath::empty()));
        assert!(a.copy.is_none(), "absent on both sides stays absent");
    }

    #[test]
    fn side_effect_lists_of_different_lengths_merge() {
        let mut short = SideEffects::default();
        short.argument_effects_mut(0).read = Some(ProjectionPath::empty());

        let mut long = SideEffects::default();
        long.argument_effects_mut(2).write = Some(ProjectionPath::empty());

        short.merge(&long);
        assert_eq!(short.arguments.len(), 3);
        assert!(short.arguments[0].read.is_some());
        assert!(short.arguments[1].is_empty(), "untouched slots stay bottom");
        assert!(short.arguments[2].write.is_some());
    }

    #[test]
    fn effects_past_the_recorded_list_are_proven_free() {
        let side_effects = SideEffects::default();
        assert!(side_effects.effects_on_argument(5).is_empty());
    }

    #[test]
    fn unknown_absorbs_in_computed_merge() {
        let mut computed = ComputedSideEffects::Computed(SideEffects::default());
        computed.merge(&ComputedSideEffects::Unknown);
        assert!(computed.is_unknown());

        let mut unknown = ComputedSideEffects::Unknown;
        unknown.merge(&ComputedSideEffects::Computed(SideEffects::default()));
        assert!(unknown.is_unknown());
    }

    #[test]
    fn whole_argument_noescape_covers_every_path() {
        let mut escape_effects = EscapeEffects::default();
        escape_effects.push(ArgumentEffect::derived(
            EscapeKind::NotEscaping,
            0,
            ProjectionPath::empty(),
        ));

        for text in ["s0", "c1.s0", "v**", "**"] {
            let path = ProjectionPath::parse(text).unwrap();
            assert!(
                !escape_effects.can_escape(0, &path, false),
                "`{text}` should be covered by the whole-argument claim"
            );
            assert!(
                escape_effects.can_escape(1, &path, false),
                "no claim exists for argument 1"
            );
        }
        assert!(!escape_effects.can_escape(0, &ProjectionPath::empty(), false));
    }

    #[test]
    fn can_escape_respects_patterns() {
        let pattern = ProjectionPath::parse("v**").unwrap();
        let mut escape_effects = EscapeEffects::default();
        escape_effects.push(ArgumentEffect::derived(EscapeKind::NotEscaping, 0, pattern));

        let value_path = ProjectionPath::parse("s0.s1").unwrap();
        let class_path = ProjectionPath::parse("c0").unwrap();
        assert!(!escape_effects.can_escape(0, &value_path, false));
        assert!(
            escape_effects.can_escape(0, &class_path, false),
            "a value-fields claim says nothing about class-held storage"
        );
    }

    #[test]
    fn can_escape_strips_address_suffixes() {
        let pattern = ProjectionPath::parse("s0").unwrap();
        let mut escape_effects = EscapeEffects::default();
        escape_effects.push(ArgumentEffect::derived(EscapeKind::NotEscaping, 0, pattern));

        // The address of a field inside the class instance at s0 reduces to
        // s0 itself, which is covered.
        let address = ProjectionPath::parse("s0.c2.s1").unwrap();
        assert!(!escape_effects.can_escape(0, &address, true));
        assert!(escape_effects.can_escape(0, &address, false));
    }

    #[test]
    fn escape_targets_convert_at_the_return_boundary() {
        let p = ProjectionPath::parse("s0").unwrap();

        let to_result_slot = ArgumentEffect::derived(
            EscapeKind::ToArgument {
                index: 0,
                to_path: p.clone(),
                exclusive: true,
            },
            2,
            ProjectionPath::empty(),
        );
        let converted = to_result_slot.copied(-1).expect("representable");
        assert_eq!(converted.argument_index, 1);
        assert_eq!(
            converted.kind,
            EscapeKind::ToReturn {
                to_path: p.clone(),
                exclusive: true,
            }
        );

        let to_return = ArgumentEffect::derived(
            EscapeKind::ToReturn {
                to_path: p.clone(),
                exclusive: false,
            },
            0,
            ProjectionPath::empty(),
        );
        let retagged = to_return.copied(1).expect("representable");
        assert_eq!(retagged.argument_index, 1);
        assert_eq!(
            retagged.kind,
            EscapeKind::ToArgument {
                index: 0,
                to_path: p,
                exclusive: false,
            }
        );
    }

    #[test]
    fn unrepresentable_copies_are_dropped() {
        let source_slot = ArgumentEffect::derived(EscapeKind::NotEscaping, 0, ProjectionPath::empty());
        assert_eq!(source_slot.copied(-1), None, "source index would go negative");

        let wide_return = ArgumentEffect::derived(
            EscapeKind::ToReturn {
                to_path: ProjectionPath::empty(),
                exclusive: false,
            },
            0,
            ProjectionPath::empty(),
        );
        assert_eq!(wide_return.copied(2), None, "no slot represents the return");

        let deep_target = ArgumentEffect::derived(
            EscapeKind::ToArgument {
                index: 1,
                to_path: ProjectionPath::empty(),
                exclusive: false,
            },
            3,
            ProjectionPath::empty(),
        );
        assert_eq!(deep_target.copied(-3), None, "target crosses below zero by more than one");
    }

    #[test]
    fn copied_from_keeps_siblings_and_resets_side_effects() {
        let mut effects = FunctionEffects::new();
        effects.escape_effects.push(ArgumentEffect::derived(
            EscapeKind::NotEscaping,
            0,
            ProjectionPath::empty(),
        ));
        effects.escape_effects.push(ArgumentEffect::derived(
            EscapeKind::NotEscaping,
            2,
            ProjectionPath::empty(),
        ));
        effects.side_effects = ComputedSideEffects::Computed(SideEffects::default());

        let copied = FunctionEffects::copied_from(&effects, -1);
        assert_eq!(copied.escape_effects.arguments.len(), 1);
        assert_eq!(copied.escape_effects.arguments[0].argument_index, 1);
        assert!(
            copied.side_effects.is_unknown(),
            "per-path side effects never survive an index shift"
        );
    }
}
