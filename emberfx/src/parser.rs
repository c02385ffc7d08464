//! Parsers for the two effect text grammars.
//!
//! Grammar A is the source-attribute form authored next to a function
//! declaration: `notEscaping self.c1`, `escaping x.s0 => return`. Grammar B
//! is the internal round-trip form used by dumps and golden tests:
//! `[%0: noescape][%1: escape -> %r][global: read]`. The two share lexical
//! sub-parsers but keep independent entry points; only grammar B is ever
//! printed (by the [`Display`] impl on [`FunctionEffects`]), grammar A is
//! authored text.
//!
//! Both entry points run in two phases: chumsky parses the raw text, then
//! the parsed clause is resolved against the [`Function`]. That keeps
//! malformed text ([`EffectsError::Syntax`]) cleanly apart from well-formed
//! text naming things the function does not have (reference errors).
//!
//! [`Display`]: std::fmt::Display
use chumsky::prelude::*;
use emberir::function::Function;
use emberir::path::{ProjectionPath, path_parser};
use emberir::types::{TypeRef, TypeRegistry};

use crate::effects::{ArgumentEffect, EscapeKind, FunctionEffects};
use crate::error::EffectsError;

// Shared lexical sub-parsers.

fn argument_index_parser<'src>()
-> impl Parser<'src, &'src str, usize, extra::Err<Rich<'src, char>>> + Clone {
    text::int(10)
        .try_map(|digits: &str, span| {
            digits
                .parse::<usize>()
                .map_err(|err| Rich::custom(span, format!("argument index too large: {}", err)))
        })
        .labelled("argument index")
}

/// `->` for a plain escape, `=>` for an exclusive one.
fn arrow_parser<'src>() -> impl Parser<'src, &'src str, bool, extra::Err<Rich<'src, char>>> + Clone
{
    choice((just("=>").to(true), just("->").to(false))).labelled("escape arrow")
}

/// A projection path attached with a leading dot, as in `self.c1.v**`.
fn attached_path_parser<'src>()
-> impl Parser<'src, &'src str, Option<ProjectionPath>, extra::Err<Rich<'src, char>>> {
    just('.').ignore_then(path_parser()).or_not()
}

fn syntax_error(errors: Vec<Rich<'_, char>>, offset: usize) -> EffectsError {
    match errors.first() {
        Some(error) => {
            let span = error.span();
            EffectsError::Syntax {
                message: error.to_string(),
                span: span.start + offset..span.end + offset,
            }
        }
        None => EffectsError::Syntax {
            message: "unrecognized effects text".to_owned(),
            span: offset..offset,
        },
    }
}

// Grammar A: source attributes.

#[derive(Debug, Clone, PartialEq, Eq)]
enum DeclaredRef<'src> {
    SelfValue,
    Parameter(&'src str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DeclaredSource<'src> {
    reference: DeclaredRef<'src>,
    path: Option<ProjectionPath>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum DeclaredTarget<'src> {
    Return(Option<ProjectionPath>),
    Reference(DeclaredSource<'src>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct DeclaredClause<'src> {
    source: DeclaredSource<'src>,
    /// [`None`] for `notEscaping`; otherwise the exclusivity flag and the
    /// escape target.
    escape: Option<(bool, DeclaredTarget<'src>)>,
}

fn declared_source_parser<'src>()
-> impl Parser<'src, &'src str, DeclaredSource<'src>, extra::Err<Rich<'src, char>>> {
    let reference = choice((
        text::keyword("self").to(DeclaredRef::SelfValue),
        text::ident().map(DeclaredRef::Parameter),
    ))
    .labelled("parameter reference");

    reference
        .then(attached_path_parser())
        .map(|(reference, path)| DeclaredSource { reference, path })
}

fn declared_clause_parser<'src>()
-> impl Parser<'src, &'src str, DeclaredClause<'src>, extra::Err<Rich<'src, char>>> {
    let target = choice((
        text::keyword("return")
            .ignore_then(attached_path_parser())
            .map(DeclaredTarget::Return),
        declared_source_parser().map(DeclaredTarget::Reference),
    ))
    .labelled("escape target");

    let not_escaping = text::keyword("notEscaping")
        .ignore_then(declared_source_parser().padded())
        .map(|source| DeclaredClause {
            source,
            escape: None,
        });

    let escaping = text::keyword("escaping")
        .ignore_then(declared_source_parser().padded())
        .then(arrow_parser())
        .then(target.padded())
        .map(|((source, exclusive), target)| DeclaredClause {
            source,
            escape: Some((exclusive, target)),
        });

    choice((not_escaping, escaping)).padded()
}

/// Parse one grammar A clause (`notEscaping …` / `escaping … -> …`) against
/// `function`, producing a declared (`is_derived == false`) escape effect.
///
/// `resolve_parameter` maps a declared parameter name to its source-level
/// position; the result is offset by the function's leading indirect-result
/// slots to obtain the lowered argument index. A bare reference without a
/// path must denote a class value; anything else needs explicit
/// sub-structure, judged through `registry`.
pub fn parse_declared_effect(
    text: &str,
    function: &Function,
    registry: &TypeRegistry,
    resolve_parameter: impl Fn(&str) -> Option<usize>,
) -> Result<ArgumentEffect, EffectsError> {
    let clause = declared_clause_parser()
        .then_ignore(end())
        .parse(text)
        .into_result()
        .map_err(|errors| syntax_error(errors, 0))?;

    let (argument_index, path_pattern) =
        resolve_declared_source(&clause.source, function, registry, &resolve_parameter)?;
    let kind = match clause.escape {
        None => EscapeKind::NotEscaping,
        Some((exclusive, DeclaredTarget::Return(path))) => {
            resolve_return_target(path, exclusive, function, registry)?
        }
        Some((exclusive, DeclaredTarget::Reference(target))) => {
            let (index, to_path) =
                resolve_declared_source(&target, function, registry, &resolve_parameter)?;
            EscapeKind::ToArgument {
                index,
                to_path,
                exclusive,
            }
        }
    };
    Ok(ArgumentEffect::declared(kind, argument_index, path_pattern))
}

fn resolve_declared_source(
    source: &DeclaredSource<'_>,
    function: &Function,
    registry: &TypeRegistry,
    resolve_parameter: &impl Fn(&str) -> Option<usize>,
) -> Result<(usize, ProjectionPath), EffectsError> {
    let index = match source.reference {
        DeclaredRef::SelfValue => function
            .self_argument_index()
            .ok_or(EffectsError::NoSelfArgument)?,
        DeclaredRef::Parameter(name) => {
            let declared = resolve_parameter(name).ok_or_else(|| EffectsError::UnknownParameter {
                name: name.to_owned(),
            })?;
            declared + function.num_indirect_results
        }
    };
    check_argument_index(index, function)?;
    let reference = match source.reference {
        DeclaredRef::SelfValue => "self",
        DeclaredRef::Parameter(name) => name,
    };
    let path = resolve_attached_path(&source.path, function.argument_type(index), registry, reference)?;
    Ok((index, path))
}

fn resolve_return_target(
    path: Option<ProjectionPath>,
    exclusive: bool,
    function: &Function,
    registry: &TypeRegistry,
) -> Result<EscapeKind, EffectsError> {
    match function.num_indirect_results {
        0 => {
            let result = function.result_type.ok_or(EffectsError::NoReturnValue)?;
            let to_path = resolve_attached_path(&path, Some(result), registry, "return")?;
            Ok(EscapeKind::ToReturn { to_path, exclusive })
        }
        // The value is returned through the single indirect-result slot, so
        // `return` denotes that argument.
        1 => {
            let to_path =
                resolve_attached_path(&path, function.argument_type(0), registry, "return")?;
            Ok(EscapeKind::ToArgument {
                index: 0,
                to_path,
                exclusive,
            })
        }
        count => Err(EffectsError::MultipleIndirectResults { count }),
    }
}

/// A missing path stands for the whole value, which is only meaningful for
/// class references; every other type needs its sub-structure spelled out.
fn resolve_attached_path(
    path: &Option<ProjectionPath>,
    ty: Option<TypeRef>,
    registry: &TypeRegistry,
    reference: &str,
) -> Result<ProjectionPath, EffectsError> {
    match path {
        Some(path) => Ok(path.clone()),
        None if ty.is_some_and(|ty| registry.is_class(ty)) => Ok(ProjectionPath::empty()),
        None => Err(EffectsError::PathRequired {
            reference: reference.to_owned(),
        }),
    }
}

fn check_argument_index(index: usize, function: &Function) -> Result<(), EffectsError> {
    if index < function.argument_count() {
        Ok(())
    } else {
        Err(EffectsError::ArgumentIndexOutOfRange {
            index,
            count: function.argument_count(),
        })
    }
}

// Grammar B: the internal round-trip form.

#[derive(Debug, Clone, PartialEq, Eq)]
enum RecordedTarget {
    Return { path: Option<ProjectionPath> },
    Argument { index: usize, path: Option<ProjectionPath> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SideEffectKeyword {
    Read,
    Write,
    Copy,
    Destroy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RecordedEntry {
    NoEscape {
        is_derived: bool,
        path: Option<ProjectionPath>,
    },
    Escape {
        is_derived: bool,
        path: Option<ProjectionPath>,
        exclusive: bool,
        target: RecordedTarget,
    },
    SideEffect {
        keyword: SideEffectKeyword,
        path: Option<ProjectionPath>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GlobalKeyword {
    Read,
    Write,
    Copy,
    Destroy,
    Allocate,
    DeinitBarrier,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RecordedBlock {
    Argument {
        index: usize,
        entries: Vec<RecordedEntry>,
    },
    Global {
        keywords: Vec<GlobalKeyword>,
    },
}

/// One bracketed block, `[%<N>: …]` or `[global: …]`, including its
/// brackets.
fn recorded_block_parser<'src>()
-> impl Parser<'src, &'src str, RecordedBlock, extra::Err<Rich<'src, char>>> {
    // Absent `!` means the entry was derived by analysis.
    let derived_flag = just('!').or_not().map(|bang| bang.is_none());

    let target = just('%')
        .ignore_then(choice((
            just('r')
                .ignore_then(attached_path_parser())
                .map(|path| RecordedTarget::Return { path }),
            argument_index_parser()
                .then(attached_path_parser())
                .map(|(index, path)| RecordedTarget::Argument { index, path }),
        )))
        .labelled("escape target");

    let side_effect_keyword = choice((
        text::keyword("read").to(SideEffectKeyword::Read),
        text::keyword("write").to(SideEffectKeyword::Write),
        text::keyword("copy").to(SideEffectKeyword::Copy),
        text::keyword("destroy").to(SideEffectKeyword::Destroy),
    ));

    let entry = choice((
        text::keyword("noescape")
            .ignore_then(derived_flag.clone())
            .then(attached_path_parser())
            .map(|(is_derived, path)| RecordedEntry::NoEscape { is_derived, path }),
        text::keyword("escape")
            .ignore_then(derived_flag)
            .then(attached_path_parser())
            .then(arrow_parser().padded())
            .then(target)
            .map(
                |(((is_derived, path), exclusive), target)| RecordedEntry::Escape {
                    is_derived,
                    path,
                    exclusive,
                    target,
                },
            ),
        side_effect_keyword
            .then(attached_path_parser())
            .map(|(keyword, path)| RecordedEntry::SideEffect { keyword, path }),
    ))
    .labelled("effect entry");

    let argument_block = just('%')
        .ignore_then(argument_index_parser())
        .then_ignore(just(':').padded())
        .then(
            entry
                .separated_by(just(',').padded())
                .at_least(1)
                .collect::<Vec<_>>(),
        )
        .map(|(index, entries)| RecordedBlock::Argument { index, entries });

    let global_keyword = choice((
        text::keyword("read").to(GlobalKeyword::Read),
        text::keyword("write").to(GlobalKeyword::Write),
        text::keyword("copy").to(GlobalKeyword::Copy),
        text::keyword("destroy").to(GlobalKeyword::Destroy),
        text::keyword("allocate").to(GlobalKeyword::Allocate),
        text::keyword("deinit_barrier").to(GlobalKeyword::DeinitBarrier),
    ))
    .labelled("global effect keyword");

    // The keyword list may be empty: a computed summary with no global
    // effects still prints its block.
    let global_block = text::keyword("global")
        .ignore_then(just(':').padded())
        .ignore_then(
            global_keyword
                .separated_by(just(',').padded())
                .collect::<Vec<_>>(),
        )
        .map(|keywords| RecordedBlock::Global { keywords });

    choice((global_block, argument_block))
        .padded()
        .delimited_by(just('['), just(']'))
        .labelled("effects block")
}

/// Parse grammar B text and install the effects it records into `effects`.
///
/// Blocks are committed one at a time: when a later block fails to parse or
/// resolve, everything committed for earlier blocks stays installed and the
/// error describes only the failing block. A failing block installs nothing
/// of itself.
///
/// Escape entries default to `is_derived == true` (`!` after
/// `noescape`/`escape` overrides). Side-effect entries and `global:` blocks
/// switch `side_effects` to computed; text without them leaves it untouched,
/// so a summary that records only escape facts keeps worst-case side
/// effects.
pub fn parse_recorded_effects(
    effects: &mut FunctionEffects,
    text: &str,
    function: &Function,
) -> Result<(), EffectsError> {
    let mut rest = text;
    let mut offset = 0usize;
    loop {
        let trimmed = rest.trim_start();
        offset += rest.len() - trimmed.len();
        rest = trimmed;
        if rest.is_empty() {
            return Ok(());
        }
        if !rest.starts_with('[') {
            return Err(EffectsError::Syntax {
                message: "expected a `[…]` effects block".to_owned(),
                span: offset..offset,
            });
        }
        let Some(close) = rest.find(']') else {
            return Err(EffectsError::Syntax {
                message: "unterminated effects block, expected `]`".to_owned(),
                span: offset..offset + rest.len(),
            });
        };
        let block_text = &rest[..=close];
        let block = recorded_block_parser()
            .then_ignore(end())
            .parse(block_text)
            .into_result()
            .map_err(|errors| syntax_error(errors, offset))?;
        install_recorded_block(effects, block, function)?;
        offset += close + 1;
        rest = &rest[close + 1..];
    }
}

fn install_recorded_block(
    effects: &mut FunctionEffects,
    block: RecordedBlock,
    function: &Function,
) -> Result<(), EffectsError> {
    match block {
        RecordedBlock::Global { keywords } => {
            let global = &mut effects.side_effects.computed_or_default().global;
            for keyword in keywords {
                match keyword {
                    GlobalKeyword::Read => global.memory.read = true,
                    GlobalKeyword::Write => global.memory.write = true,
                    GlobalKeyword::Copy => global.ownership.copy = true,
                    GlobalKeyword::Destroy => global.ownership.destroy = true,
                    GlobalKeyword::Allocate => global.allocates = true,
                    GlobalKeyword::DeinitBarrier => global.is_deinit_barrier = true,
                }
            }
            Ok(())
        }
        RecordedBlock::Argument { index, entries } => {
            // Resolve every index up front so a bad entry discards the whole
            // block instead of leaving it half installed.
            check_argument_index(index, function)?;
            for entry in &entries {
                if let RecordedEntry::Escape {
                    target: RecordedTarget::Argument { index, .. },
                    ..
                } = entry
                {
                    check_argument_index(*index, function)?;
                }
            }
            for entry in entries {
                install_recorded_entry(effects, index, entry);
            }
            Ok(())
        }
    }
}

fn install_recorded_entry(effects: &mut FunctionEffects, argument_index: usize, entry: RecordedEntry) {
    match entry {
        RecordedEntry::NoEscape { is_derived, path } => {
            effects.escape_effects.push(ArgumentEffect {
                kind: EscapeKind::NotEscaping,
                argument_index,
                path_pattern: path.unwrap_or_default(),
                is_derived,
            });
        }
        RecordedEntry::Escape {
            is_derived,
            path,
            exclusive,
            target,
        } => {
            let kind = match target {
                RecordedTarget::Return { path } => EscapeKind::ToReturn {
                    to_path: path.unwrap_or_default(),
                    exclusive,
                },
                RecordedTarget::Argument { index, path } => EscapeKind::ToArgument {
                    index,
                    to_path: path.unwrap_or_default(),
                    exclusive,
                },
            };
            effects.escape_effects.push(ArgumentEffect {
                kind,
                argument_index,
                path_pattern: path.unwrap_or_default(),
                is_derived,
            });
        }
        RecordedEntry::SideEffect { keyword, path } => {
            let argument = effects
                .side_effects
                .computed_or_default()
                .argument_effects_mut(argument_index);
            let slot = match keyword {
                SideEffectKeyword::Read => &mut argument.read,
                SideEffectKeyword::Write => &mut argument.write,
                SideEffectKeyword::Copy => &mut argument.copy,
                SideEffectKeyword::Destroy => &mut argument.destroy,
            };
            let path = path.unwrap_or_default();
            // Duplicate keywords for one argument join their paths.
            *slot = match slot.take() {
                Some(existing) => Some(existing.merge(&path)),
                None => Some(path),
            };
        }
    }
}
