//! Projection paths.
//!
//! A [`ProjectionPath`] names a sub-location within a value: "field 2 of the
//! struct stored in property 0 of this object", and so on. Paths are used by
//! effect summaries to bound a claim ("this function only reads `self.s0`")
//! to the part of the value it actually concerns.
//!
//! A path is an ordered sequence of [`Projection`] components, outermost
//! first. Three of the components are wildcards, which makes a path a
//! *pattern* describing a set of concrete locations:
//!
//! - `v**` any chain (possibly empty) of value projections,
//! - `c*` exactly one class-field indirection, whichever field,
//! - `**` anything at all; only valid as the final component.
//!
//! The textual form is dot-separated: `s0.c1.v**`, `e2.0.s1`, `**`.
use smallvec::SmallVec;
use strum::EnumIs;
use thiserror::Error;

#[cfg(feature = "chumsky")]
use chumsky::prelude::*;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One projection step within a [`ProjectionPath`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIs)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Projection {
    /// Field `i` of a struct value. Printed `s<i>`.
    StructField(u16),
    /// Element `i` of a tuple value. Printed as the bare number `<i>`.
    TupleField(u16),
    /// The payload of enum case `i`. Printed `e<i>`.
    EnumCase(u16),
    /// Stored property `i` of a class instance. Printed `c<i>`. Unlike the
    /// value projections above, this steps *through* the object reference
    /// into heap memory.
    ClassField(u16),
    /// The tail-allocated element storage of a class instance. Printed `ct`.
    ClassTail,
    /// Any chain of value projections, including the empty chain. Printed
    /// `v**`.
    AnyValueFields,
    /// Exactly one class-field indirection, any field. Printed `c*`.
    AnyClassField,
    /// Any sequence of projections. Printed `**`. Only permitted as the
    /// final component of a path.
    Anything,
}

impl Projection {
    /// Whether this component projects within a value without dereferencing
    /// an object (struct fields, tuple elements, enum payloads, `v**`).
    pub fn is_value_projection(&self) -> bool {
        matches!(
            self,
            Projection::StructField(_)
                | Projection::TupleField(_)
                | Projection::EnumCase(_)
                | Projection::AnyValueFields
        )
    }

    /// Whether this component steps through an object reference into class
    /// memory (`c<i>`, `ct`, `c*`).
    pub fn is_class_projection(&self) -> bool {
        matches!(
            self,
            Projection::ClassField(_) | Projection::ClassTail | Projection::AnyClassField
        )
    }
}

impl std::fmt::Display for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Projection::StructField(i) => write!(f, "s{}", i),
            Projection::TupleField(i) => write!(f, "{}", i),
            Projection::EnumCase(i) => write!(f, "e{}", i),
            Projection::ClassField(i) => write!(f, "c{}", i),
            Projection::ClassTail => write!(f, "ct"),
            Projection::AnyValueFields => write!(f, "v**"),
            Projection::AnyClassField => write!(f, "c*"),
            Projection::Anything => write!(f, "**"),
        }
    }
}

/// An addressing expression for a sub-location within a value, outermost
/// component first. The empty path addresses the whole value.
///
/// Paths double as patterns (see [`Projection`] wildcards); containment
/// between a path and a pattern is decided by [`ProjectionPath::matches`],
/// and two patterns can be joined with [`ProjectionPath::merge`] into one
/// that covers both.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProjectionPath {
    components: SmallVec<[Projection; 8]>,
}

impl ProjectionPath {
    /// The empty path, addressing the whole value.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(components: impl IntoIterator<Item = Projection>) -> Self {
        Self {
            components: components.into_iter().collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn components(&self) -> &[Projection] {
        &self.components
    }

    /// Append a component at the innermost end.
    pub fn push(&mut self, projection: Projection) {
        self.components.push(projection);
    }

    /// Whether every location addressed by `self` is also addressed by
    /// `pattern`.
    ///
    /// ```
    /// # use emberir::path::ProjectionPath;
    /// let path = ProjectionPath::parse("s0.c1.s2").unwrap();
    /// assert!(path.matches(&ProjectionPath::parse("s0.c*.v**").unwrap()));
    /// assert!(path.matches(&ProjectionPath::parse("**").unwrap()));
    /// assert!(!path.matches(&ProjectionPath::parse("s0.v**").unwrap()));
    /// ```
    pub fn matches(&self, pattern: &ProjectionPath) -> bool {
        matches_pattern(&self.components, &pattern.components)
    }

    /// Join two patterns: the result addresses every location that either
    /// input addresses, possibly more. Used when effect claims for
    /// alternative control-flow paths have to be combined soundly.
    pub fn merge(&self, other: &ProjectionPath) -> ProjectionPath {
        ProjectionPath {
            components: merge_pattern(&self.components, &other.components),
        }
    }

    /// Strip the trailing "last class indirection plus everything after it"
    /// suffix, yielding the path of the object reference that suffix was
    /// reached through.
    ///
    /// A path ending in `**` is returned unchanged, because `**` can stand
    /// for a suffix that re-enters class memory. A path with no class
    /// projection is returned unchanged as well.
    ///
    /// ```
    /// # use emberir::path::ProjectionPath;
    /// let p = ProjectionPath::parse("s0.e2.1.c4.s1").unwrap();
    /// assert_eq!(p.pop_last_class_and_values(), ProjectionPath::parse("s0.e2.1").unwrap());
    /// ```
    pub fn pop_last_class_and_values(&self) -> ProjectionPath {
        if self.components.last() == Some(&Projection::Anything) {
            return self.clone();
        }
        match self
            .components
            .iter()
            .rposition(|p| p.is_class_projection())
        {
            Some(last_class) => ProjectionPath {
                components: SmallVec::from_slice(&self.components[..last_class]),
            },
            None => self.clone(),
        }
    }

    /// Parse a dot-separated path such as `s0.c1.v**`.
    #[cfg(feature = "chumsky")]
    pub fn parse(text: &str) -> Result<Self, PathParseError> {
        path_parser()
            .then_ignore(end())
            .parse(text)
            .into_result()
            .map_err(|errors| PathParseError {
                path: text.to_owned(),
                message: errors
                    .iter()
                    .map(|e| e.to_string())
                    .collect::<Vec<_>>()
                    .join("; "),
            })
    }
}

impl std::fmt::Display for ProjectionPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, component) in self.components.iter().enumerate() {
            if i > 0 {
                write!(f, ".")?;
            }
            write!(f, "{}", component)?;
        }
        Ok(())
    }
}

impl FromIterator<Projection> for ProjectionPath {
    fn from_iter<T: IntoIterator<Item = Projection>>(iter: T) -> Self {
        Self::new(iter)
    }
}

/// The given text is not a well-formed projection path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("the text `{path}` is not a well-formed projection path: {message}")]
pub struct PathParseError {
    pub path: String,
    pub message: String,
}

fn skip_value_projections(mut path: &[Projection]) -> &[Projection] {
    while let Some((first, rest)) = path.split_first() {
        if !first.is_value_projection() {
            break;
        }
        path = rest;
    }
    path
}

fn matches_pattern(path: &[Projection], pattern: &[Projection]) -> bool {
    let Some((&head, pattern_rest)) = pattern.split_first() else {
        // The empty pattern addresses exactly the whole value.
        return path.is_empty();
    };
    match head {
        Projection::Anything => true,
        Projection::AnyValueFields => {
            matches_pattern(skip_value_projections(path), pattern_rest)
        }
        Projection::AnyClassField => match path.split_first() {
            Some((first, path_rest)) if first.is_class_projection() => {
                matches_pattern(path_rest, pattern_rest)
            }
            _ => false,
        },
        _ => match path.split_first() {
            Some((&first, path_rest)) if first == head => {
                matches_pattern(path_rest, pattern_rest)
            }
            _ => false,
        },
    }
}

/// Prepend `v**` unless the merged tail already begins with a wildcard that
/// absorbs leading value projections.
fn push_any_value_fields(mut tail: SmallVec<[Projection; 8]>) -> SmallVec<[Projection; 8]> {
    match tail.first() {
        Some(Projection::AnyValueFields) | Some(Projection::Anything) => tail,
        _ => {
            tail.insert(0, Projection::AnyValueFields);
            tail
        }
    }
}

fn merge_pattern(a: &[Projection], b: &[Projection]) -> SmallVec<[Projection; 8]> {
    if a == b {
        return SmallVec::from_slice(a);
    }
    if let (Some((&ha, ra)), Some((&hb, rb))) = (a.split_first(), b.split_first())
        && ha == hb
    {
        let tail = merge_pattern(ra, rb);
        if ha == Projection::AnyValueFields {
            return push_any_value_fields(tail);
        }
        let mut merged = tail;
        merged.insert(0, ha);
        return merged;
    }

    let value_head = |s: &[Projection]| s.first().is_some_and(|p| p.is_value_projection());
    let class_head = |s: &[Projection]| s.first().is_some_and(|p| p.is_class_projection());

    if value_head(a) || value_head(b) {
        // Differing value prefixes collapse into `v**`; whatever the two
        // paths agree on past their value prefixes is preserved.
        let tail = merge_pattern(skip_value_projections(a), skip_value_projections(b));
        return push_any_value_fields(tail);
    }
    if class_head(a) && class_head(b) {
        let mut merged = merge_pattern(&a[1..], &b[1..]);
        merged.insert(0, Projection::AnyClassField);
        return merged;
    }
    SmallVec::from_slice(&[Projection::Anything])
}

/// Parser for a single path component. See [`Projection`] for the syntax.
#[cfg(feature = "chumsky")]
pub fn projection_parser<'src>()
-> impl Parser<'src, &'src str, Projection, extra::Err<Rich<'src, char>>> {
    let index = text::int(10).try_map(|s: &str, span| {
        s.parse::<u16>()
            .map_err(|err| Rich::custom(span, format!("field index out of range: {}", err)))
    });

    choice((
        just("**").to(Projection::Anything),
        just("v**").to(Projection::AnyValueFields),
        just("c*").to(Projection::AnyClassField),
        just("ct").to(Projection::ClassTail),
        just('s').ignore_then(index).map(Projection::StructField),
        just('e').ignore_then(index).map(Projection::EnumCase),
        just('c').ignore_then(index).map(Projection::ClassField),
        index.map(Projection::TupleField),
    ))
    .labelled("projection")
}

/// Parser for a dot-separated, non-empty projection path. Reusable as a
/// sub-grammar of larger parsers.
#[cfg(feature = "chumsky")]
pub fn path_parser<'src>()
-> impl Parser<'src, &'src str, ProjectionPath, extra::Err<Rich<'src, char>>> {
    projection_parser()
        .separated_by(just('.'))
        .at_least(1)
        .collect::<Vec<_>>()
        // The label must not cover `try_map`: a labelled parser rewrites
        // errors reported at its own start position, and `try_map` reports
        // the rejection below at the start of the path, which would replace
        // the custom message with a generic `expected projection path`.
        .labelled("projection path")
        .try_map(|components, span| {
            let interior_anything = components[..components.len() - 1]
                .iter()
                .any(|p| *p == Projection::Anything);
            if interior_anything {
                return Err(Rich::custom(
                    span,
                    "`**` stands for any remaining suffix and must be the last component of a path",
                ));
            }
            Ok(ProjectionPath::new(components))
        })
}
