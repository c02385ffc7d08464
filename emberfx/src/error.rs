//! Errors reported by the effect text parsers.
use strum::EnumIs;
use thiserror::Error;

/// Everything that can go wrong while parsing declared or dumped effect
/// text.
///
/// [`Syntax`] means the text itself is malformed. Every other variant is a
/// reference error: the text is well-formed but names something the function
/// does not have. Either way only the clause being parsed is abandoned;
/// clauses installed before the failure are kept.
///
/// [`Syntax`]: EffectsError::Syntax
#[derive(Debug, Clone, PartialEq, Eq, Error, EnumIs)]
pub enum EffectsError {
    #[error("the effects text is malformed at {span:?}: {message}")]
    Syntax {
        message: String,
        /// Byte range of the offending text, relative to the parsed string.
        span: std::ops::Range<usize>,
    },

    #[error("`{name}` does not name a parameter of the function")]
    UnknownParameter { name: String },

    #[error("`self` was used in the effects of a function without a self argument")]
    NoSelfArgument,

    #[error("argument index %{index} is out of range for a function with {count} arguments")]
    ArgumentIndexOutOfRange { index: usize, count: usize },

    #[error("`{reference}` is not a class value, so an explicit projection path is required")]
    PathRequired { reference: String },

    #[error("`return` is ambiguous for a function returning through {count} indirect result arguments")]
    MultipleIndirectResults { count: usize },

    #[error("the function does not return a value anything could escape to")]
    NoReturnValue,
}

impl EffectsError {
    /// Whether the text was well-formed but referred to something the
    /// function does not have.
    pub fn is_reference(&self) -> bool {
        !self.is_syntax()
    }
}
