//! Per-function effect summaries for the Ember optimizer.
//!
//! An effect summary records what an uninlined call may do: read or write
//! memory, copy or destroy non-trivial values, allocate, act as a deinit
//! barrier, and let arguments escape through the return value or other
//! arguments. Passes query summaries through [`summary::FunctionSummary`]
//! instead of re-inspecting callee bodies.
//!
//! Summaries enter the system as text, either declared in source
//! ([`parser::parse_declared_effect`]) or round-tripped through dumps
//! ([`parser::parse_recorded_effects`] and the [`Display`] impl of
//! [`effects::FunctionEffects`]).
//!
//! [`Display`]: std::fmt::Display

pub mod effects;
pub mod error;
mod fmt;
#[cfg(feature = "chumsky")]
pub mod parser;
mod restriction;
pub mod summary;
