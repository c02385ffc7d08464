//! Function signatures.
//!
//! A [`Function`] here is only the shell an effect summary hangs off of: the
//! ordered argument list with passing conventions and types, the leading
//! indirect-result slots, the optional trailing `self` argument, and the
//! coarse declared [`EffectAttribute`]. Bodies, blocks and instructions are
//! out of scope; the analyses that look at those only communicate with this
//! crate through summaries.
use strum::{EnumIs, EnumIter, IntoEnumIterator};

use crate::types::{TypeRef, TypeRegistry};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// The ABI contract for how an argument is passed.
///
/// The convention bounds which effects are structurally possible for the
/// argument: a callee cannot write through a borrowed input, cannot read an
/// uninitialized output slot, and so on. Indirect conventions pass the
/// address of the value; direct conventions pass the value itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIs, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ArgumentConvention {
    /// `@in`: the address of an initialized value; the callee takes
    /// ownership and is responsible for destroying or forwarding it.
    IndirectIn,
    /// `@in_constant`: like [`Self::IndirectIn`], but the callee must treat
    /// the memory as immutable.
    IndirectInConstant,
    /// `@in_guaranteed`: the address of an initialized value borrowed from
    /// the caller; the caller keeps ownership and the value outlives the
    /// call.
    IndirectInGuaranteed,
    /// `@out`: the address of uninitialized memory the callee must
    /// initialize exactly once before returning.
    IndirectOut,
    /// `@owned`: the value itself, with ownership transferred to the
    /// callee.
    DirectOwned,
    /// `@unowned`: the value itself, with no ownership transferred and no
    /// lifetime guarantee beyond the call.
    DirectUnowned,
    /// `@guaranteed`: the value itself, borrowed; the caller guarantees it
    /// stays alive for the duration of the call.
    DirectGuaranteed,
    /// `@inout`: the address of an initialized value the callee may read
    /// and replace; exclusive for the duration of the call.
    Inout,
    /// `@inout_aliasable`: like [`Self::Inout`] without the exclusivity
    /// guarantee.
    InoutAliasable,
}

impl ArgumentConvention {
    pub fn to_str(&self) -> &'static str {
        match self {
            ArgumentConvention::IndirectIn => "in",
            ArgumentConvention::IndirectInConstant => "in_constant",
            ArgumentConvention::IndirectInGuaranteed => "in_guaranteed",
            ArgumentConvention::IndirectOut => "out",
            ArgumentConvention::DirectOwned => "owned",
            ArgumentConvention::DirectUnowned => "unowned",
            ArgumentConvention::DirectGuaranteed => "guaranteed",
            ArgumentConvention::Inout => "inout",
            ArgumentConvention::InoutAliasable => "inout_aliasable",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::iter().find(|convention| convention.to_str() == s)
    }

    /// Whether the callee receives an address rather than the value.
    pub fn is_indirect(&self) -> bool {
        matches!(
            self,
            ArgumentConvention::IndirectIn
                | ArgumentConvention::IndirectInConstant
                | ArgumentConvention::IndirectInGuaranteed
                | ArgumentConvention::IndirectOut
                | ArgumentConvention::Inout
                | ArgumentConvention::InoutAliasable
        )
    }
}

/// The coarse, source-declared effect attribute of a function.
///
/// This is a promise made by the author, not an analysis result. It is only
/// consulted when no derived side-effect summary exists for the function.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, EnumIs, EnumIter)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EffectAttribute {
    /// No promise; the worst case must be assumed.
    #[default]
    None,
    /// `readnone`: no memory reads or writes, no destroys, no observable
    /// allocation.
    ReadNone,
    /// `readonly`: may read memory, but no writes, destroys, or observable
    /// allocation.
    ReadOnly,
    /// `releasenone`: arbitrary effects except destroying a value.
    ReleaseNone,
}

impl EffectAttribute {
    pub fn to_str(&self) -> &'static str {
        match self {
            EffectAttribute::None => "none",
            EffectAttribute::ReadNone => "readnone",
            EffectAttribute::ReadOnly => "readonly",
            EffectAttribute::ReleaseNone => "releasenone",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Self::iter().find(|attribute| attribute.to_str() == s)
    }
}

/// One entry of a function's argument list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Argument {
    pub convention: ArgumentConvention,
    pub ty: TypeRef,
}

impl Argument {
    pub fn new(convention: ArgumentConvention, ty: TypeRef) -> Self {
        Self { convention, ty }
    }
}

/// A function signature.
///
/// Argument order follows the lowered calling convention: indirect-result
/// slots first (there are `num_indirect_results` of them), then the declared
/// parameters, then `self` last when present. Effect text that refers to
/// declared parameters by name is therefore offset by
/// `num_indirect_results` during resolution.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Function {
    pub name: String,
    pub arguments: Vec<Argument>,
    /// How many leading arguments are indirect-result slots.
    pub num_indirect_results: usize,
    /// When true, the last argument is the `self` value.
    pub has_self_argument: bool,
    /// The direct result type; [`None`] for functions returning nothing
    /// directly (including those returning through indirect-result slots).
    pub result_type: Option<TypeRef>,
    pub effect_attribute: EffectAttribute,
}

impl Function {
    pub fn new(name: impl Into<String>, arguments: Vec<Argument>) -> Self {
        Self {
            name: name.into(),
            arguments,
            ..Default::default()
        }
    }

    pub fn argument_count(&self) -> usize {
        self.arguments.len()
    }

    /// The index of the `self` argument, which by convention is the last
    /// one.
    pub fn self_argument_index(&self) -> Option<usize> {
        if self.has_self_argument && !self.arguments.is_empty() {
            Some(self.arguments.len() - 1)
        } else {
            None
        }
    }

    pub fn is_indirect_result(&self, index: usize) -> bool {
        index < self.num_indirect_results.min(self.arguments.len())
    }

    pub fn argument_convention(&self, index: usize) -> Option<ArgumentConvention> {
        self.arguments.get(index).map(|a| a.convention)
    }

    pub fn argument_type(&self, index: usize) -> Option<TypeRef> {
        self.arguments.get(index).map(|a| a.ty)
    }

    /// Build a formatting helper that renders the signature using the given
    /// registry to resolve argument and result types.
    pub fn fmt<'a>(&'a self, registry: &'a TypeRegistry) -> impl std::fmt::Display + 'a {
        struct Fmt<'a> {
            function: &'a Function,
            registry: &'a TypeRegistry,
        }

        impl std::fmt::Display for Fmt<'_> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "fn {}(", self.function.name)?;
                for (index, argument) in self.function.arguments.iter().enumerate() {
                    if index > 0 {
                        write!(f, ", ")?;
                    }
                    write!(
                        f,
                        "%{}: @{} {}",
                        index,
                        argument.convention.to_str(),
                        self.registry.fmt(argument.ty)
                    )?;
                    if Some(index) == self.function.self_argument_index() {
                        write!(f, " [self]")?;
                    }
                }
                write!(f, ")")?;
                if let Some(result) = self.function.result_type {
                    write!(f, " -> {}", self.registry.fmt(result))?;
                }
                if !self.function.effect_attribute.is_none() {
                    write!(f, " [{}]", self.function.effect_attribute.to_str())?;
                }
                Ok(())
            }
        }

        Fmt {
            function: self,
            registry,
        }
    }
}
