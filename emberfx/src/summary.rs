//! Function summaries: the attachment point for effects.
//!
//! A [`FunctionSummary`] binds a shared [`Function`] signature to the
//! [`FunctionEffects`] an analysis has derived (or source text has declared)
//! for it. Passes query the summary instead of the raw effects because the
//! summary knows the fallback chain: a derived side-effect summary wins, and
//! only in its absence does the coarse declared [`EffectAttribute`] bound
//! the answer.
//!
//! [`EffectAttribute`]: emberir::function::EffectAttribute
use std::sync::Arc;

use emberir::function::Function;
use emberir::path::ProjectionPath;
#[cfg(feature = "chumsky")]
use emberir::types::TypeRegistry;
#[cfg(feature = "chumsky")]
use log::debug;

use crate::effects::{ComputedSideEffects, FunctionEffects, GlobalEffects};
#[cfg(feature = "chumsky")]
use crate::error::EffectsError;

/// A function signature together with its effect summary.
#[derive(Debug, Clone)]
pub struct FunctionSummary {
    function: Arc<Function>,
    pub effects: FunctionEffects,
}

impl FunctionSummary {
    /// Attach an empty summary to `function`: no escape facts, side effects
    /// not yet computed.
    pub fn new(function: Arc<Function>) -> Self {
        FunctionSummary {
            function,
            effects: FunctionEffects::new(),
        }
    }

    pub fn function(&self) -> &Arc<Function> {
        &self.function
    }

    /// The global side effects an optimizer must assume for a call to this
    /// function.
    ///
    /// A computed summary is always at least as precise as the declared
    /// attribute, so it wins; without one the attribute bounds the worst
    /// case. This is the only place the attribute is consulted.
    pub fn global_side_effects(&self) -> GlobalEffects {
        match &self.effects.side_effects {
            ComputedSideEffects::Computed(side_effects) => side_effects.accumulated(),
            ComputedSideEffects::Unknown => {
                GlobalEffects::defined_by(self.function.effect_attribute)
            }
        }
    }

    /// See [`EscapeEffects::can_escape`](crate::effects::EscapeEffects::can_escape).
    pub fn can_escape(
        &self,
        argument_index: usize,
        path: &ProjectionPath,
        analyze_addresses: bool,
    ) -> bool {
        self.effects.can_escape(argument_index, path, analyze_addresses)
    }

    /// Parse one source-declared effect clause and record it.
    #[cfg(feature = "chumsky")]
    pub fn install_declared_effect(
        &mut self,
        text: &str,
        registry: &TypeRegistry,
        resolve_parameter: impl Fn(&str) -> Option<usize>,
    ) -> Result<(), EffectsError> {
        let effect = crate::parser::parse_declared_effect(
            text,
            &self.function,
            registry,
            resolve_parameter,
        )?;
        debug!("declared effect on `{}`: {}", self.function.name, effect);
        self.effects.escape_effects.push(effect);
        Ok(())
    }

    /// Parse round-trip effect text and record everything it carries.
    ///
    /// Blocks commit one at a time, so on error the summary keeps what the
    /// blocks before the failing one recorded.
    #[cfg(feature = "chumsky")]
    pub fn install_recorded_effects(&mut self, text: &str) -> Result<(), EffectsError> {
        crate::parser::parse_recorded_effects(&mut self.effects, text, &self.function)?;
        debug!(
            "recorded effects on `{}`: {}",
            self.function.name, self.effects
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use emberir::function::{Argument, ArgumentConvention, EffectAttribute, Function};
    use emberir::path::ProjectionPath;
    use emberir::types::{IrType, TypeRegistry};

    use super::*;
    use crate::effects::SideEffects;

    fn summary_for(attribute: EffectAttribute) -> FunctionSummary {
        let registry = TypeRegistry::new();
        let int = registry.intern(IrType::Int(64));
        let mut function = Function::new(
            "callee",
            vec![Argument::new(ArgumentConvention::DirectOwned, int); 2],
        );
        function.effect_attribute = attribute;
        FunctionSummary::new(Arc::new(function))
    }

    #[test]
    fn attribute_bounds_the_worst_case_until_a_summary_is_computed() {
        let summary = summary_for(EffectAttribute::ReadOnly);
        let global = summary.global_side_effects();
        assert!(global.memory.read);
        assert!(!global.memory.write);
        assert!(!global.ownership.destroy);
        assert!(!global.allocates);
    }

    #[test]
    fn computed_side_effects_shadow_the_attribute() {
        let mut summary = summary_for(EffectAttribute::None);
        assert_eq!(summary.global_side_effects(), GlobalEffects::worst());

        let mut side_effects = SideEffects::default();
        side_effects.global.memory.read = true;
        summary.effects.side_effects = ComputedSideEffects::Computed(side_effects);

        let global = summary.global_side_effects();
        assert!(global.memory.read);
        assert!(!global.memory.write, "the derived summary is more precise");
    }

    #[cfg(feature = "chumsky")]
    #[test]
    fn installed_effects_answer_queries() {
        let mut summary = summary_for(EffectAttribute::None);
        summary
            .install_recorded_effects("[%0: noescape][global: read]")
            .unwrap();

        let path = ProjectionPath::parse("s0").unwrap();
        assert!(!summary.can_escape(0, &path, false));
        assert!(summary.can_escape(1, &path, false));

        let global = summary.global_side_effects();
        assert!(global.memory.read);
        assert!(!global.memory.write);
    }

    #[cfg(feature = "chumsky")]
    #[test]
    fn declared_clauses_install_as_source_facts() {
        let registry = TypeRegistry::new();
        let node = registry.intern(IrType::Class {
            name: "Node".into(),
        });
        let mut function = Function::new(
            "retain",
            vec![Argument::new(ArgumentConvention::DirectGuaranteed, node)],
        );
        function.has_self_argument = true;
        let mut summary = FunctionSummary::new(Arc::new(function));

        summary
            .install_declared_effect("notEscaping self", &registry, |_| None)
            .unwrap();
        assert_eq!(summary.effects.escape_effects.arguments.len(), 1);
        assert!(!summary.effects.escape_effects.arguments[0].is_derived);
        assert!(!summary.can_escape(0, &ProjectionPath::parse("c0").unwrap(), false));
    }
}
