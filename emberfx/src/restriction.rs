//! Restriction of global effects by argument-passing convention.
//!
//! The ABI contract of a convention makes some effects structurally
//! impossible for the value passed under it: a callee cannot write through a
//! borrowed indirect argument, cannot read an uninitialized output slot, and
//! cannot touch memory through a trivial value passed directly. Dropping
//! those bits loses no information and sharpens every downstream query.
use emberir::function::ArgumentConvention;

use crate::effects::{GlobalEffects, MemoryEffects, OwnershipEffects};

impl GlobalEffects {
    /// The effects that remain possible for a value passed with
    /// `convention`, given whether its type is trivial.
    ///
    /// | convention                 | cleared                       |
    /// |----------------------------|-------------------------------|
    /// | `in`, `in_constant`        | write                         |
    /// | `in_guaranteed`            | write, destroy                |
    /// | `out`                      | read, copy, destroy           |
    /// | `owned`, `unowned`, `guaranteed` | all memory, iff trivial |
    /// | `inout`, `inout_aliasable` | nothing                       |
    ///
    /// A trivial value additionally has both ownership effects cleared under
    /// every convention, since copying or destroying it is a no-op.
    pub fn restricted_to(
        mut self,
        convention: ArgumentConvention,
        is_trivial: bool,
    ) -> GlobalEffects {
        match convention {
            ArgumentConvention::IndirectIn | ArgumentConvention::IndirectInConstant => {
                self.memory.write = false;
            }
            ArgumentConvention::IndirectInGuaranteed => {
                self.memory.write = false;
                self.ownership.destroy = false;
            }
            ArgumentConvention::IndirectOut => {
                // The slot is uninitialized on entry. There is nothing in it
                // to read, copy or destroy.
                self.memory.read = false;
                self.ownership.copy = false;
                self.ownership.destroy = false;
            }
            ArgumentConvention::DirectOwned
            | ArgumentConvention::DirectUnowned
            | ArgumentConvention::DirectGuaranteed => {
                if is_trivial {
                    self.memory = MemoryEffects::default();
                }
            }
            ArgumentConvention::Inout | ArgumentConvention::InoutAliasable => {}
        }
        if is_trivial {
            self.ownership = OwnershipEffects::default();
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use emberir::function::ArgumentConvention;
    use strum::IntoEnumIterator;

    use crate::effects::GlobalEffects;

    #[test]
    fn uninitialized_output_slots_cannot_be_read() {
        let restricted =
            GlobalEffects::worst().restricted_to(ArgumentConvention::IndirectOut, false);
        assert!(!restricted.memory.read);
        assert!(restricted.memory.write);
        assert!(!restricted.ownership.copy);
        assert!(!restricted.ownership.destroy);
        assert!(restricted.allocates && restricted.is_deinit_barrier);
    }

    #[test]
    fn trivial_direct_values_cannot_touch_memory() {
        let restricted =
            GlobalEffects::worst().restricted_to(ArgumentConvention::DirectOwned, true);
        assert!(!restricted.memory.read);
        assert!(!restricted.memory.write);
    }

    #[test]
    fn non_trivial_direct_values_keep_memory_effects() {
        for convention in [
            ArgumentConvention::DirectOwned,
            ArgumentConvention::DirectUnowned,
            ArgumentConvention::DirectGuaranteed,
        ] {
            let restricted = GlobalEffects::worst().restricted_to(convention, false);
            assert!(restricted.memory.read && restricted.memory.write, "{convention:?}");
        }
    }

    #[test]
    fn cleared_fields_per_convention() {
        for convention in ArgumentConvention::iter() {
            let restricted = GlobalEffects::worst().restricted_to(convention, false);
            let expect = |flag: bool, cleared: bool, what: &str| {
                assert_eq!(flag, !cleared, "{what} under {convention:?}");
            };
            use ArgumentConvention::*;
            match convention {
                IndirectIn | IndirectInConstant => {
                    expect(restricted.memory.write, true, "write");
                    expect(restricted.memory.read, false, "read");
                    expect(restricted.ownership.destroy, false, "destroy");
                }
                IndirectInGuaranteed => {
                    expect(restricted.memory.write, true, "write");
                    expect(restricted.ownership.destroy, true, "destroy");
                    expect(restricted.memory.read, false, "read");
                    expect(restricted.ownership.copy, false, "copy");
                }
                IndirectOut => {
                    expect(restricted.memory.read, true, "read");
                    expect(restricted.ownership.copy, true, "copy");
                    expect(restricted.ownership.destroy, true, "destroy");
                    expect(restricted.memory.write, false, "write");
                }
                DirectOwned | DirectUnowned | DirectGuaranteed | Inout | InoutAliasable => {
                    assert_eq!(
                        restricted,
                        GlobalEffects::worst(),
                        "nothing cleared for a non-trivial value under {convention:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn trivial_values_never_have_ownership_effects() {
        for convention in ArgumentConvention::iter() {
            let restricted = GlobalEffects::worst().restricted_to(convention, true);
            assert!(!restricted.ownership.copy, "{convention:?}");
            assert!(!restricted.ownership.destroy, "{convention:?}");
        }
    }

    #[test]
    fn restriction_never_widens() {
        use crate::effects::{MemoryEffects, OwnershipEffects};

        // Clearing bits must move down the lattice, never up: merging the
        // restricted value back into its input must change nothing.
        for bits in 0u8..64 {
            let effects = GlobalEffects {
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
            };
            for convention in ArgumentConvention::iter() {
                for is_trivial in [false, true] {
                    let restricted = effects.restricted_to(convention, is_trivial);
                    let mut rejoined = restricted;
                    rejoined.merge(&effects);
                    assert_eq!(rejoined, effects, "{convention:?}, trivial={is_trivial}");
                }
            }
        }
    }
}
