use bitflags::bitflags;
use opemu_core::Family;

bitflags! {
    /// Instruction groups the dispatcher will try to emulate.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct FamilySet: u32 {
        const SSSE3 = 1 << 0;
        /// All three SSE3 prefix groups (`66`, `F2`, `F3`).
        const SSE3 = 1 << 1;
        const SSE42 = 1 << 2;
    }
}

impl FamilySet {
    /// The group `family` belongs to.
    pub fn of(family: Family) -> Self {
        match family {
            Family::Ssse3 => FamilySet::SSSE3,
            Family::Sse3Prefix66 | Family::Sse3PrefixF2 | Family::Sse3PrefixF3 => FamilySet::SSE3,
            Family::Sse42String => FamilySet::SSE42,
        }
    }

    /// Enabled core families, in dispatch priority order.
    pub fn families(self) -> impl Iterator<Item = Family> {
        Family::PRIORITY
            .into_iter()
            .filter(move |&family| self.contains(FamilySet::of(family)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchConfig {
    pub families: FamilySet,
}

impl DispatchConfig {
    /// Only emulate what the host CPU lacks. A host with native SSE3 traps
    /// solely on SSSE3 / SSE4.2, so the SSE3 decoders need not be consulted.
    pub fn without(mut self, native: FamilySet) -> Self {
        self.families.remove(native);
        self
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            families: FamilySet::all(),
        }
    }
}
