//! Global identifiers for top-level definitions (functions, structs,
//! interfaces, globals) handed down from name resolution.

use crate::Idx;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DefId(pub u32);

impl DefId {
    /// Reserved id for recovered/error definitions.
    pub const DUMMY: DefId = DefId(u32::MAX);

    pub fn is_dummy(self) -> bool {
        self == Self::DUMMY
    }
}

impl Idx for DefId {
    fn from_usize(idx: usize) -> Self {
        DefId(idx as u32)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}
