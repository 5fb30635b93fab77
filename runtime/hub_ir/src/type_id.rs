//! Dense type identifier.
//!
//! Every loaded type, and every array type whose id has merely been reserved,
//! owns one `TypeId`. Ids are small and dense so they can index arenas, serve
//! as mtable hash keys (`id % divisor`), and be stored as itable markers.

use std::fmt;

/// A dense 32-bit type identifier handed out by the identity registry.
///
/// Ids are assigned exactly once and compared by value.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "image", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct TypeId(u32);

impl TypeId {
    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Index into id-keyed arenas.
    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Build from an arena index.
    ///
    /// # Panics
    /// Panics if `index` does not fit in 32 bits; the registry never hands
    /// out such an index.
    #[inline]
    pub fn from_index(index: usize) -> Self {
        match u32::try_from(index) {
            Ok(raw) => Self(raw),
            Err(_) => panic!("type index {index} exceeds the 32-bit id space"),
        }
    }
}

impl fmt::Debug for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeId({})", self.0)
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
