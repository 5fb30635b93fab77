//! Interned symbol for member names, signatures, and type names.
//!
//! Loaders hand the runtime names and signatures as strings; every string is
//! interned once in the [`SymbolTable`](crate::SymbolTable) and then compared
//! by its 32-bit handle. Member identity (`name + signature`) is therefore two
//! integer comparisons.
//!
//! The first handles are fixed: every table interns [`Name::PREDEFINED`] in
//! order at construction, so the names the runtime itself tests for
//! (initializers, the root type, the capability interfaces) are constants
//! rather than table lookups.

use std::fmt;

/// Interned symbol: dense index into the owning [`SymbolTable`](crate::SymbolTable).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "image", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct Name(u32);

impl Name {
    pub const EMPTY: Name = Name(0);
    /// `<init>`: instance initializers. Never dispatched virtually.
    pub const INSTANCE_INITIALIZER: Name = Name(1);
    /// `<clinit>`: the static initializer.
    pub const CLASS_INITIALIZER: Name = Name(2);
    /// `()V`, the signature of both initializers.
    pub const VOID_SIGNATURE: Name = Name(3);
    pub const OBJECT: Name = Name(4);
    pub const CLONEABLE: Name = Name(5);
    pub const SERIALIZABLE: Name = Name(6);

    /// Strings behind the constants above, in index order.
    pub const PREDEFINED: [&'static str; 7] = [
        "",
        "<init>",
        "<clinit>",
        "()V",
        "Object",
        "Cloneable",
        "Serializable",
    ];

    #[inline]
    pub const fn raw(self) -> u32 {
        self.0
    }

    #[inline]
    pub const fn from_raw(raw: u32) -> Self {
        Name(raw)
    }

    #[inline]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// One of the [`Name::PREDEFINED`] handles.
    #[inline]
    pub const fn is_predefined(self) -> bool {
        self.index() < Self::PREDEFINED.len()
    }

    /// Either initializer name. Neither occupies a vtable slot.
    #[inline]
    pub const fn is_initializer(self) -> bool {
        self.0 == Self::INSTANCE_INITIALIZER.0 || self.0 == Self::CLASS_INITIALIZER.0
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match Self::PREDEFINED.get(self.index()) {
            Some(text) => write!(f, "Name({text:?})"),
            None => write!(f, "Name(#{})", self.0),
        }
    }
}

impl Default for Name {
    fn default() -> Self {
        Self::EMPTY
    }
}
