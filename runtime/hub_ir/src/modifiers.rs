//! Access and property modifiers for types and members.
//!
//! The loader passes modifiers through exactly as declared; the runtime only
//! interprets the handful that affect dispatch: `STATIC` (no vtable slot),
//! `PRIVATE`/`INITIALIZER` (direct dispatch, never overridden), `FINAL`
//! (override check), `ABSTRACT` and `INTERFACE` (concrete-subtype tracking).

use bitflags::bitflags;

bitflags! {
    /// Declared modifiers of a type, field, or method.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct Modifiers: u32 {
        // === Access (bits 0-3) ===

        const PUBLIC = 1 << 0;
        const PRIVATE = 1 << 1;
        const PROTECTED = 1 << 2;

        // === Member properties (bits 4-11) ===

        const STATIC = 1 << 4;
        const FINAL = 1 << 5;
        const SYNCHRONIZED = 1 << 6;
        const VOLATILE = 1 << 7;
        const NATIVE = 1 << 8;
        const ABSTRACT = 1 << 9;
        /// Instance initializer (`<init>`): invoked directly, no vtable slot.
        const INITIALIZER = 1 << 10;
        /// Static class initializer (`<clinit>`).
        const CLASS_INITIALIZER = 1 << 11;

        // === Type properties (bits 16-23) ===

        const INTERFACE = 1 << 16;
        /// Generated by the runtime, not declared by the loader.
        const SYNTHETIC = 1 << 17;
        /// Generated stub types are accessible from everywhere.
        const GENERATED = 1 << 18;
    }
}

impl Modifiers {
    #[inline]
    pub fn is_static(self) -> bool {
        self.contains(Self::STATIC)
    }

    #[inline]
    pub fn is_final(self) -> bool {
        self.contains(Self::FINAL)
    }

    #[inline]
    pub fn is_abstract(self) -> bool {
        self.contains(Self::ABSTRACT)
    }

    #[inline]
    pub fn is_private(self) -> bool {
        self.contains(Self::PRIVATE)
    }

    /// Public or protected: visible outside the declaring package.
    #[inline]
    pub fn is_exported(self) -> bool {
        self.intersects(Self::PUBLIC | Self::PROTECTED)
    }

    /// Instance methods that are invoked directly and never get a vtable slot.
    #[inline]
    pub fn is_directly_dispatched(self) -> bool {
        self.intersects(Self::PRIVATE | Self::INITIALIZER)
    }
}
