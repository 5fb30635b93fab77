//! Loader-facing vocabulary of the hub type runtime.
//!
//! This crate holds the plain data the type loader and the runtime exchange:
//!
//! - [`Name`] / [`SymbolTable`]: interned type names, member names, signatures
//! - [`TypeId`]: dense type identifiers
//! - [`Modifiers`]: declared access and property flags
//! - [`TypeDescription`]: a resolved type, ready to be turned into a record
//!
//! Nothing here knows about dispatch tables or the hierarchy; that lives in
//! `hub_types`.

mod descriptor;
mod interner;
mod modifiers;
mod name;
mod type_id;

pub use descriptor::{
    BodyHandle, FieldDescription, MemberKey, Metadata, MethodDescription, TypeDescription,
    TypeKind,
};
pub use interner::{SharedSymbols, SymbolTable};
pub use modifiers::Modifiers;
pub use name::Name;
pub use type_id::TypeId;

/// Compile-time assertion that a type has a specific size.
#[macro_export]
macro_rules! static_assert_size {
    ($ty:ty, $size:expr) => {
        const _: [(); $size] = [(); ::std::mem::size_of::<$ty>()];
    };
}

// Ids and names are stored by the million in dispatch tables.
mod size_asserts {
    use super::{MemberKey, Name, TypeId};
    crate::static_assert_size!(Name, 4);
    crate::static_assert_size!(TypeId, 4);
    crate::static_assert_size!(MemberKey, 8);
}
