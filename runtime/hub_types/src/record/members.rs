//! Fields and methods as resolved members of a [`TypeRecord`](super::TypeRecord).

use std::fmt;

use hub_ir::{BodyHandle, MemberKey, Modifiers, Name, TypeId};

/// Identity of a member: declaring type plus its member index there.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MemberId {
    pub holder: TypeId,
    pub index: u32,
}

/// How a method is dispatched.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MethodKind {
    /// Instance method of a class. `slot` is `None` for private methods and
    /// instance initializers, which are invoked directly.
    Virtual { slot: Option<u32> },
    Static,
    /// Abstract method declared by an interface. `index` is its 1-based
    /// position within the interface's itable block.
    InterfaceAbstract { index: u32 },
    /// Placeholder for an interface method no class in the chain implements.
    SyntheticDefault {
        slot: u32,
        interface: TypeId,
        index: u32,
    },
}

/// A resolved method.
///
/// Shared (`Arc`) between the declaring type and every subtype whose vtable
/// inherits it. Equality is member identity.
#[derive(Clone)]
pub struct Method {
    pub(crate) key: MemberKey,
    pub(crate) id: MemberId,
    pub(crate) holder_name: &'static str,
    pub(crate) name_str: &'static str,
    pub(crate) package: Name,
    pub(crate) modifiers: Modifiers,
    pub(crate) body: Option<BodyHandle>,
    pub(crate) kind: MethodKind,
}

impl Method {
    #[inline]
    pub fn key(&self) -> MemberKey {
        self.key
    }

    #[inline]
    pub fn name(&self) -> Name {
        self.key.name
    }

    #[inline]
    pub fn signature(&self) -> Name {
        self.key.signature
    }

    #[inline]
    pub fn id(&self) -> MemberId {
        self.id
    }

    #[inline]
    pub fn holder(&self) -> TypeId {
        self.id.holder
    }

    pub fn holder_name(&self) -> &'static str {
        self.holder_name
    }

    pub fn name_str(&self) -> &'static str {
        self.name_str
    }

    #[inline]
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    #[inline]
    pub fn body(&self) -> Option<BodyHandle> {
        self.body
    }

    #[inline]
    pub fn kind(&self) -> MethodKind {
        self.kind
    }

    /// Vtable slot, if the method is dispatched through the vtable.
    pub fn vtable_slot(&self) -> Option<u32> {
        match self.kind {
            MethodKind::Virtual { slot } => slot,
            MethodKind::SyntheticDefault { slot, .. } => Some(slot),
            MethodKind::Static | MethodKind::InterfaceAbstract { .. } => None,
        }
    }

    /// `(interface, index)` for interface methods and their placeholders.
    pub fn interface_index(&self) -> Option<(TypeId, u32)> {
        match self.kind {
            MethodKind::InterfaceAbstract { index } => Some((self.id.holder, index)),
            MethodKind::SyntheticDefault {
                interface, index, ..
            } => Some((interface, index)),
            MethodKind::Virtual { .. } | MethodKind::Static => None,
        }
    }

    pub fn is_static(&self) -> bool {
        self.kind == MethodKind::Static
    }

    pub fn is_synthetic_default(&self) -> bool {
        matches!(self.kind, MethodKind::SyntheticDefault { .. })
    }

    pub fn is_abstract(&self) -> bool {
        self.modifiers.is_abstract()
            || matches!(
                self.kind,
                MethodKind::InterfaceAbstract { .. } | MethodKind::SyntheticDefault { .. }
            )
    }

    /// Accessible from code in `package`. Private members are never
    /// accessible from another type.
    pub fn is_accessible_from(&self, package: Name) -> bool {
        if self.modifiers.is_exported() {
            return true;
        }
        !self.modifiers.is_private() && self.package == package
    }
}

impl PartialEq for Method {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Method {}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("holder", &self.holder_name)
            .field("name", &self.name_str)
            .field("index", &self.id.index)
            .field("kind", &self.kind)
            .finish()
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.holder_name, self.name_str)
    }
}

/// A resolved field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Field {
    pub(crate) key: MemberKey,
    pub(crate) id: MemberId,
    pub(crate) modifiers: Modifiers,
}

impl Field {
    #[inline]
    pub fn key(&self) -> MemberKey {
        self.key
    }

    #[inline]
    pub fn id(&self) -> MemberId {
        self.id
    }

    #[inline]
    pub fn holder(&self) -> TypeId {
        self.id.holder
    }

    #[inline]
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.is_static()
    }
}
