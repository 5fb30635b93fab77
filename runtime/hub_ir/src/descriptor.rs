//! Resolved type descriptions handed over by the type loader.
//!
//! The loader parses, verifies, and resolves class files on its own; what
//! reaches the runtime is a [`TypeDescription`] whose supertype and
//! interfaces are already loaded ([`TypeId`]s of bound records), plus flat
//! field and method lists. Everything the runtime does not interpret
//! (method bodies, source metadata) travels as opaque handles.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::{Modifiers, Name, TypeId};

/// Kind of a loaded type.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    /// Builtin value type: no supertype, no members, no dispatch table.
    Primitive,
    /// Ordinary class with a fixed-size instance.
    Instance,
    /// Class whose instances carry a trailing array part.
    Hybrid,
    /// Array type; synthesized by the runtime from its component.
    Array,
    Interface,
}

impl TypeKind {
    /// Instance or hybrid: participates in single inheritance and the
    /// sibling lists.
    #[inline]
    pub fn is_instance_class(self) -> bool {
        matches!(self, Self::Instance | Self::Hybrid)
    }

    /// Has a vtable/itable/mtable.
    #[inline]
    pub fn has_dispatch_table(self) -> bool {
        !matches!(self, Self::Primitive)
    }
}

/// Member identity: name plus signature descriptor.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "image", derive(serde::Serialize, serde::Deserialize))]
pub struct MemberKey {
    pub name: Name,
    pub signature: Name,
}

impl MemberKey {
    #[inline]
    pub const fn new(name: Name, signature: Name) -> Self {
        Self { name, signature }
    }
}

/// Opaque reference to a method body owned by the loader/compiler.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "image", derive(serde::Serialize, serde::Deserialize))]
pub struct BodyHandle(pub u64);

/// Source and generic metadata, passed through unexamined.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Metadata {
    pub source_file: Option<Name>,
    pub generic_signature: Option<Name>,
    pub annotations: Option<Arc<[u8]>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FieldDescription {
    pub key: MemberKey,
    pub modifiers: Modifiers,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MethodDescription {
    pub key: MemberKey,
    pub modifiers: Modifiers,
    /// `None` for abstract and native methods.
    pub body: Option<BodyHandle>,
}

/// A fully resolved type, ready to become a `TypeRecord`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDescription {
    pub name: Name,
    pub kind: TypeKind,
    pub modifiers: Modifiers,
    /// `None` only for the root object type and primitives.
    pub supertype: Option<TypeId>,
    /// Declared interfaces, in declaration order.
    pub interfaces: SmallVec<[TypeId; 4]>,
    pub fields: Vec<FieldDescription>,
    pub methods: Vec<MethodDescription>,
    pub metadata: Metadata,
}

impl TypeDescription {
    fn new(name: Name, kind: TypeKind, modifiers: Modifiers, supertype: Option<TypeId>) -> Self {
        Self {
            name,
            kind,
            modifiers,
            supertype,
            interfaces: SmallVec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            metadata: Metadata::default(),
        }
    }

    pub fn primitive(name: Name) -> Self {
        Self::new(
            name,
            TypeKind::Primitive,
            Modifiers::PUBLIC | Modifiers::FINAL | Modifiers::ABSTRACT,
            None,
        )
    }

    /// A public class. Pass `None` as supertype only for the root object type.
    pub fn class(name: Name, supertype: Option<TypeId>) -> Self {
        Self::new(name, TypeKind::Instance, Modifiers::PUBLIC, supertype)
    }

    pub fn hybrid(name: Name, supertype: TypeId) -> Self {
        Self::new(name, TypeKind::Hybrid, Modifiers::PUBLIC, Some(supertype))
    }

    /// A public interface. Interfaces name the root object type as supertype.
    pub fn interface(name: Name, root: TypeId) -> Self {
        Self::new(
            name,
            TypeKind::Interface,
            Modifiers::PUBLIC | Modifiers::INTERFACE | Modifiers::ABSTRACT,
            Some(root),
        )
    }

    #[must_use]
    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers |= modifiers;
        self
    }

    #[must_use]
    pub fn with_access(mut self, access: Modifiers) -> Self {
        self.modifiers -= Modifiers::PUBLIC | Modifiers::PRIVATE | Modifiers::PROTECTED;
        self.modifiers |= access;
        self
    }

    #[must_use]
    pub fn implementing(mut self, interfaces: impl IntoIterator<Item = TypeId>) -> Self {
        self.interfaces.extend(interfaces);
        self
    }

    #[must_use]
    pub fn with_field(mut self, key: MemberKey, modifiers: Modifiers) -> Self {
        self.fields.push(FieldDescription { key, modifiers });
        self
    }

    #[must_use]
    pub fn with_method(
        mut self,
        key: MemberKey,
        modifiers: Modifiers,
        body: Option<BodyHandle>,
    ) -> Self {
        self.methods.push(MethodDescription {
            key,
            modifiers,
            body,
        });
        self
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    #[inline]
    pub fn is_abstract(&self) -> bool {
        self.modifiers.is_abstract() || self.kind == TypeKind::Interface
    }
}
