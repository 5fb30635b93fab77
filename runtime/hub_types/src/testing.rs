//! Shared fixtures for unit tests.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use hub_ir::{BodyHandle, MemberKey, Modifiers, Name, TypeDescription};

use crate::{HierarchyConfig, Method, TypeHierarchy, TypeRecord};

/// A hierarchy with a root `Object` declaring `hashCode()I`.
pub(crate) struct Fixture {
    pub(crate) hierarchy: TypeHierarchy,
    pub(crate) root: Arc<TypeRecord>,
    next_body: AtomicU64,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        Self::with_config(HierarchyConfig::default())
    }

    pub(crate) fn with_config(config: HierarchyConfig) -> Self {
        Self::with_hierarchy(TypeHierarchy::builder().config(config).build())
    }

    /// Wrap an empty hierarchy and define its root.
    pub(crate) fn with_hierarchy(hierarchy: TypeHierarchy) -> Self {
        let symbols = hierarchy.symbols();
        let object = TypeDescription::class(symbols.intern("Object"), None).with_method(
            MemberKey::new(symbols.intern("hashCode"), symbols.intern("()I")),
            Modifiers::PUBLIC,
            Some(BodyHandle(1)),
        );
        let root = hierarchy.define(object).unwrap();
        Self {
            hierarchy,
            root,
            next_body: AtomicU64::new(100),
        }
    }

    pub(crate) fn name(&self, text: &str) -> Name {
        self.hierarchy.symbols().intern(text)
    }

    pub(crate) fn key(&self, name: &str, signature: &str) -> MemberKey {
        MemberKey::new(self.name(name), self.name(signature))
    }

    pub(crate) fn body(&self) -> Option<BodyHandle> {
        Some(BodyHandle(self.next_body.fetch_add(1, Ordering::Relaxed)))
    }

    /// A public concrete class.
    pub(crate) fn class(&self, name: &str, supertype: &TypeRecord) -> TypeDescription {
        TypeDescription::class(self.name(name), Some(supertype.id()))
    }

    pub(crate) fn interface(&self, name: &str) -> TypeDescription {
        TypeDescription::interface(self.name(name), self.root.id())
    }

    /// Declare a public method with a fresh body.
    pub(crate) fn method(&self, desc: TypeDescription, name: &str) -> TypeDescription {
        let key = self.key(name, "()V");
        desc.with_method(key, Modifiers::PUBLIC, self.body())
    }

    /// Declare a public abstract method.
    pub(crate) fn abstract_method(&self, desc: TypeDescription, name: &str) -> TypeDescription {
        let key = self.key(name, "()V");
        desc.with_method(key, Modifiers::PUBLIC | Modifiers::ABSTRACT, None)
    }

    pub(crate) fn define(&self, desc: TypeDescription) -> Arc<TypeRecord> {
        self.hierarchy.define(desc).unwrap()
    }

    /// The method `name()V` as seen by `ty`.
    pub(crate) fn find(&self, ty: &TypeRecord, name: &str) -> Arc<Method> {
        Arc::clone(ty.find_method(self.key(name, "()V")).unwrap())
    }
}
