//! Type records: the durable representation of one loaded type.
//!
//! A [`TypeRecord`] is immutable once built, apart from its vtable entry
//! points and its initialization monitor. Hierarchy-visible state that changes
//! as subtypes arrive (children, concrete-subtype facts) lives in the
//! hierarchy arena instead, under the hierarchy lock.
//!
//! # Member indices
//!
//! Methods: local virtuals (declared, then synthesized defaults), then
//! statics, then interface methods. Fields: instance, then static.

mod init;
mod members;

use std::fmt;
use std::sync::Arc;

use hub_ir::{MemberKey, Metadata, Modifiers, Name, TypeId, TypeKind};

use crate::dispatch::{DispatchTable, EntryPoint, VTableEntry};

pub use init::{InitState, Initializer};
pub use members::{Field, MemberId, Method, MethodKind};

pub(crate) use init::InitMonitor;

/// One loaded type.
pub struct TypeRecord {
    pub(crate) id: TypeId,
    pub(crate) name: Name,
    pub(crate) name_str: &'static str,
    pub(crate) package: Name,
    pub(crate) kind: TypeKind,
    pub(crate) modifiers: Modifiers,
    pub(crate) supertype: Option<Arc<TypeRecord>>,
    /// Declared interfaces, in declaration order.
    pub(crate) interfaces: Vec<Arc<TypeRecord>>,
    /// Every interface this type implements, transitively. Excludes the type
    /// itself.
    pub(crate) interface_closure: Vec<Arc<TypeRecord>>,
    /// Ids this type is a subtype of, itself included. Markers in the itable.
    pub(crate) ancestors: Vec<TypeId>,
    pub(crate) component: Option<Arc<TypeRecord>>,
    pub(crate) element: Option<Arc<TypeRecord>>,
    pub(crate) dimensions: u8,
    pub(crate) instance_fields: Vec<Field>,
    pub(crate) static_fields: Vec<Field>,
    pub(crate) virtual_methods: Vec<Arc<Method>>,
    pub(crate) static_methods: Vec<Arc<Method>>,
    pub(crate) interface_methods: Vec<Arc<Method>>,
    pub(crate) all_virtual: Vec<Arc<Method>>,
    pub(crate) dispatch: Option<DispatchTable>,
    pub(crate) init: InitMonitor,
    pub(crate) metadata: Metadata,
}

impl TypeRecord {
    #[inline]
    pub fn id(&self) -> TypeId {
        self.id
    }

    #[inline]
    pub fn name(&self) -> Name {
        self.name
    }

    pub fn name_str(&self) -> &'static str {
        self.name_str
    }

    /// Runtime package: the name up to its last `.` or `/`.
    #[inline]
    pub fn package(&self) -> Name {
        self.package
    }

    #[inline]
    pub fn kind(&self) -> TypeKind {
        self.kind
    }

    #[inline]
    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn is_interface(&self) -> bool {
        self.kind == TypeKind::Interface
    }

    pub fn is_array(&self) -> bool {
        self.kind == TypeKind::Array
    }

    pub fn is_primitive(&self) -> bool {
        self.kind == TypeKind::Primitive
    }

    pub fn is_instance_class(&self) -> bool {
        self.kind.is_instance_class()
    }

    pub fn is_final(&self) -> bool {
        self.modifiers.is_final()
    }

    pub fn is_abstract(&self) -> bool {
        match self.kind {
            TypeKind::Interface => true,
            TypeKind::Instance | TypeKind::Hybrid => self.modifiers.is_abstract(),
            TypeKind::Primitive | TypeKind::Array => false,
        }
    }

    /// Instantiable class: instance or hybrid, not abstract.
    pub fn is_concrete_class(&self) -> bool {
        self.is_instance_class() && !self.modifiers.is_abstract()
    }

    pub fn supertype(&self) -> Option<&Arc<TypeRecord>> {
        self.supertype.as_ref()
    }

    /// Superclass chain, starting with the immediate supertype.
    pub fn superclasses(&self) -> impl Iterator<Item = &Arc<TypeRecord>> {
        std::iter::successors(self.supertype.as_ref(), |ty| ty.supertype.as_ref())
    }

    pub fn interfaces(&self) -> &[Arc<TypeRecord>] {
        &self.interfaces
    }

    pub fn interface_closure(&self) -> &[Arc<TypeRecord>] {
        &self.interface_closure
    }

    pub fn ancestors(&self) -> &[TypeId] {
        &self.ancestors
    }

    /// Array component type.
    pub fn component(&self) -> Option<&Arc<TypeRecord>> {
        self.component.as_ref()
    }

    /// Innermost non-array element type of an array.
    pub fn element(&self) -> Option<&Arc<TypeRecord>> {
        self.element.as_ref()
    }

    pub fn dimensions(&self) -> u8 {
        self.dimensions
    }

    pub fn dispatch_table(&self) -> Option<&DispatchTable> {
        self.dispatch.as_ref()
    }

    // === Members ===

    pub fn instance_fields(&self) -> &[Field] {
        &self.instance_fields
    }

    pub fn static_fields(&self) -> &[Field] {
        &self.static_fields
    }

    /// Local virtual methods, synthesized defaults last.
    pub fn virtual_methods(&self) -> &[Arc<Method>] {
        &self.virtual_methods
    }

    pub fn static_methods(&self) -> &[Arc<Method>] {
        &self.static_methods
    }

    /// Abstract methods declared by this interface, in index order.
    pub fn interface_methods(&self) -> &[Arc<Method>] {
        &self.interface_methods
    }

    /// Complete vtable content: entry `i` is the target of slot `i`.
    pub fn all_virtual_methods(&self) -> &[Arc<Method>] {
        &self.all_virtual
    }

    pub fn method_by_index(&self, index: u32) -> Option<&Arc<Method>> {
        let mut index = index as usize;
        for group in [
            &self.virtual_methods,
            &self.static_methods,
            &self.interface_methods,
        ] {
            if index < group.len() {
                return group.get(index);
            }
            index -= group.len();
        }
        None
    }

    pub fn field_by_index(&self, index: u32) -> Option<&Field> {
        let index = index as usize;
        match index.checked_sub(self.instance_fields.len()) {
            None => self.instance_fields.get(index),
            Some(index) => self.static_fields.get(index),
        }
    }

    pub fn find_local_instance_field(&self, key: MemberKey) -> Option<&Field> {
        self.instance_fields.iter().find(|f| f.key == key)
    }

    pub fn find_local_static_field(&self, key: MemberKey) -> Option<&Field> {
        self.static_fields.iter().find(|f| f.key == key)
    }

    /// Instance field declared here or by a superclass.
    pub fn find_instance_field(&self, key: MemberKey) -> Option<&Field> {
        self.find_local_instance_field(key).or_else(|| {
            self.superclasses()
                .find_map(|ty| ty.find_local_instance_field(key))
        })
    }

    /// Static field: this type, then its interfaces, then the superclass chain.
    pub fn find_static_field(&self, key: MemberKey) -> Option<&Field> {
        if let Some(field) = self.find_local_static_field(key) {
            return Some(field);
        }
        if let Some(field) = self
            .interface_closure
            .iter()
            .find_map(|iface| iface.find_local_static_field(key))
        {
            return Some(field);
        }
        self.superclasses()
            .find_map(|ty| ty.find_local_static_field(key))
    }

    pub fn find_field(&self, key: MemberKey) -> Option<&Field> {
        self.find_instance_field(key)
            .or_else(|| self.find_static_field(key))
    }

    /// Any method declared by this type, synthesized defaults included.
    pub fn find_local_method(&self, key: MemberKey) -> Option<&Arc<Method>> {
        self.virtual_methods
            .iter()
            .chain(&self.static_methods)
            .chain(&self.interface_methods)
            .find(|m| m.key == key)
    }

    /// Virtual method as seen through this type's vtable, falling back to
    /// local private methods and initializers.
    pub fn find_virtual_method(&self, key: MemberKey) -> Option<&Arc<Method>> {
        self.all_virtual
            .iter()
            .rev()
            .find(|m| m.key == key)
            .or_else(|| {
                self.virtual_methods
                    .iter()
                    .find(|m| m.key == key && m.vtable_slot().is_none())
            })
    }

    pub fn find_static_method(&self, key: MemberKey) -> Option<&Arc<Method>> {
        std::iter::once(self)
            .chain(self.superclasses().map(Arc::as_ref))
            .find_map(|ty| ty.static_methods.iter().find(|m| m.key == key))
    }

    /// Interface method declared by this type or any interface it implements.
    pub fn find_interface_method(&self, key: MemberKey) -> Option<&Arc<Method>> {
        self.interface_methods
            .iter()
            .chain(
                self.interface_closure
                    .iter()
                    .flat_map(|iface| iface.interface_methods.iter()),
            )
            .find(|m| m.key == key)
    }

    /// General method lookup: declared methods along the superclass chain
    /// (skipping synthesized defaults), then interface methods.
    pub fn find_method(&self, key: MemberKey) -> Option<&Arc<Method>> {
        std::iter::once(self)
            .chain(self.superclasses().map(Arc::as_ref))
            .find_map(|ty| {
                ty.virtual_methods
                    .iter()
                    .chain(&ty.static_methods)
                    .find(|m| m.key == key && !m.is_synthetic_default())
            })
            .or_else(|| self.find_interface_method(key))
    }

    /// The method this type executes for a call of `method`.
    ///
    /// Vtable-dispatched methods resolve through their slot, interface methods
    /// through their key; directly dispatched methods resolve to themselves.
    pub fn resolve_method_impl(&self, method: &Arc<Method>) -> Option<Arc<Method>> {
        if let Some(slot) = method.vtable_slot() {
            return self
                .all_virtual
                .get(slot as usize)
                .filter(|m| m.key == method.key)
                .cloned();
        }
        match method.kind() {
            MethodKind::InterfaceAbstract { .. } => self
                .all_virtual
                .iter()
                .rev()
                .find(|m| m.key == method.key)
                .cloned(),
            _ => Some(Arc::clone(method)),
        }
    }

    /// Slot of the vtable entry for `key`.
    pub fn vtable_slot_of(&self, key: MemberKey) -> Option<u32> {
        self.all_virtual
            .iter()
            .rev()
            .find(|m| m.key == key)
            .and_then(|m| m.vtable_slot())
    }

    // === Dispatch ===

    /// O(1) subtype test against a type id. `target` may be an array id that
    /// has only been reserved.
    #[inline]
    pub fn is_subtype_of(&self, target: TypeId) -> bool {
        self.id == target
            || self
                .dispatch
                .as_ref()
                .is_some_and(|table| table.marker_offset(target).is_some())
    }

    /// Visible from `package` for override checks.
    pub fn is_accessible_from(&self, package: Name) -> bool {
        self.modifiers.is_exported()
            || self.modifiers.contains(Modifiers::GENERATED)
            || self.package == package
    }

    pub fn vtable_entry(&self, slot: u32) -> Option<VTableEntry> {
        self.dispatch.as_ref()?.vtable_entry(slot)
    }

    /// Install compiled code for `slot`. Patching the same entry twice is a
    /// no-op; returns whether the slot changed, `None` if it doesn't exist.
    pub fn patch_vtable(&self, slot: u32, entry: EntryPoint) -> Option<bool> {
        let changed = self.dispatch.as_ref()?.patch(slot, entry)?;
        if changed {
            tracing::trace!(ty = self.id.raw(), slot, address = entry.address(), "patched vtable");
        }
        Some(changed)
    }
}

impl PartialEq for TypeRecord {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeRecord {}

impl fmt::Debug for TypeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeRecord")
            .field("id", &self.id)
            .field("name", &self.name_str)
            .field("kind", &self.kind)
            .field("supertype", &self.supertype.as_ref().map(|s| s.id))
            .field("vtable", &self.all_virtual.len())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for TypeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name_str)
    }
}
