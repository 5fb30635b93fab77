//! Record construction and member resolution.
//!
//! Turns a resolved [`TypeDescription`] into a [`TypeRecord`]:
//!
//! 1. Structural checks (superclass kind, declared interfaces, duplicates).
//! 2. Partition methods into static, virtual, and interface-abstract.
//! 3. Vtable: inherit the supertype's content, override by name+signature,
//!    append new slots ([`virtuals`]).
//! 4. Interface closure.
//! 5. Synthesized defaults for interface methods nothing implements.
//! 6. Dispatch tables.
//!
//! Runs under the hierarchy write lock; the id is already reserved.

mod virtuals;

use std::sync::Arc;

use hub_ir::{
    MemberKey, Modifiers, Name, SymbolTable, TypeDescription, TypeId, TypeKind,
};
use rustc_hash::FxHashSet;

use crate::dispatch::{DispatchTableBuilder, TableLayout};
use crate::record::{Field, InitMonitor, InitState, MemberId, Method, MethodKind, TypeRecord};
use crate::VerifyError;

use virtuals::VirtualTableBuilder;

/// Array-specific inputs, computed by the hierarchy from the component.
pub(crate) struct ArrayParts {
    pub component: Arc<TypeRecord>,
    pub element: Arc<TypeRecord>,
    pub dimensions: u8,
    /// Ids of the array types this array is a subtype of by covariance.
    pub covariant_ancestors: Vec<TypeId>,
}

/// Everything needed to build one record.
pub(crate) struct RecordInput<'a> {
    pub id: TypeId,
    pub desc: TypeDescription,
    pub supertype: Option<Arc<TypeRecord>>,
    pub interfaces: Vec<Arc<TypeRecord>>,
    pub array: Option<ArrayParts>,
    pub symbols: &'a SymbolTable,
}

/// Runtime package of a type name: everything before the last `.` or `/`.
pub(crate) fn package_prefix(name: &str) -> &str {
    name.rfind(|c: char| c == '.' || c == '/').map_or("", |at| &name[..at])
}

/// Hands out member indices in declaration order.
#[derive(Default)]
pub(crate) struct MemberIndices {
    next: u32,
}

impl MemberIndices {
    pub(crate) fn next(&mut self, holder: TypeId) -> MemberId {
        let index = self.next;
        self.next += 1;
        MemberId { holder, index }
    }
}

#[tracing::instrument(level = "trace", skip_all, fields(ty = input.id.raw()))]
pub(crate) fn build_record(input: RecordInput<'_>) -> Result<TypeRecord, VerifyError> {
    let RecordInput {
        id,
        desc,
        supertype,
        interfaces,
        array,
        symbols,
    } = input;

    let name_str = symbols.lookup(desc.name);
    let package = match &array {
        Some(parts) => parts.element.package(),
        None => symbols.intern(package_prefix(name_str)),
    };

    check_structure(&desc, name_str, supertype.as_deref(), &interfaces, symbols)?;

    let interface_closure = interface_closure(supertype.as_deref(), &interfaces);

    let mut indices = MemberIndices::default();
    let ctx = MemberContext {
        holder: id,
        holder_name: name_str,
        package,
        symbols,
    };

    let mut virtual_descs = Vec::new();
    let mut static_descs = Vec::new();
    let mut interface_descs = Vec::new();
    for method in desc.methods {
        if method.modifiers.is_static() || is_class_initializer(method.key, method.modifiers) {
            static_descs.push(method);
        } else if desc.kind == TypeKind::Interface {
            interface_descs.push(method);
        } else {
            virtual_descs.push(method);
        }
    }

    let (virtual_methods, all_virtual) = match desc.kind {
        TypeKind::Instance | TypeKind::Hybrid | TypeKind::Array => {
            let mut vtable = VirtualTableBuilder::inherit(supertype.as_deref());
            for method in virtual_descs {
                let directly = method.modifiers.is_directly_dispatched()
                    || is_instance_initializer(method.key);
                vtable.declare(&ctx, &mut indices, method, directly)?;
            }
            vtable.add_synthetic_defaults(&ctx, &mut indices, &interface_closure);
            vtable.finish()
        }
        TypeKind::Interface | TypeKind::Primitive => (Vec::new(), Vec::new()),
    };

    let static_methods: Vec<Arc<Method>> = static_descs
        .into_iter()
        .map(|m| {
            Arc::new(ctx.method(
                indices.next(id),
                m.key,
                m.modifiers | Modifiers::STATIC,
                m.body,
                MethodKind::Static,
            ))
        })
        .collect();

    let interface_methods: Vec<Arc<Method>> = interface_descs
        .into_iter()
        .zip(1..)
        .map(|(m, index)| {
            Arc::new(ctx.method(
                indices.next(id),
                m.key,
                m.modifiers | Modifiers::ABSTRACT,
                m.body,
                MethodKind::InterfaceAbstract { index },
            ))
        })
        .collect();

    let mut field_indices = MemberIndices::default();
    let (statics, instances): (Vec<_>, Vec<_>) =
        desc.fields.into_iter().partition(|f| f.modifiers.is_static());
    let instance_fields: Vec<Field> = instances
        .into_iter()
        .map(|f| Field {
            key: f.key,
            id: field_indices.next(id),
            modifiers: f.modifiers,
        })
        .collect();
    let static_fields: Vec<Field> = statics
        .into_iter()
        .map(|f| Field {
            key: f.key,
            id: field_indices.next(id),
            modifiers: f.modifiers,
        })
        .collect();

    let mut markers = vec![id];
    markers.extend(
        std::iter::successors(supertype.as_ref(), |ty| ty.supertype.as_ref()).map(|ty| ty.id()),
    );
    if let Some(parts) = &array {
        markers.extend(parts.covariant_ancestors.iter().copied());
    }

    let dispatch = desc.kind.has_dispatch_table().then(|| {
        DispatchTableBuilder::build(&TableLayout {
            markers: &markers,
            interfaces: &interface_closure,
            all_virtual: &all_virtual,
            method_slots: desc.kind != TypeKind::Interface,
        })
    });

    let mut ancestors = markers;
    let mut seen: FxHashSet<TypeId> = ancestors.iter().copied().collect();
    for iface in &interface_closure {
        if seen.insert(iface.id()) {
            ancestors.push(iface.id());
        }
    }

    let init_state = match desc.kind {
        TypeKind::Primitive | TypeKind::Array => InitState::Initialized,
        TypeKind::Instance | TypeKind::Hybrid | TypeKind::Interface => InitState::Prepared,
    };

    let modifiers = match desc.kind {
        TypeKind::Interface => desc.modifiers | Modifiers::INTERFACE | Modifiers::ABSTRACT,
        _ => desc.modifiers,
    };

    let (component, element, dimensions) = match array {
        Some(parts) => (Some(parts.component), Some(parts.element), parts.dimensions),
        None => (None, None, 0),
    };

    tracing::trace!(
        ty = id.raw(),
        name = name_str,
        vtable = all_virtual.len(),
        interfaces = interface_closure.len(),
        "built type record"
    );

    Ok(TypeRecord {
        id,
        name: desc.name,
        name_str,
        package,
        kind: desc.kind,
        modifiers,
        supertype,
        interfaces,
        interface_closure,
        ancestors,
        component,
        element,
        dimensions,
        instance_fields,
        static_fields,
        virtual_methods,
        static_methods,
        interface_methods,
        all_virtual,
        dispatch,
        init: InitMonitor::new(init_state),
        metadata: desc.metadata,
    })
}

/// Naming context shared by every member of the type under construction.
pub(crate) struct MemberContext<'a> {
    pub holder: TypeId,
    pub holder_name: &'static str,
    pub package: Name,
    pub symbols: &'a SymbolTable,
}

impl MemberContext<'_> {
    pub(crate) fn method(
        &self,
        id: MemberId,
        key: MemberKey,
        modifiers: Modifiers,
        body: Option<hub_ir::BodyHandle>,
        kind: MethodKind,
    ) -> Method {
        Method {
            key,
            id,
            holder_name: self.holder_name,
            name_str: self.symbols.lookup(key.name),
            package: self.package,
            modifiers,
            body,
            kind,
        }
    }
}

fn is_instance_initializer(key: MemberKey) -> bool {
    key.name == Name::INSTANCE_INITIALIZER
}

fn is_class_initializer(key: MemberKey, modifiers: Modifiers) -> bool {
    modifiers.contains(Modifiers::CLASS_INITIALIZER) || key.name == Name::CLASS_INITIALIZER
}

fn check_structure(
    desc: &TypeDescription,
    name_str: &'static str,
    supertype: Option<&TypeRecord>,
    interfaces: &[Arc<TypeRecord>],
    symbols: &SymbolTable,
) -> Result<(), VerifyError> {
    if let (Some(supertype), true) = (supertype, desc.kind.is_instance_class()) {
        if supertype.is_interface() {
            return Err(VerifyError::InterfaceSupertype {
                ty: name_str,
                supertype: supertype.name_str(),
            });
        }
        if supertype.is_final() || supertype.is_array() || supertype.is_primitive() {
            return Err(VerifyError::FinalSupertype {
                ty: name_str,
                supertype: supertype.name_str(),
            });
        }
    }

    if let Some(iface) = interfaces.iter().find(|iface| !iface.is_interface()) {
        return Err(VerifyError::NotAnInterface {
            ty: name_str,
            interface: iface.name_str(),
        });
    }

    let mut methods = FxHashSet::default();
    let mut fields = FxHashSet::default();
    let duplicate = desc
        .methods
        .iter()
        .map(|m| m.key)
        .find(|key| !methods.insert(*key))
        .or_else(|| desc.fields.iter().map(|f| f.key).find(|key| !fields.insert(*key)));
    if let Some(key) = duplicate {
        return Err(VerifyError::DuplicateMember {
            ty: name_str,
            member: symbols.lookup(key.name),
            signature: symbols.lookup(key.signature),
        });
    }

    Ok(())
}

/// Declared interfaces and their closures, then the supertype's closure.
/// First occurrence wins; the type itself is not included.
fn interface_closure(
    supertype: Option<&TypeRecord>,
    interfaces: &[Arc<TypeRecord>],
) -> Vec<Arc<TypeRecord>> {
    let mut seen = FxHashSet::default();
    let mut closure = Vec::new();
    let candidates = interfaces
        .iter()
        .flat_map(|iface| std::iter::once(iface).chain(iface.interface_closure()))
        .chain(supertype.map_or(&[][..], TypeRecord::interface_closure));
    for iface in candidates {
        if seen.insert(iface.id()) {
            closure.push(Arc::clone(iface));
        }
    }
    closure
}

#[cfg(test)]
mod tests;
