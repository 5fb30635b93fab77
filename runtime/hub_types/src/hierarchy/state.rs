//! Hierarchy-visible mutable state, guarded by the hierarchy lock.
//!
//! An arena of nodes indexed by type id. Each node holds the record, the ids
//! of its direct subclasses, and its concrete-subtype fact. Parent -> child
//! links are plain id lists owned by the parent.

use std::sync::Arc;

use hub_ir::{Name, TypeId, TypeKind};
use hub_stack::ensure_sufficient_stack;
use rustc_hash::FxHashMap;

use crate::config::InterfacePropagation;
use crate::deps::InvalidationSweep;
use crate::record::{Method, TypeRecord};

/// What is known about the concrete subtypes of a type.
///
/// Moves only forward: `Unset -> Unique -> Multiple`.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ConcreteSubtype {
    /// No concrete subtype seen.
    #[default]
    Unset,
    /// Exactly one concrete subtype (possibly the type itself).
    Unique(TypeId),
    /// Two or more. Terminal.
    Multiple,
}

impl ConcreteSubtype {
    fn rank(self) -> u8 {
        match self {
            ConcreteSubtype::Unset => 0,
            ConcreteSubtype::Unique(_) => 1,
            ConcreteSubtype::Multiple => 2,
        }
    }

    pub fn unique(self) -> Option<TypeId> {
        match self {
            ConcreteSubtype::Unique(id) => Some(id),
            ConcreteSubtype::Unset | ConcreteSubtype::Multiple => None,
        }
    }
}

pub(crate) struct Node {
    pub(crate) record: Arc<TypeRecord>,
    pub(crate) children: Vec<TypeId>,
    pub(crate) concrete: ConcreteSubtype,
}

#[derive(Default)]
pub(crate) struct HierarchyState {
    nodes: Vec<Option<Node>>,
    by_name: FxHashMap<Name, TypeId>,
    root: Option<TypeId>,
}

impl HierarchyState {
    pub(crate) fn node(&self, id: TypeId) -> Option<&Node> {
        self.nodes.get(id.index()).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, id: TypeId) -> &mut Node {
        match self.nodes.get_mut(id.index()).and_then(Option::as_mut) {
            Some(node) => node,
            None => crate::fatal!("type {id} is not in the hierarchy"),
        }
    }

    pub(crate) fn record(&self, id: TypeId) -> Option<&Arc<TypeRecord>> {
        self.node(id).map(|node| &node.record)
    }

    pub(crate) fn by_name(&self, name: Name) -> Option<&Arc<TypeRecord>> {
        self.by_name.get(&name).and_then(|&id| self.record(id))
    }

    pub(crate) fn contains_name(&self, name: Name) -> bool {
        self.by_name.contains_key(&name)
    }

    pub(crate) fn root(&self) -> Option<&Arc<TypeRecord>> {
        self.root.and_then(|id| self.record(id))
    }

    pub(crate) fn len(&self) -> usize {
        self.by_name.len()
    }

    pub(crate) fn concrete(&self, id: TypeId) -> ConcreteSubtype {
        self.node(id).map_or(ConcreteSubtype::Unset, |node| node.concrete)
    }

    pub(crate) fn children(&self, id: TypeId) -> &[TypeId] {
        self.node(id).map_or(&[][..], |node| node.children.as_slice())
    }

    /// Add a freshly built record and link it under its superclass.
    pub(crate) fn insert(&mut self, record: &Arc<TypeRecord>) {
        let id = record.id();
        if self.nodes.len() <= id.index() {
            self.nodes.resize_with(id.index() + 1, || None);
        }
        if self.nodes[id.index()].is_some() {
            crate::fatal!("type {id} inserted into the hierarchy twice");
        }
        self.nodes[id.index()] = Some(Node {
            record: Arc::clone(record),
            children: Vec::new(),
            concrete: ConcreteSubtype::Unset,
        });
        self.by_name.insert(record.name(), id);

        match record.supertype() {
            Some(supertype) if record.is_instance_class() => {
                self.node_mut(supertype.id()).children.push(id);
            }
            Some(_) => {}
            None if record.kind() != TypeKind::Primitive => self.root = Some(id),
            None => {}
        }
    }

    fn set_concrete(&mut self, id: TypeId, next: ConcreteSubtype) {
        let node = self.node_mut(id);
        let current = node.concrete;
        let regresses = next.rank() < current.rank()
            || matches!((current, next), (ConcreteSubtype::Unique(a), ConcreteSubtype::Unique(b)) if a != b);
        if regresses {
            crate::fatal!("concrete subtype of {id} moved from {current:?} to {next:?}");
        }
        node.concrete = next;
    }

    /// Update concrete-subtype facts for a newly inserted type, flushing
    /// dependents of every ancestor whose facts the type may falsify.
    pub(crate) fn record_concrete(
        &mut self,
        record: &TypeRecord,
        interfaces: InterfacePropagation,
        sweep: &mut InvalidationSweep<'_>,
    ) {
        let id = record.id();
        match record.kind() {
            TypeKind::Primitive => self.set_concrete(id, ConcreteSubtype::Unique(id)),
            TypeKind::Array => {
                let leaf_element = record
                    .element()
                    .is_some_and(|e| e.is_primitive() || e.is_final());
                if leaf_element {
                    self.set_concrete(id, ConcreteSubtype::Unique(id));
                }
            }
            TypeKind::Instance | TypeKind::Hybrid if record.is_concrete_class() => {
                self.record_concrete_class(record, interfaces, sweep);
            }
            TypeKind::Instance | TypeKind::Hybrid | TypeKind::Interface => {}
        }
    }

    fn record_concrete_class(
        &mut self,
        record: &TypeRecord,
        interfaces: InterfacePropagation,
        sweep: &mut InvalidationSweep<'_>,
    ) {
        let id = record.id();
        if !self.children(id).is_empty() {
            crate::fatal!("type {id} has subclasses at definition time");
        }
        self.set_concrete(id, ConcreteSubtype::Unique(id));

        // Claim unset ancestors for `id` until one already has a concrete
        // subtype. From there every ancestor has several; their dependents
        // still need re-checking for method assumptions.
        let mut claiming = true;
        for ancestor in record.superclasses() {
            let ancestor_id = ancestor.id();
            match self.concrete(ancestor_id) {
                ConcreteSubtype::Unset if claiming => {
                    self.set_concrete(ancestor_id, ConcreteSubtype::Unique(id));
                }
                ConcreteSubtype::Unset => {
                    crate::fatal!("ancestor {ancestor_id} of a concrete type has no concrete subtype")
                }
                ConcreteSubtype::Unique(_) => {
                    claiming = false;
                    sweep.flush(ancestor);
                    self.set_concrete(ancestor_id, ConcreteSubtype::Multiple);
                }
                ConcreteSubtype::Multiple => {
                    claiming = false;
                    sweep.flush(ancestor);
                }
            }
        }

        if interfaces == InterfacePropagation::Ignore {
            return;
        }
        for interface in record.interface_closure() {
            let interface_id = interface.id();
            match self.concrete(interface_id) {
                ConcreteSubtype::Unset => {
                    self.set_concrete(interface_id, ConcreteSubtype::Unique(id));
                }
                ConcreteSubtype::Unique(_) => {
                    sweep.flush(interface);
                    self.set_concrete(interface_id, ConcreteSubtype::Multiple);
                }
                ConcreteSubtype::Multiple => sweep.flush(interface),
            }
        }
    }

    /// The single implementation every concrete subtype of `context` runs for
    /// `method`, if there is one.
    pub(crate) fn unique_concrete_method(
        &self,
        context: TypeId,
        method: &Arc<Method>,
    ) -> Option<Arc<Method>> {
        let node = self.node(context)?;
        match node.concrete {
            ConcreteSubtype::Unset => None,
            ConcreteSubtype::Unique(concrete) => {
                self.record(concrete)?.resolve_method_impl(method)
            }
            // Implementors of an interface are not linked as children.
            ConcreteSubtype::Multiple if node.record.is_interface() => None,
            ConcreteSubtype::Multiple => {
                let mut search = ConcreteMethodSearch::new(method);
                search.visit(self, node);
                search.result()
            }
        }
    }
}

/// Depth-first walk over the live concrete subtypes of a class, stopping at
/// the second distinct implementation.
struct ConcreteMethodSearch<'m> {
    method: &'m Arc<Method>,
    found: Option<Arc<Method>>,
    ambiguous: bool,
}

impl<'m> ConcreteMethodSearch<'m> {
    fn new(method: &'m Arc<Method>) -> Self {
        Self {
            method,
            found: None,
            ambiguous: false,
        }
    }

    fn offer(&mut self, candidate: Option<Arc<Method>>) {
        match (candidate, &self.found) {
            (None, _) => self.ambiguous = true,
            (Some(candidate), None) => self.found = Some(candidate),
            (Some(candidate), Some(found)) => {
                if candidate.id() != found.id() {
                    self.ambiguous = true;
                }
            }
        }
    }

    fn visit(&mut self, state: &HierarchyState, node: &Node) {
        ensure_sufficient_stack(|| {
            if node.record.is_concrete_class() {
                self.offer(node.record.resolve_method_impl(self.method));
            }
            for &child in &node.children {
                if self.ambiguous {
                    return;
                }
                let Some(child) = state.node(child) else {
                    continue;
                };
                match child.concrete {
                    ConcreteSubtype::Unset => {}
                    ConcreteSubtype::Unique(concrete) => {
                        let resolved = state
                            .record(concrete)
                            .and_then(|r| r.resolve_method_impl(self.method));
                        self.offer(resolved);
                    }
                    ConcreteSubtype::Multiple => self.visit(state, child),
                }
            }
        });
    }

    fn result(self) -> Option<Arc<Method>> {
        if self.ambiguous {
            None
        } else {
            self.found
        }
    }
}
