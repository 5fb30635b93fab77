//! The hierarchy coordinator.
//!
//! [`TypeHierarchy`] owns the identity registry, the hierarchy arena, and the
//! dependency tracker, and fixes the order of every mutation:
//!
//! ```text
//! define(desc)
//!   registry.allocate()                      registry lock only
//!   hierarchy.write()
//!     build record (vtable, itable, mtable)
//!     registry.register(id, record)
//!     link under superclass
//!     update concrete-subtype facts, flush dependents
//!     deliver invalidated artifacts          still under the write lock
//! ```
//!
//! Validation, installation, discard, and unique-concrete-method queries take
//! the read side. Call resolution and subtype tests read immutable records
//! and take no hierarchy lock at all.

mod state;

use std::fmt;
use std::sync::Arc;

use hub_ir::{
    MemberKey, Metadata, Modifiers, Name, SharedSymbols, TypeDescription, TypeId, TypeKind,
};
use parking_lot::RwLock;

use crate::build::{build_record, ArrayParts, RecordInput};
use crate::config::HierarchyConfig;
use crate::deps::{
    Assumption, AssumptionBatch, ArtifactHandle, ArtifactId, DependencyStats,
    DependencyTracker, DeoptimizationListener, Installation, InvalidationQueue,
    InvalidationSweep, Validation, ValidityToken,
};
use crate::record::{Initializer, Method, MethodKind, TypeRecord};
use crate::registry::{IdentityRegistry, MAX_ARRAY_DIMENSIONS};
use crate::{DefineError, InitError, ResolveError};

pub use state::ConcreteSubtype;

use state::HierarchyState;

/// Builder for [`TypeHierarchy`].
#[derive(Default)]
pub struct TypeHierarchyBuilder {
    config: HierarchyConfig,
    symbols: Option<SharedSymbols>,
    listeners: Vec<Arc<dyn DeoptimizationListener>>,
}

impl TypeHierarchyBuilder {
    #[must_use]
    pub fn config(mut self, config: HierarchyConfig) -> Self {
        self.config = config;
        self
    }

    /// Share the loader's symbol table. A fresh table is used otherwise.
    #[must_use]
    pub fn symbols(mut self, symbols: SharedSymbols) -> Self {
        self.symbols = Some(symbols);
        self
    }

    /// Notify `listener` of invalidated artifacts, in addition to the
    /// built-in queue.
    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn DeoptimizationListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    pub fn build(self) -> TypeHierarchy {
        TypeHierarchy {
            registry: IdentityRegistry::new(self.config.registry_prefix),
            config: self.config,
            symbols: self.symbols.unwrap_or_default(),
            state: RwLock::new(HierarchyState::default()),
            tracker: DependencyTracker::new(),
            queue: InvalidationQueue::new(),
            listeners: self.listeners,
        }
    }
}

/// The runtime type model: every loaded type, its dispatch tables, and the
/// speculative facts compiled code depends on.
pub struct TypeHierarchy {
    config: HierarchyConfig,
    symbols: SharedSymbols,
    registry: IdentityRegistry,
    state: RwLock<HierarchyState>,
    tracker: DependencyTracker,
    queue: InvalidationQueue,
    listeners: Vec<Arc<dyn DeoptimizationListener>>,
}

impl TypeHierarchy {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> TypeHierarchyBuilder {
        TypeHierarchyBuilder::default()
    }

    pub fn config(&self) -> &HierarchyConfig {
        &self.config
    }

    pub fn symbols(&self) -> &SharedSymbols {
        &self.symbols
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn tracker(&self) -> &DependencyTracker {
        &self.tracker
    }

    /// Invalidated artifact handles, in invalidation order.
    pub fn invalidations(&self) -> &InvalidationQueue {
        &self.queue
    }

    // === Definition ===

    /// Add a loaded type to the hierarchy.
    ///
    /// The supertype and interfaces named by `desc` must already be defined.
    ///
    /// # Panics
    /// Fatal if `desc` references an unbound type id, or omits the supertype
    /// after the root type is defined.
    #[tracing::instrument(level = "debug", skip_all, fields(name = self.symbols.lookup(desc.name)))]
    pub fn define(&self, desc: TypeDescription) -> Result<Arc<TypeRecord>, DefineError> {
        if desc.kind == TypeKind::Array {
            return Err(DefineError::ArrayDescription {
                name: self.symbols.lookup(desc.name),
            });
        }

        let supertype = desc.supertype.map(|id| self.require(id));
        let interfaces: Vec<_> = desc.interfaces.iter().map(|&id| self.require(id)).collect();

        let id = self.registry.allocate();
        let mut state = self.state.write();
        let result = self.define_locked(&mut state, id, desc, supertype, interfaces, None);
        if result.is_err() {
            self.registry.release(id);
        }
        result
    }

    /// The array type whose component is `component`, materialized on first
    /// request.
    #[tracing::instrument(level = "debug", skip_all, fields(component = component.raw()))]
    pub fn array_of(&self, component: TypeId) -> Result<Arc<TypeRecord>, DefineError> {
        let component_record = self
            .registry
            .lookup(component)
            .ok_or(DefineError::BadArrayComponent { component })?;
        let id = self
            .registry
            .array_of(component)
            .ok_or(DefineError::TooManyDimensions {
                dimensions: usize::from(component_record.dimensions()) + 1,
                max: MAX_ARRAY_DIMENSIONS,
            })?;
        if let Some(existing) = self.registry.lookup(id) {
            return Ok(existing);
        }

        let root = match self.root() {
            Some(root) => root,
            None => crate::fatal!("array of {component} requested before the root type"),
        };
        let capabilities = self.capability_interfaces(&root)?;

        let element = component_record
            .element()
            .cloned()
            .unwrap_or_else(|| Arc::clone(&component_record));
        let covariant_ancestors = component_record
            .ancestors()
            .iter()
            .filter(|&&ancestor| ancestor != component)
            .filter_map(|&ancestor| self.registry.array_of(ancestor))
            .collect();

        let name = self
            .symbols
            .intern(&format!("{}[]", component_record.name_str()));
        let access = component_record.modifiers()
            & (Modifiers::PUBLIC | Modifiers::PROTECTED | Modifiers::PRIVATE);
        let desc = TypeDescription {
            name,
            kind: TypeKind::Array,
            modifiers: access | Modifiers::FINAL | Modifiers::SYNTHETIC,
            supertype: Some(root.id()),
            interfaces: capabilities.iter().map(|iface| iface.id()).collect(),
            fields: Vec::new(),
            methods: Vec::new(),
            metadata: Metadata::default(),
        };
        let parts = ArrayParts {
            dimensions: component_record.dimensions() + 1,
            component: component_record,
            element,
            covariant_ancestors,
        };

        let mut state = self.state.write();
        if let Some(existing) = self.registry.lookup(id) {
            return Ok(existing);
        }
        self.define_locked(&mut state, id, desc, Some(root), capabilities, Some(parts))
    }

    /// Id of the `dimensions`-dimensional array of `element`, without
    /// materializing it. Zero dimensions names `element` itself.
    pub fn array_id(&self, element: TypeId, dimensions: u8) -> TypeId {
        self.registry.array_id(element, dimensions)
    }

    fn define_locked(
        &self,
        state: &mut HierarchyState,
        id: TypeId,
        desc: TypeDescription,
        supertype: Option<Arc<TypeRecord>>,
        interfaces: Vec<Arc<TypeRecord>>,
        array: Option<ArrayParts>,
    ) -> Result<Arc<TypeRecord>, DefineError> {
        if state.contains_name(desc.name) {
            return Err(DefineError::DuplicateName {
                name: self.symbols.lookup(desc.name),
            });
        }
        if supertype.is_none() && desc.kind != TypeKind::Primitive {
            if let Some(root) = state.root() {
                crate::fatal!(
                    "{} has no supertype but {} is already the root type",
                    self.symbols.lookup(desc.name),
                    root.name_str()
                );
            }
        }

        let record = Arc::new(build_record(RecordInput {
            id,
            desc,
            supertype,
            interfaces,
            array,
            symbols: &self.symbols,
        })?);

        self.registry.register(id, Arc::clone(&record));
        state.insert(&record);

        let mut sweep = InvalidationSweep::new(&self.tracker, &record);
        state.record_concrete(&record, self.config.interface_concrete_subtypes, &mut sweep);
        let artifacts = sweep.finish();
        if !artifacts.is_empty() {
            self.deliver(&record, &artifacts);
        }

        tracing::debug!(
            ty = id.raw(),
            name = record.name_str(),
            kind = ?record.kind(),
            invalidated = artifacts.len(),
            "defined type"
        );
        Ok(record)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(cause = cause.id().raw(), count = artifacts.len()))]
    fn deliver(&self, cause: &TypeRecord, artifacts: &[ArtifactHandle]) {
        self.queue.artifacts_invalidated(cause, artifacts);
        for listener in &self.listeners {
            listener.artifacts_invalidated(cause, artifacts);
        }
    }

    /// The capability interfaces arrays implement, defined as empty
    /// interfaces if the loader has not provided them.
    fn capability_interfaces(
        &self,
        root: &Arc<TypeRecord>,
    ) -> Result<Vec<Arc<TypeRecord>>, DefineError> {
        self.config
            .array_interfaces
            .iter()
            .map(|name| {
                let name = self.symbols.intern(name);
                if let Some(found) = self.find_by_name(name) {
                    return Ok(found);
                }
                let desc = TypeDescription::interface(name, root.id())
                    .with_modifiers(Modifiers::SYNTHETIC);
                match self.define(desc) {
                    Err(DefineError::DuplicateName { .. }) => match self.find_by_name(name) {
                        Some(found) => Ok(found),
                        None => crate::fatal!("{} vanished after a duplicate definition", self.symbols.lookup(name)),
                    },
                    other => other,
                }
            })
            .collect()
    }

    fn require(&self, id: TypeId) -> Arc<TypeRecord> {
        match self.registry.lookup(id) {
            Some(record) => record,
            None => crate::fatal!("type {id} is referenced before it is defined"),
        }
    }

    fn loaded(&self, id: TypeId) -> Result<Arc<TypeRecord>, ResolveError> {
        self.registry
            .lookup(id)
            .ok_or(ResolveError::UnknownType { id })
    }

    // === Lookup ===

    pub fn lookup(&self, id: TypeId) -> Option<Arc<TypeRecord>> {
        self.registry.lookup(id)
    }

    pub fn find_by_name(&self, name: Name) -> Option<Arc<TypeRecord>> {
        self.state.read().by_name(name).cloned()
    }

    /// The root object type, once defined.
    pub fn root(&self) -> Option<Arc<TypeRecord>> {
        self.state.read().root().cloned()
    }

    /// Direct subclasses of `ty`, most recent last.
    pub fn children_of(&self, ty: TypeId) -> Vec<TypeId> {
        self.state.read().children(ty).to_vec()
    }

    /// Number of defined types, arrays included.
    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // === Dispatch ===

    /// O(1) subtype test. `target` may be a reserved array id.
    pub fn is_subtype_of(&self, candidate: TypeId, target: TypeId) -> bool {
        candidate == target
            || self
                .registry
                .lookup(candidate)
                .is_some_and(|record| record.is_subtype_of(target))
    }

    /// The method a receiver of type `receiver` executes for a virtual call
    /// of `method`.
    pub fn resolve_virtual_call(
        &self,
        receiver: TypeId,
        method: &Arc<Method>,
    ) -> Result<Arc<Method>, ResolveError> {
        let record = self.loaded(receiver)?;
        if record.dispatch_table().is_none() {
            return Err(ResolveError::NoDispatchTable {
                ty: record.name_str(),
            });
        }
        let slot = match method.kind() {
            MethodKind::InterfaceAbstract { .. } => {
                return self.resolve_interface_call(receiver, method)
            }
            MethodKind::Static | MethodKind::Virtual { slot: None } => {
                return Err(ResolveError::NotVirtual {
                    holder: method.holder_name(),
                    name: method.name_str(),
                })
            }
            MethodKind::Virtual { slot: Some(slot) } | MethodKind::SyntheticDefault { slot, .. } => {
                slot
            }
        };
        if !record.is_subtype_of(method.holder()) {
            return Err(ResolveError::IncompatibleClassChange {
                receiver: record.name_str(),
                target: method.holder_name(),
            });
        }
        record
            .all_virtual_methods()
            .get(slot as usize)
            .cloned()
            .ok_or(ResolveError::NoSuchMethod {
                ty: record.name_str(),
                name: method.name_str(),
                signature: self.symbols.lookup(method.signature()),
            })
    }

    /// The method a receiver of type `receiver` executes for an interface
    /// call of `method`, through `vtable[itable[mtable[I] + index]]`.
    pub fn resolve_interface_call(
        &self,
        receiver: TypeId,
        method: &Arc<Method>,
    ) -> Result<Arc<Method>, ResolveError> {
        let Some((interface, index)) = method.interface_index() else {
            return self.resolve_virtual_call(receiver, method);
        };
        let record = self.loaded(receiver)?;
        let table = record
            .dispatch_table()
            .ok_or(ResolveError::NoDispatchTable {
                ty: record.name_str(),
            })?;
        let incompatible = || ResolveError::IncompatibleClassChange {
            receiver: record.name_str(),
            target: self
                .registry
                .lookup(interface)
                .map_or("<unknown>", |iface| iface.name_str()),
        };
        let slot = table
            .interface_slot(interface, index)
            .ok_or_else(incompatible)?;
        match record.all_virtual_methods().get(slot as usize) {
            Some(target) => Ok(Arc::clone(target)),
            None => crate::fatal!("itable of {record} points past its vtable"),
        }
    }

    /// Vtable slot used for calls of `key` on a receiver of static type
    /// `context`.
    pub fn vtable_slot(&self, context: TypeId, key: MemberKey) -> Result<u32, ResolveError> {
        let record = self.loaded(context)?;
        if record.dispatch_table().is_none() {
            return Err(ResolveError::NoDispatchTable {
                ty: record.name_str(),
            });
        }
        if let Some(slot) = record.vtable_slot_of(key) {
            return Ok(slot);
        }
        match record.find_method(key) {
            Some(method) => Err(ResolveError::NotVirtual {
                holder: method.holder_name(),
                name: method.name_str(),
            }),
            None => Err(ResolveError::NoSuchMethod {
                ty: record.name_str(),
                name: self.symbols.lookup(key.name),
                signature: self.symbols.lookup(key.signature),
            }),
        }
    }

    // === Speculation ===

    pub fn unique_concrete_subtype(&self, ty: TypeId) -> ConcreteSubtype {
        self.state.read().concrete(ty)
    }

    /// The implementation of `method` shared by every concrete subtype of
    /// `context`, if there is exactly one.
    pub fn unique_concrete_method(
        &self,
        context: TypeId,
        method: &Arc<Method>,
    ) -> Option<Arc<Method>> {
        self.state.read().unique_concrete_method(context, method)
    }

    fn holds(state: &HierarchyState, assumption: &Assumption) -> bool {
        match assumption {
            Assumption::UniqueConcreteSubtype { context, subtype } => {
                state.concrete(*context) == ConcreteSubtype::Unique(*subtype)
            }
            Assumption::UniqueConcreteMethod {
                context,
                method,
                implementation,
            } => state
                .unique_concrete_method(*context, method)
                .is_some_and(|found| found.id() == implementation.id()),
        }
    }

    /// Check a batch against the current hierarchy. All or nothing.
    #[tracing::instrument(level = "debug", skip_all, fields(assumptions = batch.len()))]
    pub fn validate(&self, batch: &AssumptionBatch) -> Validation {
        if batch.is_empty() {
            return Validation::NoAssumptions;
        }
        let state = self.state.read();
        if !batch.assumptions().iter().all(|a| Self::holds(&state, a)) {
            self.tracker.note_rejected();
            tracing::debug!("assumptions rejected");
            return Validation::Rejected;
        }
        Validation::Valid(self.tracker.register(batch))
    }

    /// Attach compiled code to a validated batch. Rejected if a definition
    /// falsified the batch since validation; the token should then be
    /// dropped and the code recompiled.
    ///
    /// # Panics
    /// With `validate_on_install`, fatal if a token still marked valid no
    /// longer holds.
    #[tracing::instrument(level = "debug", skip_all, fields(artifact = token.id().raw()))]
    pub fn install(&self, token: &ValidityToken, artifact: ArtifactHandle) -> Installation {
        let state = self.state.read();
        if self.config.validate_on_install
            && token.is_valid()
            && !token.assumptions().iter().all(|a| Self::holds(&state, a))
        {
            crate::fatal!("valid assumptions {} no longer hold", token.id().raw());
        }
        self.tracker.attach(token, artifact)
    }

    /// Forget a validated batch, installed or not. Its id is recycled.
    pub fn discard(&self, token: ValidityToken) {
        let _state = self.state.read();
        self.tracker.discard(token);
    }

    pub fn dependents_of(&self, ty: TypeId) -> Vec<ArtifactId> {
        self.tracker.dependents_of(ty)
    }

    pub fn stats(&self) -> DependencyStats {
        self.tracker.stats()
    }

    // === Initialization ===

    /// Initialize `ty` and its superclasses.
    ///
    /// # Panics
    /// Fatal if `ty` is not defined.
    pub fn initialize(&self, ty: TypeId, initializer: &dyn Initializer) -> Result<(), InitError> {
        self.require(ty).initialize(initializer)
    }
}

impl Default for TypeHierarchy {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TypeHierarchy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeHierarchy")
            .field("types", &self.len())
            .field("registry", &self.registry)
            .field("tracker", &self.tracker)
            .field("listeners", &self.listeners.len())
            .finish_non_exhaustive()
    }
}
