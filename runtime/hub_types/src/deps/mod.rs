//! Dependency tracking for speculative compilation.
//!
//! A compiler speculates on two kinds of facts:
//!
//! - *unique concrete subtype*: `context` currently has exactly one concrete
//!   subtype, `subtype`;
//! - *unique concrete method*: every concrete subtype of `context` executes
//!   `implementation` for calls of `method`.
//!
//! It submits them as an [`AssumptionBatch`]; the hierarchy checks the batch
//! under its read lock and, if every fact holds, registers an
//! [`AssumptionRecord`] indexed under each context type. Defining a type later
//! re-checks the records indexed under the new type's ancestors (under the
//! write lock); any record with a falsified fact is marked invalid, removed
//! from the index, and its artifact handed to the deoptimizer.
//!
//! # Concurrency
//!
//! Validators add to the index concurrently (holding the read lock), so the
//! index is a `DashMap`. Removal and iteration for invalidation happen only
//! under the write lock, or under the read lock for an explicit discard of a
//! record no sweep can observe as valid.

mod queue;

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use hub_ir::TypeId;
use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::record::{Method, TypeRecord};
use crate::registry::IdBitSet;

pub use queue::{DeoptimizationListener, InvalidationQueue};

/// One speculative fact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Assumption {
    UniqueConcreteSubtype {
        context: TypeId,
        subtype: TypeId,
    },
    UniqueConcreteMethod {
        context: TypeId,
        method: Arc<Method>,
        implementation: Arc<Method>,
    },
}

impl Assumption {
    /// The type whose subtypes the fact is about; the index key.
    pub fn context(&self) -> TypeId {
        match self {
            Assumption::UniqueConcreteSubtype { context, .. }
            | Assumption::UniqueConcreteMethod { context, .. } => *context,
        }
    }
}

/// Facts one compiled artifact relies on.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AssumptionBatch {
    assumptions: Vec<Assumption>,
}

impl AssumptionBatch {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn unique_concrete_subtype(mut self, context: TypeId, subtype: TypeId) -> Self {
        self.assumptions
            .push(Assumption::UniqueConcreteSubtype { context, subtype });
        self
    }

    #[must_use]
    pub fn unique_concrete_method(
        mut self,
        context: TypeId,
        method: Arc<Method>,
        implementation: Arc<Method>,
    ) -> Self {
        self.assumptions.push(Assumption::UniqueConcreteMethod {
            context,
            method,
            implementation,
        });
        self
    }

    pub fn push(&mut self, assumption: Assumption) {
        self.assumptions.push(assumption);
    }

    pub fn assumptions(&self) -> &[Assumption] {
        &self.assumptions
    }

    pub fn is_empty(&self) -> bool {
        self.assumptions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.assumptions.len()
    }
}

/// Dense id of a validated batch. Recycled once the record is retired and
/// its last token is dropped.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArtifactId(u32);

impl ArtifactId {
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// Opaque handle of compiled code, owned by the compiler.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct ArtifactHandle(pub u64);

/// A validated batch.
pub struct AssumptionRecord {
    id: ArtifactId,
    assumptions: Vec<Assumption>,
    contexts: SmallVec<[TypeId; 4]>,
    valid: AtomicBool,
    retired: AtomicBool,
    artifact: Mutex<Option<ArtifactHandle>>,
    ids: Arc<Mutex<IdBitSet>>,
}

impl AssumptionRecord {
    pub fn id(&self) -> ArtifactId {
        self.id
    }

    pub fn assumptions(&self) -> &[Assumption] {
        &self.assumptions
    }

    pub fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire)
    }

    pub fn artifact(&self) -> Option<ArtifactHandle> {
        *self.artifact.lock()
    }

    /// Clear the valid flag. True only for the caller that cleared it.
    fn invalidate(&self) -> bool {
        self.valid.swap(false, Ordering::AcqRel)
    }
}

impl Drop for AssumptionRecord {
    fn drop(&mut self) {
        self.ids.lock().remove(self.id.raw());
    }
}

impl fmt::Debug for AssumptionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AssumptionRecord")
            .field("id", &self.id)
            .field("contexts", &self.contexts)
            .field("valid", &self.is_valid())
            .field("artifact", &self.artifact())
            .finish_non_exhaustive()
    }
}

/// Proof that a batch was valid when checked; pass it to `install`.
#[derive(Debug)]
pub struct ValidityToken {
    record: Arc<AssumptionRecord>,
}

impl ValidityToken {
    /// Unique among live tokens. The id of an invalidated token is not handed
    /// out again until the token is dropped.
    pub fn id(&self) -> ArtifactId {
        self.record.id
    }

    /// False once a later definition falsified one of the facts.
    pub fn is_valid(&self) -> bool {
        self.record.is_valid()
    }

    pub fn assumptions(&self) -> &[Assumption] {
        &self.record.assumptions
    }
}

/// Result of validating a batch.
#[derive(Debug)]
pub enum Validation {
    /// Nothing to track; the artifact may be installed unconditionally.
    NoAssumptions,
    Valid(ValidityToken),
    /// At least one fact no longer holds. Discard the artifact.
    Rejected,
}

impl Validation {
    pub fn is_rejected(&self) -> bool {
        matches!(self, Validation::Rejected)
    }

    pub fn token(self) -> Option<ValidityToken> {
        match self {
            Validation::Valid(token) => Some(token),
            Validation::NoAssumptions | Validation::Rejected => None,
        }
    }
}

/// Result of installing a validated artifact.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Installation {
    Installed,
    /// Invalidated between validation and installation. Recompile.
    Rejected,
}

/// Diagnostic counters and index shape.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DependencyStats {
    /// Records still referenced, by the index or by a token.
    pub live_records: usize,
    pub types_with_dependents: usize,
    /// Sum over types of their dependent count.
    pub dependency_edges: usize,
    pub max_dependents_per_type: usize,
    pub validated: u64,
    pub rejected: u64,
    pub invalidated: u64,
}

/// Index of validated assumption records by context type.
pub struct DependencyTracker {
    ids: Arc<Mutex<IdBitSet>>,
    dependents: DashMap<TypeId, Vec<Arc<AssumptionRecord>>>,
    validated: AtomicU64,
    rejected: AtomicU64,
    invalidated: AtomicU64,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self {
            ids: Arc::new(Mutex::new(IdBitSet::new())),
            dependents: DashMap::new(),
            validated: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            invalidated: AtomicU64::new(0),
        }
    }

    /// Record a batch that was just checked. Caller holds the hierarchy read
    /// lock.
    pub(crate) fn register(&self, batch: &AssumptionBatch) -> ValidityToken {
        let id = ArtifactId(self.ids.lock().allocate());

        let mut contexts: SmallVec<[TypeId; 4]> = SmallVec::new();
        for assumption in batch.assumptions() {
            let context = assumption.context();
            if !contexts.contains(&context) {
                contexts.push(context);
            }
        }

        let record = Arc::new(AssumptionRecord {
            id,
            assumptions: batch.assumptions().to_vec(),
            contexts,
            valid: AtomicBool::new(true),
            retired: AtomicBool::new(false),
            artifact: Mutex::new(None),
            ids: Arc::clone(&self.ids),
        });

        for &context in &record.contexts {
            self.dependents
                .entry(context)
                .or_default()
                .push(Arc::clone(&record));
        }
        self.validated.fetch_add(1, Ordering::Relaxed);

        tracing::debug!(
            artifact = id.raw(),
            contexts = record.contexts.len(),
            "registered valid assumptions"
        );
        ValidityToken { record }
    }

    pub(crate) fn note_rejected(&self) {
        self.rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Attach the compiled artifact. Caller holds the hierarchy read lock,
    /// so no sweep runs concurrently.
    pub(crate) fn attach(&self, token: &ValidityToken, artifact: ArtifactHandle) -> Installation {
        if !token.record.is_valid() {
            tracing::debug!(artifact = token.id().raw(), "dropping invalidated artifact");
            return Installation::Rejected;
        }
        *token.record.artifact.lock() = Some(artifact);
        Installation::Installed
    }

    /// Remove a record from the index. Idempotent. The id is recycled when
    /// the last reference to the record goes away.
    pub(crate) fn retire(&self, record: &Arc<AssumptionRecord>) {
        if record.retired.swap(true, Ordering::AcqRel) {
            return;
        }
        record.valid.store(false, Ordering::Release);
        for context in &record.contexts {
            let emptied = match self.dependents.get_mut(context) {
                Some(mut list) => {
                    list.retain(|r| !Arc::ptr_eq(r, record));
                    list.is_empty()
                }
                None => false,
            };
            if emptied {
                self.dependents.remove_if(context, |_, list| list.is_empty());
            }
        }
    }

    /// Drop a token's record. Caller holds the hierarchy read lock.
    pub(crate) fn discard(&self, token: ValidityToken) {
        tracing::debug!(artifact = token.id().raw(), "discarding assumptions");
        self.retire(&token.record);
    }

    /// Records currently indexed under `context`.
    pub(crate) fn snapshot(&self, context: TypeId) -> Vec<Arc<AssumptionRecord>> {
        self.dependents
            .get(&context)
            .map(|list| list.clone())
            .unwrap_or_default()
    }

    /// Ids of the valid records that depend on facts about `ty`.
    pub fn dependents_of(&self, ty: TypeId) -> Vec<ArtifactId> {
        let mut ids: Vec<ArtifactId> = self
            .snapshot(ty)
            .iter()
            .filter(|r| r.is_valid())
            .map(|r| r.id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn stats(&self) -> DependencyStats {
        let mut stats = DependencyStats {
            live_records: self.ids.lock().len(),
            validated: self.validated.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            invalidated: self.invalidated.load(Ordering::Relaxed),
            ..DependencyStats::default()
        };
        for entry in &self.dependents {
            stats.types_with_dependents += 1;
            stats.dependency_edges += entry.len();
            stats.max_dependents_per_type = stats.max_dependents_per_type.max(entry.len());
        }
        stats
    }

    /// Emit `stats()` at debug level.
    pub fn log_stats(&self) {
        let stats = self.stats();
        tracing::debug!(
            live = stats.live_records,
            types = stats.types_with_dependents,
            edges = stats.dependency_edges,
            max_per_type = stats.max_dependents_per_type,
            validated = stats.validated,
            rejected = stats.rejected,
            invalidated = stats.invalidated,
            "dependency statistics"
        );
    }
}

impl Default for DependencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DependencyTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyTracker")
            .field("stats", &self.stats())
            .finish()
    }
}

/// Collects the records falsified by one newly defined concrete type.
///
/// Runs under the hierarchy write lock.
pub(crate) struct InvalidationSweep<'a> {
    tracker: &'a DependencyTracker,
    cause: &'a TypeRecord,
    invalidated: Vec<Arc<AssumptionRecord>>,
}

impl<'a> InvalidationSweep<'a> {
    pub(crate) fn new(tracker: &'a DependencyTracker, cause: &'a TypeRecord) -> Self {
        Self {
            tracker,
            cause,
            invalidated: Vec::new(),
        }
    }

    /// Re-check every record indexed under `context` against the new type.
    ///
    /// A unique-concrete-subtype fact on `context` is false by construction:
    /// the caller only flushes contexts that already had a concrete subtype.
    /// A unique-concrete-method fact on a class survives if the new type
    /// executes the same implementation. On an interface it never survives:
    /// implementors are not linked under the interface, so once it has two
    /// there is no subtree to search and no unique method to report.
    pub(crate) fn flush(&mut self, context: &TypeRecord) {
        let interface = context.is_interface();
        let context = context.id();
        for record in self.tracker.snapshot(context) {
            if !record.is_valid() {
                continue;
            }
            let holds = record
                .assumptions
                .iter()
                .filter(|a| a.context() == context)
                .all(|assumption| match assumption {
                    Assumption::UniqueConcreteSubtype { .. } => false,
                    Assumption::UniqueConcreteMethod { .. } if interface => false,
                    Assumption::UniqueConcreteMethod {
                        method,
                        implementation,
                        ..
                    } => self
                        .cause
                        .resolve_method_impl(method)
                        .is_some_and(|m| m.id() == implementation.id()),
                });
            if !holds && record.invalidate() {
                tracing::debug!(
                    artifact = record.id.raw(),
                    context = context.raw(),
                    cause = self.cause.id().raw(),
                    "assumptions invalidated"
                );
                self.invalidated.push(record);
            }
        }
    }

    /// Retire the invalidated records; returns the handles of installed
    /// artifacts that must be deoptimized.
    pub(crate) fn finish(self) -> Vec<ArtifactHandle> {
        let tracker = self.tracker;
        tracker
            .invalidated
            .fetch_add(self.invalidated.len() as u64, Ordering::Relaxed);
        self.invalidated
            .iter()
            .filter_map(|record| {
                tracker.retire(record);
                record.artifact()
            })
            .collect()
    }
}

#[cfg(test)]
mod tests;
