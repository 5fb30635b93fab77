//! Runtime type model of the hub VM.
//!
//! Every loaded type becomes an immutable [`TypeRecord`] owned by a
//! [`TypeHierarchy`]:
//!
//! - **Identity**: dense [`TypeId`](hub_ir::TypeId)s from the
//!   [`IdentityRegistry`], with array ids reserved on demand.
//! - **Dispatch**: a vtable, an itable of subtype markers and interface
//!   blocks, and a perfect-hash mtable locating each block, so virtual calls,
//!   interface calls, and subtype tests are all constant time.
//! - **Speculation**: concrete-subtype facts the compiler may depend on,
//!   tracked by the [`DependencyTracker`] and invalidated when a later
//!   definition falsifies them.
//!
//! Definitions are serialized by the hierarchy's write lock; everything else
//! runs concurrently against published, immutable records.

/// Log and abort on a broken internal invariant.
macro_rules! fatal {
    ($($arg:tt)*) => {
        $crate::error::fatal(format_args!($($arg)*))
    };
}
pub(crate) use fatal;

mod build;
mod config;
mod deps;
mod dispatch;
mod error;
mod hierarchy;
mod record;
mod registry;

#[cfg(test)]
mod testing;

pub use config::{HierarchyConfig, InterfacePropagation};
pub use deps::{
    ArtifactHandle, ArtifactId, Assumption, AssumptionBatch, AssumptionRecord, DependencyStats,
    DependencyTracker, DeoptimizationListener, Installation, InvalidationQueue, Validation,
    ValidityToken,
};
pub use dispatch::{perfect_divisor, DispatchTable, EntryPoint, ITableSlot, MTable, VTableEntry};
pub use error::{DefineError, InitError, InitFailure, ResolveError, VerifyError};
pub use hierarchy::{ConcreteSubtype, TypeHierarchy, TypeHierarchyBuilder};
pub use record::{
    Field, InitState, Initializer, MemberId, Method, MethodKind, TypeRecord,
};
pub use registry::{ArrayOrigin, IdState, IdentityRegistry, MAX_ARRAY_DIMENSIONS};

// Itable slots and vtable words are allocated per type and per slot.
mod size_asserts {
    use super::{EntryPoint, ITableSlot, MemberId};
    hub_ir::static_assert_size!(ITableSlot, 8);
    hub_ir::static_assert_size!(EntryPoint, 8);
    hub_ir::static_assert_size!(Option<EntryPoint>, 8);
    hub_ir::static_assert_size!(MemberId, 8);
}
