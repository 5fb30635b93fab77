//! Hub VM runtime type model.
//!
//! Facade over the runtime crates:
//!
//! - [`hub_ir`]: names, type ids, and the resolved type descriptions the
//!   loader hands over
//! - [`hub_types`]: the type hierarchy, dispatch tables, and the dependency
//!   tracker for speculative compilation
//!
//! A VM embeds one [`TypeHierarchy`], defines types into it as the loader
//! resolves them, and drains [`InvalidationQueue`] from its deoptimizer
//! thread.

use std::sync::Once;

pub use hub_ir::{
    BodyHandle, FieldDescription, MemberKey, Metadata, MethodDescription, Modifiers, Name,
    SharedSymbols, SymbolTable, TypeDescription, TypeId, TypeKind,
};
pub use hub_types::{
    perfect_divisor, ArrayOrigin, ArtifactHandle, ArtifactId, Assumption, AssumptionBatch,
    AssumptionRecord, ConcreteSubtype, DefineError, DependencyStats, DependencyTracker,
    DeoptimizationListener, DispatchTable, EntryPoint, Field, HierarchyConfig, ITableSlot, IdState,
    IdentityRegistry, InitError, InitFailure, InitState, Initializer, Installation,
    InterfacePropagation, InvalidationQueue, MTable, MemberId, Method, MethodKind, ResolveError,
    TypeHierarchy, TypeHierarchyBuilder, TypeRecord, VTableEntry, Validation, ValidityToken,
    VerifyError, MAX_ARRAY_DIMENSIONS,
};

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for debug output.
///
/// Call this once at startup. Safe to call multiple times.
/// Enable with `RUST_LOG=hub_types=debug` or `RUST_LOG=hub_types=trace`.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}

/// A hierarchy configured from `HUB_*` environment variables, with tracing
/// enabled per `RUST_LOG`.
pub fn hierarchy_from_env() -> TypeHierarchy {
    init_tracing();
    let config = HierarchyConfig::from_env();
    tracing::debug!(?config, "creating type hierarchy");
    TypeHierarchy::builder().config(config).build()
}
