//! Error types for type definition, call resolution, and initialization.
//!
//! Names are carried as `&'static str` (the symbol table leaks every interned
//! string), so errors render without access to the table and stay `Clone`.
//!
//! Assumption rejection is deliberately absent: a rejected batch is an
//! expected outcome reported through [`Validation`](crate::Validation).

use std::fmt;
use std::sync::Arc;

use hub_ir::TypeId;
use thiserror::Error;

/// A candidate type was rejected; the hierarchy is unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("{ty} overrides final method {holder}.{method}{signature}")]
    OverridesFinal {
        ty: &'static str,
        holder: &'static str,
        method: &'static str,
        signature: &'static str,
    },

    #[error("class {ty} names interface {supertype} as its superclass")]
    InterfaceSupertype {
        ty: &'static str,
        supertype: &'static str,
    },

    #[error("{ty} implements {interface}, which is not an interface")]
    NotAnInterface {
        ty: &'static str,
        interface: &'static str,
    },

    #[error("{ty} cannot extend final class {supertype}")]
    FinalSupertype {
        ty: &'static str,
        supertype: &'static str,
    },

    #[error("{ty} declares {member}{signature} more than once")]
    DuplicateMember {
        ty: &'static str,
        member: &'static str,
        signature: &'static str,
    },
}

/// Failure to add a type to the hierarchy.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum DefineError {
    #[error(transparent)]
    Verify(#[from] VerifyError),

    #[error("a type named {name} is already defined")]
    DuplicateName { name: &'static str },

    /// Component id is not bound to a loaded type.
    #[error("cannot form an array of {component}: component type is not loaded")]
    BadArrayComponent { component: TypeId },

    #[error("array of {dimensions} dimensions exceeds the limit of {max}")]
    TooManyDimensions { dimensions: usize, max: u8 },

    /// Array types are synthesized by `array_of`, never described by a loader.
    #[error("{name} describes an array type; use array_of instead")]
    ArrayDescription { name: &'static str },
}

/// Failure to resolve a call site against a receiver type.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("no method {name}{signature} in {ty}")]
    NoSuchMethod {
        ty: &'static str,
        name: &'static str,
        signature: &'static str,
    },

    /// Static, private, and initializer methods have no vtable slot.
    #[error("{holder}.{name} is not dispatched virtually")]
    NotVirtual {
        holder: &'static str,
        name: &'static str,
    },

    #[error("{receiver} does not implement {target}")]
    IncompatibleClassChange {
        receiver: &'static str,
        target: &'static str,
    },

    #[error("{ty} has no dispatch table")]
    NoDispatchTable { ty: &'static str },

    #[error("type {id} is not loaded")]
    UnknownType { id: TypeId },
}

/// What a failed static initializer (or verifier) reported.
///
/// Shared by every delivery of the same failure.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitFailure {
    message: Arc<str>,
}

impl InitFailure {
    pub fn new(message: impl Into<Arc<str>>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// True if `self` and `other` are the same recorded failure.
    pub fn same_failure(&self, other: &InitFailure) -> bool {
        Arc::ptr_eq(&self.message, &other.message)
    }
}

impl fmt::Display for InitFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Failure of class initialization.
///
/// The thread that ran the failing initializer sees `InitializerFailed` or
/// `VerificationFailed`; every later caller sees `NoClassDefFound` wrapping the
/// same [`InitFailure`].
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum InitError {
    #[error("exception in static initializer of {ty}: {failure}")]
    InitializerFailed {
        ty: &'static str,
        failure: InitFailure,
    },

    #[error("verification of {ty} failed: {failure}")]
    VerificationFailed {
        ty: &'static str,
        failure: InitFailure,
    },

    #[error("could not initialize {ty}: {failure}")]
    NoClassDefFound {
        ty: &'static str,
        failure: InitFailure,
    },
}

impl InitError {
    pub fn failure(&self) -> &InitFailure {
        match self {
            InitError::InitializerFailed { failure, .. }
            | InitError::VerificationFailed { failure, .. }
            | InitError::NoClassDefFound { failure, .. } => failure,
        }
    }
}

/// Abort on a broken structural invariant.
///
/// Logged at `error` first so the cause survives a panic hook that swallows
/// the message.
#[cold]
#[track_caller]
pub(crate) fn fatal(args: fmt::Arguments<'_>) -> ! {
    tracing::error!(violation = %args, "fatal invariant violation");
    panic!("fatal invariant violation: {args}");
}
