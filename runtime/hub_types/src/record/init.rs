//! Class initialization state machine.
//!
//! ```text
//! Prepared --verify--> Verified --claim--> Initializing(thread) --> Initialized
//!     |                                        |
//!     +------------------> Failed <------------+
//! ```
//!
//! Each record owns a monitor (mutex + condvar). A thread that finds another
//! thread initializing the type waits on the condvar; the initializing thread
//! itself re-enters without blocking. Failure is terminal: the initializing
//! thread gets the wrapped failure, every later caller gets `NoClassDefFound`
//! around the same failure.
//!
//! Independent of the hierarchy lock. Static initializers run with the
//! monitor released.

use std::thread::{self, ThreadId};

use hub_stack::ensure_sufficient_stack;
use parking_lot::{Condvar, Mutex};

use super::TypeRecord;
use crate::{InitError, InitFailure};

/// Runs the externally owned parts of initialization.
pub trait Initializer {
    /// Verify the type's code. Called at most once per type, with the type's
    /// monitor held; must not initialize other types.
    fn verify(&self, ty: &TypeRecord) -> Result<(), InitFailure>;

    /// Run the static initializer. The supertype is already initialized.
    fn run_static_initializer(&self, ty: &TypeRecord) -> Result<(), InitFailure>;
}

/// Initialization state of one type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InitState {
    Prepared,
    Verified,
    Initializing(ThreadId),
    Initialized,
    Failed(InitFailure),
}

#[derive(Debug)]
pub(crate) struct InitMonitor {
    state: Mutex<InitState>,
    changed: Condvar,
}

impl InitMonitor {
    pub(crate) fn new(state: InitState) -> Self {
        Self {
            state: Mutex::new(state),
            changed: Condvar::new(),
        }
    }

    pub(crate) fn state(&self) -> InitState {
        self.state.lock().clone()
    }

    fn finish(&self, state: InitState) {
        *self.state.lock() = state;
        self.changed.notify_all();
    }
}

/// Outcome of inspecting the monitor.
enum Claim {
    Done,
    Claimed,
}

impl TypeRecord {
    /// Current initialization state.
    pub fn init_state(&self) -> InitState {
        self.init.state()
    }

    pub fn is_initialized(&self) -> bool {
        self.init_state() == InitState::Initialized
    }

    /// Initialize this type (superclasses first), running its static
    /// initializer through `initializer` if no thread has done so yet.
    ///
    /// Blocks while another thread is initializing the type. Returns
    /// immediately when called re-entrantly by the initializing thread.
    pub fn initialize(&self, initializer: &dyn Initializer) -> Result<(), InitError> {
        ensure_sufficient_stack(|| self.initialize_inner(initializer))
    }

    fn initialize_inner(&self, initializer: &dyn Initializer) -> Result<(), InitError> {
        let me = thread::current().id();

        match self.claim(me, initializer)? {
            Claim::Done => return Ok(()),
            Claim::Claimed => {}
        }

        tracing::debug!(ty = self.id().raw(), name = self.name_str(), "initializing");

        if let Some(supertype) = self.supertype().filter(|_| !self.is_interface()) {
            if let Err(err) = supertype.initialize(initializer) {
                self.init.finish(InitState::Failed(err.failure().clone()));
                return Err(err);
            }
        }

        match initializer.run_static_initializer(self) {
            Ok(()) => {
                self.init.finish(InitState::Initialized);
                Ok(())
            }
            Err(failure) => {
                tracing::debug!(
                    ty = self.id().raw(),
                    failure = %failure,
                    "static initializer failed"
                );
                self.init.finish(InitState::Failed(failure.clone()));
                Err(InitError::InitializerFailed {
                    ty: self.name_str(),
                    failure,
                })
            }
        }
    }

    /// Wait until the type is free, then either report its final state or
    /// claim it for the current thread.
    fn claim(&self, me: ThreadId, initializer: &dyn Initializer) -> Result<Claim, InitError> {
        let mut state = self.init.state.lock();
        loop {
            match &*state {
                InitState::Initialized => return Ok(Claim::Done),
                InitState::Initializing(owner) if *owner == me => return Ok(Claim::Done),
                InitState::Initializing(_) => self.init.changed.wait(&mut state),
                InitState::Failed(failure) => {
                    return Err(InitError::NoClassDefFound {
                        ty: self.name_str(),
                        failure: failure.clone(),
                    })
                }
                InitState::Prepared => match initializer.verify(self) {
                    Ok(()) => *state = InitState::Verified,
                    Err(failure) => {
                        *state = InitState::Failed(failure.clone());
                        self.init.changed.notify_all();
                        return Err(InitError::VerificationFailed {
                            ty: self.name_str(),
                            failure,
                        });
                    }
                },
                InitState::Verified => {
                    *state = InitState::Initializing(me);
                    return Ok(Claim::Claimed);
                }
            }
        }
    }
}
