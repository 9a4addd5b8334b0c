//! # Runtime Bootstrap
//!
//! Starts the guest exactly once and binds every import before any guest
//! code can run.
//!
//! ```text
//! Uninitialized --start--> Registering --register imports, launch--> Initialized
//!       |                       |
//!       `-----------------------`--(any failure)--> Failed
//! ```
//!
//! A second bootstrap while `Initialized` is a no-op. Failure is permanent:
//! no guest, no bridge.

use std::fmt;

use crate::config::InteropNames;
use crate::guest::GuestRuntime;
use crate::imports::ImportFn;
use crate::imports::ImportTable;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapError {
    /// The runtime could not be created (engine, module, store).
    Start(String),
    /// An import could not be bound.
    Register { import: &'static str, reason: String },
    /// Instantiation or guest start-up code failed.
    Launch(String),
    /// A guest operation was attempted before the runtime existed.
    NotStarted,
    /// An earlier bootstrap attempt failed; the runtime is unusable.
    PreviouslyFailed,
}

impl fmt::Display for BootstrapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Start(msg) => write!(f, "Runtime failed to start: {}", msg),
            Self::Register { import, reason } => {
                write!(f, "Failed to register import '{}': {}", import, reason)
            }
            Self::Launch(msg) => write!(f, "Guest failed to launch: {}", msg),
            Self::NotStarted => write!(f, "Guest runtime not started"),
            Self::PreviouslyFailed => write!(f, "Runtime failed to start earlier"),
        }
    }
}

impl std::error::Error for BootstrapError {}

pub type Result<T> = std::result::Result<T, BootstrapError>;

/// Process-scoped runtime lifecycle.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RuntimeState {
    Uninitialized,
    Registering,
    Initialized,
    Failed,
}

/// Drives a `GuestRuntime` from `Uninitialized` to `Initialized` once.
#[derive(Debug)]
pub struct Bootstrap {
    state: RuntimeState,
}

impl Bootstrap {
    pub fn new() -> Self {
        Self {
            state: RuntimeState::Uninitialized,
        }
    }

    pub fn state(&self) -> RuntimeState {
        self.state
    }

    pub fn is_initialized(&self) -> bool {
        self.state == RuntimeState::Initialized
    }

    /// Brings the guest up if it is not already. Idempotent.
    pub fn ensure<G: GuestRuntime>(
        &mut self,
        guest: &mut G,
        imports: &ImportTable,
        names: &InteropNames,
    ) -> Result<()> {
        match self.state {
            RuntimeState::Initialized => return Ok(()),
            // Still `Registering` here means an earlier attempt unwound midway.
            RuntimeState::Failed | RuntimeState::Registering => {
                return Err(BootstrapError::PreviouslyFailed);
            }
            RuntimeState::Uninitialized => {}
        }

        match Self::run(&mut self.state, guest, imports, names) {
            Ok(()) => {
                self.state = RuntimeState::Initialized;
                tracing::info!("guest runtime initialized");
                Ok(())
            }
            Err(e) => {
                self.state = RuntimeState::Failed;
                tracing::error!(error = %e, "guest runtime failed to start");
                Err(e)
            }
        }
    }

    fn run<G: GuestRuntime>(
        state: &mut RuntimeState,
        guest: &mut G,
        imports: &ImportTable,
        names: &InteropNames,
    ) -> Result<()> {
        tracing::info!(assembly = %names.assembly, "starting guest runtime");
        guest.start(imports)?;
        *state = RuntimeState::Registering;

        for import in ImportFn::ALL {
            guest.register_import(import)?;
            tracing::debug!(internal_call = %import.internal_call(names), "registered import");
        }

        guest.launch()
    }
}

impl Default for Bootstrap {
    fn default() -> Self {
        Self::new()
    }
}
