//! # Guest runtime seam
//!
//! Everything the bridge needs from an embedded runtime, and nothing more.
//! The bridge is written against this trait; `WasmGuest` is the production
//! implementation.

use std::fmt;

use crate::bootstrap::BootstrapError;
use crate::handles::GuestMethodHandle;
use crate::handles::MethodKey;
use crate::imports::ImportFn;
use crate::imports::ImportTable;
use crate::marshal::GuestMemory;
use crate::marshal::MarshalError;

/// How a raw guest call failed.
#[derive(Debug, Clone)]
pub enum CallError {
    /// The guest raised an uncaught fault. Carries its diagnostic text.
    Fault(String),
    /// An import called during the guest call hit corrupted memory.
    Marshal(MarshalError),
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fault(msg) => write!(f, "Guest fault: {}", msg),
            Self::Marshal(e) => write!(f, "Marshalling failed during call: {}", e),
        }
    }
}

impl std::error::Error for CallError {}

impl From<MarshalError> for CallError {
    fn from(e: MarshalError) -> Self {
        Self::Marshal(e)
    }
}

/// An embedded, single-threaded guest runtime.
///
/// # Call order
///
/// `start` once, then `register_import` for every import, then `launch`.
/// Only after `launch` may `lookup_method`, `with_memory`, or `call` be used.
/// `Bootstrap` enforces this order.
pub trait GuestRuntime {
    /// Creates the runtime. `imports` is the table every bound import
    /// dispatches into.
    fn start(&mut self, imports: &ImportTable) -> Result<(), BootstrapError>;

    /// Binds one import into the guest's internal-call table.
    fn register_import(&mut self, import: ImportFn) -> Result<(), BootstrapError>;

    /// Instantiates the guest. The first point at which guest code runs.
    fn launch(&mut self) -> Result<(), BootstrapError>;

    /// Looks up a callable by name, any arity. `None` if it does not exist.
    fn lookup_method(&mut self, key: &MethodKey) -> Option<GuestMethodHandle>;

    /// Runs `f` with access to guest memory.
    fn with_memory<R>(
        &mut self,
        f: impl FnOnce(&mut dyn GuestMemory) -> R,
    ) -> Result<R, MarshalError>;

    /// Calls a resolved callable with raw, already-marshalled parameters.
    fn call(&mut self, handle: &GuestMethodHandle, params: &[i32]) -> Result<Option<i32>, CallError>;
}
