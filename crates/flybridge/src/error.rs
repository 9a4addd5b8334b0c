//! # Error Definitions
//!
//! The bridge-level failure taxonomy. Module errors (`MarshalError`,
//! `BootstrapError`) fold into it at the export boundary.
//!
//! Only `GuestFault` is recoverable: one failing UI callback must not end the
//! host session. Everything else means the guest can no longer be used.
//! Marshalling errors that leave guest memory intact (see
//! `MarshalError::is_fatal`) are reported as the faulting call's `GuestFault`.

use std::fmt;

use crate::bootstrap::BootstrapError;
use crate::handles::MethodKey;
use crate::marshal::MarshalError;

/// An uncaught fault raised by guest code during an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuestFault {
    pub method: MethodKey,
    /// Whatever diagnostic text the guest fault exposed.
    pub message: String,
}

impl fmt::Display for GuestFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} faulted: {}", self.method, self.message)
    }
}

impl std::error::Error for GuestFault {}

#[derive(Debug, Clone)]
pub enum Error {
    /// No guest callable matches the key. Fatal.
    SymbolNotFound(MethodKey),
    /// The guest raised during a call. Recoverable.
    GuestFault(GuestFault),
    /// Guest memory disagreed with a declared buffer. Fatal.
    Marshal(MarshalError),
    /// The embedded runtime did not start. Fatal.
    Bootstrap(BootstrapError),
}

impl Error {
    /// Whether the guest must be considered unusable after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::GuestFault(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SymbolNotFound(key) => write!(f, "Symbol not found: {}", key),
            Self::GuestFault(fault) => write!(f, "Guest fault: {}", fault),
            Self::Marshal(e) => write!(f, "Marshalling error: {}", e),
            Self::Bootstrap(e) => write!(f, "Bootstrap failure: {}", e),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::SymbolNotFound(_) => None,
            Self::GuestFault(fault) => Some(fault),
            Self::Marshal(e) => Some(e),
            Self::Bootstrap(e) => Some(e),
        }
    }
}

impl From<GuestFault> for Error {
    fn from(fault: GuestFault) -> Self {
        Self::GuestFault(fault)
    }
}

impl From<MarshalError> for Error {
    fn from(e: MarshalError) -> Self {
        Self::Marshal(e)
    }
}

impl From<BootstrapError> for Error {
    fn from(e: BootstrapError) -> Self {
        Self::Bootstrap(e)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
