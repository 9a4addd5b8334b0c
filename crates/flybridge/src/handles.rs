//! # Identities crossing the boundary
//!
//! Strong types for the integers and names the host and guest exchange.
//! None of these own a resource: element ids belong to the guest, window
//! handles to the host, and method handles to the symbol cache.

use std::fmt;
use std::sync::Arc;

/// Identity of a remotely-rendered UI element. Assigned by the guest.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct ElementId(pub i32);

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element-{}", self.0)
    }
}

/// Identity of a host-owned popup window.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct WindowHandle(pub i32);

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

/// Structured name of a guest callable.
///
/// Arity is deliberately absent: lookups match any overload count, so
/// method names must be unique within their type.
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct MethodKey {
    pub assembly: String,
    pub namespace: String,
    pub type_name: String,
    pub method: String,
}

impl MethodKey {
    pub fn new(
        assembly: impl Into<String>,
        namespace: impl Into<String>,
        type_name: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        Self {
            assembly: assembly.into(),
            namespace: namespace.into(),
            type_name: type_name.into(),
            method: method.into(),
        }
    }

    /// The symbol a guest exports for this method: `Namespace.Type::Method`.
    pub fn symbol(&self) -> String {
        format!("{}.{}::{}", self.namespace, self.type_name, self.method)
    }
}

impl fmt::Display for MethodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.assembly, self.symbol())
    }
}

/// A resolved guest callable.
///
/// Produced by a `GuestRuntime` lookup and owned by the symbol cache.
/// `slot` is the runtime's own index for the callable; it is only
/// meaningful to the runtime that produced it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GuestMethodHandle {
    key: Arc<MethodKey>,
    arity: usize,
    slot: usize,
}

impl GuestMethodHandle {
    pub fn new(key: MethodKey, arity: usize, slot: usize) -> Self {
        Self {
            key: Arc::new(key),
            arity,
            slot,
        }
    }

    pub fn key(&self) -> &MethodKey {
        &self.key
    }

    /// Number of raw parameters the guest declares.
    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn slot(&self) -> usize {
        self.slot
    }
}
