//! # Symbol Resolution Cache
//!
//! Maps a `MethodKey` to the guest handle it resolved to. Resolution is lazy
//! (first use) and validated eagerly: a missing symbol fails immediately with
//! `SymbolNotFound` and nothing is cached for it.
//!
//! Entries are never invalidated. A guest fault during a later call leaves
//! the cache untouched.

use std::collections::HashMap;

use crate::error::Error;
use crate::error::Result;
use crate::guest::GuestRuntime;
use crate::handles::GuestMethodHandle;
use crate::handles::MethodKey;

#[derive(Debug, Default)]
pub struct SymbolCache {
    handles: HashMap<MethodKey, GuestMethodHandle>,
}

impl SymbolCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached handle for `key`, asking the guest on first use.
    pub fn resolve<G: GuestRuntime>(
        &mut self,
        guest: &mut G,
        key: &MethodKey,
    ) -> Result<GuestMethodHandle> {
        if let Some(handle) = self.handles.get(key) {
            return Ok(handle.clone());
        }

        let handle = guest
            .lookup_method(key)
            .ok_or_else(|| Error::SymbolNotFound(key.clone()))?;
        tracing::debug!(%key, arity = handle.arity(), "resolved guest method");
        self.handles.insert(key.clone(), handle.clone());
        Ok(handle)
    }

    pub fn get(&self, key: &MethodKey) -> Option<&GuestMethodHandle> {
        self.handles.get(key)
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}
