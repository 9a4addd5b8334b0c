//! # Configuration
//!
//! Builder-style settings for the bridge and the wasmtime guest.

use std::path::PathBuf;

use crate::handles::MethodKey;

/// Where the guest's interop entry points and native imports live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InteropNames {
    pub assembly: String,
    pub namespace: String,
    /// Type holding `Load`, `Initialize` and `EventRaised`.
    pub type_name: String,
    /// Type the imports are bound to as internal calls.
    pub native_type: String,
}

impl InteropNames {
    pub fn new(
        assembly: impl Into<String>,
        namespace: impl Into<String>,
        type_name: impl Into<String>,
    ) -> Self {
        Self {
            assembly: assembly.into(),
            namespace: namespace.into(),
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    pub fn native_type(mut self, native_type: impl Into<String>) -> Self {
        self.native_type = native_type.into();
        self
    }

    /// Key of an interop method on the configured type.
    pub fn method(&self, method: &str) -> MethodKey {
        MethodKey::new(
            self.assembly.clone(),
            self.namespace.clone(),
            self.type_name.clone(),
            method,
        )
    }
}

impl Default for InteropNames {
    fn default() -> Self {
        Self {
            assembly: "PixiEditor.Extensions.Sdk".to_string(),
            namespace: "PixiEditor.Extensions.Sdk.Bridge".to_string(),
            type_name: "Interop".to_string(),
            native_type: "Native".to_string(),
        }
    }
}

/// Settings for the export surface.
#[derive(Clone, Debug, Default)]
pub struct BridgeConfig {
    pub interop: InteropNames,
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn interop(mut self, interop: InteropNames) -> Self {
        self.interop = interop;
        self
    }
}

/// Where the guest module comes from.
#[derive(Clone, Debug)]
pub enum ModuleSource {
    /// A `.wasm` (or `.wat`) file on disk.
    File(PathBuf),
    /// Binary wasm or WAT text held in memory.
    Bytes(Vec<u8>),
}

/// Settings for `WasmGuest`.
#[derive(Clone, Debug)]
pub struct WasmGuestConfig {
    pub source: ModuleSource,
    /// Assembly this module serves. Keys naming another assembly never resolve.
    pub assembly: String,
    pub wasi: bool,
    pub inherit_stdio: bool,
    pub memory_export: String,
    pub alloc_export: String,
    pub free_export: String,
}

impl WasmGuestConfig {
    pub fn new(source: ModuleSource) -> Self {
        Self {
            source,
            assembly: InteropNames::default().assembly,
            wasi: true,
            inherit_stdio: true,
            memory_export: "memory".to_string(),
            alloc_export: "malloc".to_string(),
            free_export: "free".to_string(),
        }
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::new(ModuleSource::File(path.into()))
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(ModuleSource::Bytes(bytes.into()))
    }

    pub fn assembly(mut self, assembly: impl Into<String>) -> Self {
        self.assembly = assembly.into();
        self
    }

    pub fn wasi(mut self, enabled: bool) -> Self {
        self.wasi = enabled;
        self
    }

    pub fn inherit_stdio(mut self, inherit: bool) -> Self {
        self.inherit_stdio = inherit;
        self
    }

    pub fn memory_export(mut self, name: impl Into<String>) -> Self {
        self.memory_export = name.into();
        self
    }

    pub fn alloc_export(mut self, name: impl Into<String>) -> Self {
        self.alloc_export = name.into();
        self
    }

    pub fn free_export(mut self, name: impl Into<String>) -> Self {
        self.free_export = name.into();
        self
    }
}
