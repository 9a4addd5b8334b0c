//! Store context for the guest instance.

use wasmtime_wasi::p1::WasiP1Ctx;

use crate::config::WasmGuestConfig;
use crate::imports::ImportTable;

/// Names of the guest exports the marshalling layer relies on.
#[derive(Clone, Debug)]
pub struct ExportNames {
    pub memory: String,
    pub alloc: String,
    pub free: String,
}

impl ExportNames {
    pub fn from_config(config: &WasmGuestConfig) -> Self {
        Self {
            memory: config.memory_export.clone(),
            alloc: config.alloc_export.clone(),
            free: config.free_export.clone(),
        }
    }
}

/// Per-instance state stored in wasmtime's `Store`.
///
/// Import bindings reach the host through `imports`; they clone it out of
/// the store before touching guest memory.
pub struct BridgeCtx {
    pub(crate) imports: ImportTable,
    pub(crate) exports: ExportNames,
    pub(crate) wasi: WasiP1Ctx,
}

impl BridgeCtx {
    pub fn new(imports: ImportTable, exports: ExportNames, wasi: WasiP1Ctx) -> Self {
        Self {
            imports,
            exports,
            wasi,
        }
    }
}
