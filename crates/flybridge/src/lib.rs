//! # flybridge
//!
//! Interop bridge between a host application and a sandboxed, single-threaded
//! guest runtime. The host drives the guest through three exports; the guest
//! calls back through a fixed import table; UI elements are driven remotely
//! through subscriptions, raised events and state blobs.

pub mod bootstrap;
pub mod bridge;
pub mod config;
pub mod error;
pub mod guest;
pub mod handles;
pub mod host;
pub mod imports;
pub mod invoke;
pub mod logging;
pub mod marshal;
pub mod protocol;
pub mod symbols;
pub mod wasm;

pub use bootstrap::{Bootstrap, BootstrapError, RuntimeState};
pub use bridge::{Bridge, Export};
pub use config::{BridgeConfig, InteropNames, ModuleSource, WasmGuestConfig};
pub use error::{Error, GuestFault, Result};
pub use guest::{CallError, GuestRuntime};
pub use handles::{ElementId, GuestMethodHandle, MethodKey, WindowHandle};
pub use host::{Host, MemoryHost, Window};
pub use imports::{ImportFn, ImportTable};
pub use invoke::GuestArg;
pub use marshal::{GuestMemory, MarshalError, MarshalledBuffer};
pub use protocol::{EventSubscriptions, LayoutProtocol};
pub use symbols::SymbolCache;
pub use wasm::WasmGuest;

#[cfg(test)]
mod mock_guest;
