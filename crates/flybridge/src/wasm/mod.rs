//! # WebAssembly guest
//!
//! A `GuestRuntime` backed by wasmtime. The guest is a core module that
//! exports its linear memory, an allocator, and its interop methods as
//! `Namespace.Type::Method`. Imports are bound under module `env`.

pub mod context;
pub mod guest;
pub mod memory;

pub use context::BridgeCtx;
pub use guest::WasmGuest;
