//! Guest memory views over a wasmtime store.
//!
//! The same view serves both directions: over the `Store` when the host
//! marshals arguments for an export, and over the `Caller` when an import
//! decodes what the guest passed in.

use wasmtime::AsContextMut;
use wasmtime::Caller;
use wasmtime::Extern;
use wasmtime::Instance;
use wasmtime::Memory;
use wasmtime::Store;
use wasmtime::TypedFunc;

use crate::marshal;
use crate::marshal::GuestMemory;
use crate::marshal::MarshalError;
use crate::wasm::context::BridgeCtx;

pub struct WasmMemory<C> {
    cx: C,
    memory: Option<Memory>,
    alloc: Option<TypedFunc<i32, i32>>,
    free: Option<TypedFunc<i32, ()>>,
}

impl<'a> WasmMemory<&'a mut Store<BridgeCtx>> {
    pub fn for_instance(store: &'a mut Store<BridgeCtx>, instance: &Instance) -> Self {
        let names = store.data().exports.clone();
        let memory = instance.get_memory(&mut *store, &names.memory);
        let alloc = instance
            .get_typed_func::<i32, i32>(&mut *store, &names.alloc)
            .ok();
        let free = instance
            .get_typed_func::<i32, ()>(&mut *store, &names.free)
            .ok();
        Self {
            cx: store,
            memory,
            alloc,
            free,
        }
    }
}

impl<'a, 'b> WasmMemory<&'a mut Caller<'b, BridgeCtx>> {
    pub fn for_caller(caller: &'a mut Caller<'b, BridgeCtx>) -> Self {
        let names = caller.data().exports.clone();
        let memory = caller
            .get_export(&names.memory)
            .and_then(Extern::into_memory);
        let alloc = caller
            .get_export(&names.alloc)
            .and_then(Extern::into_func)
            .and_then(|func| func.typed::<i32, i32>(&*caller).ok());
        let free = caller
            .get_export(&names.free)
            .and_then(Extern::into_func)
            .and_then(|func| func.typed::<i32, ()>(&*caller).ok());
        Self {
            cx: caller,
            memory,
            alloc,
            free,
        }
    }
}

impl<C: AsContextMut<Data = BridgeCtx>> GuestMemory for WasmMemory<C> {
    fn alloc(&mut self, len: u32) -> marshal::Result<u32> {
        let alloc = self
            .alloc
            .as_ref()
            .ok_or_else(|| MarshalError::Alloc("guest exports no allocator".to_string()))?;
        let ptr = alloc
            .call(&mut self.cx, len as i32)
            .map_err(|e| MarshalError::AllocatorTrap(format!("malloc({len}): {e:#}")))?;
        Ok(ptr as u32)
    }

    fn release(&mut self, ptr: u32) -> marshal::Result<()> {
        // Bump allocators export no `free`; their buffers are never reclaimed.
        let Some(free) = &self.free else {
            return Ok(());
        };
        free.call(&mut self.cx, ptr as i32)
            .map_err(|e| MarshalError::AllocatorTrap(format!("free({ptr:#x}): {e:#}")))
    }

    fn bytes(&self) -> &[u8] {
        match self.memory {
            Some(memory) => memory.data(&self.cx),
            None => &[],
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match self.memory {
            Some(memory) => memory.data_mut(&mut self.cx),
            None => &mut [],
        }
    }
}
