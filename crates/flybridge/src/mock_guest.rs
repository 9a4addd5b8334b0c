//! Scripted guest for testing.
//!
//! Used internally by the test suite and not part of the public API. Methods
//! are closures; they see their raw parameters, a bump-allocated heap, and
//! can call back into the host through the import table exactly like a real
//! guest would.

use crate::bootstrap::BootstrapError;
use crate::config::InteropNames;
use crate::guest::CallError;
use crate::guest::GuestRuntime;
use crate::handles::GuestMethodHandle;
use crate::handles::MethodKey;
use crate::imports::ImportFn;
use crate::imports::ImportTable;
use crate::invoke::GuestArg;
use crate::invoke::lower_args;
use crate::marshal;
use crate::marshal::GuestMemory;
use crate::marshal::MarshalError;
use crate::marshal::MarshalledBuffer;

pub type Script = Box<dyn FnMut(&mut MockCall<'_>) -> Result<Option<i32>, CallError>>;

/// Bump heap. Offsets below 8 are never handed out, so no buffer sits at 0.
pub struct MockHeap {
    bytes: Vec<u8>,
    pub allocations: usize,
    pub released: Vec<u32>,
}

impl MockHeap {
    pub fn new() -> Self {
        Self {
            bytes: vec![0; 8],
            allocations: 0,
            released: Vec::new(),
        }
    }
}

impl GuestMemory for MockHeap {
    fn alloc(&mut self, len: u32) -> marshal::Result<u32> {
        let ptr = self.bytes.len() as u32;
        self.bytes.resize(self.bytes.len() + len as usize, 0);
        self.allocations += 1;
        Ok(ptr)
    }

    fn release(&mut self, ptr: u32) -> marshal::Result<()> {
        self.released.push(ptr);
        Ok(())
    }

    fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        &mut self.bytes
    }
}

/// What a scripted method sees while it runs.
pub struct MockCall<'a> {
    pub params: &'a [i32],
    heap: &'a mut MockHeap,
    imports: &'a ImportTable,
}

impl MockCall<'_> {
    /// Decodes the text passed as `(params[index], params[index + 1])`.
    pub fn text(&self, index: usize) -> Result<String, CallError> {
        let buffer = MarshalledBuffer::from_raw(self.params[index], self.params[index + 1]);
        Ok(marshal::decode(&*self.heap, buffer)?)
    }

    /// Calls a host import the way compiled guest code would.
    pub fn import(&mut self, import: ImportFn, args: &[GuestArg<'_>]) -> Result<Option<i32>, CallError> {
        let lowered = lower_args(&mut *self.heap, args)?;
        Ok(self.imports.dispatch(&mut *self.heap, import, &lowered.params)?)
    }

    /// Calls a host import with hand-built raw parameters.
    pub fn import_raw(&mut self, import: ImportFn, params: &[i32]) -> Result<Option<i32>, MarshalError> {
        self.imports.dispatch(&mut *self.heap, import, params)
    }

    pub fn alloc(&mut self, len: u32) -> u32 {
        self.heap.alloc(len).unwrap_or(0)
    }

    pub fn read(&self, buffer: MarshalledBuffer) -> Result<Vec<u8>, MarshalError> {
        marshal::copy_out(&*self.heap, buffer)
    }

    pub fn read_u32(&self, ptr: u32) -> Result<u32, MarshalError> {
        let bytes = marshal::copy_out(&*self.heap, MarshalledBuffer::new(ptr, 4))?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

pub struct MockGuest {
    pub starts: u32,
    pub launches: u32,
    pub lookups: u32,
    pub registered: Vec<ImportFn>,
    /// Raw calls in order: method name and raw parameters.
    pub calls: Vec<(String, Vec<i32>)>,
    pub heap: MockHeap,
    fail_start: bool,
    panic_launch: bool,
    methods: Vec<(MethodKey, usize, Script)>,
    imports: Option<ImportTable>,
}

impl MockGuest {
    pub fn new() -> Self {
        Self {
            starts: 0,
            launches: 0,
            lookups: 0,
            registered: Vec::new(),
            calls: Vec::new(),
            heap: MockHeap::new(),
            fail_start: false,
            panic_launch: false,
            methods: Vec::new(),
            imports: None,
        }
    }

    /// A guest whose runtime refuses to start.
    pub fn failing_start() -> Self {
        Self {
            fail_start: true,
            ..Self::new()
        }
    }

    /// A guest that panics in start-up code, after its imports are bound.
    pub fn panicking_launch() -> Self {
        Self {
            panic_launch: true,
            ..Self::new()
        }
    }

    /// Adds a method on the default interop type.
    pub fn method(
        self,
        name: &str,
        arity: usize,
        script: impl FnMut(&mut MockCall<'_>) -> Result<Option<i32>, CallError> + 'static,
    ) -> Self {
        let key = InteropNames::default().method(name);
        self.method_on(key, arity, script)
    }

    pub fn method_on(
        mut self,
        key: MethodKey,
        arity: usize,
        script: impl FnMut(&mut MockCall<'_>) -> Result<Option<i32>, CallError> + 'static,
    ) -> Self {
        self.methods.push((key, arity, Box::new(script)));
        self
    }

    /// Raw parameters of every call made to `method`.
    pub fn calls_to(&self, method: &str) -> Vec<Vec<i32>> {
        self.calls
            .iter()
            .filter(|(name, _)| name == method)
            .map(|(_, params)| params.clone())
            .collect()
    }
}

impl GuestRuntime for MockGuest {
    fn start(&mut self, imports: &ImportTable) -> Result<(), BootstrapError> {
        if self.fail_start {
            return Err(BootstrapError::Start("scripted start failure".to_string()));
        }
        self.starts += 1;
        self.imports = Some(imports.clone());
        Ok(())
    }

    fn register_import(&mut self, import: ImportFn) -> Result<(), BootstrapError> {
        if self.imports.is_none() {
            return Err(BootstrapError::NotStarted);
        }
        self.registered.push(import);
        Ok(())
    }

    fn launch(&mut self) -> Result<(), BootstrapError> {
        if self.panic_launch {
            panic!("scripted launch panic");
        }
        self.launches += 1;
        Ok(())
    }

    fn lookup_method(&mut self, key: &MethodKey) -> Option<GuestMethodHandle> {
        self.lookups += 1;
        self.methods
            .iter()
            .position(|(candidate, _, _)| candidate == key)
            .map(|slot| GuestMethodHandle::new(key.clone(), self.methods[slot].1, slot))
    }

    fn with_memory<R>(
        &mut self,
        f: impl FnOnce(&mut dyn GuestMemory) -> R,
    ) -> Result<R, MarshalError> {
        Ok(f(&mut self.heap))
    }

    fn call(&mut self, handle: &GuestMethodHandle, params: &[i32]) -> Result<Option<i32>, CallError> {
        let imports = self
            .imports
            .as_ref()
            .ok_or_else(|| CallError::Fault("guest not started".to_string()))?;
        let (key, _, script) = self
            .methods
            .get_mut(handle.slot())
            .ok_or_else(|| CallError::Fault(format!("no method in slot {}", handle.slot())))?;
        self.calls.push((key.method.clone(), params.to_vec()));

        let mut call = MockCall {
            params,
            heap: &mut self.heap,
            imports,
        };
        script(&mut call)
    }
}
