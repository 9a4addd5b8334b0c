//! The wasmtime-backed `GuestRuntime`.

use std::iter;

use wasmtime::Caller;
use wasmtime::Engine;
use wasmtime::Func;
use wasmtime::FuncType;
use wasmtime::Instance;
use wasmtime::Linker;
use wasmtime::Module;
use wasmtime::Store;
use wasmtime::Val;
use wasmtime::ValType;
use wasmtime_wasi::WasiCtxBuilder;

use crate::bootstrap::BootstrapError;
use crate::config::ModuleSource;
use crate::config::WasmGuestConfig;
use crate::guest::CallError;
use crate::guest::GuestRuntime;
use crate::handles::GuestMethodHandle;
use crate::handles::MethodKey;
use crate::imports::ImportFn;
use crate::imports::ImportTable;
use crate::marshal::GuestMemory;
use crate::marshal::MarshalError;
use crate::wasm::context::BridgeCtx;
use crate::wasm::context::ExportNames;
use crate::wasm::memory::WasmMemory;

/// Module import namespace the guest links its host functions from.
pub const IMPORT_MODULE: &str = "env";

/// Exported by WASI reactors; run once at launch.
const REACTOR_INIT: &str = "_initialize";

/// Compiled module, linker and store between `start` and `launch`.
struct Loaded {
    module: Module,
    linker: Linker<BridgeCtx>,
    store: Store<BridgeCtx>,
}

/// A WebAssembly guest hosting one assembly.
///
/// Wasmtime's `Store` is single-threaded; the guest is driven strictly by
/// call and return from whoever owns the bridge.
pub struct WasmGuest {
    config: WasmGuestConfig,
    engine: Engine,
    loaded: Option<Loaded>,
    instance: Option<Instance>,
    /// Resolved exports, indexed by `GuestMethodHandle::slot`.
    methods: Vec<Func>,
}

impl WasmGuest {
    /// Creates a guest with a default engine.
    pub fn new(config: WasmGuestConfig) -> Self {
        Self::with_engine(Engine::default(), config)
    }

    /// Creates a guest with a custom engine configuration.
    pub fn with_engine(engine: Engine, config: WasmGuestConfig) -> Self {
        Self {
            config,
            engine,
            loaded: None,
            instance: None,
            methods: Vec::new(),
        }
    }

    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    pub fn config(&self) -> &WasmGuestConfig {
        &self.config
    }

    fn compile(&self) -> wasmtime::Result<Module> {
        match &self.config.source {
            ModuleSource::File(path) => Module::from_file(&self.engine, path),
            ModuleSource::Bytes(bytes) => Module::new(&self.engine, bytes),
        }
    }
}

impl GuestRuntime for WasmGuest {
    fn start(&mut self, imports: &ImportTable) -> Result<(), BootstrapError> {
        let module = self
            .compile()
            .map_err(|e| BootstrapError::Start(format!("{e:#}")))?;

        let mut linker = Linker::new(&self.engine);
        if self.config.wasi {
            wasmtime_wasi::p1::add_to_linker_sync(&mut linker, |cx: &mut BridgeCtx| &mut cx.wasi)
                .map_err(|e| BootstrapError::Start(format!("linking WASI: {e:#}")))?;
        }

        let mut wasi = WasiCtxBuilder::new();
        if self.config.inherit_stdio {
            wasi.inherit_stdio();
        }
        let ctx = BridgeCtx::new(
            imports.clone(),
            ExportNames::from_config(&self.config),
            wasi.build_p1(),
        );
        let store = Store::new(&self.engine, ctx);

        tracing::debug!(assembly = %self.config.assembly, "guest module compiled");
        self.loaded = Some(Loaded {
            module,
            linker,
            store,
        });
        Ok(())
    }

    fn register_import(&mut self, import: ImportFn) -> Result<(), BootstrapError> {
        let loaded = self.loaded.as_mut().ok_or(BootstrapError::NotStarted)?;
        let ty = FuncType::new(
            &self.engine,
            iter::repeat_n(ValType::I32, import.raw_params()),
            iter::repeat_n(ValType::I32, import.raw_results()),
        );

        loaded
            .linker
            .func_new(
                IMPORT_MODULE,
                import.name(),
                ty,
                move |mut caller: Caller<'_, BridgeCtx>, params: &[Val], results: &mut [Val]| {
                    let imports = caller.data().imports.clone();
                    let raw: Vec<i32> = params.iter().filter_map(Val::i32).collect();
                    let mut memory = WasmMemory::for_caller(&mut caller);
                    let value = imports
                        .dispatch(&mut memory, import, &raw)
                        .map_err(wasmtime::Error::new)?;
                    if let (Some(slot), Some(value)) = (results.first_mut(), value) {
                        *slot = Val::I32(value);
                    }
                    Ok(())
                },
            )
            .map_err(|e| BootstrapError::Register {
                import: import.name(),
                reason: format!("{e:#}"),
            })?;
        Ok(())
    }

    fn launch(&mut self) -> Result<(), BootstrapError> {
        let loaded = self.loaded.as_mut().ok_or(BootstrapError::NotStarted)?;
        let instance = loaded
            .linker
            .instantiate(&mut loaded.store, &loaded.module)
            .map_err(|e| BootstrapError::Launch(format!("{e:#}")))?;

        if let Ok(init) = instance.get_typed_func::<(), ()>(&mut loaded.store, REACTOR_INIT) {
            init.call(&mut loaded.store, ())
                .map_err(|e| BootstrapError::Launch(format!("{REACTOR_INIT}: {e:#}")))?;
        }

        self.instance = Some(instance);
        Ok(())
    }

    fn lookup_method(&mut self, key: &MethodKey) -> Option<GuestMethodHandle> {
        if key.assembly != self.config.assembly {
            return None;
        }
        let loaded = self.loaded.as_mut()?;
        let instance = self.instance?;
        let func = instance.get_func(&mut loaded.store, &key.symbol())?;
        let arity = func.ty(&loaded.store).params().len();

        self.methods.push(func);
        Some(GuestMethodHandle::new(key.clone(), arity, self.methods.len() - 1))
    }

    fn with_memory<R>(
        &mut self,
        f: impl FnOnce(&mut dyn GuestMemory) -> R,
    ) -> Result<R, MarshalError> {
        let (Some(loaded), Some(instance)) = (self.loaded.as_mut(), self.instance.as_ref()) else {
            return Err(MarshalError::NoMemory);
        };
        let mut memory = WasmMemory::for_instance(&mut loaded.store, instance);
        Ok(f(&mut memory))
    }

    fn call(&mut self, handle: &GuestMethodHandle, params: &[i32]) -> Result<Option<i32>, CallError> {
        let func = *self
            .methods
            .get(handle.slot())
            .ok_or_else(|| CallError::Fault(format!("no guest method in slot {}", handle.slot())))?;
        let loaded = self
            .loaded
            .as_mut()
            .ok_or_else(|| CallError::Fault("guest runtime not started".to_string()))?;

        let params: Vec<Val> = params.iter().map(|value| Val::I32(*value)).collect();
        let mut results = vec![Val::I32(0); func.ty(&loaded.store).results().len()];
        func.call(&mut loaded.store, &params, &mut results)
            .map_err(classify)?;

        Ok(results.first().and_then(Val::i32))
    }
}

/// Splits call failures into marshalling errors raised by host imports and
/// guest faults.
fn classify(err: wasmtime::Error) -> CallError {
    if let Some(marshal) = err.downcast_ref::<MarshalError>() {
        return CallError::Marshal(marshal.clone());
    }
    CallError::Fault(format!("{err:#}"))
}
