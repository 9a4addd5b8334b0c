//! # Export Surface
//!
//! The functions a host calls into the bridge: `load`, `initialize` and
//! `raise_element_event`. Each one makes sure the runtime is bootstrapped,
//! resolves its guest entry point through the symbol cache, and invokes it.
//!
//! The bridge owns all process-scoped state (runtime lifecycle, symbol
//! cache, import table). `&mut self` on every export keeps it single-writer;
//! hosts that share a bridge across threads wrap it in a mutex.

use std::sync::Arc;

use crate::bootstrap::Bootstrap;
use crate::bootstrap::RuntimeState;
use crate::config::BridgeConfig;
use crate::config::InteropNames;
use crate::error::Result;
use crate::guest::GuestRuntime;
use crate::handles::ElementId;
use crate::host::Host;
use crate::imports::ImportTable;
use crate::invoke;
use crate::invoke::GuestArg;
use crate::protocol::LayoutProtocol;
use crate::symbols::SymbolCache;

/// The host-callable entry points.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum Export {
    Load,
    Initialize,
    RaiseElementEvent,
}

impl Export {
    /// Name the host knows the export by.
    pub fn name(self) -> &'static str {
        match self {
            Self::Load => "load",
            Self::Initialize => "initialize",
            Self::RaiseElementEvent => "raise_element_event",
        }
    }

    /// Guest interop method the export invokes.
    pub fn guest_method(self) -> &'static str {
        match self {
            Self::Load => "Load",
            Self::Initialize => "Initialize",
            Self::RaiseElementEvent => "EventRaised",
        }
    }
}

pub struct Bridge<G: GuestRuntime> {
    guest: G,
    names: InteropNames,
    bootstrap: Bootstrap,
    symbols: SymbolCache,
    imports: ImportTable,
}

impl<G: GuestRuntime> Bridge<G> {
    pub fn new(guest: G, host: Arc<dyn Host>) -> Self {
        Self::with_config(guest, host, BridgeConfig::default())
    }

    pub fn with_config(guest: G, host: Arc<dyn Host>, config: BridgeConfig) -> Self {
        Self::from_parts(
            guest,
            ImportTable::new(host),
            SymbolCache::new(),
            Bootstrap::new(),
            config,
        )
    }

    /// Assembles a bridge from explicitly constructed state.
    pub fn from_parts(
        guest: G,
        imports: ImportTable,
        symbols: SymbolCache,
        bootstrap: Bootstrap,
        config: BridgeConfig,
    ) -> Self {
        Self {
            guest,
            names: config.interop,
            bootstrap,
            symbols,
            imports,
        }
    }

    pub fn state(&self) -> RuntimeState {
        self.bootstrap.state()
    }

    pub fn names(&self) -> &InteropNames {
        &self.names
    }

    pub fn symbols(&self) -> &SymbolCache {
        &self.symbols
    }

    pub fn layout(&self) -> &LayoutProtocol {
        self.imports.layout()
    }

    pub fn guest(&self) -> &G {
        &self.guest
    }

    pub fn guest_mut(&mut self) -> &mut G {
        &mut self.guest
    }

    /// Starts the guest and registers imports, once.
    pub fn bootstrap(&mut self) -> Result<()> {
        self.bootstrap
            .ensure(&mut self.guest, &self.imports, &self.names)?;
        Ok(())
    }

    /// Bootstraps if needed, then runs the guest's `Load`.
    pub fn load(&mut self) -> Result<()> {
        self.call_export(Export::Load, &[]).map(drop)
    }

    /// Runs the guest's `Initialize`.
    pub fn initialize(&mut self) -> Result<()> {
        self.call_export(Export::Initialize, &[]).map(drop)
    }

    /// Delivers a UI event to the guest's `EventRaised`.
    ///
    /// Subscriptions are not consulted; see `LayoutProtocol::is_subscribed`.
    pub fn raise_element_event(&mut self, element: ElementId, event: &str) -> Result<()> {
        self.call_export(
            Export::RaiseElementEvent,
            &[GuestArg::Int(element.0), GuestArg::Text(event)],
        )
        .map(drop)
    }

    /// Calls an arbitrary method on the interop type.
    pub fn invoke_interop(&mut self, method: &str, args: &[GuestArg<'_>]) -> Result<Option<i32>> {
        self.bootstrap()?;
        let key = self.names.method(method);
        let handle = self.symbols.resolve(&mut self.guest, &key)?;
        invoke::invoke(&mut self.guest, &handle, args)
    }

    fn call_export(&mut self, export: Export, args: &[GuestArg<'_>]) -> Result<Option<i32>> {
        tracing::debug!(export = export.name(), "export called");
        self.invoke_interop(export.guest_method(), args)
    }
}
