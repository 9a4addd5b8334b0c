//! # Import Surface
//!
//! The fixed set of host functions a guest may call. Each import has a raw
//! signature in the guest call convention (one `i32` per integer, two per
//! buffer) and a dispatcher that decodes raw parameters through the
//! marshalling layer before handing host-native values to the `Host`.
//!
//! The same `dispatch` serves every runtime: `WasmGuest` calls it from its
//! linker bindings, the test guest calls it directly.

use std::sync::Arc;

use crate::config::InteropNames;
use crate::handles::ElementId;
use crate::handles::WindowHandle;
use crate::host::Host;
use crate::marshal;
use crate::marshal::GuestMemory;
use crate::marshal::MarshalError;
use crate::marshal::MarshalledBuffer;
use crate::protocol::LayoutProtocol;

/// One guest-callable host function.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub enum ImportFn {
    LogMessage,
    CreatePopupWindow,
    SetWindowTitle,
    GetWindowTitle,
    ShowWindow,
    CloseWindow,
    SubscribeToEvent,
    StateChanged,
}

impl ImportFn {
    /// Every import, in registration order.
    pub const ALL: [ImportFn; 8] = [
        ImportFn::LogMessage,
        ImportFn::CreatePopupWindow,
        ImportFn::SetWindowTitle,
        ImportFn::GetWindowTitle,
        ImportFn::ShowWindow,
        ImportFn::CloseWindow,
        ImportFn::SubscribeToEvent,
        ImportFn::StateChanged,
    ];

    /// Name the guest imports this function under.
    pub fn name(self) -> &'static str {
        match self {
            Self::LogMessage => "log_message",
            Self::CreatePopupWindow => "create_popup_window",
            Self::SetWindowTitle => "set_window_title",
            Self::GetWindowTitle => "get_window_title",
            Self::ShowWindow => "show_window",
            Self::CloseWindow => "close_window",
            Self::SubscribeToEvent => "subscribe_to_event",
            Self::StateChanged => "state_changed",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|import| import.name() == name)
    }

    /// Raw parameter count.
    pub fn raw_params(self) -> usize {
        match self {
            Self::LogMessage => 2,
            Self::CreatePopupWindow => 4,
            Self::SetWindowTitle => 3,
            Self::GetWindowTitle => 2,
            Self::ShowWindow | Self::CloseWindow => 1,
            Self::SubscribeToEvent | Self::StateChanged => 3,
        }
    }

    /// Raw result count (0 or 1).
    pub fn raw_results(self) -> usize {
        match self {
            Self::CreatePopupWindow | Self::GetWindowTitle => 1,
            _ => 0,
        }
    }

    /// Qualified internal-call name, e.g. `Ns.Native::log_message`.
    pub fn internal_call(self, names: &InteropNames) -> String {
        format!("{}.{}::{}", names.namespace, names.native_type, self.name())
    }
}

/// Raw parameters of one import call.
struct RawArgs<'a> {
    import: ImportFn,
    params: &'a [i32],
}

impl RawArgs<'_> {
    fn int(&self, index: usize) -> marshal::Result<i32> {
        self.params
            .get(index)
            .copied()
            .ok_or(MarshalError::MissingArgument {
                import: self.import.name(),
                index,
            })
    }

    fn buffer(&self, index: usize) -> marshal::Result<MarshalledBuffer> {
        Ok(MarshalledBuffer::from_raw(self.int(index)?, self.int(index + 1)?))
    }
}

/// Dispatch target for every import: the host plus the layout protocol.
///
/// Cheap to clone; clones share the same host and subscriptions.
#[derive(Clone)]
pub struct ImportTable {
    host: Arc<dyn Host>,
    layout: LayoutProtocol,
}

impl ImportTable {
    pub fn new(host: Arc<dyn Host>) -> Self {
        let layout = LayoutProtocol::new(host.clone());
        Self { host, layout }
    }

    pub fn host(&self) -> &Arc<dyn Host> {
        &self.host
    }

    pub fn layout(&self) -> &LayoutProtocol {
        &self.layout
    }

    /// Decodes a raw import call and runs it against the host.
    ///
    /// Returns the raw result for imports that produce one. A marshalling
    /// error means guest memory can no longer be trusted.
    pub fn dispatch<M: GuestMemory + ?Sized>(
        &self,
        memory: &mut M,
        import: ImportFn,
        params: &[i32],
    ) -> marshal::Result<Option<i32>> {
        tracing::debug!(import = import.name(), ?params, "import called");
        let args = RawArgs { import, params };
        match import {
            ImportFn::LogMessage => {
                let message = marshal::decode(memory, args.buffer(0)?)?;
                self.host.log_message(&message);
                Ok(None)
            }
            ImportFn::CreatePopupWindow => {
                let title = marshal::decode(memory, args.buffer(0)?)?;
                let content = marshal::copy_out(memory, args.buffer(2)?)?;
                let handle = self.host.create_popup_window(&title, &content);
                Ok(Some(handle.0))
            }
            ImportFn::SetWindowTitle => {
                let window = WindowHandle(args.int(0)?);
                let title = marshal::decode(memory, args.buffer(1)?)?;
                self.host.set_window_title(window, &title);
                Ok(None)
            }
            ImportFn::GetWindowTitle => {
                let window = WindowHandle(args.int(0)?);
                let out_len = args.int(1)? as u32;
                let title = self.host.get_window_title(window);
                let buffer = marshal::encode(memory, &title)?;
                marshal::store_u32(memory, out_len, buffer.len)?;
                Ok(Some(buffer.ptr as i32))
            }
            ImportFn::ShowWindow => {
                self.host.show_window(WindowHandle(args.int(0)?));
                Ok(None)
            }
            ImportFn::CloseWindow => {
                self.host.close_window(WindowHandle(args.int(0)?));
                Ok(None)
            }
            ImportFn::SubscribeToEvent => {
                let element = ElementId(args.int(0)?);
                let event = marshal::decode(memory, args.buffer(1)?)?;
                self.layout.subscribe(element, &event);
                Ok(None)
            }
            ImportFn::StateChanged => {
                let element = ElementId(args.int(0)?);
                let state = marshal::copy_out(memory, args.buffer(1)?)?;
                self.layout.push_state(element, &state);
                Ok(None)
            }
        }
    }
}
