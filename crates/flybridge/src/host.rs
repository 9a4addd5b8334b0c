//! # Host primitives
//!
//! The UI and logging services a host exposes to its guest. The import table
//! decodes guest calls and forwards them here with host-native values.
//!
//! `MemoryHost` keeps everything in memory for tests, demos, and the CLI.

use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicI32;
use std::sync::atomic::Ordering;

use dashmap::DashMap;

use crate::handles::ElementId;
use crate::handles::WindowHandle;

/// Services the host provides to the guest.
///
/// Every method is synchronous: the guest is blocked until it returns.
pub trait Host: Send + Sync + 'static {
    fn log_message(&self, message: &str);

    fn create_popup_window(&self, title: &str, content: &[u8]) -> WindowHandle;

    fn set_window_title(&self, window: WindowHandle, title: &str);

    fn get_window_title(&self, window: WindowHandle) -> String;

    fn show_window(&self, window: WindowHandle);

    fn close_window(&self, window: WindowHandle);

    /// Called once per new `(element, event)` subscription.
    fn subscribe_to_event(&self, element: ElementId, event: &str);

    /// Receives a state blob for the rendering layer. The blob is opaque here.
    fn state_changed(&self, element: ElementId, state: &[u8]);
}

/// A popup window as the in-memory host sees it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Window {
    pub title: String,
    pub content: Vec<u8>,
    pub visible: bool,
}

/// In-memory host that records everything the guest asks for.
#[derive(Debug)]
pub struct MemoryHost {
    logs: Mutex<Vec<String>>,
    windows: DashMap<WindowHandle, Window>,
    next_window: AtomicI32,
    subscriptions: Mutex<Vec<(ElementId, String)>>,
    states: Mutex<Vec<(ElementId, Vec<u8>)>>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self {
            logs: Mutex::new(Vec::new()),
            windows: DashMap::new(),
            next_window: AtomicI32::new(1),
            subscriptions: Mutex::new(Vec::new()),
            states: Mutex::new(Vec::new()),
        }
    }

    /// Returns all captured log messages.
    pub fn logs(&self) -> Vec<String> {
        self.logs.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Returns a snapshot of a live window.
    pub fn window(&self, handle: WindowHandle) -> Option<Window> {
        self.windows.get(&handle).map(|entry| entry.value().clone())
    }

    /// Returns the handles of all live windows, ascending.
    pub fn windows(&self) -> Vec<WindowHandle> {
        let mut handles: Vec<_> = self.windows.iter().map(|entry| *entry.key()).collect();
        handles.sort();
        handles
    }

    /// Returns subscriptions in the order the host was told about them.
    pub fn subscriptions(&self) -> Vec<(ElementId, String)> {
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns every state push in arrival order.
    pub fn states(&self) -> Vec<(ElementId, Vec<u8>)> {
        self.states.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new()
    }
}

impl Host for MemoryHost {
    fn log_message(&self, message: &str) {
        tracing::info!(target: "flybridge::guest", "{}", message);
        self.logs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.to_string());
    }

    fn create_popup_window(&self, title: &str, content: &[u8]) -> WindowHandle {
        let handle = WindowHandle(self.next_window.fetch_add(1, Ordering::Relaxed));
        tracing::debug!(%handle, title, content_len = content.len(), "created popup window");
        self.windows.insert(
            handle,
            Window {
                title: title.to_string(),
                content: content.to_vec(),
                visible: false,
            },
        );
        handle
    }

    fn set_window_title(&self, window: WindowHandle, title: &str) {
        match self.windows.get_mut(&window) {
            Some(mut entry) => entry.title = title.to_string(),
            None => tracing::warn!(%window, "set_window_title on unknown window"),
        }
    }

    fn get_window_title(&self, window: WindowHandle) -> String {
        match self.windows.get(&window) {
            Some(entry) => entry.title.clone(),
            None => {
                tracing::warn!(%window, "get_window_title on unknown window");
                String::new()
            }
        }
    }

    fn show_window(&self, window: WindowHandle) {
        match self.windows.get_mut(&window) {
            Some(mut entry) => entry.visible = true,
            None => tracing::warn!(%window, "show_window on unknown window"),
        }
    }

    fn close_window(&self, window: WindowHandle) {
        if self.windows.remove(&window).is_none() {
            tracing::warn!(%window, "close_window on unknown window");
        }
    }

    fn subscribe_to_event(&self, element: ElementId, event: &str) {
        tracing::debug!(%element, event, "element subscribed");
        self.subscriptions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((element, event.to_string()));
    }

    fn state_changed(&self, element: ElementId, state: &[u8]) {
        tracing::trace!(%element, len = state.len(), "state pushed");
        self.states
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((element, state.to_vec()));
    }
}
