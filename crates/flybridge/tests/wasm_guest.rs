//! End-to-end tests driving a real WebAssembly guest through wasmtime.
//!
//! The guests are hand-written WAT: a bump `malloc`, a `free` that records
//! what it was handed, and interop methods exported under their qualified
//! symbol names.

use std::sync::Arc;

use flybridge::Bridge;
use flybridge::BootstrapError;
use flybridge::ElementId;
use flybridge::Error;
use flybridge::GuestArg;
use flybridge::MarshalError;
use flybridge::MemoryHost;
use flybridge::RuntimeState;
use flybridge::WasmGuest;
use flybridge::WasmGuestConfig;
use flybridge::WindowHandle;

const GUEST_WAT: &str = r#"
(module
  (import "env" "log_message" (func $log (param i32 i32)))
  (import "env" "create_popup_window" (func $popup (param i32 i32 i32 i32) (result i32)))
  (import "env" "get_window_title" (func $get_title (param i32 i32) (result i32)))
  (import "env" "show_window" (func $show (param i32)))
  (import "env" "subscribe_to_event" (func $subscribe (param i32 i32 i32)))
  (import "env" "state_changed" (func $state (param i32 i32 i32)))

  (memory (export "memory") 1)
  (global $heap (mut i32) (i32.const 1024))

  (data (i32.const 16) "hello\00guest")
  (data (i32.const 32) "Click")
  (data (i32.const 48) "Title")
  (data (i32.const 80) "\ff\fe")

  (func (export "malloc") (param $len i32) (result i32)
    (local $ptr i32)
    (local.set $ptr (global.get $heap))
    (global.set $heap (i32.add (global.get $heap) (local.get $len)))
    (local.get $ptr))

  ;; Last freed pointer at 128, number of frees at 132.
  (func (export "free") (param $ptr i32)
    (i32.store (i32.const 128) (local.get $ptr))
    (i32.store (i32.const 132) (i32.add (i32.load (i32.const 132)) (i32.const 1))))

  (func (export "PixiEditor.Extensions.Sdk.Bridge.Interop::Load")
    (call $log (i32.const 16) (i32.const 11))
    (call $subscribe (i32.const 7) (i32.const 32) (i32.const 5)))

  (func (export "PixiEditor.Extensions.Sdk.Bridge.Interop::Initialize")
    unreachable)

  (func (export "PixiEditor.Extensions.Sdk.Bridge.Interop::EventRaised")
    (param $element i32) (param $ptr i32) (param $len i32)
    (call $state (local.get $element) (local.get $ptr) (local.get $len)))

  (func (export "PixiEditor.Extensions.Sdk.Bridge.Interop::Popup")
    (local $window i32)
    (local $title i32)
    (local.set $window
      (call $popup (i32.const 48) (i32.const 5) (i32.const 0) (i32.const 0)))
    (call $show (local.get $window))
    (local.set $title (call $get_title (local.get $window) (i32.const 64)))
    (call $state (local.get $window) (local.get $title) (i32.load (i32.const 64))))

  (func (export "PixiEditor.Extensions.Sdk.Bridge.Interop::Corrupt")
    (call $log (i32.const 16) (i32.const 0x7fffffff)))

  (func (export "PixiEditor.Extensions.Sdk.Bridge.Interop::BadText")
    (call $log (i32.const 80) (i32.const 2)))

  (func (export "PixiEditor.Extensions.Sdk.Bridge.Interop::Freed")
    (call $state (i32.load (i32.const 132)) (i32.const 128) (i32.const 4)))
)
"#;

fn wasm_bridge(source: &str) -> (Bridge<WasmGuest>, Arc<MemoryHost>) {
    let config = WasmGuestConfig::from_bytes(source).inherit_stdio(false);
    let host = Arc::new(MemoryHost::new());
    (Bridge::new(WasmGuest::new(config), host.clone()), host)
}

#[test]
fn test_load_logs_and_subscribes() {
    let (mut bridge, host) = wasm_bridge(GUEST_WAT);

    bridge.load().unwrap();

    assert_eq!(bridge.state(), RuntimeState::Initialized);
    assert_eq!(host.logs(), vec!["hello\0guest".to_string()]);
    assert_eq!(host.subscriptions(), vec![(ElementId(7), "Click".to_string())]);
    assert!(bridge.layout().is_subscribed(ElementId(7), "Click"));
}

#[test]
fn test_raised_event_round_trips_through_guest() {
    let (mut bridge, host) = wasm_bridge(GUEST_WAT);

    bridge.raise_element_event(ElementId(7), "Click").unwrap();
    bridge.raise_element_event(ElementId(3), "Hover").unwrap();

    assert_eq!(
        host.states(),
        vec![
            (ElementId(7), b"Click".to_vec()),
            (ElementId(3), b"Hover".to_vec()),
        ]
    );
}

#[test]
fn test_trap_is_recoverable() {
    let (mut bridge, host) = wasm_bridge(GUEST_WAT);
    bridge.load().unwrap();

    let err = bridge.initialize().unwrap_err();
    assert!(matches!(err, Error::GuestFault(_)), "got {:?}", err);
    assert!(!err.is_fatal());

    bridge.load().unwrap();
    assert_eq!(host.logs().len(), 2);
    // The repeated subscription is not forwarded twice.
    assert_eq!(host.subscriptions().len(), 1);
}

#[test]
fn test_popup_window_imports() {
    let (mut bridge, host) = wasm_bridge(GUEST_WAT);

    let result = bridge.invoke_interop("Popup", &[]).unwrap();
    assert_eq!(result, None);

    let window = host.window(WindowHandle(1)).unwrap();
    assert_eq!(window.title, "Title");
    assert!(window.visible);
    assert!(window.content.is_empty());
    assert_eq!(host.states(), vec![(ElementId(1), b"Title".to_vec())]);
}

#[test]
fn test_missing_export_is_symbol_not_found() {
    let (mut bridge, _host) = wasm_bridge(GUEST_WAT);

    let err = bridge.invoke_interop("Unload", &[GuestArg::Int(1)]).unwrap_err();
    assert!(matches!(err, Error::SymbolNotFound(ref key) if key.method == "Unload"));
    assert!(err.is_fatal());
}

#[test]
fn test_corrupt_length_from_guest_is_marshal_error() {
    let (mut bridge, host) = wasm_bridge(GUEST_WAT);

    let err = bridge.invoke_interop("Corrupt", &[]).unwrap_err();
    assert!(
        matches!(err, Error::Marshal(MarshalError::SizeMismatch { .. })),
        "got {:?}",
        err
    );
    assert!(err.is_fatal());
    assert!(host.logs().is_empty());
}

#[test]
fn test_invalid_module_fails_bootstrap() {
    let (mut bridge, _host) = wasm_bridge("(module (func $broken (result i32)))");

    let err = bridge.load().unwrap_err();
    assert!(matches!(err, Error::Bootstrap(BootstrapError::Start(_))), "got {:?}", err);
    assert_eq!(bridge.state(), RuntimeState::Failed);
}

#[test]
fn test_missing_import_fails_launch() {
    let wat = r#"(module (import "env" "open_file" (func (param i32))))"#;
    let (mut bridge, _host) = wasm_bridge(wat);

    let err = bridge.load().unwrap_err();
    assert!(matches!(err, Error::Bootstrap(BootstrapError::Launch(_))), "got {:?}", err);
}

#[test]
fn test_other_assembly_never_resolves() {
    let config = WasmGuestConfig::from_bytes(GUEST_WAT)
        .inherit_stdio(false)
        .assembly("Some.Other.Sdk");
    let host = Arc::new(MemoryHost::new());
    let mut bridge = Bridge::new(WasmGuest::new(config), host);

    assert!(matches!(bridge.load(), Err(Error::SymbolNotFound(_))));
}

#[test]
fn test_argument_buffer_is_freed_by_guest() {
    let (mut bridge, host) = wasm_bridge(GUEST_WAT);

    bridge.raise_element_event(ElementId(7), "Click").unwrap();
    bridge.invoke_interop("Freed", &[]).unwrap();

    // The event name was the first allocation on a fresh heap.
    assert_eq!(
        host.states(),
        vec![
            (ElementId(7), b"Click".to_vec()),
            (ElementId(1), 1024u32.to_le_bytes().to_vec()),
        ]
    );
}

#[test]
fn test_invalid_utf8_from_guest_is_recoverable() {
    let (mut bridge, host) = wasm_bridge(GUEST_WAT);

    let err = bridge.invoke_interop("BadText", &[]).unwrap_err();
    match &err {
        Error::GuestFault(fault) => {
            assert_eq!(fault.method.method, "BadText");
            assert!(fault.message.contains("UTF-8"), "got {}", fault.message);
        }
        other => panic!("expected guest fault, got {:?}", other),
    }
    assert!(!err.is_fatal());
    assert!(host.logs().is_empty());

    bridge.load().unwrap();
    assert_eq!(host.logs(), vec!["hello\0guest".to_string()]);
}

const TRAPPING_MALLOC_WAT: &str = r#"
(module
  (import "env" "state_changed" (func $state (param i32 i32 i32)))

  (memory (export "memory") 1)
  (global $heap (mut i32) (i32.const 1024))

  (func (export "malloc") (param $len i32) (result i32)
    (local $ptr i32)
    (if (i32.eq (local.get $len) (i32.const 5)) (then unreachable))
    (local.set $ptr (global.get $heap))
    (global.set $heap (i32.add (global.get $heap) (local.get $len)))
    (local.get $ptr))

  (func (export "free") (param i32))

  (func (export "PixiEditor.Extensions.Sdk.Bridge.Interop::Load"))

  (func (export "PixiEditor.Extensions.Sdk.Bridge.Interop::EventRaised")
    (param $element i32) (param $ptr i32) (param $len i32)
    (call $state (local.get $element) (local.get $ptr) (local.get $len)))
)
"#;

#[test]
fn test_trapping_allocator_is_recoverable() {
    let (mut bridge, host) = wasm_bridge(TRAPPING_MALLOC_WAT);

    let err = bridge.raise_element_event(ElementId(7), "Hover").unwrap_err();
    match &err {
        Error::GuestFault(fault) => assert_eq!(fault.method.method, "EventRaised"),
        other => panic!("expected guest fault, got {:?}", other),
    }
    assert!(!err.is_fatal());
    assert_eq!(bridge.state(), RuntimeState::Initialized);

    bridge.load().unwrap();
    bridge.raise_element_event(ElementId(7), "Pressed").unwrap();
    assert_eq!(host.states(), vec![(ElementId(7), b"Pressed".to_vec())]);
}

const REACTOR_WAT: &str = r#"
(module
  (import "env" "state_changed" (func $state (param i32 i32 i32)))

  (memory (export "memory") 1)
  (global $ready (mut i32) (i32.const 0))

  (func (export "_initialize")
    (global.set $ready (i32.const 42)))

  (func (export "PixiEditor.Extensions.Sdk.Bridge.Interop::Load")
    (call $state (global.get $ready) (i32.const 0) (i32.const 0)))
)
"#;

#[test]
fn test_reactor_initializer_runs_before_exports() {
    let (mut bridge, host) = wasm_bridge(REACTOR_WAT);

    bridge.load().unwrap();

    assert_eq!(host.states(), vec![(ElementId(42), Vec::new())]);
}

#[test]
fn test_trapping_reactor_initializer_fails_launch() {
    let wat = r#"(module (func (export "_initialize") unreachable))"#;
    let (mut bridge, _host) = wasm_bridge(wat);

    let err = bridge.load().unwrap_err();
    assert!(matches!(err, Error::Bootstrap(BootstrapError::Launch(_))), "got {:?}", err);
    assert!(err.is_fatal());
    assert_eq!(bridge.state(), RuntimeState::Failed);

    assert!(matches!(
        bridge.load(),
        Err(Error::Bootstrap(BootstrapError::PreviouslyFailed))
    ));
}
