//! Command-line host: boots a guest module, drives its exports, and reports
//! what the guest asked the host to do.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use flybridge::Bridge;
use flybridge::BridgeConfig;
use flybridge::ElementId;
use flybridge::InteropNames;
use flybridge::MemoryHost;
use flybridge::WasmGuest;
use flybridge::WasmGuestConfig;
use flylayout::DuplicateResolution;
use flylayout::LayoutTree;

#[derive(Parser)]
#[command(name = "flyhost")]
#[command(about = "Runs an extension guest against an in-memory host.", long_about = None)]
struct Cli {
    /// Guest module (.wasm or .wat).
    guest: PathBuf,

    #[arg(long, default_value = "PixiEditor.Extensions.Sdk")]
    assembly: String,

    #[arg(long, default_value = "PixiEditor.Extensions.Sdk.Bridge")]
    namespace: String,

    #[arg(long = "type", default_value = "Interop")]
    type_name: String,

    /// Raise an element event after initialization, e.g. `--raise 7:Click`.
    #[arg(long, value_name = "ID:EVENT", value_parser = parse_raise)]
    raise: Vec<(i32, String)>,

    #[arg(long)]
    skip_initialize: bool,

    #[arg(long)]
    no_inherit_stdio: bool,
}

fn parse_raise(s: &str) -> std::result::Result<(i32, String), String> {
    let (id, event) = s
        .split_once(':')
        .ok_or_else(|| format!("expected ID:EVENT, got '{s}'"))?;
    let id = id
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("invalid element id '{id}': {e}"))?;
    if event.is_empty() {
        return Err("event name is empty".to_string());
    }
    Ok((id, event.to_string()))
}

/// Guest faults are reported and the session goes on; anything else ends it.
fn step(name: &str, outcome: flybridge::Result<()>) -> Result<()> {
    match outcome {
        Ok(()) => Ok(()),
        Err(e) if !e.is_fatal() => {
            tracing::warn!(step = name, error = %e, "guest faulted, continuing");
            Ok(())
        }
        Err(e) => Err(e).with_context(|| format!("{name} failed")),
    }
}

fn report(host: &MemoryHost) {
    println!("logs:");
    for line in host.logs() {
        println!("  {line}");
    }

    println!("windows:");
    for handle in host.windows() {
        if let Some(window) = host.window(handle) {
            println!(
                "  {handle} '{}' ({} content bytes, {})",
                window.title,
                window.content.len(),
                if window.visible { "shown" } else { "hidden" }
            );
        }
    }

    println!("subscriptions:");
    for (element, event) in host.subscriptions() {
        println!("  {element} {event}");
    }

    println!("state pushes:");
    let mut tree = LayoutTree::new();
    for (element, state) in host.states() {
        match tree.apply(&state, DuplicateResolution::Replace) {
            Ok(root) => println!(
                "  {element}: {} elements, root {} #{}",
                root.count(),
                root.control,
                root.id
            ),
            Err(e) => println!("  {element}: {} opaque bytes ({e})", state.len()),
        }
    }
}

fn main() -> Result<()> {
    flybridge::logging::init();
    let cli = Cli::parse();

    let names = InteropNames::new(&cli.assembly, &cli.namespace, &cli.type_name);
    let config = WasmGuestConfig::from_file(&cli.guest)
        .assembly(&cli.assembly)
        .inherit_stdio(!cli.no_inherit_stdio);
    let host = Arc::new(MemoryHost::new());
    let mut bridge = Bridge::with_config(
        WasmGuest::new(config),
        host.clone(),
        BridgeConfig::new().interop(names),
    );

    step("load", bridge.load())?;
    if !cli.skip_initialize {
        step("initialize", bridge.initialize())?;
    }
    for (element, event) in &cli.raise {
        let element = ElementId(*element);
        if !bridge.layout().is_subscribed(element, event) {
            tracing::info!(%element, event, "raising event the guest never subscribed to");
        }
        step("raise_element_event", bridge.raise_element_event(element, event))?;
    }

    report(&host);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_raise() {
        assert_eq!(parse_raise("7:Click"), Ok((7, "Click".to_string())));
        assert_eq!(parse_raise("-1:Drag:Start"), Ok((-1, "Drag:Start".to_string())));
        assert!(parse_raise("Click").is_err());
        assert!(parse_raise("x:Click").is_err());
        assert!(parse_raise("3:").is_err());
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::parse_from([
            "flyhost",
            "guest.wasm",
            "--raise",
            "1:Click",
            "--raise",
            "2:Hover",
            "--skip-initialize",
        ]);
        assert_eq!(cli.raise.len(), 2);
        assert!(cli.skip_initialize);
        assert_eq!(cli.type_name, "Interop");
    }
}
