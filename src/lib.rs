// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod registry;
pub mod types;
pub mod usb;

use std::path::PathBuf;

use anyhow::Result;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::loader::load_and_validate;
use crate::config::model::ConfigFile;
use crate::engine::{FlashPlan, LogStatusSink, Runtime, RuntimeEvent, RuntimeOptions};
use crate::registry::InstanceRegistry;
use crate::usb::{PortIndicator, UsbHub};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading
/// - the optional indicator hub
/// - startup device scan and hotplug watcher
/// - Ctrl-C handling
/// - the runtime loop
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);
    let cfg = load_and_validate(&config_path)?;

    if args.dry_run {
        print_dry_run(&cfg);
        return Ok(());
    }

    let (rt_tx, rt_rx) = mpsc::unbounded_channel::<RuntimeEvent>();

    let indicator = open_indicator(&cfg).await;

    let present = usb::enumerate(cfg.device).await?;
    info!(count = present.len(), "matching devices present at startup");
    if args.once && present.is_empty() {
        info!("no matching devices present; nothing to do");
        return Ok(());
    }
    for device in present {
        rt_tx.send(RuntimeEvent::DeviceAttached(device))?;
    }
    rt_tx.send(RuntimeEvent::StartupScanComplete)?;

    // Hotplug watcher (disabled in --once mode).
    let _watcher_handle = if !args.once {
        Some(usb::spawn_device_watcher(cfg.device, rt_tx.clone())?)
    } else {
        None
    };

    // Ctrl-C → graceful shutdown.
    {
        let tx = rt_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for Ctrl+C");
                return;
            }
            let _ = tx.send(RuntimeEvent::ShutdownRequested);
        });
    }

    let options = RuntimeOptions {
        exit_when_idle: args.once,
        status_interval: cfg.status_interval,
    };

    let mut runtime = Runtime::new(
        rt_rx,
        rt_tx,
        FlashPlan::from_config(&cfg),
        InstanceRegistry::new(),
        LogStatusSink::new(),
        options,
    );
    if let Some(indicator) = indicator {
        runtime = runtime.with_indicator(indicator);
    }

    runtime.run().await?;
    Ok(())
}

/// Open the configured hub. Any failure only disables indication.
async fn open_indicator(cfg: &ConfigFile) -> Option<Box<dyn PortIndicator>> {
    let hub = cfg.hub?;
    let found =
        tokio::task::spawn_blocking(move || UsbHub::find(hub.vendor_id, hub.product_id)).await;

    match found {
        Ok(Ok(hub)) => Some(Box::new(hub) as Box<dyn PortIndicator>),
        Ok(Err(e)) => {
            warn!(error = %e, "hub port indicators unavailable; flashing without indication");
            None
        }
        Err(e) => {
            warn!(error = %e, "hub lookup task failed");
            None
        }
    }
}

/// Print the validated configuration without touching any device.
fn print_dry_run(cfg: &ConfigFile) {
    println!("dfu-watch dry-run");
    println!("  config.poll_interval = {:?}", cfg.poll_interval);
    println!("  config.status_interval = {:?}", cfg.status_interval);
    println!("  config.exit_linger = {:?}", cfg.exit_linger);
    println!("  config.kill_on_stop = {}", cfg.kill_on_stop);
    println!();

    println!("device filter:");
    match cfg.device.vendor_id {
        Some(id) => println!("  vendor_id: {id:04x}"),
        None => println!("  vendor_id: any"),
    }
    match cfg.device.product_id {
        Some(id) => println!("  product_id: {id:04x}"),
        None => println!("  product_id: any"),
    }
    println!("  dfu_only: {}", cfg.device.dfu_only);
    println!();

    println!("flash:");
    println!("  cmd: {}", cfg.flash);

    if let Some(hub) = cfg.hub {
        println!();
        println!("hub:");
        println!("  {:04x}:{:04x}", hub.vendor_id, hub.product_id);
    }

    debug!("dry-run complete (no execution)");
}
