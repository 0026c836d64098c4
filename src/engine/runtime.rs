// src/engine/runtime.rs

use std::collections::HashMap;
use std::fmt;

use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::errors::Result;
use crate::exec::{ProgressUpdate, Supervisor};
use crate::registry::InstanceRegistry;
use crate::types::IndicatorColor;
use crate::usb::{DeviceAttributes, PortIndicator};

use super::flash::{FlashObserver, FlashPlan};
use super::status::StatusSink;
use super::{RuntimeEvent, RuntimeOptions};

struct ActiveFlash {
    supervisor: Supervisor,
    device: DeviceAttributes,
}

/// Event loop: starts a supervised flash per attached device, reports
/// results, and keeps the hub indicators and status display current.
pub struct Runtime<S: StatusSink> {
    event_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
    events_tx: mpsc::UnboundedSender<RuntimeEvent>,
    plan: FlashPlan,
    registry: InstanceRegistry,
    status: S,
    indicator: Option<Box<dyn PortIndicator>>,
    options: RuntimeOptions,
    active: HashMap<u64, ActiveFlash>,
    startup_scan_complete: bool,
}

impl<S: StatusSink> fmt::Debug for Runtime<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("options", &self.options)
            .field("active", &self.active.len())
            .field("has_indicator", &self.indicator.is_some())
            .finish_non_exhaustive()
    }
}

impl<S: StatusSink> Runtime<S> {
    /// `events_tx` must be the sending half of `event_rx`; supervisors use
    /// it to report back.
    pub fn new(
        event_rx: mpsc::UnboundedReceiver<RuntimeEvent>,
        events_tx: mpsc::UnboundedSender<RuntimeEvent>,
        plan: FlashPlan,
        registry: InstanceRegistry,
        status: S,
        options: RuntimeOptions,
    ) -> Self {
        Self {
            event_rx,
            events_tx,
            plan,
            registry,
            status,
            indicator: None,
            options,
            active: HashMap::new(),
            startup_scan_complete: false,
        }
    }

    /// Drive hub port indicators while flashing.
    pub fn with_indicator(mut self, indicator: Box<dyn PortIndicator>) -> Self {
        self.indicator = Some(indicator);
        self
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    /// Main event loop. Returns the status sink so callers can inspect what
    /// was reported.
    pub async fn run(mut self) -> Result<S> {
        info!("dfu-watch runtime started");

        let mut ticker = tokio::time::interval(self.options.status_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                maybe_event = self.event_rx.recv() => {
                    let Some(event) = maybe_event else {
                        info!("runtime event channel closed; exiting");
                        break;
                    };
                    debug!(?event, "runtime received event");
                    if !self.handle_event(event).await {
                        break;
                    }
                }
                _ = ticker.tick() => self.render_status(),
            }

            if self.idle_exit_reached() {
                info!("no flash in flight; exiting");
                break;
            }
        }

        self.shutdown().await;
        info!("runtime exiting");
        Ok(self.status)
    }

    /// Returns `false` when the loop should stop.
    async fn handle_event(&mut self, event: RuntimeEvent) -> bool {
        match event {
            RuntimeEvent::DeviceAttached(device) => self.on_device_attached(device),
            RuntimeEvent::DeviceDetached(device) => self.on_device_detached(&device),
            RuntimeEvent::FlashProgress(update) if update.complete => {
                self.on_flash_completed(update).await
            }
            RuntimeEvent::FlashProgress(_) => self.render_status(),
            RuntimeEvent::StartupScanComplete => {
                debug!("startup scan complete");
                self.startup_scan_complete = true;
            }
            RuntimeEvent::ShutdownRequested => {
                info!("shutdown requested");
                return false;
            }
        }
        true
    }

    fn idle_exit_reached(&self) -> bool {
        self.options.exit_when_idle && self.startup_scan_complete && self.active.is_empty()
    }

    fn on_device_attached(&mut self, device: DeviceAttributes) {
        let label = device.label();
        if let Some(existing) = self.registry.find_by_label(&label) {
            info!(
                label = %label,
                progress = existing.progress(),
                "flash already in progress for device; ignoring attach"
            );
            return;
        }

        let command = match self.plan.command_for(&device) {
            Ok(command) => command,
            Err(reason) => {
                error!(device = %device, %reason, "cannot build flash command");
                return;
            }
        };

        let observer = FlashObserver::new(self.registry.clone(), self.events_tx.clone());
        match Supervisor::start(
            command,
            Some(label.clone()),
            observer,
            self.plan.supervisor_options(),
        ) {
            Ok(supervisor) => {
                self.set_indicator(&device, IndicatorColor::Amber);
                self.active.insert(
                    supervisor.handle().id(),
                    ActiveFlash { supervisor, device },
                );
                self.render_status();
            }
            Err(e) => {
                error!(label = %label, error = %e, "failed to launch flash command");
                self.set_indicator(&device, IndicatorColor::Off);
            }
        }
    }

    fn on_device_detached(&mut self, device: &DeviceAttributes) {
        let label = device.label();
        if self.registry.find_by_label(&label).is_some() {
            // Flash tools commonly reset the target, so this is expected.
            debug!(label = %label, "device detached while its flash is running");
        } else {
            debug!(label = %label, "device detached");
        }
    }

    async fn on_flash_completed(&mut self, update: ProgressUpdate) {
        let handle = update.handle;
        let Some(active) = self.active.remove(&handle.id()) else {
            debug!(label = %handle.display_name(), "completion for unknown flash; ignoring");
            self.registry.remove(&handle);
            return;
        };

        let exit_code = update.exit_code.unwrap_or(-1);
        if exit_code == 0 {
            self.set_indicator(&active.device, IndicatorColor::Green);
            self.status.flash_succeeded(&handle);
        } else {
            self.set_indicator(&active.device, IndicatorColor::Off);
            self.status.flash_failed(&handle, exit_code);
        }

        match active.supervisor.join().await {
            Ok(report) => {
                if let Some(err) = report.deferred_error {
                    warn!(
                        label = %handle.display_name(),
                        error = %err,
                        "callback failed during flash"
                    );
                }
            }
            Err(e) => {
                warn!(label = %handle.display_name(), error = %e, "supervisor task failed");
            }
        }

        // Already removed by the observer; removal is idempotent.
        self.registry.remove(&handle);
        self.render_status();
    }

    fn render_status(&mut self) {
        let snapshot = self.registry.snapshot();
        self.status.render(&snapshot);
    }

    fn set_indicator(&mut self, device: &DeviceAttributes, color: IndicatorColor) {
        let Some(indicator) = self.indicator.as_mut() else {
            return;
        };
        let Some(port) = device.port() else {
            debug!(device = %device, "no port number in devpath; skipping indicator");
            return;
        };
        if let Err(e) = indicator.set_indicator(port, color) {
            warn!(port, ?color, error = %e, "failed to set hub port indicator");
        }
    }

    async fn shutdown(&mut self) {
        let active: Vec<ActiveFlash> = self.active.drain().map(|(_, a)| a).collect();
        if !active.is_empty() {
            info!(count = active.len(), "stopping in-flight flashes");
        }

        for ActiveFlash { supervisor, device } in active {
            let handle = supervisor.handle().clone();
            match supervisor.stop().await {
                Ok(report) => {
                    debug!(label = %handle.display_name(), outcome = ?report.outcome, "supervisor stopped");
                }
                Err(e) => {
                    warn!(label = %handle.display_name(), error = %e, "failed to stop supervisor");
                }
            }
            self.registry.remove(&handle);
            self.set_indicator(&device, IndicatorColor::Automatic);
        }
    }
}
