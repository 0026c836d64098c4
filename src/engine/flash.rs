// src/engine/flash.rs

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::config::{CommandTemplate, ConfigFile};
use crate::engine::RuntimeEvent;
use crate::exec::{CommandSpec, ProcessHandle, ProgressUpdate, SupervisorCallbacks, SupervisorOptions};
use crate::registry::InstanceRegistry;
use crate::usb::DeviceAttributes;

/// How to flash one device: the command template plus supervisor options.
#[derive(Debug, Clone)]
pub struct FlashPlan {
    template: CommandTemplate,
    options: SupervisorOptions,
}

impl FlashPlan {
    pub fn new(template: CommandTemplate, options: SupervisorOptions) -> Self {
        Self { template, options }
    }

    pub fn from_config(cfg: &ConfigFile) -> Self {
        Self::new(cfg.flash.clone(), cfg.supervisor_options())
    }

    /// Shell command for `device`, or why it cannot be built.
    pub fn command_for(&self, device: &DeviceAttributes) -> Result<CommandSpec, String> {
        self.template.render(device).map(CommandSpec::shell)
    }

    pub fn supervisor_options(&self) -> SupervisorOptions {
        self.options
    }

    pub fn template(&self) -> &CommandTemplate {
        &self.template
    }
}

/// Supervisor callbacks used by the runtime.
///
/// Registers the process in the registry as soon as it starts and removes it
/// when completion is delivered, then forwards every progress notification
/// to the runtime loop.
#[derive(Debug, Clone)]
pub struct FlashObserver {
    registry: InstanceRegistry,
    events_tx: mpsc::UnboundedSender<RuntimeEvent>,
}

impl FlashObserver {
    pub fn new(registry: InstanceRegistry, events_tx: mpsc::UnboundedSender<RuntimeEvent>) -> Self {
        Self {
            registry,
            events_tx,
        }
    }
}

impl SupervisorCallbacks for FlashObserver {
    fn on_start(&self, handle: &ProcessHandle) {
        self.registry.add(handle.clone());
    }

    fn on_progress(&self, update: &ProgressUpdate) -> anyhow::Result<()> {
        if update.complete {
            self.registry.remove(&update.handle);
        }
        if self
            .events_tx
            .send(RuntimeEvent::FlashProgress(update.clone()))
            .is_err()
        {
            debug!(
                label = %update.handle.display_name(),
                "runtime gone; dropping progress notification"
            );
        }
        Ok(())
    }

    fn on_output_line(&self, handle: &ProcessHandle, line: &str) -> anyhow::Result<()> {
        trace!(label = %handle.display_name(), line, "stdout");
        Ok(())
    }

    fn on_error_line(&self, handle: &ProcessHandle, line: &str) -> anyhow::Result<()> {
        debug!(label = %handle.display_name(), line, "stderr");
        Ok(())
    }
}
