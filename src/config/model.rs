// src/config/model.rs

use std::time::Duration;

use serde::Deserialize;

use crate::config::template::CommandTemplate;
use crate::exec::SupervisorOptions;
use crate::usb::DeviceFilter;

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [config]
/// poll_interval = "100ms"
/// status_interval = "1s"
///
/// [device]
/// vendor_id = "0483"
/// product_id = "df11"
///
/// [flash]
/// cmd = "dfu-util -nR -a 0 -S {serial} -D firmware.dfu"
///
/// [hub]
/// vendor_id = "0424"
/// product_id = "2514"
/// ```
///
/// Only `[flash]` is required.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub config: RawConfigSection,

    #[serde(default)]
    pub device: RawDeviceSection,

    pub flash: RawFlashSection,

    #[serde(default)]
    pub hub: Option<RawHubSection>,
}

/// `[config]` section: timing and stop behaviour.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigSection {
    /// Supervisor idle delay between output polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: String,

    /// Periodic status refresh.
    #[serde(default = "default_status_interval")]
    pub status_interval: String,

    /// How long to wait for a process's pipes to close after it exits.
    #[serde(default = "default_exit_linger")]
    pub exit_linger: String,

    /// Kill flashing processes on shutdown instead of detaching from them.
    #[serde(default)]
    pub kill_on_stop: bool,
}

fn default_poll_interval() -> String {
    "100ms".to_string()
}

fn default_status_interval() -> String {
    "1s".to_string()
}

fn default_exit_linger() -> String {
    "2s".to_string()
}

impl Default for RawConfigSection {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            status_interval: default_status_interval(),
            exit_linger: default_exit_linger(),
            kill_on_stop: false,
        }
    }
}

/// `[device]` section: which devices get flashed.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawDeviceSection {
    /// Hex vendor id, e.g. `"0483"` or `"0x0483"`.
    #[serde(default)]
    pub vendor_id: Option<String>,

    /// Hex product id, e.g. `"df11"`.
    #[serde(default)]
    pub product_id: Option<String>,

    /// Require a DFU class interface.
    #[serde(default = "default_dfu_only")]
    pub dfu_only: bool,
}

fn default_dfu_only() -> bool {
    true
}

impl Default for RawDeviceSection {
    fn default() -> Self {
        Self {
            vendor_id: None,
            product_id: None,
            dfu_only: default_dfu_only(),
        }
    }
}

/// `[flash]` section.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawFlashSection {
    /// Command template run once per device.
    pub cmd: String,
}

/// `[hub]` section: hub whose port LEDs show flash status.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawHubSection {
    pub vendor_id: String,
    pub product_id: String,
}

/// Validated configuration.
///
/// Constructed via `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub poll_interval: Duration,
    pub status_interval: Duration,
    pub exit_linger: Duration,
    pub kill_on_stop: bool,
    pub device: DeviceFilter,
    pub flash: CommandTemplate,
    pub hub: Option<HubSelector>,
}

/// Vendor/product id of the indicator hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubSelector {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl ConfigFile {
    /// Supervisor options derived from `[config]`.
    pub fn supervisor_options(&self) -> SupervisorOptions {
        SupervisorOptions {
            idle_delay: self.poll_interval,
            exit_linger: self.exit_linger,
            kill_on_stop: self.kill_on_stop,
            ..SupervisorOptions::default()
        }
    }
}
