// src/engine/mod.rs

//! Orchestration engine for dfu-watch.
//!
//! The runtime reacts to:
//! - device attach/detach events from USB discovery
//! - progress and completion notifications from supervisors
//! - a periodic status tick
//! - shutdown signals
//!
//! [`flash`] turns an attached device into a supervised flash command and
//! wires the supervisor's callbacks to the registry. [`status`] renders the
//! aggregate state. [`runtime`] is the event loop itself.

use std::time::Duration;

use crate::exec::ProgressUpdate;
use crate::usb::DeviceAttributes;

/// Options for the runtime loop.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeOptions {
    /// Exit once the startup scan is done and no flash is in flight
    /// (used for `--once`).
    pub exit_when_idle: bool,
    /// Unconditional status refresh period.
    pub status_interval: Duration,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            exit_when_idle: false,
            status_interval: Duration::from_secs(1),
        }
    }
}

/// Events flowing into the runtime from discovery, supervisors and signals.
#[derive(Debug, Clone)]
pub enum RuntimeEvent {
    /// A matching device is present.
    DeviceAttached(DeviceAttributes),
    /// A previously announced device went away.
    DeviceDetached(DeviceAttributes),
    /// A supervisor reported progress or completion.
    FlashProgress(ProgressUpdate),
    /// All devices present at startup have been announced.
    StartupScanComplete,
    /// Graceful shutdown requested (e.g. Ctrl-C).
    ShutdownRequested,
}

pub mod flash;
pub mod runtime;
pub mod status;

pub use flash::{FlashObserver, FlashPlan};
pub use runtime::Runtime;
pub use status::{format_status_line, LogStatusSink, StatusSink};
