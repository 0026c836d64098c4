// src/errors.rs

//! Crate-wide error types.
//!
//! Each failure class has its own enum so callers can match on what went
//! wrong:
//! - [`LaunchError`]: a flashing command could not be started.
//! - [`CallbackError`]: a caller-supplied callback failed or panicked while the
//!   supervisor was dispatching to it.
//! - [`SupervisorError`]: what the owner of a supervisor sees once the drain
//!   loop has finished.
//! - [`HubError`] / [`UsbError`]: USB collaborators (hub indicator, discovery).
//!
//! "No data yet" on a non-blocking read is not an error; see
//! [`crate::exec::ReadOutcome::Empty`].

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DfuWatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Usb(#[from] UsbError),

    #[error(transparent)]
    Hub(#[from] HubError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DfuWatchError>;

/// A command could not be started.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("refusing to launch an empty command")]
    EmptyCommand,

    #[error("failed to launch `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

/// Which callback a [`CallbackError`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStage {
    Start,
    OutputLine,
    ErrorLine,
    Progress,
    Completion,
}

impl fmt::Display for CallbackStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CallbackStage::Start => "start",
            CallbackStage::OutputLine => "output-line",
            CallbackStage::ErrorLine => "error-line",
            CallbackStage::Progress => "progress",
            CallbackStage::Completion => "completion",
        };
        f.write_str(name)
    }
}

/// A caller-supplied callback returned an error or panicked.
///
/// These never stop a drain loop; the last one is handed to the owner after
/// completion has been delivered.
#[derive(Error, Debug)]
pub enum CallbackError {
    #[error("{stage} callback failed: {source}")]
    Failed {
        stage: CallbackStage,
        #[source]
        source: anyhow::Error,
    },

    #[error("{stage} callback panicked: {message}")]
    Panicked { stage: CallbackStage, message: String },
}

impl CallbackError {
    pub fn stage(&self) -> CallbackStage {
        match self {
            CallbackError::Failed { stage, .. } | CallbackError::Panicked { stage, .. } => *stage,
        }
    }
}

/// Errors surfaced to the owner of a [`crate::exec::Supervisor`].
#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("deferred callback error: {0}")]
    Callback(#[from] CallbackError),

    #[error("supervisor task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// The hub LED collaborator could not be used.
///
/// Always non-fatal: flashing continues without indication.
#[derive(Error, Debug)]
pub enum HubError {
    #[error("no USB hub {vendor_id:04x}:{product_id:04x} found")]
    NotFound { vendor_id: u16, product_id: u16 },

    #[error("USB hub {vendor_id:04x}:{product_id:04x} does not support port indicators")]
    Unsupported { vendor_id: u16, product_id: u16 },

    #[error("USB error: {0}")]
    Usb(#[from] nusb::Error),

    #[error("control transfer error: {0}")]
    Transfer(#[from] nusb::transfer::TransferError),
}

/// Device discovery failed.
#[derive(Error, Debug)]
pub enum UsbError {
    #[error("USB error: {0}")]
    Usb(#[from] nusb::Error),

    #[error("device enumeration task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
