// src/exec/callbacks.rs

//! Callback protocol between a supervisor and its owner.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use crate::errors::{CallbackError, CallbackStage};
use crate::exec::handle::ProcessHandle;

/// One progress notification.
///
/// `complete == false`: a stdout line carried a percentage; `exit_code` is
/// `None`. `complete == true`: the final notification for this process,
/// delivered exactly once, after all output was dispatched.
#[derive(Debug, Clone)]
pub struct ProgressUpdate {
    pub handle: ProcessHandle,
    pub progress: u8,
    pub complete: bool,
    pub exit_code: Option<i32>,
}

/// Hooks invoked from a supervisor's drain loop.
///
/// Errors and panics from the fallible hooks are isolated: draining carries
/// on and the last failure is reported to the supervisor's owner after the
/// completion notification.
///
/// Plain closures `Fn(&ProgressUpdate) -> anyhow::Result<()>` implement this
/// trait and only receive progress.
pub trait SupervisorCallbacks: Send + Sync + 'static {
    /// Called synchronously from `Supervisor::start`, before the drain loop
    /// runs. Use it to register the process somewhere. A panic here is
    /// caught and deferred like any other callback failure.
    fn on_start(&self, _handle: &ProcessHandle) {}

    /// Progress (`complete == false`) and completion (`complete == true`).
    fn on_progress(&self, update: &ProgressUpdate) -> anyhow::Result<()>;

    /// A completed, trimmed stdout line.
    fn on_output_line(&self, _handle: &ProcessHandle, _line: &str) -> anyhow::Result<()> {
        Ok(())
    }

    /// A completed, trimmed stderr line.
    fn on_error_line(&self, _handle: &ProcessHandle, _line: &str) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<F> SupervisorCallbacks for F
where
    F: Fn(&ProgressUpdate) -> anyhow::Result<()> + Send + Sync + 'static,
{
    fn on_progress(&self, update: &ProgressUpdate) -> anyhow::Result<()> {
        self(update)
    }
}

/// Callbacks that ignore everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCallbacks;

impl SupervisorCallbacks for NoCallbacks {
    fn on_progress(&self, _update: &ProgressUpdate) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Run one callback, converting an error or a panic into a [`CallbackError`].
pub(crate) fn guarded<F>(stage: CallbackStage, f: F) -> Result<(), CallbackError>
where
    F: FnOnce() -> anyhow::Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(source)) => Err(CallbackError::Failed { stage, source }),
        Err(payload) => Err(CallbackError::Panicked {
            stage,
            message: panic_message(payload.as_ref()),
        }),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
