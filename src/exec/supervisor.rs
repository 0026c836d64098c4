// src/exec/supervisor.rs

//! Process supervisor: owns one external process and drains its output.
//!
//! Every drain cycle:
//! 1. checks the cancellation channel,
//! 2. does one non-blocking read from stdout, then one from stderr, feeding
//!    completed lines to progress extraction and the callbacks,
//! 3. polls the exit status,
//! 4. sleeps for `idle_delay` only if neither stream produced data.
//!
//! Once the process has exited the loop keeps draining until both streams
//! have reached end-of-file. A grandchild that inherited the pipes can keep
//! them open forever, so a stream that is merely empty also counts as drained
//! once two post-exit cycles, separated by an idle sleep, came up empty and
//! `exit_linger` has passed since the first of them. Empty reads from the
//! cycle that observed the exit never count. Only then is the exit code recorded
//! and completion delivered.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::errors::{CallbackError, CallbackStage, LaunchError, SupervisorError};
use crate::exec::callbacks::{guarded, ProgressUpdate, SupervisorCallbacks};
use crate::exec::handle::ProcessHandle;
use crate::exec::launcher::{launch, CommandSpec, LaunchedProcess, ReadOutcome};
use crate::exec::lines::LineAssembler;
use crate::exec::progress::extract_progress;
use crate::types::SupervisorState;

/// Tunables for a drain loop.
#[derive(Debug, Clone, Copy)]
pub struct SupervisorOptions {
    /// Sleep between cycles that produced no output.
    pub idle_delay: Duration,
    /// How long after exit to wait for the pipes to reach end-of-file.
    pub exit_linger: Duration,
    /// Whether `stop()` kills the process (otherwise it is left running).
    pub kill_on_stop: bool,
    /// Maximum bytes taken from each stream per cycle.
    pub read_chunk: usize,
}

impl Default for SupervisorOptions {
    fn default() -> Self {
        Self {
            idle_delay: Duration::from_millis(100),
            exit_linger: Duration::from_secs(2),
            kill_on_stop: false,
            read_chunk: 256,
        }
    }
}

/// How a drain loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisionOutcome {
    /// Process exited and all output was dispatched.
    Completed { exit_code: i32, progress: u8 },
    /// `stop()` was called first; no completion callback was delivered.
    Detached,
}

/// Final report of a drain loop, with the deferred callback error if any.
#[derive(Debug)]
pub struct SupervisionReport {
    pub handle: ProcessHandle,
    pub outcome: SupervisionOutcome,
    pub deferred_error: Option<CallbackError>,
}

impl SupervisionReport {
    /// Re-raise the deferred callback error, if one was captured.
    pub fn into_result(self) -> Result<SupervisionOutcome, CallbackError> {
        match self.deferred_error {
            Some(err) => Err(err),
            None => Ok(self.outcome),
        }
    }
}

/// Owner-side handle of one supervised process.
#[derive(Debug)]
pub struct Supervisor {
    handle: ProcessHandle,
    cancel: Option<oneshot::Sender<()>>,
    task: JoinHandle<SupervisionReport>,
}

impl Supervisor {
    /// Launch `command` and start draining it on its own Tokio task.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start<C>(
        command: CommandSpec,
        label: Option<String>,
        callbacks: C,
        options: SupervisorOptions,
    ) -> Result<Self, LaunchError>
    where
        C: SupervisorCallbacks,
    {
        let process = launch(&command)?;
        let handle = ProcessHandle::new(label, command.to_string(), process.pid());

        info!(
            label = %handle.display_name(),
            pid = ?handle.pid(),
            cmd = %command,
            "supervising process"
        );

        let callbacks = Arc::new(callbacks);
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let mut drain = DrainLoop {
            process,
            handle: handle.clone(),
            callbacks: Arc::clone(&callbacks),
            options,
            cancel_rx,
            stdout_lines: LineAssembler::new(),
            stderr_lines: LineAssembler::new(),
            deferred: None,
        };
        drain.capture(guarded(CallbackStage::Start, || {
            callbacks.on_start(&handle);
            Ok(())
        }));
        let task = tokio::spawn(drain.run());

        Ok(Self {
            handle,
            cancel: Some(cancel_tx),
            task,
        })
    }

    pub fn handle(&self) -> &ProcessHandle {
        &self.handle
    }

    /// True once the drain loop task has returned.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Request cooperative shutdown and wait for the drain loop to stop.
    ///
    /// The process itself is only killed when `kill_on_stop` is set. If the
    /// process already completed, the completed report is returned.
    pub async fn stop(mut self) -> Result<SupervisionReport, SupervisorError> {
        if let Some(cancel) = self.cancel.take() {
            if cancel.send(()).is_err() {
                debug!(
                    label = %self.handle.display_name(),
                    "drain loop already finished while stopping"
                );
            }
        }
        Ok(self.task.await?)
    }

    /// Wait for the drain loop to finish on its own.
    pub async fn join(self) -> Result<SupervisionReport, SupervisorError> {
        Ok(self.task.await?)
    }

    /// Wait for completion and re-raise any deferred callback error.
    pub async fn wait(self) -> Result<SupervisionOutcome, SupervisorError> {
        Ok(self.join().await?.into_result()?)
    }
}

/// Launch a shell command with default options.
pub fn launch_supervised<C>(
    command: &str,
    label: Option<String>,
    on_progress: C,
) -> Result<Supervisor, LaunchError>
where
    C: SupervisorCallbacks,
{
    Supervisor::start(
        CommandSpec::shell(command),
        label,
        on_progress,
        SupervisorOptions::default(),
    )
}

struct ExitState {
    code: i32,
    /// First post-exit cycle in which neither stream had data.
    quiet_since: Option<Instant>,
}

impl ExitState {
    fn new(code: i32) -> Self {
        Self {
            code,
            quiet_since: None,
        }
    }
}

struct DrainLoop<C: SupervisorCallbacks> {
    process: LaunchedProcess,
    handle: ProcessHandle,
    callbacks: Arc<C>,
    options: SupervisorOptions,
    cancel_rx: oneshot::Receiver<()>,
    stdout_lines: LineAssembler,
    stderr_lines: LineAssembler,
    deferred: Option<CallbackError>,
}

impl<C: SupervisorCallbacks> DrainLoop<C> {
    async fn run(mut self) -> SupervisionReport {
        let mut buf = vec![0u8; self.options.read_chunk.max(1)];
        let mut exited: Option<ExitState> = None;

        loop {
            if self.cancel_requested() {
                return self.detach().await;
            }

            let out = self.process.try_read_stdout(&mut buf);
            if let ReadOutcome::Data(n) = out {
                for line in self.stdout_lines.push(&buf[..n]) {
                    self.dispatch_output_line(&line);
                }
            }

            let err = self.process.try_read_stderr(&mut buf);
            if let ReadOutcome::Data(n) = err {
                for line in self.stderr_lines.push(&buf[..n]) {
                    self.dispatch_error_line(&line);
                }
            }

            let produced = out.is_data() || err.is_data();

            let exit_seen_now = exited.is_none() && {
                exited = self.poll_exit();
                exited.is_some()
            };

            if let Some(exit) = exited.as_mut() {
                if !produced && self.streams_drained(out, err, exit, exit_seen_now) {
                    let code = exit.code;
                    return self.complete(code);
                }
            }

            if !produced {
                sleep(self.options.idle_delay).await;
            }
        }
    }

    fn poll_exit(&mut self) -> Option<ExitState> {
        let code = match self.process.try_exit_code() {
            Ok(Some(code)) => code,
            Ok(None) => return None,
            Err(e) => {
                warn!(
                    label = %self.handle.display_name(),
                    error = %e,
                    "failed to poll process status; treating as exited"
                );
                -1
            }
        };
        debug!(
            label = %self.handle.display_name(),
            exit_code = code,
            "process exited; draining remaining output"
        );
        self.handle.set_state(SupervisorState::Draining);
        Some(ExitState::new(code))
    }

    fn cancel_requested(&mut self) -> bool {
        // A dropped sender (owner went away) is not a cancellation request.
        matches!(self.cancel_rx.try_recv(), Ok(()))
    }

    /// Called only for cycles that produced no data after the exit was seen.
    fn streams_drained(
        &self,
        out: ReadOutcome,
        err: ReadOutcome,
        exit: &mut ExitState,
        exit_seen_now: bool,
    ) -> bool {
        if out == ReadOutcome::Closed && err == ReadOutcome::Closed {
            return true;
        }
        // The reads of this cycle happened before the exit was observed.
        if exit_seen_now {
            return false;
        }
        match exit.quiet_since {
            None => {
                exit.quiet_since = Some(Instant::now());
                false
            }
            Some(since) if since.elapsed() >= self.options.exit_linger => {
                warn!(
                    label = %self.handle.display_name(),
                    "output pipes still open after exit; assuming drained"
                );
                true
            }
            Some(_) => false,
        }
    }

    fn dispatch_output_line(&mut self, line: &str) {
        if let Some(progress) = extract_progress(line) {
            self.handle.set_progress(progress);
            let update = ProgressUpdate {
                handle: self.handle.clone(),
                progress,
                complete: false,
                exit_code: None,
            };
            let callbacks = Arc::clone(&self.callbacks);
            self.capture(guarded(CallbackStage::Progress, || {
                callbacks.on_progress(&update)
            }));
        }

        self.handle.record_output(line);
        let callbacks = Arc::clone(&self.callbacks);
        let handle = self.handle.clone();
        self.capture(guarded(CallbackStage::OutputLine, || {
            callbacks.on_output_line(&handle, line)
        }));
    }

    fn dispatch_error_line(&mut self, line: &str) {
        self.handle.record_error(line);
        let callbacks = Arc::clone(&self.callbacks);
        let handle = self.handle.clone();
        self.capture(guarded(CallbackStage::ErrorLine, || {
            callbacks.on_error_line(&handle, line)
        }));
    }

    fn capture(&mut self, result: Result<(), CallbackError>) {
        if let Err(err) = result {
            warn!(
                label = %self.handle.display_name(),
                error = %err,
                "callback failed; continuing to drain"
            );
            self.deferred = Some(err);
        }
    }

    fn complete(mut self, exit_code: i32) -> SupervisionReport {
        if let Some(line) = self.stdout_lines.finish() {
            self.dispatch_output_line(&line);
        }
        if let Some(line) = self.stderr_lines.finish() {
            self.dispatch_error_line(&line);
        }

        if !self.handle.set_exit_code(exit_code) {
            warn!(label = %self.handle.display_name(), "exit code was already recorded");
        }
        self.handle.set_state(SupervisorState::Completed);

        let progress = self.handle.progress();
        info!(
            label = %self.handle.display_name(),
            exit_code,
            progress,
            "process completed"
        );

        let update = ProgressUpdate {
            handle: self.handle.clone(),
            progress,
            complete: true,
            exit_code: Some(exit_code),
        };
        let callbacks = Arc::clone(&self.callbacks);
        self.capture(guarded(CallbackStage::Completion, || {
            callbacks.on_progress(&update)
        }));

        SupervisionReport {
            handle: self.handle,
            outcome: SupervisionOutcome::Completed {
                exit_code,
                progress,
            },
            deferred_error: self.deferred,
        }
    }

    async fn detach(mut self) -> SupervisionReport {
        if self.options.kill_on_stop {
            info!(label = %self.handle.display_name(), "stop requested; killing process");
            if let Err(e) = self.process.kill().await {
                warn!(
                    label = %self.handle.display_name(),
                    error = %e,
                    "failed to kill process on stop"
                );
            }
        } else {
            info!(
                label = %self.handle.display_name(),
                "stop requested; detaching from process"
            );
        }
        self.handle.set_state(SupervisorState::Detached);

        SupervisionReport {
            handle: self.handle,
            outcome: SupervisionOutcome::Detached,
            deferred_error: self.deferred,
        }
    }
}
