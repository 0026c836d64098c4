// src/exec/launcher.rs

//! Process launcher.
//!
//! Starts a command with stdout/stderr captured and exposes them as
//! non-blocking byte streams. Each pipe is drained by a small Tokio "pump"
//! task that forwards raw chunks over a bounded channel; reading from the
//! stream is then a `try_recv` that never suspends the caller.

use std::fmt;
use std::process::Stdio;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::mpsc::{self, error::TryRecvError};
use tracing::{debug, warn};

use crate::errors::LaunchError;

/// Size of the chunks the pump tasks read from a pipe.
const PUMP_CHUNK_SIZE: usize = 1024;

/// Chunks buffered per stream before the pump waits for the reader.
const PUMP_CHANNEL_CAPACITY: usize = 64;

/// What to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandSpec {
    /// A command line handed to the platform shell (`sh -c` / `cmd /C`).
    Shell(String),
    /// A program and its arguments, executed directly.
    Argv { program: String, args: Vec<String> },
}

impl CommandSpec {
    pub fn shell(cmd: impl Into<String>) -> Self {
        CommandSpec::Shell(cmd.into())
    }

    pub fn argv<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::Argv {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            CommandSpec::Shell(cmd) => cmd.trim().is_empty(),
            CommandSpec::Argv { program, .. } => program.trim().is_empty(),
        }
    }

    fn to_command(&self) -> Command {
        match self {
            CommandSpec::Shell(line) => {
                if cfg!(windows) {
                    let mut c = Command::new("cmd");
                    c.arg("/C").arg(line);
                    c
                } else {
                    let mut c = Command::new("sh");
                    c.arg("-c").arg(line);
                    c
                }
            }
            CommandSpec::Argv { program, args } => {
                let mut c = Command::new(program);
                c.args(args);
                c
            }
        }
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandSpec::Shell(line) => f.write_str(line),
            CommandSpec::Argv { program, args } => {
                f.write_str(program)?;
                for arg in args {
                    write!(f, " {arg}")?;
                }
                Ok(())
            }
        }
    }
}

/// Result of a single non-blocking read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// This many bytes were copied into the caller's buffer.
    Data(usize),
    /// Nothing available right now; the stream is still open.
    Empty,
    /// The stream hit end-of-file and every byte has been handed out.
    Closed,
}

impl ReadOutcome {
    pub fn is_data(self) -> bool {
        matches!(self, ReadOutcome::Data(_))
    }
}

/// Non-blocking view of one captured output pipe.
#[derive(Debug)]
pub struct OutputStream {
    rx: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
    offset: usize,
    closed: bool,
}

impl OutputStream {
    fn spawn<R>(reader: R, stream: &'static str) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<Vec<u8>>(PUMP_CHANNEL_CAPACITY);
        tokio::spawn(pump(reader, tx, stream));
        Self::from_receiver(rx)
    }

    fn from_receiver(rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            pending: Vec::new(),
            offset: 0,
            closed: false,
        }
    }

    /// A stream that is already at end-of-file.
    fn closed() -> Self {
        let (_tx, rx) = mpsc::channel(1);
        Self::from_receiver(rx)
    }

    /// Copy up to `buf.len()` bytes without waiting.
    pub fn try_read(&mut self, buf: &mut [u8]) -> ReadOutcome {
        if buf.is_empty() {
            return ReadOutcome::Empty;
        }

        if self.offset >= self.pending.len() {
            if self.closed {
                return ReadOutcome::Closed;
            }
            match self.rx.try_recv() {
                Ok(chunk) => {
                    self.pending = chunk;
                    self.offset = 0;
                }
                Err(TryRecvError::Empty) => return ReadOutcome::Empty,
                Err(TryRecvError::Disconnected) => {
                    self.closed = true;
                    return ReadOutcome::Closed;
                }
            }
        }

        let available = &self.pending[self.offset..];
        let n = available.len().min(buf.len());
        buf[..n].copy_from_slice(&available[..n]);
        self.offset += n;
        ReadOutcome::Data(n)
    }
}

async fn pump<R>(mut reader: R, tx: mpsc::Sender<Vec<u8>>, stream: &'static str)
where
    R: AsyncRead + Unpin,
{
    loop {
        let mut chunk = vec![0u8; PUMP_CHUNK_SIZE];
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                chunk.truncate(n);
                if tx.send(chunk).await.is_err() {
                    debug!(stream, "output reader dropped; stopping pump");
                    return;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(stream, error = %e, "error reading child output; treating as end of stream");
                break;
            }
        }
    }
    debug!(stream, "output pump reached end of stream");
}

/// A started OS process with non-blocking access to its output.
#[derive(Debug)]
pub struct LaunchedProcess {
    child: Child,
    pid: Option<u32>,
    stdout: OutputStream,
    stderr: OutputStream,
}

/// Start `spec` with stdin closed and stdout/stderr captured.
///
/// Must be called from within a Tokio runtime.
pub fn launch(spec: &CommandSpec) -> Result<LaunchedProcess, LaunchError> {
    if spec.is_empty() {
        return Err(LaunchError::EmptyCommand);
    }

    let mut cmd = spec.to_command();
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(false);

    let mut child = cmd.spawn().map_err(|source| LaunchError::Spawn {
        command: spec.to_string(),
        source,
    })?;

    let pid = child.id();
    let stdout = match child.stdout.take() {
        Some(out) => OutputStream::spawn(out, "stdout"),
        None => OutputStream::closed(),
    };
    let stderr = match child.stderr.take() {
        Some(err) => OutputStream::spawn(err, "stderr"),
        None => OutputStream::closed(),
    };

    debug!(command = %spec, ?pid, "process launched");

    Ok(LaunchedProcess {
        child,
        pid,
        stdout,
        stderr,
    })
}

impl LaunchedProcess {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn try_read_stdout(&mut self, buf: &mut [u8]) -> ReadOutcome {
        self.stdout.try_read(buf)
    }

    pub fn try_read_stderr(&mut self, buf: &mut [u8]) -> ReadOutcome {
        self.stderr.try_read(buf)
    }

    /// Poll for the exit code without waiting.
    ///
    /// Processes terminated by a signal report `-1`.
    pub fn try_exit_code(&mut self) -> std::io::Result<Option<i32>> {
        Ok(self
            .child
            .try_wait()?
            .map(|status| status.code().unwrap_or(-1)))
    }

    /// Kill the process and reap it.
    pub async fn kill(&mut self) -> std::io::Result<()> {
        self.child.kill().await
    }
}
