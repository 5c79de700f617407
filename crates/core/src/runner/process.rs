//! Single-process runner with line-oriented output events.

use std::process::{ExitStatus, Stdio};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{timeout_at, Duration, Instant};
use tracing::{debug, trace, warn};

use crate::plan::{CommandPlan, LogTag};

use super::error::RunnerError;
use super::lines::LineBuffer;

const READ_CHUNK_SIZE: usize = 4096;

/// How long output may keep flowing after the process has exited.
const OUTPUT_DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Which output stream a line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitKind {
    /// The process returned an exit code.
    Normal,
    /// The process was ended by a signal.
    Crashed,
}

/// Events published by a [`ProcessRunner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunnerEvent {
    /// One complete, non-empty output line.
    Line {
        stream: OutputStream,
        line: String,
        tag: LogTag,
    },
    /// The process exited. Always the last event of a process.
    Exited {
        code: Option<i32>,
        kind: ExitKind,
        tag: LogTag,
    },
    /// Waiting on the process failed. Also terminal.
    Failed { reason: String, tag: LogTag },
}

impl RunnerEvent {
    fn is_terminal(&self) -> bool {
        matches!(self, Self::Exited { .. } | Self::Failed { .. })
    }
}

struct ActiveProcess {
    pid: Option<u32>,
    tag: LogTag,
    // Dropping the sender without sending also kills the process.
    kill_tx: Option<oneshot::Sender<()>>,
}

/// Runs at most one external process at a time.
///
/// Output and exit notifications are delivered in order through
/// [`next_event`](Self::next_event). Every line of a process arrives before
/// its exit event; output still pending shortly after the exit is dropped.
/// Dropping the runner kills a process that is still alive.
pub struct ProcessRunner {
    events_tx: mpsc::UnboundedSender<RunnerEvent>,
    events_rx: mpsc::UnboundedReceiver<RunnerEvent>,
    active: Option<ActiveProcess>,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRunner {
    pub fn new() -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            events_tx,
            events_rx,
            active: None,
        }
    }

    /// Whether a started process has not yet reported its exit.
    pub fn is_running(&self) -> bool {
        self.active.is_some()
    }

    /// Launches the plan's program.
    ///
    /// Returns once the OS has created the process. On failure the runner
    /// stays idle.
    pub fn start(&mut self, plan: &CommandPlan) -> Result<(), RunnerError> {
        if self.active.is_some() {
            return Err(RunnerError::AlreadyRunning);
        }

        let mut child = Command::new(&plan.program)
            .args(&plan.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| RunnerError::Spawn {
                program: plan.program.clone(),
                source,
            })?;

        let pid = child.id();
        let tag = plan.tag;
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(tokio::spawn(pump_stream(
                stdout,
                OutputStream::Stdout,
                tag,
                self.events_tx.clone(),
            )));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(tokio::spawn(pump_stream(
                stderr,
                OutputStream::Stderr,
                tag,
                self.events_tx.clone(),
            )));
        }

        let (kill_tx, kill_rx) = oneshot::channel();
        tokio::spawn(watch_process(
            child,
            kill_rx,
            readers,
            tag,
            self.events_tx.clone(),
        ));

        debug!("Started {} ({}) pid={:?}", plan.program.display(), tag, pid);
        self.active = Some(ActiveProcess {
            pid,
            tag,
            kill_tx: Some(kill_tx),
        });
        Ok(())
    }

    /// Asks the running process to stop (SIGTERM on Unix).
    pub fn terminate(&mut self) {
        let Some(active) = self.active.as_ref() else {
            return;
        };

        #[cfg(unix)]
        {
            if let Some(pid) = active.pid {
                match send_sigterm(pid) {
                    Ok(()) => debug!("Sent SIGTERM to {} (pid {})", active.tag, pid),
                    Err(e) => warn!("Failed to terminate {} (pid {}): {}", active.tag, pid, e),
                }
            }
        }

        #[cfg(not(unix))]
        {
            debug!("No polite stop on this platform, killing {}", active.tag);
            self.kill();
        }
    }

    /// Forces the running process to stop.
    pub fn kill(&mut self) {
        if let Some(active) = self.active.as_mut() {
            if let Some(tx) = active.kill_tx.take() {
                debug!("Killing {}", active.tag);
                let _ = tx.send(());
            }
        }
    }

    /// Waits for the next event of the current process.
    ///
    /// Pends forever while idle, so it is safe to poll from a `select!` loop.
    pub async fn next_event(&mut self) -> Option<RunnerEvent> {
        let event = self.events_rx.recv().await?;
        if event.is_terminal() {
            self.active = None;
        }
        Some(event)
    }
}

async fn pump_stream<R>(
    mut reader: R,
    stream: OutputStream,
    tag: LogTag,
    tx: mpsc::UnboundedSender<RunnerEvent>,
) where
    R: AsyncRead + Unpin,
{
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    let mut lines = LineBuffer::new();

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                for line in lines.push(&chunk[..n]) {
                    trace!("{} {:?}: {}", tag, stream, line);
                    if tx.send(RunnerEvent::Line { stream, line, tag }).is_err() {
                        return;
                    }
                }
            }
            Err(e) => {
                warn!("Failed to read {:?} of {}: {}", stream, tag, e);
                break;
            }
        }
    }

    if let Some(line) = lines.finish() {
        let _ = tx.send(RunnerEvent::Line { stream, line, tag });
    }
}

async fn watch_process(
    mut child: Child,
    mut kill_rx: oneshot::Receiver<()>,
    readers: Vec<JoinHandle<()>>,
    tag: LogTag,
    tx: mpsc::UnboundedSender<RunnerEvent>,
) {
    let status = tokio::select! {
        status = child.wait() => status,
        _ = &mut kill_rx => {
            if let Err(e) = child.start_kill() {
                debug!("Kill of {} not delivered: {}", tag, e);
            }
            child.wait().await
        }
    };

    // Drain output before announcing the exit. A descendant may keep the
    // pipes open long after the child is gone, so the drain is bounded.
    let deadline = Instant::now() + OUTPUT_DRAIN_GRACE;
    for mut reader in readers {
        if timeout_at(deadline, &mut reader).await.is_err() {
            debug!("Output of {} still open after exit, dropping the rest", tag);
            reader.abort();
            // Returns once the pump has stopped sending.
            let _ = reader.await;
        }
    }

    let event = match status {
        Ok(status) => RunnerEvent::Exited {
            code: status.code(),
            kind: exit_kind(&status),
            tag,
        },
        Err(e) => RunnerEvent::Failed {
            reason: e.to_string(),
            tag,
        },
    };
    let _ = tx.send(event);
}

fn exit_kind(status: &ExitStatus) -> ExitKind {
    if status.code().is_some() {
        ExitKind::Normal
    } else {
        ExitKind::Crashed
    }
}

#[cfg(unix)]
fn send_sigterm(pid: u32) -> std::io::Result<()> {
    let pid = libc::pid_t::try_from(pid)
        .map_err(|_| std::io::Error::new(std::io::ErrorKind::InvalidInput, "pid out of range"))?;
    // SAFETY: kill(2) only takes integers and touches no memory of ours.
    let ret = unsafe { libc::kill(pid, libc::SIGTERM) };
    if ret == 0 {
        Ok(())
    } else {
        Err(std::io::Error::last_os_error())
    }
}
