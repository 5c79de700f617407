//! The per-job state machine.

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, info_span, trace, warn, Instrument};
use uuid::Uuid;

use super::cancel::CancelHandle;
use super::error::PipelineError;
use super::filter::StderrFilter;
use super::step::{next_step, Step};
use super::types::{JobEvent, JobResult};
use crate::config::PipelineConfig;
use crate::job::{ConversionJob, OutputKind, ToolPaths};
use crate::plan::{self, CommandPlan, LogTag};
use crate::probe::{FfprobeProbe, MediaInfo, MediaProbe, ProbeError};
use crate::progress::{
    estimate_total_frames, Percent, ProgressAggregator, ProgressUpdate, RenderReading,
    RenderTracker,
};
use crate::runner::{ExitKind, OutputStream, ProcessRunner, RunnerEvent};

const TEMP_DIR_PREFIX: &str = "vidgif-";
const ERROR_SUMMARY_CHARS: usize = 50;

/// Runs one conversion job from first step to terminal result.
pub struct ConversionWorker {
    id: Uuid,
    job: ConversionJob,
    tools: ToolPaths,
    config: Arc<PipelineConfig>,
    probe: Arc<dyn MediaProbe>,
    kind: OutputKind,
    aggregator: ProgressAggregator,
    filter: StderrFilter,
    cancel: CancelHandle,
    events: mpsc::UnboundedSender<JobEvent>,
}

/// A spawned job.
pub struct JobHandle {
    pub id: Uuid,
    cancel: CancelHandle,
    join: JoinHandle<JobResult>,
}

impl JobHandle {
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Waits for the job to end.
    pub async fn wait(self) -> JobResult {
        match self.join.await {
            Ok(result) => result,
            Err(e) => {
                error!("Job {} task failed: {}", self.id, e);
                JobResult::failed(format!("Worker task failed: {}", e))
            }
        }
    }
}

/// Mutable resources of a running job. Dropped exactly once, in `finish`.
struct JobState {
    runner: ProcessRunner,
    render: RenderTracker,
    temp_dir: Option<TempDir>,
    palette_file: Option<PathBuf>,
    last_percent: u8,
}

impl ConversionWorker {
    /// Creates a worker and the receiver for its events.
    pub fn new(
        job: ConversionJob,
        tools: ToolPaths,
        config: Arc<PipelineConfig>,
    ) -> (Self, mpsc::UnboundedReceiver<JobEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let kind = job.output_kind();
        let probe = Arc::new(FfprobeProbe::new(
            tools.ffprobe.clone(),
            config.probe_timeout(),
        ));
        let worker = Self {
            id: Uuid::new_v4(),
            aggregator: ProgressAggregator::new(config.weights, kind),
            filter: StderrFilter::new(&config.stderr_ignore),
            kind,
            job,
            tools,
            config,
            probe,
            cancel: CancelHandle::new(),
            events,
        };
        (worker, rx)
    }

    /// Replaces the ffprobe-backed media probe.
    pub fn with_probe(mut self, probe: Arc<dyn MediaProbe>) -> Self {
        self.probe = probe;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Runs the job on its own task.
    pub fn spawn(self) -> JobHandle {
        let id = self.id;
        let cancel = self.cancel.clone();
        let join = tokio::spawn(self.run());
        JobHandle { id, cancel, join }
    }

    /// Runs the job to completion. Emits `Finished` before returning.
    pub async fn run(self) -> JobResult {
        let span = info_span!("job", id = %self.id, kind = self.kind.label());
        self.execute().instrument(span).await
    }

    async fn execute(self) -> JobResult {
        info!(
            "Converting {} -> {}",
            self.job.input_path.display(),
            self.job.output_path.display()
        );

        let mut cancel_rx = self.cancel.subscribe();
        let estimate = self.frame_estimate(&mut cancel_rx).await;
        let mut state = JobState {
            runner: ProcessRunner::new(),
            render: RenderTracker::new(self.job.known_duration(), estimate),
            temp_dir: None,
            palette_file: None,
            last_percent: 0,
        };

        let outcome = self.drive(&mut state, &mut cancel_rx).await;
        self.finish(state, outcome)
    }

    /// Gives up without an estimate if the job is cancelled mid-probe.
    async fn frame_estimate(&self, cancel_rx: &mut watch::Receiver<bool>) -> Option<u64> {
        let duration = self.job.known_duration()?;
        let fps = match self.job.settings.fps {
            Some(fps) => Some(fps as f64),
            None => match self.probe_cancellable(cancel_rx).await? {
                Ok(info) => {
                    debug!("{} reports {:?} fps", self.probe.name(), info.fps);
                    info.fps
                }
                Err(e) => {
                    warn!("Could not detect source frame rate: {}", e);
                    None
                }
            },
        };
        let estimate = estimate_total_frames(Some(duration), fps);
        if let Some(frames) = estimate {
            debug!("Expecting about {} frames", frames);
        }
        estimate
    }

    async fn probe_cancellable(
        &self,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> Option<Result<MediaInfo, ProbeError>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            result = self.probe.probe(&self.job.input_path) => Some(result),
            _ = cancelled(cancel_rx) => {
                debug!("Probe abandoned, job cancelled");
                None
            }
        }
    }

    async fn drive(
        &self,
        state: &mut JobState,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> Result<(), PipelineError> {
        let mut step = Step::first(self.kind);

        while step != Step::Finished {
            if self.cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }

            let plan = self.prepare(step, state)?;
            self.log(step, format!("Cmd: {}", plan.display()));
            info!(program = %plan.program.display(), tag = %plan.tag, "Launching {}", step);
            state
                .runner
                .start(&plan)
                .map_err(|e| PipelineError::Launch {
                    tag: plan.tag,
                    reason: e.to_string(),
                })?;

            self.supervise(step, plan.tag, state, cancel_rx).await?;
            self.complete(step, state);
            step = next_step(self.kind, step, state.render.frames());
            // Callers see the completion events before the next launch.
            tokio::task::yield_now().await;
        }

        Ok(())
    }

    /// Builds the plan for `step` and announces it.
    fn prepare(&self, step: Step, state: &mut JobState) -> Result<CommandPlan, PipelineError> {
        match step {
            Step::Palette => {
                let dir = self.create_temp_dir()?;
                let palette_file = dir.path().join(&self.config.palette_file_name);
                debug!("Palette goes to {}", palette_file.display());
                let plan = plan::palette_plan(&self.job, &self.tools, &palette_file);
                state.temp_dir = Some(dir);
                state.palette_file = Some(palette_file);

                self.log(step, "Generating palette…");
                self.progress(state, step, 5.0, "Generating palette…");
                Ok(plan)
            }
            Step::Render => {
                let plan = match self.kind {
                    OutputKind::Webp => plan::webp_render_plan(&self.job, &self.tools),
                    OutputKind::Gif => {
                        let palette_file = state
                            .palette_file
                            .as_ref()
                            .filter(|p| p.is_file())
                            .ok_or_else(|| PipelineError::MissingPalette {
                                path: state.palette_file.clone().unwrap_or_default(),
                            })?;
                        plan::gif_render_plan(&self.job, &self.tools, palette_file)
                    }
                };
                state.render.reset();

                let message = format!("Rendering {}…", self.kind.label());
                self.log(step, message.clone());
                if state.render.is_determinate() {
                    self.progress(state, step, 0.0, message);
                } else {
                    self.emit(JobEvent::Progress(ProgressUpdate::indeterminate(message)));
                }
                Ok(plan)
            }
            Step::Optimize => {
                self.log(step, "Optimizing GIF…");
                self.progress(state, step, 30.0, "Optimizing GIF…");
                Ok(plan::optimize_plan(&self.job, &self.tools))
            }
            Step::Idle | Step::Finished => Err(PipelineError::Process {
                tag: LogTag::FfmpegRender,
                reason: format!("no command for step {}", step),
            }),
        }
    }

    fn create_temp_dir(&self) -> Result<TempDir, PipelineError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_DIR_PREFIX);
        let dir = match &self.config.temp_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        }
        .map_err(PipelineError::TempDir)?;
        debug!("Created temp directory {}", dir.path().display());
        Ok(dir)
    }

    /// Waits for the running process, handling output, cancel and timeouts.
    async fn supervise(
        &self,
        step: Step,
        tag: LogTag,
        state: &mut JobState,
        cancel_rx: &mut watch::Receiver<bool>,
    ) -> Result<(), PipelineError> {
        let step_deadline = self.config.step_timeout().map(|t| Instant::now() + t);
        let mut kill_deadline: Option<Instant> = None;
        // Set once we have asked the process to stop; reported instead of its exit status.
        let mut stopping: Option<PipelineError> = None;

        loop {
            tokio::select! {
                event = state.runner.next_event() => {
                    let Some(event) = event else {
                        return Err(PipelineError::Process {
                            tag,
                            reason: "process events closed".to_string(),
                        });
                    };
                    match event {
                        RunnerEvent::Line { stream, line, .. } => {
                            self.on_line(step, tag, stream, &line, state);
                        }
                        RunnerEvent::Exited { code, kind, .. } => {
                            if let Some(reason) = stopping {
                                return Err(reason);
                            }
                            debug!("{} exited with {:?} ({:?})", tag, code, kind);
                            return match (kind, code) {
                                (ExitKind::Normal, Some(0)) => Ok(()),
                                _ => Err(PipelineError::ProcessFailed {
                                    tag,
                                    code: code.unwrap_or(-1),
                                    crashed: kind == ExitKind::Crashed,
                                }),
                            };
                        }
                        RunnerEvent::Failed { reason, .. } => {
                            return Err(stopping.unwrap_or(PipelineError::Process { tag, reason }));
                        }
                    }
                }
                Ok(()) = cancel_rx.changed(), if stopping.is_none() => {
                    if *cancel_rx.borrow_and_update() {
                        self.log(step, "Cancellation requested by user.");
                        self.request_stop(step, tag, state);
                        stopping = Some(PipelineError::Cancelled);
                        kill_deadline = Some(Instant::now() + self.config.kill_grace());
                    }
                }
                _ = sleep_until_opt(step_deadline), if stopping.is_none() && step_deadline.is_some() => {
                    let secs = self.config.step_timeout_secs;
                    warn!("{} ran longer than {} seconds", tag, secs);
                    self.request_stop(step, tag, state);
                    stopping = Some(PipelineError::Timeout { tag, secs });
                    kill_deadline = Some(Instant::now() + self.config.kill_grace());
                }
                _ = sleep_until_opt(kill_deadline), if kill_deadline.is_some() => {
                    self.log(step, format!("Process didn't die; sending SIGKILL to {}…", tag));
                    state.runner.kill();
                    kill_deadline = None;
                }
            }
        }
    }

    fn request_stop(&self, step: Step, tag: LogTag, state: &mut JobState) {
        self.log(step, format!("Terminating {}…", tag));
        state.runner.terminate();
    }

    fn on_line(
        &self,
        step: Step,
        tag: LogTag,
        stream: OutputStream,
        line: &str,
        state: &mut JobState,
    ) {
        match stream {
            OutputStream::Stderr => {
                if self.filter.is_ignored(line) {
                    trace!("{}-stderr (ignored): {}", tag, line);
                } else {
                    self.log_output(step, format!("{}-stderr: {}", tag, line));
                }
            }
            OutputStream::Stdout => match step {
                Step::Render => {
                    trace!("{}: {}", tag, line);
                    self.on_render_line(line, state);
                }
                Step::Optimize => self.log_output(step, format!("{}: {}", tag, line)),
                _ => trace!("{}: {}", tag, line),
            },
        }
    }

    fn on_render_line(&self, line: &str, state: &mut JobState) {
        let label = self.kind.label();
        match state.render.observe(line) {
            Some(RenderReading::Percent(local)) => {
                let message = format!("Rendering {}: {} %", label, local.round() as u32);
                self.progress(state, Step::Render, local, message);
            }
            Some(RenderReading::Frames(frames)) => {
                let message = format!("Rendering {}: {} frames", label, frames);
                self.emit(JobEvent::Progress(ProgressUpdate::indeterminate(message)));
            }
            None => {}
        }
    }

    fn complete(&self, step: Step, state: &mut JobState) {
        let message = match step {
            Step::Palette => "Palette generated.".to_string(),
            Step::Render => format!("{} rendered.", self.kind.label()),
            Step::Optimize => "GIF optimised.".to_string(),
            Step::Idle | Step::Finished => return,
        };
        self.log(step, message.clone());
        self.progress(state, step, 100.0, message);
    }

    /// Single exit point: releases every resource, then reports the outcome.
    fn finish(&self, state: JobState, outcome: Result<(), PipelineError>) -> JobResult {
        let frames = state.render.frames();
        let JobState {
            runner, temp_dir, ..
        } = state;

        let result = match outcome {
            Ok(()) => {
                let output = std::fs::canonicalize(&self.job.output_path)
                    .unwrap_or_else(|_| self.job.output_path.clone());
                let label = self.kind.label();
                let frames_text = if frames == 0 {
                    "N/A".to_string()
                } else {
                    frames.to_string()
                };

                self.emit(JobEvent::RichLog {
                    html: format!(
                        "<br><font color=\"green\">Generated {} frames</font>",
                        frames_text
                    ),
                });
                self.emit(JobEvent::RichLog {
                    html: format!(
                        "<br><font color=\"green\">{} saved as:</font> {}",
                        label,
                        output.display()
                    ),
                });
                self.emit(JobEvent::Progress(ProgressUpdate::new(
                    Percent::Value(100),
                    format!("Done! {} frames.", frames_text),
                )));
                info!("Wrote {} ({} frames)", output.display(), frames_text);

                let message = format!(
                    "{} saved.\nFrames: {}\nOutput: {}",
                    label,
                    frames_text,
                    output.display()
                );
                JobResult::succeeded(message, output, frames)
            }
            Err(PipelineError::Cancelled) => {
                self.log(Step::Finished, "Operation cancelled.");
                self.emit(JobEvent::Progress(ProgressUpdate::new(
                    Percent::Value(0),
                    "Cancelled.",
                )));
                JobResult::cancelled()
            }
            Err(e) => {
                let message = e.to_string();
                error!("Job failed: {}", message);
                self.emit(JobEvent::Log {
                    step: Step::Finished,
                    message: format!("ERROR: {}", message),
                });
                self.emit(JobEvent::Progress(ProgressUpdate::new(
                    Percent::Value(0),
                    error_summary(&message),
                )));
                JobResult::failed(message)
            }
        };

        // A process still alive at this point is killed on drop.
        drop(runner);
        if let Some(dir) = temp_dir {
            match dir.close() {
                Ok(()) => self.log(Step::Finished, "Temp directory cleaned up."),
                Err(e) => self.log(Step::Finished, format!("Temp cleanup error: {}", e)),
            }
        }

        self.emit(JobEvent::Finished(result.clone()));
        result
    }

    /// Emits a determinate update that never goes below the last one.
    fn progress(&self, state: &mut JobState, step: Step, local: f64, message: impl Into<String>) {
        let value = self.aggregator.global(step, local).max(state.last_percent);
        state.last_percent = value;
        self.emit(JobEvent::Progress(ProgressUpdate::new(
            Percent::Value(value),
            message,
        )));
    }

    fn log(&self, step: Step, message: impl Into<String>) {
        let message = message.into();
        info!(step = %step, "{}", message);
        self.emit(JobEvent::Log { step, message });
    }

    fn log_output(&self, step: Step, message: String) {
        debug!(step = %step, "{}", message);
        self.emit(JobEvent::Log { step, message });
    }

    fn emit(&self, event: JobEvent) {
        // A caller that stopped listening does not stop the job.
        let _ = self.events.send(event);
    }
}

fn error_summary(message: &str) -> String {
    let head: String = message.chars().take(ERROR_SUMMARY_CHARS).collect();
    format!("Error: {}…", head)
}

/// Resolves once the job is cancelled.
async fn cancelled(cancel_rx: &mut watch::Receiver<bool>) {
    loop {
        if *cancel_rx.borrow_and_update() {
            return;
        }
        if cancel_rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
