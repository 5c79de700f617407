pub mod config;
pub mod job;
pub mod pipeline;
pub mod plan;
pub mod probe;
pub mod progress;
pub mod runner;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, load_config_or_default, validate_config, Config,
    ConfigError, PipelineConfig,
};
pub use job::{
    validate_job, ConversionJob, DitherMode, EncodeSettings, JobError, OutputKind, PaletteMode,
    ToolPaths, WebpOptions,
};
pub use pipeline::{
    CancelHandle, ConversionWorker, JobEvent, JobHandle, JobResult, JobStatus, PipelineError,
    Step,
};
pub use plan::{CommandPlan, LogTag};
pub use probe::{FfprobeProbe, MediaInfo, MediaProbe, ProbeError};
pub use progress::{Percent, ProgressUpdate, StepWeights};
pub use runner::{ProcessRunner, RunnerError, RunnerEvent};
