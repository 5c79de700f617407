//! `vidgif <input> <output>`: converts one video using settings from
//! `vidgif.toml` (or the file named by `VIDGIF_CONFIG`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use once_cell::sync::Lazy;
use regex_lite::Regex;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidgif_core::{
    load_config_or_default, validate_config, validate_job, ConversionJob, ConversionWorker,
    FfprobeProbe, JobEvent, JobStatus, MediaProbe,
};

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]+>").unwrap());

/// Conventional exit status after an interrupt.
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(JobStatus::Succeeded) => {}
        Ok(JobStatus::Cancelled) => std::process::exit(EXIT_CANCELLED),
        Ok(JobStatus::Failed) => std::process::exit(1),
        Err(e) => {
            error!("Fatal error: {:#}", e);
            std::process::exit(1);
        }
    }
}

async fn run() -> Result<JobStatus> {
    // Initialize logging
    let json_logs = std::env::var("VIDGIF_LOG_FORMAT").is_ok_and(|f| f == "json");
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    let registry = tracing_subscriber::registry().with(filter);
    if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let mut args = std::env::args_os().skip(1);
    let (Some(input), Some(output), None) = (args.next(), args.next(), args.next()) else {
        bail!("usage: vidgif <input> <output>");
    };
    let input = PathBuf::from(input);
    let output = PathBuf::from(output);

    // Determine config path
    let config_path = std::env::var("VIDGIF_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("vidgif.toml"));

    info!("Loading configuration from {:?}", config_path);
    let config = load_config_or_default(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;
    validate_config(&config).context("Configuration validation failed")?;

    let mut job = ConversionJob::new(&input, &output).with_settings(config.encode.clone());

    let probe = FfprobeProbe::new(config.tools.ffprobe.clone(), config.pipeline.probe_timeout());
    match probe.probe(&input).await {
        Ok(info) => {
            if let (Some(width), Some(height)) = (info.width, info.height) {
                info!(fps = ?info.fps, "Source frame size: {}x{}", width, height);
            }
            match info.duration_secs {
                Some(duration) => {
                    info!("Source duration: {:.2} s", duration);
                    job = job.with_duration(duration);
                }
                None => warn!("Source duration unknown, progress will be approximate"),
            }
        }
        Err(e) => warn!("Could not probe {:?}: {}", input, e),
    }

    validate_job(&job).context("Invalid job")?;

    let (worker, mut events) =
        ConversionWorker::new(job, config.tools.clone(), Arc::new(config.pipeline.clone()));
    let handle = worker.spawn();

    let cancel = handle.cancel_handle();
    tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Interrupted, cancelling conversion");
        cancel.cancel();
    });

    while let Some(event) = events.recv().await {
        let done = matches!(event, JobEvent::Finished(_));
        print_event(&event);
        if done {
            break;
        }
    }

    let result = handle.wait().await;
    Ok(result.status)
}

fn print_event(event: &JobEvent) {
    match event {
        JobEvent::Log { step, message } => println!("[{}] {}", step, message),
        JobEvent::RichLog { html } => {
            let text = TAG_RE.replace_all(html, "");
            let text = text.trim();
            if !text.is_empty() {
                println!("{}", text);
            }
        }
        JobEvent::Progress(update) => println!("{:>4} {}", update.percent, update.message),
        JobEvent::Finished(result) => {
            println!();
            println!("{}", result.title);
            println!("{}", result.message);
        }
    }
}

/// Wait for an interrupt (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
