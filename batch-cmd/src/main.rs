use std::future::Future;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use anyhow::Context;
use batch::{BatchConfig, BatchMessage, BatchReport, FailurePolicy, WorkerConfig};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Runs the per-scene worker for every scene in a manifest, once per seed.
#[derive(Parser, Debug)]
#[command(name = "batch-cmd")]
struct Args {
    /// TOML config file. Flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory holding the manifest and scene metadata
    #[arg(long)]
    data_root: Option<PathBuf>,

    /// Directory the per-scene outputs are written under
    #[arg(long)]
    output_root: Option<PathBuf>,

    /// Manifest file name inside the data root
    #[arg(long)]
    manifest: Option<String>,

    /// Seed to run every scene with. Repeat for several seeds.
    #[arg(long = "seed")]
    seeds: Vec<u64>,

    /// Pause after each worker run, in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Kill a worker after this many seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Worker executable. Replaces the configured worker arguments with --program-arg.
    #[arg(long)]
    program: Option<String>,

    /// Argument passed to the worker before the per-task flags. Repeatable.
    #[arg(long = "program-arg", allow_hyphen_values = true)]
    program_args: Vec<String>,

    /// Stop at the first failed worker
    #[arg(long)]
    fail_fast: bool,

    /// Print the commands without running them
    #[arg(long)]
    dry_run: bool,

    /// Write the JSON batch report here
    #[arg(long)]
    report: Option<PathBuf>,

    /// Exit with 0 even if some workers failed
    #[arg(long)]
    allow_failures: bool,
}

impl Args {
    fn to_config(&self) -> anyhow::Result<BatchConfig> {
        let mut config = match &self.config {
            Some(path) => BatchConfig::load(path)?,
            None => BatchConfig::default(),
        };

        if let Some(data_root) = &self.data_root {
            config.data_root = data_root.clone();
        }
        if let Some(output_root) = &self.output_root {
            config.output_root = output_root.clone();
        }
        if let Some(manifest) = &self.manifest {
            config.manifest_name = manifest.clone();
        }
        if !self.seeds.is_empty() {
            config.seeds = self.seeds.clone();
        }
        if let Some(delay_ms) = self.delay_ms {
            config.delay_ms = delay_ms;
        }
        if self.timeout_secs.is_some() {
            config.timeout_secs = self.timeout_secs;
        }
        match &self.program {
            Some(program) => {
                config.worker = WorkerConfig::new(program.clone(), self.program_args.clone());
            }
            None if !self.program_args.is_empty() => {
                config.worker.args = self.program_args.clone();
            }
            None => {}
        }
        if self.fail_fast {
            config.on_failure = FailurePolicy::FailFast;
        }
        if self.dry_run {
            config.dry_run = true;
        }

        config.validate()?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "batch_cmd=info,batch=info,scene_source=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    finish(run(&args).await)
}

/// Fatal errors exit with 2, apart from the 0/1 of a completed batch.
fn finish(result: anyhow::Result<ExitCode>) -> ExitCode {
    match result {
        Ok(code) => code,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(2)
        }
    }
}

async fn run(args: &Args) -> anyhow::Result<ExitCode> {
    let config = args.to_config()?;
    info!(
        "Processing scenes from {} into {}",
        config.data_root.display(),
        config.output_root.display()
    );

    let mut batch = batch::process_batch(config);
    let report = tokio::select! {
        report = batch.run_to_end(log_progress) => report?,
        _ = interrupted(tokio::signal::ctrl_c()) => {
            // Dropping the batch future kills the running worker.
            warn!("Interrupted, stopping batch");
            return Ok(ExitCode::from(130));
        }
    };

    if let Some(path) = &args.report {
        write_report(&report, path)?;
        info!("Report written to {}", path.display());
    }

    Ok(exit_code(&report, args.allow_failures))
}

/// Completes on Ctrl-C. Never completes if the handler could not be installed.
async fn interrupted(signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(err) = signal.await {
        warn!("Cannot listen for Ctrl-C, running without it: {err}");
        std::future::pending::<()>().await;
    }
}

fn log_progress(message: &BatchMessage) {
    if let BatchMessage::SceneFinished { completed, total } = message {
        info!("Processing scenes: {completed}/{total}");
    }
}

fn write_report(report: &BatchReport, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

fn exit_code(report: &BatchReport, allow_failures: bool) -> ExitCode {
    for failure in report.failures() {
        warn!(
            "{} (seed {}): {}",
            failure.task.entry, failure.task.seed, failure.outcome
        );
    }
    if report.is_success() || allow_failures {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
