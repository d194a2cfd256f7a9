//! Runs an external per-scene program over every scene listed in a manifest,
//! once per seed, strictly one process at a time.

mod batch_stream;
mod config;
mod error;
mod message;
mod pipeline_stream;
mod report;
mod task;
mod worker;

pub use batch_stream::BatchStream;
pub use config::{BatchConfig, FailurePolicy, WorkerConfig};
pub use error::{BatchError, ConfigError, Result};
pub use message::BatchMessage;
pub use pipeline_stream::PipelineStream;
pub use report::{BatchReport, TaskOutcome, TaskReport};
pub use task::{output_dir, plan_tasks, SceneTask};
pub use worker::{ProcessWorker, Worker, WorkerCommand, METAINFO_FLAG, OUTPUT_FLAG, SEED_FLAG};

/// Batch driving the configured external program.
pub fn process_batch(config: BatchConfig) -> BatchStream<ProcessWorker> {
    let worker = ProcessWorker::new(WorkerCommand::new(&config.worker), config.timeout());
    BatchStream::new(config, worker)
}
