use std::time::Instant;
use async_fn_stream::TryStreamEmitter;
use async_trait::async_trait;
use futures::StreamExt;
use scene_source::{DataRoot, Manifest};
use tracing::{debug, info, warn};
use crate::config::{BatchConfig, FailurePolicy};
use crate::error::{BatchError, Result};
use crate::message::BatchMessage;
use crate::pipeline_stream::PipelineStream;
use crate::report::{BatchReport, TaskOutcome, TaskReport};
use crate::task::plan_tasks;
use crate::worker::Worker;

/// Runs every manifest entry through the worker, one seed at a time.
pub struct BatchStream<W> {
    config: BatchConfig,
    worker: W,
}

impl<W: Worker> BatchStream<W> {
    pub fn new(config: BatchConfig, worker: W) -> Self {
        Self { config, worker }
    }

    pub fn worker(&self) -> &W {
        &self.worker
    }

    /// Drains the message stream, handing each message to `observe`, and
    /// returns the final report.
    pub async fn run_to_end(&mut self, mut observe: impl FnMut(&BatchMessage)) -> Result<BatchReport> {
        let messages = self.launch();
        futures::pin_mut!(messages);

        let mut report = BatchReport::default();
        while let Some(message) = messages.next().await {
            let message = message?;
            observe(&message);
            if let BatchMessage::Finished(finished) = message {
                report = finished;
            }
        }
        Ok(report)
    }

    async fn load_manifest(&self) -> Result<Manifest> {
        let data_root = DataRoot::new(&self.config.data_root);
        let manifest = data_root.read_manifest(&self.config.manifest_name).await?;

        for (scene_dir, indices) in manifest.shared_scene_dirs() {
            warn!(
                "Manifest lines {indices:?} share scene directory {}; their outputs overlap",
                scene_dir.display()
            );
        }
        Ok(manifest)
    }
}

#[async_trait(?Send)]
impl<W: Worker> PipelineStream for BatchStream<W> {
    async fn run(&mut self, emitter: TryStreamEmitter<BatchMessage, BatchError>) -> Result<()> {
        self.config.validate()?;
        let manifest = self.load_manifest().await?;

        let seeds = self.config.ordered_seeds();
        let data_root = DataRoot::new(&self.config.data_root);
        let tasks = plan_tasks(&data_root, &self.config.output_root, &manifest, &seeds);
        let delay = self.config.delay();
        let dry_run = self.config.dry_run;
        let total = manifest.len();

        info!(scenes = total, tasks = tasks.len(), dry_run, "Starting batch");
        emitter
            .emit(BatchMessage::Started {
                scenes: total,
                tasks: tasks.len(),
            })
            .await;

        let mut reports = Vec::with_capacity(tasks.len());
        let mut aborted = false;

        'scenes: for (done, scene_tasks) in tasks.chunks(seeds.len()).enumerate() {
            for task in scene_tasks {
                let announce = BatchMessage::TaskStarted {
                    task: task.clone(),
                    command: self.worker.describe(task),
                };
                if let Some(trace) = announce.trace() {
                    info!("{trace}");
                }
                emitter.emit(announce).await;

                let started = Instant::now();
                let outcome = if dry_run {
                    TaskOutcome::Skipped
                } else {
                    self.worker.run(task).await
                };
                let report = TaskReport {
                    task: task.clone(),
                    outcome,
                    elapsed_ms: started.elapsed().as_millis() as u64,
                };

                let failed = report.outcome.is_failure();
                if failed {
                    warn!(entry = %task.entry, seed = task.seed, "Worker {}", report.outcome);
                } else {
                    debug!(entry = %task.entry, seed = task.seed, elapsed_ms = report.elapsed_ms, "Worker {}", report.outcome);
                }

                emitter.emit(BatchMessage::TaskFinished(report.clone())).await;
                reports.push(report);

                if failed && self.config.on_failure == FailurePolicy::FailFast {
                    warn!("Stopping batch after first failure");
                    aborted = true;
                    break 'scenes;
                }

                if !dry_run && !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }

            emitter
                .emit(BatchMessage::SceneFinished {
                    completed: done + 1,
                    total,
                })
                .await;
        }

        let report = BatchReport {
            scenes: total,
            planned: tasks.len(),
            tasks: reports,
            aborted,
        };
        info!(
            succeeded = report.succeeded(),
            failed = report.failed(),
            skipped = report.skipped(),
            aborted,
            "Batch finished"
        );
        emitter.emit(BatchMessage::Finished(report)).await;
        Ok(())
    }
}
