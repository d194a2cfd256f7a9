use std::ffi::OsString;
use std::time::Duration;
use async_trait::async_trait;
use tokio::process::Command;
use tracing::warn;
use crate::config::WorkerConfig;
use crate::report::TaskOutcome;
use crate::task::SceneTask;

pub const METAINFO_FLAG: &str = "--metainfo_path";
pub const OUTPUT_FLAG: &str = "--output_path";
pub const SEED_FLAG: &str = "--seed";

/// Runs one scene task to completion.
#[async_trait]
pub trait Worker: Send + Sync {
    /// Human readable form of what `run` will do for this task.
    fn describe(&self, task: &SceneTask) -> String;

    /// Never fails: anything that goes wrong is reported through the outcome.
    async fn run(&self, task: &SceneTask) -> TaskOutcome;
}

/// Command line of the external per-scene program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    program: String,
    args: Vec<String>,
}

impl WorkerCommand {
    pub fn new(config: &WorkerConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Leading arguments followed by the per-task flags.
    pub fn arguments(&self, task: &SceneTask) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.args.iter().map(OsString::from).collect();
        args.push(METAINFO_FLAG.into());
        args.push(task.input_path.clone().into_os_string());
        args.push(OUTPUT_FLAG.into());
        args.push(task.output_path.clone().into_os_string());
        args.push(SEED_FLAG.into());
        args.push(task.seed.to_string().into());
        args
    }

    pub fn command_line(&self, task: &SceneTask) -> String {
        let mut line = self.program.clone();
        for arg in self.arguments(task) {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    fn command(&self, task: &SceneTask) -> Command {
        let mut command = Command::new(&self.program);
        // The child must not outlive a cancelled batch.
        command.args(self.arguments(task)).kill_on_drop(true);
        command
    }
}

/// Spawns the external program and waits for it, optionally bounded by a timeout.
#[derive(Debug, Clone)]
pub struct ProcessWorker {
    command: WorkerCommand,
    timeout: Option<Duration>,
}

impl ProcessWorker {
    pub fn new(command: WorkerCommand, timeout: Option<Duration>) -> Self {
        Self { command, timeout }
    }
}

#[async_trait]
impl Worker for ProcessWorker {
    fn describe(&self, task: &SceneTask) -> String {
        self.command.command_line(task)
    }

    async fn run(&self, task: &SceneTask) -> TaskOutcome {
        let mut child = match self.command.command(task).spawn() {
            Ok(child) => child,
            Err(err) => {
                return TaskOutcome::SpawnFailed {
                    message: format!("{}: {err}", self.command.program()),
                };
            }
        };

        let status = match self.timeout {
            Some(limit) => {
                let waited = tokio::time::timeout(limit, child.wait()).await;
                match waited {
                    Ok(status) => status,
                    Err(_) => {
                        if let Err(err) = child.kill().await {
                            warn!(seed = task.seed, entry = %task.entry, "Failed to kill timed out worker: {err}");
                        }
                        return TaskOutcome::TimedOut;
                    }
                }
            }
            None => child.wait().await,
        };

        match status {
            Ok(status) => TaskOutcome::from_status(status),
            Err(err) => {
                warn!(seed = task.seed, entry = %task.entry, "Lost track of worker: {err}");
                TaskOutcome::Failed { code: None }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::{Path, PathBuf};
    use scene_source::{DataRoot, SceneEntry};
    use super::*;

    fn task(seed: u64) -> SceneTask {
        SceneTask::new(
            &DataRoot::new("/d"),
            Path::new("/o"),
            &SceneEntry::new(0, "sceneA/meta.json"),
            seed,
        )
    }

    fn worker(program: &str, args: &[&str], timeout: Option<Duration>) -> ProcessWorker {
        let config = WorkerConfig::new(program, args.iter().copied());
        ProcessWorker::new(WorkerCommand::new(&config), timeout)
    }

    #[test]
    fn default_command_line() {
        let command = WorkerCommand::new(&WorkerConfig::default());
        assert_eq!(
            command.command_line(&task(1)),
            "python run.py --metainfo_path /d/sceneA/meta.json --output_path /o/sceneA/seed_1 --seed 1"
        );
    }

    #[test]
    fn per_task_flags_follow_leading_args() {
        let command = WorkerCommand::new(&WorkerConfig::new("render", ["--fast"]));
        let args = command.arguments(&task(0));
        assert_eq!(args[0], "--fast");
        assert_eq!(args[1], METAINFO_FLAG);
        assert_eq!(PathBuf::from(&args[4]), PathBuf::from("/o/sceneA/seed_0"));
        assert_eq!(args[6], "0");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn exit_status_is_recorded() {
        let outcome = worker("true", &[], None).run(&task(0)).await;
        assert_eq!(outcome, TaskOutcome::Succeeded);

        let outcome = worker("sh", &["-c", "exit 3", "worker"], None).run(&task(0)).await;
        assert_eq!(outcome, TaskOutcome::Failed { code: Some(3) });
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn worker_receives_task_flags() {
        // $1..$6 are the per-task flags and their values.
        let script = r#"test "$1" = --metainfo_path && test "$2" = /d/sceneA/meta.json && test "$4" = /o/sceneA/seed_1 && test "$6" = 1"#;
        let outcome = worker("sh", &["-c", script, "worker"], None).run(&task(1)).await;
        assert_eq!(outcome, TaskOutcome::Succeeded);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn hung_worker_is_killed() {
        let outcome = worker("sh", &["-c", "sleep 30", "worker"], Some(Duration::from_millis(100)))
            .run(&task(0))
            .await;
        assert_eq!(outcome, TaskOutcome::TimedOut);
    }

    #[tokio::test]
    async fn missing_program_fails_to_spawn() {
        let outcome = worker("definitely-not-a-real-worker-binary", &[], None)
            .run(&task(0))
            .await;
        assert!(matches!(outcome, TaskOutcome::SpawnFailed { .. }));
        assert!(outcome.is_failure());
    }
}
