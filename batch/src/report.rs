use std::fmt;
use std::process::ExitStatus;
use serde::Serialize;
use crate::task::SceneTask;

/// How a single worker invocation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskOutcome {
    Succeeded,
    /// Nonzero exit. `code` is `None` when the worker was killed by a signal.
    Failed { code: Option<i32> },
    TimedOut,
    SpawnFailed { message: String },
    /// Dry run.
    Skipped,
}

impl TaskOutcome {
    pub fn from_status(status: ExitStatus) -> Self {
        if status.success() {
            TaskOutcome::Succeeded
        } else {
            TaskOutcome::Failed {
                code: status.code(),
            }
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            TaskOutcome::Failed { .. } | TaskOutcome::TimedOut | TaskOutcome::SpawnFailed { .. }
        )
    }
}

impl fmt::Display for TaskOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskOutcome::Succeeded => write!(f, "succeeded"),
            TaskOutcome::Failed { code: Some(code) } => write!(f, "exited with code {code}"),
            TaskOutcome::Failed { code: None } => write!(f, "terminated by signal"),
            TaskOutcome::TimedOut => write!(f, "timed out"),
            TaskOutcome::SpawnFailed { message } => write!(f, "failed to start: {message}"),
            TaskOutcome::Skipped => write!(f, "skipped"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskReport {
    pub task: SceneTask,
    pub outcome: TaskOutcome,
    pub elapsed_ms: u64,
}

/// Summary of a finished batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    /// Number of manifest entries.
    pub scenes: usize,
    /// Number of tasks the manifest expanded to.
    pub planned: usize,
    /// Reports of the tasks that ran, in run order.
    pub tasks: Vec<TaskReport>,
    /// The batch stopped early because of the fail-fast policy.
    pub aborted: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.count(|outcome| matches!(outcome, TaskOutcome::Succeeded))
    }

    pub fn skipped(&self) -> usize {
        self.count(|outcome| matches!(outcome, TaskOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(TaskOutcome::is_failure)
    }

    pub fn failures(&self) -> impl Iterator<Item = &TaskReport> {
        self.tasks.iter().filter(|report| report.outcome.is_failure())
    }

    /// No task failed and none was left unrun.
    pub fn is_success(&self) -> bool {
        !self.aborted && self.failed() == 0
    }

    fn count(&self, pred: impl Fn(&TaskOutcome) -> bool) -> usize {
        self.tasks.iter().filter(|report| pred(&report.outcome)).count()
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use super::*;

    fn report(seed: u64, outcome: TaskOutcome) -> TaskReport {
        TaskReport {
            task: SceneTask {
                scene_index: 0,
                entry: "a/meta.json".into(),
                input_path: PathBuf::from("/d/a/meta.json"),
                output_path: PathBuf::from(format!("/o/a/seed_{seed}")),
                seed,
            },
            outcome,
            elapsed_ms: 5,
        }
    }

    #[test]
    fn counts_outcomes() {
        let batch = BatchReport {
            scenes: 2,
            planned: 4,
            tasks: vec![
                report(0, TaskOutcome::Succeeded),
                report(1, TaskOutcome::Failed { code: Some(2) }),
                report(0, TaskOutcome::TimedOut),
                report(1, TaskOutcome::Skipped),
            ],
            aborted: false,
        };
        assert_eq!(batch.succeeded(), 1);
        assert_eq!(batch.failed(), 2);
        assert_eq!(batch.skipped(), 1);
        assert!(!batch.is_success());
        assert_eq!(batch.failures().count(), 2);
    }

    #[test]
    fn empty_batch_is_a_success() {
        assert!(BatchReport::default().is_success());
    }

    #[test]
    fn outcome_json_is_tagged() {
        let json = serde_json::to_value(TaskOutcome::Failed { code: Some(3) }).unwrap();
        assert_eq!(json, serde_json::json!({ "status": "failed", "code": 3 }));

        let json = serde_json::to_value(report(1, TaskOutcome::Succeeded)).unwrap();
        assert_eq!(json["task"]["output_path"], "/o/a/seed_1");
        assert_eq!(json["outcome"]["status"], "succeeded");
    }

    #[test]
    fn outcome_display() {
        assert_eq!(TaskOutcome::Failed { code: Some(1) }.to_string(), "exited with code 1");
        assert_eq!(TaskOutcome::TimedOut.to_string(), "timed out");
    }
}
