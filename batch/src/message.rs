use crate::report::{BatchReport, TaskReport};
use crate::task::SceneTask;

#[derive(Debug, Clone)]
pub enum BatchMessage {
    /// Manifest loaded and expanded.
    Started {
        scenes: usize,
        tasks: usize,
    },
    /// About to run the worker for this task.
    TaskStarted {
        task: SceneTask,
        command: String,
    },
    TaskFinished(TaskReport),
    /// Every seed of one more scene is done.
    SceneFinished {
        completed: usize,
        total: usize,
    },
    Finished(BatchReport),
}

impl BatchMessage {
    /// Console trace line announcing a worker run.
    pub fn trace(&self) -> Option<String> {
        match self {
            BatchMessage::TaskStarted { command, .. } => Some(format!("Running command: {command}")),
            _ => None,
        }
    }
}
