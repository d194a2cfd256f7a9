use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use serde::{Deserialize, Serialize};
use scene_source::DEFAULT_MANIFEST_NAME;
use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Record the failure and keep going.
    #[default]
    Continue,
    /// Stop the batch after the first failed task.
    FailFast,
}

/// External program run once per scene and seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Executable to launch. Looked up on `PATH` when not a path.
    #[serde(default = "default_program")]
    pub program: String,

    /// Arguments placed before the per-task flags.
    #[serde(default = "default_program_args")]
    pub args: Vec<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            args: default_program_args(),
        }
    }
}

impl WorkerConfig {
    pub fn new(program: impl Into<String>, args: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    /// Directory holding the manifest. Manifest entries are relative to it.
    #[serde(default)]
    pub data_root: PathBuf,

    /// Directory the per-scene, per-seed output trees are placed under.
    #[serde(default)]
    pub output_root: PathBuf,

    /// File name of the manifest inside the data root.
    #[serde(default = "default_manifest_name")]
    pub manifest_name: String,

    /// Seeds every scene is run with, in ascending order.
    #[serde(default = "default_seeds")]
    pub seeds: Vec<u64>,

    /// Pause after every worker invocation, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Kill a worker that runs longer than this many seconds. No limit by default.
    #[serde(default)]
    pub timeout_secs: Option<u64>,

    #[serde(default)]
    pub on_failure: FailurePolicy,

    /// Trace the commands without running them.
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub worker: WorkerConfig,
}

impl Default for BatchConfig {
    /// Defaults with both roots unset.
    fn default() -> Self {
        Self::new(PathBuf::new(), PathBuf::new())
    }
}

fn default_program() -> String {
    String::from("python")
}

fn default_program_args() -> Vec<String> {
    vec![String::from("run.py")]
}

fn default_manifest_name() -> String {
    String::from(DEFAULT_MANIFEST_NAME)
}

fn default_seeds() -> Vec<u64> {
    vec![0, 1]
}

fn default_delay_ms() -> u64 {
    1000
}

impl BatchConfig {
    pub fn new(data_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            data_root: data_root.into(),
            output_root: output_root.into(),
            manifest_name: default_manifest_name(),
            seeds: default_seeds(),
            delay_ms: default_delay_ms(),
            timeout_secs: None,
            on_failure: FailurePolicy::default(),
            dry_run: false,
            worker: WorkerConfig::default(),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn with_data_root(mut self, data_root: impl Into<PathBuf>) -> Self {
        self.data_root = data_root.into();
        self
    }

    pub fn with_output_root(mut self, output_root: impl Into<PathBuf>) -> Self {
        self.output_root = output_root.into();
        self
    }

    pub fn with_manifest_name(mut self, manifest_name: impl Into<String>) -> Self {
        self.manifest_name = manifest_name.into();
        self
    }

    pub fn with_seeds(mut self, seeds: impl IntoIterator<Item = u64>) -> Self {
        self.seeds = seeds.into_iter().collect();
        self
    }

    pub fn with_delay_ms(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: Option<u64>) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    pub fn with_on_failure(mut self, on_failure: FailurePolicy) -> Self {
        self.on_failure = on_failure;
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_worker(mut self, worker: WorkerConfig) -> Self {
        self.worker = worker;
        self
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }

    /// Seeds sorted ascending.
    pub fn ordered_seeds(&self) -> Vec<u64> {
        let mut seeds = self.seeds.clone();
        seeds.sort_unstable();
        seeds
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.data_root.as_os_str().is_empty() {
            return Err(ConfigError::MissingRoot("data_root"));
        }
        if self.output_root.as_os_str().is_empty() {
            return Err(ConfigError::MissingRoot("output_root"));
        }
        if self.seeds.is_empty() {
            return Err(ConfigError::NoSeeds);
        }
        let mut seen = BTreeSet::new();
        for &seed in &self.seeds {
            if !seen.insert(seed) {
                return Err(ConfigError::DuplicateSeed(seed));
            }
        }
        if self.worker.program.trim().is_empty() {
            return Err(ConfigError::EmptyProgram);
        }
        if self.timeout_secs == Some(0) {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_the_user_study_batch() {
        let config = BatchConfig::new("/d", "/o");
        assert_eq!(config.manifest_name, ".metainfo_list.txt");
        assert_eq!(config.seeds, vec![0, 1]);
        assert_eq!(config.delay(), Duration::from_secs(1));
        assert_eq!(config.timeout(), None);
        assert_eq!(config.on_failure, FailurePolicy::Continue);
        assert_eq!(config.worker.program, "python");
        assert_eq!(config.worker.args, vec!["run.py"]);
        config.validate().unwrap();
    }

    #[test]
    fn parses_toml_with_defaults() {
        let config = BatchConfig::from_toml_str(
            r#"
            data_root = "/mnt/data"
            output_root = "/mnt/out"
            seeds = [3, 1]
            on_failure = "fail-fast"

            [worker]
            program = "./render.sh"
            "#,
        )
        .unwrap();

        assert_eq!(config.data_root, PathBuf::from("/mnt/data"));
        assert_eq!(config.ordered_seeds(), vec![1, 3]);
        assert_eq!(config.on_failure, FailurePolicy::FailFast);
        assert_eq!(config.delay_ms, 1000);
        assert_eq!(config.worker.program, "./render.sh");
        assert_eq!(config.worker.args, vec!["run.py"]);
    }

    #[test]
    fn rejects_unknown_keys() {
        let err = BatchConfig::from_toml_str("data_root = \"/d\"\nseed = [0]\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn validation_errors() {
        let base = BatchConfig::new("/d", "/o");

        let err = base.clone().with_data_root("").validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingRoot("data_root")));

        let err = base.clone().with_seeds(Vec::new()).validate().unwrap_err();
        assert!(matches!(err, ConfigError::NoSeeds));

        let err = base.clone().with_seeds([0, 1, 0]).validate().unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateSeed(0)));

        let err = base
            .clone()
            .with_worker(WorkerConfig::new(" ", Vec::<String>::new()))
            .validate()
            .unwrap_err();
        assert!(matches!(err, ConfigError::EmptyProgram));

        let err = base.with_timeout_secs(Some(0)).validate().unwrap_err();
        assert!(matches!(err, ConfigError::ZeroTimeout));
    }
}
