use std::path::PathBuf;
use scene_source::SceneSourceError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, BatchError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("`{0}` is not set")]
    MissingRoot(&'static str),

    #[error("At least one seed is required")]
    NoSeeds,

    #[error("Seed {0} is listed more than once")]
    DuplicateSeed(u64),

    #[error("Worker program is empty")]
    EmptyProgram,

    #[error("Timeout must be greater than zero")]
    ZeroTimeout,
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Failed to load manifest")]
    SceneSource(#[from] SceneSourceError),

    #[error("Invalid configuration")]
    Config(#[from] ConfigError),
}
