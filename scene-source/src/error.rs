use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SceneSourceError>;

#[derive(Debug, Error)]
pub enum SceneSourceError {
    #[error("Manifest not found: {}", path.display())]
    ManifestNotFound { path: PathBuf },

    #[error("Failed to read manifest {}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest {} is not valid UTF-8", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: std::string::FromUtf8Error,
    },
}
