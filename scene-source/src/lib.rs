mod filesystem;
mod manifest;
mod error;

pub use manifest::*;
pub use error::{Result, SceneSourceError};
pub use filesystem::{DataRoot, DEFAULT_MANIFEST_NAME};
