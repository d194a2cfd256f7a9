use std::io;
use std::path::PathBuf;
use crate::error::Result;
use crate::manifest::{Manifest, SceneEntry};
use crate::SceneSourceError;

/// File name of the manifest when none is configured.
pub const DEFAULT_MANIFEST_NAME: &str = ".metainfo_list.txt";

/// Directory the manifest and all scene metadata paths are relative to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRoot {
    root: PathBuf,
}

impl DataRoot {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn manifest_path(&self, manifest_name: &str) -> PathBuf {
        self.root.join(manifest_name)
    }

    /// Absolute path of the scene metadata. Existence is not checked.
    ///
    /// A blank entry resolves to the root itself, without a trailing separator.
    pub fn resolve(&self, entry: &SceneEntry) -> PathBuf {
        if entry.path.is_empty() {
            return self.root.clone();
        }
        self.root.join(entry.relative_path())
    }

    pub async fn read_manifest(&self, manifest_name: &str) -> Result<Manifest> {
        let path = self.manifest_path(manifest_name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(SceneSourceError::ManifestNotFound { path });
            }
            Err(source) => return Err(SceneSourceError::File { path, source }),
        };

        let text = match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(source) => return Err(SceneSourceError::Decode { path, source }),
        };

        let manifest = Manifest::parse(&text);
        tracing::debug!(path = %path.display(), scenes = manifest.len(), "manifest loaded");
        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn resolves_entries_against_root() {
        let root = DataRoot::new("/d");
        let entry = SceneEntry::new(0, "sceneA/meta.json");
        assert_eq!(root.resolve(&entry), PathBuf::from("/d/sceneA/meta.json"));
        assert_eq!(
            root.manifest_path(DEFAULT_MANIFEST_NAME),
            PathBuf::from("/d/.metainfo_list.txt")
        );
    }

    #[test]
    fn blank_entry_resolves_to_root() {
        let root = DataRoot::new("/d");
        let resolved = root.resolve(&SceneEntry::new(1, ""));
        assert_eq!(resolved.as_os_str(), "/d");
    }

    #[tokio::test]
    async fn reads_manifest_from_root() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join(DEFAULT_MANIFEST_NAME),
            "sceneA/meta.json\nsceneB/meta.json\n",
        )
        .unwrap();

        let manifest = DataRoot::new(dir.path())
            .read_manifest(DEFAULT_MANIFEST_NAME)
            .await
            .unwrap();
        assert_eq!(manifest.len(), 2);
        assert_eq!(manifest.entries()[1].path, "sceneB/meta.json");
    }

    #[tokio::test]
    async fn missing_manifest_is_reported() {
        let dir = tempdir().unwrap();
        let err = DataRoot::new(dir.path())
            .read_manifest(DEFAULT_MANIFEST_NAME)
            .await
            .unwrap_err();
        assert!(matches!(err, SceneSourceError::ManifestNotFound { .. }));
    }

    #[tokio::test]
    async fn non_utf8_manifest_is_rejected() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("list.txt"), [0xff, 0xfe, b'a']).unwrap();
        let err = DataRoot::new(dir.path())
            .read_manifest("list.txt")
            .await
            .unwrap_err();
        assert!(matches!(err, SceneSourceError::Decode { .. }));
    }
}
