use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use path_clean::PathClean;

/// One line of the manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SceneEntry {
    /// Zero-based line position in the manifest.
    pub index: usize,
    /// Scene metadata path, relative to the data root.
    pub path: String,
}

impl SceneEntry {
    pub fn new(index: usize, path: impl Into<String>) -> Self {
        Self {
            index,
            path: path.into(),
        }
    }

    pub fn relative_path(&self) -> &Path {
        Path::new(&self.path)
    }

    /// Directory holding the scene metadata, relative to the data root.
    /// Empty for a bare file name.
    pub fn scene_dir(&self) -> &Path {
        self.relative_path().parent().unwrap_or(Path::new(""))
    }
}

/// Ordered list of scenes to process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    entries: Vec<SceneEntry>,
}

impl Manifest {
    /// Parses manifest text.
    ///
    /// Leading and trailing whitespace of the whole text is dropped before
    /// splitting, so blank lines at either end never become entries. Blank
    /// lines in the middle are kept. Each line is trimmed.
    pub fn parse(text: &str) -> Self {
        let entries = text
            .trim()
            .lines()
            .enumerate()
            .map(|(index, line)| SceneEntry::new(index, line.trim()))
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[SceneEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SceneEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Groups of entries whose scene directories are the same once cleaned.
    ///
    /// Outputs are keyed by scene directory, so every entry of a group writes
    /// into the same output tree.
    pub fn shared_scene_dirs(&self) -> Vec<(PathBuf, Vec<usize>)> {
        let mut groups: BTreeMap<PathBuf, Vec<usize>> = BTreeMap::new();
        for entry in &self.entries {
            groups
                .entry(entry.scene_dir().clean())
                .or_default()
                .push(entry.index);
        }
        groups
            .into_iter()
            .filter(|(_, indices)| indices.len() > 1)
            .collect()
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a SceneEntry;
    type IntoIter = std::slice::Iter<'a, SceneEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
