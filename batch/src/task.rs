use std::path::{Path, PathBuf};
use serde::Serialize;
use scene_source::{DataRoot, Manifest, SceneEntry};

/// One worker invocation: a manifest entry run with one seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SceneTask {
    /// Index of the entry in the manifest.
    pub scene_index: usize,
    /// The manifest line, relative to the data root.
    pub entry: String,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub seed: u64,
}

impl SceneTask {
    pub fn new(data_root: &DataRoot, output_root: &Path, entry: &SceneEntry, seed: u64) -> Self {
        Self {
            scene_index: entry.index,
            entry: entry.path.clone(),
            input_path: data_root.resolve(entry),
            output_path: output_dir(output_root, entry, seed),
            seed,
        }
    }
}

/// `output_root / <scene dir of entry> / seed_<seed>`.
///
/// Downstream tools locate results by this layout, so it must not change.
pub fn output_dir(output_root: &Path, entry: &SceneEntry, seed: u64) -> PathBuf {
    output_root
        .join(entry.scene_dir())
        .join(format!("seed_{seed}"))
}

/// Expands the manifest into tasks, scene-major: every seed of the first
/// entry, then every seed of the next.
pub fn plan_tasks(
    data_root: &DataRoot,
    output_root: &Path,
    manifest: &Manifest,
    seeds: &[u64],
) -> Vec<SceneTask> {
    manifest
        .iter()
        .flat_map(|entry| {
            seeds
                .iter()
                .map(move |&seed| SceneTask::new(data_root, output_root, entry, seed))
        })
        .collect()
}
