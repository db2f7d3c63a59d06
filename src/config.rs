//! Extractor configuration loader describing output naming and worker sizing.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

/// File name searched for by [`ExtractorConfig::discover`].
pub const DEFAULT_CONFIG_FILE: &str = "card_assets.config.json";

/// Discoverable configuration controlling where and how assets are materialised.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ExtractorConfig {
    /// Suffix appended to the container stem to name the output directory.
    pub output_suffix: String,
    /// Suffix appended to the container stem to name the charx scratch directory.
    pub scratch_suffix: String,
    /// Manifest file name expected at the root of a charx archive.
    pub manifest_file: String,
    /// Archive directory copied verbatim when a charx carries no manifest.
    pub fallback_assets_dir: String,
    /// Number of write workers; `0` lets rayon pick one per core.
    pub worker_threads: usize,
    /// Directory receiving output and scratch directories. Defaults to the
    /// directory containing the input file.
    pub output_root: Option<PathBuf>,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            output_suffix: "_assets".into(),
            scratch_suffix: "_temp_extraction".into(),
            manifest_file: "card.json".into(),
            fallback_assets_dir: "assets".into(),
            worker_threads: 0,
            output_root: None,
        }
    }
}

impl ExtractorConfig {
    /// Attempt to load configuration from the provided directory.
    ///
    /// A missing or unparsable file yields the defaults.
    pub fn discover(dir: &Path) -> Self {
        let candidate = dir.join(DEFAULT_CONFIG_FILE);
        Self::from_path(&candidate).unwrap_or_default()
    }

    /// Read configuration from a specific JSON file.
    pub fn from_path(path: &Path) -> Option<Self> {
        let content = fs::read_to_string(path).ok()?;
        match serde_json::from_str(&content) {
            Ok(config) => Some(config),
            Err(err) => {
                log::warn!("ignoring invalid config {}: {err}", path.display());
                None
            }
        }
    }

    /// `<root>/<stem><output_suffix>` for the given container.
    pub fn output_dir_for(&self, input: &Path) -> PathBuf {
        self.sibling_dir(input, &self.output_suffix)
    }

    /// `<root>/<stem><scratch_suffix>` for the given container.
    pub fn scratch_dir_for(&self, input: &Path) -> PathBuf {
        self.sibling_dir(input, &self.scratch_suffix)
    }

    fn sibling_dir(&self, input: &Path, suffix: &str) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_else(|| "card".to_string());
        let root = match &self.output_root {
            Some(root) => root.clone(),
            None => input
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_default(),
        };
        root.join(format!("{stem}{suffix}"))
    }
}
