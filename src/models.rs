//! Data structures produced while recovering assets from a card container.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Container shape recognised by [`crate::detect::detect_format`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerFormat {
    /// PNG image carrying assets in `tEXt` chunks.
    PngCard,
    /// ZIP archive carrying loose assets and a `card.json` manifest.
    Charx,
}

impl fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PngCard => f.write_str("PNG card"),
            Self::Charx => f.write_str("charx"),
        }
    }
}

/// Raw payload recovered from a `chara-ext-asset_<N>` chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetBlob {
    /// Index parsed from the chunk key.
    pub index: u64,
    /// Decoded bytes, shared between every task that writes them.
    pub bytes: Arc<[u8]>,
}

/// File unpacked from a charx archive into the scratch area.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveAsset {
    /// Archive-relative path with forward slashes, as referenced by `embed://` URIs.
    pub uri: String,
    /// Location of the unpacked file on disk.
    pub source_path: PathBuf,
}

/// Manifest entry normalised from either schema generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetManifestEntry {
    /// Opaque asset reference (`__asset:<N>` or `embed://<path>`).
    pub reference: String,
    /// Human readable base name.
    pub name: String,
    /// Extension without the leading dot, if the manifest supplied one.
    pub ext: Option<String>,
}

/// Source of the bytes written by a [`WriteTask`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssetPayload {
    /// Bytes already held in memory.
    Bytes(Arc<[u8]>),
    /// Existing file copied verbatim.
    File(PathBuf),
}

/// A single file the writer should produce inside the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteTask {
    /// Path relative to the output directory.
    pub target: PathBuf,
    /// Data to write.
    pub payload: AssetPayload,
}

/// Why a manifest entry produced no write task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The entry lacked a usable `name` or `uri`.
    Incomplete,
    /// The reference does not point at embedded data (e.g. a remote URL).
    NotEmbedded,
    /// The reference could not be parsed.
    MalformedReference,
    /// The referenced blob or file does not exist.
    SourceMissing,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Incomplete => "entry is missing a name or uri",
            Self::NotEmbedded => "reference is not an embedded asset",
            Self::MalformedReference => "malformed asset reference",
            Self::SourceMissing => "referenced asset not found in container",
        };
        f.write_str(text)
    }
}

/// Manifest entry that was dropped during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedEntry {
    /// Reference as written in the manifest.
    pub reference: String,
    /// Reason the entry was dropped.
    pub reason: SkipReason,
}

/// Ordered write tasks plus the entries that could not be resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Tasks in manifest order, followed by any fallback tasks.
    pub tasks: Vec<WriteTask>,
    /// Entries that produced no task.
    pub skipped: Vec<SkippedEntry>,
}

/// Result of one write task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The file was written.
    Written(PathBuf),
    /// The file could not be written.
    Failed {
        /// Destination that was attempted.
        target: PathBuf,
        /// Rendered error.
        reason: String,
    },
}

impl WriteOutcome {
    /// Returns `true` for [`WriteOutcome::Written`].
    pub fn is_written(&self) -> bool {
        matches!(self, Self::Written(_))
    }
}

/// Aggregate report for one extraction run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionSummary {
    /// Detected container format.
    pub format: ContainerFormat,
    /// Directory that received the assets.
    pub output_dir: PathBuf,
    /// Number of files written.
    pub written: usize,
    /// Number of write tasks that failed.
    pub failed: usize,
    /// Number of manifest entries skipped during resolution.
    pub skipped: usize,
}

impl ExtractionSummary {
    pub(crate) fn new(format: ContainerFormat, output_dir: PathBuf) -> Self {
        Self {
            format,
            output_dir,
            written: 0,
            failed: 0,
            skipped: 0,
        }
    }

    pub(crate) fn record(&mut self, resolution_skipped: usize, outcomes: &[WriteOutcome]) {
        self.skipped += resolution_skipped;
        for outcome in outcomes {
            if outcome.is_written() {
                self.written += 1;
            } else {
                self.failed += 1;
            }
        }
    }
}
