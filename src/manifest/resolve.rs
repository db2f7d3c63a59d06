//! Turning manifest entries into write tasks with human readable file names.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Component, Path, PathBuf};

use sanitize_filename::{Options, sanitize_with_options};

use super::schema::{CharacterManifest, ManifestEntry};
use crate::container::charx::archive_uri;
use crate::detect::detect_extension;
use crate::models::{
    ArchiveAsset, AssetBlob, AssetManifestEntry, AssetPayload, Resolution, SkipReason, SkippedEntry,
    WriteTask,
};

/// Prefix of PNG asset references.
pub const PNG_ASSET_PREFIX: &str = "__asset:";

/// Prefixes of charx asset references, including the historical misspelling.
pub const EMBED_PREFIXES: [&str; 2] = ["embeded://", "embed://"];

/// Append `.ext` to `name` unless it already ends with it (case-insensitively).
pub fn resolve_file_name(name: &str, ext: Option<&str>) -> String {
    match ext.filter(|ext| !ext.is_empty()) {
        Some(ext)
            if !name
                .to_lowercase()
                .ends_with(&format!(".{}", ext.to_lowercase())) =>
        {
            format!("{name}.{ext}")
        }
        _ => name.to_string(),
    }
}

/// Characters Windows refuses in file names.
const WINDOWS_RESERVED: [char; 8] = ['<', '>', ':', '"', '\\', '|', '?', '*'];

/// Single path component safe to create inside the output directory.
///
/// Names that already are one plain component are kept verbatim.
fn output_file_name(entry: &AssetManifestEntry) -> PathBuf {
    let resolved = resolve_file_name(&entry.name, entry.ext.as_deref());
    if is_plain_file_name(&resolved) {
        return PathBuf::from(resolved);
    }
    let options = Options {
        windows: cfg!(windows),
        truncate: true,
        replacement: "_",
    };
    PathBuf::from(sanitize_with_options(resolved, options))
}

fn is_plain_file_name(name: &str) -> bool {
    let mut components = Path::new(name).components();
    let single = matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(part)), None) if part == name
    );
    single && !name.contains('\0') && !(cfg!(windows) && name.contains(WINDOWS_RESERVED))
}

/// Parse `__asset:<index>`; `None` for references of another kind.
pub fn parse_png_reference(reference: &str) -> Option<Result<u64, SkipReason>> {
    let raw = reference.strip_prefix(PNG_ASSET_PREFIX)?;
    Some(
        raw
            .rsplit(':')
            .next()
            .and_then(|index| index.trim().parse().ok())
            .ok_or(SkipReason::MalformedReference),
    )
}

/// Strip an `embed://` or `embeded://` prefix, yielding the archive-relative path.
pub fn strip_embed_prefix(reference: &str) -> &str {
    EMBED_PREFIXES
        .iter()
        .find_map(|prefix| reference.strip_prefix(prefix))
        .unwrap_or(reference)
}

/// Resolve PNG blobs against the v3 and v2 asset lists.
///
/// Every blob ends up in exactly one fallback task unless at least one
/// manifest entry claimed it; fallback names are `asset_<index>.<sniffed ext>`.
pub fn resolve_png_assets(
    manifest: Option<&CharacterManifest>,
    blobs: &BTreeMap<u64, AssetBlob>,
) -> Resolution {
    let mut resolution = Resolution::default();
    let mut matched = BTreeSet::new();

    if let Some(manifest) = manifest {
        let entries = manifest.v3_entries().into_iter().chain(manifest.v2_entries());
        for entry in entries {
            match resolve_png_entry(entry, blobs) {
                Ok((index, task)) => {
                    matched.insert(index);
                    resolution.tasks.push(task);
                }
                Err(skipped) => {
                    log::debug!("skipping '{}': {}", skipped.reference, skipped.reason);
                    resolution.skipped.push(skipped);
                }
            }
        }
    }

    let unmatched: Vec<&AssetBlob> = blobs
        .values()
        .filter(|blob| !matched.contains(&blob.index))
        .collect();
    if manifest.is_some() && !unmatched.is_empty() {
        log::info!(
            "{} asset(s) not named by the manifest; using generated names",
            unmatched.len()
        );
    }
    for blob in unmatched {
        let ext = detect_extension(&blob.bytes).trim_start_matches('.');
        resolution.tasks.push(WriteTask {
            target: PathBuf::from(format!("asset_{}.{ext}", blob.index)),
            payload: AssetPayload::Bytes(blob.bytes.clone()),
        });
    }

    resolution
}

fn resolve_png_entry(
    entry: ManifestEntry,
    blobs: &BTreeMap<u64, AssetBlob>,
) -> Result<(u64, WriteTask), SkippedEntry> {
    let reference = entry.reference().to_owned();
    let skip = |reason| SkippedEntry {
        reference: reference.clone(),
        reason,
    };

    let entry = entry.normalize().ok_or_else(|| skip(SkipReason::Incomplete))?;
    let index = match parse_png_reference(&entry.reference) {
        Some(parsed) => parsed.map_err(skip)?,
        None => return Err(skip(SkipReason::NotEmbedded)),
    };
    let blob = blobs
        .get(&index)
        .ok_or_else(|| skip(SkipReason::SourceMissing))?;

    let task = WriteTask {
        target: output_file_name(&entry),
        payload: AssetPayload::Bytes(blob.bytes.clone()),
    };
    Ok((index, task))
}

/// Resolve unpacked charx files against the v3 asset list.
pub fn resolve_charx_assets(manifest: &CharacterManifest, assets: &[ArchiveAsset]) -> Resolution {
    let by_uri: HashMap<&str, &ArchiveAsset> = assets
        .iter()
        .map(|asset| (asset.uri.as_str(), asset))
        .collect();

    let mut resolution = Resolution::default();
    for entry in manifest.v3_entries() {
        let reference = entry.reference().to_owned();
        let reason = match entry.normalize() {
            None => SkipReason::Incomplete,
            Some(entry) => {
                let relative = archive_uri(Path::new(strip_embed_prefix(&entry.reference)));
                match by_uri.get(relative.as_str()) {
                    Some(asset) => {
                        resolution.tasks.push(WriteTask {
                            target: output_file_name(&entry),
                            payload: AssetPayload::File(asset.source_path.clone()),
                        });
                        continue;
                    }
                    None => SkipReason::SourceMissing,
                }
            }
        };
        log::warn!("skipping '{reference}': {reason}");
        resolution.skipped.push(SkippedEntry { reference, reason });
    }

    resolution
}
