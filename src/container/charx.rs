//! Unpacking of charx (ZIP) containers into a self-cleaning scratch directory.

use std::fs::{self, File};
use std::io;
use std::path::{Component, Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{ExtractError, ExtractResult};
use crate::manifest::CharacterManifest;
use crate::models::{ArchiveAsset, AssetPayload, WriteTask};

/// Scratch directory removed when dropped, on every exit path.
#[derive(Debug)]
pub struct ScratchArea {
    path: PathBuf,
}

impl ScratchArea {
    /// Create a fresh scratch directory at `path`, clearing any leftover from an earlier run.
    pub fn create(path: PathBuf) -> ExtractResult<Self> {
        if path.exists() {
            log::warn!("removing stale scratch directory {}", path.display());
            fs::remove_dir_all(&path).map_err(|err| ExtractError::io(&path, err))?;
        }
        fs::create_dir_all(&path).map_err(|err| ExtractError::io(&path, err))?;
        Ok(Self { path })
    }

    /// Location of the scratch directory.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchArea {
    fn drop(&mut self) {
        match fs::remove_dir_all(&self.path) {
            Ok(()) => log::info!("removed scratch directory {}", self.path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => log::error!(
                "failed to remove scratch directory {}: {err}",
                self.path.display()
            ),
        }
    }
}

/// What the unpacked archive offers for name resolution.
#[derive(Debug)]
pub enum CharxContents {
    /// `card.json` was present and parsed.
    Manifest(CharacterManifest),
    /// No usable manifest; the assets directory is copied verbatim.
    Loose,
}

/// A charx archive unpacked into its scratch area.
///
/// The scratch directory lives exactly as long as this value.
#[derive(Debug)]
pub struct UnpackedCharx {
    scratch: ScratchArea,
    /// Every regular file unpacked from the archive.
    pub assets: Vec<ArchiveAsset>,
    /// Manifest, or the loose-copy fallback.
    pub contents: CharxContents,
}

impl UnpackedCharx {
    /// Copy tasks for every file below `dir_name`, preserving relative paths.
    pub fn loose_copy_tasks(&self, dir_name: &str) -> Vec<WriteTask> {
        let assets_dir = self.scratch.path().join(dir_name);
        if !assets_dir.is_dir() {
            log::warn!("archive has no '{dir_name}' directory to copy");
            return Vec::new();
        }

        let mut tasks: Vec<WriteTask> = WalkDir::new(&assets_dir)
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    log::warn!("skipping unreadable entry under {}: {err}", assets_dir.display());
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| {
                let relative = entry.path().strip_prefix(&assets_dir).ok()?.to_path_buf();
                Some(WriteTask {
                    target: relative,
                    payload: AssetPayload::File(entry.into_path()),
                })
            })
            .collect();
        tasks.sort_by(|left, right| left.target.cmp(&right.target));
        tasks
    }
}

/// Unpack `archive_path` into a scratch area at `scratch_dir` and load `manifest_file`.
///
/// A missing or unparsable manifest selects [`CharxContents::Loose`]. Failure to
/// read the archive itself is fatal; the scratch area is removed either way.
pub fn unpack_charx(
    archive_path: &Path,
    scratch_dir: PathBuf,
    manifest_file: &str,
) -> ExtractResult<UnpackedCharx> {
    let scratch = ScratchArea::create(scratch_dir)?;
    let assets = extract_archive(archive_path, scratch.path())?;
    log::info!(
        "unpacked {} file(s) into {}",
        assets.len(),
        scratch.path().display()
    );

    let manifest_path = scratch.path().join(manifest_file);
    let contents = if !manifest_path.is_file() {
        log::warn!("'{manifest_file}' not found; falling back to a verbatim asset copy");
        CharxContents::Loose
    } else {
        match fs::read(&manifest_path)
            .map_err(|err| err.to_string())
            .and_then(|bytes| CharacterManifest::from_json(&bytes).map_err(|err| err.to_string()))
        {
            Ok(manifest) => CharxContents::Manifest(manifest),
            Err(err) => {
                log::error!("failed to parse '{manifest_file}': {err}; copying assets verbatim");
                CharxContents::Loose
            }
        }
    };

    Ok(UnpackedCharx {
        scratch,
        assets,
        contents,
    })
}

fn extract_archive(archive_path: &Path, dest: &Path) -> ExtractResult<Vec<ArchiveAsset>> {
    let corrupt = |source| ExtractError::ArchiveCorrupt {
        path: archive_path.to_path_buf(),
        source,
    };

    let file = File::open(archive_path).map_err(|err| ExtractError::io(archive_path, err))?;
    let mut archive = zip::ZipArchive::new(file).map_err(corrupt)?;

    let mut assets = Vec::new();
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(corrupt)?;
        let Some(relative) = entry.enclosed_name() else {
            log::warn!("skipping archive entry with unsafe path '{}'", entry.name());
            continue;
        };
        let output_path = dest.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&output_path).map_err(|err| ExtractError::io(&output_path, err))?;
            continue;
        }

        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent).map_err(|err| ExtractError::io(parent, err))?;
        }
        let mut outfile =
            File::create(&output_path).map_err(|err| ExtractError::io(&output_path, err))?;
        io::copy(&mut entry, &mut outfile).map_err(|err| match err.kind() {
            io::ErrorKind::InvalidData => corrupt(zip::result::ZipError::Io(err)),
            _ => ExtractError::io(&output_path, err),
        })?;

        assets.push(ArchiveAsset {
            uri: archive_uri(&relative),
            source_path: output_path,
        });
    }

    Ok(assets)
}

/// Forward-slash form of an archive-relative path, with `.` and empty segments collapsed.
pub(crate) fn archive_uri(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy()),
            Component::ParentDir => Some("..".into()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}
