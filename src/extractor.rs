//! Extraction orchestrator: detect the container, resolve names, write assets.

use std::path::{Path, PathBuf};

use crate::config::ExtractorConfig;
use crate::container::{CharxContents, scan_png, unpack_charx};
use crate::detect::detect_format;
use crate::error::{ExtractError, ExtractResult};
use crate::manifest::{
    CharacterManifest, ManifestParseError, resolve_charx_assets, resolve_png_assets,
};
use crate::models::{ContainerFormat, ExtractionSummary, Resolution};
use crate::writer::AssetWriter;

/// Recover the assets of the card at `path` with the default configuration.
///
/// Returns the output directory, which exists even when no asset was found.
pub fn extract(path: impl AsRef<Path>) -> ExtractResult<PathBuf> {
    AssetExtractor::default().extract(path)
}

/// High-level helper that processes one container at a time.
#[derive(Debug, Clone, Default)]
pub struct AssetExtractor {
    config: ExtractorConfig,
}

impl AssetExtractor {
    /// Create an extractor for the provided configuration.
    pub fn new(config: ExtractorConfig) -> Self {
        Self { config }
    }

    /// Run an extraction and return only the output directory.
    pub fn extract(&self, path: impl AsRef<Path>) -> ExtractResult<PathBuf> {
        self.run(path).map(|summary| summary.output_dir)
    }

    /// Run an extraction and return the aggregate summary.
    pub fn run(&self, path: impl AsRef<Path>) -> ExtractResult<ExtractionSummary> {
        let path = path.as_ref();
        if !path.is_file() {
            log::error!("file not found: {}", path.display());
            return Err(ExtractError::FileNotFound(path.to_path_buf()));
        }

        let format = detect_format(path).inspect_err(|err| log::error!("{err}"))?;
        log::info!("processing {} as {format}", path.display());

        let summary = match format {
            ContainerFormat::PngCard => self.extract_png(path),
            ContainerFormat::Charx => self.extract_charx(path),
        }
        .inspect_err(|err| log::error!("extraction of {} failed: {err}", path.display()))?;

        if summary.written == 0 {
            log::warn!("no assets were written for {}", path.display());
        }
        Ok(summary)
    }

    fn extract_png(&self, path: &Path) -> ExtractResult<ExtractionSummary> {
        let scan = scan_png(path);
        if scan.main_data.is_none() && scan.assets.is_empty() {
            log::warn!("{} carries no card data or embedded assets", path.display());
        }

        let manifest = scan
            .main_data
            .as_deref()
            .and_then(|main_data| match CharacterManifest::from_main_data(main_data) {
                Ok(manifest) => Some(manifest),
                Err(ManifestParseError::Encrypted) => {
                    log::warn!("main data is encrypted; asset names cannot be recovered");
                    None
                }
                Err(err) => {
                    log::error!("failed to parse main data: {err}");
                    None
                }
            });

        let resolution = resolve_png_assets(manifest.as_ref(), &scan.assets);
        self.materialise(ContainerFormat::PngCard, path, resolution)
    }

    fn extract_charx(&self, path: &Path) -> ExtractResult<ExtractionSummary> {
        let unpacked = unpack_charx(
            path,
            self.config.scratch_dir_for(path),
            &self.config.manifest_file,
        )?;

        let resolution = match &unpacked.contents {
            CharxContents::Manifest(manifest) => {
                let resolution = resolve_charx_assets(manifest, &unpacked.assets);
                if resolution.tasks.is_empty() && resolution.skipped.is_empty() {
                    log::warn!("'{}' lists no assets", self.config.manifest_file);
                }
                resolution
            }
            CharxContents::Loose => Resolution {
                tasks: unpacked.loose_copy_tasks(&self.config.fallback_assets_dir),
                skipped: Vec::new(),
            },
        };

        // Sources live in the scratch area, which is dropped only after the writes join.
        let summary = self.materialise(ContainerFormat::Charx, path, resolution);
        drop(unpacked);
        summary
    }

    fn materialise(
        &self,
        format: ContainerFormat,
        path: &Path,
        resolution: Resolution,
    ) -> ExtractResult<ExtractionSummary> {
        let writer = AssetWriter::new(
            self.config.output_dir_for(path),
            self.config.worker_threads,
        )?;
        let outcomes = writer.write_all(&resolution.tasks);

        let mut summary = ExtractionSummary::new(format, writer.output_dir().to_path_buf());
        summary.record(resolution.skipped.len(), &outcomes);
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_base64;
    use crate::container::charx::fixtures::write_zip;
    use crate::container::png::fixtures::png_with_text;
    use std::fs;
    use tempfile::tempdir;

    fn listing(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn png_card_assets_are_named_from_v3_manifest() {
        let temp = tempdir().unwrap();
        let card = temp.path().join("alice.png");
        let manifest = r#"{"data":{"assets":[{"uri":"__asset:0","name":"portrait","ext":"png"}]}}"#;
        fs::write(
            &card,
            png_with_text(&[
                ("chara-ext-asset_0", &encode_base64(b"PNGDATA")),
                ("ccv3", &encode_base64(manifest.as_bytes())),
            ]),
        )
        .unwrap();

        let output = extract(&card).unwrap();
        assert_eq!(output, temp.path().join("alice_assets"));
        assert_eq!(listing(&output), vec!["portrait.png"]);
        assert_eq!(fs::read(output.join("portrait.png")).unwrap(), b"PNGDATA");
    }

    #[cfg(unix)]
    #[test]
    fn legal_manifest_names_reach_disk_unchanged() {
        let temp = tempdir().unwrap();
        let card = temp.path().join("dana.png");
        let manifest =
            r#"{"data":{"assets":[{"uri":"__asset:0","name":"Scene: 1?","ext":"png"}]}}"#;
        fs::write(
            &card,
            png_with_text(&[
                ("chara-ext-asset_0", &encode_base64(b"SCENE")),
                ("ccv3", &encode_base64(manifest.as_bytes())),
            ]),
        )
        .unwrap();

        let output = extract(&card).unwrap();
        assert_eq!(listing(&output), vec!["Scene: 1?.png"]);
        assert_eq!(fs::read(output.join("Scene: 1?.png")).unwrap(), b"SCENE");
    }

    #[test]
    fn encrypted_main_data_falls_back_to_generated_names() {
        let temp = tempdir().unwrap();
        let card = temp.path().join("locked.png");
        fs::write(
            &card,
            png_with_text(&[
                ("chara", "rcc||c2VjcmV0"),
                ("chara-ext-asset_0", &encode_base64(b"\xFF\xD8\xFFjpeg")),
                ("chara-ext-asset_1", &encode_base64(b"opaque")),
            ]),
        )
        .unwrap();

        let summary = AssetExtractor::default().run(&card).unwrap();
        assert_eq!(summary.format, ContainerFormat::PngCard);
        assert_eq!(summary.written, 2);
        assert_eq!(listing(&summary.output_dir), vec!["asset_0.jpg", "asset_1.dat"]);
    }

    #[test]
    fn unparsable_main_data_still_writes_every_blob() {
        let temp = tempdir().unwrap();
        let card = temp.path().join("garbled.png");
        fs::write(
            &card,
            png_with_text(&[
                ("chara", &encode_base64(b"{ not json")),
                ("chara-ext-asset_3", &encode_base64(b"GIF89a")),
            ]),
        )
        .unwrap();

        let output = extract(&card).unwrap();
        assert_eq!(listing(&output), vec!["asset_3.gif"]);
    }

    #[test]
    fn png_without_card_data_succeeds_with_empty_output() {
        let temp = tempdir().unwrap();
        let card = temp.path().join("plain.png");
        fs::write(&card, png_with_text(&[])).unwrap();

        let summary = AssetExtractor::default().run(&card).unwrap();
        assert_eq!(summary.written, 0);
        assert!(summary.output_dir.is_dir());
        assert!(listing(&summary.output_dir).is_empty());
    }

    #[test]
    fn charx_assets_are_renamed_and_scratch_is_removed() {
        let temp = tempdir().unwrap();
        let card = temp.path().join("bob.charx");
        write_zip(
            &card,
            &[
                (
                    "card.json",
                    br#"{"data":{"assets":[{"uri":"embed://img/a.png","name":"icon","ext":"png"}]}}"#,
                ),
                ("img/a.png", b"ICON"),
            ],
        );

        let output = extract(&card).unwrap();
        assert_eq!(listing(&output), vec!["icon.png"]);
        assert_eq!(fs::read(output.join("icon.png")).unwrap(), b"ICON");
        assert!(!temp.path().join("bob_temp_extraction").exists());
    }

    #[test]
    fn charx_without_manifest_copies_assets_verbatim() {
        let temp = tempdir().unwrap();
        let card = temp.path().join("loose.charx");
        write_zip(&card, &[("assets/x.webp", b"RIFF0000WEBP"), ("readme.txt", b"hi")]);

        let summary = AssetExtractor::default().run(&card).unwrap();
        assert_eq!(summary.format, ContainerFormat::Charx);
        assert_eq!(listing(&summary.output_dir), vec!["x.webp"]);
        assert_eq!(
            fs::read(summary.output_dir.join("x.webp")).unwrap(),
            b"RIFF0000WEBP"
        );
        assert!(!temp.path().join("loose_temp_extraction").exists());
    }

    #[test]
    fn existing_output_directory_is_merged_into() {
        let temp = tempdir().unwrap();
        let card = temp.path().join("again.charx");
        write_zip(&card, &[("assets/x.webp", b"NEW")]);
        let output = temp.path().join("again_assets");
        fs::create_dir_all(&output).unwrap();
        fs::write(output.join("keep.txt"), b"mine").unwrap();
        fs::write(output.join("x.webp"), b"OLD").unwrap();

        let summary = AssetExtractor::default().run(&card).unwrap();
        assert_eq!(summary.output_dir, output);
        assert_eq!(listing(&output), vec!["keep.txt", "x.webp"]);
        assert_eq!(fs::read(output.join("keep.txt")).unwrap(), b"mine");
        assert_eq!(fs::read(output.join("x.webp")).unwrap(), b"NEW");
    }

    #[test]
    fn damaged_charx_reports_corruption_and_leaves_nothing_behind() {
        let temp = tempdir().unwrap();
        let card = temp.path().join("torn.charx");
        write_zip(&card, &[("card.json", b"{}"), ("img/a.png", b"A")]);
        let mut bytes = fs::read(&card).unwrap();
        bytes[..4].copy_from_slice(b"JUNK");
        let offset_at = bytes.len() - 6;
        bytes[offset_at..offset_at + 4].copy_from_slice(&100_000u32.to_le_bytes());
        fs::write(&card, bytes).unwrap();

        assert!(matches!(
            AssetExtractor::default().run(&card),
            Err(ExtractError::ArchiveCorrupt { .. })
        ));
        assert!(!temp.path().join("torn_assets").exists());
        assert!(!temp.path().join("torn_temp_extraction").exists());
    }

    #[test]
    fn charx_missing_sources_are_skipped() {
        let temp = tempdir().unwrap();
        let card = temp.path().join("partial.charx");
        write_zip(
            &card,
            &[
                (
                    "card.json",
                    br#"{"data":{"assets":[
                        {"uri":"embeded://a.png","name":"a","ext":"png"},
                        {"uri":"embed://nowhere.png","name":"b","ext":"png"}
                    ]}}"#,
                ),
                ("a.png", b"A"),
            ],
        );

        let summary = AssetExtractor::default().run(&card).unwrap();
        assert_eq!((summary.written, summary.skipped, summary.failed), (1, 1, 0));
        assert_eq!(listing(&summary.output_dir), vec!["a.png"]);
    }

    #[test]
    fn unsupported_input_fails_without_output_directory() {
        let temp = tempdir().unwrap();
        let input = temp.path().join("notes.txt");
        fs::write(&input, b"plain text").unwrap();

        assert!(matches!(
            extract(&input),
            Err(ExtractError::UnsupportedFormat(_))
        ));
        assert!(!temp.path().join("notes_assets").exists());
    }

    #[test]
    fn missing_input_is_reported() {
        let temp = tempdir().unwrap();
        assert!(matches!(
            extract(temp.path().join("ghost.png")),
            Err(ExtractError::FileNotFound(_))
        ));
    }

    #[test]
    fn honours_configured_output_root_and_suffix() {
        let temp = tempdir().unwrap();
        let card = temp.path().join("carol.png");
        fs::write(
            &card,
            png_with_text(&[("chara-ext-asset_0", &encode_base64(b"x"))]),
        )
        .unwrap();
        let out_root = temp.path().join("exports");

        let extractor = AssetExtractor::new(ExtractorConfig {
            output_suffix: "_files".into(),
            output_root: Some(out_root.clone()),
            worker_threads: 1,
            ..ExtractorConfig::default()
        });
        let output = extractor.extract(&card).unwrap();

        assert_eq!(output, out_root.join("carol_files"));
        assert_eq!(listing(&output), vec!["asset_0.dat"]);
    }
}
