//! Character manifest decoding and the two asset-list schema generations.

use std::path::Path;

use serde_json::Value;
use thiserror::Error;

use crate::codec::decode_base64;
use crate::models::AssetManifestEntry;

/// Marker prefixing encrypted main data payloads.
pub const ENCRYPTED_PREFIX: &str = "rcc||";

/// Extension assumed for v2 tuples that omit one.
pub const V2_DEFAULT_EXT: &str = "dat";

/// Reasons the embedded manifest could not be turned into a [`CharacterManifest`].
#[derive(Debug, Error)]
pub enum ManifestParseError {
    /// The payload is encrypted and cannot be read.
    #[error("main data is encrypted")]
    Encrypted,
    /// The payload is not valid base64.
    #[error("main data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    /// The decoded payload is not UTF-8.
    #[error("main data is not valid UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    /// The document is not valid JSON.
    #[error("manifest is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decoded character document.
///
/// Only the asset lists are interpreted; everything else is carried opaquely.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterManifest {
    root: Value,
}

impl CharacterManifest {
    /// Wrap an already parsed JSON document.
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// Parse a JSON document such as `card.json`.
    pub fn from_json(bytes: &[u8]) -> Result<Self, ManifestParseError> {
        Ok(Self::from_value(serde_json::from_slice(bytes)?))
    }

    /// Decode the base64 main data string carried by a PNG card.
    pub fn from_main_data(main_data: &str) -> Result<Self, ManifestParseError> {
        if main_data.starts_with(ENCRYPTED_PREFIX) {
            return Err(ManifestParseError::Encrypted);
        }
        let text = String::from_utf8(decode_base64(main_data)?)?;
        Ok(Self::from_value(serde_json::from_str(&text)?))
    }

    /// Entries listed under `data.assets`.
    pub fn v3_entries(&self) -> Vec<ManifestEntry> {
        self.list_at(&["data", "assets"])
    }

    /// Entries listed under `data.extensions.risuai.additionalAssets` then `...emotions`.
    pub fn v2_entries(&self) -> Vec<ManifestEntry> {
        let mut entries = self.list_at(&["data", "extensions", "risuai", "additionalAssets"]);
        entries.extend(self.list_at(&["data", "extensions", "risuai", "emotions"]));
        entries
    }

    fn list_at(&self, path: &[&str]) -> Vec<ManifestEntry> {
        path
            .iter()
            .try_fold(&self.root, |value, key| value.get(key))
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(ManifestEntry::from_value).collect())
            .unwrap_or_default()
    }
}

/// `{uri, name, ext}` object from the v3 asset list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct V3Entry {
    /// Asset reference.
    pub uri: Option<String>,
    /// Display name, possibly already carrying its extension.
    pub name: Option<String>,
    /// Extension without the dot.
    pub ext: Option<String>,
}

/// `[name, uri, ext?]` tuple from the v2 asset lists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct V2Entry {
    /// First tuple element; only its stem is used.
    pub name: String,
    /// Asset reference.
    pub uri: String,
    /// Third tuple element, [`V2_DEFAULT_EXT`] when the tuple has two elements.
    pub ext: Option<String>,
}

/// One asset-list item in either schema generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManifestEntry {
    /// Object-shaped entry.
    V3(V3Entry),
    /// Tuple-shaped entry.
    V2(V2Entry),
}

impl ManifestEntry {
    /// Interpret a JSON list item; objects are v3, arrays of two or more are v2.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Object(fields) => {
                let text = |key: &str| fields.get(key).and_then(Value::as_str).map(str::to_owned);
                Some(Self::V3(V3Entry {
                    uri: text("uri"),
                    name: text("name"),
                    ext: text("ext"),
                }))
            }
            Value::Array(items) if items.len() >= 2 => {
                let name = items[0].as_str()?.to_owned();
                let uri = items[1].as_str()?.to_owned();
                let ext = match items.get(2) {
                    None => Some(V2_DEFAULT_EXT.to_owned()),
                    Some(value) => value.as_str().map(str::to_owned),
                };
                Some(Self::V2(V2Entry { name, uri, ext }))
            }
            _ => None,
        }
    }

    /// Reference as written, for diagnostics.
    pub fn reference(&self) -> &str {
        match self {
            Self::V3(entry) => entry.uri.as_deref().unwrap_or_default(),
            Self::V2(entry) => &entry.uri,
        }
    }

    /// Map either generation onto the canonical entry.
    ///
    /// Returns `None` when the entry has no usable name or reference.
    pub fn normalize(self) -> Option<AssetManifestEntry> {
        let (reference, name, ext) = match self {
            Self::V3(entry) => (entry.uri?, entry.name?, entry.ext),
            Self::V2(entry) => {
                let stem = Path::new(&entry.name)
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or_default();
                (entry.uri, stem, entry.ext)
            }
        };
        if reference.is_empty() || name.is_empty() {
            return None;
        }
        Some(AssetManifestEntry {
            reference,
            name,
            ext: ext.filter(|ext| !ext.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_base64;
    use serde_json::json;

    #[test]
    fn decodes_base64_main_data() {
        let doc = r#"{"data":{"assets":[{"uri":"__asset:0","name":"portrait","ext":"png"}]}}"#;
        let manifest = CharacterManifest::from_main_data(&encode_base64(doc.as_bytes())).unwrap();
        assert_eq!(manifest.v3_entries(), vec![ManifestEntry::V3(V3Entry {
            uri: Some("__asset:0".into()),
            name: Some("portrait".into()),
            ext: Some("png".into()),
        })]);
    }

    #[test]
    fn reports_each_main_data_failure() {
        assert!(matches!(
            CharacterManifest::from_main_data("rcc||abcdef"),
            Err(ManifestParseError::Encrypted)
        ));
        assert!(matches!(
            CharacterManifest::from_main_data("%%%"),
            Err(ManifestParseError::Base64(_))
        ));
        assert!(matches!(
            CharacterManifest::from_main_data(&encode_base64(b"\xFF\xFE")),
            Err(ManifestParseError::Utf8(_))
        ));
        assert!(matches!(
            CharacterManifest::from_main_data(&encode_base64(b"{not json")),
            Err(ManifestParseError::Json(_))
        ));
    }

    #[test]
    fn reads_v2_lists_in_order() {
        let manifest = CharacterManifest::from_value(json!({
            "data": {"extensions": {"risuai": {
                "additionalAssets": [["bgm.mp3", "__asset:1", "mp3"], ["bad"]],
                "emotions": [["happy", "__asset:2"]]
            }}}
        }));

        assert_eq!(
            manifest.v2_entries(),
            vec![
                ManifestEntry::V2(V2Entry {
                    name: "bgm.mp3".into(),
                    uri: "__asset:1".into(),
                    ext: Some("mp3".into()),
                }),
                ManifestEntry::V2(V2Entry {
                    name: "happy".into(),
                    uri: "__asset:2".into(),
                    ext: Some("dat".into()),
                }),
            ]
        );
        assert!(manifest.v3_entries().is_empty());
    }

    #[test]
    fn tolerates_unexpected_shapes() {
        let manifest = CharacterManifest::from_value(json!({
            "data": {"assets": "nope", "extensions": {"risuai": null}}
        }));
        assert!(manifest.v3_entries().is_empty());
        assert!(manifest.v2_entries().is_empty());

        let manifest =
            CharacterManifest::from_value(json!({"data": {"assets": [1, null, [2, 3]]}}));
        assert!(manifest.v3_entries().is_empty());
    }

    #[test]
    fn v2_normalisation_keeps_only_the_stem() {
        let entry = ManifestEntry::V2(V2Entry {
            name: "sprites/smile.png".into(),
            uri: "__asset:4".into(),
            ext: Some("webp".into()),
        });
        assert_eq!(
            entry.normalize(),
            Some(AssetManifestEntry {
                reference: "__asset:4".into(),
                name: "smile".into(),
                ext: Some("webp".into()),
            })
        );
    }

    #[test]
    fn v2_null_extension_means_none() {
        let entry = ManifestEntry::from_value(&json!(["icon", "__asset:0", null])).unwrap();
        assert_eq!(entry.normalize().unwrap().ext, None);
    }

    #[test]
    fn v3_normalisation_requires_uri_and_name() {
        let missing_name = ManifestEntry::V3(V3Entry {
            uri: Some("__asset:0".into()),
            ..V3Entry::default()
        });
        assert_eq!(missing_name.normalize(), None);

        let empty_ext = ManifestEntry::V3(V3Entry {
            uri: Some("embed://a.png".into()),
            name: Some("a".into()),
            ext: Some(String::new()),
        });
        assert_eq!(empty_ext.normalize().unwrap().ext, None);
    }
}
