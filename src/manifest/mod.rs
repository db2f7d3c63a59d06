//! Manifest decoding and asset name resolution, split so each schema concern can be tested alone.

mod resolve;
mod schema;

pub use resolve::{
    EMBED_PREFIXES, PNG_ASSET_PREFIX, parse_png_reference, resolve_charx_assets, resolve_file_name,
    resolve_png_assets, strip_embed_prefix,
};
pub use schema::{
    CharacterManifest, ENCRYPTED_PREFIX, ManifestEntry, ManifestParseError, V2_DEFAULT_EXT, V2Entry,
    V3Entry,
};
