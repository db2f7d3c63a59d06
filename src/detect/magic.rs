use super::PNG_SIGNATURE;

/// Extension reported for content that matches no known signature.
pub const FALLBACK_EXTENSION: &str = ".dat";

/// Guess an image extension (with leading dot) from the leading bytes of `data`.
///
/// Total over every input: anything unrecognised, including an empty slice,
/// maps to [`FALLBACK_EXTENSION`].
pub fn detect_extension(data: &[u8]) -> &'static str {
    if data.starts_with(&PNG_SIGNATURE) {
        ".png"
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        ".jpg"
    } else if data.starts_with(b"RIFF") && data.get(8..12) == Some(b"WEBP".as_slice()) {
        ".webp"
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        ".gif"
    } else {
        FALLBACK_EXTENSION
    }
}
