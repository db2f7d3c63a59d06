//! Base64 decoding shared by asset chunks and the embedded manifest.

use base64::engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig};
use base64::{Engine as _, alphabet};

/// Standard alphabet, tolerant of missing or present padding.
const CARD_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Decode a base64 payload as written by card editors.
///
/// ASCII whitespace (line wrapping) is ignored before decoding.
pub fn decode_base64(value: &str) -> Result<Vec<u8>, base64::DecodeError> {
    if value.bytes().any(|byte| byte.is_ascii_whitespace()) {
        let compact: String = value
            .chars()
            .filter(|c| !c.is_ascii_whitespace())
            .collect();
        CARD_BASE64.decode(compact)
    } else {
        CARD_BASE64.decode(value)
    }
}

#[cfg(test)]
pub(crate) fn encode_base64(bytes: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
