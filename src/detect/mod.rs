//! Byte-signature sniffing for containers and recovered assets.
//!
//! Container detection looks at the file itself, never at its extension, and
//! asset classification only ever needs the leading bytes of a blob. Both are
//! kept apart so the classifier stays a pure function over a byte slice.

mod format;
mod magic;

pub use format::{PNG_SIGNATURE, detect_format};
pub use magic::{FALLBACK_EXTENSION, detect_extension};
