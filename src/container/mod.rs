//! Readers for the two card container shapes.

pub mod charx;
pub mod png;

pub use charx::{CharxContents, ScratchArea, UnpackedCharx, unpack_charx};
pub use png::{PngScan, scan_png};
