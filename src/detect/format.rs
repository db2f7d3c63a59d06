use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{ExtractError, ExtractResult};
use crate::models::ContainerFormat;

/// The eight-byte PNG file signature.
pub const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

/// Signature of the ZIP end-of-central-directory record.
const EOCD_SIGNATURE: [u8; 4] = [b'P', b'K', 0x05, 0x06];

/// Fixed part of the end-of-central-directory record.
const EOCD_MIN_LEN: usize = 22;

/// Bytes of the record that must follow its signature.
const EOCD_AFTER_SIGNATURE: usize = EOCD_MIN_LEN - EOCD_SIGNATURE.len();

/// The record sits within this many bytes of the end (fixed part plus maximum comment).
const EOCD_SEARCH_WINDOW: u64 = (EOCD_MIN_LEN + u16::MAX as usize) as u64;

/// Classify the container at `path` from its content.
///
/// A PNG signature wins; otherwise the tail of the file must carry a ZIP
/// end-of-central-directory record. The archive is not validated here, so a
/// damaged ZIP is still a charx and fails later as
/// [`ExtractError::ArchiveCorrupt`]. The file extension is never consulted.
/// Anything else is [`ExtractError::UnsupportedFormat`].
pub fn detect_format(path: &Path) -> ExtractResult<ContainerFormat> {
    let mut file = File::open(path).map_err(|err| ExtractError::io(path, err))?;

    let mut header = Vec::with_capacity(PNG_SIGNATURE.len());
    file.by_ref()
        .take(PNG_SIGNATURE.len() as u64)
        .read_to_end(&mut header)
        .map_err(|err| ExtractError::io(path, err))?;
    if header == PNG_SIGNATURE {
        return Ok(ContainerFormat::PngCard);
    }

    if has_zip_trailer(&mut file).map_err(|err| ExtractError::io(path, err))? {
        return Ok(ContainerFormat::Charx);
    }
    log::debug!(
        "{} has neither a PNG signature nor a ZIP trailer",
        path.display()
    );
    Err(ExtractError::UnsupportedFormat(path.to_path_buf()))
}

/// Whether an end-of-central-directory signature appears near the end of `file`.
fn has_zip_trailer(file: &mut File) -> std::io::Result<bool> {
    let len = file.seek(SeekFrom::End(0))?;
    let window = len.min(EOCD_SEARCH_WINDOW);
    file.seek(SeekFrom::Start(len - window))?;

    let mut tail = Vec::with_capacity(window as usize);
    file.by_ref().take(window).read_to_end(&mut tail)?;
    if tail.len() < EOCD_MIN_LEN {
        return Ok(false);
    }

    let searchable = &tail[..tail.len() - EOCD_AFTER_SIGNATURE];
    Ok(searchable
        .windows(EOCD_SIGNATURE.len())
        .any(|candidate| candidate == EOCD_SIGNATURE))
}
