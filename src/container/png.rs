//! Streaming scan of PNG `tEXt` chunks for embedded card data.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::Path;

use crate::codec::decode_base64;
use crate::detect::PNG_SIGNATURE;
use crate::models::AssetBlob;

const TEXT_CHUNK: [u8; 4] = *b"tEXt";
const END_CHUNK: [u8; 4] = *b"IEND";
const ASSET_KEY_PREFIX: &str = "chara-ext-asset_";
const MAIN_DATA_KEYS: [&str; 2] = ["chara", "ccv3"];

/// Everything of interest found in a PNG card.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PngScan {
    /// Base64 manifest payload from the last `chara`/`ccv3` chunk.
    pub main_data: Option<String>,
    /// Decoded asset blobs keyed by chunk index.
    pub assets: BTreeMap<u64, AssetBlob>,
}

/// Scan the PNG at `path`, collecting the manifest string and asset blobs.
///
/// Malformed asset chunks are skipped individually. Any structural or I/O
/// failure yields an empty [`PngScan`] after logging a warning.
pub fn scan_png(path: &Path) -> PngScan {
    let scan = match File::open(path).and_then(|file| scan_chunks(BufReader::new(file))) {
        Ok(scan) => scan,
        Err(err) => {
            log::warn!("failed to scan PNG chunks in {}: {err}", path.display());
            PngScan::default()
        }
    };

    log::info!(
        "PNG scan finished: main data {}, {} asset chunk(s)",
        if scan.main_data.is_some() { "found" } else { "absent" },
        scan.assets.len()
    );
    scan
}

/// Walk the chunk stream of `reader`, which must start at the PNG signature.
pub fn scan_chunks<R: Read>(mut reader: R) -> io::Result<PngScan> {
    let mut signature = [0u8; 8];
    reader.read_exact(&mut signature)?;
    if signature != PNG_SIGNATURE {
        return Err(io::Error::new(ErrorKind::InvalidData, "missing PNG signature"));
    }

    let mut scan = PngScan::default();
    loop {
        let mut header = [0u8; 8];
        match reader.read_exact(&mut header) {
            Ok(()) => {}
            // A stream that simply stops between chunks is tolerated.
            Err(err) if err.kind() == ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(err),
        }
        let length = u64::from(u32::from_be_bytes([header[0], header[1], header[2], header[3]]));
        let kind = [header[4], header[5], header[6], header[7]];

        if kind == TEXT_CHUNK {
            let mut data = Vec::new();
            reader.by_ref().take(length).read_to_end(&mut data)?;
            if data.len() as u64 != length {
                return Err(ErrorKind::UnexpectedEof.into());
            }
            scan.absorb_text_chunk(&data);
        } else {
            skip_exact(&mut reader, length)?;
        }

        // CRC
        skip_exact(&mut reader, 4)?;

        if kind == END_CHUNK {
            break;
        }
    }

    Ok(scan)
}

impl PngScan {
    fn absorb_text_chunk(&mut self, data: &[u8]) {
        let (key, value) = match data.iter().position(|byte| *byte == 0) {
            Some(nul) => (&data[..nul], &data[nul + 1..]),
            None => (data, &[][..]),
        };
        let key = String::from_utf8_lossy(key);

        if let Some(raw_index) = key.strip_prefix(ASSET_KEY_PREFIX) {
            let value = String::from_utf8_lossy(value);
            match decode_asset_chunk(raw_index, &value) {
                Some(blob) => {
                    self.assets.insert(blob.index, blob);
                }
                None => log::warn!("skipping malformed asset chunk '{key}'"),
            }
        } else if MAIN_DATA_KEYS.iter().any(|candidate| key == *candidate) {
            self.main_data = Some(String::from_utf8_lossy(value).into_owned());
        }
    }
}

fn decode_asset_chunk(raw_index: &str, value: &str) -> Option<AssetBlob> {
    let index = match raw_index.trim_matches(':').parse::<u64>() {
        Ok(index) => index,
        Err(err) => {
            log::debug!("invalid asset index '{raw_index}': {err}");
            return None;
        }
    };
    match decode_base64(value) {
        Ok(bytes) => Some(AssetBlob {
            index,
            bytes: bytes.into(),
        }),
        Err(err) => {
            log::debug!("invalid base64 in asset chunk {index}: {err}");
            None
        }
    }
}

fn skip_exact<R: Read>(reader: &mut R, count: u64) -> io::Result<()> {
    let skipped = io::copy(&mut reader.by_ref().take(count), &mut io::sink())?;
    if skipped == count {
        Ok(())
    } else {
        Err(ErrorKind::UnexpectedEof.into())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::detect::PNG_SIGNATURE;

    /// Append one chunk with a valid CRC.
    pub fn push_chunk(out: &mut Vec<u8>, kind: &[u8; 4], data: &[u8]) {
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(data);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(kind);
        hasher.update(data);
        out.extend_from_slice(&hasher.finalize().to_be_bytes());
    }

    /// Minimal 1x1 PNG carrying the given `tEXt` key/value pairs.
    pub fn png_with_text(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut out = PNG_SIGNATURE.to_vec();
        let mut ihdr = Vec::new();
        ihdr.extend_from_slice(&1u32.to_be_bytes());
        ihdr.extend_from_slice(&1u32.to_be_bytes());
        ihdr.extend_from_slice(&[8, 6, 0, 0, 0]);
        push_chunk(&mut out, b"IHDR", &ihdr);
        for (key, value) in entries {
            let mut text = key.as_bytes().to_vec();
            text.push(0);
            text.extend_from_slice(value.as_bytes());
            push_chunk(&mut out, b"tEXt", &text);
        }
        push_chunk(&mut out, b"IDAT", &[0x78, 0x9C, 0x63, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01]);
        push_chunk(&mut out, b"IEND", &[]);
        out
    }
}
