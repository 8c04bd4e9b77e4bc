//! Binary glTF container (`.glb`) framing.
//!
//! Layout: a 12-byte header (`glTF` magic, version `2`, total length), then
//! chunks of `[u32 length][4-byte type][payload]`, all little-endian. The
//! first chunk is the JSON scene document, every later chunk is a `BIN` blob.

use std::sync::Arc;

use thiserror::Error;

pub const HEADER_LEN: usize = 12;
pub const CHUNK_HEADER_LEN: usize = 8;
const MAGIC: &[u8; 4] = b"glTF";
const VERSION: u32 = 2;
const JSON_CHUNK: &[u8; 4] = b"JSON";
const BIN_CHUNK: &[u8; 4] = b"BIN\0";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("file not big enough for a glTF header ({0} bytes)")]
    TooSmall(usize),
    #[error("file is not in glTF format")]
    BadMagic,
    #[error("glTF version {0} is not supported, expected version 2")]
    UnsupportedVersion(u32),
    #[error("glb header declares {declared} bytes but the file has {actual}")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("first chunk was not of type JSON")]
    FirstChunkNotJson,
    #[error("untrustworthy size for chunk {chunk}")]
    CorruptChunkSize { chunk: usize },
    #[error("chunk {chunk} was not of type BIN")]
    ChunkNotBin { chunk: usize },
    #[error("JSON chunk could not be parsed: {0}")]
    Json(String),
}

/// A decoded container: the raw JSON chunk and the binary chunks in order.
#[derive(Debug, Clone, PartialEq)]
pub struct Glb {
    pub json: Vec<u8>,
    pub bins: Vec<Arc<[u8]>>,
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    let mut word = [0u8; 4];
    word.copy_from_slice(&bytes[at..at + 4]);
    u32::from_le_bytes(word)
}

fn is_bin_tag(tag: &[u8]) -> bool {
    // writers differ on padding the tag with NUL or space
    tag.starts_with(&BIN_CHUNK[..3])
}

/// Split a `.glb` file into its JSON and binary chunks.
pub fn decode_glb(bytes: &[u8]) -> Result<Glb, DecodeError> {
    if bytes.len() < HEADER_LEN {
        return Err(DecodeError::TooSmall(bytes.len()));
    }
    if &bytes[0..4] != MAGIC {
        return Err(DecodeError::BadMagic);
    }
    let version = read_u32(bytes, 4);
    if version != VERSION {
        return Err(DecodeError::UnsupportedVersion(version));
    }
    let declared = read_u32(bytes, 8) as usize;
    if declared != bytes.len() {
        return Err(DecodeError::LengthMismatch {
            declared,
            actual: bytes.len(),
        });
    }
    if declared < HEADER_LEN + CHUNK_HEADER_LEN {
        return Err(DecodeError::CorruptChunkSize { chunk: 0 });
    }

    let json_len = read_u32(bytes, HEADER_LEN) as usize;
    if &bytes[HEADER_LEN + 4..HEADER_LEN + 8] != JSON_CHUNK {
        return Err(DecodeError::FirstChunkNotJson);
    }
    let json_start = HEADER_LEN + CHUNK_HEADER_LEN;
    if json_len > declared - json_start {
        return Err(DecodeError::CorruptChunkSize { chunk: 0 });
    }
    let json = bytes[json_start..json_start + json_len].to_vec();

    let mut bins = Vec::new();
    let mut at = json_start + json_len;
    let mut chunk = 1;
    while at < declared {
        if declared - at < CHUNK_HEADER_LEN {
            return Err(DecodeError::CorruptChunkSize { chunk });
        }
        let len = read_u32(bytes, at) as usize;
        if !is_bin_tag(&bytes[at + 4..at + 8]) {
            return Err(DecodeError::ChunkNotBin { chunk });
        }
        let start = at + CHUNK_HEADER_LEN;
        if len > declared - start {
            return Err(DecodeError::CorruptChunkSize { chunk });
        }
        bins.push(Arc::from(&bytes[start..start + len]));
        at = start + len;
        chunk += 1;
    }

    Ok(Glb { json, bins })
}

fn padded(len: usize) -> usize {
    len.div_ceil(4) * 4
}

/// Frame a JSON document and binary chunks as a `.glb` file.
///
/// The JSON chunk is padded with spaces and binary chunks with zeros to a
/// four-byte boundary, as the container format requires.
pub fn encode_glb(json: &str, bins: &[&[u8]]) -> Vec<u8> {
    let json_len = padded(json.len());
    let total = HEADER_LEN
        + CHUNK_HEADER_LEN
        + json_len
        + bins
            .iter()
            .map(|bin| CHUNK_HEADER_LEN + padded(bin.len()))
            .sum::<usize>();

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&VERSION.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());

    out.extend_from_slice(&(json_len as u32).to_le_bytes());
    out.extend_from_slice(JSON_CHUNK);
    out.extend_from_slice(json.as_bytes());
    out.resize(out.len() + json_len - json.len(), b' ');

    for bin in bins {
        let len = padded(bin.len());
        out.extend_from_slice(&(len as u32).to_le_bytes());
        out.extend_from_slice(BIN_CHUNK);
        out.extend_from_slice(bin);
        out.resize(out.len() + len - bin.len(), 0);
    }
    out
}
