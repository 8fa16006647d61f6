//! Data record decoding

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::engine::DecodePaddingMode;
use base64::Engine;
use md5::Md5;
use sha2::{Digest, Sha256};

use crate::config::CodecConfig;
use crate::error::{CodecError, Result};
use crate::filename;

/// Base64 prefix of every JPEG (the encoding of `FF D8 FF`)
pub const JPEG_SIGNATURE: &str = "/9j/";

/// Field separator inside a data line
pub const FIELD_SEPARATOR: char = ',';

const FIELD_COUNT: usize = 4;

// Exports in the wild carry non-canonical tail bits and inconsistent padding.
const LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new()
        .with_decode_allow_trailing_bits(true)
        .with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// One decoded data line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Dash-delimited subdivision code, e.g. `12-21-26523`
    pub subdivision_code: String,
    /// Six-character year-month, e.g. `202512`
    pub year_month: String,
    /// Opaque metadata, passed through untouched
    pub encrypted_meta: String,
    /// The image field exactly as it appeared in the source
    pub original_base64: String,
    /// 1-based position of the line after the header
    pub sequence_index: usize,
    /// Derived archive filename
    pub filename: String,
    /// Decoded image payload
    pub image_bytes: Vec<u8>,
    /// Hex digest of `image_bytes`
    pub content_hash: String,
}

impl Record {
    /// Format the record as a data line carrying the given base64 text
    pub fn to_line(&self, base64: &str) -> String {
        format_line(&self.subdivision_code, &self.year_month, &self.encrypted_meta, base64)
    }
}

/// Join the four fields of a data line
pub fn format_line(subdivision_code: &str, year_month: &str, encrypted_meta: &str, base64: &str) -> String {
    format!(
        "{subdivision_code}{sep}{year_month}{sep}{encrypted_meta}{sep}{base64}",
        sep = FIELD_SEPARATOR
    )
}

/// Decode one non-blank data line
///
/// Only the first three commas split fields, so the payload is never cut.
/// Checks run in order: field count, JPEG signature, base64 decoding.
pub fn decode_line(line: &str, sequence_index: usize, config: &CodecConfig) -> Result<Record> {
    let parts: Vec<&str> = line.splitn(FIELD_COUNT, FIELD_SEPARATOR).collect();
    if parts.len() < FIELD_COUNT {
        return Err(CodecError::MalformedRecord { line: sequence_index });
    }

    let (subdivision_code, year_month, encrypted_meta, payload) = (parts[0], parts[1], parts[2], parts[3]);

    if !payload.starts_with(JPEG_SIGNATURE) {
        return Err(CodecError::UnsupportedPayload { line: sequence_index });
    }

    let image_bytes = decode_payload(payload).map_err(|source| CodecError::DecodeFailure {
        line: sequence_index,
        source,
    })?;

    Ok(Record {
        subdivision_code: subdivision_code.to_string(),
        year_month: year_month.to_string(),
        encrypted_meta: encrypted_meta.to_string(),
        original_base64: payload.to_string(),
        sequence_index,
        filename: filename::derive(year_month, subdivision_code, sequence_index, config),
        content_hash: content_hash(&image_bytes),
        image_bytes,
    })
}

/// Decode a base64 payload, restoring missing `=` padding first
pub fn decode_payload(payload: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let mut data: String = payload.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let pad = (4 - data.len() % 4) % 4;
    data.extend(std::iter::repeat('=').take(pad));
    LENIENT.decode(data.as_bytes())
}

/// Canonical base64 for image bytes that have no preserved text
pub fn encode_image(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

/// SHA-256 of image bytes as lowercase hex
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

const MD5_HEX_LEN: usize = 32;

/// Check a stored hash against image bytes
///
/// A 32-hex hash is an MD5 digest written by older exporters; anything else
/// is compared against [`content_hash`]. Case is ignored.
pub fn hash_matches(stored: &str, bytes: &[u8]) -> bool {
    let actual = if stored.len() == MD5_HEX_LEN {
        hex::encode(Md5::digest(bytes))
    } else {
        content_hash(bytes)
    };
    stored.eq_ignore_ascii_case(&actual)
}
