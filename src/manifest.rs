//! Archive manifest
//!
//! Archive layout:
//!
//! ```text
//! header.txt          raw header line
//! line_ending.txt     "CRLF" or "LF"
//! final_newline.txt   present only when the document ended with a terminator
//! images/<filename>   one decoded JPEG per record
//! metadata.json       ordered array of manifest entries
//! ```

use serde::{Deserialize, Serialize};

use crate::record::Record;

pub const HEADER_ENTRY: &str = "header.txt";
pub const LINE_ENDING_ENTRY: &str = "line_ending.txt";
pub const FINAL_NEWLINE_ENTRY: &str = "final_newline.txt";
pub const MANIFEST_ENTRY: &str = "metadata.json";

/// Everything about a record except its image bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    /// Sequence index of the source line
    #[serde(default)]
    pub index: usize,
    pub filename: String,
    /// Content hash of the image at packing time
    #[serde(rename = "image_hash", default, skip_serializing_if = "Option::is_none")]
    pub content_hash: Option<String>,
    #[serde(rename = "record_subdiv")]
    pub subdivision_code: String,
    pub year_month: String,
    pub encrypted_meta: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_base64: Option<String>,
}

impl From<&Record> for ManifestEntry {
    fn from(record: &Record) -> Self {
        Self {
            index: record.sequence_index,
            filename: record.filename.clone(),
            content_hash: Some(record.content_hash.clone()),
            subdivision_code: record.subdivision_code.clone(),
            year_month: record.year_month.clone(),
            encrypted_meta: record.encrypted_meta.clone(),
            original_base64: Some(record.original_base64.clone()),
        }
    }
}

/// Serialize the manifest as indented JSON
pub fn to_json(entries: &[ManifestEntry]) -> serde_json::Result<Vec<u8>> {
    serde_json::to_vec_pretty(entries)
}

/// Parse a manifest, keeping entry order
pub fn from_json(bytes: &[u8]) -> serde_json::Result<Vec<ManifestEntry>> {
    serde_json::from_slice(bytes)
}
