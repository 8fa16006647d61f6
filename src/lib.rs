//! # picline
//!
//! Converts batches of embedded photographs between two representations:
//!
//! - a line-oriented text export, one record per line:
//!
//!   ```text
//!   File Name: 12-21-26523-01  Total Records: 2
//!   12-21-26523,202512,ENC1,/9j/4AAQSkZJRgABAQ...
//!   12-21-26523,202512,ENC2,/9j/4AAQSkZJRgABAQ...
//!   ```
//!
//! - a zip archive holding each JPEG as its own file plus a manifest that
//!   lets the text export be rebuilt byte for byte.
//!
//! ## Text to archive
//!
//! The first line is an opaque header. Every following non-blank line is
//! `subdivision,year_month,encrypted_meta,base64_jpeg`, split on the first
//! three commas only. Lines with too few fields, a payload that is not JPEG
//! base64 (`/9j/` prefix) or undecodable base64 are skipped and counted.
//! Each image is stored as `images/<YYYYMM><digits><seq:03>1E.jpg`.
//!
//! ## Archive to text
//!
//! With a manifest, records come back in their original order and each
//! line reuses its preserved base64 text unless the image content changed
//! since packing, in which case the image is re-encoded. Without a
//! manifest, image entries are sorted by name and their metadata is guessed
//! from the filename; this path is best effort and not byte-exact.
//!
//! ```rust,ignore
//! use picline::{archive_to_text, text_to_archive};
//!
//! let outcome = text_to_archive(&std::fs::read("export.txt")?)?;
//! let text = archive_to_text(&outcome.archive)?;
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod filename;
pub mod manifest;
pub mod packer;
pub mod record;
pub mod unpacker;

pub use config::CodecConfig;
pub use document::{Document, Extraction, LineEnding, RawDocument};
pub use error::{CodecError, Result};
pub use filename::NameMetadata;
pub use manifest::ManifestEntry;
pub use packer::{PackOutcome, Packer};
pub use record::Record;
pub use unpacker::{Base64Source, Branch, Payload, ReconstructedLine, Reconstruction, Unpacker};

/// Convert a text export into an archive using the default configuration
pub fn text_to_archive(document: &[u8]) -> Result<PackOutcome> {
    text_to_archive_with_config(document, &CodecConfig::default())
}

/// Convert a text export into an archive
pub fn text_to_archive_with_config(document: &[u8], config: &CodecConfig) -> Result<PackOutcome> {
    Packer::with_config(config.clone()).pack_text(document)
}

/// Rebuild a text export from an archive using the default configuration
pub fn archive_to_text(archive: &[u8]) -> Result<Vec<u8>> {
    archive_to_text_with_config(archive, &CodecConfig::default())
}

/// Rebuild a text export from an archive
pub fn archive_to_text_with_config(archive: &[u8], config: &CodecConfig) -> Result<Vec<u8>> {
    Unpacker::with_config(config.clone()).unpack(archive)
}
