//! Archive packer

use std::io::{Cursor, Seek, Write};

use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::config::CodecConfig;
use crate::document::Document;
use crate::error::{CodecError, Result};
use crate::manifest::{self, ManifestEntry, FINAL_NEWLINE_ENTRY, HEADER_ENTRY, LINE_ENDING_ENTRY, MANIFEST_ENTRY};

/// Result of converting a text document into an archive
#[derive(Debug)]
pub struct PackOutcome {
    /// Complete zip archive bytes
    pub archive: Vec<u8>,
    /// Number of records packed
    pub record_count: usize,
    /// Number of data lines rejected
    pub error_count: usize,
    /// Why each rejected line was skipped
    pub rejections: Vec<CodecError>,
}

/// Packs documents into self-describing zip archives
pub struct Packer {
    config: CodecConfig,
}

impl Packer {
    /// Create a packer with the default configuration
    pub fn new() -> Self {
        Self::with_config(CodecConfig::default())
    }

    /// Create a packer with an explicit configuration
    pub fn with_config(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Convert raw document bytes into an archive
    ///
    /// Fails with [`CodecError::NoImagesFound`] when no line decodes.
    pub fn pack_text(&self, bytes: &[u8]) -> Result<PackOutcome> {
        let extraction = Document::extract(bytes, &self.config);
        let record_count = extraction.record_count();
        let error_count = extraction.error_count();

        let archive = self.pack(&extraction.document)?;
        tracing::info!(records = record_count, errors = error_count, bytes = archive.len(), "packed archive");

        Ok(PackOutcome {
            archive,
            record_count,
            error_count,
            rejections: extraction.rejections,
        })
    }

    /// Pack a parsed document into in-memory archive bytes
    pub fn pack(&self, document: &Document) -> Result<Vec<u8>> {
        let cursor = self.pack_to_writer(document, Cursor::new(Vec::new()))?;
        Ok(cursor.into_inner())
    }

    /// Pack a parsed document into a seekable writer, returning the writer
    pub fn pack_to_writer<W: Write + Seek>(&self, document: &Document, writer: W) -> Result<W> {
        if document.records.is_empty() {
            return Err(CodecError::NoImagesFound);
        }

        let mut zip = ZipWriter::new(writer);
        let options: FileOptions<'_, ()> =
            FileOptions::default().compression_method(CompressionMethod::Deflated);

        let header = document.header.as_deref().unwrap_or_default();
        Self::write_entry(&mut zip, HEADER_ENTRY, header.as_bytes(), options)?;
        Self::write_entry(&mut zip, LINE_ENDING_ENTRY, document.line_ending.marker().as_bytes(), options)?;
        if document.final_newline {
            Self::write_entry(&mut zip, FINAL_NEWLINE_ENTRY, b"true", options)?;
        }

        let mut entries = Vec::with_capacity(document.records.len());
        for record in &document.records {
            let path = self.config.image_path(&record.filename);
            Self::write_entry(&mut zip, &path, &record.image_bytes, options)?;
            entries.push(ManifestEntry::from(record));
        }

        let manifest = manifest::to_json(&entries)?;
        Self::write_entry(&mut zip, MANIFEST_ENTRY, &manifest, options)?;

        zip.finish().map_err(CodecError::ArchiveWrite)
    }

    fn write_entry<W: Write + Seek>(
        zip: &mut ZipWriter<W>,
        name: &str,
        data: &[u8],
        options: FileOptions<'_, ()>,
    ) -> Result<()> {
        zip.start_file(name, options).map_err(CodecError::ArchiveWrite)?;
        zip.write_all(data)?;
        Ok(())
    }
}

impl Default for Packer {
    fn default() -> Self {
        Self::new()
    }
}
