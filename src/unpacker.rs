//! Archive unpacker and text reconstruction
//!
//! An archive carrying both `header.txt` and `metadata.json` is rebuilt from
//! its manifest, in manifest order, reusing the preserved base64 text of
//! every image whose content hash still matches. Any other archive is rebuilt
//! from its image entries alone: names are sorted lexicographically and
//! metadata is recovered from each filename where possible. That second path
//! is lossy and does not reproduce the original document.

use std::collections::HashSet;
use std::io::{Cursor, Read, Seek};

use zip::ZipArchive;

use crate::config::CodecConfig;
use crate::document::{decode_text, LineEnding};
use crate::error::{CodecError, Result};
use crate::filename;
use crate::manifest::{self, ManifestEntry, FINAL_NEWLINE_ENTRY, HEADER_ENTRY, LINE_ENDING_ENTRY, MANIFEST_ENTRY};
use crate::record::{self, format_line};

/// Which reconstruction path an archive took
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    /// Rebuilt from the manifest; exact when no image changed
    Manifest,
    /// Rebuilt from image filenames only
    Filenames,
}

/// Where the base64 field of a reconstructed line came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Base64Source {
    /// Preserved text from the manifest, image unchanged
    Reused,
    /// Freshly encoded from the image bytes in the archive
    ReEncoded,
}

/// The base64 field chosen for one line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Reused(String),
    ReEncoded(String),
}

impl Payload {
    /// Compare the stored hash against the image and pick the base64 text
    ///
    /// The preserved text is reused only when the manifest carries both a
    /// hash and the original text and the hash matches `image_bytes`.
    pub fn resolve(entry: &ManifestEntry, image_bytes: &[u8]) -> Self {
        match (&entry.original_base64, &entry.content_hash) {
            (Some(original), Some(stored)) if record::hash_matches(stored, image_bytes) => {
                Payload::Reused(original.clone())
            }
            _ => Payload::ReEncoded(record::encode_image(image_bytes)),
        }
    }

    pub fn source(&self) -> Base64Source {
        match self {
            Payload::Reused(_) => Base64Source::Reused,
            Payload::ReEncoded(_) => Base64Source::ReEncoded,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Payload::Reused(text) | Payload::ReEncoded(text) => text,
        }
    }
}

/// One emitted data line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconstructedLine {
    /// Archive entry the image was read from
    pub entry: String,
    pub source: Base64Source,
}

/// A rebuilt document together with how each line was produced
#[derive(Debug, Clone)]
pub struct Reconstruction {
    pub text: String,
    pub branch: Branch,
    pub lines: Vec<ReconstructedLine>,
    /// Manifest filenames whose image entry was missing or unusable
    pub skipped: Vec<String>,
}

impl Reconstruction {
    pub fn into_bytes(self) -> Vec<u8> {
        self.text.into_bytes()
    }

    /// Number of lines whose base64 had to be re-encoded
    pub fn re_encoded(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.source == Base64Source::ReEncoded)
            .count()
    }
}

/// Rebuilds text documents from archives
pub struct Unpacker {
    config: CodecConfig,
}

impl Unpacker {
    /// Create an unpacker with the default configuration
    pub fn new() -> Self {
        Self::with_config(CodecConfig::default())
    }

    /// Create an unpacker with an explicit configuration
    pub fn with_config(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Convert archive bytes into document bytes
    pub fn unpack(&self, bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(self.reconstruct(bytes)?.into_bytes())
    }

    /// Rebuild the document held in archive bytes
    pub fn reconstruct(&self, bytes: &[u8]) -> Result<Reconstruction> {
        self.reconstruct_from_reader(Cursor::new(bytes))
    }

    /// Rebuild the document held in a seekable archive stream
    pub fn reconstruct_from_reader<R: Read + Seek>(&self, reader: R) -> Result<Reconstruction> {
        let mut zip = ZipArchive::new(reader).map_err(|e| CodecError::InvalidArchive(e.to_string()))?;
        let names: HashSet<String> = zip.file_names().map(str::to_string).collect();

        let reconstruction = if names.contains(HEADER_ENTRY) && names.contains(MANIFEST_ENTRY) {
            self.from_manifest(&mut zip, &names)?
        } else {
            self.from_filenames(&mut zip, &names)?
        };

        tracing::info!(
            branch = ?reconstruction.branch,
            lines = reconstruction.lines.len(),
            re_encoded = reconstruction.re_encoded(),
            skipped = reconstruction.skipped.len(),
            "reconstructed document"
        );
        Ok(reconstruction)
    }

    fn from_manifest<R: Read + Seek>(&self, zip: &mut ZipArchive<R>, names: &HashSet<String>) -> Result<Reconstruction> {
        let header = decode_text(&read_entry(zip, HEADER_ENTRY)?);
        let entries = manifest::from_json(&read_entry(zip, MANIFEST_ENTRY)?)?;

        let line_ending = if names.contains(LINE_ENDING_ENTRY) {
            let marker = decode_text(&read_entry(zip, LINE_ENDING_ENTRY)?);
            LineEnding::from_marker(&marker).unwrap_or(LineEnding::Lf)
        } else {
            self.config.fallback_line_ending
        };
        let final_newline = names.contains(FINAL_NEWLINE_ENTRY);

        let mut text_lines = vec![header];
        let mut lines = Vec::with_capacity(entries.len());
        let mut skipped = Vec::new();

        for entry in &entries {
            let Some(path) = self.locate(entry, names) else {
                tracing::warn!(filename = %entry.filename, "image missing from archive, skipping entry");
                skipped.push(entry.filename.clone());
                continue;
            };

            let image_bytes = read_entry(zip, &path)?;
            let payload = Payload::resolve(entry, &image_bytes);
            if payload.source() == Base64Source::ReEncoded {
                tracing::debug!(entry = %path, "image changed since packing, re-encoding");
            }

            text_lines.push(format_line(
                &entry.subdivision_code,
                &entry.year_month,
                &entry.encrypted_meta,
                payload.as_str(),
            ));
            lines.push(ReconstructedLine {
                entry: path,
                source: payload.source(),
            });
        }

        if lines.is_empty() {
            tracing::warn!(skipped = skipped.len(), "no manifest entry has an image in the archive");
            return Err(CodecError::NoImagesFound);
        }

        Ok(Reconstruction {
            text: join_lines(&text_lines, line_ending, final_newline),
            branch: Branch::Manifest,
            lines,
            skipped,
        })
    }

    /// Find the image entry of a manifest record; the first existing candidate wins
    fn locate(&self, entry: &ManifestEntry, names: &HashSet<String>) -> Option<String> {
        let safe = filename::safe_name(&entry.filename);
        if safe.is_empty() {
            return None;
        }

        let candidates = [
            self.config.image_path(&safe),
            safe,
            self.config.image_path(&entry.filename),
            entry.filename.clone(),
        ];
        candidates.into_iter().find(|path| names.contains(path))
    }

    fn from_filenames<R: Read + Seek>(&self, zip: &mut ZipArchive<R>, names: &HashSet<String>) -> Result<Reconstruction> {
        let mut images: Vec<&String> = names.iter().filter(|n| self.config.is_image_name(n)).collect();
        if images.is_empty() {
            return Err(CodecError::NoImagesFound);
        }
        images.sort();

        let mut text_lines = vec![self.config.fallback_header.clone()];
        let mut lines = Vec::with_capacity(images.len());

        for (position, name) in images.into_iter().enumerate() {
            let meta = filename::invert(filename::base_name(name), &self.config)
                .unwrap_or_else(|| filename::synthesize(position + 1, &self.config));
            let image_bytes = read_entry(zip, name)?;

            text_lines.push(format_line(
                &meta.subdivision_code,
                &meta.year_month,
                &meta.encrypted_meta,
                &record::encode_image(&image_bytes),
            ));
            lines.push(ReconstructedLine {
                entry: name.clone(),
                source: Base64Source::ReEncoded,
            });
        }

        Ok(Reconstruction {
            text: join_lines(&text_lines, self.config.fallback_line_ending, false),
            branch: Branch::Filenames,
            lines,
            skipped: Vec::new(),
        })
    }
}

impl Default for Unpacker {
    fn default() -> Self {
        Self::new()
    }
}

fn join_lines(lines: &[String], line_ending: LineEnding, final_newline: bool) -> String {
    let mut text = lines.join(line_ending.as_str());
    if final_newline {
        text.push_str(line_ending.as_str());
    }
    text
}

fn read_entry<R: Read + Seek>(zip: &mut ZipArchive<R>, name: &str) -> Result<Vec<u8>> {
    let mut file = zip
        .by_name(name)
        .map_err(|e| CodecError::InvalidArchive(format!("{name}: {e}")))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)
        .map_err(|e| CodecError::InvalidArchive(format!("{name}: {e}")))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;
    use zip::ZipWriter;

    fn build_zip(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options: FileOptions<'_, ()> = FileOptions::default();
        for (name, data) in entries {
            zip.start_file(*name, options).unwrap();
            zip.write_all(data).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }

    fn entry(filename: &str, base64: &str, hash: &str) -> ManifestEntry {
        ManifestEntry {
            index: 1,
            filename: filename.into(),
            content_hash: Some(hash.into()),
            subdivision_code: "12-21-26523".into(),
            year_month: "202512".into(),
            encrypted_meta: "ENC1".into(),
            original_base64: Some(base64.into()),
        }
    }

    const JPEG: &[u8] = &[0xFF, 0xD8, 0xFF, 0xE0];

    #[test]
    fn test_payload_reused_on_hash_match() {
        let e = entry("a.jpg", "/9j/4A", &record::content_hash(JPEG));
        assert_eq!(Payload::resolve(&e, JPEG), Payload::Reused("/9j/4A".into()));
    }

    #[test]
    fn test_payload_re_encoded_on_hash_mismatch() {
        let e = entry("a.jpg", "/9j/4A", "0000");
        assert_eq!(Payload::resolve(&e, JPEG), Payload::ReEncoded("/9j/4A==".into()));
    }

    #[test]
    fn test_payload_reused_with_md5_manifest_hash() {
        // MD5 of FF D8 FF E0, as written by older exporters
        let md5 = hex::encode(<md5::Md5 as sha2::Digest>::digest(JPEG));
        let e = entry("a.jpg", "/9j/4A", &md5);
        assert_eq!(Payload::resolve(&e, JPEG), Payload::Reused("/9j/4A".into()));
    }

    #[test]
    fn test_md5_manifest_keeps_unpadded_base64() {
        let md5 = hex::encode(<md5::Md5 as sha2::Digest>::digest(JPEG));
        let mut e = entry("2025121221265230011E.jpg", "/9j/4A", &md5);
        e.subdivision_code = "1-2".into();
        e.encrypted_meta = "E".into();
        let manifest = manifest::to_json(&[e]).unwrap();
        let archive = build_zip(&[
            ("header.txt", b"H"),
            ("line_ending.txt", b"LF"),
            ("metadata.json", &manifest),
            ("images/2025121221265230011E.jpg", JPEG),
        ]);

        let text = Unpacker::new().unpack(&archive).unwrap();
        assert_eq!(text, b"H\n1-2,202512,E,/9j/4A");
    }

    #[test]
    fn test_payload_re_encoded_without_original() {
        let mut e = entry("a.jpg", "/9j/4A", &record::content_hash(JPEG));
        e.original_base64 = None;
        assert_eq!(Payload::resolve(&e, JPEG).source(), Base64Source::ReEncoded);
    }

    #[test]
    fn test_manifest_branch_bare_filename_and_default_crlf() {
        let manifest = manifest::to_json(&[entry("a.jpg", "/9j/4A", &record::content_hash(JPEG))]).unwrap();
        let archive = build_zip(&[("header.txt", b"HDR"), ("metadata.json", &manifest), ("a.jpg", JPEG)]);

        let rec = Unpacker::new().reconstruct(&archive).unwrap();
        assert_eq!(rec.branch, Branch::Manifest);
        assert_eq!(rec.text, "HDR\r\n12-21-26523,202512,ENC1,/9j/4A");
        assert_eq!(rec.lines[0].entry, "a.jpg");
        assert_eq!(rec.lines[0].source, Base64Source::Reused);
    }

    #[test]
    fn test_manifest_branch_skips_missing_image() {
        let hash = record::content_hash(JPEG);
        let manifest = manifest::to_json(&[entry("gone.jpg", "/9j/4A", &hash), entry("b.jpg", "/9j/4A", &hash)]).unwrap();
        let archive = build_zip(&[
            ("header.txt", b"HDR"),
            ("line_ending.txt", b"LF"),
            ("metadata.json", &manifest),
            ("images/b.jpg", JPEG),
        ]);

        let rec = Unpacker::new().reconstruct(&archive).unwrap();
        assert_eq!(rec.skipped, vec!["gone.jpg"]);
        assert_eq!(rec.lines.len(), 1);
        assert_eq!(rec.text, "HDR\n12-21-26523,202512,ENC1,/9j/4A");
    }

    #[test]
    fn test_manifest_branch_skips_unsafe_name() {
        let hash = record::content_hash(JPEG);
        let manifest = manifest::to_json(&[entry("..", "/9j/4A", "x"), entry("b.jpg", "/9j/4A", &hash)]).unwrap();
        let archive = build_zip(&[("header.txt", b"HDR"), ("metadata.json", &manifest), ("images/b.jpg", JPEG)]);

        let rec = Unpacker::new().reconstruct(&archive).unwrap();
        assert_eq!(rec.text, "HDR\r\n12-21-26523,202512,ENC1,/9j/4A");
        assert_eq!(rec.skipped, vec![".."]);
    }

    #[test]
    fn test_manifest_without_any_image_is_no_images_found() {
        let manifest = manifest::to_json(&[entry("a.jpg", "/9j/4A", "x")]).unwrap();
        let archive = build_zip(&[
            ("header.txt", b"HDR"),
            ("line_ending.txt", b"LF"),
            ("metadata.json", &manifest),
        ]);

        assert!(matches!(Unpacker::new().unpack(&archive), Err(CodecError::NoImagesFound)));
    }

    #[test]
    fn test_empty_manifest_is_no_images_found() {
        let archive = build_zip(&[("header.txt", b"HDR"), ("metadata.json", b"[]")]);
        assert!(matches!(Unpacker::new().reconstruct(&archive), Err(CodecError::NoImagesFound)));
    }

    #[test]
    fn test_filename_branch_sorted_and_synthesized() {
        let archive = build_zip(&[
            ("images/zzz.jpg", JPEG),
            ("images/2025121221265230011E.jpg", JPEG),
            ("notes.txt", b"ignored"),
        ]);

        let rec = Unpacker::new().reconstruct(&archive).unwrap();
        assert_eq!(rec.branch, Branch::Filenames);
        assert_eq!(
            rec.text,
            "Converted File\r\n\
12-21-265230,202512,ENCODED,/9j/4A==\r\n\
00-00-000002,202501,ENCODED,/9j/4A=="
        );
    }

    #[test]
    fn test_filename_branch_when_only_manifest_missing_header() {
        let manifest = manifest::to_json(&[entry("a.jpg", "/9j/4A", "x")]).unwrap();
        let archive = build_zip(&[("metadata.json", &manifest), ("images/foo.jpg", JPEG)]);

        let rec = Unpacker::new().reconstruct(&archive).unwrap();
        assert_eq!(rec.branch, Branch::Filenames);
        assert_eq!(rec.text, "Converted File\r\n00-00-000001,202501,ENCODED,/9j/4A==");
    }

    #[test]
    fn test_no_images_found() {
        let archive = build_zip(&[("readme.txt", b"nothing here")]);
        assert!(matches!(Unpacker::new().reconstruct(&archive), Err(CodecError::NoImagesFound)));
    }

    #[test]
    fn test_invalid_archive() {
        let result = Unpacker::new().unpack(b"this is not a zip file");
        assert!(matches!(result, Err(CodecError::InvalidArchive(_))));
    }

    #[test]
    fn test_corrupt_manifest() {
        let archive = build_zip(&[("header.txt", b"HDR"), ("metadata.json", b"{not json")]);
        assert!(matches!(Unpacker::new().reconstruct(&archive), Err(CodecError::Manifest(_))));
    }
}
