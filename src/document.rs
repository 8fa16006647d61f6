//! Line-oriented text documents
//!
//! A document is a header line followed by data lines of the form
//! `subdivision,year_month,encrypted_meta,base64_jpeg`. One terminator style
//! is chosen for the whole document: CRLF if it occurs anywhere, LF otherwise.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::config::CodecConfig;
use crate::error::CodecError;
use crate::record::{self, Record};

/// Document-wide line terminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineEnding {
    #[serde(rename = "CRLF")]
    CrLf,
    #[serde(rename = "LF")]
    Lf,
}

impl LineEnding {
    /// Pick the terminator for a decoded text
    pub fn detect(text: &str) -> Self {
        if text.contains("\r\n") {
            LineEnding::CrLf
        } else {
            LineEnding::Lf
        }
    }

    /// The terminator characters
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::CrLf => "\r\n",
            LineEnding::Lf => "\n",
        }
    }

    /// Literal stored in the archive marker entry
    pub fn marker(&self) -> &'static str {
        match self {
            LineEnding::CrLf => "CRLF",
            LineEnding::Lf => "LF",
        }
    }

    /// Map a marker entry back to a terminator; surrounding whitespace is ignored
    pub fn from_marker(marker: &str) -> Option<Self> {
        match marker.trim() {
            "CRLF" => Some(LineEnding::CrLf),
            "LF" => Some(LineEnding::Lf),
            _ => None,
        }
    }
}

/// Decode raw bytes as UTF-8, falling back to Latin-1 which accepts any byte
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// A document split into lines, before any record is interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    /// First line, `None` when the document has no usable first line
    pub header: Option<String>,
    /// Terminator detected in the raw text
    pub line_ending: LineEnding,
    /// Every line after the header, blank ones included
    pub lines: Vec<String>,
    /// Whether the text ended with the terminator
    pub final_newline: bool,
}

impl RawDocument {
    /// Split raw document bytes into header, terminator and data lines
    pub fn parse(bytes: &[u8]) -> Self {
        let text = decode_text(bytes);
        let line_ending = LineEnding::detect(&text);
        let terminator = line_ending.as_str();

        let final_newline = text.ends_with(terminator);
        let body = if final_newline {
            &text[..text.len() - terminator.len()]
        } else {
            text.as_str()
        };

        let mut lines = body.split(terminator);
        let header = match lines.next() {
            Some(first) if !first.is_empty() => first.to_string(),
            _ => {
                return Self {
                    header: None,
                    line_ending,
                    lines: Vec::new(),
                    final_newline: false,
                }
            }
        };

        Self {
            header: Some(header),
            line_ending,
            lines: lines.map(str::to_string).collect(),
            final_newline,
        }
    }

    /// Non-blank data lines paired with their 1-based position after the header
    ///
    /// Blank lines are skipped but still consume a position, so the index of
    /// a line never depends on how many blank lines precede it being dropped.
    pub fn data_lines(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| (i + 1, line.as_str()))
    }
}

/// A parsed document with its decoded records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub header: Option<String>,
    pub line_ending: LineEnding,
    pub records: Vec<Record>,
    pub final_newline: bool,
}

/// Result of reading a document: the records that decoded plus every rejection
#[derive(Debug)]
pub struct Extraction {
    pub document: Document,
    pub rejections: Vec<CodecError>,
}

impl Extraction {
    pub fn record_count(&self) -> usize {
        self.document.records.len()
    }

    pub fn error_count(&self) -> usize {
        self.rejections.len()
    }
}

impl Document {
    /// Parse document bytes and decode every data line
    ///
    /// Rejected lines are logged and collected; they never stop extraction.
    /// Sequence numbers past 999 widen the filename, so two lines can derive
    /// the same name; the later one is rejected.
    pub fn extract(bytes: &[u8], config: &CodecConfig) -> Extraction {
        let raw = RawDocument::parse(bytes);
        let mut records = Vec::new();
        let mut rejections = Vec::new();
        let mut taken = HashSet::new();

        for (index, line) in raw.data_lines() {
            let decoded = record::decode_line(line, index, config).and_then(|record| {
                if taken.insert(record.filename.clone()) {
                    Ok(record)
                } else {
                    Err(CodecError::DuplicateFilename {
                        line: index,
                        filename: record.filename,
                    })
                }
            });
            match decoded {
                Ok(record) => {
                    tracing::debug!(index, filename = %record.filename, "extracted record");
                    records.push(record);
                }
                Err(err) => {
                    tracing::warn!(index, "skipping line: {err}");
                    rejections.push(err);
                }
            }
        }

        Extraction {
            document: Document {
                header: raw.header,
                line_ending: raw.line_ending,
                records,
                final_newline: raw.final_newline,
            },
            rejections,
        }
    }

    /// Render the document back to text using each record's original base64
    pub fn render(&self) -> String {
        let mut lines: Vec<String> = Vec::with_capacity(self.records.len() + 1);
        lines.push(self.header.clone().unwrap_or_default());
        lines.extend(self.records.iter().map(|r| r.to_line(&r.original_base64)));

        let terminator = self.line_ending.as_str();
        let mut text = lines.join(terminator);
        if self.final_newline {
            text.push_str(terminator);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_crlf_anywhere() {
        assert_eq!(LineEnding::detect("a\nb\r\nc"), LineEnding::CrLf);
        assert_eq!(LineEnding::detect("a\nb\nc"), LineEnding::Lf);
        assert_eq!(LineEnding::detect(""), LineEnding::Lf);
    }

    #[test]
    fn test_marker_mapping() {
        assert_eq!(LineEnding::from_marker("CRLF"), Some(LineEnding::CrLf));
        assert_eq!(LineEnding::from_marker("LF\n"), Some(LineEnding::Lf));
        assert_eq!(LineEnding::from_marker("CR"), None);
        assert_eq!(LineEnding::CrLf.marker(), "CRLF");
    }

    #[test]
    fn test_parse_crlf_document() {
        let raw = RawDocument::parse(b"HEADER\r\na,b,c,d\r\n\r\ne,f,g,h");
        assert_eq!(raw.header.as_deref(), Some("HEADER"));
        assert_eq!(raw.line_ending, LineEnding::CrLf);
        assert_eq!(raw.lines, vec!["a,b,c,d", "", "e,f,g,h"]);
        assert!(!raw.final_newline);

        let data: Vec<_> = raw.data_lines().collect();
        assert_eq!(data, vec![(1, "a,b,c,d"), (3, "e,f,g,h")]);
    }

    #[test]
    fn test_parse_lf_document_with_final_newline() {
        let raw = RawDocument::parse(b"HEADER\nline\n");
        assert_eq!(raw.line_ending, LineEnding::Lf);
        assert_eq!(raw.lines, vec!["line"]);
        assert!(raw.final_newline);
    }

    #[test]
    fn test_parse_empty_document() {
        let raw = RawDocument::parse(b"");
        assert_eq!(raw.header, None);
        assert!(raw.lines.is_empty());
    }

    #[test]
    fn test_parse_empty_first_line() {
        let raw = RawDocument::parse(b"\nsomething");
        assert_eq!(raw.header, None);
        assert_eq!(raw.data_lines().count(), 0);
    }

    #[test]
    fn test_decode_text_latin1_fallback() {
        let text = decode_text(&[b'H', 0xE9, b'!']);
        assert_eq!(text, "H\u{e9}!");
    }

    #[test]
    fn test_extract_counts_rejections() {
        let doc = b"H\n12-21-26523,202512,ENC,/9j/4AAQ\nbroken line\nx,y,z,iVBORw0KGgo";
        let extraction = Document::extract(doc, &CodecConfig::default());
        assert_eq!(extraction.record_count(), 1);
        assert_eq!(extraction.error_count(), 2);
        assert_eq!(extraction.document.records[0].sequence_index, 1);
    }

    #[test]
    fn test_extract_rejects_filename_clash() {
        // line 234 with subdivision "11" and line 1234 with "1" both derive 202512112341E.jpg
        let mut lines = vec![String::new(); 1234];
        lines[233] = "11,202512,A,/9j/4AAQ".to_string();
        lines[1233] = "1,202512,B,/9j/4AAQ".to_string();
        let doc = format!("H\n{}", lines.join("\n"));

        let extraction = Document::extract(doc.as_bytes(), &CodecConfig::default());
        assert_eq!(extraction.record_count(), 1);
        assert_eq!(extraction.document.records[0].filename, "202512112341E.jpg");
        assert!(matches!(
            &extraction.rejections[..],
            [CodecError::DuplicateFilename { line: 1234, filename }] if filename == "202512112341E.jpg"
        ));
    }

    #[test]
    fn test_render_reproduces_source() {
        let source = "H\r\n12-21-26523,202512,ENC,/9j/4AAQ\r\n12-21-26523,202512,ENC2,/9j/4AAQ\r\n";
        let extraction = Document::extract(source.as_bytes(), &CodecConfig::default());
        assert_eq!(extraction.document.render(), source);
    }
}
