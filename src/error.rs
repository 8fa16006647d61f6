//! Error types for the codec.

/// Errors raised while converting between documents and archives.
///
/// The first four variants describe a single rejected data line. They are
/// collected and counted by the caller and never abort a conversion. The
/// remaining variants are fatal for the call that raised them.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// The line has fewer than four comma-separated fields.
    #[error("line {line}: malformed record (expected 4 comma-separated fields)")]
    MalformedRecord { line: usize },

    /// The image field does not start with the JPEG base64 signature.
    #[error("line {line}: not an image payload (missing JPEG base64 signature)")]
    UnsupportedPayload { line: usize },

    /// The image field is not decodable base64 even after padding.
    #[error("line {line}: invalid encoding: {source}")]
    DecodeFailure {
        line: usize,
        #[source]
        source: base64::DecodeError,
    },

    /// The derived filename was already taken by an earlier line.
    #[error("line {line}: derived filename {filename} clashes with an earlier record")]
    DuplicateFilename { line: usize, filename: String },

    /// Nothing in the input could be turned into an image.
    #[error("no images found")]
    NoImagesFound,

    /// The input is not a readable zip container.
    #[error("invalid or corrupted archive: {0}")]
    InvalidArchive(String),

    /// The manifest could not be serialized or parsed.
    #[error("manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    /// Writing the output archive failed.
    #[error("failed to write archive: {0}")]
    ArchiveWrite(#[source] zip::result::ZipError),

    /// Reading from or writing to a byte stream failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CodecError {
    /// Whether the error only concerns a single data line
    pub fn is_record_level(&self) -> bool {
        matches!(
            self,
            CodecError::MalformedRecord { .. }
                | CodecError::UnsupportedPayload { .. }
                | CodecError::DecodeFailure { .. }
                | CodecError::DuplicateFilename { .. }
        )
    }
}

/// Convenience alias for codec results.
pub type Result<T> = std::result::Result<T, CodecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_level_classification() {
        assert!(CodecError::MalformedRecord { line: 2 }.is_record_level());
        assert!(CodecError::UnsupportedPayload { line: 2 }.is_record_level());
        assert!(CodecError::DuplicateFilename { line: 2, filename: "a.jpg".into() }.is_record_level());
        assert!(!CodecError::NoImagesFound.is_record_level());
        assert!(!CodecError::InvalidArchive("bad".into()).is_record_level());
    }

    #[test]
    fn test_messages_are_readable() {
        assert_eq!(CodecError::NoImagesFound.to_string(), "no images found");
        assert!(CodecError::MalformedRecord { line: 4 }
            .to_string()
            .contains("malformed record"));
        assert!(CodecError::UnsupportedPayload { line: 4 }
            .to_string()
            .contains("not an image payload"));
    }
}
