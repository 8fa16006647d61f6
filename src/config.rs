//! Codec configuration

use serde::Deserialize;

use crate::document::LineEnding;

/// Settings shared by the packer and the reconstructor.
///
/// Nothing here is process-wide: every conversion receives the config it
/// should use, so two conversions with different settings can run side by
/// side.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CodecConfig {
    /// Meter digit appended to every derived filename
    pub meter: String,
    /// Flow direction letter appended after the meter digit
    pub direction: String,
    /// Directory inside the archive holding the extracted images
    pub image_dir: String,
    /// Header emitted when an archive carries no preserved header
    pub fallback_header: String,
    /// Terminator used when an archive does not record one
    pub fallback_line_ending: LineEnding,
    /// Year-month used for images whose filename cannot be inverted
    pub placeholder_year_month: String,
    /// Metadata marker used for every record rebuilt without a manifest
    pub placeholder_meta: String,
    /// Lower-case extensions (with leading dot) recognized as images
    pub image_extensions: Vec<String>,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            meter: "1".to_string(),
            direction: "E".to_string(),
            image_dir: "images".to_string(),
            fallback_header: "Converted File".to_string(),
            fallback_line_ending: LineEnding::CrLf,
            placeholder_year_month: "202501".to_string(),
            placeholder_meta: "ENCODED".to_string(),
            image_extensions: vec![".jpg".to_string(), ".jpeg".to_string(), ".png".to_string()],
        }
    }
}

impl CodecConfig {
    /// Load a config from JSON; missing keys keep their defaults
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Archive path of an image entry
    pub fn image_path(&self, filename: &str) -> String {
        if self.image_dir.is_empty() {
            filename.to_string()
        } else {
            format!("{}/{}", self.image_dir.trim_end_matches('/'), filename)
        }
    }

    /// Whether an archive entry name carries a recognized image extension
    pub fn is_image_name(&self, name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        self.image_extensions
            .iter()
            .any(|ext| lower.ends_with(&ext.to_ascii_lowercase()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_image_path() {
        let config = CodecConfig::default();
        assert_eq!(config.image_path("a.jpg"), "images/a.jpg");
    }

    #[test]
    fn test_image_path_without_dir() {
        let config = CodecConfig {
            image_dir: String::new(),
            ..CodecConfig::default()
        };
        assert_eq!(config.image_path("a.jpg"), "a.jpg");
    }

    #[test]
    fn test_is_image_name_case_insensitive() {
        let config = CodecConfig::default();
        assert!(config.is_image_name("images/PHOTO.JPG"));
        assert!(config.is_image_name("x.jpeg"));
        assert!(config.is_image_name("x.png"));
        assert!(!config.is_image_name("metadata.json"));
        assert!(!config.is_image_name("header.txt"));
    }

    #[test]
    fn test_from_json_partial() {
        let config = CodecConfig::from_json(r#"{"meter": "2", "fallback_line_ending": "LF"}"#).unwrap();
        assert_eq!(config.meter, "2");
        assert_eq!(config.direction, "E");
        assert_eq!(config.fallback_line_ending, LineEnding::Lf);
    }
}
