//! Filename scheme
//!
//! Images are named `YYYYMM` + subdivision digits + 3-digit sequence + meter
//! digit + direction letter + `.jpg`, for example `2025121221265230011E.jpg`.
//! The inverse is best effort only: it is used for archives that never
//! carried a manifest and cannot recover what the forward direction dropped.

use std::path::Path;

use crate::config::CodecConfig;

/// Shortest base name (without extension) the inverse accepts
pub const MIN_INVERTIBLE_LEN: usize = 20;

const YEAR_MONTH_LEN: usize = 6;
const SUBDIVISION_BLOCK_LEN: usize = 10;
const SUBDIVISION_SHORT_BLOCK_LEN: usize = 6;

/// Metadata recovered (or synthesized) from an image filename
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NameMetadata {
    pub subdivision_code: String,
    pub year_month: String,
    pub encrypted_meta: String,
}

/// Derive the archive filename of a record
pub fn derive(year_month: &str, subdivision_code: &str, sequence_index: usize, config: &CodecConfig) -> String {
    let digits: String = subdivision_code.chars().filter(|c| c.is_ascii_digit()).collect();
    format!(
        "{year_month}{digits}{sequence_index:03}{}{}.jpg",
        config.meter, config.direction
    )
}

/// Recover approximate metadata from a filename
///
/// Returns `None` when the base name is shorter than [`MIN_INVERTIBLE_LEN`].
/// The subdivision block is re-dashed as `XX-XX-XX` followed by any
/// remaining digits, which does not restore the original grouping.
pub fn invert(name: &str, config: &CodecConfig) -> Option<NameMetadata> {
    let stem: Vec<char> = Path::new(base_name(name))
        .file_stem()?
        .to_str()?
        .chars()
        .collect();
    if stem.len() < MIN_INVERTIBLE_LEN {
        return None;
    }

    let year_month: String = stem[..YEAR_MONTH_LEN].iter().collect();
    let remaining = &stem[YEAR_MONTH_LEN..];
    let block_len = if remaining.len() >= SUBDIVISION_BLOCK_LEN {
        SUBDIVISION_BLOCK_LEN
    } else {
        SUBDIVISION_SHORT_BLOCK_LEN.min(remaining.len())
    };
    let block = &remaining[..block_len];

    let subdivision_code = if block.len() >= SUBDIVISION_SHORT_BLOCK_LEN {
        let part = |range: std::ops::Range<usize>| block[range].iter().collect::<String>();
        let mut code = format!("{}-{}-{}", part(0..2), part(2..4), part(4..6));
        code.push_str(&part(6..block.len()));
        code
    } else {
        block.iter().collect()
    };

    Some(NameMetadata {
        subdivision_code,
        year_month,
        encrypted_meta: config.placeholder_meta.clone(),
    })
}

/// Placeholder metadata for the image at 1-based `position`
pub fn synthesize(position: usize, config: &CodecConfig) -> NameMetadata {
    NameMetadata {
        subdivision_code: format!("00-00-00{position:04}"),
        year_month: config.placeholder_year_month.clone(),
        encrypted_meta: config.placeholder_meta.clone(),
    }
}

/// Last path component of an archive entry name
pub fn base_name(name: &str) -> &str {
    name.rsplit(['/', '\\']).next().unwrap_or(name)
}

/// Reduce a name to a single safe path component
///
/// Path separators become word breaks, whitespace runs become `_`, anything
/// outside `[A-Za-z0-9_.-]` is dropped and leading/trailing `.`/`_` trimmed.
/// The result may be empty.
pub fn safe_name(name: &str) -> String {
    let spaced: String = name
        .chars()
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let kept: String = joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect();
    kept.trim_matches(|c| c == '.' || c == '_').to_string()
}
