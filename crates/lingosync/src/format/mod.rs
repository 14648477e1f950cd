//! # Translation Formats
//!
//! A [`TranslationFormat`] turns file bytes into units and back. The engine
//! never looks at bytes itself: a [`crate::file::FileHandle`] holds a boxed
//! format chosen by [`format_for_path`] and delegates to it.
//!
//! Two formats ship with the crate:
//!
//! - [`po::PoFormat`]: gettext PO/POT, with a header entry and no alternates.
//! - [`json::JsonFormat`]: a JSON document with explicit ids and embedded
//!   alternates, so suggestions live inside the primary file.
//!
//! ## Contract
//!
//! - `parse` fails with [`FormatError`] on malformed input and never panics.
//! - `serialize` is deterministic: the same units always yield the same bytes,
//!   and `parse(serialize(units))` yields the same units.

use crate::model::{ParsedFile, Unit};
use std::path::Path;
use thiserror::Error;

pub mod json;
pub mod po;

pub use json::JsonFormat;
pub use po::PoFormat;

#[derive(Error, Debug)]
pub enum FormatError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("file is not valid UTF-8")]
    Encoding(#[from] std::str::Utf8Error),

    #[error("invalid JSON document: {0}")]
    Json(#[from] serde_json::Error),
}

impl FormatError {
    pub(crate) fn syntax(line: usize, message: impl Into<String>) -> Self {
        FormatError::Syntax {
            line,
            message: message.into(),
        }
    }
}

/// Capability to read and write one file format.
pub trait TranslationFormat: Send + Sync {
    fn name(&self) -> &'static str;

    fn parse(&self, bytes: &[u8]) -> Result<ParsedFile, FormatError>;

    fn serialize(&self, units: &[Unit]) -> Result<Vec<u8>, FormatError>;

    /// Whether suggestions can be stored as alternates inside the file.
    fn supports_alternates(&self) -> bool {
        false
    }

    /// Whether the format carries a `Key: Value` header entry.
    fn supports_header(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for dyn TranslationFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TranslationFormat({})", self.name())
    }
}

/// Picks a format from the file extension, after stripping any of
/// `ignore_suffixes` (so `de.po.pending` is read as PO).
pub fn format_for_path(path: &Path, ignore_suffixes: &[&str]) -> Option<Box<dyn TranslationFormat>> {
    let mut name = path.file_name()?.to_str()?;
    for suffix in ignore_suffixes {
        if let Some(stripped) = name.strip_suffix(suffix) {
            name = stripped;
            break;
        }
    }
    let ext = Path::new(name).extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "po" | "pot" => Some(Box::new(PoFormat)),
        "json" => Some(Box::new(JsonFormat)),
        _ => None,
    }
}

/// Guesses a format from content, for files whose extension says nothing.
pub fn sniff(bytes: &[u8]) -> Option<Box<dyn TranslationFormat>> {
    let text = std::str::from_utf8(bytes).ok()?;
    let trimmed = text.trim_start();
    if trimmed.starts_with('{') {
        return Some(Box::new(JsonFormat));
    }
    if trimmed.is_empty()
        || trimmed
            .lines()
            .any(|l| l.starts_with("msgid ") || l.starts_with("#~ msgid "))
    {
        return Some(Box::new(PoFormat));
    }
    None
}

/// Extension lookup first, then content sniffing.
pub fn detect(
    path: &Path,
    bytes: &[u8],
    ignore_suffixes: &[&str],
) -> Option<Box<dyn TranslationFormat>> {
    format_for_path(path, ignore_suffixes).or_else(|| sniff(bytes))
}

/// True when `path` looks like a primary translation file this crate can read.
pub fn is_translation_file(path: &Path, ignore_suffixes: &[&str]) -> bool {
    let is_side_file = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(|n| ignore_suffixes.iter().any(|s| n.ends_with(s)))
        .unwrap_or(false);
    !is_side_file && format_for_path(path, &[]).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_for_path_by_extension() {
        assert_eq!(format_for_path(Path::new("de/app.po"), &[]).unwrap().name(), "po");
        assert_eq!(format_for_path(Path::new("templates/app.POT"), &[]).unwrap().name(), "po");
        assert_eq!(format_for_path(Path::new("app.json"), &[]).unwrap().name(), "json");
        assert!(format_for_path(Path::new("README.md"), &[]).is_none());
    }

    #[test]
    fn test_format_for_path_strips_side_suffix() {
        let format = format_for_path(Path::new("de/app.po.pending"), &[".pending", ".tm"]);
        assert_eq!(format.unwrap().name(), "po");
        assert!(format_for_path(Path::new("de/app.po.pending"), &[]).is_none());
    }

    #[test]
    fn test_sniff_fallback() {
        assert_eq!(sniff(b"  {\"units\": []}").unwrap().name(), "json");
        assert_eq!(sniff(b"# comment\nmsgid \"a\"\nmsgstr \"\"\n").unwrap().name(), "po");
        assert!(sniff(b"plain text").is_none());
        assert_eq!(detect(Path::new("messages"), b"{}", &[]).unwrap().name(), "json");
    }

    #[test]
    fn test_side_files_are_not_translation_files() {
        let suffixes = [".pending", ".tm"];
        assert!(is_translation_file(Path::new("app.po"), &suffixes));
        assert!(!is_translation_file(Path::new("app.po.pending"), &suffixes));
        assert!(!is_translation_file(Path::new("app.po.tm"), &suffixes));
        assert!(!is_translation_file(Path::new("notes.txt"), &suffixes));
    }
}
