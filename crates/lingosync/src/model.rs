//! # Domain Model
//!
//! The types every layer shares: [`MultiString`] (source or target text with
//! optional plural variants), [`Unit`] (one translatable message), [`Header`]
//! (the PO-style `Key: Value` block), [`Fingerprint`] (the staleness signal of
//! a file) and [`ParseState`].
//!
//! ## Unit Identity
//!
//! A unit is identified by [`Unit::id`]: the explicit id when the format
//! carries one, otherwise the context and the first source string joined by
//! `\u{4}` (gettext's `msgctxt` separator), otherwise the first source string.
//! Positions are not identities; they shift when a header is inserted.
//!
//! ## Header Units
//!
//! A gettext header is an entry with an empty source. It occupies position 0
//! in the file but is never translatable: it gets no projection row and no
//! statistics.
//!
//! ## Canonical Text
//!
//! Hashes are computed over the canonical encoding of a [`MultiString`]: all
//! variants joined by [`PLURAL_SEPARATOR`]. Word and character counts are
//! taken from the first variant, the form a translator reads.

use serde::{Deserialize, Serialize};
use std::fs;
use std::time::SystemTime;
use unicode_segmentation::UnicodeSegmentation;

/// Separator placed between plural variants in the canonical encoding.
pub const PLURAL_SEPARATOR: char = '\u{0}';

/// Separator between context and source in a derived unit id.
pub const CONTEXT_SEPARATOR: char = '\u{4}';

/// Text with one or more plural variants. Never empty: a singular string is a
/// one-element list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct MultiString(Vec<String>);

impl MultiString {
    pub fn new(text: impl Into<String>) -> Self {
        Self(vec![text.into()])
    }

    pub fn plural<I, S>(variants: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from(variants.into_iter().map(Into::into).collect::<Vec<_>>())
    }

    pub fn empty() -> Self {
        Self(vec![String::new()])
    }

    pub fn first(&self) -> &str {
        &self.0[0]
    }

    pub fn variants(&self) -> &[String] {
        &self.0
    }

    pub fn is_plural(&self) -> bool {
        self.0.len() > 1
    }

    /// True when every variant is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|s| s.is_empty())
    }

    pub fn canonical(&self) -> String {
        let mut out = String::new();
        for (i, variant) in self.0.iter().enumerate() {
            if i > 0 {
                out.push(PLURAL_SEPARATOR);
            }
            out.push_str(variant);
        }
        out
    }

    pub fn content_hash(&self) -> String {
        blake3::hash(self.canonical().as_bytes()).to_hex().to_string()
    }

    pub fn word_count(&self) -> u64 {
        word_count(self.first())
    }

    pub fn char_count(&self) -> u64 {
        self.first().chars().count() as u64
    }
}

impl Default for MultiString {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Vec<String>> for MultiString {
    fn from(mut variants: Vec<String>) -> Self {
        if variants.is_empty() {
            variants.push(String::new());
        }
        Self(variants)
    }
}

impl From<MultiString> for Vec<String> {
    fn from(value: MultiString) -> Self {
        value.0
    }
}

impl From<&str> for MultiString {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for MultiString {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl std::fmt::Display for MultiString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.first())
    }
}

/// Counts words the way translators count them: Unicode word boundaries,
/// punctuation excluded.
pub fn word_count(text: &str) -> u64 {
    text.unicode_words().count() as u64
}

/// An alternative translation carried inside the file itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alternate {
    pub target: MultiString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

/// One translatable message.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Unit {
    pub source: MultiString,
    #[serde(default)]
    pub target: MultiString,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default, rename = "id", skip_serializing_if = "Option::is_none")]
    pub explicit_id: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub developer_comment: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub translator_comment: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub locations: Vec<String>,
    /// Flags other than `fuzzy` (e.g. `c-format`), in file order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<String>,
    #[serde(default)]
    pub fuzzy: bool,
    #[serde(default)]
    pub obsolete: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternates: Vec<Alternate>,
    /// Who proposed this entry; only meaningful in suggestion side files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl Unit {
    pub fn new(source: impl Into<MultiString>) -> Self {
        Self {
            source: source.into(),
            ..Default::default()
        }
    }

    pub fn with_target(mut self, target: impl Into<MultiString>) -> Self {
        self.target = target.into();
        self
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_locations<I, S>(mut self, locations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.locations = locations.into_iter().map(Into::into).collect();
        self
    }

    pub fn id(&self) -> String {
        if let Some(id) = &self.explicit_id {
            return id.clone();
        }
        match &self.context {
            Some(ctx) => format!("{}{}{}", ctx, CONTEXT_SEPARATOR, self.source.first()),
            None => self.source.first().to_string(),
        }
    }

    pub fn is_header(&self) -> bool {
        self.explicit_id.is_none() && self.context.is_none() && self.source.is_empty()
    }

    pub fn is_translatable(&self) -> bool {
        !self.is_header()
    }

    pub fn is_translated(&self) -> bool {
        !self.target.is_empty()
    }

    pub fn source_hash(&self) -> String {
        self.source.content_hash()
    }
}

/// Ordered `Key: Value` fields of a PO-style header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Header {
    fields: Vec<(String, String)>,
}

/// Canonical field order of a gettext header.
pub const HEADER_ORDER: &[&str] = &[
    "Project-Id-Version",
    "Report-Msgid-Bugs-To",
    "POT-Creation-Date",
    "PO-Revision-Date",
    "Last-Translator",
    "Language-Team",
    "Language",
    "MIME-Version",
    "Content-Type",
    "Content-Transfer-Encoding",
    "Plural-Forms",
    "X-Generator",
];

impl Header {
    pub fn parse(text: &str) -> Self {
        let fields = text
            .lines()
            .filter_map(|line| {
                let (key, value) = line.split_once(':')?;
                let key = key.trim();
                if key.is_empty() {
                    return None;
                }
                Some((key.to_string(), value.trim().to_string()))
            })
            .collect();
        Self { fields }
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for (key, value) in &self.fields {
            out.push_str(key);
            out.push_str(": ");
            out.push_str(value);
            out.push('\n');
        }
        out
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Sets `key`, keeping its position when present. New keys are placed
    /// according to [`HEADER_ORDER`], unknown keys go last.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let value = value.into();
        if let Some(entry) = self.fields.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value;
            return;
        }
        let rank = |k: &str| HEADER_ORDER.iter().position(|o| *o == k);
        let insert_at = match rank(key) {
            Some(wanted) => self
                .fields
                .iter()
                .position(|(k, _)| rank(k).map_or(true, |r| r > wanted))
                .unwrap_or(self.fields.len()),
            None => self.fields.len(),
        };
        self.fields.insert(insert_at, (key.to_string(), value));
    }

    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Units produced by a parse, in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParsedFile {
    pub units: Vec<Unit>,
}

impl ParsedFile {
    pub fn new(units: Vec<Unit>) -> Self {
        Self { units }
    }

    pub fn header(&self) -> Option<Header> {
        self.units
            .iter()
            .find(|u| u.is_header())
            .map(|u| Header::parse(u.target.first()))
    }
}

/// The staleness signal of a file: modification time plus size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub modified: SystemTime,
    pub size: u64,
}

impl Fingerprint {
    pub fn from_metadata(meta: &fs::Metadata) -> std::io::Result<Self> {
        Ok(Self {
            modified: meta.modified()?,
            size: meta.len(),
        })
    }

    /// Stable token for the modification time, used to gate index rebuilds.
    pub fn mtime_token(&self) -> String {
        let nanos = self
            .modified
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        blake3::hash(nanos.to_string().as_bytes())
            .to_hex()
            .to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParseState {
    #[default]
    Unparsed,
    Parsed,
    Checked,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multistring_never_empty() {
        let ms = MultiString::from(Vec::<String>::new());
        assert_eq!(ms.variants().len(), 1);
        assert!(ms.is_empty());
        assert_eq!(ms.first(), "");
    }

    #[test]
    fn test_plural_hash_differs_from_singular() {
        let singular = MultiString::new("fish");
        let plural = MultiString::plural(["fish", "fishes"]);
        assert!(plural.is_plural());
        assert_ne!(singular.content_hash(), plural.content_hash());
        assert_eq!(plural.canonical(), "fish\u{0}fishes");
    }

    #[test]
    fn test_word_count_ignores_punctuation() {
        assert_eq!(word_count("Hello, world!"), 2);
        assert_eq!(word_count("   "), 0);
        assert_eq!(MultiString::new("One fish").char_count(), 8);
    }

    #[test]
    fn test_unit_id_derivation() {
        let plain = Unit::new("Open");
        assert_eq!(plain.id(), "Open");

        let ctx = Unit::new("Open").with_context("menu");
        assert_eq!(ctx.id(), "menu\u{4}Open");

        let mut explicit = Unit::new("Open");
        explicit.explicit_id = Some("file.open".to_string());
        assert_eq!(explicit.id(), "file.open");
    }

    #[test]
    fn test_header_unit_is_not_translatable() {
        let header = Unit::new("").with_target("Language: sw\n");
        assert!(header.is_header());
        assert!(!header.is_translatable());

        let with_ctx = Unit::new("").with_context("x");
        assert!(!with_ctx.is_header());
    }

    #[test]
    fn test_header_set_respects_canonical_order() {
        let mut header = Header::parse("Project-Id-Version: demo\nContent-Type: text/plain\n");
        header.set("PO-Revision-Date", "2024-01-01");
        header.set("X-Custom", "1");
        header.set("Project-Id-Version", "demo 2");

        let keys: Vec<&str> = header.fields().iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(
            keys,
            vec!["Project-Id-Version", "PO-Revision-Date", "Content-Type", "X-Custom"]
        );
        assert_eq!(header.get("Project-Id-Version"), Some("demo 2"));
    }

    #[test]
    fn test_header_render_round_trip() {
        let text = "Language: sw\nMIME-Version: 1.0\n";
        assert_eq!(Header::parse(text).render(), text);
    }

    #[test]
    fn test_parse_state_ordering() {
        assert!(ParseState::Unparsed < ParseState::Parsed);
        assert!(ParseState::Parsed < ParseState::Checked);
    }
}
