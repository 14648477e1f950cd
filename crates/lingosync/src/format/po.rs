//! gettext PO reader and writer.
//!
//! Recognized lines:
//!
//! | Prefix | Meaning |
//! |--------|---------|
//! | `# ` | translator comment |
//! | `#.` | developer comment (`#. suggested by NAME` sets the unit origin) |
//! | `#:` | source locations, whitespace separated |
//! | `#,` | flags (`fuzzy` maps to [`Unit::fuzzy`]) |
//! | `#\|` | previous msgid, dropped |
//! | `#~ ` | obsolete entry line |
//! | `msgctxt`, `msgid`, `msgid_plural`, `msgstr`, `msgstr[n]` | keywords |
//! | `"..."` | continuation of the previous keyword |
//!
//! Entries are written in a fixed layout (comments, keywords, one blank line
//! between entries) so output is byte-stable across round trips.

use super::{FormatError, TranslationFormat};
use crate::model::{MultiString, ParsedFile, Unit};
use std::collections::BTreeMap;

const SUGGESTED_BY: &str = "suggested by ";

#[derive(Debug, Clone, Copy, Default)]
pub struct PoFormat;

impl TranslationFormat for PoFormat {
    fn name(&self) -> &'static str {
        "po"
    }

    fn parse(&self, bytes: &[u8]) -> Result<ParsedFile, FormatError> {
        let text = std::str::from_utf8(bytes)?;
        parse_po(text).map(ParsedFile::new)
    }

    fn serialize(&self, units: &[Unit]) -> Result<Vec<u8>, FormatError> {
        let entries: Vec<String> = units.iter().map(write_entry).collect();
        Ok(entries.join("\n").into_bytes())
    }

    fn supports_header(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Context,
    Id,
    IdPlural,
    Str(usize),
}

#[derive(Default)]
struct EntryBuilder {
    translator: Vec<String>,
    developer: Vec<String>,
    origin: Option<String>,
    locations: Vec<String>,
    flags: Vec<String>,
    fuzzy: bool,
    obsolete: bool,
    context: Option<String>,
    msgid: Option<String>,
    msgid_plural: Option<String>,
    msgstr: BTreeMap<usize, String>,
    plural_msgstr: bool,
    current: Option<Field>,
    start_line: usize,
}

impl EntryBuilder {
    fn is_blank(&self) -> bool {
        self.msgid.is_none() && self.context.is_none() && self.msgstr.is_empty()
    }

    fn has_comments(&self) -> bool {
        !(self.translator.is_empty()
            && self.developer.is_empty()
            && self.origin.is_none()
            && self.locations.is_empty()
            && self.flags.is_empty()
            && !self.fuzzy)
    }

    /// A new comment or `msgctxt`/`msgid` after a `msgstr` starts the next entry.
    fn has_body(&self) -> bool {
        !self.msgstr.is_empty()
    }

    fn field_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Context => self.context.get_or_insert_with(String::new),
            Field::Id => self.msgid.get_or_insert_with(String::new),
            Field::IdPlural => self.msgid_plural.get_or_insert_with(String::new),
            Field::Str(n) => self.msgstr.entry(n).or_default(),
        }
    }

    fn finish(self) -> Result<Option<Unit>, FormatError> {
        if self.is_blank() {
            return Ok(None);
        }
        let msgid = self
            .msgid
            .ok_or_else(|| FormatError::syntax(self.start_line, "entry has no msgid"))?;

        let (source, target) = match self.msgid_plural {
            Some(plural) => {
                let variants: Vec<String> = self.msgstr.into_values().collect();
                (MultiString::plural([msgid, plural]), MultiString::from(variants))
            }
            None => {
                if self.plural_msgstr {
                    return Err(FormatError::syntax(
                        self.start_line,
                        "msgstr[n] without msgid_plural",
                    ));
                }
                let target = self.msgstr.into_values().next().unwrap_or_default();
                (MultiString::new(msgid), MultiString::new(target))
            }
        };

        Ok(Some(Unit {
            source,
            target,
            context: self.context,
            explicit_id: None,
            developer_comment: self.developer.join("\n"),
            translator_comment: self.translator.join("\n"),
            locations: self.locations,
            flags: self.flags,
            fuzzy: self.fuzzy,
            obsolete: self.obsolete,
            alternates: Vec::new(),
            origin: self.origin,
        }))
    }
}

fn parse_po(text: &str) -> Result<Vec<Unit>, FormatError> {
    let mut units = Vec::new();
    let mut entry = EntryBuilder::default();

    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let raw = raw.trim_end_matches('\r');
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            if let Some(unit) = std::mem::take(&mut entry).finish()? {
                units.push(unit);
            }
            continue;
        }

        let (line, obsolete) = match trimmed.strip_prefix("#~") {
            Some(rest) if !rest.starts_with('|') => (rest.trim_start(), true),
            Some(_) => continue,
            None => (trimmed, false),
        };

        let starts_entry = line.starts_with('#')
            || line.starts_with("msgctxt")
            || (line.starts_with("msgid") && !line.starts_with("msgid_plural"));
        if starts_entry && entry.has_body() {
            if let Some(unit) = std::mem::take(&mut entry).finish()? {
                units.push(unit);
            }
        }
        if entry.is_blank() && !entry.has_comments() {
            entry.start_line = line_no;
        }
        if obsolete {
            entry.obsolete = true;
        }

        if let Some(comment) = line.strip_prefix('#') {
            parse_comment(&mut entry, comment);
            continue;
        }

        if line.starts_with('"') {
            let field = entry
                .current
                .ok_or_else(|| FormatError::syntax(line_no, "continuation without keyword"))?;
            let value = unquote(line, line_no)?;
            entry.field_mut(field).push_str(&value);
            continue;
        }

        let (keyword, rest) = line
            .split_once(char::is_whitespace)
            .ok_or_else(|| FormatError::syntax(line_no, format!("unexpected line: {}", line)))?;
        let field = match keyword {
            "msgctxt" => Field::Context,
            "msgid" => Field::Id,
            "msgid_plural" => Field::IdPlural,
            "msgstr" => Field::Str(0),
            other => {
                let n = other
                    .strip_prefix("msgstr[")
                    .and_then(|s| s.strip_suffix(']'))
                    .and_then(|s| s.parse::<usize>().ok())
                    .ok_or_else(|| {
                        FormatError::syntax(line_no, format!("unknown keyword: {}", other))
                    })?;
                entry.plural_msgstr = true;
                Field::Str(n)
            }
        };
        let value = unquote(rest.trim(), line_no)?;
        let slot = entry.field_mut(field);
        slot.clear();
        slot.push_str(&value);
        entry.current = Some(field);
    }

    if let Some(unit) = entry.finish()? {
        units.push(unit);
    }
    Ok(units)
}

fn parse_comment(entry: &mut EntryBuilder, comment: &str) {
    if let Some(dev) = comment.strip_prefix('.') {
        let dev = dev.strip_prefix(' ').unwrap_or(dev);
        match dev.strip_prefix(SUGGESTED_BY) {
            Some(author) => entry.origin = Some(author.trim().to_string()),
            None => entry.developer.push(dev.to_string()),
        }
    } else if let Some(locs) = comment.strip_prefix(':') {
        entry
            .locations
            .extend(locs.split_whitespace().map(str::to_string));
    } else if let Some(flags) = comment.strip_prefix(',') {
        for flag in flags.split(',').map(str::trim).filter(|f| !f.is_empty()) {
            if flag == "fuzzy" {
                entry.fuzzy = true;
            } else {
                entry.flags.push(flag.to_string());
            }
        }
    } else if comment.starts_with('|') {
        // previous msgid
    } else {
        let text = comment.strip_prefix(' ').unwrap_or(comment);
        entry.translator.push(text.to_string());
    }
}

fn unquote(token: &str, line_no: usize) -> Result<String, FormatError> {
    let inner = token
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .filter(|_| token.len() >= 2)
        .ok_or_else(|| FormatError::syntax(line_no, format!("expected quoted string: {}", token)))?;

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => return Err(FormatError::syntax(line_no, "dangling escape")),
        }
    }
    Ok(out)
}

fn escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            other => out.push(other),
        }
    }
    out
}

fn write_string(out: &mut String, prefix: &str, keyword: &str, value: &str) {
    if value.contains('\n') {
        out.push_str(&format!("{}{} \"\"\n", prefix, keyword));
        for chunk in value.split_inclusive('\n') {
            out.push_str(&format!("{}\"{}\"\n", prefix, escape(chunk)));
        }
    } else {
        out.push_str(&format!("{}{} \"{}\"\n", prefix, keyword, escape(value)));
    }
}

fn write_comment_lines(out: &mut String, marker: &str, text: &str) {
    if text.is_empty() {
        return;
    }
    for line in text.split('\n') {
        if line.is_empty() {
            out.push_str(marker);
            out.push('\n');
        } else {
            out.push_str(&format!("{} {}\n", marker, line));
        }
    }
}

fn write_entry(unit: &Unit) -> String {
    let mut out = String::new();
    write_comment_lines(&mut out, "#", &unit.translator_comment);
    write_comment_lines(&mut out, "#.", &unit.developer_comment);
    if let Some(origin) = &unit.origin {
        out.push_str(&format!("#. {}{}\n", SUGGESTED_BY, origin));
    }
    if !unit.locations.is_empty() {
        out.push_str(&format!("#: {}\n", unit.locations.join(" ")));
    }
    let mut flags: Vec<&str> = Vec::new();
    if unit.fuzzy {
        flags.push("fuzzy");
    }
    flags.extend(unit.flags.iter().map(String::as_str));
    if !flags.is_empty() {
        out.push_str(&format!("#, {}\n", flags.join(", ")));
    }

    let prefix = if unit.obsolete { "#~ " } else { "" };
    if let Some(ctx) = &unit.context {
        write_string(&mut out, prefix, "msgctxt", ctx);
    }
    let source = unit.source.variants();
    write_string(&mut out, prefix, "msgid", &source[0]);
    if source.len() > 1 {
        write_string(&mut out, prefix, "msgid_plural", &source[1]);
        for (n, variant) in unit.target.variants().iter().enumerate() {
            write_string(&mut out, prefix, &format!("msgstr[{}]", n), variant);
        }
    } else {
        write_string(&mut out, prefix, "msgstr", unit.target.first());
    }
    out
}
