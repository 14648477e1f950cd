//! Quality checks run by complete statistics.

use crate::model::MultiString;
use once_cell::sync::Lazy;
use regex::Regex;

/// Checks a translated unit and names every check it fails.
pub trait QualityChecker: Send + Sync {
    fn check_names(&self) -> &[&'static str];

    fn run(&self, source: &MultiString, target: &MultiString) -> Vec<&'static str>;
}

static PRINTF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"%(?:(\d+)\$)?[-+ #0']*(?:\d+|\*)?(?:\.(?:\d+|\*))?(?:hh|h|ll|l|L|q|j|z|t)?([diouxXeEfFgGaAcspn%])")
        .expect("valid printf pattern")
});

const END_PUNCTUATION: &[char] = &['.', '!', '?', ':', ';', '…', '。', '！', '？', '：'];

/// End punctuation, double spacing, surrounding whitespace and printf placeholders.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardChecker;

impl StandardChecker {
    const NAMES: &'static [&'static str] = &["doublespacing", "endpunc", "printf", "whitespace"];
}

impl QualityChecker for StandardChecker {
    fn check_names(&self) -> &[&'static str] {
        Self::NAMES
    }

    fn run(&self, source: &MultiString, target: &MultiString) -> Vec<&'static str> {
        let src = source.first();
        let mut failures = Vec::new();
        let pairs = target.variants().iter().enumerate().map(|(i, tgt)| {
            let s = if i == 0 { src } else { source.variants().last().map(String::as_str).unwrap_or(src) };
            (s, tgt.as_str())
        });
        let pairs: Vec<(&str, &str)> = pairs.filter(|(_, t)| !t.is_empty()).collect();

        if pairs.iter().any(|(s, t)| double_spacing(s, t)) {
            failures.push("doublespacing");
        }
        if pairs.iter().any(|(s, t)| end_punctuation(s, t)) {
            failures.push("endpunc");
        }
        if pairs.iter().any(|(s, t)| printf_mismatch(s, t)) {
            failures.push("printf");
        }
        if pairs.iter().any(|(s, t)| whitespace(s, t)) {
            failures.push("whitespace");
        }
        failures
    }
}

fn double_spacing(source: &str, target: &str) -> bool {
    target.contains("  ") && !source.contains("  ")
}

fn end_punctuation(source: &str, target: &str) -> bool {
    let last = |s: &str| s.trim_end().chars().last();
    let is_punc = |c: Option<char>| c.map_or(false, |c| END_PUNCTUATION.contains(&c));
    is_punc(last(source)) != is_punc(last(target))
}

fn whitespace(source: &str, target: &str) -> bool {
    let leading = |s: &str| s.starts_with(char::is_whitespace);
    let trailing = |s: &str| s.ends_with(char::is_whitespace);
    leading(source) != leading(target) || trailing(source) != trailing(target)
}

fn placeholders(text: &str) -> Vec<String> {
    let mut found: Vec<String> = PRINTF_RE
        .captures_iter(text)
        .filter(|c| c.get(2).map_or(false, |m| m.as_str() != "%"))
        .map(|c| {
            let position = c.get(1).map(|m| m.as_str()).unwrap_or("");
            let conversion = c.get(2).map(|m| m.as_str()).unwrap_or("");
            format!("{}{}", position, conversion)
        })
        .collect();
    found.sort();
    found
}

fn printf_mismatch(source: &str, target: &str) -> bool {
    placeholders(source) != placeholders(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(source: &str, target: &str) -> Vec<&'static str> {
        StandardChecker.run(&MultiString::new(source), &MultiString::new(target))
    }

    #[test]
    fn test_clean_translation_passes() {
        assert!(run("Open %s now.", "Fungua %s sasa.").is_empty());
    }

    #[test]
    fn test_end_punctuation() {
        assert_eq!(run("Done.", "Imekwisha"), vec!["endpunc"]);
        assert_eq!(run("Done", "Imekwisha!"), vec!["endpunc"]);
        assert!(run("Done?", "Imekwisha?").is_empty());
    }

    #[test]
    fn test_double_spacing_and_whitespace() {
        assert_eq!(run("a b", "a  b"), vec!["doublespacing"]);
        assert_eq!(run(" a", "a"), vec!["whitespace"]);
    }

    #[test]
    fn test_printf_placeholders() {
        assert_eq!(run("%d files", "faili"), vec!["printf"]);
        assert!(run("%1$s of %2$d", "%2$d ya %1$s").is_empty());
        assert!(run("100%% done", "100%% imekwisha").is_empty());
        assert_eq!(run("%s", "%d"), vec!["printf"]);
    }

    #[test]
    fn test_plural_variants_checked_against_plural_source() {
        let source = MultiString::plural(["%d fish", "%d fishes"]);
        let target = MultiString::plural(["samaki %d", "samaki"]);
        assert_eq!(StandardChecker.run(&source, &target), vec!["printf"]);
    }
}
