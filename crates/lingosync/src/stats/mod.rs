//! # Statistics
//!
//! Unit and word counts computed from projection rows, never from files.
//!
//! - [`QuickStats`]: totals, translated, fuzzy and untranslated, each as a
//!   unit count and a source word count, plus translated target words.
//! - Complete stats: `{check_name: failing_units}` from a [`QualityChecker`].
//! - [`Counts`]: the key-wise record both are cached and summed as.
//!
//! A unit is *translated* when its target is non-empty, fuzzy or not, so
//! `translated + untranslated == total` and `fuzzy <= translated` for units
//! whose fuzzy flag sits on a filled target. Obsolete rows are not counted.
//!
//! Directory statistics are the [`Counts::dict_sum`] of their children.

use crate::projection::UnitRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub mod cache;
pub mod checks;

pub use cache::StatsCache;
pub use checks::{QualityChecker, StandardChecker};

pub const QUICK_STATS: &str = "quick_stats";
pub const COMPLETE_STATS: &str = "complete_stats";
pub const ALL_OPERATIONS: &[&str] = &[QUICK_STATS, COMPLETE_STATS];

/// A record of named counters. Missing keys read as zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Counts(BTreeMap<String, u64>);

impl Counts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> u64 {
        self.0.get(key).copied().unwrap_or(0)
    }

    pub fn set(&mut self, key: impl Into<String>, value: u64) {
        self.0.insert(key.into(), value);
    }

    pub fn add(&mut self, key: &str, value: u64) {
        *self.0.entry(key.to_string()).or_insert(0) += value;
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Key-wise sum over the union of both key sets.
    pub fn dict_sum(&self, other: &Counts) -> Counts {
        let mut out = self.clone();
        for (key, value) in &other.0 {
            out.add(key, *value);
        }
        out
    }

    pub fn sum<'a, I: IntoIterator<Item = &'a Counts>>(records: I) -> Counts {
        records
            .into_iter()
            .fold(Counts::new(), |acc, c| acc.dict_sum(c))
    }
}

impl FromIterator<(String, u64)> for Counts {
    fn from_iter<T: IntoIterator<Item = (String, u64)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuickStats {
    pub total: u64,
    pub total_words: u64,
    pub translated: u64,
    pub translated_words: u64,
    pub fuzzy: u64,
    pub fuzzy_words: u64,
    pub untranslated: u64,
    pub untranslated_words: u64,
    pub translated_target_words: u64,
}

impl QuickStats {
    pub fn from_rows<'a, I: IntoIterator<Item = &'a UnitRow>>(rows: I) -> Self {
        let mut stats = QuickStats::default();
        for row in rows.into_iter().filter(|r| !r.obsolete) {
            let words = row.source_wordcount();
            stats.total += 1;
            stats.total_words += words;
            if row.is_translated() {
                stats.translated += 1;
                stats.translated_words += words;
                stats.translated_target_words += row.target_wordcount();
            } else {
                stats.untranslated += 1;
                stats.untranslated_words += words;
            }
            if row.fuzzy {
                stats.fuzzy += 1;
                stats.fuzzy_words += words;
            }
        }
        stats
    }

    pub fn to_counts(&self) -> Counts {
        [
            ("total", self.total),
            ("totalsourcewords", self.total_words),
            ("translated", self.translated),
            ("translatedsourcewords", self.translated_words),
            ("fuzzy", self.fuzzy),
            ("fuzzysourcewords", self.fuzzy_words),
            ("untranslated", self.untranslated),
            ("untranslatedsourcewords", self.untranslated_words),
            ("translatedtargetwords", self.translated_target_words),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    pub fn from_counts(counts: &Counts) -> Self {
        Self {
            total: counts.get("total"),
            total_words: counts.get("totalsourcewords"),
            translated: counts.get("translated"),
            translated_words: counts.get("translatedsourcewords"),
            fuzzy: counts.get("fuzzy"),
            fuzzy_words: counts.get("fuzzysourcewords"),
            untranslated: counts.get("untranslated"),
            untranslated_words: counts.get("untranslatedsourcewords"),
            translated_target_words: counts.get("translatedtargetwords"),
        }
    }

    /// Percentage of source words translated (fuzzy excluded), rounded down.
    pub fn translated_percent(&self) -> u64 {
        if self.total_words == 0 {
            return 0;
        }
        self.translated_words.saturating_sub(self.fuzzy_words) * 100 / self.total_words
    }
}

/// One-line summary used as a commit message.
pub fn stats_message(name: &str, stats: &QuickStats) -> String {
    format!(
        "{}: {} of {} messages translated ({} fuzzy).",
        name, stats.translated, stats.total, stats.fuzzy
    )
}

/// Failing-unit counts per check, over translated, non-obsolete rows.
pub fn complete_stats<'a, I>(rows: I, checker: &dyn QualityChecker) -> Counts
where
    I: IntoIterator<Item = &'a UnitRow>,
{
    let mut counts = Counts::new();
    for name in checker.check_names() {
        counts.set(*name, 0);
    }
    for row in rows
        .into_iter()
        .filter(|r| !r.obsolete && r.is_translated())
    {
        for failure in checker.run(row.source(), row.target()) {
            counts.add(failure, 1);
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Unit;
    use crate::projection::{RowId, UnitRow};

    fn row(unit: Unit) -> UnitRow {
        UnitRow::from_unit(RowId(1), 0, &unit)
    }

    #[test]
    fn test_quick_stats_counts_fuzzy_as_translated() {
        let mut fuzzy = Unit::new("Red fish").with_target("Samaki mwekundu");
        fuzzy.fuzzy = true;
        let mut obsolete = Unit::new("Old").with_target("Zamani");
        obsolete.obsolete = true;
        let rows = vec![
            row(Unit::new("One fish")),
            row(Unit::new("Two fish").with_target("Samaki wawili")),
            row(fuzzy),
            row(obsolete),
        ];

        let stats = QuickStats::from_rows(&rows);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.total_words, 6);
        assert_eq!(stats.translated, 2);
        assert_eq!(stats.fuzzy, 1);
        assert_eq!(stats.untranslated, 1);
        assert_eq!(stats.translated_target_words, 4);
        assert_eq!(stats.translated_percent(), 33);
    }

    #[test]
    fn test_counts_round_trip_through_quick_stats() {
        let stats = QuickStats {
            total: 3,
            translated: 2,
            fuzzy: 1,
            untranslated: 1,
            ..Default::default()
        };
        assert_eq!(QuickStats::from_counts(&stats.to_counts()), stats);
    }

    #[test]
    fn test_dict_sum_over_disjoint_keys() {
        let mut a = Counts::new();
        a.set("total", 2);
        a.set("endpunc", 1);
        let mut b = Counts::new();
        b.set("total", 3);
        b.set("printf", 4);

        let sum = a.dict_sum(&b);
        assert_eq!(sum.get("total"), 5);
        assert_eq!(sum.get("endpunc"), 1);
        assert_eq!(sum.get("printf"), 4);
        assert_eq!(sum.get("missing"), 0);
        assert_eq!(a.dict_sum(&Counts::new()), a);
    }

    #[test]
    fn test_sum_of_nothing_is_empty() {
        assert!(Counts::sum(std::iter::empty()).is_empty());
    }

    #[test]
    fn test_stats_message_format() {
        let stats = QuickStats {
            total: 10,
            translated: 7,
            fuzzy: 2,
            ..Default::default()
        };
        assert_eq!(
            stats_message("sw/app.po", &stats),
            "sw/app.po: 7 of 10 messages translated (2 fuzzy)."
        );
    }

    #[test]
    fn test_complete_stats_reports_every_check() {
        let rows = vec![
            row(Unit::new("Hello.").with_target("Jambo")),
            row(Unit::new("Untranslated.")),
        ];
        let counts = complete_stats(&rows, &StandardChecker::default());
        assert_eq!(counts.get("endpunc"), 1);
        assert_eq!(counts.get("printf"), 0);
        assert!(counts.keys().any(|k| k == "doublespacing"));
    }
}
