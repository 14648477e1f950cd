//! # Rendering
//!
//! Turns a [`CmdResult`] into terminal text. Every function returns a
//! `String` so the output can be tested without a terminal; `commands.rs`
//! does the printing.
//!
//! Colors come from `console` styles, which switch themselves off when
//! stdout is not a terminal.

use console::Style;
use lingosync::commands::{CmdMessage, CmdResult, MessageLevel, StatsLine};
use lingosync::projection::UnitRow;
use lingosync::search::SearchHit;
use lingosync::suggestions::Suggestion;

use super::setup::OutputMode;

const SOURCE_WIDTH: usize = 40;

struct Styles {
    info: Style,
    success: Style,
    warning: Style,
    error: Style,
    id: Style,
    path: Style,
    fuzzy: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            info: Style::new().dim(),
            success: Style::new().green(),
            warning: Style::new().yellow(),
            error: Style::new().red(),
            id: Style::new().yellow(),
            path: Style::new().bold(),
            fuzzy: Style::new().magenta(),
        }
    }
}

pub(super) fn render_result(result: &CmdResult, mode: OutputMode) -> serde_json::Result<String> {
    match mode {
        OutputMode::Json => serde_json::to_string_pretty(result),
        OutputMode::Text => Ok(render_text(result)),
    }
}

fn render_text(result: &CmdResult) -> String {
    let mut out = String::new();
    // A single stats line is already summarized by the command's message.
    if result.stats.len() > 1 || result.stats.iter().any(|l| l.checks.is_some()) {
        out.push_str(&render_stats(&result.stats));
    }
    out.push_str(&render_units(&result.units));
    out.push_str(&render_suggestions(&result.suggestions));
    out.push_str(&render_hits(&result.hits));
    out.push_str(&render_messages(&result.messages));
    out
}

pub(super) fn render_messages(messages: &[CmdMessage]) -> String {
    let styles = Styles::new();
    let mut out = String::new();
    for message in messages {
        let style = match message.level {
            MessageLevel::Info => &styles.info,
            MessageLevel::Success => &styles.success,
            MessageLevel::Warning => &styles.warning,
            MessageLevel::Error => &styles.error,
        };
        out.push_str(&format!("{}\n", style.apply_to(&message.content)));
    }
    out
}

fn render_stats(lines: &[StatsLine]) -> String {
    let styles = Styles::new();
    let mut out = String::new();
    for line in lines {
        let s = &line.stats;
        out.push_str(&format!(
            "{}  {}/{} translated, {} fuzzy, {} untranslated ({}/{} words)\n",
            styles.path.apply_to(&line.pootle_path),
            s.translated,
            s.total,
            s.fuzzy,
            s.untranslated,
            s.translated_words,
            s.total_words,
        ));
        if let Some(checks) = &line.checks {
            for (name, count) in checks.iter().filter(|(_, count)| *count > 0) {
                out.push_str(&format!("    {}: {}\n", styles.warning.apply_to(name), count));
            }
        }
    }
    out
}

fn render_units(rows: &[UnitRow]) -> String {
    let styles = Styles::new();
    let mut out = String::new();
    for row in rows {
        let marker = if row.fuzzy {
            styles.fuzzy.apply_to("~").to_string()
        } else if row.is_translated() {
            styles.success.apply_to("+").to_string()
        } else {
            " ".to_string()
        };
        let source = truncate(&row.source().variants().join(" | "), SOURCE_WIDTH);
        out.push_str(&format!(
            "{} {} {:<width$} {}\n",
            styles.id.apply_to(format!("{:>4}", row.id.0)),
            marker,
            source,
            row.target().variants().join(" | "),
            width = SOURCE_WIDTH,
        ));
    }
    out
}

fn render_suggestions(suggestions: &[Suggestion]) -> String {
    let styles = Styles::new();
    let mut out = String::new();
    for suggestion in suggestions {
        let author = suggestion
            .author
            .as_deref()
            .map(|a| format!(" {}", styles.info.apply_to(format!("(by {})", a))))
            .unwrap_or_default();
        out.push_str(&format!(
            "{}. {}{}\n",
            styles.id.apply_to(suggestion.position),
            suggestion.target.variants().join(" | "),
            author
        ));
    }
    out
}

fn render_hits(hits: &[SearchHit]) -> String {
    let styles = Styles::new();
    hits.iter()
        .map(|hit| {
            format!(
                "{} @{} {}\n",
                styles.path.apply_to(&hit.pootle_path),
                hit.itemno,
                styles.info.apply_to(format!("(unit {})", hit.dbid))
            )
        })
        .collect()
}

fn truncate(text: &str, width: usize) -> String {
    let text = text.replace('\n', " ");
    if text.chars().count() <= width {
        return text;
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

#[cfg(test)]
mod tests {
    use super::*;
    use console::strip_ansi_codes;
    use lingosync::model::{MultiString, Unit};
    use lingosync::projection::RowId;
    use lingosync::stats::{Counts, QuickStats};

    fn plain(text: String) -> String {
        strip_ansi_codes(&text).into_owned()
    }

    fn row(id: u64, source: &str, target: &str) -> UnitRow {
        UnitRow::from_unit(RowId(id), id as usize, &Unit::new(source).with_target(target))
    }

    #[test]
    fn test_messages_in_order() {
        let messages = vec![CmdMessage::success("Saved /sw/demo/fish.po"), CmdMessage::warning("careful")];
        assert_eq!(plain(render_messages(&messages)), "Saved /sw/demo/fish.po\ncareful\n");
    }

    #[test]
    fn test_units_show_marker_and_target() {
        let out = plain(render_units(&[row(1, "fish", "samaki"), row(2, "one fish", "")]));
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("   1 + fish"));
        assert!(lines[0].ends_with("samaki"));
        assert!(lines[1].starts_with("   2   one fish"));
    }

    #[test]
    fn test_long_sources_are_truncated() {
        let long = "word ".repeat(20);
        let out = plain(render_units(&[row(1, &long, "")]));
        assert!(out.contains('…'));
        assert!(!out.contains(long.trim_end()));
    }

    #[test]
    fn test_suggestions_with_author() {
        let suggestions = vec![
            Suggestion {
                position: 0,
                target: MultiString::new("samaki"),
                author: Some("amina".into()),
            },
            Suggestion {
                position: 1,
                target: MultiString::plural(["samaka", "samak"]),
                author: None,
            },
        ];
        assert_eq!(
            plain(render_suggestions(&suggestions)),
            "0. samaki (by amina)\n1. samaka | samak\n"
        );
    }

    #[test]
    fn test_single_stats_line_is_left_to_the_message() {
        let mut result = CmdResult::default().with_stats(vec![StatsLine {
            pootle_path: "/sw/demo/fish.po".into(),
            stats: QuickStats::default(),
            checks: None,
        }]);
        result.add_message(CmdMessage::info("fish.po: 0 of 0 messages translated (0 fuzzy)."));
        let out = plain(render_text(&result));
        assert_eq!(out.lines().count(), 1);
    }

    #[test]
    fn test_complete_stats_list_failing_checks() {
        let mut checks = Counts::new();
        checks.set("printf", 2);
        checks.set("doublespace", 0);
        let lines = vec![StatsLine {
            pootle_path: "/sw/demo/fish.po".into(),
            stats: QuickStats::default(),
            checks: Some(checks),
        }];
        let out = plain(render_stats(&lines));
        assert!(out.contains("printf: 2"));
        assert!(!out.contains("doublespace"));
    }

    #[test]
    fn test_json_output_is_the_whole_result() {
        let result = CmdResult::default().with_units(vec![row(1, "fish", "samaki")]);
        let json = render_result(&result, OutputMode::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["units"][0]["id"], 1);
        assert_eq!(value["messages"], serde_json::json!([]));
    }
}
