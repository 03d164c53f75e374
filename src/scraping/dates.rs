//! French date-range resolution.
//!
//! Text is matched against an ordered cascade of range shapes; the first
//! shape that yields at least one valid calendar date wins. When no range
//! shape matches, every date-like substring is collected and the span
//! between the earliest and the latest is returned. Structured metadata
//! (JSON-LD, `<time datetime>`) can widen the bounds found in text.

use chrono::NaiveDate;
use regex::{Captures, Regex};
use serde_json::Value;

const DAY: &str = r"\b(\d{1,2})(?:er)?";
const YEAR: &str = r"(\d{4}|\d{2})\b";

const MONTHS: &[(&str, u32)] = &[
    ("janvier", 1),
    ("janv", 1),
    ("jan", 1),
    ("février", 2),
    ("fevrier", 2),
    ("févr", 2),
    ("fevr", 2),
    ("fév", 2),
    ("fev", 2),
    ("mars", 3),
    ("mar", 3),
    ("avril", 4),
    ("avr", 4),
    ("mai", 5),
    ("juin", 6),
    ("juillet", 7),
    ("juil", 7),
    ("août", 8),
    ("aout", 8),
    ("aoû", 8),
    ("septembre", 9),
    ("sept", 9),
    ("sep", 9),
    ("octobre", 10),
    ("oct", 10),
    ("novembre", 11),
    ("nov", 11),
    ("décembre", 12),
    ("decembre", 12),
    ("déc", 12),
    ("dec", 12),
];

/// Inclusive date span; either bound may be unknown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }.ordered()
    }

    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    fn ordered(self) -> Self {
        match (self.start, self.end) {
            (Some(s), Some(e)) if s > e => Self {
                start: Some(e),
                end: Some(s),
            },
            _ => self,
        }
    }

    /// ISO `YYYY-MM-DD` strings, mostly for assertions and logging.
    pub fn iso(&self) -> (Option<String>, Option<String>) {
        (
            self.start.map(|d| d.to_string()),
            self.end.map(|d| d.to_string()),
        )
    }
}

#[derive(Debug, Clone, Copy)]
enum Stage {
    NumericRange,
    FullRange,
    SharedYear,
    SharedMonth,
    OpenStart,
    OpenEnd,
}

#[derive(Debug, Clone)]
pub struct DateResolver {
    stages: Vec<(Stage, Regex)>,
    word_date: Regex,
    numeric_date: Regex,
    iso_date: Regex,
}

impl Default for DateResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl DateResolver {
    pub fn new() -> Self {
        let month = month_pattern();
        let numeric = r"\b(\d{1,2})[/.](\d{1,2})[/.](\d{4}|\d{2})\b";
        let stages = vec![
            (
                Stage::NumericRange,
                format!(r"(?:\bdu\s+)?{numeric}\s*(?:au|-|–|—)\s*{numeric}"),
            ),
            (
                Stage::FullRange,
                format!(r"\bdu\s+{DAY}\s+{month}\s+{YEAR}\s+au\s+{DAY}\s+{month}\s+{YEAR}"),
            ),
            (
                Stage::SharedYear,
                format!(r"\bdu\s+{DAY}\s+{month}\s+au\s+{DAY}\s+{month}\s+{YEAR}"),
            ),
            (
                Stage::SharedMonth,
                format!(r"\bdu\s+{DAY}\s+au\s+{DAY}\s+{month}\s+{YEAR}"),
            ),
            (
                Stage::OpenStart,
                format!(r"(?:(?:à|a)\s+partir\s+du|dès\s+le)\s+{DAY}\s+{month}\s+{YEAR}"),
            ),
            (
                Stage::OpenEnd,
                format!(r"jusqu'\s*au\s+{DAY}\s+{month}\s+{YEAR}"),
            ),
        ]
        .into_iter()
        .map(|(stage, pattern)| (stage, compile(&pattern)))
        .collect();

        Self {
            stages,
            word_date: compile(&format!(r"{DAY}\s+{month}\s+{YEAR}")),
            numeric_date: compile(numeric),
            iso_date: compile(r"\b(\d{4})-(\d{2})-(\d{2})\b"),
        }
    }

    /// Runs the text cascade only.
    pub fn resolve(&self, text: &str) -> DateRange {
        let text = normalize(text);
        for (stage, re) in &self.stages {
            for caps in re.captures_iter(&text) {
                let range = Self::read_stage(*stage, &caps);
                if !range.is_empty() {
                    log::trace!("date stage {stage:?} matched {:?}", caps.get(0).map(|m| m.as_str()));
                    return range;
                }
            }
        }
        self.scan_all(&text)
    }

    /// Text cascade widened by metadata spans.
    ///
    /// Metadata only fills bounds on its own when the text yields nothing;
    /// otherwise it can move a known start earlier or a known end later.
    pub fn resolve_with_metadata(&self, text: &str, metadata: &[DateRange]) -> DateRange {
        let found = self.resolve(text);
        let meta_start = metadata.iter().filter_map(|r| r.start).min();
        let meta_end = metadata.iter().filter_map(|r| r.end).max();

        if found.is_empty() {
            return DateRange::new(meta_start, meta_end);
        }

        let start = found.start.map(|s| meta_start.map_or(s, |m| s.min(m)));
        let end = found.end.map(|e| meta_end.map_or(e, |m| e.max(m)));
        DateRange::new(start, end)
    }

    fn read_stage(stage: Stage, caps: &Captures<'_>) -> DateRange {
        let n = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or_default();
        match stage {
            Stage::NumericRange => DateRange::new(
                numeric_date(n(1), n(2), n(3)),
                numeric_date(n(4), n(5), n(6)),
            ),
            Stage::FullRange => DateRange::new(
                word_date(n(1), n(2), n(3)),
                word_date(n(4), n(5), n(6)),
            ),
            Stage::SharedYear => {
                let end = word_date(n(3), n(4), n(5));
                let mut start = word_date(n(1), n(2), n(5));
                // "du 30 décembre au 3 janvier 2026" starts the year before
                if let (Some(s), Some(e)) = (start, end) {
                    if s > e {
                        start = word_date(n(1), n(2), &(year(n(5)) - 1).to_string());
                    }
                }
                DateRange::new(start, end)
            }
            Stage::SharedMonth => DateRange::new(
                word_date(n(1), n(3), n(4)),
                word_date(n(2), n(3), n(4)),
            ),
            Stage::OpenStart => DateRange {
                start: word_date(n(1), n(2), n(3)),
                end: None,
            },
            Stage::OpenEnd => DateRange {
                start: None,
                end: word_date(n(1), n(2), n(3)),
            },
        }
    }

    fn scan_all(&self, text: &str) -> DateRange {
        let mut found: Vec<NaiveDate> = Vec::new();
        found.extend(
            self.word_date
                .captures_iter(text)
                .filter_map(|c| word_date(&c[1], &c[2], &c[3])),
        );
        found.extend(
            self.numeric_date
                .captures_iter(text)
                .filter_map(|c| numeric_date(&c[1], &c[2], &c[3])),
        );
        found.extend(self.iso_date.captures_iter(text).filter_map(|c| {
            NaiveDate::from_ymd_opt(c[1].parse().ok()?, c[2].parse().ok()?, c[3].parse().ok()?)
        }));
        DateRange::new(found.iter().min().copied(), found.iter().max().copied())
    }
}

/// Date spans from JSON-LD `startDate`/`endDate` pairs, wherever they nest.
pub fn json_ld_ranges(value: &Value) -> Vec<DateRange> {
    let mut out = Vec::new();
    walk_json_ld(value, &mut out);
    out
}

fn walk_json_ld(value: &Value, out: &mut Vec<DateRange>) {
    match value {
        Value::Array(items) => items.iter().for_each(|item| walk_json_ld(item, out)),
        Value::Object(map) => {
            let start = map.get("startDate").and_then(Value::as_str).and_then(parse_iso_prefix);
            let end = map.get("endDate").and_then(Value::as_str).and_then(parse_iso_prefix);
            if start.is_some() || end.is_some() {
                out.push(DateRange::new(start, end));
            }
            map.values()
                .filter(|v| v.is_array() || v.is_object())
                .for_each(|v| walk_json_ld(v, out));
        }
        _ => {}
    }
}

/// Capturing alternation of the known month names, longest first.
fn month_pattern() -> String {
    let mut names: Vec<&str> = MONTHS.iter().map(|(name, _)| *name).collect();
    names.sort_by_key(|name| std::cmp::Reverse(name.chars().count()));
    let names: Vec<String> = names.into_iter().map(regex::escape).collect();
    format!(r"((?:{})\b\.?)", names.join("|"))
}

/// Parses `YYYY-MM-DD` with any trailing time part.
pub fn parse_iso_prefix(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    let head = value.get(..10)?;
    NaiveDate::parse_from_str(head, "%Y-%m-%d").ok()
}

pub fn month_number(name: &str) -> Option<u32> {
    let name = name.trim().trim_end_matches('.').to_lowercase();
    MONTHS
        .iter()
        .find(|(label, _)| *label == name)
        .map(|(_, number)| *number)
}

fn word_date(day: &str, month: &str, year_text: &str) -> Option<NaiveDate> {
    let month = month_number(month)?;
    NaiveDate::from_ymd_opt(year(year_text), month, day.parse().ok()?)
}

fn numeric_date(day: &str, month: &str, year_text: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year(year_text), month.parse().ok()?, day.parse().ok()?)
}

fn year(text: &str) -> i32 {
    match text.parse::<i32>() {
        Ok(y) if y < 100 => 2000 + y,
        Ok(y) => y,
        Err(_) => 0,
    }
}

fn normalize(text: &str) -> String {
    text.to_lowercase()
        .replace(['’', '`', '´'], "'")
        .replace('\u{a0}', " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn compile(pattern: &str) -> Regex {
    // Patterns are assembled from the constants above and are always valid.
    Regex::new(pattern).unwrap_or_else(|err| panic!("invalid date pattern {pattern}: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn iso(range: DateRange) -> (Option<String>, Option<String>) {
        range.iso()
    }

    fn some(a: &str, b: &str) -> (Option<String>, Option<String>) {
        (Some(a.to_string()), Some(b.to_string()))
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("test date")
    }

    #[test]
    fn full_range_across_years() {
        let r = DateResolver::new();
        assert_eq!(
            iso(r.resolve("Du 30 décembre 2025 au 3 janvier 2026")),
            some("2025-12-30", "2026-01-03")
        );
    }

    #[test]
    fn open_bounds_stay_open() {
        let r = DateResolver::new();
        assert_eq!(
            iso(r.resolve("À partir du 3 juin 2025")),
            (Some("2025-06-03".into()), None)
        );
        assert_eq!(
            iso(r.resolve("Jusqu'au 5 octobre 2025")),
            (None, Some("2025-10-05".into()))
        );
        assert_eq!(
            iso(r.resolve("jusqu’au 1er mars 2026")),
            (None, Some("2026-03-01".into()))
        );
    }

    #[test]
    fn single_date_fills_both_bounds() {
        let r = DateResolver::new();
        assert_eq!(iso(r.resolve("le 12 octobre 2025")), some("2025-10-12", "2025-10-12"));
    }

    #[test]
    fn no_date_yields_nothing() {
        let r = DateResolver::new();
        assert!(r.resolve("Une comédie en deux actes").is_empty());
    }

    #[test]
    fn numeric_ranges() {
        let r = DateResolver::new();
        assert_eq!(iso(r.resolve("du 02/10/2025 au 15/11/2025")), some("2025-10-02", "2025-11-15"));
        assert_eq!(iso(r.resolve("02/10/25 - 15/11/25")), some("2025-10-02", "2025-11-15"));
    }

    #[test]
    fn shared_year_and_month() {
        let r = DateResolver::new();
        assert_eq!(iso(r.resolve("du 10 sept. au 4 oct. 2025")), some("2025-09-10", "2025-10-04"));
        assert_eq!(iso(r.resolve("du 30 décembre au 3 janvier 2026")), some("2025-12-30", "2026-01-03"));
        assert_eq!(iso(r.resolve("Du 3 au 28 février 2026")), some("2026-02-03", "2026-02-28"));
    }

    #[test]
    fn invalid_calendar_dates_are_skipped() {
        let r = DateResolver::new();
        // 31 novembre does not exist; the open-start clause still resolves
        assert_eq!(
            iso(r.resolve("du 31 novembre 2025 au 31 novembre 2025, à partir du 2 décembre 2025")),
            (Some("2025-12-02".into()), None)
        );
        assert_eq!(iso(r.resolve("le 30 février 2025 et le 4 mars 2025")), some("2025-03-04", "2025-03-04"));
    }

    #[test]
    fn fallback_takes_extremes() {
        let r = DateResolver::new();
        assert_eq!(
            iso(r.resolve("Les 14 nov. 2025, 2 déc. 2025 et le 20/11/2025")),
            some("2025-11-14", "2025-12-02")
        );
    }

    #[test]
    fn fallback_ignores_words_that_are_not_months() {
        let r = DateResolver::new();
        assert_eq!(iso(r.resolve("les 14 et 21 novembre 2025")), some("2025-11-21", "2025-11-21"));
        assert_eq!(
            iso(r.resolve("mardi 4 et mercredi 5 mars 2025, relâche le 6 au soir 25")),
            some("2025-03-05", "2025-03-05")
        );
    }

    #[test]
    fn metadata_bounds_only_widen_their_own_side() {
        let r = DateResolver::new();
        let meta = [
            DateRange::new(None, Some(date("2025-08-01"))),
            DateRange::new(Some(date("2025-11-01")), None),
        ];
        assert_eq!(
            iso(r.resolve_with_metadata("du 10 septembre 2025 au 15 octobre 2025", &meta)),
            some("2025-09-10", "2025-10-15")
        );
    }

    #[test]
    fn metadata_widens_but_never_fills_open_bounds() {
        let r = DateResolver::new();
        let meta = [DateRange::new(Some(date("2025-09-01")), Some(date("2025-12-31")))];
        assert_eq!(
            iso(r.resolve_with_metadata("du 10 septembre 2025 au 15 octobre 2025", &meta)),
            some("2025-09-01", "2025-12-31")
        );
        assert_eq!(
            iso(r.resolve_with_metadata("à partir du 3 juin 2025", &meta)),
            (Some("2025-06-03".into()), None)
        );
        assert_eq!(iso(r.resolve_with_metadata("sans date", &meta)), some("2025-09-01", "2025-12-31"));
    }

    #[test]
    fn json_ld_nested_dates() {
        let doc = json!({
            "@context": "https://schema.org",
            "@graph": [
                {"@type": "TheaterEvent", "startDate": "2025-10-01T20:00:00+02:00", "endDate": "2025-10-31"},
                {"@type": "Place", "name": "Théâtre"}
            ]
        });
        let ranges = json_ld_ranges(&doc);
        assert_eq!(ranges.len(), 1);
        assert_eq!(iso(ranges[0]), some("2025-10-01", "2025-10-31"));
    }

    #[test]
    fn month_table_accepts_abbreviations() {
        assert_eq!(month_number("Févr."), Some(2));
        assert_eq!(month_number("AOÛT"), Some(8));
        assert_eq!(month_number("juil"), Some(7));
        assert_eq!(month_number("lundi"), None);
    }
}
