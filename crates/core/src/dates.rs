use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(re_canonical, r"^\d{4}-\d{2}-\d{2}$");
re!(re_year_first, r"^(\d{4})[-/.](\d{1,2})[-/.](\d{1,2})$");
re!(re_numeric, r"^(\d{1,2})[-/.](\d{1,2})[-/.](\d{2}|\d{4})$");
re!(re_day_month_name,
    r"(?i)^(\d{1,2})[\s\-]*(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?[\s,\-]*(\d{2}|\d{4})$");
re!(re_month_name_day,
    r"(?i)^(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2}),?\s+(\d{4})$");

/// Which numeric part comes first in `NN-NN-YYYY` dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DateOrder {
    #[default]
    DayFirst,
    MonthFirst,
}

/// A date read from statement text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateReading {
    /// Only one calendar reading was possible.
    Exact(NaiveDate),
    /// Both numeric parts were valid months; resolved with the configured [`DateOrder`].
    Ambiguous(NaiveDate),
}

impl DateReading {
    pub fn date(self) -> NaiveDate {
        match self {
            DateReading::Exact(d) | DateReading::Ambiguous(d) => d,
        }
    }

    pub fn is_ambiguous(self) -> bool {
        matches!(self, DateReading::Ambiguous(_))
    }

    pub fn canonical(self) -> String {
        format_canonical(self.date())
    }
}

pub fn format_canonical(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// True when `s` is exactly `YYYY-MM-DD` and names a real calendar day.
pub fn is_canonical(s: &str) -> bool {
    re_canonical().is_match(s) && NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok()
}

/// Read a single date token. Day and month ranges are checked before any
/// reordering, so `31-12-2025` is read day-first even under
/// [`DateOrder::MonthFirst`]; impossible dates return `None`.
pub fn parse_statement_date(raw: &str, order: DateOrder) -> Option<DateReading> {
    let s = raw.trim();

    if let Some(c) = re_year_first().captures(s) {
        let y: i32 = c.get(1)?.as_str().parse().ok()?;
        let m: u32 = c.get(2)?.as_str().parse().ok()?;
        let d: u32 = c.get(3)?.as_str().parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d).map(DateReading::Exact);
    }

    if let Some(c) = re_numeric().captures(s) {
        let p1: u32 = c.get(1)?.as_str().parse().ok()?;
        let p2: u32 = c.get(2)?.as_str().parse().ok()?;
        let year = expand_year(c.get(3)?.as_str().parse().ok()?);
        return resolve_numeric(p1, p2, year, order);
    }

    if let Some(c) = re_day_month_name().captures(s) {
        let d: u32 = c.get(1)?.as_str().parse().ok()?;
        let m = abbr_month_to_num(c.get(2)?.as_str())?;
        let y = expand_year(c.get(3)?.as_str().parse().ok()?);
        return NaiveDate::from_ymd_opt(y, m, d).map(DateReading::Exact);
    }

    if let Some(c) = re_month_name_day().captures(s) {
        let m = abbr_month_to_num(c.get(1)?.as_str())?;
        let d: u32 = c.get(2)?.as_str().parse().ok()?;
        let y: i32 = c.get(3)?.as_str().parse().ok()?;
        return NaiveDate::from_ymd_opt(y, m, d).map(DateReading::Exact);
    }

    None
}

/// Canonical `YYYY-MM-DD` form of `raw`, or `None` if it is not a readable date.
pub fn canonicalize_date(raw: &str, order: DateOrder) -> Option<String> {
    parse_statement_date(raw, order).map(DateReading::canonical)
}

fn resolve_numeric(p1: u32, p2: u32, year: i32, order: DateOrder) -> Option<DateReading> {
    let day_first = NaiveDate::from_ymd_opt(year, p2, p1);
    let month_first = NaiveDate::from_ymd_opt(year, p1, p2);
    match (day_first, month_first) {
        (Some(d), None) | (None, Some(d)) => Some(DateReading::Exact(d)),
        (Some(a), Some(b)) if a == b => Some(DateReading::Exact(a)),
        (Some(a), Some(b)) => Some(DateReading::Ambiguous(match order {
            DateOrder::DayFirst => a,
            DateOrder::MonthFirst => b,
        })),
        (None, None) => None,
    }
}

fn expand_year(y: i32) -> i32 {
    if y < 100 { 2000 + y } else { y }
}

fn abbr_month_to_num(name: &str) -> Option<u32> {
    match name.get(..3)?.to_lowercase().as_str() {
        "jan" => Some(1), "feb" => Some(2), "mar" => Some(3), "apr" => Some(4),
        "may" => Some(5), "jun" => Some(6), "jul" => Some(7), "aug" => Some(8),
        "sep" => Some(9), "oct" => Some(10), "nov" => Some(11), "dec" => Some(12),
        _ => None,
    }
}
