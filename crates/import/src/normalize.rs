//! Cleanup of extracted statement text.
//!
//! Every step is a pure `&str -> String` transform and the composition is
//! idempotent: running [`normalize`] on its own output changes nothing.

use std::sync::OnceLock;

use passbook_core::{parse_statement_date, DateOrder};
use regex::{Captures, Regex};

re!(re_pagination, r"(?i)\bpage[ \t]+\d+[ \t]+of[ \t]+\d+\b");
re!(re_value_date, r"(?i)\([ \t]*value[ \t]+date[^)\n]*\)");
re!(re_numeric_date, r"(\d{1,2})[-/.](\d{1,2})[-/.](\d{4})");
re!(re_rupee_prefix, r"(?i)(?:\bRs\.?|\bINR)[ \t]*(\d)");
re!(re_rupee_gap, r"₹[ \t]+(\d)");
re!(re_blank_run, r"[ \t\u{00A0}]+");

/// Phrases OCR tends to letter-space ("P a i d  t o").
const SPACED_PHRASES: &[&str] = &[
    "Paid to",
    "Received from",
    "Sent to",
    "UPI",
    "Completed",
    "Google Pay",
    "Transaction ID",
    "Debited from",
    "Credited to",
];

/// Normalized text plus what the date pass learned about the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedText {
    pub text: String,
    /// Order used for `NN-NN-YYYY` tokens.
    pub date_order: DateOrder,
    /// True when the order was proven by a token with a part above 12.
    pub order_inferred: bool,
    /// Tokens that could be read either way and were resolved by `date_order`.
    pub ambiguous_dates: usize,
    /// Indexes into `text.lines()` of lines whose date was read by the
    /// configured order alone. Empty when the order was inferred.
    pub ambiguous_lines: Vec<usize>,
}

pub fn normalize(text: &str, order: DateOrder) -> String {
    normalize_with_report(text, order).text
}

pub fn normalize_with_report(text: &str, order: DateOrder) -> NormalizedText {
    let text = strip_pagination(text);
    let text = strip_value_dates(&text);
    let text = repair_spaced_phrases(&text);
    let text = standardize_currency(&text);

    let (date_order, order_inferred) = match infer_date_order(&text) {
        Some(found) => (found, true),
        None => (order, false),
    };

    let mut lines = Vec::new();
    let mut ambiguous_dates = 0;
    let mut ambiguous_lines = Vec::new();
    for line in text.lines() {
        let (line, ambiguous) = canonicalize_dates(line, date_order);
        let line = collapse_line(&line);
        if line.is_empty() {
            continue;
        }
        if ambiguous > 0 {
            ambiguous_dates += ambiguous;
            if !order_inferred {
                ambiguous_lines.push(lines.len());
            }
        }
        lines.push(line);
    }

    NormalizedText {
        text: lines.join("\n"),
        date_order,
        order_inferred,
        ambiguous_dates,
        ambiguous_lines,
    }
}

pub fn strip_pagination(text: &str) -> String {
    re_pagination().replace_all(text, "").into_owned()
}

pub fn strip_value_dates(text: &str) -> String {
    re_value_date().replace_all(text, "").into_owned()
}

/// Rejoin letter-spaced OCR output for the known fixed phrases.
pub fn repair_spaced_phrases(text: &str) -> String {
    static PATTERNS: OnceLock<Vec<(Regex, &'static str)>> = OnceLock::new();
    let patterns = PATTERNS.get_or_init(|| {
        SPACED_PHRASES
            .iter()
            .filter_map(|phrase| Regex::new(&spaced_pattern(phrase)).ok().map(|re| (re, *phrase)))
            .collect()
    });

    let mut out = text.to_string();
    for (re, phrase) in patterns {
        if re.is_match(&out) {
            out = re.replace_all(&out, *phrase).into_owned();
        }
    }
    out
}

/// `"Paid to"` → `(?i)\bP[ \t]+a[ \t]+i[ \t]+d[ \t]+t[ \t]+o\b`. Only the fully
/// spaced form matches, so correctly printed text is left as is.
fn spaced_pattern(phrase: &str) -> String {
    let letters: Vec<String> = phrase
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| regex::escape(&c.to_string()))
        .collect();
    format!(r"(?i)\b{}\b", letters.join(r"[ \t]+"))
}

/// `Rs. 500`, `INR500`, `₹ 500` → `₹500`.
pub fn standardize_currency(text: &str) -> String {
    let text = re_rupee_prefix().replace_all(text, "₹$1");
    re_rupee_gap().replace_all(&text, "₹$1").into_owned()
}

/// Look for a numeric date token whose parts prove the document's order.
/// Returns `None` when no token decides it, or when tokens disagree.
pub fn infer_date_order(text: &str) -> Option<DateOrder> {
    let (mut day_first, mut month_first) = (false, false);
    for caps in date_tokens(text) {
        let p1: u32 = caps[1].parse().unwrap_or(0);
        let p2: u32 = caps[2].parse().unwrap_or(0);
        if p1 > 12 && p2 <= 12 {
            day_first = true;
        } else if p2 > 12 && p1 <= 12 {
            month_first = true;
        }
    }
    match (day_first, month_first) {
        (true, false) => Some(DateOrder::DayFirst),
        (false, true) => Some(DateOrder::MonthFirst),
        _ => None,
    }
}

/// Rewrite `DD-MM-YYYY` style tokens as `YYYY-MM-DD`. Tokens glued to other
/// digits, or naming impossible dates, are left untouched. Returns the text
/// and the number of tokens that were ambiguous.
pub fn canonicalize_dates(text: &str, order: DateOrder) -> (String, usize) {
    let mut ambiguous = 0;
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for caps in date_tokens(text) {
        let Some(m) = caps.get(0) else { continue };
        if let Some(reading) = parse_statement_date(m.as_str(), order) {
            if reading.is_ambiguous() {
                ambiguous += 1;
            }
            out.push_str(&text[last..m.start()]);
            out.push_str(&reading.canonical());
            last = m.end();
        }
    }
    out.push_str(&text[last..]);
    (out, ambiguous)
}

/// Numeric date tokens not embedded in a longer digit run.
fn date_tokens(text: &str) -> impl Iterator<Item = Captures<'_>> {
    re_numeric_date().captures_iter(text).filter(move |caps| {
        let Some(m) = caps.get(0) else { return false };
        let glued = |c: Option<char>| c.is_some_and(|c| c.is_ascii_digit());
        !glued(text[..m.start()].chars().next_back()) && !glued(text[m.end()..].chars().next())
    })
}

/// Single-space every line, trim it, and drop blank lines.
pub fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(collapse_line)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collapse_line(line: &str) -> String {
    re_blank_run().replace_all(line.trim(), " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "  Page 1 of 3\n\
        01-08-2025   UPI/NEFT/Ram Card/54321 (Value Date: 01-08-2025) 75.00(Dr)   601.54(Cr)\n\
        \n\
        P a i d  t o   Ravi   Rs. 500\n\
        14/08/2025\tINR 1,200.50 U P I\n";

    #[test]
    fn removes_pagination_and_value_dates() {
        let out = normalize(SAMPLE, DateOrder::DayFirst);
        assert!(!out.contains("Page 1 of 3"));
        assert!(!out.contains("Value Date"));
    }

    #[test]
    fn canonicalizes_dates_and_currency() {
        let out = normalize(SAMPLE, DateOrder::DayFirst);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "2025-08-01 UPI/NEFT/Ram Card/54321 75.00(Dr) 601.54(Cr)");
        assert_eq!(lines[1], "Paid to Ravi ₹500");
        assert_eq!(lines[2], "2025-08-14 ₹1,200.50 UPI");
        assert_eq!(lines.len(), 3);
    }

    #[test]
    fn is_idempotent() {
        let samples = [
            SAMPLE,
            "",
            "\n\n   \n",
            "30-11-2025 UPI/HARSH UPADHYAY /570064413612/UPIUPI- UPI-123456789 110.00(Dr) 7,930.00(Cr)",
            "01-09-2025UPI/Zomato/12345675.00(Dr)4,500.00(Cr)",
            "R e c e i v e d  f r o m Mom  ₹ 2,000 C o m p l e t e d",
            "Rs.Rs. 5 INR INR 7 page 2 of 2 page",
        ];
        for s in samples {
            let once = normalize(s, DateOrder::DayFirst);
            let twice = normalize(&once, DateOrder::DayFirst);
            assert_eq!(once, twice, "not idempotent for {s:?}");
        }
    }

    #[test]
    fn compact_lines_still_get_dates() {
        let out = normalize("01-09-2025UPI/Zomato 75.00(Dr)", DateOrder::DayFirst);
        assert_eq!(out, "2025-09-01UPI/Zomato 75.00(Dr)");
    }

    #[test]
    fn dates_inside_digit_runs_are_left_alone() {
        let out = normalize("ref 1201-08-20251 done", DateOrder::DayFirst);
        assert_eq!(out, "ref 1201-08-20251 done");
    }

    #[test]
    fn impossible_dates_are_left_alone() {
        assert_eq!(normalize("45-13-2025 x", DateOrder::DayFirst), "45-13-2025 x");
    }

    #[test]
    fn order_is_inferred_from_unambiguous_tokens() {
        let text = "03-04-2025 a\n25-04-2025 b";
        let report = normalize_with_report(text, DateOrder::MonthFirst);
        assert!(report.order_inferred);
        assert_eq!(report.date_order, DateOrder::DayFirst);
        assert_eq!(report.text, "2025-04-03 a\n2025-04-25 b");
        assert_eq!(report.ambiguous_dates, 1);
        assert!(report.ambiguous_lines.is_empty());
    }

    #[test]
    fn configured_order_is_used_without_evidence() {
        let report = normalize_with_report("03-04-2025 a", DateOrder::MonthFirst);
        assert!(!report.order_inferred);
        assert_eq!(report.text, "2025-03-04 a");
        assert_eq!(report.ambiguous_dates, 1);
        assert_eq!(report.ambiguous_lines, vec![0]);
    }

    #[test]
    fn ambiguous_lines_index_the_output_text() {
        let text = "Page 1 of 2\n\n2025-08-01 opening\n\n  03-04-2025 a\n05-06-2025 c";
        let report = normalize_with_report(text, DateOrder::DayFirst);
        let lines: Vec<&str> = report.text.lines().collect();
        assert_eq!(lines, ["2025-08-01 opening", "2025-04-03 a", "2025-06-05 c"]);
        assert_eq!(report.ambiguous_lines, vec![1, 2]);

        // 30-11-2025 proves day-first, so nothing is left unproven.
        let report = normalize_with_report(&format!("{text}\n30-11-2025 b"), DateOrder::DayFirst);
        assert!(report.order_inferred);
        assert_eq!(report.ambiguous_dates, 2);
        assert!(report.ambiguous_lines.is_empty());
    }

    #[test]
    fn well_spaced_phrases_are_untouched() {
        assert_eq!(repair_spaced_phrases("Paid to UPI Google Pay"), "Paid to UPI Google Pay");
        assert_eq!(repair_spaced_phrases("G o o g l e P a y"), "Google Pay");
    }
}
