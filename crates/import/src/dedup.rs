use std::collections::HashSet;

use passbook_core::{parse_statement_date, CandidateFlag, DateOrder, TransactionCandidate};
use tracing::debug;

/// Result of a dedup pass; `dropped` counts the later duplicates removed.
#[derive(Debug, Clone, PartialEq)]
pub struct DedupOutcome {
    pub kept: Vec<TransactionCandidate>,
    pub dropped: usize,
}

/// `date_amount_narrationprefix`. Narration is whitespace-collapsed and
/// lowercased before the first `prefix_len` characters are taken.
pub fn dedup_key(candidate: &TransactionCandidate, prefix_len: usize) -> String {
    let amount = candidate
        .amount
        .map(|m| m.as_decimal().normalize().to_string())
        .unwrap_or_else(|| "none".to_string());
    let narration: String = collapse(&candidate.narration)
        .to_lowercase()
        .chars()
        .take(prefix_len)
        .collect();
    format!("{}_{}_{}", candidate.date, amount, narration)
}

/// Normalize every candidate, then keep the first occurrence of each key.
/// Input order decides which duplicate survives.
pub fn dedupe(
    candidates: Vec<TransactionCandidate>,
    prefix_len: usize,
    order: DateOrder,
) -> DedupOutcome {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(candidates.len());
    let mut dropped = 0;

    for mut candidate in candidates {
        renormalize(&mut candidate, order);
        if seen.insert(dedup_key(&candidate, prefix_len)) {
            kept.push(candidate);
        } else {
            debug!(date = %candidate.date, narration = %candidate.narration, "Duplicate dropped");
            dropped += 1;
        }
    }

    DedupOutcome { kept, dropped }
}

fn renormalize(candidate: &mut TransactionCandidate, order: DateOrder) {
    candidate.narration = collapse(&candidate.narration);
    match parse_statement_date(&candidate.date, order) {
        Some(reading) => {
            if reading.is_ambiguous() {
                candidate.flag(CandidateFlag::AmbiguousDate);
            }
            candidate.date = reading.canonical();
        }
        None => candidate.flag(CandidateFlag::UnparsedDate),
    }
}

fn collapse(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use passbook_core::{Money, Origin, TxnType};

    fn candidate(date: &str, narration: &str, amount: &str, origin: Origin) -> TransactionCandidate {
        TransactionCandidate::new(
            date,
            narration,
            Money::parse(amount),
            Some(TxnType::Debit),
            0.9,
            origin,
        )
    }

    fn pattern() -> Origin {
        Origin::Pattern { rule: "tight".to_string() }
    }

    #[test]
    fn key_uses_date_amount_and_prefix() {
        let c = candidate("2025-08-01", "UPI/NEFT/Ram   Card/54321 extra words here", "75.00", pattern());
        assert_eq!(dedup_key(&c, 20), "2025-08-01_75_upi/neft/ram card/54");
    }

    #[test]
    fn key_ignores_trailing_zeros_in_amount() {
        let a = candidate("2025-08-01", "Zomato", "75.00", pattern());
        let b = candidate("2025-08-01", "Zomato", "75", pattern());
        assert_eq!(dedup_key(&a, 20), dedup_key(&b, 20));
    }

    #[test]
    fn first_occurrence_survives() {
        let regex = candidate("2025-08-01", "UPI/Zomato/Order 1234", "250.00", pattern());
        let ai = candidate("01-08-2025", "UPI/Zomato/Order  1234", "250", Origin::AiText { chunk_index: 0 });
        let other = candidate("2025-08-02", "UPI/Zomato/Order 1234", "250.00", pattern());

        let outcome = dedupe(vec![regex, ai, other], 20, DateOrder::DayFirst);
        assert_eq!(outcome.dropped, 1);
        assert_eq!(outcome.kept.len(), 2);
        assert_eq!(outcome.kept[0].origin, pattern());
        assert_eq!(outcome.kept[1].date, "2025-08-02");
    }

    #[test]
    fn differs_beyond_prefix_is_still_duplicate() {
        let a = candidate("2025-08-01", "NEFT/ACME PAYROLL AUGUST", "50000", pattern());
        let b = candidate("2025-08-01", "NEFT/ACME PAYROLL SEPTEMBER", "50000", pattern());
        assert_eq!(dedupe(vec![a.clone(), b.clone()], 16, DateOrder::DayFirst).dropped, 1);
        assert_eq!(dedupe(vec![a, b], 40, DateOrder::DayFirst).dropped, 0);
    }

    #[test]
    fn unparsed_dates_are_kept_and_flagged() {
        let c = candidate("sometime last week", "Zomato", "10", pattern());
        let outcome = dedupe(vec![c], 20, DateOrder::DayFirst);
        assert_eq!(outcome.kept[0].date, "sometime last week");
        assert!(outcome.kept[0].has_flag(CandidateFlag::UnparsedDate));
    }

    #[test]
    fn missing_amounts_share_a_key_slot() {
        let mut a = candidate("2025-08-01", "Zomato", "10", pattern());
        a.amount = None;
        assert!(dedup_key(&a, 20).contains("_none_"));
    }
}
