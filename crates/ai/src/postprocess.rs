use passbook_core::{
    parse_statement_date, CandidateFlag, DateOrder, Money, Origin, TransactionCandidate, TxnType,
};
use passbook_import::dedupe;
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

use crate::response::RawTransaction;

/// Confidence for model records that do not carry one.
pub const DEFAULT_CONFIDENCE: f32 = 0.9;

fn re_currency() -> &'static Regex {
    static R: OnceLock<Regex> = OnceLock::new();
    R.get_or_init(|| Regex::new(r"(?i)₹|\bINR\b|\bRs\.?").expect("invalid regex"))
}

/// Parse a model-reported amount, repairing OCR letter/digit confusions
/// (`O` → `0`, `l`/`I`/`|` → `1`). The flag is true when a repair was needed.
/// Sign is dropped; direction comes from the type field.
pub fn repair_amount(raw: &str) -> Option<(Money, bool)> {
    let stripped = re_currency().replace_all(raw, "");
    let stripped = stripped.trim();
    if let Some(m) = Money::parse(stripped) {
        return Some((abs(m), false));
    }
    let repaired: String = stripped
        .chars()
        .map(|c| match c {
            'O' | 'o' => '0',
            'l' | 'I' | '|' => '1',
            other => other,
        })
        .collect();
    Money::parse(&repaired).map(|m| (abs(m), true))
}

fn abs(m: Money) -> Money {
    Money::from_decimal(m.as_decimal().abs())
}

fn is_negative(raw: &str) -> bool {
    raw.trim_start().starts_with('-')
}

/// Turn model records into candidates and dedupe them within the batch.
pub fn post_process(
    records: Vec<RawTransaction>,
    origin: &Origin,
    order: DateOrder,
    dedup_prefix_len: usize,
) -> Vec<TransactionCandidate> {
    let candidates: Vec<TransactionCandidate> =
        records.into_iter().map(|r| to_candidate(r, origin, order)).collect();
    let outcome = dedupe(candidates, dedup_prefix_len, order);
    if outcome.dropped > 0 {
        debug!(dropped = outcome.dropped, "AI duplicates removed");
    }
    outcome.kept
}

fn to_candidate(record: RawTransaction, origin: &Origin, order: DateOrder) -> TransactionCandidate {
    let mut flags = Vec::new();

    let amount_raw = record.amount.unwrap_or_default();
    let amount = match repair_amount(&amount_raw) {
        Some((m, repaired)) => {
            if repaired {
                flags.push(CandidateFlag::RepairedAmount);
            }
            Some(m)
        }
        None => None,
    };

    let date = match record.date.as_deref().map(|d| (d, parse_statement_date(d, order))) {
        Some((_, Some(reading))) => {
            if reading.is_ambiguous() {
                flags.push(CandidateFlag::AmbiguousDate);
            }
            reading.canonical()
        }
        Some((raw, None)) => {
            flags.push(CandidateFlag::UnparsedDate);
            raw.trim().to_string()
        }
        None => {
            flags.push(CandidateFlag::UnparsedDate);
            String::new()
        }
    };

    let txn_type = match record.txn_type.as_deref().map(str::parse::<TxnType>) {
        Some(Ok(t)) => t,
        _ if is_negative(&amount_raw) => TxnType::Debit,
        _ => {
            flags.push(CandidateFlag::DefaultedType);
            TxnType::Debit
        }
    };

    let narration = record
        .narration
        .unwrap_or_default()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    let mut candidate = TransactionCandidate::new(
        date,
        narration,
        amount,
        Some(txn_type),
        record.confidence.unwrap_or(DEFAULT_CONFIDENCE),
        origin.clone(),
    )
    .with_balance(record.balance.as_deref().and_then(repair_amount).map(|(m, _)| m))
    .with_raw(record.raw.unwrap_or_default());
    candidate.time = record.time;
    candidate.transaction_id = record.transaction_id;
    candidate.account = record.account;
    for flag in flags {
        candidate.flag(flag);
    }
    candidate
}
