use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::dates;
use super::transaction::{TransactionCandidate, ValidatedTransaction};

/// Candidates below this confidence are routed to manual review.
pub const REVIEW_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Invalid date format")]
    DateFormat,
    #[error("Invalid date value")]
    DateValue,
    #[error("Invalid amount")]
    Amount,
    #[error("Missing or invalid debit/credit indicator")]
    Direction,
    #[error("Empty narration")]
    EmptyNarration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub needs_manual_review: bool,
}

/// Check every structural invariant of `candidate`. Never fails: problems are
/// reported in the returned error list.
pub fn validate(candidate: &TransactionCandidate, review_threshold: f32) -> ValidationResult {
    let errors: Vec<ValidationError> = check(candidate);
    ValidationResult {
        is_valid: errors.is_empty(),
        errors: errors.iter().map(ToString::to_string).collect(),
        needs_manual_review: candidate.confidence < review_threshold,
    }
}

pub fn validate_all(
    candidates: Vec<TransactionCandidate>,
    review_threshold: f32,
) -> Vec<ValidatedTransaction> {
    candidates
        .into_iter()
        .map(|candidate| {
            let validation = validate(&candidate, review_threshold);
            ValidatedTransaction { candidate, validation }
        })
        .collect()
}

fn check(c: &TransactionCandidate) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    if !has_date_shape(&c.date) {
        errors.push(ValidationError::DateFormat);
    } else if !dates::is_canonical(&c.date) {
        errors.push(ValidationError::DateValue);
    }

    if !c.amount.is_some_and(|a| a.is_positive()) {
        errors.push(ValidationError::Amount);
    }

    if c.txn_type.is_none() {
        errors.push(ValidationError::Direction);
    }

    if c.narration.trim().is_empty() {
        errors.push(ValidationError::EmptyNarration);
    }

    errors
}

fn has_date_shape(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 10
        && b[4] == b'-'
        && b[7] == b'-'
        && b.iter()
            .enumerate()
            .all(|(i, ch)| i == 4 || i == 7 || ch.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Money, Origin, TxnType};

    fn good() -> TransactionCandidate {
        TransactionCandidate::new(
            "2025-08-01",
            "UPI/NEFT/Ram Card",
            Some(Money::from_cents(7500)),
            Some(TxnType::Debit),
            0.95,
            Origin::Pattern { rule: "tight".to_string() },
        )
    }

    #[test]
    fn valid_candidate_passes() {
        let r = validate(&good(), REVIEW_THRESHOLD);
        assert!(r.is_valid);
        assert!(r.errors.is_empty());
        assert!(!r.needs_manual_review);
    }

    #[test]
    fn bad_shape_and_bad_value_are_distinguished() {
        let mut c = good();
        c.date = "01-08-2025".to_string();
        assert_eq!(validate(&c, REVIEW_THRESHOLD).errors, vec!["Invalid date format"]);
        c.date = "2025-02-30".to_string();
        assert_eq!(validate(&c, REVIEW_THRESHOLD).errors, vec!["Invalid date value"]);
    }

    #[test]
    fn every_failure_is_listed() {
        let c = TransactionCandidate::new(
            "",
            "   ",
            Some(Money::zero()),
            None,
            0.2,
            Origin::AiText { chunk_index: 0 },
        );
        let r = validate(&c, REVIEW_THRESHOLD);
        assert!(!r.is_valid);
        assert_eq!(r.errors.len(), 4);
        assert!(r.needs_manual_review);
    }

    #[test]
    fn missing_amount_is_invalid() {
        let mut c = good();
        c.amount = None;
        assert_eq!(validate(&c, REVIEW_THRESHOLD).errors, vec!["Invalid amount"]);
    }

    #[test]
    fn review_is_a_routing_signal_not_an_error() {
        let mut c = good();
        c.confidence = 0.49;
        let r = validate(&c, REVIEW_THRESHOLD);
        assert!(r.is_valid);
        assert!(r.needs_manual_review);
    }

    #[test]
    fn validate_all_keeps_invalid_records() {
        let mut bad = good();
        bad.narration.clear();
        let out = validate_all(vec![good(), bad], REVIEW_THRESHOLD);
        assert_eq!(out.len(), 2);
        assert!(out[0].is_saveable());
        assert!(!out[1].is_saveable());
    }
}
