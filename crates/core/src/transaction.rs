use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::category::CategoryAssignment;
use super::money::Money;
use super::validate::ValidationResult;

/// Direction of a statement line. Expense/income are accepted as synonyms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxnType {
    Debit,
    Credit,
}

impl TxnType {
    /// The kind of category a transaction of this direction is filed under.
    pub fn category_kind(self) -> crate::CategoryKind {
        match self {
            TxnType::Debit => crate::CategoryKind::Expense,
            TxnType::Credit => crate::CategoryKind::Income,
        }
    }
}

impl fmt::Display for TxnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxnType::Debit => write!(f, "debit"),
            TxnType::Credit => write!(f, "credit"),
        }
    }
}

impl FromStr for TxnType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().trim_matches(|c| c == '(' || c == ')').to_lowercase().as_str() {
            "dr" | "debit" | "expense" | "withdrawal" | "paid" | "sent" => Ok(TxnType::Debit),
            "cr" | "credit" | "income" | "deposit" | "received" => Ok(TxnType::Credit),
            other => Err(format!("Unknown debit/credit marker: '{other}'")),
        }
    }
}

/// Which extractor produced a candidate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum Origin {
    Pattern { rule: String },
    AiText { chunk_index: usize },
    AiVision { batch_index: usize },
}

/// Non-fatal observations recorded while a candidate was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateFlag {
    /// Two plausible amount/balance readings existed and the balance trail could not settle it.
    AmbiguousAmount,
    /// The configured amount/balance order was overridden by the running balance.
    AmountOrderCorrected,
    /// Day and month were both ≤ 12 and the configured order was applied.
    AmbiguousDate,
    /// The date could not be read and was kept as printed.
    UnparsedDate,
    /// Digits were recovered from OCR-confusable characters.
    RepairedAmount,
    /// The direction was not recognized and defaulted to debit.
    DefaultedType,
    /// The date was taken from the preceding line.
    BorrowedDate,
}

/// One extracted statement line on its way through the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionCandidate {
    /// `YYYY-MM-DD` once canonicalized; otherwise the text as printed.
    pub date: String,
    pub narration: String,
    pub amount: Option<Money>,
    pub txn_type: Option<TxnType>,
    pub balance: Option<Money>,
    pub confidence: f32,
    pub raw: String,
    pub transaction_id: Option<String>,
    pub account: Option<String>,
    pub time: Option<String>,
    pub origin: Origin,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<CandidateFlag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<CategoryAssignment>,
}

impl TransactionCandidate {
    pub fn new(
        date: impl Into<String>,
        narration: impl Into<String>,
        amount: Option<Money>,
        txn_type: Option<TxnType>,
        confidence: f32,
        origin: Origin,
    ) -> Self {
        Self {
            date: date.into(),
            narration: narration.into(),
            amount,
            txn_type,
            balance: None,
            confidence: confidence.clamp(0.0, 1.0),
            raw: String::new(),
            transaction_id: None,
            account: None,
            time: None,
            origin,
            flags: Vec::new(),
            category: None,
        }
    }

    pub fn with_balance(mut self, balance: Option<Money>) -> Self {
        self.balance = balance;
        self
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = raw.into();
        self
    }

    pub fn flag(&mut self, flag: CandidateFlag) {
        if !self.flags.contains(&flag) {
            self.flags.push(flag);
        }
    }

    pub fn has_flag(&self, flag: CandidateFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// Lower the confidence to at most `ceiling`; never raises it.
    pub fn cap_confidence(&mut self, ceiling: f32) {
        self.confidence = self.confidence.min(ceiling.clamp(0.0, 1.0));
    }

    pub fn scale_confidence(&mut self, factor: f32) {
        self.confidence = (self.confidence * factor.clamp(0.0, 1.0)).clamp(0.0, 1.0);
    }
}

/// A candidate paired with its validation outcome. Invalid records are kept so
/// the caller can surface or queue them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedTransaction {
    #[serde(flatten)]
    pub candidate: TransactionCandidate,
    pub validation: ValidationResult,
}

impl ValidatedTransaction {
    pub fn is_saveable(&self) -> bool {
        self.validation.is_valid && !self.validation.needs_manual_review
    }
}
