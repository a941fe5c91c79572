//! Line-level statement parsing with an ordered rule list.
//!
//! Rules are tried in order and the first match wins for a line:
//!
//! | rule         | shape                                                   | confidence |
//! |--------------|---------------------------------------------------------|-----------:|
//! | `tight`      | date, narration, reference, two tagged amounts          | 0.95 |
//! | `compact`    | the same with no whitespace between the columns         | 0.80 |
//! | `loose`      | date, narration, two bare numbers                       | 0.85 |
//! | `year_first` | `YYYY-MM-DD`, narration, one tagged amount, balance     | 0.95 |
//! | `anchor`     | payment-rail narration, amount; date on the line above  | 0.75 |
//!
//! Which of two numbers is the amount is decided by [`AmountOrder`] and then
//! checked against the running balance carried from the previous line.

use passbook_core::{
    parse_statement_date, CandidateFlag, DateOrder, Money, Origin, TransactionCandidate, TxnType,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::normalize::NormalizedText;

const DATE: &str = r"(\d{2}-\d{2}-\d{4}|\d{4}-\d{2}-\d{2})";
const AMT: &str = r"(\d[\d,]*(?:\.\d{1,2})?)";

pub const TIGHT_CONFIDENCE: f32 = 0.95;
pub const COMPACT_CONFIDENCE: f32 = 0.80;
pub const LOOSE_CONFIDENCE: f32 = 0.85;
pub const YEAR_FIRST_CONFIDENCE: f32 = 0.95;
pub const ANCHOR_CONFIDENCE: f32 = 0.75;
/// Ceiling for candidates whose amount/balance split is unresolved.
pub const AMBIGUOUS_CONFIDENCE: f32 = 0.45;

re!(re_tight, &format!(
    r"(?i)^{DATE}\s+(.+?)\s+([A-Za-z0-9-]*\d[A-Za-z0-9-]*)\s+{AMT}\s*\(?(Dr|Cr)\)?\s+{AMT}\s*\(?(Dr|Cr)\)?"
));
re!(re_compact, &format!(r"(?i)^{DATE}(.+?){AMT}\((Dr|Cr)\){AMT}\((Dr|Cr)\)"));
re!(re_loose, &format!(r"(?i)^{DATE}\s+(.+?)\s+{AMT}\s+{AMT}\s*$"));
re!(re_year_first, &format!(
    r"(?i)^(\d{{4}}-\d{{2}}-\d{{2}})\s+(.+?)\s+{AMT}\s*\(?(Dr|Cr)\)?\s+{AMT}"
));
re!(re_anchor, &format!(
    r"(?i)\b(UPI|NEFT|IMPS|RTGS)/(.+?)\s+{AMT}(?:\s*\(?(Dr|Cr)\)?)?(?:\s|$)"
));
re!(re_date_only, &format!(r"^{DATE}$"));
re!(re_amount, AMT);
re!(re_leading_date, r"^(\d{2}-\d{2}-\d{4}|\d{4}-\d{2}-\d{2})");
re!(re_debit_words, r"(?i)debit|withdrawal|payment|transfer|upi.*to");
re!(re_header,
    r"(?i)^(date\b.*\b(narration|particulars|description)\b|period\s*:|account\s+(no|number)\b|branch\b|statement\s+of\s+account|closing\s+balance\b)");
re!(re_opening_balance, r"(?i)\bopening\s+balance\b");

/// Which of two numbers on a line the statement prints first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmountOrder {
    #[default]
    AmountFirst,
    BalanceFirst,
}

/// Per-source layout settings for the pattern tier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternProfile {
    pub amount_order: AmountOrder,
    pub date_order: DateOrder,
    /// Compact-rule amounts above this are merged digit runs and are dropped.
    pub max_amount: Money,
    pub min_line_len: usize,
}

impl Default for PatternProfile {
    fn default() -> Self {
        Self {
            amount_order: AmountOrder::AmountFirst,
            date_order: DateOrder::DayFirst,
            max_amount: Money::from_cents(100_000_000),
            min_line_len: 20,
        }
    }
}

/// One way of reading a two-number line.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Reading {
    amount: Money,
    direction: TxnType,
    balance: Money,
}

#[derive(Debug, Clone, PartialEq)]
struct Resolved {
    reading: Reading,
    flags: Vec<CandidateFlag>,
    ambiguous: bool,
}

pub struct PatternExtractor {
    profile: PatternProfile,
}

impl Default for PatternExtractor {
    fn default() -> Self {
        Self::new(PatternProfile::default())
    }
}

impl PatternExtractor {
    pub fn new(profile: PatternProfile) -> Self {
        Self { profile }
    }

    pub fn profile(&self) -> &PatternProfile {
        &self.profile
    }

    pub fn parse(&self, text: &str) -> Vec<TransactionCandidate> {
        self.parse_flagging(text, &[])
    }

    /// Parse normalizer output. Candidates dated from a line whose date the
    /// normalizer could only resolve by the configured order are flagged
    /// [`CandidateFlag::AmbiguousDate`].
    pub fn parse_normalized(&self, normalized: &NormalizedText) -> Vec<TransactionCandidate> {
        self.parse_flagging(&normalized.text, &normalized.ambiguous_lines)
    }

    fn parse_flagging(&self, text: &str, ambiguous_lines: &[usize]) -> Vec<TransactionCandidate> {
        let lines: Vec<&str> = text.lines().map(str::trim).collect();
        let mut out = Vec::new();
        let mut prev_balance: Option<Money> = None;
        let mut started = false;

        for (i, line) in lines.iter().enumerate() {
            if re_opening_balance().is_match(line) {
                if let Some(b) = re_amount()
                    .find_iter(line)
                    .last()
                    .and_then(|m| Money::parse(m.as_str()))
                {
                    debug!(balance = %b, "Opening balance");
                    prev_balance = Some(b);
                }
                started = true;
                continue;
            }
            if !started {
                if !re_leading_date().is_match(line) {
                    continue;
                }
                started = true;
            }
            if line.chars().count() < self.profile.min_line_len || re_header().is_match(line) {
                continue;
            }

            let prev_line = i.checked_sub(1).map(|j| lines[j]);
            if let Some(mut candidate) = self.parse_line(line, prev_line, prev_balance) {
                let date_line = if candidate.has_flag(CandidateFlag::BorrowedDate) { i.checked_sub(1) } else { Some(i) };
                if date_line.is_some_and(|j| ambiguous_lines.contains(&j)) {
                    candidate.flag(CandidateFlag::AmbiguousDate);
                }
                if candidate.balance.is_some() {
                    prev_balance = candidate.balance;
                }
                out.push(candidate);
            }
        }

        info!(lines = lines.len(), extracted = out.len(), "Pattern tier finished");
        out
    }

    fn parse_line(
        &self,
        line: &str,
        prev_line: Option<&str>,
        prev_balance: Option<Money>,
    ) -> Option<TransactionCandidate> {
        if let Some(c) = re_tight().captures(line) {
            let first = Reading {
                amount: Money::parse(&c[4])?,
                direction: c[5].parse().ok()?,
                balance: Money::parse(&c[6])?,
            };
            let second = Reading {
                amount: first.balance,
                direction: c[7].parse().ok()?,
                balance: first.amount,
            };
            let resolved = self.resolve(first, second, prev_balance, line);
            let mut candidate = self.build(&c[1], &c[2], resolved, TIGHT_CONFIDENCE, "tight", line);
            candidate.transaction_id = Some(c[3].to_string());
            return Some(candidate);
        }

        if let Some(c) = re_compact().captures(line) {
            let first = Reading {
                amount: Money::parse(&c[3])?,
                direction: c[4].parse().ok()?,
                balance: Money::parse(&c[5])?,
            };
            let second = Reading {
                amount: first.balance,
                direction: c[6].parse().ok()?,
                balance: first.amount,
            };
            let resolved = self.resolve(first, second, prev_balance, line);
            if resolved.reading.amount > self.profile.max_amount {
                debug!(amount = %resolved.reading.amount, line, "Compact amount out of bounds, dropped");
                return None;
            }
            return Some(self.build(&c[1], &c[2], resolved, COMPACT_CONFIDENCE, "compact", line));
        }

        if let Some(c) = re_loose().captures(line) {
            let narration = &c[2];
            let direction = if re_debit_words().is_match(narration) {
                TxnType::Debit
            } else {
                TxnType::Credit
            };
            let a = Money::parse(&c[3])?;
            let b = Money::parse(&c[4])?;
            let first = Reading { amount: a, direction, balance: b };
            let second = Reading { amount: b, direction, balance: a };
            let resolved = self.resolve(first, second, prev_balance, line);
            return Some(self.build(&c[1], narration, resolved, LOOSE_CONFIDENCE, "loose", line));
        }

        if let Some(c) = re_year_first().captures(line) {
            let resolved = Resolved {
                reading: Reading {
                    amount: Money::parse(&c[3])?,
                    direction: c[4].parse().ok()?,
                    balance: Money::parse(&c[5])?,
                },
                flags: Vec::new(),
                ambiguous: false,
            };
            return Some(self.build(&c[1], &c[2], resolved, YEAR_FIRST_CONFIDENCE, "year_first", line));
        }

        self.parse_anchor(line, prev_line)
    }

    /// Narration-anchor rule: looks exactly one line back for a date-only line.
    fn parse_anchor(&self, line: &str, prev_line: Option<&str>) -> Option<TransactionCandidate> {
        if re_leading_date().is_match(line) {
            return None;
        }
        let date = prev_line.filter(|p| re_date_only().is_match(p))?;
        let c = re_anchor().captures(line)?;

        let narration = format!("{}/{}", &c[1], c[2].trim());
        let amount = Money::parse(&c[3])?;
        let direction = c
            .get(4)
            .and_then(|m| m.as_str().parse().ok())
            .unwrap_or(TxnType::Debit);

        let (date, date_flag) = self.read_date(date);
        let mut candidate = TransactionCandidate::new(
            date,
            narration,
            Some(amount),
            Some(direction),
            ANCHOR_CONFIDENCE,
            Origin::Pattern { rule: "anchor".to_string() },
        )
        .with_raw(format!("{} {line}", prev_line.unwrap_or_default()));
        candidate.flag(CandidateFlag::BorrowedDate);
        if let Some(flag) = date_flag {
            candidate.flag(flag);
        }
        Some(candidate)
    }

    /// Pick between the configured reading and its swap using the running balance.
    fn resolve(&self, first: Reading, second: Reading, prev_balance: Option<Money>, line: &str) -> Resolved {
        let (chosen, alternate) = match self.profile.amount_order {
            AmountOrder::AmountFirst => (first, second),
            AmountOrder::BalanceFirst => (second, first),
        };

        match prev_balance {
            Some(prev) if reconciles(prev, &chosen) => Resolved { reading: chosen, flags: Vec::new(), ambiguous: false },
            Some(prev) if reconciles(prev, &alternate) => {
                debug!(line, "Running balance contradicts amount order, swapped");
                Resolved {
                    reading: alternate,
                    flags: vec![CandidateFlag::AmountOrderCorrected],
                    ambiguous: false,
                }
            }
            Some(prev) => {
                warn!(previous = %prev, line, "Neither amount reading reconciles with running balance");
                Resolved {
                    reading: chosen,
                    flags: vec![CandidateFlag::AmbiguousAmount],
                    ambiguous: true,
                }
            }
            None if chosen.amount > chosen.balance => {
                warn!(line, "Amount exceeds balance with no running balance to confirm order");
                Resolved {
                    reading: chosen,
                    flags: vec![CandidateFlag::AmbiguousAmount],
                    ambiguous: true,
                }
            }
            None => Resolved { reading: chosen, flags: Vec::new(), ambiguous: false },
        }
    }

    fn build(
        &self,
        date: &str,
        narration: &str,
        resolved: Resolved,
        confidence: f32,
        rule: &str,
        line: &str,
    ) -> TransactionCandidate {
        let (date, date_flag) = self.read_date(date);
        let mut candidate = TransactionCandidate::new(
            date,
            narration.split_whitespace().collect::<Vec<_>>().join(" "),
            Some(resolved.reading.amount),
            Some(resolved.reading.direction),
            confidence,
            Origin::Pattern { rule: rule.to_string() },
        )
        .with_balance(Some(resolved.reading.balance))
        .with_raw(line);

        for flag in resolved.flags.into_iter().chain(date_flag) {
            candidate.flag(flag);
        }
        if resolved.ambiguous {
            candidate.cap_confidence(AMBIGUOUS_CONFIDENCE);
        }
        candidate
    }

    fn read_date(&self, token: &str) -> (String, Option<CandidateFlag>) {
        match parse_statement_date(token, self.profile.date_order) {
            Some(r) if r.is_ambiguous() => (r.canonical(), Some(CandidateFlag::AmbiguousDate)),
            Some(r) => (r.canonical(), None),
            None => (token.to_string(), Some(CandidateFlag::UnparsedDate)),
        }
    }
}

/// Out-of-range arithmetic counts as not reconciling.
fn reconciles(prev: Money, r: &Reading) -> bool {
    let expected = match r.direction {
        TxnType::Debit => prev.checked_sub(r.amount),
        TxnType::Credit => prev.checked_add(r.amount),
    };
    expected
        .and_then(|e| e.abs_diff(r.balance))
        .is_some_and(|diff| diff <= Money::from_cents(1))
}
