//! Two-layer free-text categorizer for ad-hoc insights. Nothing here touches
//! persisted transactions or the learning table.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::rules::RulesError;

pub const PERSONAL_TRANSFER: &str = "Personal Transfer";
pub const OTHERS: &str = "Others";

re!(re_alpha_word, r"^[a-z]+$");

/// Words that mark a payee as a business rather than a person.
const CORPORATE_WORDS: &[&str] = &[
    "pvt", "ltd", "limited", "inc", "corp", "company", "co", "llp", "services", "solutions",
    "technologies", "systems", "enterprises", "india", "international", "global", "store", "shop",
    "mart",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRule {
    pub category: String,
    pub keywords: Vec<String>,
}

impl ContentRule {
    fn new(category: &str, keywords: &[&str]) -> Self {
        Self {
            category: category.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentRulesFile {
    rule: Vec<ContentRule>,
}

struct CompiledRule {
    category: String,
    pattern: Regex,
}

pub struct ContentCategorizer {
    rules: Vec<CompiledRule>,
}

impl Default for ContentCategorizer {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl ContentCategorizer {
    /// Rules without usable keywords are skipped.
    pub fn new(rules: Vec<ContentRule>) -> Self {
        let rules = rules
            .into_iter()
            .filter_map(|rule| {
                let alternation = rule
                    .keywords
                    .iter()
                    .filter(|k| !k.trim().is_empty())
                    .map(|k| regex::escape(&k.trim().to_lowercase()))
                    .collect::<Vec<_>>();
                if alternation.is_empty() {
                    return None;
                }
                let pattern = Regex::new(&format!(r"\b(?:{})\b", alternation.join("|"))).ok()?;
                Some(CompiledRule { category: rule.category, pattern })
            })
            .collect();
        Self { rules }
    }

    pub fn from_toml(toml_content: &str) -> Result<Self, RulesError> {
        let parsed: ContentRulesFile =
            toml::from_str(toml_content).map_err(|e| RulesError::Parse(e.to_string()))?;
        Ok(Self::new(parsed.rule))
    }

    pub fn categorize(&self, text: &str) -> &str {
        let normalized = text.trim().to_lowercase();
        if normalized.is_empty() {
            return OTHERS;
        }
        if let Some(rule) = self.rules.iter().find(|r| r.pattern.is_match(&normalized)) {
            return &rule.category;
        }
        if is_personal_transfer(&normalized) {
            return PERSONAL_TRANSFER;
        }
        OTHERS
    }

    /// Every label `categorize` can return, sorted and unique.
    pub fn categories(&self) -> Vec<String> {
        let mut all: Vec<String> = self.rules.iter().map(|r| r.category.clone()).collect();
        all.push(PERSONAL_TRANSFER.to_string());
        all.push(OTHERS.to_string());
        all.sort();
        all.dedup();
        all
    }
}

/// Two to four purely alphabetic words once corporate markers are removed.
fn is_personal_transfer(normalized: &str) -> bool {
    let words: Vec<&str> = normalized
        .split_whitespace()
        .filter(|w| !CORPORATE_WORDS.contains(w))
        .collect();
    (2..=4).contains(&words.len()) && words.iter().all(|w| re_alpha_word().is_match(w))
}

fn default_rules() -> Vec<ContentRule> {
    vec![
        ContentRule::new("Electricity", &["dgvcl", "electric", "power", "mseb", "bescom", "tneb", "electricity bill"]),
        ContentRule::new(
            "Food & Dining",
            &[
                "tea time tales", "hotel", "restaurant", "cafe", "chinese", "pizza", "burger", "swiggy",
                "zomato", "dominos", "mcdonald", "kfc", "subway", "food", "dining",
            ],
        ),
        ContentRule::new("Snacks & Tobacco", &["pan center", "pan centre", "tobacco", "cigarette", "beedi"]),
        ContentRule::new(
            "Travel & Transport",
            &[
                "irctc", "rail", "railway", "flight", "bus", "uber", "ola", "rapido", "metro", "airline",
                "indigo", "spicejet", "air india",
            ],
        ),
        ContentRule::new(
            "Mobile Recharge",
            &["airtel", "vodafone", "vi", "jio", "bsnl", "recharge", "prepaid", "postpaid", "mobile"],
        ),
        ContentRule::new(
            "Fuel",
            &["petrol", "petroleum", "fuel", "hp", "bpcl", "iocl", "shell", "reliance petroleum", "diesel", "cng"],
        ),
        ContentRule::new(
            "Automobile",
            &[
                "motors", "garage", "auto", "service center", "car wash", "vehicle", "bike", "scooter",
                "tyre", "spare parts",
            ],
        ),
        ContentRule::new(
            "Shopping",
            &[
                "furnishers", "furniture", "mall", "amazon", "flipkart", "myntra", "store", "shop",
                "retail", "supermarket", "dmart", "reliance fresh", "big bazaar",
            ],
        ),
        ContentRule::new(
            "Groceries",
            &["grocery", "kirana", "vegetables", "fruits", "provisions", "general store"],
        ),
        ContentRule::new(
            "Entertainment",
            &[
                "netflix", "amazon prime", "hotstar", "spotify", "youtube", "cinema", "movie", "pvr",
                "inox", "theatre",
            ],
        ),
        ContentRule::new(
            "Healthcare",
            &[
                "hospital", "clinic", "pharmacy", "medical", "doctor", "apollo", "fortis",
                "max healthcare", "medicine", "health",
            ],
        ),
        ContentRule::new(
            "Education",
            &["school", "college", "university", "tuition", "course", "coaching", "education", "fees"],
        ),
        ContentRule::new("Insurance", &["insurance", "lic", "policy", "premium"]),
        ContentRule::new("Banking & Finance", &["bank", "atm", "loan", "emi", "credit card", "debit card"]),
        ContentRule::new("Online Services", &["google", "microsoft", "adobe", "subscription", "saas", "cloud"]),
        ContentRule::new("Rent", &["rent", "housing", "pg", "hostel"]),
        ContentRule::new("Income", &["salary", "bonus", "credit", "interest", "dividend", "refund"]),
    ]
}
