use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Score for a narration that equals one of a rule's keywords.
pub const EXACT_KEYWORD_SCORE: f32 = 0.9;
/// Score for a narration that contains one of a rule's keywords.
pub const KEYWORD_SCORE: f32 = 0.7;

#[derive(Debug, Error)]
pub enum RulesError {
    #[error("Failed to read rules file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    Parse(String),
    #[error("Rule '{0}' has no keywords")]
    EmptyRule(String),
}

/// A keyword list for one domain category.
///
/// The rule targets the first available category whose name contains `key`
/// or one of `aliases` (case-insensitive).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRule {
    pub key: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub keywords: Vec<String>,
}

impl KeywordRule {
    pub fn new(key: &str, aliases: &[&str], keywords: &[&str]) -> Self {
        Self {
            key: key.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn targets(&self, category_name: &str) -> bool {
        let name = category_name.to_lowercase();
        name.contains(&self.key.to_lowercase())
            || self.aliases.iter().any(|a| name.contains(&a.to_lowercase()))
    }

    /// `normalized` must already be lowercase and single-spaced.
    pub fn score(&self, normalized: &str) -> Option<f32> {
        if self.keywords.iter().any(|k| normalized == k) {
            Some(EXACT_KEYWORD_SCORE)
        } else if self.keywords.iter().any(|k| contains_keyword(normalized, k)) {
            Some(KEYWORD_SCORE)
        } else {
            None
        }
    }
}

/// Keywords of this many letters or fewer only match a whole word, so `pan`
/// does not fire on "company" nor `bus` on "business".
const WHOLE_WORD_MAX_LEN: usize = 3;

fn contains_keyword(normalized: &str, keyword: &str) -> bool {
    let word = keyword.trim_matches(|c: char| !c.is_alphanumeric());
    if !word.is_empty() && word.chars().count() <= WHOLE_WORD_MAX_LEN && word.chars().all(char::is_alphanumeric) {
        normalized.split(|c: char| !c.is_alphanumeric()).any(|w| w == word)
    } else {
        normalized.contains(keyword)
    }
}

/// Ordered keyword table. Earlier rules win ties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRules {
    #[serde(rename = "rule")]
    pub rules: Vec<KeywordRule>,
}

impl KeywordRules {
    pub fn new(rules: Vec<KeywordRule>) -> Self {
        let rules = rules
            .into_iter()
            .map(|mut r| {
                r.keywords = r.keywords.iter().map(|k| k.to_lowercase()).collect();
                r
            })
            .collect();
        Self { rules }
    }

    /// ```toml
    /// [[rule]]
    /// key = "food"
    /// keywords = ["swiggy", "zomato"]
    /// ```
    pub fn from_toml(toml_content: &str) -> Result<Self, RulesError> {
        let parsed: KeywordRules =
            toml::from_str(toml_content).map_err(|e| RulesError::Parse(e.to_string()))?;
        if let Some(empty) = parsed.rules.iter().find(|r| r.keywords.is_empty()) {
            return Err(RulesError::EmptyRule(empty.key.clone()));
        }
        Ok(Self::new(parsed.rules))
    }

    pub fn from_file(path: &Path) -> Result<Self, RulesError> {
        Self::from_toml(&std::fs::read_to_string(path)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = &KeywordRule> {
        self.rules.iter()
    }
}

impl Default for KeywordRules {
    fn default() -> Self {
        Self::new(vec![
            KeywordRule::new(
                "groceries",
                &[],
                &[
                    "grocery", "supermarket", "mart", "blinkit", "zepto", "bigbasket", "dmart",
                    "ratnadeep", "more retail", "reliance fresh", "nature basket", "store",
                    "market", "dairy",
                ],
            ),
            KeywordRule::new(
                "food",
                &[],
                &[
                    "swiggy", "zomato", "restaurant", "dine", "burger", "pizza", "cafe", "coffee",
                    "starbucks", "mcdonalds", "dominos", "kfc", "subway", "sweet", "bakery",
                    "hotel", "kitchen", "eats", "food", "cold drink", "colddrink", "beverages",
                    "nashta", "bhojnalaya", "dhaba", "pan", "tea",
                ],
            ),
            KeywordRule::new(
                "travel",
                &[],
                &[
                    "ola", "uber", "rapido", "irctc", "flight", "airline", "indigo", "vistara",
                    "air india", "train", "rail", "metro", "bus", "travel", "trip", "booking",
                    "mmt", "makemytrip", "goibibo", "fuel", "petrol", "pump", "shell", "hpcl",
                    "bpcl", "ioc", "filling station", "automotive",
                ],
            ),
            KeywordRule::new(
                "utilities",
                &["bill"],
                &[
                    "electricity", "water", "gas", "dth", "mobile", "recharge", "bill", "bescom",
                    "cesc", "adani", "jio", "airtel", "vi", "bsnl", "broadband", "internet", "wifi",
                ],
            ),
            KeywordRule::new("rent", &[], &["rent", "landlord", "housing", "maintenance"]),
            KeywordRule::new("salary", &[], &["salary", "payroll", "credited by", "bonus", "stipend"]),
            KeywordRule::new(
                "shopping",
                &[],
                &[
                    "amazon", "flipkart", "myntra", "ajio", "meesho", "nykaa", "tatacliq",
                    "decathlon", "zara", "h&m", "trends", "retail", "shop", "fashion", "clothing",
                ],
            ),
            KeywordRule::new(
                "investment",
                &[],
                &[
                    "sip", "mutual fund", "mf", "insurance", "lic", "zerodha", "groww", "upstox",
                    "angel one", "ppf", "epf", "nps", "premium",
                ],
            ),
            KeywordRule::new(
                "medical",
                &["health"],
                &[
                    "pharmacy", "medical", "hospital", "clinic", "doctor", "dr.", "health", "lab",
                    "diagnostics",
                    "medplus", "apollo", "practo", "1mg",
                ],
            ),
            KeywordRule::new(
                "entertainment",
                &[],
                &[
                    "netflix", "prime", "hotstar", "spotify", "youtube", "movie", "cinema", "inox",
                    "pvr", "bookmyshow", "game", "playstation", "steam",
                ],
            ),
            KeywordRule::new(
                "transfer",
                &["money"],
                &["upi", "transfer", "sent to", "received from", "upi lite"],
            ),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_keyword_scores_higher() {
        let rule = KeywordRule::new("food", &[], &["zomato", "pizza"]);
        assert_eq!(rule.score("zomato"), Some(EXACT_KEYWORD_SCORE));
        assert_eq!(rule.score("upi/zomato/order"), Some(KEYWORD_SCORE));
        assert_eq!(rule.score("netflix"), None);
    }

    #[test]
    fn aliases_target_differently_named_categories() {
        let rules = KeywordRules::default();
        let medical = rules.iter().find(|r| r.key == "medical").unwrap();
        assert!(medical.targets("Health & Medical"));
        assert!(medical.targets("Health"));
        let transfer = rules.iter().find(|r| r.key == "transfer").unwrap();
        assert!(transfer.targets("Money Transfer"));
        assert!(transfer.targets("Send Money"));
        let utilities = rules.iter().find(|r| r.key == "utilities").unwrap();
        assert!(utilities.targets("Bills"));
        assert!(!utilities.targets("Rent"));
    }

    #[test]
    fn parses_rules_from_toml() {
        let toml = r#"
            [[rule]]
            key = "food"
            keywords = ["Zomato", "swiggy"]

            [[rule]]
            key = "transfer"
            aliases = ["money"]
            keywords = ["upi"]
        "#;
        let rules = KeywordRules::from_toml(toml).unwrap();
        assert_eq!(rules.rules.len(), 2);
        assert_eq!(rules.rules[0].keywords, vec!["zomato", "swiggy"]);
        assert_eq!(rules.rules[1].aliases, vec!["money"]);
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(matches!(KeywordRules::from_toml("[[rule]]\nkey = 3"), Err(RulesError::Parse(_))));
    }

    #[test]
    fn rejects_rule_without_keywords() {
        let err = KeywordRules::from_toml("[[rule]]\nkey = \"rent\"\nkeywords = []").unwrap_err();
        assert!(matches!(err, RulesError::EmptyRule(ref k) if k == "rent"));
    }

    #[test]
    fn short_keywords_match_whole_words_only() {
        let food = KeywordRule::new("food", &[], &["pan", "tea", "zomato"]);
        assert_eq!(food.score("upi/pan shop/881"), Some(KEYWORD_SCORE));
        assert_eq!(food.score("masala tea stall"), Some(KEYWORD_SCORE));
        assert_eq!(food.score("acme company pvt"), None);
        assert_eq!(food.score("team outing"), None);
        assert_eq!(food.score("upi/zomatoorder"), Some(KEYWORD_SCORE));

        let medical = KeywordRule::new("medical", &[], &["dr.", "h&m"]);
        assert_eq!(medical.score("upi/dr reddy clinic"), Some(KEYWORD_SCORE));
        assert_eq!(medical.score("drive in"), None);
        assert_eq!(medical.score("h&m store"), Some(KEYWORD_SCORE));
    }

    #[test]
    fn default_table_carries_short_brand_keywords() {
        let table = KeywordRules::default();
        let key_for = |narration: &str| {
            table
                .iter()
                .find(|r| r.score(narration).is_some())
                .map(|r| r.key.clone())
        };
        assert_eq!(key_for("upi/mmt/flight 0922").as_deref(), Some("travel"));
        assert_eq!(key_for("shell select hsr").as_deref(), Some("travel"));
        assert_eq!(key_for("adani electricity mumbai").as_deref(), Some("utilities"));
        assert_eq!(key_for("vi postpaid").as_deref(), Some("utilities"));
        assert_eq!(key_for("acme business services"), None);
    }

    #[test]
    fn default_table_covers_every_domain() {
        let table = KeywordRules::default();
        let keys: Vec<&str> = table.iter().map(|r| r.key.as_str()).collect();
        assert_eq!(
            keys,
            [
                "groceries", "food", "travel", "utilities", "rent", "salary", "shopping",
                "investment", "medical", "entertainment", "transfer"
            ]
        );
    }
}
