//! Lenient decoding of model output into loosely typed transaction records.
//!
//! Models wrap JSON in fences, return an object instead of an array, send
//! numbers as strings, and use different field names for the same thing.
//! All of that is absorbed here; anything still unreadable is an error the
//! caller turns into an empty result.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::client::AiError;

/// One transaction as the model reported it, before any repair.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct RawTransaction {
    #[serde(default, deserialize_with = "loose_string")]
    pub date: Option<String>,
    #[serde(default, alias = "description", deserialize_with = "loose_string")]
    pub narration: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub amount: Option<String>,
    #[serde(default, alias = "debit_credit", alias = "type", deserialize_with = "loose_string")]
    pub txn_type: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub balance: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub raw: Option<String>,
    #[serde(default, deserialize_with = "loose_f32")]
    pub confidence: Option<f32>,
    #[serde(default, deserialize_with = "loose_string")]
    pub time: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub transaction_id: Option<String>,
    #[serde(default, deserialize_with = "loose_string")]
    pub account: Option<String>,
}

fn loose_string<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn loose_f32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f32>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::Number(n)) => n.as_f64().map(|f| f as f32),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    })
}

/// Remove markdown code fences anywhere in the text.
pub fn strip_fences(text: &str) -> String {
    text.replace("```json", "").replace("```JSON", "").replace("```", "").trim().to_string()
}

/// Parse model output into records. Accepts a bare array or an object with a
/// `transactions` array. Elements that are not objects, or that fail to
/// decode, are skipped.
pub fn parse_transactions(text: &str) -> Result<Vec<RawTransaction>, AiError> {
    let cleaned = strip_fences(text);
    let json = outermost_json(&cleaned).ok_or_else(|| AiError::Malformed(preview(&cleaned)))?;
    let value: Value = serde_json::from_str(json).map_err(|e| AiError::Malformed(e.to_string()))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("transactions") {
            Some(Value::Array(items)) => items,
            _ => return Err(AiError::Malformed("object without a transactions array".to_string())),
        },
        other => return Err(AiError::Malformed(format!("unexpected JSON value: {other}"))),
    };

    Ok(items
        .into_iter()
        .filter(Value::is_object)
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

/// The slice from the first `[` or `{` to the matching last `]` or `}`.
fn outermost_json(text: &str) -> Option<&str> {
    let start = text.find(['[', '{'])?;
    let close = if text[start..].starts_with('[') { ']' } else { '}' };
    let end = text.rfind(close)?;
    (end > start).then(|| &text[start..=end])
}

fn preview(text: &str) -> String {
    text.chars().take(80).collect()
}
