// plantcare-core/src/models/record.rs
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

/// Primary key assigned by the store. Supabase uses integers, the in-memory
/// store uses UUID strings.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum RecordId {
    Int(i64),
    Text(String),
}

impl RecordId {
    /// Reads an id taken from a URL path segment.
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(n) => RecordId::Int(n),
            Err(_) => RecordId::Text(raw.to_string()),
        }
    }

    /// Whether a raw row's `id` column holds this id, regardless of whether
    /// it was stored as a number or a string.
    pub fn matches(&self, row: &Value) -> bool {
        match row.get("id") {
            Some(Value::Number(n)) => n.to_string() == self.to_string(),
            Some(Value::String(s)) => *s == self.to_string(),
            _ => false,
        }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordId::Int(n) => write!(f, "{}", n),
            RecordId::Text(s) => f.write_str(s),
        }
    }
}

const NAIVE_TIMESTAMP_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Accepts RFC 3339 and zone-less `timestamp` columns (read as UTC). Anything
/// else is dropped rather than failing the whole row.
pub(crate) fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    let Some(raw) = Option::<String>::deserialize(deserializer)? else {
        return Ok(None);
    };
    if let Ok(parsed) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(Some(parsed.with_timezone(&Utc)));
    }
    let naive = NAIVE_TIMESTAMP_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(&raw, format).ok());
    if naive.is_none() {
        tracing::warn!(value = %raw, "Ignoring unparseable timestamp");
    }
    Ok(naive.map(|n| n.and_utc()))
}

pub(crate) fn null_as_empty_string<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_path_ids() {
        assert_eq!(RecordId::parse("42"), RecordId::Int(42));
        assert_eq!(
            RecordId::parse("6f1c-aa"),
            RecordId::Text("6f1c-aa".to_string())
        );
    }

    #[test]
    fn test_matches_numeric_and_text_columns() {
        assert!(RecordId::parse("7").matches(&json!({ "id": 7 })));
        assert!(RecordId::parse("7").matches(&json!({ "id": "7" })));
        assert!(RecordId::parse("abc").matches(&json!({ "id": "abc" })));
        assert!(!RecordId::parse("8").matches(&json!({ "id": 7 })));
        assert!(!RecordId::parse("7").matches(&json!({ "name": "x" })));
    }
}
