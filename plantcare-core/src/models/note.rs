// plantcare-core/src/models/note.rs

//! Calendar notes ("bitácora") attached to a day.

use crate::errors::ValidationError;
use crate::models::record::{lenient_timestamp, null_as_empty_string, RecordId};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_NOTE_TITLE: &str = "Sin título";
pub const DEFAULT_NOTE_COLOR: &str = "bg-white";
const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Note {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    #[serde(default, deserialize_with = "null_as_empty_string")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty_string")]
    pub content: String,
    #[serde(deserialize_with = "day")]
    pub date: NaiveDate,
    #[serde(default = "default_color", deserialize_with = "null_as_default_color")]
    pub color: String,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_timestamp"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

// `date` columns come back as "YYYY-MM-DD"; timestamp columns carry a time
// part that is ignored.
fn day<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
    let raw = String::deserialize(deserializer)?;
    let prefix = raw.get(..10).unwrap_or(raw.as_str());
    NaiveDate::parse_from_str(prefix, DATE_FORMAT).map_err(serde::de::Error::custom)
}

fn null_as_default_color<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(default_color))
}

fn default_color() -> String {
    DEFAULT_NOTE_COLOR.to_string()
}

/// Parses a `YYYY-MM-DD` day as sent by the calendar.
pub fn parse_day(raw: &str) -> Result<NaiveDate, ValidationError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| ValidationError::new(format!("'date' must be a YYYY-MM-DD date, got '{}'", raw)))
}

/// Body of a note creation request.
#[derive(Deserialize, Debug, Clone, Default, PartialEq)]
pub struct NewNote {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub color: Option<String>,
}

impl NewNote {
    /// Validates and builds the record to insert. A note needs a day and at
    /// least a title or some content.
    pub fn into_note(self, now: DateTime<Utc>) -> Result<Note, ValidationError> {
        let title = self.title.map(|t| t.trim().to_string()).unwrap_or_default();
        let content = self.content.unwrap_or_default();
        if title.is_empty() && content.trim().is_empty() {
            return Err(ValidationError::new("'title' or 'content' must not be empty"));
        }
        let date = parse_day(&self.date)?;
        Ok(Note {
            id: None,
            title: if title.is_empty() {
                DEFAULT_NOTE_TITLE.to_string()
            } else {
                title
            },
            content,
            date,
            color: self
                .color
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .unwrap_or_else(default_color),
            created_at: Some(now),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn new_note(value: serde_json::Value) -> NewNote {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_new_note_keeps_fields() {
        let note = new_note(json!({
            "title": "Riego",
            "content": "Regar los tomates",
            "date": "2024-05-01",
            "color": "bg-green-50"
        }))
        .into_note(Utc::now())
        .unwrap();
        assert_eq!(note.title, "Riego");
        assert_eq!(note.date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert_eq!(note.color, "bg-green-50");

        let value = serde_json::to_value(&note).unwrap();
        assert_eq!(value["date"], "2024-05-01");
        assert!(value.get("id").is_none());
    }

    #[test]
    fn test_new_note_defaults_title_and_color() {
        let note = new_note(json!({ "content": "abonar", "date": "2024-05-01" }))
            .into_note(Utc::now())
            .unwrap();
        assert_eq!(note.title, DEFAULT_NOTE_TITLE);
        assert_eq!(note.color, DEFAULT_NOTE_COLOR);
    }

    #[test]
    fn test_new_note_requires_title_or_content() {
        let err = new_note(json!({ "title": "  ", "content": "", "date": "2024-05-01" }))
            .into_note(Utc::now())
            .unwrap_err();
        assert!(err.0.contains("'title' or 'content'"));
    }

    #[test]
    fn test_new_note_rejects_bad_date() {
        for date in ["", "01/05/2024", "2024-13-01"] {
            let err = new_note(json!({ "title": "x", "date": date }))
                .into_note(Utc::now())
                .unwrap_err();
            assert!(err.0.contains("'date'"), "{}", err);
        }
    }

    #[test]
    fn test_stored_note_tolerates_nulls_and_timestamps() {
        let note: Note = serde_json::from_value(json!({
            "id": 3,
            "title": null,
            "content": null,
            "date": "2024-05-01T00:00:00",
            "color": null,
            "created_at": "2024-05-01 08:30:00"
        }))
        .unwrap();
        assert_eq!(note.id, Some(RecordId::Int(3)));
        assert!(note.title.is_empty());
        assert_eq!(note.color, DEFAULT_NOTE_COLOR);
        assert_eq!(note.date, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap());
        assert!(note.created_at.is_some());
    }
}
