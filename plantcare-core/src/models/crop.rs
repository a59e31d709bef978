// plantcare-core/src/models/crop.rs
use crate::errors::ValidationError;
use crate::models::record::{lenient_timestamp, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub const DEFAULT_STATUS: &str = "Iniciando";
pub const DEFAULT_STATUS_COLOR: &str = "bg-yellow-400";

/// A crop record as stored and as returned by the API.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Crop {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<RecordId>,
    pub name: String,
    pub location: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub plantas: Vec<String>,
    #[serde(rename = "deviceId", default)]
    pub device_id: Option<String>,
    #[serde(default = "default_status", deserialize_with = "null_as_default_status")]
    pub status: String,
    #[serde(
        rename = "statusColor",
        default = "default_status_color",
        deserialize_with = "null_as_default_status_color"
    )]
    pub status_color: String,
    #[serde(rename = "imageUrl", default)]
    pub image_url: Option<String>,
    // Telemetry placeholders, filled once a device reports.
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub light: Option<f64>,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "lenient_timestamp"
    )]
    pub created_at: Option<DateTime<Utc>>,
}

// Rows created outside the API may hold NULL in the array column.
fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

fn null_as_default_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_status))
}

fn null_as_default_status_color<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<String, D::Error> {
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_else(default_status_color))
}

fn default_status() -> String {
    DEFAULT_STATUS.to_string()
}

fn default_status_color() -> String {
    DEFAULT_STATUS_COLOR.to_string()
}

/// Body of a crop creation request. Accepts both the wizard's Spanish field
/// names and the modal's English ones.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct NewCrop {
    #[serde(alias = "name", default)]
    pub nombre: String,
    #[serde(alias = "location", default)]
    pub ubicacion: String,
    #[serde(default)]
    pub plantas: Vec<String>,
    #[serde(rename = "deviceId", default)]
    pub device_id: Option<String>,
    #[serde(rename = "imageUrl", default)]
    pub image_url: Option<String>,
}

impl NewCrop {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.nombre.trim().is_empty() {
            return Err(ValidationError::new("'nombre' must not be empty"));
        }
        if self.ubicacion.trim().is_empty() {
            return Err(ValidationError::new("'ubicacion' must not be empty"));
        }
        if self.plantas.iter().any(|p| p.trim().is_empty()) {
            return Err(ValidationError::new("'plantas' must not contain empty names"));
        }
        Ok(())
    }

    /// Validates and builds the record to insert, with default status and
    /// empty telemetry. The id is left to the store.
    pub fn into_crop(self, now: DateTime<Utc>) -> Result<Crop, ValidationError> {
        self.validate()?;
        let device_id = self.device_id.filter(|d| !d.trim().is_empty());
        let image_url = self.image_url.filter(|u| !u.trim().is_empty());
        Ok(Crop {
            id: None,
            name: self.nombre.trim().to_string(),
            location: self.ubicacion.trim().to_string(),
            plantas: self.plantas.into_iter().map(|p| p.trim().to_string()).collect(),
            device_id,
            status: default_status(),
            status_color: default_status_color(),
            image_url,
            humidity: None,
            temperature: None,
            light: None,
            created_at: Some(now),
        })
    }
}
