use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::api::ApiError;
use crate::utils::format_number;

/// A plant record as returned by the server.
///
/// Known fields are read leniently: a wrong-typed or malformed value
/// becomes empty rather than failing the whole list. Fields the client
/// does not know about are kept in `extra` so that a record can be passed
/// back unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plant {
    #[serde(
        rename = "_id",
        default,
        deserialize_with = "lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub object_id: Option<String>,
    #[serde(
        rename = "id",
        default,
        deserialize_with = "lenient_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub plain_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub description: String,
    #[serde(rename = "wateringFrequency", default, deserialize_with = "lenient_number")]
    pub watering_frequency: Option<f64>,
    #[serde(
        rename = "createdAt",
        default,
        deserialize_with = "lenient_timestamp",
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// Ids arrive as strings, numbers, or Mongo extended JSON `{"$oid": "..."}`.
fn lenient_id<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("$oid").and_then(Value::as_str).map(str::to_string),
        _ => None,
    })
}

fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    })
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_frequency(&s).ok(),
        _ => None,
    })
}

// RFC 3339, a bare `YYYY-MM-DD`, or epoch milliseconds.
fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
                    .map(|dt| dt.and_utc())
            }),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    })
}

impl Plant {
    /// Record identifier; servers send either `_id` or `id`.
    pub fn id(&self) -> Option<&str> {
        self.object_id.as_deref().or(self.plain_id.as_deref())
    }

    pub fn frequency_display(&self) -> String {
        match self.watering_frequency {
            Some(freq) => format_number(freq),
            None => "-".to_string(),
        }
    }

    pub fn created_display(&self) -> String {
        match self.created_at {
            Some(at) => at.format("%b %d, %Y").to_string(),
            None => "Unknown".to_string(),
        }
    }
}

/// Outgoing create/update payload. Only constructible with a valid frequency.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlantDraft {
    pub title: String,
    pub description: String,
    #[serde(rename = "wateringFrequency", serialize_with = "serialize_js_number")]
    pub watering_frequency: f64,
}

impl PlantDraft {
    pub fn new(title: &str, description: &str, frequency: &str) -> Result<Self, ApiError> {
        Ok(Self {
            title: title.to_string(),
            description: description.to_string(),
            watering_frequency: parse_frequency(frequency)?,
        })
    }
}

/// Parse a watering frequency entered as text.
pub fn parse_frequency(input: &str) -> Result<f64, ApiError> {
    let invalid = || ApiError::Validation("Watering frequency must be a valid number".to_string());
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid());
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(invalid()),
    }
}

// Whole numbers go out as JSON integers (3, not 3.0).
fn serialize_js_number<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        serializer.serialize_i64(*value as i64)
    } else {
        serializer.serialize_f64(*value)
    }
}
