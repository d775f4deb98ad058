//! Structured result cards attached to bot replies.
//!
//! The backend sends these as a loosely typed `data` object discriminated by
//! its `type` field. They are decoded here into a closed sum type; anything
//! that does not match one of the four shapes is dropped so the rest of the
//! client never has to handle an open-ended value.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// A lodging search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accommodation {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub address: String,
    /// Nightly price in `currency`.
    pub price: f64,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    /// Star class, 0 to 5.
    #[serde(default, deserialize_with = "star_class")]
    pub stars: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_in: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub check_out: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guests: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Restaurant {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub address: String,
    pub cuisine: String,
    /// Free-form label such as `₩₩` or `10,000-20,000원`.
    pub price_range: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// A point of interest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub category: Vec<String>,
    /// Entrance fee in `currency`, absent when free or unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fee: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrencyConversion {
    pub from: String,
    pub to: String,
    pub amount: f64,
    pub converted: f64,
    pub rate: f64,
    /// Quote time as sent by the backend (ISO 8601, zone optional).
    pub timestamp: String,
}

/// Discriminant of a [`Payload`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    Accommodations,
    Restaurants,
    Places,
    Currency,
}

impl PayloadKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PayloadKind::Accommodations => "accommodations",
            PayloadKind::Restaurants => "restaurants",
            PayloadKind::Places => "places",
            PayloadKind::Currency => "currency",
        }
    }
}

/// Structured data carried by a bot reply. Serializes to the backend's
/// `{ "type": ..., ... }` wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Payload {
    Accommodations {
        #[serde(deserialize_with = "records")]
        results: Vec<Accommodation>,
    },
    Restaurants {
        #[serde(deserialize_with = "records")]
        results: Vec<Restaurant>,
    },
    Places {
        #[serde(deserialize_with = "records")]
        results: Vec<Place>,
    },
    Currency(CurrencyConversion),
}

impl Payload {
    pub fn kind(&self) -> PayloadKind {
        match self {
            Payload::Accommodations { .. } => PayloadKind::Accommodations,
            Payload::Restaurants { .. } => PayloadKind::Restaurants,
            Payload::Places { .. } => PayloadKind::Places,
            Payload::Currency(_) => PayloadKind::Currency,
        }
    }

    /// Decode a raw `data` object. Unknown kinds and mismatched shapes yield
    /// `None`; the reply text is still shown by the caller.
    pub fn from_value(value: Value) -> Option<Self> {
        if value.is_null() {
            return None;
        }
        let tag = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("<missing>")
            .to_string();

        match serde_json::from_value::<Payload>(value) {
            Ok(payload) => Some(payload),
            Err(e) => {
                tracing::warn!(kind = %tag, error = %e, "ignoring unrecognized reply data");
                None
            }
        }
    }
}

/// Star classes arrive as integers or integral floats; anything outside 0-5
/// is clamped and a missing or null value reads as 0.
fn star_class<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let stars = Option::<f64>::deserialize(deserializer)?.unwrap_or(0.0);
    if stars.is_nan() {
        return Ok(0);
    }
    Ok(stars.clamp(0.0, 5.0) as u8)
}

/// Decodes a result list record by record; a malformed record costs only its
/// own card.
fn records<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let values = Vec::<Value>::deserialize(deserializer)?;
    Ok(values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(index, error = %e, "dropping malformed result record");
                None
            }
        })
        .collect())
}

/// `deserialize_with` helper: reads any JSON value and keeps it only if it is
/// a valid payload, so a bad card never invalidates the surrounding record.
pub(crate) fn lenient<'de, D>(deserializer: D) -> Result<Option<Payload>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(Payload::from_value))
}
