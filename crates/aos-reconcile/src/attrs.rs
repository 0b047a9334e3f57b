//! Kind-specific creation attributes.
//!
//! Attributes arrive as the raw JSON object sent by the source system and are
//! only validated when a new row is about to be created. An existing entity
//! never has its attributes re-read, so a malformed date on a known external
//! id is not an error.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{EntityKind, ReconcileError};

/// Raw attribute bag as sent by the source system (camelCase keys).
pub type Attributes = Map<String, Value>;

/// Date format used by the source system.
pub const SOURCE_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Canonical stored representation.
pub const CANONICAL_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ---------------------------------------------------------------------------
// Typed attributes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAttrs {
    #[serde(with = "canonical")]
    pub start_date: NaiveDateTime,
    #[serde(with = "canonical")]
    pub end_date: NaiveDateTime,
    /// Surrogate id of the owning advertiser.
    pub advertiser_id: i64,
    pub salesperson_email_id: String,
    pub salesperson_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemAttrs {
    #[serde(with = "canonical")]
    pub start_date: NaiveDateTime,
    #[serde(with = "canonical")]
    pub end_date: NaiveDateTime,
    pub cost_method: String,
    pub quantity: i64,
    pub unit_cost: f64,
}

/// Validated attributes captured when a row is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CreateAttrs {
    Advertiser,
    Order(OrderAttrs),
    LineItem(LineItemAttrs),
}

impl CreateAttrs {
    pub fn kind(&self) -> EntityKind {
        match self {
            CreateAttrs::Advertiser => EntityKind::Advertiser,
            CreateAttrs::Order(_) => EntityKind::Order,
            CreateAttrs::LineItem(_) => EntityKind::LineItem,
        }
    }

    /// Validate the raw bag for `kind`.
    pub fn from_attributes(kind: EntityKind, attrs: &Attributes) -> Result<Self, ReconcileError> {
        match kind {
            EntityKind::Advertiser => Ok(CreateAttrs::Advertiser),
            EntityKind::Order => Ok(CreateAttrs::Order(OrderAttrs {
                start_date: required_datetime(attrs, "startDate")?,
                end_date: required_datetime(attrs, "endDate")?,
                advertiser_id: required_i64(attrs, "advertiserId")?,
                salesperson_email_id: required_string(attrs, "salesPersonEmailId")?,
                salesperson_name: required_string(attrs, "salesPersonName")?,
            })),
            EntityKind::LineItem => Ok(CreateAttrs::LineItem(LineItemAttrs {
                start_date: required_datetime(attrs, "startDate")?,
                end_date: required_datetime(attrs, "endDate")?,
                cost_method: required_string(attrs, "costType")?,
                quantity: required_i64(attrs, "quantity")?,
                unit_cost: required_f64(attrs, "unitCost")?,
            })),
        }
    }
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Parse a `YYYY-MM-DD HH:MM` source timestamp. Surrounding whitespace is
/// malformed input.
pub fn parse_source_datetime(field: &'static str, raw: &str) -> Result<NaiveDateTime, ReconcileError> {
    NaiveDateTime::parse_from_str(raw, SOURCE_DATETIME_FORMAT).map_err(|e| {
        ReconcileError::validation(field, raw, format!("expected {SOURCE_DATETIME_FORMAT}: {e}"))
    })
}

/// Render in the canonical `YYYY-MM-DD HH:MM:SS` form.
pub fn canonical_datetime(dt: &NaiveDateTime) -> String {
    dt.format(CANONICAL_DATETIME_FORMAT).to_string()
}

/// Serde adapter: dates in records render as `YYYY-MM-DD HH:MM:SS`.
mod canonical {
    use chrono::NaiveDateTime;
    use serde::{de, Deserialize, Deserializer, Serializer};

    use super::CANONICAL_DATETIME_FORMAT;

    pub fn serialize<S: Serializer>(dt: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&dt.format(CANONICAL_DATETIME_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, CANONICAL_DATETIME_FORMAT).map_err(de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Field extraction
// ---------------------------------------------------------------------------

fn required<'a>(attrs: &'a Attributes, field: &'static str) -> Result<&'a Value, ReconcileError> {
    match attrs.get(field) {
        None | Some(Value::Null) => Err(ReconcileError::MissingField { field }),
        Some(v) => Ok(v),
    }
}

fn required_string(attrs: &Attributes, field: &'static str) -> Result<String, ReconcileError> {
    match required(attrs, field)? {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(ReconcileError::validation(field, other.to_string(), "expected a string")),
    }
}

fn required_datetime(attrs: &Attributes, field: &'static str) -> Result<NaiveDateTime, ReconcileError> {
    match required(attrs, field)? {
        Value::String(s) => parse_source_datetime(field, s),
        other => Err(ReconcileError::validation(
            field,
            other.to_string(),
            format!("expected a {SOURCE_DATETIME_FORMAT} string"),
        )),
    }
}

/// Integers may arrive as JSON numbers or numeric strings.
fn required_i64(attrs: &Attributes, field: &'static str) -> Result<i64, ReconcileError> {
    let v = required(attrs, field)?;
    let parsed = match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && f.abs() < 9.0e15).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| ReconcileError::validation(field, value_text(v), "expected an integer"))
}

fn required_f64(attrs: &Attributes, field: &'static str) -> Result<f64, ReconcileError> {
    let v = required(attrs, field)?;
    let parsed = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|f| f.is_finite())
        .ok_or_else(|| ReconcileError::validation(field, value_text(v), "expected a number"))
}

fn value_text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
