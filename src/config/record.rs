//! Durable window configuration record
//!
//! Records are decoded once at load time from raw JSON. Geometry fields accept
//! integers, floats and numeric strings so older files keep loading; unknown
//! fields are carried in `extra` and written back untouched. A known field with
//! an unusable value is dropped, never kept in `extra`, so it cannot shadow the
//! typed field when the record is written back.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::warn;

use crate::error::ValidationError;
use crate::types::Geometry;

const REQUIRED_FIELDS: [&str; 6] = ["title", "process", "x", "y", "width", "height"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigRecord {
    pub title: String,
    pub process: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_name: Option<String>,
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_file: Option<String>,
    pub created_at: f64,
    pub updated_at: f64,
    /// Icon lookup hint only; never part of identity
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Seconds since the epoch with millisecond precision
pub fn now_timestamp() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}

fn take_string(map: &mut Map<String, Value>, field: &'static str) -> Result<String, ValidationError> {
    match map.remove(field) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ValidationError::NotAString(field)),
        None => Err(ValidationError::MissingField(field)),
    }
}

fn take_optional_string(map: &mut Map<String, Value>, field: &str) -> Option<String> {
    match map.remove(field) {
        Some(Value::String(s)) => Some(s),
        Some(Value::Null) | None => None,
        Some(other) => {
            warn!(field = field, value = %other, "Dropping non-string config field");
            None
        }
    }
}

/// Integer geometry from a number or numeric string (floats truncate)
fn parse_number(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.trunc() as i64)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().filter(|f| f.is_finite()).map(|f| f.trunc() as i64))
        }
        _ => None,
    }
}

fn take_number(map: &mut Map<String, Value>, field: &'static str) -> Result<i64, ValidationError> {
    let value = map.remove(field).ok_or(ValidationError::MissingField(field))?;
    parse_number(&value).ok_or(ValidationError::NotNumeric(field))
}

fn to_coordinate(value: i64, field: &'static str) -> Result<i32, ValidationError> {
    i32::try_from(value).map_err(|_| ValidationError::NotNumeric(field))
}

fn parse_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn take_timestamp(map: &mut Map<String, Value>, field: &str) -> f64 {
    match map.remove(field) {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::Null) | None => 0.0,
        Some(other) => {
            warn!(field = field, value = %other, "Dropping non-numeric timestamp");
            0.0
        }
    }
}

impl ConfigRecord {
    pub fn new(title: impl Into<String>, process: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            title: title.into(),
            process: process.into(),
            x: geometry.x,
            y: geometry.y,
            width: geometry.width,
            height: geometry.height,
            custom_name: None,
            enabled: true,
            icon_file: None,
            created_at: 0.0,
            updated_at: 0.0,
            class_name: None,
            extra: Map::new(),
        }
    }

    /// Decode and validate one raw JSON entry.
    /// Required fields are checked in order and the first missing one is reported.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        let Value::Object(mut map) = value else {
            return Err(ValidationError::NotAnObject);
        };

        if let Some(missing) = REQUIRED_FIELDS.into_iter().find(|field| !map.contains_key(*field)) {
            return Err(ValidationError::MissingField(missing));
        }

        let title = take_string(&mut map, "title")?;
        let process = take_string(&mut map, "process")?;
        let x = take_number(&mut map, "x")?;
        let y = take_number(&mut map, "y")?;
        let width = take_number(&mut map, "width")?;
        let height = take_number(&mut map, "height")?;

        if width <= 0 || height <= 0 {
            return Err(ValidationError::NonPositiveDimension { width, height });
        }

        let enabled = match map.remove("enabled") {
            None | Some(Value::Null) => true,
            Some(value) => match parse_flag(&value) {
                Some(flag) => flag,
                None => {
                    warn!(value = %value, "Unrecognised enabled flag, treating as enabled");
                    true
                }
            },
        };

        Ok(Self {
            title,
            process,
            x: to_coordinate(x, "x")?,
            y: to_coordinate(y, "y")?,
            width: to_coordinate(width, "width")?,
            height: to_coordinate(height, "height")?,
            custom_name: take_optional_string(&mut map, "custom_name"),
            enabled,
            icon_file: take_optional_string(&mut map, "icon_file"),
            created_at: take_timestamp(&mut map, "created_at"),
            updated_at: take_timestamp(&mut map, "updated_at"),
            class_name: take_optional_string(&mut map, "class_name"),
            extra: map,
        })
    }

    /// Re-check an in-memory record before it is persisted
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.width <= 0 || self.height <= 0 {
            return Err(ValidationError::NonPositiveDimension {
                width: i64::from(self.width),
                height: i64::from(self.height),
            });
        }
        Ok(())
    }

    /// Exact, case-sensitive identity comparison
    pub fn matches(&self, title: &str, process: &str) -> bool {
        self.title == title && self.process == process
    }

    pub fn same_identity(&self, other: &ConfigRecord) -> bool {
        self.matches(&other.title, &other.process)
    }

    pub fn display_name(&self) -> String {
        self.custom_name
            .clone()
            .unwrap_or_else(|| format!("{} - {}", self.title, self.process))
    }

    pub fn geometry(&self) -> Geometry {
        Geometry::new(self.x, self.y, self.width, self.height)
    }

    pub fn set_geometry(&mut self, geometry: Geometry) {
        self.x = geometry.x;
        self.y = geometry.y;
        self.width = geometry.width;
        self.height = geometry.height;
    }
}

impl<'de> Deserialize<'de> for ConfigRecord {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        ConfigRecord::from_value(value).map_err(serde::de::Error::custom)
    }
}
