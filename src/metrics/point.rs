use std::collections::BTreeMap;
use std::fmt::{self, Write as _};

use thiserror::Error;

/// Typed payload value of a point.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Str(String),
    Bool(bool),
}

/// Reasons a point cannot be built.
#[derive(Debug, Error, PartialEq)]
pub enum PointError {
    #[error("measurement name is empty")]
    EmptyMeasurement,
    #[error("point \"{0}\" has no fields")]
    NoFields(String),
    #[error("key \"{key}\" is used as both tag and field on \"{measurement}\"")]
    TagFieldCollision { measurement: String, key: String },
}

/// One immutable time-series record. Timestamp is epoch milliseconds.
/// Tag and field keys never overlap and there is always at least one field.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementPoint {
    measurement: String,
    timestamp_ms: i64,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
}

/// Accumulates tags and fields; `build()` checks the point invariants.
#[derive(Debug, Clone)]
pub struct PointBuilder {
    measurement: String,
    timestamp_ms: i64,
    tags: BTreeMap<String, String>,
    fields: BTreeMap<String, FieldValue>,
}

// ─── Conversions ─────────────────────────────────────────────────

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_owned())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

// ─── MeasurementPoint impl ───────────────────────────────────────

impl MeasurementPoint {
    pub fn builder(measurement: impl Into<String>) -> PointBuilder {
        PointBuilder {
            measurement: measurement.into(),
            timestamp_ms: 0,
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
        }
    }

    pub fn measurement(&self) -> &str {
        &self.measurement
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    pub fn tags(&self) -> &BTreeMap<String, String> {
        &self.tags
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.get(key).map(String::as_str)
    }

    pub fn field(&self, key: &str) -> Option<&FieldValue> {
        self.fields.get(key)
    }

    /// Append this point as one line of InfluxDB line protocol
    /// (millisecond precision), without the trailing newline.
    ///
    /// Tags with an empty value are left out since the protocol has no
    /// representation for them.
    pub fn write_line_protocol(&self, out: &mut String) {
        escape_into(out, &self.measurement, &[',', ' ']);

        for (key, value) in &self.tags {
            if value.is_empty() {
                continue;
            }
            out.push(',');
            escape_into(out, key, &[',', '=', ' ']);
            out.push('=');
            escape_into(out, value, &[',', '=', ' ']);
        }

        out.push(' ');
        for (i, (key, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            escape_into(out, key, &[',', '=', ' ']);
            out.push('=');
            // Writing to a String cannot fail
            let _ = write!(out, "{value}");
        }

        let _ = write!(out, " {}", self.timestamp_ms);
    }

    pub fn to_line_protocol(&self) -> String {
        let mut line = String::with_capacity(128);
        self.write_line_protocol(&mut line);
        line
    }
}

// ─── PointBuilder impl ───────────────────────────────────────────

impl PointBuilder {
    pub fn time(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = timestamp_ms;
        self
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn build(self) -> Result<MeasurementPoint, PointError> {
        if self.measurement.is_empty() {
            return Err(PointError::EmptyMeasurement);
        }
        if self.fields.is_empty() {
            return Err(PointError::NoFields(self.measurement));
        }
        if let Some(key) = self.tags.keys().find(|k| self.fields.contains_key(*k)) {
            return Err(PointError::TagFieldCollision {
                key: key.clone(),
                measurement: self.measurement,
            });
        }

        Ok(MeasurementPoint {
            measurement: self.measurement,
            timestamp_ms: self.timestamp_ms,
            tags: self.tags,
            fields: self.fields,
        })
    }
}

// ─── Line protocol encoding ──────────────────────────────────────

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}i"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Str(s) => {
                f.write_char('"')?;
                for c in s.chars() {
                    if c == '"' || c == '\\' {
                        f.write_char('\\')?;
                    }
                    f.write_char(c)?;
                }
                f.write_char('"')
            }
        }
    }
}

/// Backslash-escape `special` characters; newlines become a literal `\n`
/// since they would otherwise terminate the line.
fn escape_into(out: &mut String, s: &str, special: &[char]) {
    for c in s.chars() {
        if c == '\n' {
            out.push_str("\\n");
            continue;
        }
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
}
