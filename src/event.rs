use anyhow::{anyhow, Context, Result};
use csv::StringRecord;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum number of columns a data row must carry
pub const MIN_FIELDS: usize = 6;

/// One parsed row of the access log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: String,
    pub ip: String,
    pub method: String,
    pub url: String,
    pub status: i64,
    pub response_time: i64,
}

impl LogEntry {
    /// Build an entry from a raw delimited row.
    ///
    /// Fields are trimmed before conversion. Columns past the sixth are
    /// ignored.
    pub fn from_record(record: &StringRecord) -> Result<Self> {
        if record.len() < MIN_FIELDS {
            return Err(anyhow!(
                "invalid record: expected at least {} fields, got {}",
                MIN_FIELDS,
                record.len()
            ));
        }

        let column = |idx: usize| record.get(idx).map(str::trim).unwrap_or_default();

        let status = column(4)
            .parse::<i64>()
            .with_context(|| format!("invalid status code '{}'", column(4)))?;
        let response_time = column(5)
            .parse::<i64>()
            .with_context(|| format!("invalid response time '{}'", column(5)))?;

        Ok(Self {
            timestamp: column(0).to_string(),
            ip: column(1).to_string(),
            method: column(2).to_string(),
            url: column(3).to_string(),
            status,
            response_time,
        })
    }

    /// Value of `field` rendered as a string
    pub fn field_value(&self, field: Field) -> String {
        match field {
            Field::Timestamp => self.timestamp.clone(),
            Field::Ip => self.ip.clone(),
            Field::Method => self.method.clone(),
            Field::Url => self.url.clone(),
            Field::Status => self.status.to_string(),
            Field::ResponseTime => self.response_time.to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status >= 400
    }
}

/// Addressable columns of a [`LogEntry`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Timestamp,
    Ip,
    Method,
    Url,
    Status,
    ResponseTime,
}

impl Field {
    pub const ALL: [Field; 6] = [
        Field::Timestamp,
        Field::Ip,
        Field::Method,
        Field::Url,
        Field::Status,
        Field::ResponseTime,
    ];

    /// Parse a field name, ignoring case
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "timestamp" => Some(Field::Timestamp),
            "ip" => Some(Field::Ip),
            "method" => Some(Field::Method),
            "url" => Some(Field::Url),
            "status" => Some(Field::Status),
            "response_time" => Some(Field::ResponseTime),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Field::Timestamp => "timestamp",
            Field::Ip => "ip",
            Field::Method => "method",
            Field::Url => "url",
            Field::Status => "status",
            Field::ResponseTime => "response_time",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
