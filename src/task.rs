//! Task selection
//!
//! A task names the aggregation strategy for the run and, where the strategy
//! needs it, the field and value it works on. Field names are resolved here,
//! once, rather than per record.

use anyhow::{anyhow, Result};
use std::fmt;

use crate::event::{Field, LogEntry};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Filter,
    Stats,
    Top,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskKind::Filter => "filter",
            TaskKind::Stats => "stats",
            TaskKind::Top => "top",
        })
    }
}

/// Field reference as given by the user
///
/// The name is kept as typed so reports echo it back. Unknown names are
/// reported too; stages treat them as matching nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldSelector {
    Known(Field, String),
    Unknown(String),
}

impl FieldSelector {
    pub fn parse(name: &str) -> Self {
        match Field::parse(name) {
            Some(field) => FieldSelector::Known(field, name.to_string()),
            None => {
                log::warn!(
                    "Unsupported field '{}', expected one of: {}",
                    name,
                    Field::ALL.map(Field::name).join(", ")
                );
                FieldSelector::Unknown(name.to_string())
            }
        }
    }

    pub fn field(&self) -> Option<Field> {
        match self {
            FieldSelector::Known(field, _) => Some(*field),
            FieldSelector::Unknown(_) => None,
        }
    }
}

impl fmt::Display for FieldSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldSelector::Known(_, name) | FieldSelector::Unknown(name) => f.write_str(name),
        }
    }
}

/// Comparison value for the filter task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterValue(String);

impl FilterValue {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Method compares without regard to case, everything else exactly.
    pub fn matches(&self, entry: &LogEntry, field: Field) -> bool {
        match field {
            Field::Timestamp => entry.timestamp == self.0,
            Field::Ip => entry.ip == self.0,
            Field::Method => entry.method.eq_ignore_ascii_case(&self.0),
            Field::Url => entry.url == self.0,
            Field::Status => entry.status.to_string() == self.0,
            Field::ResponseTime => entry.response_time.to_string() == self.0,
        }
    }
}

/// What the run computes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescriptor {
    pub kind: TaskKind,
    pub field: Option<FieldSelector>,
    pub value: Option<FilterValue>,
}

impl TaskDescriptor {
    pub fn stats() -> Self {
        Self {
            kind: TaskKind::Stats,
            field: None,
            value: None,
        }
    }

    pub fn top(field: &str) -> Self {
        Self {
            kind: TaskKind::Top,
            field: Some(FieldSelector::parse(field)),
            value: None,
        }
    }

    pub fn filter(field: &str, value: &str) -> Self {
        Self {
            kind: TaskKind::Filter,
            field: Some(FieldSelector::parse(field)),
            value: Some(FilterValue::new(value)),
        }
    }

    /// Check that the parameters the kind needs are present
    pub fn validate(&self) -> Result<()> {
        match self.kind {
            TaskKind::Stats => Ok(()),
            TaskKind::Top if self.field.is_none() => {
                Err(anyhow!("top task requires a <field>"))
            }
            TaskKind::Filter if self.field.is_none() || self.value.is_none() => {
                Err(anyhow!("filter task requires <field> <value>"))
            }
            _ => Ok(()),
        }
    }
}
