//! Seed-data cell values
//!
//! Reference/fixture rows carry a small closed set of value types; an absent
//! cell is the NULL representation used throughout the seed state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single seed-data cell value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
	Uuid(Uuid),
	Text(String),
	Integer(i64),
	Boolean(bool),
	Timestamp(DateTime<Utc>),
	Null,
}

impl Value {
	pub fn is_null(&self) -> bool {
		matches!(self, Value::Null)
	}

	/// Type name used in error messages.
	pub fn type_name(&self) -> &'static str {
		match self {
			Value::Uuid(_) => "uuid",
			Value::Text(_) => "text",
			Value::Integer(_) => "integer",
			Value::Boolean(_) => "boolean",
			Value::Timestamp(_) => "timestamp",
			Value::Null => "null",
		}
	}
}

impl std::fmt::Display for Value {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Value::Uuid(v) => write!(f, "{}", v),
			Value::Text(v) => write!(f, "{}", v),
			Value::Integer(v) => write!(f, "{}", v),
			Value::Boolean(v) => write!(f, "{}", v),
			Value::Timestamp(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S")),
			Value::Null => write!(f, "NULL"),
		}
	}
}

impl From<Uuid> for Value {
	fn from(v: Uuid) -> Self {
		Value::Uuid(v)
	}
}

impl From<&str> for Value {
	fn from(v: &str) -> Self {
		Value::Text(v.to_string())
	}
}

impl From<String> for Value {
	fn from(v: String) -> Self {
		Value::Text(v)
	}
}

impl From<i64> for Value {
	fn from(v: i64) -> Self {
		Value::Integer(v)
	}
}

impl From<i32> for Value {
	fn from(v: i32) -> Self {
		Value::Integer(v as i64)
	}
}

impl From<bool> for Value {
	fn from(v: bool) -> Self {
		Value::Boolean(v)
	}
}

impl From<DateTime<Utc>> for Value {
	fn from(v: DateTime<Utc>) -> Self {
		Value::Timestamp(v)
	}
}
