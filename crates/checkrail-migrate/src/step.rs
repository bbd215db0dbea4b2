//! Migration step definition
//!
//! A step is one named, ordered, reversible unit of schema/data change. The
//! identifier convention is `<UTC-timestamp:YYYYMMDDHHMMSS>_<slug>`, which is
//! both the history key and the natural application order.

use crate::operations::StepOp;
use crate::{MigrateError, Result};
use serde::{Deserialize, Serialize};

/// Sortable step identifier.
///
/// Ordering is the plain string ordering, which for the fixed-width
/// timestamp prefix coincides with chronological order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StepId(String);

impl StepId {
	pub fn new(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}

	/// The 14-digit UTC timestamp prefix.
	pub fn timestamp(&self) -> &str {
		self.0.get(..self.0.len().min(14)).unwrap_or("")
	}

	/// The slug after the timestamp and separator.
	pub fn slug(&self) -> &str {
		self.0.get(15..).unwrap_or("")
	}

	/// Check the identifier against the `<YYYYMMDDHHMMSS>_<slug>` convention.
	///
	/// Called at registration time; a malformed id never reaches the
	/// history ledger.
	pub fn validate(&self) -> Result<()> {
		let invalid = |reason: &str| MigrateError::InvalidStepId {
			id: self.0.clone(),
			reason: reason.to_string(),
		};
		if self.0.len() < 16 {
			return Err(invalid("expected <YYYYMMDDHHMMSS>_<slug>"));
		}
		let Some((timestamp, rest)) = self.0.split_at_checked(14) else {
			return Err(invalid("timestamp prefix must be 14 digits"));
		};
		if !timestamp.bytes().all(|b| b.is_ascii_digit()) {
			return Err(invalid("timestamp prefix must be 14 digits"));
		}
		if chrono::NaiveDateTime::parse_from_str(timestamp, "%Y%m%d%H%M%S").is_err() {
			return Err(invalid("timestamp prefix is not a valid UTC timestamp"));
		}
		let Some(slug) = rest.strip_prefix('_') else {
			return Err(invalid("timestamp and slug must be separated by '_'"));
		};
		if slug.is_empty() {
			return Err(invalid("slug must not be empty"));
		}
		if !slug
			.bytes()
			.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_' || b == b'-')
		{
			return Err(invalid("slug must be lowercase alphanumeric, '_' or '-'"));
		}
		Ok(())
	}
}

impl From<&str> for StepId {
	fn from(id: &str) -> Self {
		Self::new(id)
	}
}

impl std::fmt::Display for StepId {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// A paired forward/backward transformation.
///
/// `down` must be the semantic inverse of `up`; the registry verifies this by
/// simulation before the step is accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationStep {
	pub id: StepId,
	pub up: Vec<StepOp>,
	pub down: Vec<StepOp>,
}

impl MigrationStep {
	pub fn new(id: impl Into<StepId>) -> Self {
		Self {
			id: id.into(),
			up: Vec::new(),
			down: Vec::new(),
		}
	}

	/// Append an operation to the forward list.
	pub fn up(mut self, op: impl Into<StepOp>) -> Self {
		self.up.push(op.into());
		self
	}

	/// Append an operation to the backward list.
	pub fn down(mut self, op: impl Into<StepOp>) -> Self {
		self.down.push(op.into());
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;

	#[test]
	fn valid_id_parses() {
		let id = StepId::new("20251214122143_add_reference_and_category_tables");
		id.validate().unwrap();
		assert_eq!(id.timestamp(), "20251214122143");
		assert_eq!(id.slug(), "add_reference_and_category_tables");
	}

	#[rstest]
	#[case("short")]
	#[case("2025121412214x_slug")]
	#[case("20251214122143slug")]
	#[case("20251214122143_")]
	#[case("20251214122143_Bad Slug")]
	#[case("20251399999999_slug")]
	#[case("1234567890123ñ_slug")]
	fn invalid_ids_rejected(#[case] raw: &str) {
		let err = StepId::new(raw).validate().unwrap_err();
		assert!(matches!(err, MigrateError::InvalidStepId { .. }));
	}

	#[test]
	fn ids_sort_chronologically() {
		let earlier = StepId::new("20251201083318_predefined_checklist_items");
		let later = StepId::new("20251215070221_remove_muster_wir");
		assert!(earlier < later);
	}
}
