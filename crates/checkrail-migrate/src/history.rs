//! Migration history ledger
//!
//! The ledger is the single source of truth for which steps are applied.
//! Every mutation happens inside the same unit of work as the step's own
//! statements, so a crash can never leave the ledger and the schema
//! disagreeing.

use crate::Result;
use crate::step::StepId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One row of the `__MigrationHistory` ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
	pub step_id: StepId,
	pub applied_at: DateTime<Utc>,
}

/// Persistent record of applied steps.
#[async_trait]
pub trait HistoryStore: Send + Sync {
	/// Create the ledger table if it does not exist. Idempotent.
	async fn ensure_ledger(&self) -> Result<()>;

	/// All applied steps, ascending by step id.
	async fn applied(&self) -> Result<Vec<HistoryRecord>>;

	async fn is_applied(&self, id: &StepId) -> Result<bool>;

	/// The most recently applied step, if any.
	async fn latest_applied(&self) -> Result<Option<StepId>>;

	/// Record a step as applied. Joins the current unit of work.
	async fn record(&self, id: &StepId) -> Result<()>;

	/// Remove a step's record after its Down list ran. Joins the current
	/// unit of work.
	async fn forget(&self, id: &StepId) -> Result<()>;
}
