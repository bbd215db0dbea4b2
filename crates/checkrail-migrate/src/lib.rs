//! Reversible schema and seed migration engine.
//!
//! Migrations are explicit, paired `up`/`down` operation lists over a typed
//! schema model and keyed seed rows. The registry verifies every step by
//! simulation at registration time, including the round-trip property that
//! `down` restores the exact pre-step state, so execution against a store
//! only ever fails for store reasons.
//!
//! ```no_run
//! use checkrail_migrate::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn demo() -> checkrail_migrate::Result<()> {
//! let mut registry = MigrationRegistry::new();
//! registry.register(
//! 	MigrationStep::new("20251214122143_add_reference_and_category_tables")
//! 		.up(SchemaOp::CreateTable {
//! 			name: "Categories".to_string(),
//! 			columns: vec![ColumnSchema::new("CategoryId", ColumnType::Uuid, false)],
//! 			primary_key: vec!["CategoryId".to_string()],
//! 		})
//! 		.down(SchemaOp::DropTable { name: "Categories".to_string() }),
//! )?;
//!
//! let store = Arc::new(MemoryStore::new());
//! let engine = MigrationEngine::new(registry, store.clone(), store);
//! let report = engine.apply(None).await?;
//! assert!(report.is_success());
//! # Ok(())
//! # }
//! ```

pub mod dependency;
pub mod engine;
pub mod history;
pub mod operations;
pub mod registry;
pub mod schema;
pub mod seed;
pub mod sql;
pub mod state;
pub mod step;
pub mod store;
pub mod value;

use step::StepId;
use thiserror::Error;

/// Unified error type for registration and execution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MigrateError {
	#[error("duplicate step id {0}")]
	DuplicateStepId(StepId),

	#[error("invalid step id '{id}': {reason}")]
	InvalidStepId { id: String, reason: String },

	#[error("invalid dependency order: {0}")]
	InvalidDependencyOrder(String),

	#[error("schema conflict: {0}")]
	SchemaConflict(String),

	#[error("foreign key violation on {table}.{column}: {detail}")]
	ForeignKeyViolation {
		table: String,
		column: String,
		detail: String,
	},

	#[error("duplicate key in {table}: {key}")]
	DuplicateKey { table: String, key: String },

	#[error("missing key in {table}: {key}")]
	MissingKey { table: String, key: String },

	#[error("unknown step {0}")]
	UnknownStep(StepId),

	#[error("step {step} is not reversible: {detail}")]
	AsymmetricStep { step: StepId, detail: String },

	#[error("store unavailable: {0}")]
	StoreUnavailable(String),

	#[error("step {step} failed")]
	StepFailed {
		step: StepId,
		#[source]
		source: Box<MigrateError>,
	},
}

impl MigrateError {
	/// Stable machine-readable name, used by the CLI's output.
	pub fn kind(&self) -> &'static str {
		match self {
			MigrateError::DuplicateStepId(_) => "duplicate_step_id",
			MigrateError::InvalidStepId { .. } => "invalid_step_id",
			MigrateError::InvalidDependencyOrder(_) => "invalid_dependency_order",
			MigrateError::SchemaConflict(_) => "schema_conflict",
			MigrateError::ForeignKeyViolation { .. } => "foreign_key_violation",
			MigrateError::DuplicateKey { .. } => "duplicate_key",
			MigrateError::MissingKey { .. } => "missing_key",
			MigrateError::UnknownStep(_) => "unknown_step",
			MigrateError::AsymmetricStep { .. } => "asymmetric_step",
			MigrateError::StoreUnavailable(_) => "store_unavailable",
			MigrateError::StepFailed { .. } => "step_failed",
		}
	}

	/// The innermost cause of a (possibly nested) step failure.
	pub fn root_cause(&self) -> &MigrateError {
		match self {
			MigrateError::StepFailed { source, .. } => source.root_cause(),
			other => other,
		}
	}
}

pub type Result<T> = std::result::Result<T, MigrateError>;

pub mod prelude {
	pub use crate::engine::{
		CancellationHandle, ExecutionReport, MigrationEngine, StepFailure, StepStatus,
	};
	pub use crate::history::{HistoryRecord, HistoryStore};
	pub use crate::operations::{SchemaOp, SeedOp, StepOp, foreign_key_name, index_name};
	pub use crate::registry::{MigrationRegistry, RegisteredStep};
	pub use crate::schema::{
		ColumnSchema, ColumnType, ForeignKeyAction, ForeignKeySchema, IndexSchema,
		SchemaObjectModel, TableSchema,
	};
	pub use crate::seed::{Row, RowKey, SeedReconciler, SeedState, Strictness};
	pub use crate::state::DatabaseState;
	pub use crate::step::{MigrationStep, StepId};
	pub use crate::store::{MemoryStore, MigrationStore, Statement};
	pub use crate::value::Value;
	pub use crate::{MigrateError, Result};
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn root_cause_unwraps_nested_failures() {
		let inner = MigrateError::DuplicateKey {
			table: "Categories".to_string(),
			key: "(1)".to_string(),
		};
		let wrapped = MigrateError::StepFailed {
			step: StepId::new("20251201083318_predefined_checklist_items"),
			source: Box::new(MigrateError::StepFailed {
				step: StepId::new("20251201083318_predefined_checklist_items"),
				source: Box::new(inner.clone()),
			}),
		};
		assert_eq!(wrapped.root_cause(), &inner);
		assert_eq!(wrapped.kind(), "step_failed");
		assert_eq!(inner.kind(), "duplicate_key");
	}
}
