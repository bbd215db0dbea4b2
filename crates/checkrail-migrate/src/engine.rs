//! Migration engine
//!
//! Drives registered steps against a store. The engine never validates
//! semantics at execution time; the registry already proved every step
//! sound by simulation, so the only runtime failures left are store ones.
//!
//! Concurrency model: single writer. The advisory lock is held for the
//! whole batch, each step runs in its own unit of work together with its
//! history ledger row, and a failed step rolls back and halts the batch.

use crate::history::HistoryStore;
use crate::operations::StepOp;
use crate::registry::MigrationRegistry;
use crate::sql::{render_schema_op, render_seed_op};
use crate::step::StepId;
use crate::store::MigrationStore;
use crate::{MigrateError, Result};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{info, warn};

/// Cooperative cancellation flag, checked at step boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancellationHandle {
	flag: Arc<AtomicBool>,
}

impl CancellationHandle {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn cancel(&self) {
		self.flag.store(true, Ordering::SeqCst);
	}

	pub fn is_cancelled(&self) -> bool {
		self.flag.load(Ordering::SeqCst)
	}
}

/// The step that stopped a batch, with its cause.
#[derive(Debug, Clone, PartialEq)]
pub struct StepFailure {
	pub step: StepId,
	pub error: MigrateError,
}

/// Outcome of an `apply` or `revert` batch.
///
/// `applied` lists the steps whose units of work committed, in execution
/// order, including batches later halted by failure or cancellation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionReport {
	pub applied: Vec<StepId>,
	pub failed: Option<StepFailure>,
	pub cancelled: bool,
}

impl ExecutionReport {
	pub fn is_success(&self) -> bool {
		self.failed.is_none() && !self.cancelled
	}
}

/// Per-step line of a `status` report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepStatus {
	pub id: StepId,
	/// Ledger timestamp, `None` while the step is pending.
	pub applied_at: Option<DateTime<Utc>>,
}

impl StepStatus {
	pub fn is_applied(&self) -> bool {
		self.applied_at.is_some()
	}
}

/// Applies and reverts registered steps against a store.
pub struct MigrationEngine<S, H> {
	registry: MigrationRegistry,
	store: Arc<S>,
	history: Arc<H>,
	cancellation: CancellationHandle,
}

impl<S, H> MigrationEngine<S, H>
where
	S: MigrationStore,
	H: HistoryStore,
{
	pub fn new(registry: MigrationRegistry, store: Arc<S>, history: Arc<H>) -> Self {
		Self {
			registry,
			store,
			history,
			cancellation: CancellationHandle::new(),
		}
	}

	pub fn registry(&self) -> &MigrationRegistry {
		&self.registry
	}

	/// Handle for cancelling a running batch from another task.
	pub fn cancellation_handle(&self) -> CancellationHandle {
		self.cancellation.clone()
	}

	/// Apply pending steps, in registration order, up to and including
	/// `target` (all of them for `None`). Already-applied steps are skipped.
	pub async fn apply(&self, target: Option<&StepId>) -> Result<ExecutionReport> {
		self.check_target(target)?;
		self.store.acquire_lock().await?;
		let outcome = self.apply_locked(target).await;
		self.store.release_lock().await?;
		outcome
	}

	/// Revert applied steps, newest first, down to but not including
	/// `target` (everything for `None`).
	pub async fn revert(&self, target: Option<&StepId>) -> Result<ExecutionReport> {
		self.check_target(target)?;
		self.store.acquire_lock().await?;
		let outcome = self.revert_locked(target).await;
		self.store.release_lock().await?;
		outcome
	}

	/// One line per registered step, in registration order, with its
	/// ledger state.
	pub async fn status(&self) -> Result<Vec<StepStatus>> {
		self.history.ensure_ledger().await?;
		let ledger: HashMap<StepId, DateTime<Utc>> = self
			.history
			.applied()
			.await?
			.into_iter()
			.map(|record| (record.step_id, record.applied_at))
			.collect();
		let mut report = Vec::with_capacity(self.registry.len());
		for entry in self.registry.steps() {
			report.push(StepStatus {
				id: entry.step.id.clone(),
				applied_at: ledger.get(&entry.step.id).copied(),
			});
		}
		Ok(report)
	}

	fn check_target(&self, target: Option<&StepId>) -> Result<()> {
		if let Some(id) = target
			&& !self.registry.contains(id)
		{
			return Err(MigrateError::UnknownStep(id.clone()));
		}
		Ok(())
	}

	async fn apply_locked(&self, target: Option<&StepId>) -> Result<ExecutionReport> {
		self.history.ensure_ledger().await?;
		let mut report = ExecutionReport::default();

		for entry in self.registry.steps() {
			let id = &entry.step.id;
			if self.cancellation.is_cancelled() {
				warn!(step = %id, "batch cancelled before step");
				report.cancelled = true;
				break;
			}
			if !self.history.is_applied(id).await? {
				let outcome = self
					.run_step(id, &entry.step.up, &entry.up_order, Direction::Up)
					.await;
				if let Err(error) = outcome {
					report.failed = Some(StepFailure {
						step: id.clone(),
						error,
					});
					break;
				}
				report.applied.push(id.clone());
			}

			// The target bounds the batch whether or not the step ran.
			if matches!(target, Some(t) if t == id) {
				break;
			}
		}
		Ok(report)
	}

	async fn revert_locked(&self, target: Option<&StepId>) -> Result<ExecutionReport> {
		self.history.ensure_ledger().await?;
		let mut report = ExecutionReport::default();

		for entry in self.registry.steps().iter().rev() {
			let id = &entry.step.id;
			if matches!(target, Some(t) if t == id) {
				break;
			}
			if self.cancellation.is_cancelled() {
				warn!(step = %id, "batch cancelled before step");
				report.cancelled = true;
				break;
			}
			if !self.history.is_applied(id).await? {
				continue;
			}

			let outcome = self
				.run_step(id, &entry.step.down, &entry.down_order, Direction::Down)
				.await;
			if let Err(error) = outcome {
				report.failed = Some(StepFailure {
					step: id.clone(),
					error,
				});
				break;
			}
			report.applied.push(id.clone());
		}
		Ok(report)
	}

	/// One step, one unit of work: its statements plus its ledger row
	/// commit or roll back together.
	async fn run_step(
		&self,
		id: &StepId,
		ops: &[StepOp],
		order: &[usize],
		direction: Direction,
	) -> Result<()> {
		info!(step = %id, direction = direction.as_str(), ops = order.len(), "running step");
		self.store.begin_unit().await?;
		let outcome = self.run_statements(id, ops, order, direction).await;
		match outcome {
			Ok(()) => {
				self.store.commit_unit().await?;
				info!(step = %id, direction = direction.as_str(), "step committed");
				Ok(())
			}
			Err(error) => {
				warn!(step = %id, error = %error, "step failed, rolling back");
				self.store.rollback_unit().await?;
				Err(MigrateError::StepFailed {
					step: id.clone(),
					source: Box::new(error),
				})
			}
		}
	}

	async fn run_statements(
		&self,
		id: &StepId,
		ops: &[StepOp],
		order: &[usize],
		direction: Direction,
	) -> Result<()> {
		for &index in order {
			match &ops[index] {
				StepOp::Schema(op) => self.store.execute(&render_schema_op(op)).await?,
				StepOp::Seed(op) => {
					self.store.execute_parameterized(&render_seed_op(op)).await?
				}
			}
		}
		match direction {
			Direction::Up => self.history.record(id).await,
			Direction::Down => self.history.forget(id).await,
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
	Up,
	Down,
}

impl Direction {
	fn as_str(self) -> &'static str {
		match self {
			Direction::Up => "up",
			Direction::Down => "down",
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::operations::SchemaOp;
	use crate::schema::{ColumnSchema, ColumnType};
	use crate::step::MigrationStep;
	use crate::store::MemoryStore;

	fn create_drop(id: &str, table: &str) -> MigrationStep {
		MigrationStep::new(id)
			.up(SchemaOp::CreateTable {
				name: table.to_string(),
				columns: vec![ColumnSchema::new("Id", ColumnType::Uuid, false)],
				primary_key: vec!["Id".to_string()],
			})
			.down(SchemaOp::DropTable {
				name: table.to_string(),
			})
	}

	fn two_step_engine(store: Arc<MemoryStore>) -> MigrationEngine<MemoryStore, MemoryStore> {
		let mut registry = MigrationRegistry::new();
		registry
			.register(create_drop("20251201083318_predefined_checklist_items", "Checklists"))
			.unwrap();
		registry
			.register(create_drop(
				"20251214122143_add_reference_and_category_tables",
				"Categories",
			))
			.unwrap();
		MigrationEngine::new(registry, store.clone(), store)
	}

	#[tokio::test]
	async fn apply_runs_pending_steps_in_order() {
		let store = Arc::new(MemoryStore::new());
		let engine = two_step_engine(store.clone());

		let report = engine.apply(None).await.unwrap();
		assert!(report.is_success());
		assert_eq!(report.applied.len(), 2);
		assert_eq!(store.committed().len(), 2);
		assert!(!store.is_locked());

		// Re-applying finds nothing pending.
		let report = engine.apply(None).await.unwrap();
		assert!(report.applied.is_empty());
	}

	#[tokio::test]
	async fn apply_stops_at_target() {
		let store = Arc::new(MemoryStore::new());
		let engine = two_step_engine(store.clone());
		let target = StepId::new("20251201083318_predefined_checklist_items");

		let report = engine.apply(Some(&target)).await.unwrap();
		assert_eq!(report.applied, vec![target]);

		let status = engine.status().await.unwrap();
		assert!(status[0].is_applied());
		assert!(!status[1].is_applied());
	}

	#[tokio::test]
	async fn apply_to_already_applied_target_runs_nothing_later() {
		let store = Arc::new(MemoryStore::new());
		let engine = two_step_engine(store.clone());
		let target = StepId::new("20251201083318_predefined_checklist_items");
		engine.apply(Some(&target)).await.unwrap();

		// The second call must stop at the target, not walk past it.
		let report = engine.apply(Some(&target)).await.unwrap();
		assert!(report.is_success());
		assert!(report.applied.is_empty());

		let status = engine.status().await.unwrap();
		assert!(status[0].is_applied());
		assert!(!status[1].is_applied());
	}

	#[tokio::test]
	async fn failed_step_rolls_back_and_halts() {
		let store = Arc::new(MemoryStore::new());
		let engine = two_step_engine(store.clone());
		store.fail_after(1);

		let report = engine.apply(None).await.unwrap();
		assert_eq!(report.applied.len(), 1);
		let failure = report.failed.unwrap();
		assert_eq!(
			failure.step,
			StepId::new("20251214122143_add_reference_and_category_tables")
		);
		assert!(matches!(failure.error, MigrateError::StepFailed { .. }));

		// Only the first step's statement and ledger row survived.
		assert_eq!(store.committed().len(), 1);
		let status = engine.status().await.unwrap();
		assert!(status[0].is_applied());
		assert!(!status[1].is_applied());
		assert!(!store.is_locked());
	}

	#[tokio::test]
	async fn revert_walks_newest_first_down_to_target() {
		let store = Arc::new(MemoryStore::new());
		let engine = two_step_engine(store.clone());
		engine.apply(None).await.unwrap();

		let target = StepId::new("20251201083318_predefined_checklist_items");
		let report = engine.revert(Some(&target)).await.unwrap();
		assert_eq!(
			report.applied,
			vec![StepId::new("20251214122143_add_reference_and_category_tables")]
		);

		let status = engine.status().await.unwrap();
		assert!(status[0].is_applied());
		assert!(status[0].applied_at.is_some());
		assert!(!status[1].is_applied());
	}

	#[tokio::test]
	async fn unknown_target_is_rejected_before_locking() {
		let store = Arc::new(MemoryStore::new());
		let engine = two_step_engine(store.clone());
		let err = engine
			.apply(Some(&StepId::new("20990101000000_missing")))
			.await
			.unwrap_err();
		assert!(matches!(err, MigrateError::UnknownStep(_)));
		assert!(!store.is_locked());
	}

	#[tokio::test]
	async fn cancellation_stops_between_steps() {
		let store = Arc::new(MemoryStore::new());
		let engine = two_step_engine(store.clone());
		engine.cancellation_handle().cancel();

		let report = engine.apply(None).await.unwrap();
		assert!(report.cancelled);
		assert!(report.applied.is_empty());
		assert!(!store.is_locked());
	}
}
