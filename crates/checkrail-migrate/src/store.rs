//! Migration store
//!
//! `MigrationStore` is the seam between the engine and whatever actually
//! persists changes. The engine only ever talks in rendered statements and
//! unit-of-work boundaries; it never inspects store internals.
//!
//! `MemoryStore` is the in-process implementation used by the test suites
//! and the CLI's dry runs. It journals statements verbatim and keeps the
//! history ledger in the same staged buffer, so commit and rollback cover
//! both at once.

use crate::history::{HistoryRecord, HistoryStore};
use crate::step::StepId;
use crate::value::Value;
use crate::{MigrateError, Result};
use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

/// A rendered statement with its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
	pub sql: String,
	pub params: Vec<Value>,
}

impl Statement {
	pub fn new(sql: impl Into<String>) -> Self {
		Self {
			sql: sql.into(),
			params: Vec::new(),
		}
	}

	pub fn with_params(sql: impl Into<String>, params: Vec<Value>) -> Self {
		Self {
			sql: sql.into(),
			params,
		}
	}
}

/// Transactional execution target for rendered migration statements.
///
/// The engine holds the advisory lock for the whole batch and opens one
/// unit of work per step.
#[async_trait]
pub trait MigrationStore: Send + Sync {
	/// Take the single-writer advisory lock.
	async fn acquire_lock(&self) -> Result<()>;

	/// Release the advisory lock. Must not fail if the lock is already gone.
	async fn release_lock(&self) -> Result<()>;

	/// Open a unit of work covering one step's statements and its ledger row.
	async fn begin_unit(&self) -> Result<()>;

	async fn commit_unit(&self) -> Result<()>;

	async fn rollback_unit(&self) -> Result<()>;

	/// Execute a structural statement with no parameters.
	async fn execute(&self, sql: &str) -> Result<()>;

	/// Execute a parameterized row-level statement.
	async fn execute_parameterized(&self, statement: &Statement) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryStoreInner {
	locked: bool,
	in_unit: bool,
	committed: Vec<Statement>,
	staged: Vec<Statement>,
	history: Vec<HistoryRecord>,
	staged_records: Vec<HistoryRecord>,
	staged_forgets: Vec<StepId>,
	/// Fail the nth execute across the store's lifetime, for crash tests.
	fail_after: Option<usize>,
	executed: usize,
}

/// In-memory store journaling statements instead of running them.
#[derive(Debug, Default)]
pub struct MemoryStore {
	inner: Mutex<MemoryStoreInner>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	/// Make the store return `StoreUnavailable` on the nth executed
	/// statement, counted across the store's lifetime.
	pub fn fail_after(&self, statements: usize) {
		self.inner.lock().fail_after = Some(statements);
	}

	/// Statements committed so far, in execution order.
	pub fn committed(&self) -> Vec<Statement> {
		self.inner.lock().committed.clone()
	}

	pub fn is_locked(&self) -> bool {
		self.inner.lock().locked
	}

	fn record_statement(&self, statement: Statement) -> Result<()> {
		let mut inner = self.inner.lock();
		if !inner.in_unit {
			return Err(MigrateError::StoreUnavailable(
				"statement outside a unit of work".to_string(),
			));
		}
		inner.executed += 1;
		if let Some(limit) = inner.fail_after
			&& inner.executed > limit
		{
			return Err(MigrateError::StoreUnavailable(format!(
				"injected failure after {} statements",
				limit
			)));
		}
		inner.staged.push(statement);
		Ok(())
	}
}

#[async_trait]
impl MigrationStore for MemoryStore {
	async fn acquire_lock(&self) -> Result<()> {
		let mut inner = self.inner.lock();
		if inner.locked {
			return Err(MigrateError::StoreUnavailable(
				"advisory lock already held".to_string(),
			));
		}
		inner.locked = true;
		Ok(())
	}

	async fn release_lock(&self) -> Result<()> {
		self.inner.lock().locked = false;
		Ok(())
	}

	async fn begin_unit(&self) -> Result<()> {
		let mut inner = self.inner.lock();
		if inner.in_unit {
			return Err(MigrateError::StoreUnavailable(
				"unit of work already open".to_string(),
			));
		}
		inner.in_unit = true;
		Ok(())
	}

	async fn commit_unit(&self) -> Result<()> {
		let mut inner = self.inner.lock();
		inner.in_unit = false;
		let staged: Vec<_> = inner.staged.drain(..).collect();
		inner.committed.extend(staged);
		let records: Vec<_> = inner.staged_records.drain(..).collect();
		inner.history.extend(records);
		let forgets: Vec<_> = inner.staged_forgets.drain(..).collect();
		inner
			.history
			.retain(|record| !forgets.contains(&record.step_id));
		inner.history.sort_by(|a, b| a.step_id.cmp(&b.step_id));
		Ok(())
	}

	async fn rollback_unit(&self) -> Result<()> {
		let mut inner = self.inner.lock();
		inner.in_unit = false;
		inner.staged.clear();
		inner.staged_records.clear();
		inner.staged_forgets.clear();
		Ok(())
	}

	async fn execute(&self, sql: &str) -> Result<()> {
		self.record_statement(Statement::new(sql))
	}

	async fn execute_parameterized(&self, statement: &Statement) -> Result<()> {
		self.record_statement(statement.clone())
	}
}

#[async_trait]
impl HistoryStore for MemoryStore {
	async fn ensure_ledger(&self) -> Result<()> {
		Ok(())
	}

	async fn applied(&self) -> Result<Vec<HistoryRecord>> {
		Ok(self.inner.lock().history.clone())
	}

	async fn is_applied(&self, id: &StepId) -> Result<bool> {
		Ok(self
			.inner
			.lock()
			.history
			.iter()
			.any(|record| &record.step_id == id))
	}

	async fn latest_applied(&self) -> Result<Option<StepId>> {
		Ok(self
			.inner
			.lock()
			.history
			.last()
			.map(|record| record.step_id.clone()))
	}

	async fn record(&self, id: &StepId) -> Result<()> {
		let mut inner = self.inner.lock();
		if !inner.in_unit {
			return Err(MigrateError::StoreUnavailable(
				"ledger write outside a unit of work".to_string(),
			));
		}
		inner.staged_records.push(HistoryRecord {
			step_id: id.clone(),
			applied_at: Utc::now(),
		});
		Ok(())
	}

	async fn forget(&self, id: &StepId) -> Result<()> {
		let mut inner = self.inner.lock();
		if !inner.in_unit {
			return Err(MigrateError::StoreUnavailable(
				"ledger write outside a unit of work".to_string(),
			));
		}
		inner.staged_forgets.push(id.clone());
		Ok(())
	}
}
