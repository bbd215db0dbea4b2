//! Step registry
//!
//! Registration is where all static checking happens. A step that the
//! registry accepts is guaranteed to execute cleanly against a store that
//! matches the simulated state, so the engine's own failure modes reduce to
//! store unavailability.
//!
//! Checks, in order: identifier convention, uniqueness, ascending ids,
//! `up` dependency resolution, `up` simulation, `down` order validation,
//! `down` simulation, and the round-trip equality `down(up(state)) == state`.

use crate::dependency::DependencyResolver;
use crate::seed::Strictness;
use crate::state::DatabaseState;
use crate::step::{MigrationStep, StepId};
use crate::{MigrateError, Result};
use tracing::debug;

/// A step the registry has accepted, with its resolved orders and the
/// snapshot of database state after its `up` list.
#[derive(Debug, Clone)]
pub struct RegisteredStep {
	pub step: MigrationStep,
	/// Indices into `step.up`, in execution order.
	pub up_order: Vec<usize>,
	/// Indices into `step.down`, in execution order.
	pub down_order: Vec<usize>,
	/// State after `up`, used as the baseline for the next registration.
	pub after: DatabaseState,
}

/// Ordered collection of verified migration steps.
#[derive(Debug, Clone)]
pub struct MigrationRegistry {
	steps: Vec<RegisteredStep>,
	strictness: Strictness,
}

impl Default for MigrationRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl MigrationRegistry {
	pub fn new() -> Self {
		Self::with_strictness(Strictness::Strict)
	}

	pub fn with_strictness(strictness: Strictness) -> Self {
		Self {
			steps: Vec::new(),
			strictness,
		}
	}

	pub fn strictness(&self) -> Strictness {
		self.strictness
	}

	/// Verify and accept a step.
	///
	/// Steps must arrive in ascending id order; the step's `down` list must
	/// restore the exact pre-step state.
	pub fn register(&mut self, step: MigrationStep) -> Result<()> {
		step.id.validate()?;
		if self.steps.iter().any(|existing| existing.step.id == step.id) {
			return Err(MigrateError::DuplicateStepId(step.id));
		}
		if let Some(last) = self.steps.last()
			&& step.id <= last.step.id
		{
			return Err(MigrateError::InvalidDependencyOrder(format!(
				"step {} registered after {}",
				step.id, last.step.id
			)));
		}

		let before = self
			.steps
			.last()
			.map(|last| last.after.clone())
			.unwrap_or_default();

		let up_order = DependencyResolver::resolve(&step.up, &before.schema)?;
		let mut after = before.clone();
		for &index in &up_order {
			after
				.apply(&step.up[index], self.strictness)
				.map_err(|source| MigrateError::StepFailed {
					step: step.id.clone(),
					source: Box::new(source),
				})?;
		}

		let down_order = DependencyResolver::validate(&step.down, &after.schema)?;
		let mut reverted = after.clone();
		for &index in &down_order {
			reverted
				.apply(&step.down[index], self.strictness)
				.map_err(|source| MigrateError::StepFailed {
					step: step.id.clone(),
					source: Box::new(source),
				})?;
		}

		if reverted != before {
			return Err(MigrateError::AsymmetricStep {
				step: step.id,
				detail: "down list does not restore the pre-step state".to_string(),
			});
		}

		debug!(step = %step.id, ops = step.up.len(), "step registered");
		self.steps.push(RegisteredStep {
			step,
			up_order,
			down_order,
			after,
		});
		Ok(())
	}

	pub fn steps(&self) -> &[RegisteredStep] {
		&self.steps
	}

	pub fn get(&self, id: &StepId) -> Option<&RegisteredStep> {
		self.steps.iter().find(|entry| &entry.step.id == id)
	}

	pub fn contains(&self, id: &StepId) -> bool {
		self.get(id).is_some()
	}

	pub fn latest(&self) -> Option<&StepId> {
		self.steps.last().map(|entry| &entry.step.id)
	}

	pub fn len(&self) -> usize {
		self.steps.len()
	}

	pub fn is_empty(&self) -> bool {
		self.steps.is_empty()
	}

	/// The simulated state after the given step, or the empty baseline
	/// for `None`.
	pub fn state_at(&self, id: Option<&StepId>) -> Result<DatabaseState> {
		match id {
			None => Ok(DatabaseState::new()),
			Some(id) => self
				.get(id)
				.map(|entry| entry.after.clone())
				.ok_or_else(|| MigrateError::UnknownStep(id.clone())),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::operations::{SchemaOp, SeedOp};
	use crate::schema::{ColumnSchema, ColumnType};
	use crate::value::Value;
	use indexmap::IndexMap;
	use uuid::Uuid;

	fn create_categories() -> SchemaOp {
		SchemaOp::CreateTable {
			name: "Categories".to_string(),
			columns: vec![
				ColumnSchema::new("CategoryId", ColumnType::Uuid, false),
				ColumnSchema::new("CategoryName", ColumnType::VarChar(200), false),
			],
			primary_key: vec!["CategoryId".to_string()],
		}
	}

	fn categories_step() -> MigrationStep {
		MigrationStep::new("20251214122143_add_reference_and_category_tables")
			.up(create_categories())
			.down(SchemaOp::DropTable {
				name: "Categories".to_string(),
			})
	}

	#[test]
	fn round_trip_step_is_accepted() {
		let mut registry = MigrationRegistry::new();
		registry.register(categories_step()).unwrap();
		assert_eq!(registry.len(), 1);
		assert!(registry.state_at(registry.latest()).unwrap().schema.table("Categories").is_some());
	}

	#[test]
	fn duplicate_id_is_rejected() {
		let mut registry = MigrationRegistry::new();
		registry.register(categories_step()).unwrap();
		let err = registry.register(categories_step()).unwrap_err();
		assert!(matches!(err, MigrateError::DuplicateStepId(_)));
	}

	#[test]
	fn out_of_order_registration_is_rejected() {
		let mut registry = MigrationRegistry::new();
		registry.register(categories_step()).unwrap();
		let earlier = MigrationStep::new("20251201083318_predefined_checklist_items")
			.up(SchemaOp::CreateTable {
				name: "Checklists".to_string(),
				columns: vec![ColumnSchema::new("ChecklistId", ColumnType::Uuid, false)],
				primary_key: vec!["ChecklistId".to_string()],
			})
			.down(SchemaOp::DropTable {
				name: "Checklists".to_string(),
			});
		let err = registry.register(earlier).unwrap_err();
		assert!(matches!(err, MigrateError::InvalidDependencyOrder(_)));
	}

	#[test]
	fn incomplete_down_is_asymmetric() {
		let mut registry = MigrationRegistry::new();
		let step = MigrationStep::new("20251214122143_add_reference_and_category_tables")
			.up(create_categories())
			.up(SeedOp::InsertRow {
				table: "Categories".to_string(),
				key_columns: vec!["CategoryId".to_string()],
				key_values: vec![Value::Uuid(Uuid::from_u128(1))],
				columns: IndexMap::from([(
					"CategoryName".to_string(),
					Value::from("Structural"),
				)]),
			})
			// Dropping the table also drops the row, but registration runs
			// the full down list, and this one leaves nothing behind.
			.down(SchemaOp::DropTable {
				name: "Categories".to_string(),
			});
		registry.register(step).unwrap();

		let step = MigrationStep::new("20251215070221_remove_muster_wir")
			.up(SeedOp::DeleteRow {
				table: "Categories".to_string(),
				key_columns: vec!["CategoryId".to_string()],
				key_values: vec![Value::Uuid(Uuid::from_u128(1))],
			})
			.down(SeedOp::InsertRow {
				table: "Categories".to_string(),
				key_columns: vec!["CategoryId".to_string()],
				key_values: vec![Value::Uuid(Uuid::from_u128(1))],
				// Wrong name: the restored row differs from the deleted one.
				columns: IndexMap::from([(
					"CategoryName".to_string(),
					Value::from("Architectural"),
				)]),
			});
		let err = registry.register(step).unwrap_err();
		assert!(matches!(err, MigrateError::AsymmetricStep { .. }));
	}

	#[test]
	fn failing_up_is_reported_as_step_failure() {
		let mut registry = MigrationRegistry::new();
		let step = MigrationStep::new("20251214122143_add_reference_and_category_tables")
			.up(SchemaOp::DropTable {
				name: "Categories".to_string(),
			})
			.down(create_categories());
		let err = registry.register(step).unwrap_err();
		assert!(matches!(err, MigrateError::StepFailed { .. }));
	}

	#[test]
	fn state_at_unknown_step_fails() {
		let registry = MigrationRegistry::new();
		let err = registry
			.state_at(Some(&StepId::new("20251201083318_predefined_checklist_items")))
			.unwrap_err();
		assert!(matches!(err, MigrateError::UnknownStep(_)));
	}
}
