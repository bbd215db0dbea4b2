//! Combined database state snapshot
//!
//! One immutable snapshot per applied step: the schema object model plus all
//! seed rows. The registry replays steps over snapshots, which is what lets
//! `status()` and dry-run diffing work without touching the real store.

use crate::operations::{SchemaOp, StepOp};
use crate::schema::SchemaObjectModel;
use crate::seed::{SeedReconciler, SeedState, Strictness};
use crate::{MigrateError, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseState {
	pub schema: SchemaObjectModel,
	pub seeds: SeedState,
}

impl DatabaseState {
	pub fn new() -> Self {
		Self::default()
	}

	/// Apply one operation, schema and seed effects together.
	pub fn apply(&mut self, op: &StepOp, strictness: Strictness) -> Result<()> {
		match op {
			StepOp::Schema(op) => self.apply_schema_op(op),
			StepOp::Seed(op) => {
				let reconciler = SeedReconciler::new(strictness);
				reconciler.apply(&self.schema, &mut self.seeds, op)
			}
		}
	}

	/// Apply a structural change, keeping seed rows consistent with it.
	pub fn apply_schema_op(&mut self, op: &SchemaOp) -> Result<()> {
		match op {
			SchemaOp::AddColumn { table, column } => {
				if !column.nullable && self.seeds.row_count(table) > 0 {
					return Err(MigrateError::SchemaConflict(format!(
						"cannot add non-nullable column {}.{} to a table with rows",
						table, column.name
					)));
				}
				self.schema.apply(op)
			}
			SchemaOp::CreateTable {
				name, primary_key, ..
			} => {
				self.schema.apply(op)?;
				self.seeds.create_table(name, primary_key.clone());
				Ok(())
			}
			SchemaOp::DropTable { name } => {
				self.schema.apply(op)?;
				self.seeds.drop_table(name);
				Ok(())
			}
			SchemaOp::DropColumn { table, column } => {
				self.schema.apply(op)?;
				self.seeds.drop_column(table, column);
				Ok(())
			}
			SchemaOp::RenameColumn { table, from, to } => {
				self.schema.apply(op)?;
				self.seeds.rename_column(table, from, to);
				Ok(())
			}
			SchemaOp::CreateIndex {
				table,
				columns,
				unique,
			} => {
				self.schema.apply(op)?;
				if *unique {
					self.check_unique_over_existing(table, columns)?;
				}
				Ok(())
			}
			SchemaOp::AddForeignKey {
				table,
				column,
				principal_table,
				..
			} => {
				self.schema.apply(op)?;
				let name = crate::operations::foreign_key_name(table, principal_table, column);
				crate::seed::check_existing_references(&self.schema, &self.seeds, &name)
			}
			SchemaOp::DropIndex { .. } | SchemaOp::DropForeignKey { .. } => self.schema.apply(op),
		}
	}

	/// A freshly created unique index must hold over rows already seeded.
	fn check_unique_over_existing(&self, table: &str, columns: &[String]) -> Result<()> {
		let Some(entry) = self.seeds.table(table) else {
			return Ok(());
		};
		let mut seen = std::collections::HashSet::new();
		for row in entry.rows.values() {
			let tuple: Option<Vec<&crate::value::Value>> =
				columns.iter().map(|c| row.get(c)).collect();
			let Some(tuple) = tuple else {
				continue; // NULL in an indexed column exempts the row
			};
			if !seen.insert(tuple.clone()) {
				return Err(MigrateError::DuplicateKey {
					table: table.to_string(),
					key: format!(
						"unique index {} value {:?}",
						crate::operations::index_name(table, columns),
						tuple
					),
				});
			}
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::operations::{SchemaOp, SeedOp};
	use crate::schema::{ColumnSchema, ColumnType, ForeignKeyAction};
	use crate::value::Value;
	use indexmap::IndexMap;
	use uuid::Uuid;

	fn uuid(n: u128) -> Uuid {
		Uuid::from_u128(n)
	}

	fn categories(state: &mut DatabaseState) {
		state
			.apply_schema_op(&SchemaOp::CreateTable {
				name: "Categories".to_string(),
				columns: vec![
					ColumnSchema::new("CategoryId", ColumnType::Uuid, false),
					ColumnSchema::new("CategoryName", ColumnType::VarChar(200), false),
				],
				primary_key: vec!["CategoryId".to_string()],
			})
			.unwrap();
	}

	fn insert_category(id: u128, name: &str) -> StepOp {
		SeedOp::InsertRow {
			table: "Categories".to_string(),
			key_columns: vec!["CategoryId".to_string()],
			key_values: vec![Value::Uuid(uuid(id))],
			columns: IndexMap::from([("CategoryName".to_string(), Value::from(name))]),
		}
		.into()
	}

	#[test]
	fn insert_then_duplicate_key_is_fatal() {
		let mut state = DatabaseState::new();
		categories(&mut state);
		state
			.apply(&insert_category(1, "Structural"), Strictness::Strict)
			.unwrap();
		let err = state
			.apply(&insert_category(1, "Structural"), Strictness::Strict)
			.unwrap_err();
		assert!(matches!(err, MigrateError::DuplicateKey { .. }));
	}

	#[test]
	fn unique_index_rejects_second_name() {
		let mut state = DatabaseState::new();
		categories(&mut state);
		state
			.apply_schema_op(&SchemaOp::CreateIndex {
				table: "Categories".to_string(),
				columns: vec!["CategoryName".to_string()],
				unique: true,
			})
			.unwrap();
		state
			.apply(&insert_category(1, "Structural"), Strictness::Strict)
			.unwrap();
		let err = state
			.apply(&insert_category(2, "Structural"), Strictness::Strict)
			.unwrap_err();
		assert!(matches!(err, MigrateError::DuplicateKey { .. }));
	}

	#[test]
	fn adding_foreign_key_over_orphans_fails() {
		let mut state = DatabaseState::new();
		categories(&mut state);
		state
			.apply_schema_op(&SchemaOp::CreateTable {
				name: "PredefinedChecklistItems".to_string(),
				columns: vec![
					ColumnSchema::new("PredefinedItemId", ColumnType::Uuid, false),
					ColumnSchema::new("CategoryId", ColumnType::Uuid, true),
				],
				primary_key: vec!["PredefinedItemId".to_string()],
			})
			.unwrap();
		state
			.apply(
				&SeedOp::InsertRow {
					table: "PredefinedChecklistItems".to_string(),
					key_columns: vec!["PredefinedItemId".to_string()],
					key_values: vec![Value::Uuid(uuid(10))],
					columns: IndexMap::from([("CategoryId".to_string(), Value::Uuid(uuid(99)))]),
				}
				.into(),
				Strictness::Strict,
			)
			.unwrap();

		let err = state
			.apply_schema_op(&SchemaOp::AddForeignKey {
				table: "PredefinedChecklistItems".to_string(),
				column: "CategoryId".to_string(),
				principal_table: "Categories".to_string(),
				principal_column: "CategoryId".to_string(),
				on_delete: ForeignKeyAction::SetNull,
			})
			.unwrap_err();
		assert!(matches!(err, MigrateError::ForeignKeyViolation { .. }));
	}

	#[test]
	fn set_null_clears_dependents_on_delete() {
		let mut state = DatabaseState::new();
		categories(&mut state);
		state
			.apply_schema_op(&SchemaOp::CreateTable {
				name: "PredefinedChecklistItems".to_string(),
				columns: vec![
					ColumnSchema::new("PredefinedItemId", ColumnType::Uuid, false),
					ColumnSchema::new("CategoryId", ColumnType::Uuid, true),
				],
				primary_key: vec!["PredefinedItemId".to_string()],
			})
			.unwrap();
		state
			.apply_schema_op(&SchemaOp::AddForeignKey {
				table: "PredefinedChecklistItems".to_string(),
				column: "CategoryId".to_string(),
				principal_table: "Categories".to_string(),
				principal_column: "CategoryId".to_string(),
				on_delete: ForeignKeyAction::SetNull,
			})
			.unwrap();
		state
			.apply(&insert_category(1, "Structural"), Strictness::Strict)
			.unwrap();
		state
			.apply(
				&SeedOp::InsertRow {
					table: "PredefinedChecklistItems".to_string(),
					key_columns: vec!["PredefinedItemId".to_string()],
					key_values: vec![Value::Uuid(uuid(10))],
					columns: IndexMap::from([("CategoryId".to_string(), Value::Uuid(uuid(1)))]),
				}
				.into(),
				Strictness::Strict,
			)
			.unwrap();

		state
			.apply(
				&SeedOp::DeleteRow {
					table: "Categories".to_string(),
					key_columns: vec!["CategoryId".to_string()],
					key_values: vec![Value::Uuid(uuid(1))],
				}
				.into(),
				Strictness::Strict,
			)
			.unwrap();

		let row = state
			.seeds
			.row(
				"PredefinedChecklistItems",
				&crate::seed::RowKey(vec![Value::Uuid(uuid(10))]),
			)
			.unwrap();
		assert!(row.get("CategoryId").is_none());
	}

	#[test]
	fn missing_key_respects_strictness() {
		let mut state = DatabaseState::new();
		categories(&mut state);
		let delete: StepOp = SeedOp::DeleteRow {
			table: "Categories".to_string(),
			key_columns: vec!["CategoryId".to_string()],
			key_values: vec![Value::Uuid(uuid(42))],
		}
		.into();

		let err = state
			.clone()
			.apply(&delete, Strictness::Strict)
			.unwrap_err();
		assert!(matches!(err, MigrateError::MissingKey { .. }));

		state.apply(&delete, Strictness::IdempotentRecovery).unwrap();
	}
}
