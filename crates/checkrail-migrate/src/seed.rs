//! Seed-data reconciliation
//!
//! Keyed row state for every table plus the reconciler that applies
//! `SeedOp`s against it. Updates touch only the named columns, so forward
//! and backward steps can each mutate a disjoint or overlapping column
//! subset without clobbering fields the other didn't intend to touch.
//!
//! An absent cell is NULL; rows store only non-null values so state
//! comparison is representation-independent.

use crate::operations::SeedOp;
use crate::schema::{ForeignKeyAction, SchemaObjectModel, TableSchema};
use crate::value::Value;
use crate::{MigrateError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Missing-key behavior for `UpdateRow`/`DeleteRow`.
///
/// Fixed engine-wide so Up and Down can never silently diverge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
	/// A missing key is a fatal `MissingKey` integrity error.
	#[default]
	Strict,
	/// A missing key is treated as already reconciled (crash re-run mode).
	IdempotentRecovery,
}

/// Identity of one seed row: its key column values in key-column order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowKey(pub Vec<Value>);

impl std::fmt::Display for RowKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		let parts: Vec<String> = self.0.iter().map(|v| v.to_string()).collect();
		write!(f, "({})", parts.join(", "))
	}
}

/// Non-null cells of one row, keyed by column name.
pub type Row = IndexMap<String, Value>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedTable {
	pub key_columns: Vec<String>,
	pub rows: IndexMap<RowKey, Row>,
}

/// All seed rows currently present, per table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedState {
	tables: IndexMap<String, SeedTable>,
}

impl SeedState {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn table(&self, name: &str) -> Option<&SeedTable> {
		self.tables.get(name)
	}

	pub fn row(&self, table: &str, key: &RowKey) -> Option<&Row> {
		self.tables.get(table)?.rows.get(key)
	}

	pub fn row_count(&self, table: &str) -> usize {
		self.tables.get(table).map(|t| t.rows.len()).unwrap_or(0)
	}

	pub(crate) fn create_table(&mut self, name: &str, key_columns: Vec<String>) {
		self.tables.insert(
			name.to_string(),
			SeedTable {
				key_columns,
				rows: IndexMap::new(),
			},
		);
	}

	pub(crate) fn drop_table(&mut self, name: &str) {
		self.tables.shift_remove(name);
	}

	pub(crate) fn drop_column(&mut self, table: &str, column: &str) {
		if let Some(entry) = self.tables.get_mut(table) {
			for row in entry.rows.values_mut() {
				row.shift_remove(column);
			}
		}
	}

	pub(crate) fn rename_column(&mut self, table: &str, from: &str, to: &str) {
		if let Some(entry) = self.tables.get_mut(table) {
			for key in entry.key_columns.iter_mut() {
				if key == from {
					*key = to.to_string();
				}
			}
			for row in entry.rows.values_mut() {
				if let Some(value) = row.shift_remove(from) {
					row.insert(to.to_string(), value);
				}
			}
		}
	}
}

/// Applies row-level operations against keyed seed data.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeedReconciler {
	strictness: Strictness,
}

impl SeedReconciler {
	pub fn new(strictness: Strictness) -> Self {
		Self { strictness }
	}

	pub fn strictness(&self) -> Strictness {
		self.strictness
	}

	/// Apply one seed operation. The schema model is consulted for column
	/// existence, types, nullability, unique indexes, and foreign keys.
	pub fn apply(
		&self,
		schema: &SchemaObjectModel,
		seeds: &mut SeedState,
		op: &SeedOp,
	) -> Result<()> {
		match op {
			SeedOp::InsertRow {
				table,
				key_columns,
				key_values,
				columns,
			} => self.insert(schema, seeds, table, key_columns, key_values, columns),
			SeedOp::UpdateRow {
				table,
				key_columns,
				key_values,
				changes,
			} => self.update(schema, seeds, table, key_columns, key_values, changes),
			SeedOp::DeleteRow {
				table,
				key_columns,
				key_values,
			} => self.delete(schema, seeds, table, key_columns, key_values),
		}
	}

	fn insert(
		&self,
		schema: &SchemaObjectModel,
		seeds: &mut SeedState,
		table: &str,
		key_columns: &[String],
		key_values: &[Value],
		columns: &IndexMap<String, Value>,
	) -> Result<()> {
		let table_schema = require_table(schema, table)?;
		let key = check_key(table_schema, seeds, table, key_columns, key_values)?;

		let mut row: Row = IndexMap::new();
		for (column, value) in key_columns.iter().zip(key_values.iter()) {
			check_cell(table_schema, table, column, value)?;
			if value.is_null() {
				return Err(MigrateError::SchemaConflict(format!(
					"key column {}.{} cannot be NULL",
					table, column
				)));
			}
			row.insert(column.clone(), value.clone());
		}
		for (column, value) in columns {
			if key_columns.contains(column) {
				return Err(MigrateError::SchemaConflict(format!(
					"column {}.{} given both as key and value",
					table, column
				)));
			}
			check_cell(table_schema, table, column, value)?;
			if !value.is_null() {
				row.insert(column.clone(), value.clone());
			}
		}
		for column in table_schema.columns.values() {
			if !column.nullable && !row.contains_key(&column.name) {
				return Err(MigrateError::SchemaConflict(format!(
					"column {}.{} is not nullable and has no value",
					table, column.name
				)));
			}
		}

		// Duplicate key is a corruption signal and always fatal.
		if seeds.row(table, &key).is_some() {
			return Err(MigrateError::DuplicateKey {
				table: table.to_string(),
				key: key.to_string(),
			});
		}

		self.check_unique_indexes(schema, seeds, table, &key, &row)?;
		self.check_outgoing_references(schema, seeds, table, &row)?;

		let entry = seeds.tables.get_mut(table).ok_or_else(|| {
			MigrateError::SchemaConflict(format!("no seed table for {}", table))
		})?;
		entry.rows.insert(key, row);
		Ok(())
	}

	fn update(
		&self,
		schema: &SchemaObjectModel,
		seeds: &mut SeedState,
		table: &str,
		key_columns: &[String],
		key_values: &[Value],
		changes: &IndexMap<String, Value>,
	) -> Result<()> {
		let table_schema = require_table(schema, table)?;
		let key = check_key(table_schema, seeds, table, key_columns, key_values)?;

		let Some(current) = seeds.row(table, &key) else {
			return match self.strictness {
				Strictness::IdempotentRecovery => Ok(()),
				Strictness::Strict => Err(MigrateError::MissingKey {
					table: table.to_string(),
					key: key.to_string(),
				}),
			};
		};

		let mut next = current.clone();
		for (column, value) in changes {
			if key_columns.contains(column) {
				return Err(MigrateError::SchemaConflict(format!(
					"key column {}.{} cannot be updated in place",
					table, column
				)));
			}
			let column_schema = check_cell(table_schema, table, column, value)?;
			if value.is_null() {
				if !column_schema.nullable {
					return Err(MigrateError::SchemaConflict(format!(
						"column {}.{} is not nullable",
						table, column
					)));
				}
				next.shift_remove(column);
			} else {
				next.insert(column.clone(), value.clone());
			}
		}

		self.check_unique_indexes(schema, seeds, table, &key, &next)?;
		self.check_outgoing_references(schema, seeds, table, &next)?;

		let entry = seeds.tables.get_mut(table).ok_or_else(|| {
			MigrateError::SchemaConflict(format!("no seed table for {}", table))
		})?;
		entry.rows.insert(key, next);
		Ok(())
	}

	fn delete(
		&self,
		schema: &SchemaObjectModel,
		seeds: &mut SeedState,
		table: &str,
		key_columns: &[String],
		key_values: &[Value],
	) -> Result<()> {
		let table_schema = require_table(schema, table)?;
		let key = check_key(table_schema, seeds, table, key_columns, key_values)?;

		if seeds.row(table, &key).is_none() {
			return match self.strictness {
				Strictness::IdempotentRecovery => Ok(()),
				Strictness::Strict => Err(MigrateError::MissingKey {
					table: table.to_string(),
					key: key.to_string(),
				}),
			};
		}

		self.delete_resolved(schema, seeds, table, &key)
	}

	/// Delete one known-present row, honoring on-delete actions of foreign
	/// keys that reference this table.
	fn delete_resolved(
		&self,
		schema: &SchemaObjectModel,
		seeds: &mut SeedState,
		table: &str,
		key: &RowKey,
	) -> Result<()> {
		let Some(row) = seeds.row(table, key).cloned() else {
			return Ok(()); // removed by an earlier cascade
		};

		for fk in schema.foreign_keys_referencing(table) {
			let Some(principal_value) = row.get(&fk.principal_column).cloned() else {
				continue;
			};
			let dependents: Vec<RowKey> = seeds
				.table(&fk.table)
				.map(|t| {
					t.rows
						.iter()
						.filter(|(_, r)| r.get(&fk.column) == Some(&principal_value))
						.map(|(k, _)| k.clone())
						.collect()
				})
				.unwrap_or_default();
			if dependents.is_empty() {
				continue;
			}
			match fk.on_delete {
				ForeignKeyAction::Restrict => {
					return Err(MigrateError::ForeignKeyViolation {
						table: fk.table.clone(),
						column: fk.column.clone(),
						detail: format!(
							"{} row(s) still reference {} row {}",
							dependents.len(),
							table,
							key
						),
					});
				}
				ForeignKeyAction::SetNull => {
					if let Some(entry) = seeds.tables.get_mut(&fk.table) {
						for dependent in &dependents {
							if let Some(r) = entry.rows.get_mut(dependent) {
								r.shift_remove(&fk.column);
							}
						}
					}
				}
				ForeignKeyAction::Cascade => {
					for dependent in dependents {
						self.delete_resolved(schema, seeds, &fk.table, &dependent)?;
					}
				}
			}
		}

		if let Some(entry) = seeds.tables.get_mut(table) {
			entry.rows.shift_remove(key);
		}
		Ok(())
	}

	/// No two rows may collide on a unique index; rows with a NULL in an
	/// indexed column are exempt, as in SQL.
	fn check_unique_indexes(
		&self,
		schema: &SchemaObjectModel,
		seeds: &SeedState,
		table: &str,
		key: &RowKey,
		candidate: &Row,
	) -> Result<()> {
		for ix in schema.indexes_on(table).filter(|ix| ix.unique) {
			let tuple: Option<Vec<&Value>> =
				ix.columns.iter().map(|c| candidate.get(c)).collect();
			let Some(tuple) = tuple else {
				continue;
			};
			if let Some(entry) = seeds.table(table) {
				for (other_key, other) in &entry.rows {
					if other_key == key {
						continue;
					}
					let other_tuple: Option<Vec<&Value>> =
						ix.columns.iter().map(|c| other.get(c)).collect();
					if other_tuple == Some(tuple.clone()) {
						return Err(MigrateError::DuplicateKey {
							table: table.to_string(),
							key: format!("unique index {} value {:?}", ix.name, tuple),
						});
					}
				}
			}
		}
		Ok(())
	}

	/// Every non-null foreign key cell must point at an existing principal
	/// row.
	fn check_outgoing_references(
		&self,
		schema: &SchemaObjectModel,
		seeds: &SeedState,
		table: &str,
		row: &Row,
	) -> Result<()> {
		for fk in schema.foreign_keys_on(table) {
			let Some(value) = row.get(&fk.column) else {
				continue;
			};
			let found = seeds
				.table(&fk.principal_table)
				.map(|t| {
					t.rows
						.values()
						.any(|r| r.get(&fk.principal_column) == Some(value))
				})
				.unwrap_or(false);
			if !found {
				return Err(MigrateError::ForeignKeyViolation {
					table: table.to_string(),
					column: fk.column.clone(),
					detail: format!(
						"value {} has no matching row in {}.{}",
						value, fk.principal_table, fk.principal_column
					),
				});
			}
		}
		Ok(())
	}
}

/// Verify orphan-free state of a table after a foreign key is added over
/// existing rows.
pub(crate) fn check_existing_references(
	schema: &SchemaObjectModel,
	seeds: &SeedState,
	fk_name: &str,
) -> Result<()> {
	let Some(fk) = schema.foreign_key(fk_name) else {
		return Ok(());
	};
	let Some(entry) = seeds.table(&fk.table) else {
		return Ok(());
	};
	for (key, row) in &entry.rows {
		let Some(value) = row.get(&fk.column) else {
			continue;
		};
		let found = seeds
			.table(&fk.principal_table)
			.map(|t| {
				t.rows
					.values()
					.any(|r| r.get(&fk.principal_column) == Some(value))
			})
			.unwrap_or(false);
		if !found {
			return Err(MigrateError::ForeignKeyViolation {
				table: fk.table.clone(),
				column: fk.column.clone(),
				detail: format!("existing row {} references missing {} row", key, fk.principal_table),
			});
		}
	}
	Ok(())
}

fn require_table<'a>(schema: &'a SchemaObjectModel, table: &str) -> Result<&'a TableSchema> {
	schema
		.table(table)
		.ok_or_else(|| MigrateError::SchemaConflict(format!("table {} does not exist", table)))
}

fn check_key(
	table_schema: &TableSchema,
	seeds: &SeedState,
	table: &str,
	key_columns: &[String],
	key_values: &[Value],
) -> Result<RowKey> {
	if key_columns.len() != key_values.len() {
		return Err(MigrateError::SchemaConflict(format!(
			"{}: {} key columns but {} key values",
			table,
			key_columns.len(),
			key_values.len()
		)));
	}
	let expected = seeds
		.table(table)
		.map(|t| t.key_columns.clone())
		.unwrap_or_else(|| table_schema.primary_key.clone());
	if key_columns != expected.as_slice() {
		return Err(MigrateError::SchemaConflict(format!(
			"{}: key columns {:?} do not match primary key {:?}",
			table, key_columns, expected
		)));
	}
	Ok(RowKey(key_values.to_vec()))
}

fn check_cell<'a>(
	table_schema: &'a TableSchema,
	table: &str,
	column: &str,
	value: &Value,
) -> Result<&'a crate::schema::ColumnSchema> {
	let column_schema = table_schema.column(column).ok_or_else(|| {
		MigrateError::SchemaConflict(format!("column {}.{} does not exist", table, column))
	})?;
	if !column_schema.column_type.accepts(value) {
		return Err(MigrateError::SchemaConflict(format!(
			"value of type {} not storable in {}.{}",
			value.type_name(),
			table,
			column
		)));
	}
	Ok(column_schema)
}
