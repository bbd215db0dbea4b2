//! Schema object model
//!
//! In-memory representation of tables, columns, indexes and foreign keys.
//! The model is the authority for structural integrity: every `SchemaOp` is
//! validated against it before any statement reaches the store.

use crate::operations::SchemaOp;
use crate::value::Value;
use crate::{MigrateError, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Column data types supported by the checklist schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
	Uuid,
	VarChar(u32),
	Text,
	Integer,
	Boolean,
	DateTime,
}

impl ColumnType {
	/// Whether a seed value is storable in a column of this type.
	pub fn accepts(&self, value: &Value) -> bool {
		match (self, value) {
			(_, Value::Null) => true,
			(ColumnType::Uuid, Value::Uuid(_)) => true,
			(ColumnType::VarChar(_), Value::Text(_)) => true,
			(ColumnType::Text, Value::Text(_)) => true,
			(ColumnType::Integer, Value::Integer(_)) => true,
			(ColumnType::Boolean, Value::Boolean(_)) => true,
			(ColumnType::DateTime, Value::Timestamp(_)) => true,
			_ => false,
		}
	}
}

/// Referential action applied when a principal row is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForeignKeyAction {
	Cascade,
	SetNull,
	Restrict,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
	pub name: String,
	pub column_type: ColumnType,
	pub nullable: bool,
}

impl ColumnSchema {
	pub fn new(name: impl Into<String>, column_type: ColumnType, nullable: bool) -> Self {
		Self {
			name: name.into(),
			column_type,
			nullable,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableSchema {
	pub name: String,
	pub columns: IndexMap<String, ColumnSchema>,
	pub primary_key: Vec<String>,
}

impl TableSchema {
	pub fn column(&self, name: &str) -> Option<&ColumnSchema> {
		self.columns.get(name)
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSchema {
	pub name: String,
	pub table: String,
	pub columns: Vec<String>,
	pub unique: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKeySchema {
	pub name: String,
	pub table: String,
	pub column: String,
	pub principal_table: String,
	pub principal_column: String,
	pub on_delete: ForeignKeyAction,
}

impl ForeignKeySchema {
	/// Whether this constraint touches the given table on either side.
	pub fn mentions(&self, table: &str) -> bool {
		self.table == table || self.principal_table == table
	}
}

/// Snapshot of the relational schema at one point in the migration history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaObjectModel {
	tables: IndexMap<String, TableSchema>,
	indexes: IndexMap<String, IndexSchema>,
	foreign_keys: IndexMap<String, ForeignKeySchema>,
}

impl SchemaObjectModel {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn table(&self, name: &str) -> Option<&TableSchema> {
		self.tables.get(name)
	}

	pub fn tables(&self) -> impl Iterator<Item = &TableSchema> {
		self.tables.values()
	}

	pub fn index(&self, name: &str) -> Option<&IndexSchema> {
		self.indexes.get(name)
	}

	pub fn foreign_key(&self, name: &str) -> Option<&ForeignKeySchema> {
		self.foreign_keys.get(name)
	}

	/// Foreign keys declared on `table` (the dependent side).
	pub fn foreign_keys_on<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a ForeignKeySchema> {
		self.foreign_keys.values().filter(move |fk| fk.table == table)
	}

	/// Foreign keys whose principal side is `table`.
	pub fn foreign_keys_referencing<'a>(
		&'a self,
		table: &'a str,
	) -> impl Iterator<Item = &'a ForeignKeySchema> {
		self.foreign_keys
			.values()
			.filter(move |fk| fk.principal_table == table)
	}

	pub fn indexes_on<'a>(&'a self, table: &'a str) -> impl Iterator<Item = &'a IndexSchema> {
		self.indexes.values().filter(move |ix| ix.table == table)
	}

	fn require_table(&self, name: &str) -> Result<&TableSchema> {
		self.tables
			.get(name)
			.ok_or_else(|| MigrateError::SchemaConflict(format!("table {} does not exist", name)))
	}

	fn require_column<'a>(&'a self, table: &str, column: &str) -> Result<&'a ColumnSchema> {
		self.require_table(table)?.column(column).ok_or_else(|| {
			MigrateError::SchemaConflict(format!("column {}.{} does not exist", table, column))
		})
	}

	/// Apply the structural part of a schema operation.
	///
	/// Enforces the structural invariants: a table cannot be dropped while a
	/// foreign key still mentions it, a foreign key cannot be added before
	/// both endpoints exist, names must be free, and dropped columns must not
	/// be load-bearing for the primary key, an index, or a constraint.
	pub fn apply(&mut self, op: &SchemaOp) -> Result<()> {
		match op {
			SchemaOp::CreateTable {
				name,
				columns,
				primary_key,
			} => {
				if self.tables.contains_key(name) {
					return Err(MigrateError::SchemaConflict(format!(
						"table {} already exists",
						name
					)));
				}
				let mut column_map = IndexMap::new();
				for column in columns {
					if column_map.insert(column.name.clone(), column.clone()).is_some() {
						return Err(MigrateError::SchemaConflict(format!(
							"duplicate column {}.{}",
							name, column.name
						)));
					}
				}
				for key in primary_key {
					let column = column_map.get(key).ok_or_else(|| {
						MigrateError::SchemaConflict(format!(
							"primary key column {}.{} is not defined",
							name, key
						))
					})?;
					if column.nullable {
						return Err(MigrateError::SchemaConflict(format!(
							"primary key column {}.{} cannot be nullable",
							name, key
						)));
					}
				}
				if primary_key.is_empty() {
					return Err(MigrateError::SchemaConflict(format!(
						"table {} has no primary key",
						name
					)));
				}
				self.tables.insert(
					name.clone(),
					TableSchema {
						name: name.clone(),
						columns: column_map,
						primary_key: primary_key.clone(),
					},
				);
			}
			SchemaOp::DropTable { name } => {
				self.require_table(name)?;
				if let Some(fk) = self.foreign_keys.values().find(|fk| fk.mentions(name)) {
					return Err(MigrateError::ForeignKeyViolation {
						table: name.clone(),
						column: fk.column.clone(),
						detail: format!("constraint {} still references the table", fk.name),
					});
				}
				// Indexes on the table go with it.
				self.indexes.retain(|_, ix| ix.table != *name);
				self.tables.shift_remove(name);
			}
			SchemaOp::AddColumn { table, column } => {
				let entry = self.tables.get_mut(table).ok_or_else(|| {
					MigrateError::SchemaConflict(format!("table {} does not exist", table))
				})?;
				if entry.columns.contains_key(&column.name) {
					return Err(MigrateError::SchemaConflict(format!(
						"column {}.{} already exists",
						table, column.name
					)));
				}
				entry.columns.insert(column.name.clone(), column.clone());
			}
			SchemaOp::DropColumn { table, column } => {
				self.require_column(table, column)?;
				let schema = self.require_table(table)?;
				if schema.primary_key.iter().any(|k| k == column) {
					return Err(MigrateError::SchemaConflict(format!(
						"column {}.{} is part of the primary key",
						table, column
					)));
				}
				if let Some(ix) = self
					.indexes
					.values()
					.find(|ix| ix.table == *table && ix.columns.iter().any(|c| c == column))
				{
					return Err(MigrateError::SchemaConflict(format!(
						"column {}.{} is indexed by {}",
						table, column, ix.name
					)));
				}
				if let Some(fk) = self.foreign_keys.values().find(|fk| {
					(fk.table == *table && fk.column == *column)
						|| (fk.principal_table == *table && fk.principal_column == *column)
				}) {
					return Err(MigrateError::ForeignKeyViolation {
						table: table.clone(),
						column: column.clone(),
						detail: format!("constraint {} uses the column", fk.name),
					});
				}
				if let Some(entry) = self.tables.get_mut(table) {
					entry.columns.shift_remove(column);
				}
			}
			SchemaOp::RenameColumn { table, from, to } => {
				self.require_column(table, from)?;
				if self.require_table(table)?.columns.contains_key(to) {
					return Err(MigrateError::SchemaConflict(format!(
						"column {}.{} already exists",
						table, to
					)));
				}
				let entry = self.tables.get_mut(table).ok_or_else(|| {
					MigrateError::SchemaConflict(format!("table {} does not exist", table))
				})?;
				if let Some(index) = entry.columns.get_index_of(from)
					&& let Some((_, mut column)) = entry.columns.shift_remove_index(index)
				{
					column.name = to.clone();
					entry.columns.shift_insert(index, to.clone(), column);
				}
				for key in entry.primary_key.iter_mut() {
					if key == from {
						*key = to.clone();
					}
				}
				// Index and constraint names derive from their column lists,
				// so a rename re-keys them.
				let index_names: Vec<String> = self
					.indexes
					.values()
					.filter(|ix| ix.table == *table && ix.columns.iter().any(|c| c == from))
					.map(|ix| ix.name.clone())
					.collect();
				for name in index_names {
					if let Some(position) = self.indexes.get_index_of(&name)
						&& let Some((_, mut ix)) = self.indexes.shift_remove_index(position)
					{
						for c in ix.columns.iter_mut() {
							if c == from {
								*c = to.clone();
							}
						}
						ix.name = crate::operations::index_name(&ix.table, &ix.columns);
						self.indexes.shift_insert(position, ix.name.clone(), ix);
					}
				}
				let fk_names: Vec<String> = self
					.foreign_keys
					.values()
					.filter(|fk| fk.table == *table && fk.column == *from)
					.map(|fk| fk.name.clone())
					.collect();
				for name in fk_names {
					if let Some(position) = self.foreign_keys.get_index_of(&name)
						&& let Some((_, mut fk)) = self.foreign_keys.shift_remove_index(position)
					{
						fk.column = to.clone();
						fk.name = crate::operations::foreign_key_name(
							&fk.table,
							&fk.principal_table,
							&fk.column,
						);
						self.foreign_keys.shift_insert(position, fk.name.clone(), fk);
					}
				}
				// The principal column is not part of the derived name.
				for fk in self.foreign_keys.values_mut() {
					if fk.principal_table == *table && fk.principal_column == *from {
						fk.principal_column = to.clone();
					}
				}
			}
			SchemaOp::CreateIndex {
				table,
				columns,
				unique,
			} => {
				for column in columns {
					self.require_column(table, column)?;
				}
				let name = crate::operations::index_name(table, columns);
				if self.indexes.contains_key(&name) {
					return Err(MigrateError::SchemaConflict(format!(
						"index {} already exists",
						name
					)));
				}
				self.indexes.insert(
					name.clone(),
					IndexSchema {
						name,
						table: table.clone(),
						columns: columns.clone(),
						unique: *unique,
					},
				);
			}
			SchemaOp::DropIndex { name } => {
				if self.indexes.shift_remove(name).is_none() {
					return Err(MigrateError::SchemaConflict(format!(
						"index {} does not exist",
						name
					)));
				}
			}
			SchemaOp::AddForeignKey {
				table,
				column,
				principal_table,
				principal_column,
				on_delete,
			} => {
				let dependent = self.require_column(table, column)?.clone();
				let principal = self.require_column(principal_table, principal_column)?.clone();
				if dependent.column_type != principal.column_type {
					return Err(MigrateError::SchemaConflict(format!(
						"foreign key {}.{} type does not match {}.{}",
						table, column, principal_table, principal_column
					)));
				}
				let principal_schema = self.require_table(principal_table)?;
				let is_pk = principal_schema.primary_key == [principal_column.clone()];
				let is_unique = self.indexes.values().any(|ix| {
					ix.unique && ix.table == *principal_table && ix.columns == [principal_column.clone()]
				});
				if !is_pk && !is_unique {
					return Err(MigrateError::SchemaConflict(format!(
						"referenced column {}.{} is neither the primary key nor unique",
						principal_table, principal_column
					)));
				}
				if *on_delete == ForeignKeyAction::SetNull && !dependent.nullable {
					return Err(MigrateError::SchemaConflict(format!(
						"SET NULL foreign key on non-nullable column {}.{}",
						table, column
					)));
				}
				let name = crate::operations::foreign_key_name(table, principal_table, column);
				if self.foreign_keys.contains_key(&name) {
					return Err(MigrateError::SchemaConflict(format!(
						"constraint {} already exists",
						name
					)));
				}
				self.foreign_keys.insert(
					name.clone(),
					ForeignKeySchema {
						name,
						table: table.clone(),
						column: column.clone(),
						principal_table: principal_table.clone(),
						principal_column: principal_column.clone(),
						on_delete: *on_delete,
					},
				);
			}
			SchemaOp::DropForeignKey { table, name } => match self.foreign_keys.get(name) {
				Some(fk) if fk.table == *table => {
					self.foreign_keys.shift_remove(name);
				}
				Some(fk) => {
					return Err(MigrateError::SchemaConflict(format!(
						"constraint {} belongs to table {}, not {}",
						name, fk.table, table
					)));
				}
				None => {
					return Err(MigrateError::SchemaConflict(format!(
						"constraint {} does not exist",
						name
					)));
				}
			},
		}
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::operations::{foreign_key_name, SchemaOp};

	fn checklists_table() -> SchemaOp {
		SchemaOp::CreateTable {
			name: "Checklists".to_string(),
			columns: vec![
				ColumnSchema::new("ChecklistId", ColumnType::Uuid, false),
				ColumnSchema::new("Code", ColumnType::VarChar(50), false),
			],
			primary_key: vec!["ChecklistId".to_string()],
		}
	}

	#[test]
	fn create_table_then_duplicate_conflicts() {
		let mut model = SchemaObjectModel::new();
		model.apply(&checklists_table()).unwrap();
		assert!(model.table("Checklists").is_some());

		let err = model.apply(&checklists_table()).unwrap_err();
		assert!(matches!(err, MigrateError::SchemaConflict(_)));
	}

	#[test]
	fn drop_table_blocked_by_foreign_key() {
		let mut model = SchemaObjectModel::new();
		model.apply(&checklists_table()).unwrap();
		model
			.apply(&SchemaOp::CreateTable {
				name: "ChecklistSections".to_string(),
				columns: vec![
					ColumnSchema::new("SectionId", ColumnType::Uuid, false),
					ColumnSchema::new("ChecklistId", ColumnType::Uuid, true),
				],
				primary_key: vec!["SectionId".to_string()],
			})
			.unwrap();
		model
			.apply(&SchemaOp::AddForeignKey {
				table: "ChecklistSections".to_string(),
				column: "ChecklistId".to_string(),
				principal_table: "Checklists".to_string(),
				principal_column: "ChecklistId".to_string(),
				on_delete: ForeignKeyAction::SetNull,
			})
			.unwrap();

		let err = model
			.apply(&SchemaOp::DropTable {
				name: "Checklists".to_string(),
			})
			.unwrap_err();
		assert!(matches!(err, MigrateError::ForeignKeyViolation { .. }));

		model
			.apply(&SchemaOp::DropForeignKey {
				table: "ChecklistSections".to_string(),
				name: foreign_key_name("ChecklistSections", "Checklists", "ChecklistId"),
			})
			.unwrap();
		model
			.apply(&SchemaOp::DropTable {
				name: "Checklists".to_string(),
			})
			.unwrap();
	}

	#[test]
	fn foreign_key_requires_both_endpoints() {
		let mut model = SchemaObjectModel::new();
		model.apply(&checklists_table()).unwrap();
		let err = model
			.apply(&SchemaOp::AddForeignKey {
				table: "ChecklistSections".to_string(),
				column: "ChecklistId".to_string(),
				principal_table: "Checklists".to_string(),
				principal_column: "ChecklistId".to_string(),
				on_delete: ForeignKeyAction::SetNull,
			})
			.unwrap_err();
		assert!(matches!(err, MigrateError::SchemaConflict(_)));
	}

	#[test]
	fn rename_column_rewrites_references() {
		let mut model = SchemaObjectModel::new();
		model.apply(&checklists_table()).unwrap();
		model
			.apply(&SchemaOp::CreateIndex {
				table: "Checklists".to_string(),
				columns: vec!["Code".to_string()],
				unique: true,
			})
			.unwrap();
		model
			.apply(&SchemaOp::RenameColumn {
				table: "Checklists".to_string(),
				from: "Code".to_string(),
				to: "WirCode".to_string(),
			})
			.unwrap();

		let table = model.table("Checklists").unwrap();
		assert!(table.column("WirCode").is_some());
		assert!(table.column("Code").is_none());
		let ix = model.indexes_on("Checklists").next().unwrap();
		assert_eq!(ix.columns, vec!["WirCode".to_string()]);
		// The derived name follows the column it indexes.
		assert_eq!(
			ix.name,
			crate::operations::index_name("Checklists", &["WirCode".to_string()])
		);
		assert!(
			model
				.index(&crate::operations::index_name("Checklists", &["Code".to_string()]))
				.is_none()
		);
	}

	#[test]
	fn rename_column_rekeys_foreign_key() {
		let mut model = SchemaObjectModel::new();
		model.apply(&checklists_table()).unwrap();
		model
			.apply(&SchemaOp::CreateTable {
				name: "ChecklistSections".to_string(),
				columns: vec![
					ColumnSchema::new("SectionId", ColumnType::Uuid, false),
					ColumnSchema::new("ChecklistId", ColumnType::Uuid, true),
				],
				primary_key: vec!["SectionId".to_string()],
			})
			.unwrap();
		model
			.apply(&SchemaOp::AddForeignKey {
				table: "ChecklistSections".to_string(),
				column: "ChecklistId".to_string(),
				principal_table: "Checklists".to_string(),
				principal_column: "ChecklistId".to_string(),
				on_delete: ForeignKeyAction::SetNull,
			})
			.unwrap();
		model
			.apply(&SchemaOp::RenameColumn {
				table: "ChecklistSections".to_string(),
				from: "ChecklistId".to_string(),
				to: "ParentId".to_string(),
			})
			.unwrap();

		let renamed = foreign_key_name("ChecklistSections", "Checklists", "ParentId");
		let fk = model.foreign_key(&renamed).unwrap();
		assert_eq!(fk.column, "ParentId");
		assert!(
			model
				.foreign_key(&foreign_key_name("ChecklistSections", "Checklists", "ChecklistId"))
				.is_none()
		);
	}

	#[test]
	fn drop_column_blocked_while_indexed() {
		let mut model = SchemaObjectModel::new();
		model.apply(&checklists_table()).unwrap();
		model
			.apply(&SchemaOp::CreateIndex {
				table: "Checklists".to_string(),
				columns: vec!["Code".to_string()],
				unique: true,
			})
			.unwrap();
		let err = model
			.apply(&SchemaOp::DropColumn {
				table: "Checklists".to_string(),
				column: "Code".to_string(),
			})
			.unwrap_err();
		assert!(matches!(err, MigrateError::SchemaConflict(_)));
	}
}
