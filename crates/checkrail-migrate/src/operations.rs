//! Migration operations
//!
//! `SchemaOp` is the structural (DDL-equivalent) vocabulary, `SeedOp` the
//! row-level (DML-equivalent) one. Constraint and index names are derived,
//! never author-supplied, so Up and Down lists always agree on them.

use crate::schema::{ColumnSchema, ForeignKeyAction};
use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Derived foreign key constraint name, e.g.
/// `FK_PredefinedChecklistItems_Categories_CategoryId`.
pub fn foreign_key_name(table: &str, principal_table: &str, column: &str) -> String {
	format!("FK_{}_{}_{}", table, principal_table, column)
}

/// Derived index name, e.g. `IX_PredefinedChecklistItems_SectionId_Sequence`.
pub fn index_name(table: &str, columns: &[String]) -> String {
	format!("IX_{}_{}", table, columns.join("_"))
}

/// A structural schema change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SchemaOp {
	CreateTable {
		name: String,
		columns: Vec<ColumnSchema>,
		primary_key: Vec<String>,
	},
	DropTable {
		name: String,
	},
	AddColumn {
		table: String,
		column: ColumnSchema,
	},
	DropColumn {
		table: String,
		column: String,
	},
	RenameColumn {
		table: String,
		from: String,
		to: String,
	},
	CreateIndex {
		table: String,
		columns: Vec<String>,
		unique: bool,
	},
	DropIndex {
		name: String,
	},
	AddForeignKey {
		table: String,
		column: String,
		principal_table: String,
		principal_column: String,
		on_delete: ForeignKeyAction,
	},
	DropForeignKey {
		table: String,
		name: String,
	},
}

impl SchemaOp {
	/// Short description used in error and log output.
	pub fn describe(&self) -> String {
		match self {
			SchemaOp::CreateTable { name, .. } => format!("create table {}", name),
			SchemaOp::DropTable { name } => format!("drop table {}", name),
			SchemaOp::AddColumn { table, column } => {
				format!("add column {}.{}", table, column.name)
			}
			SchemaOp::DropColumn { table, column } => format!("drop column {}.{}", table, column),
			SchemaOp::RenameColumn { table, from, to } => {
				format!("rename column {}.{} to {}", table, from, to)
			}
			SchemaOp::CreateIndex { table, columns, .. } => {
				format!("create index {}", index_name(table, columns))
			}
			SchemaOp::DropIndex { name } => format!("drop index {}", name),
			SchemaOp::AddForeignKey {
				table,
				column,
				principal_table,
				..
			} => format!(
				"add foreign key {}",
				foreign_key_name(table, principal_table, column)
			),
			SchemaOp::DropForeignKey { name, .. } => format!("drop foreign key {}", name),
		}
	}
}

/// A keyed row-level change to reference/fixture data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum SeedOp {
	InsertRow {
		table: String,
		key_columns: Vec<String>,
		key_values: Vec<Value>,
		columns: IndexMap<String, Value>,
	},
	UpdateRow {
		table: String,
		key_columns: Vec<String>,
		key_values: Vec<Value>,
		changes: IndexMap<String, Value>,
	},
	DeleteRow {
		table: String,
		key_columns: Vec<String>,
		key_values: Vec<Value>,
	},
}

impl SeedOp {
	pub fn table(&self) -> &str {
		match self {
			SeedOp::InsertRow { table, .. }
			| SeedOp::UpdateRow { table, .. }
			| SeedOp::DeleteRow { table, .. } => table,
		}
	}

	pub fn describe(&self) -> String {
		let key = |values: &[Value]| {
			values
				.iter()
				.map(|v| v.to_string())
				.collect::<Vec<_>>()
				.join(", ")
		};
		match self {
			SeedOp::InsertRow {
				table, key_values, ..
			} => format!("insert row {} ({})", table, key(key_values)),
			SeedOp::UpdateRow {
				table, key_values, ..
			} => format!("update row {} ({})", table, key(key_values)),
			SeedOp::DeleteRow {
				table, key_values, ..
			} => format!("delete row {} ({})", table, key(key_values)),
		}
	}
}

/// One entry of a step's Up or Down list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StepOp {
	Schema(SchemaOp),
	Seed(SeedOp),
}

impl StepOp {
	pub fn describe(&self) -> String {
		match self {
			StepOp::Schema(op) => op.describe(),
			StepOp::Seed(op) => op.describe(),
		}
	}
}

impl From<SchemaOp> for StepOp {
	fn from(op: SchemaOp) -> Self {
		StepOp::Schema(op)
	}
}

impl From<SeedOp> for StepOp {
	fn from(op: SeedOp) -> Self {
		StepOp::Seed(op)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn derived_names_match_original_convention() {
		assert_eq!(
			foreign_key_name("PredefinedChecklistItems", "Categories", "CategoryId"),
			"FK_PredefinedChecklistItems_Categories_CategoryId"
		);
		assert_eq!(
			index_name(
				"PredefinedChecklistItems",
				&["SectionId".to_string(), "Sequence".to_string()]
			),
			"IX_PredefinedChecklistItems_SectionId_Sequence"
		);
	}

	#[test]
	fn describe_names_the_object() {
		let op = SchemaOp::DropTable {
			name: "Categories".to_string(),
		};
		assert_eq!(op.describe(), "drop table Categories");
	}
}
