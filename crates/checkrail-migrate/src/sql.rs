//! Statement rendering
//!
//! Dialect-neutral SQL text for the store seam. Identifiers are always
//! double-quoted; row values are never inlined, they travel as bound
//! parameters with `?` placeholders.

use crate::operations::{SchemaOp, SeedOp, foreign_key_name, index_name};
use crate::schema::{ColumnSchema, ColumnType, ForeignKeyAction};
use crate::store::Statement;
use crate::value::Value;

fn quote(identifier: &str) -> String {
	format!("\"{}\"", identifier)
}

fn quoted_list(identifiers: &[String]) -> String {
	identifiers
		.iter()
		.map(|i| quote(i))
		.collect::<Vec<_>>()
		.join(", ")
}

fn column_type_sql(column_type: &ColumnType) -> String {
	match column_type {
		ColumnType::Uuid => "UUID".to_string(),
		ColumnType::VarChar(length) => format!("VARCHAR({})", length),
		ColumnType::Text => "TEXT".to_string(),
		ColumnType::Integer => "INTEGER".to_string(),
		ColumnType::Boolean => "BOOLEAN".to_string(),
		ColumnType::DateTime => "TIMESTAMP".to_string(),
	}
}

fn column_sql(column: &ColumnSchema) -> String {
	let nullability = if column.nullable { "NULL" } else { "NOT NULL" };
	format!(
		"{} {} {}",
		quote(&column.name),
		column_type_sql(&column.column_type),
		nullability
	)
}

fn on_delete_sql(action: ForeignKeyAction) -> &'static str {
	match action {
		ForeignKeyAction::Cascade => "CASCADE",
		ForeignKeyAction::SetNull => "SET NULL",
		ForeignKeyAction::Restrict => "RESTRICT",
	}
}

/// Render a structural operation as one DDL statement.
pub fn render_schema_op(op: &SchemaOp) -> String {
	match op {
		SchemaOp::CreateTable {
			name,
			columns,
			primary_key,
		} => {
			let mut parts: Vec<String> = columns.iter().map(column_sql).collect();
			if !primary_key.is_empty() {
				parts.push(format!(
					"CONSTRAINT {} PRIMARY KEY ({})",
					quote(&format!("PK_{}", name)),
					quoted_list(primary_key)
				));
			}
			format!("CREATE TABLE {} ({})", quote(name), parts.join(", "))
		}
		SchemaOp::DropTable { name } => format!("DROP TABLE {}", quote(name)),
		SchemaOp::AddColumn { table, column } => {
			format!("ALTER TABLE {} ADD COLUMN {}", quote(table), column_sql(column))
		}
		SchemaOp::DropColumn { table, column } => {
			format!("ALTER TABLE {} DROP COLUMN {}", quote(table), quote(column))
		}
		SchemaOp::RenameColumn { table, from, to } => format!(
			"ALTER TABLE {} RENAME COLUMN {} TO {}",
			quote(table),
			quote(from),
			quote(to)
		),
		SchemaOp::CreateIndex {
			table,
			columns,
			unique,
		} => {
			let kind = if *unique { "UNIQUE INDEX" } else { "INDEX" };
			format!(
				"CREATE {} {} ON {} ({})",
				kind,
				quote(&index_name(table, columns)),
				quote(table),
				quoted_list(columns)
			)
		}
		SchemaOp::DropIndex { name } => format!("DROP INDEX {}", quote(name)),
		SchemaOp::AddForeignKey {
			table,
			column,
			principal_table,
			principal_column,
			on_delete,
		} => format!(
			"ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {}",
			quote(table),
			quote(&foreign_key_name(table, principal_table, column)),
			quote(column),
			quote(principal_table),
			quote(principal_column),
			on_delete_sql(*on_delete)
		),
		SchemaOp::DropForeignKey { table, name } => {
			format!(
				"ALTER TABLE {} DROP CONSTRAINT {}",
				quote(table),
				quote(name)
			)
		}
	}
}

/// Render a row-level operation as one parameterized statement.
pub fn render_seed_op(op: &SeedOp) -> Statement {
	match op {
		SeedOp::InsertRow {
			table,
			key_columns,
			key_values,
			columns,
		} => {
			let mut names: Vec<String> = key_columns.clone();
			let mut params: Vec<Value> = key_values.clone();
			for (name, value) in columns {
				names.push(name.clone());
				params.push(value.clone());
			}
			let placeholders = vec!["?"; names.len()].join(", ");
			Statement::with_params(
				format!(
					"INSERT INTO {} ({}) VALUES ({})",
					quote(table),
					quoted_list(&names),
					placeholders
				),
				params,
			)
		}
		SeedOp::UpdateRow {
			table,
			key_columns,
			key_values,
			changes,
		} => {
			let assignments = changes
				.keys()
				.map(|name| format!("{} = ?", quote(name)))
				.collect::<Vec<_>>()
				.join(", ");
			let mut params: Vec<Value> = changes.values().cloned().collect();
			params.extend(key_values.iter().cloned());
			Statement::with_params(
				format!(
					"UPDATE {} SET {} WHERE {}",
					quote(table),
					assignments,
					key_predicate(key_columns)
				),
				params,
			)
		}
		SeedOp::DeleteRow {
			table,
			key_columns,
			key_values,
		} => Statement::with_params(
			format!(
				"DELETE FROM {} WHERE {}",
				quote(table),
				key_predicate(key_columns)
			),
			key_values.clone(),
		),
	}
}

fn key_predicate(key_columns: &[String]) -> String {
	key_columns
		.iter()
		.map(|name| format!("{} = ?", quote(name)))
		.collect::<Vec<_>>()
		.join(" AND ")
}

#[cfg(test)]
mod tests {
	use super::*;
	use indexmap::IndexMap;
	use uuid::Uuid;

	#[test]
	fn create_table_renders_columns_and_primary_key() {
		let sql = render_schema_op(&SchemaOp::CreateTable {
			name: "Categories".to_string(),
			columns: vec![
				ColumnSchema::new("CategoryId", ColumnType::Uuid, false),
				ColumnSchema::new("CategoryName", ColumnType::VarChar(200), false),
			],
			primary_key: vec!["CategoryId".to_string()],
		});
		assert_eq!(
			sql,
			"CREATE TABLE \"Categories\" (\"CategoryId\" UUID NOT NULL, \
			 \"CategoryName\" VARCHAR(200) NOT NULL, \
			 CONSTRAINT \"PK_Categories\" PRIMARY KEY (\"CategoryId\"))"
		);
	}

	#[test]
	fn foreign_key_renders_on_delete() {
		let sql = render_schema_op(&SchemaOp::AddForeignKey {
			table: "PredefinedChecklistItems".to_string(),
			column: "CategoryId".to_string(),
			principal_table: "Categories".to_string(),
			principal_column: "CategoryId".to_string(),
			on_delete: ForeignKeyAction::SetNull,
		});
		assert!(sql.contains("\"FK_PredefinedChecklistItems_Categories_CategoryId\""));
		assert!(sql.ends_with("ON DELETE SET NULL"));
	}

	#[test]
	fn drop_foreign_key_targets_owning_table() {
		let sql = render_schema_op(&SchemaOp::DropForeignKey {
			table: "PredefinedChecklistItems".to_string(),
			name: "FK_PredefinedChecklistItems_Categories_CategoryId".to_string(),
		});
		assert!(sql.starts_with("ALTER TABLE \"PredefinedChecklistItems\" DROP CONSTRAINT"));
	}

	#[test]
	fn drop_foreign_key_handles_underscored_table_name() {
		let sql = render_schema_op(&SchemaOp::DropForeignKey {
			table: "Checklist_Sections".to_string(),
			name: "FK_Checklist_Sections_Checklists_ChecklistId".to_string(),
		});
		assert!(sql.starts_with("ALTER TABLE \"Checklist_Sections\" DROP CONSTRAINT"));
	}

	#[test]
	fn insert_binds_key_then_columns() {
		let statement = render_seed_op(&SeedOp::InsertRow {
			table: "Categories".to_string(),
			key_columns: vec!["CategoryId".to_string()],
			key_values: vec![Value::Uuid(Uuid::from_u128(1))],
			columns: IndexMap::from([("CategoryName".to_string(), Value::from("Structural"))]),
		});
		assert_eq!(
			statement.sql,
			"INSERT INTO \"Categories\" (\"CategoryId\", \"CategoryName\") VALUES (?, ?)"
		);
		assert_eq!(statement.params.len(), 2);
	}

	#[test]
	fn update_binds_changes_before_key() {
		let statement = render_seed_op(&SeedOp::UpdateRow {
			table: "PredefinedChecklistItems".to_string(),
			key_columns: vec!["PredefinedItemId".to_string()],
			key_values: vec![Value::Uuid(Uuid::from_u128(7))],
			changes: IndexMap::from([("CategoryId".to_string(), Value::Uuid(Uuid::from_u128(2)))]),
		});
		assert_eq!(
			statement.sql,
			"UPDATE \"PredefinedChecklistItems\" SET \"CategoryId\" = ? \
			 WHERE \"PredefinedItemId\" = ?"
		);
		assert_eq!(statement.params[0], Value::Uuid(Uuid::from_u128(2)));
		assert_eq!(statement.params[1], Value::Uuid(Uuid::from_u128(7)));
	}
}
