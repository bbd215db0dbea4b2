//! `20251214122143_add_reference_and_category_tables`
//!
//! Introduces the `Categories` and `References` lookup tables, links
//! checklist items to them through nullable `SetNull` foreign keys, and
//! backfills the links on the structural items. The link updates touch only
//! `CategoryId`/`ReferenceId`; every other cell stays as seeded.

use crate::ids;
use checkrail_migrate::prelude::*;
use indexmap::IndexMap;
use uuid::Uuid;

pub const ID: &str = "20251214122143_add_reference_and_category_tables";

fn lookup_row(table: &str, key_column: &str, id: Uuid, name_column: &str, name: &str) -> SeedOp {
	SeedOp::InsertRow {
		table: table.to_string(),
		key_columns: vec![key_column.to_string()],
		key_values: vec![Value::Uuid(id)],
		columns: IndexMap::from([
			(name_column.to_string(), Value::from(name)),
			("CreatedDate".to_string(), Value::Timestamp(ids::seed_date())),
		]),
	}
}

fn link_item(item: Uuid, category: Uuid, reference: Uuid) -> SeedOp {
	SeedOp::UpdateRow {
		table: "PredefinedChecklistItems".to_string(),
		key_columns: vec!["PredefinedItemId".to_string()],
		key_values: vec![Value::Uuid(item)],
		changes: IndexMap::from([
			("CategoryId".to_string(), Value::Uuid(category)),
			("ReferenceId".to_string(), Value::Uuid(reference)),
		]),
	}
}

pub fn step() -> MigrationStep {
	MigrationStep::new(ID)
		.up(SchemaOp::CreateTable {
			name: "Categories".to_string(),
			columns: vec![
				ColumnSchema::new("CategoryId", ColumnType::Uuid, false),
				ColumnSchema::new("CategoryName", ColumnType::VarChar(200), false),
				ColumnSchema::new("CreatedDate", ColumnType::DateTime, false),
			],
			primary_key: vec!["CategoryId".to_string()],
		})
		.up(SchemaOp::CreateTable {
			name: "References".to_string(),
			columns: vec![
				ColumnSchema::new("ReferenceId", ColumnType::Uuid, false),
				ColumnSchema::new("ReferenceName", ColumnType::VarChar(200), false),
				ColumnSchema::new("CreatedDate", ColumnType::DateTime, false),
			],
			primary_key: vec!["ReferenceId".to_string()],
		})
		.up(SchemaOp::AddColumn {
			table: "PredefinedChecklistItems".to_string(),
			column: ColumnSchema::new("CategoryId", ColumnType::Uuid, true),
		})
		.up(SchemaOp::AddColumn {
			table: "PredefinedChecklistItems".to_string(),
			column: ColumnSchema::new("ReferenceId", ColumnType::Uuid, true),
		})
		.up(SchemaOp::CreateIndex {
			table: "PredefinedChecklistItems".to_string(),
			columns: vec!["CategoryId".to_string()],
			unique: false,
		})
		.up(SchemaOp::CreateIndex {
			table: "PredefinedChecklistItems".to_string(),
			columns: vec!["ReferenceId".to_string()],
			unique: false,
		})
		.up(SchemaOp::CreateIndex {
			table: "Categories".to_string(),
			columns: vec!["CategoryName".to_string()],
			unique: true,
		})
		.up(SchemaOp::CreateIndex {
			table: "References".to_string(),
			columns: vec!["ReferenceName".to_string()],
			unique: true,
		})
		.up(SchemaOp::AddForeignKey {
			table: "PredefinedChecklistItems".to_string(),
			column: "CategoryId".to_string(),
			principal_table: "Categories".to_string(),
			principal_column: "CategoryId".to_string(),
			on_delete: ForeignKeyAction::SetNull,
		})
		.up(SchemaOp::AddForeignKey {
			table: "PredefinedChecklistItems".to_string(),
			column: "ReferenceId".to_string(),
			principal_table: "References".to_string(),
			principal_column: "ReferenceId".to_string(),
			on_delete: ForeignKeyAction::SetNull,
		})
		.up(lookup_row("Categories", "CategoryId", ids::CATEGORY_GENERAL, "CategoryName", "General"))
		.up(lookup_row(
			"Categories",
			"CategoryId",
			ids::CATEGORY_SETTING_OUT,
			"CategoryName",
			"Setting Out",
		))
		.up(lookup_row(
			"Categories",
			"CategoryId",
			ids::CATEGORY_INSTALLATION,
			"CategoryName",
			"Installation Activity",
		))
		.up(lookup_row(
			"References",
			"ReferenceId",
			ids::REFERENCE_ASTM,
			"ReferenceName",
			"ASTM C840",
		))
		.up(lookup_row(
			"References",
			"ReferenceId",
			ids::REFERENCE_SPEC,
			"ReferenceName",
			"Specification 09 22 16",
		))
		.up(link_item(ids::ITEM_APPROVALS, ids::CATEGORY_GENERAL, ids::REFERENCE_SPEC))
		.up(link_item(ids::ITEM_STORAGE, ids::CATEGORY_GENERAL, ids::REFERENCE_SPEC))
		.up(link_item(ids::ITEM_MATERIAL, ids::CATEGORY_GENERAL, ids::REFERENCE_SPEC))
		.up(link_item(ids::ITEM_CONFORMITY, ids::CATEGORY_GENERAL, ids::REFERENCE_SPEC))
		.up(link_item(ids::ITEM_GRID, ids::CATEGORY_INSTALLATION, ids::REFERENCE_ASTM))
		.up(link_item(ids::ITEM_BOARD, ids::CATEGORY_INSTALLATION, ids::REFERENCE_ASTM))
		.down(SchemaOp::DropForeignKey {
			table: "PredefinedChecklistItems".to_string(),
			name: foreign_key_name("PredefinedChecklistItems", "Categories", "CategoryId"),
		})
		.down(SchemaOp::DropForeignKey {
			table: "PredefinedChecklistItems".to_string(),
			name: foreign_key_name("PredefinedChecklistItems", "References", "ReferenceId"),
		})
		.down(SchemaOp::DropIndex {
			name: index_name("PredefinedChecklistItems", &["CategoryId".to_string()]),
		})
		.down(SchemaOp::DropIndex {
			name: index_name("PredefinedChecklistItems", &["ReferenceId".to_string()]),
		})
		.down(SchemaOp::DropColumn {
			table: "PredefinedChecklistItems".to_string(),
			column: "CategoryId".to_string(),
		})
		.down(SchemaOp::DropColumn {
			table: "PredefinedChecklistItems".to_string(),
			column: "ReferenceId".to_string(),
		})
		.down(SchemaOp::DropTable {
			name: "Categories".to_string(),
		})
		.down(SchemaOp::DropTable {
			name: "References".to_string(),
		})
}
