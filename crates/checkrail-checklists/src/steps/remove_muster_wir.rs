//! `20251215070221_remove_muster_wir`
//!
//! Teardown of the demo data and the lookup tables: unlinks the structural
//! items, drops the category/reference constraints, indexes and tables, and
//! deletes the Muster checklist with its section and items. The down list
//! rebuilds all of it cell for cell.
//!
//! The structural items are unlinked in the up list so the down list can
//! re-add the foreign keys before its seed phase re-inserts the lookup rows;
//! the links are then restored row by row.

use crate::ids;
use checkrail_migrate::prelude::*;
use indexmap::IndexMap;
use uuid::Uuid;

pub const ID: &str = "20251215070221_remove_muster_wir";

fn unlink_item(item: Uuid) -> SeedOp {
	SeedOp::UpdateRow {
		table: "PredefinedChecklistItems".to_string(),
		key_columns: vec!["PredefinedItemId".to_string()],
		key_values: vec![Value::Uuid(item)],
		changes: IndexMap::from([
			("CategoryId".to_string(), Value::Null),
			("ReferenceId".to_string(), Value::Null),
		]),
	}
}

fn relink_item(item: Uuid, category: Uuid, reference: Uuid) -> SeedOp {
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

fn delete_item(item: Uuid) -> SeedOp {
	SeedOp::DeleteRow {
		table: "PredefinedChecklistItems".to_string(),
		key_columns: vec!["PredefinedItemId".to_string()],
		key_values: vec![Value::Uuid(item)],
	}
}

fn muster_item(id: Uuid, sequence: i64, description: &str, reference: Option<&str>) -> SeedOp {
	let mut columns = IndexMap::from([
		("SectionId".to_string(), Value::Uuid(ids::SECTION_MUSTER)),
		("Description".to_string(), Value::from(description)),
		("Sequence".to_string(), Value::Integer(sequence)),
	]);
	if let Some(reference) = reference {
		columns.insert("ReferenceText".to_string(), Value::from(reference));
	}
	SeedOp::InsertRow {
		table: "PredefinedChecklistItems".to_string(),
		key_columns: vec!["PredefinedItemId".to_string()],
		key_values: vec![Value::Uuid(id)],
		columns,
	}
}

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

pub fn step() -> MigrationStep {
	MigrationStep::new(ID)
		.up(SchemaOp::DropForeignKey {
			table: "PredefinedChecklistItems".to_string(),
			name: foreign_key_name("PredefinedChecklistItems", "Categories", "CategoryId"),
		})
		.up(SchemaOp::DropForeignKey {
			table: "PredefinedChecklistItems".to_string(),
			name: foreign_key_name("PredefinedChecklistItems", "References", "ReferenceId"),
		})
		.up(SchemaOp::DropIndex {
			name: index_name("PredefinedChecklistItems", &["CategoryId".to_string()]),
		})
		.up(SchemaOp::DropIndex {
			name: index_name("PredefinedChecklistItems", &["ReferenceId".to_string()]),
		})
		.up(SchemaOp::DropTable {
			name: "Categories".to_string(),
		})
		.up(SchemaOp::DropTable {
			name: "References".to_string(),
		})
		.up(unlink_item(ids::ITEM_APPROVALS))
		.up(unlink_item(ids::ITEM_STORAGE))
		.up(unlink_item(ids::ITEM_MATERIAL))
		.up(unlink_item(ids::ITEM_CONFORMITY))
		.up(unlink_item(ids::ITEM_GRID))
		.up(unlink_item(ids::ITEM_BOARD))
		.up(delete_item(ids::MUSTER_ITEMS[0]))
		.up(delete_item(ids::MUSTER_ITEMS[1]))
		.up(delete_item(ids::MUSTER_ITEMS[2]))
		.up(SeedOp::DeleteRow {
			table: "ChecklistSections".to_string(),
			key_columns: vec!["SectionId".to_string()],
			key_values: vec![Value::Uuid(ids::SECTION_MUSTER)],
		})
		.up(SeedOp::DeleteRow {
			table: "Checklists".to_string(),
			key_columns: vec!["ChecklistId".to_string()],
			key_values: vec![Value::Uuid(ids::CHECKLIST_MUSTER)],
		})
		.down(SchemaOp::CreateTable {
			name: "Categories".to_string(),
			columns: vec![
				ColumnSchema::new("CategoryId", ColumnType::Uuid, false),
				ColumnSchema::new("CategoryName", ColumnType::VarChar(200), false),
				ColumnSchema::new("CreatedDate", ColumnType::DateTime, false),
			],
			primary_key: vec!["CategoryId".to_string()],
		})
		.down(SchemaOp::CreateTable {
			name: "References".to_string(),
			columns: vec![
				ColumnSchema::new("ReferenceId", ColumnType::Uuid, false),
				ColumnSchema::new("ReferenceName", ColumnType::VarChar(200), false),
				ColumnSchema::new("CreatedDate", ColumnType::DateTime, false),
			],
			primary_key: vec!["ReferenceId".to_string()],
		})
		.down(SchemaOp::CreateIndex {
			table: "PredefinedChecklistItems".to_string(),
			columns: vec!["CategoryId".to_string()],
			unique: false,
		})
		.down(SchemaOp::CreateIndex {
			table: "PredefinedChecklistItems".to_string(),
			columns: vec!["ReferenceId".to_string()],
			unique: false,
		})
		.down(SchemaOp::CreateIndex {
			table: "Categories".to_string(),
			columns: vec!["CategoryName".to_string()],
			unique: true,
		})
		.down(SchemaOp::CreateIndex {
			table: "References".to_string(),
			columns: vec!["ReferenceName".to_string()],
			unique: true,
		})
		.down(SchemaOp::AddForeignKey {
			table: "PredefinedChecklistItems".to_string(),
			column: "CategoryId".to_string(),
			principal_table: "Categories".to_string(),
			principal_column: "CategoryId".to_string(),
			on_delete: ForeignKeyAction::SetNull,
		})
		.down(SchemaOp::AddForeignKey {
			table: "PredefinedChecklistItems".to_string(),
			column: "ReferenceId".to_string(),
			principal_table: "References".to_string(),
			principal_column: "ReferenceId".to_string(),
			on_delete: ForeignKeyAction::SetNull,
		})
		.down(lookup_row("Categories", "CategoryId", ids::CATEGORY_GENERAL, "CategoryName", "General"))
		.down(lookup_row(
			"Categories",
			"CategoryId",
			ids::CATEGORY_SETTING_OUT,
			"CategoryName",
			"Setting Out",
		))
		.down(lookup_row(
			"Categories",
			"CategoryId",
			ids::CATEGORY_INSTALLATION,
			"CategoryName",
			"Installation Activity",
		))
		.down(lookup_row(
			"References",
			"ReferenceId",
			ids::REFERENCE_ASTM,
			"ReferenceName",
			"ASTM C840",
		))
		.down(lookup_row(
			"References",
			"ReferenceId",
			ids::REFERENCE_SPEC,
			"ReferenceName",
			"Specification 09 22 16",
		))
		.down(relink_item(ids::ITEM_APPROVALS, ids::CATEGORY_GENERAL, ids::REFERENCE_SPEC))
		.down(relink_item(ids::ITEM_STORAGE, ids::CATEGORY_GENERAL, ids::REFERENCE_SPEC))
		.down(relink_item(ids::ITEM_MATERIAL, ids::CATEGORY_GENERAL, ids::REFERENCE_SPEC))
		.down(relink_item(ids::ITEM_CONFORMITY, ids::CATEGORY_GENERAL, ids::REFERENCE_SPEC))
		.down(relink_item(ids::ITEM_GRID, ids::CATEGORY_INSTALLATION, ids::REFERENCE_ASTM))
		.down(relink_item(ids::ITEM_BOARD, ids::CATEGORY_INSTALLATION, ids::REFERENCE_ASTM))
		.down(SeedOp::InsertRow {
			table: "Checklists".to_string(),
			key_columns: vec!["ChecklistId".to_string()],
			key_values: vec![Value::Uuid(ids::CHECKLIST_MUSTER)],
			columns: IndexMap::from([
				("Code".to_string(), Value::from("WIR-MST-001")),
				("Discipline".to_string(), Value::from("General")),
				("Name".to_string(), Value::from("Muster WIR")),
				("IsActive".to_string(), Value::Boolean(true)),
				("CreatedDate".to_string(), Value::Timestamp(ids::seed_date())),
			]),
		})
		.down(SeedOp::InsertRow {
			table: "ChecklistSections".to_string(),
			key_columns: vec!["SectionId".to_string()],
			key_values: vec![Value::Uuid(ids::SECTION_MUSTER)],
			columns: IndexMap::from([
				("ChecklistId".to_string(), Value::Uuid(ids::CHECKLIST_MUSTER)),
				("SectionOrder".to_string(), Value::Integer(1)),
				("Title".to_string(), Value::from("Muster Checks")),
			]),
		})
		.down(muster_item(
			ids::MUSTER_ITEMS[0],
			1,
			"Muster: confirm demo checklist renders in the inspection form.",
			None,
		))
		.down(muster_item(
			ids::MUSTER_ITEMS[1],
			2,
			"Muster: confirm checkpoint sequencing is preserved.",
			None,
		))
		.down(muster_item(
			ids::MUSTER_ITEMS[2],
			3,
			"Muster: confirm sign-off captures inspector and date.",
			Some("QA-DEMO-01"),
		))
}
