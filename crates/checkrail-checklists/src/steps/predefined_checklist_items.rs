//! `20251201083318_predefined_checklist_items`
//!
//! Base schema for the WIR checklist system plus its initial seed data: the
//! structural drywall inspection checklist and the demo "Muster" checklist.
//! The down list drops the three tables, which takes the seed rows with it.

use crate::ids;
use checkrail_migrate::prelude::*;
use indexmap::IndexMap;
use uuid::Uuid;

pub const ID: &str = "20251201083318_predefined_checklist_items";

fn checklist_row(id: Uuid, code: &str, discipline: &str, name: &str) -> SeedOp {
	SeedOp::InsertRow {
		table: "Checklists".to_string(),
		key_columns: vec!["ChecklistId".to_string()],
		key_values: vec![Value::Uuid(id)],
		columns: IndexMap::from([
			("Code".to_string(), Value::from(code)),
			("Discipline".to_string(), Value::from(discipline)),
			("Name".to_string(), Value::from(name)),
			("IsActive".to_string(), Value::Boolean(true)),
			("CreatedDate".to_string(), Value::Timestamp(ids::seed_date())),
		]),
	}
}

fn section_row(id: Uuid, checklist: Uuid, order: i64, title: &str) -> SeedOp {
	SeedOp::InsertRow {
		table: "ChecklistSections".to_string(),
		key_columns: vec!["SectionId".to_string()],
		key_values: vec![Value::Uuid(id)],
		columns: IndexMap::from([
			("ChecklistId".to_string(), Value::Uuid(checklist)),
			("SectionOrder".to_string(), Value::Integer(order)),
			("Title".to_string(), Value::from(title)),
		]),
	}
}

fn item_row(id: Uuid, section: Uuid, sequence: i64, description: &str, reference: Option<&str>) -> SeedOp {
	let mut columns = IndexMap::from([
		("SectionId".to_string(), Value::Uuid(section)),
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

pub fn step() -> MigrationStep {
	MigrationStep::new(ID)
		.up(SchemaOp::CreateTable {
			name: "Checklists".to_string(),
			columns: vec![
				ColumnSchema::new("ChecklistId", ColumnType::Uuid, false),
				ColumnSchema::new("Code", ColumnType::VarChar(50), false),
				ColumnSchema::new("Discipline", ColumnType::VarChar(100), false),
				ColumnSchema::new("Name", ColumnType::VarChar(200), false),
				ColumnSchema::new("IsActive", ColumnType::Boolean, false),
				ColumnSchema::new("CreatedDate", ColumnType::DateTime, false),
			],
			primary_key: vec!["ChecklistId".to_string()],
		})
		.up(SchemaOp::CreateTable {
			name: "ChecklistSections".to_string(),
			columns: vec![
				ColumnSchema::new("SectionId", ColumnType::Uuid, false),
				ColumnSchema::new("ChecklistId", ColumnType::Uuid, true),
				ColumnSchema::new("SectionOrder", ColumnType::Integer, false),
				ColumnSchema::new("Title", ColumnType::VarChar(200), false),
			],
			primary_key: vec!["SectionId".to_string()],
		})
		.up(SchemaOp::CreateTable {
			name: "PredefinedChecklistItems".to_string(),
			columns: vec![
				ColumnSchema::new("PredefinedItemId", ColumnType::Uuid, false),
				ColumnSchema::new("SectionId", ColumnType::Uuid, false),
				ColumnSchema::new("Description", ColumnType::VarChar(500), false),
				ColumnSchema::new("ReferenceText", ColumnType::VarChar(200), true),
				ColumnSchema::new("Sequence", ColumnType::Integer, false),
			],
			primary_key: vec!["PredefinedItemId".to_string()],
		})
		.up(SchemaOp::CreateIndex {
			table: "Checklists".to_string(),
			columns: vec!["Code".to_string()],
			unique: true,
		})
		.up(SchemaOp::CreateIndex {
			table: "PredefinedChecklistItems".to_string(),
			columns: vec!["SectionId".to_string(), "Sequence".to_string()],
			unique: true,
		})
		.up(SchemaOp::AddForeignKey {
			table: "ChecklistSections".to_string(),
			column: "ChecklistId".to_string(),
			principal_table: "Checklists".to_string(),
			principal_column: "ChecklistId".to_string(),
			on_delete: ForeignKeyAction::SetNull,
		})
		.up(SchemaOp::AddForeignKey {
			table: "PredefinedChecklistItems".to_string(),
			column: "SectionId".to_string(),
			principal_table: "ChecklistSections".to_string(),
			principal_column: "SectionId".to_string(),
			on_delete: ForeignKeyAction::Cascade,
		})
		.up(checklist_row(
			ids::CHECKLIST_STRUCTURAL,
			"WIR-STR-001",
			"Structural",
			"Drywall Partition Installation",
		))
		.up(checklist_row(
			ids::CHECKLIST_MUSTER,
			"WIR-MST-001",
			"General",
			"Muster WIR",
		))
		.up(section_row(
			ids::SECTION_GENERAL,
			ids::CHECKLIST_STRUCTURAL,
			1,
			"General Requirements",
		))
		.up(section_row(
			ids::SECTION_INSTALLATION,
			ids::CHECKLIST_STRUCTURAL,
			2,
			"Installation Activity",
		))
		.up(section_row(
			ids::SECTION_MUSTER,
			ids::CHECKLIST_MUSTER,
			1,
			"Muster Checks",
		))
		.up(item_row(
			ids::ITEM_APPROVALS,
			ids::SECTION_GENERAL,
			1,
			"Ensure method statement, material submittal and drawings are approved.",
			None,
		))
		.up(item_row(
			ids::ITEM_STORAGE,
			ids::SECTION_GENERAL,
			2,
			"Ensure materials are stored under a dry, clean, shaded area away from heat.",
			None,
		))
		.up(item_row(
			ids::ITEM_MATERIAL,
			ids::SECTION_GENERAL,
			3,
			"Check the colour, type, fire rating and thickness against the approved material submittal.",
			None,
		))
		.up(item_row(
			ids::ITEM_CONFORMITY,
			ids::SECTION_GENERAL,
			4,
			"Verify and record the product conformity certificate for the insulation materials.",
			None,
		))
		.up(item_row(
			ids::ITEM_GRID,
			ids::SECTION_INSTALLATION,
			1,
			"Verify the location, spacing and fixation of the supporting grid per the approved drawings.",
			None,
		))
		.up(item_row(
			ids::ITEM_BOARD,
			ids::SECTION_INSTALLATION,
			2,
			"Verify the fixation of the board on one side of the supports per the approved drawings.",
			None,
		))
		.up(item_row(
			ids::MUSTER_ITEMS[0],
			ids::SECTION_MUSTER,
			1,
			"Muster: confirm demo checklist renders in the inspection form.",
			None,
		))
		.up(item_row(
			ids::MUSTER_ITEMS[1],
			ids::SECTION_MUSTER,
			2,
			"Muster: confirm checkpoint sequencing is preserved.",
			None,
		))
		.up(item_row(
			ids::MUSTER_ITEMS[2],
			ids::SECTION_MUSTER,
			3,
			"Muster: confirm sign-off captures inspector and date.",
			Some("QA-DEMO-01"),
		))
		.down(SchemaOp::DropForeignKey {
			table: "PredefinedChecklistItems".to_string(),
			name: foreign_key_name("PredefinedChecklistItems", "ChecklistSections", "SectionId"),
		})
		.down(SchemaOp::DropForeignKey {
			table: "ChecklistSections".to_string(),
			name: foreign_key_name("ChecklistSections", "Checklists", "ChecklistId"),
		})
		.down(SchemaOp::DropTable {
			name: "PredefinedChecklistItems".to_string(),
		})
		.down(SchemaOp::DropTable {
			name: "ChecklistSections".to_string(),
		})
		.down(SchemaOp::DropTable {
			name: "Checklists".to_string(),
		})
}
