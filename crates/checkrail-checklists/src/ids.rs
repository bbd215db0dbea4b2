//! Fixed identifiers for the seeded checklist data.
//!
//! Seed rows are addressed by stable uuids so later steps can update or
//! delete them deterministically. The numbering blocks mirror the entity
//! kind: `1…` checklists, `2…` items, `3…` sections, `4…` categories,
//! `5…` references.

use chrono::{DateTime, Utc};
use uuid::{Uuid, uuid};

pub const CHECKLIST_STRUCTURAL: Uuid = uuid!("10000001-0000-0000-0000-000000000001");
pub const CHECKLIST_MUSTER: Uuid = uuid!("10000001-0000-0000-0000-000000000002");

pub const SECTION_GENERAL: Uuid = uuid!("30000001-0000-0000-0000-000000000001");
pub const SECTION_INSTALLATION: Uuid = uuid!("30000001-0000-0000-0000-000000000002");
pub const SECTION_MUSTER: Uuid = uuid!("30000001-0000-0000-0000-000000000003");

pub const ITEM_APPROVALS: Uuid = uuid!("20000001-0000-0000-0000-000000000001");
pub const ITEM_STORAGE: Uuid = uuid!("20000001-0000-0000-0000-000000000002");
pub const ITEM_MATERIAL: Uuid = uuid!("20000001-0000-0000-0000-000000000003");
pub const ITEM_CONFORMITY: Uuid = uuid!("20000001-0000-0000-0000-000000000004");
pub const ITEM_GRID: Uuid = uuid!("20000001-0000-0000-0000-000000000005");
pub const ITEM_BOARD: Uuid = uuid!("20000001-0000-0000-0000-000000000006");

/// Items that belong to the demo "Muster" checklist, removed again by the
/// teardown step.
pub const MUSTER_ITEMS: [Uuid; 3] = [
	uuid!("20000001-0000-0000-0001-000000000001"),
	uuid!("20000001-0000-0000-0001-000000000002"),
	uuid!("20000001-0000-0000-0001-000000000003"),
];

pub const CATEGORY_GENERAL: Uuid = uuid!("40000001-0000-0000-0000-000000000001");
pub const CATEGORY_SETTING_OUT: Uuid = uuid!("40000001-0000-0000-0000-000000000002");
pub const CATEGORY_INSTALLATION: Uuid = uuid!("40000001-0000-0000-0000-000000000003");

pub const REFERENCE_ASTM: Uuid = uuid!("50000001-0000-0000-0000-000000000001");
pub const REFERENCE_SPEC: Uuid = uuid!("50000001-0000-0000-0000-000000000002");

/// The fixed `CreatedDate` for all seed rows, 2024-11-01T00:00:00Z.
pub fn seed_date() -> DateTime<Utc> {
	DateTime::from_timestamp(1_730_419_200, 0).unwrap_or_default()
}
