//! WIR checklist migration set.
//!
//! The construction work-inspection-request (WIR) checklist schema and its
//! reference data, expressed as reversible migration steps for the checkrail
//! engine. One module per step; `registry()` returns all of them verified
//! and in order.

pub mod ids;
pub mod steps;

use checkrail_migrate::prelude::*;

/// All checklist steps, registered in chronological order.
///
/// Registration simulates every step's round trip, so a successful return
/// means the whole set is reversible.
pub fn registry() -> Result<MigrationRegistry> {
	registry_with_strictness(Strictness::Strict)
}

pub fn registry_with_strictness(strictness: Strictness) -> Result<MigrationRegistry> {
	let mut registry = MigrationRegistry::with_strictness(strictness);
	registry.register(steps::predefined_checklist_items::step())?;
	registry.register(steps::add_reference_and_category_tables::step())?;
	registry.register(steps::remove_muster_wir::step())?;
	Ok(registry)
}
