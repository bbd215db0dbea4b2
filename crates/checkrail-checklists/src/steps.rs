//! One module per migration step, chronological.

pub mod add_reference_and_category_tables;
pub mod predefined_checklist_items;
pub mod remove_muster_wir;
