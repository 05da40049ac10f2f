//! Domain model for KiCad designs: schematic components, board placements,
//! inventory items, value normalization, BOM aggregation and POS rows.

pub mod bom;
#[cfg(feature = "table")]
mod bom_table;
pub mod component;
pub mod inventory;
pub mod natural_string;
pub mod placement;
pub mod schematic;
pub mod value;
pub mod warning;

pub use bom::{Assignment, Bom, BomField, BomOptions, BomRow, MatchOutcome};
#[cfg(feature = "table")]
pub use bom_table::write_rows_table;
pub use component::{Category, Component, Property, PropertyMap, normalize_field_name};
pub use inventory::InventoryItem;
pub use natural_string::NaturalString;
pub use placement::{
    Mount, PcbComponent, PlacementOrigin, PosColumn, PosOptions, Side, Units, extract_pcb,
    normalize_rotation, pos_rows,
};
pub use schematic::{
    ExtractError, SchematicSheet, SheetRef, extract_schematic, merge_units, sheet_refs,
};
pub use value::{ValueKind, format_value, parse_value};
pub use warning::Warning;

/// Consolidate components gathered from every sheet of a project.
///
/// Sheets are given in discovery order; a multi-unit symbol whose units sit
/// on different sheets still yields one component.
pub fn merge_sheet_components<'a, I>(sheets: I, warnings: &mut Vec<Warning>) -> Vec<Component>
where
    I: IntoIterator<Item = &'a SchematicSheet>,
{
    let all: Vec<Component> = sheets
        .into_iter()
        .flat_map(|sheet| sheet.components.iter().cloned())
        .collect();
    merge_units(all, warnings)
}
