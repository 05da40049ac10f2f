//! Inventory sources and component matching.
//!
//! Inventories are delimited-text tables ([`table`]) whose columns are mapped
//! onto [`InventoryItem`] slots by [`load_inventories`]. Several sources are
//! combined with [`merge_inventories`], which screens out rows that reuse an
//! IPN for a different part, and [`match_components`] assigns items to
//! schematic components.

pub mod extract;
pub mod matcher;
mod source;
pub mod table;

pub use extract::{ExtractOptions, ExtractedPart, extract_parts, generate_ipn, parts_table};
pub use jbom_sch::InventoryItem;
pub use matcher::{Candidate, Match, MatchConfig, Rule, assignments, match_components};
pub use source::{InventoryError, MergedInventory, items_from_table, load_inventories, merge_inventories};
pub use table::{Table, TableError, read_table, write_records, write_table, write_table_file};
