//! KiCad-specific S-expression helpers.
//!
//! - [`props`] - common "property-like" query helpers
//! - [`schematic`] - KiCad schematic (`.kicad_sch`) helpers

pub mod props;
pub mod schematic;

pub use props::{at, atom_prop, child_list, int_prop, properties, string_prop, yes_no_prop};
pub use schematic::{SymbolInstance, legacy_symbol_instances, symbol_instances};
