mod core;
mod field;

// Re-export core BOM types
pub use core::*;

pub use field::BomField;
