//! Shared helpers for jbom integration tests: a temp-dir [`sandbox::Sandbox`]
//! that runs the built binary, and builders for small KiCad fixture files.

pub mod kicad;
pub mod sandbox;

pub use insta::assert_snapshot;
pub use kicad::{BoardBuilder, SchematicBuilder, Symbol};
pub use sandbox::Sandbox;
