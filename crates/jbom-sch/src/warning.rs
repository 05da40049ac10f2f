use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A non-fatal problem found while resolving, extracting or matching.
///
/// Warnings never stop output generation; they are collected and reported
/// alongside the result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Warning {
    /// A sheet references one of its own ancestors.
    HierarchyCycle {
        sheet: PathBuf,
        referenced_from: PathBuf,
    },
    MissingSheet {
        sheet: PathBuf,
        referenced_from: PathBuf,
    },
    /// The file the user pointed at does not belong to the discovered project.
    ProjectFileMismatch { hint: PathBuf, project: PathBuf },
    UnreadableFile { path: PathBuf, message: String },
    /// Units of one multi-unit symbol disagree on a field; the last unit wins.
    UnitPropertyConflict {
        reference: String,
        field: String,
        kept: String,
        discarded: String,
    },
    /// Two inventory rows share an IPN but describe different parts.
    InventoryConflict {
        ipn: String,
        first_source: String,
        conflicting_source: String,
        differences: Vec<String>,
    },
    LowConfidenceMatch {
        reference: String,
        best_score: u8,
        threshold: u8,
    },
    /// Several distinct IPNs tied for the best score.
    AmbiguousMatch { reference: String, ipns: Vec<String> },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::HierarchyCycle {
                sheet,
                referenced_from,
            } => write!(
                f,
                "{}: sheet {} is its own ancestor, skipping",
                referenced_from.display(),
                sheet.display()
            ),
            Warning::MissingSheet {
                sheet,
                referenced_from,
            } => write!(
                f,
                "{}: sheet file {} does not exist",
                referenced_from.display(),
                sheet.display()
            ),
            Warning::ProjectFileMismatch { hint, project } => write!(
                f,
                "{} is not part of project {}, using the project instead",
                hint.display(),
                project.display()
            ),
            Warning::UnreadableFile { path, message } => {
                write!(f, "{}: {message}", path.display())
            }
            Warning::UnitPropertyConflict {
                reference,
                field,
                kept,
                discarded,
            } => write!(
                f,
                "{reference}: units disagree on {field} ({discarded:?} vs {kept:?}), using {kept:?}"
            ),
            Warning::InventoryConflict {
                ipn,
                first_source,
                conflicting_source,
                differences,
            } => write!(
                f,
                "IPN {ipn} in {conflicting_source} differs from {first_source} ({}), keeping {first_source}",
                differences.join(", ")
            ),
            Warning::LowConfidenceMatch {
                reference,
                best_score,
                threshold,
            } => write!(
                f,
                "{reference}: best inventory match scored {best_score}, below threshold {threshold}"
            ),
            Warning::AmbiguousMatch { reference, ipns } => write!(
                f,
                "{reference}: equally good matches {}, picked {}",
                ipns.join(", "),
                ipns.first().map(String::as_str).unwrap_or("none")
            ),
        }
    }
}
