use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use jbom_sch::{SheetRef, Warning, sheet_refs};
use rayon::prelude::*;
use tracing::instrument;

use crate::ProjectError;

/// Read and parse one schematic file.
pub(crate) fn parse_sheet_file(path: &Path) -> Result<jbom_sexpr::Sexpr, ProjectError> {
    let text = fs::read_to_string(path).map_err(|source| ProjectError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    log::trace!("Parsing {} ({} bytes)", path.display(), text.len());
    jbom_sexpr::parse(&text).map_err(|source| ProjectError::Syntax {
        path: path.to_path_buf(),
        source,
    })
}

fn read_sheet_refs(path: &Path) -> Result<Vec<SheetRef>, ProjectError> {
    let root = parse_sheet_file(path)?;
    sheet_refs(&root).map_err(|source| ProjectError::WrongFileKind {
        path: path.to_path_buf(),
        kind: "schematic",
        source: Box::new(source),
    })
}

/// Render an error and its sources on one line.
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Sheet references seen so far, parent to children, as canonical paths.
#[derive(Default)]
struct SheetGraph {
    children: HashMap<PathBuf, Vec<PathBuf>>,
}

impl SheetGraph {
    fn reaches(&self, from: &Path, to: &Path) -> bool {
        let mut seen = HashSet::new();
        let mut stack = vec![from];
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if !seen.insert(node) {
                continue;
            }
            if let Some(children) = self.children.get(node) {
                stack.extend(children.iter().map(PathBuf::as_path));
            }
        }
        false
    }

    /// Record `parent -> child` unless it closes a loop; returns whether it was added.
    fn add_edge(&mut self, parent: &Path, child: &Path) -> bool {
        if self.reaches(child, parent) {
            return false;
        }
        self.children
            .entry(parent.to_path_buf())
            .or_default()
            .push(child.to_path_buf());
        true
    }
}

/// Find every schematic sheet reachable from `root`, root first, breadth-first.
///
/// Each level of the hierarchy is parsed in parallel. Every reference is
/// recorded in a sheet graph; a reference that closes a loop in that graph
/// produces a [`Warning::HierarchyCycle`] for that edge, whether the loop runs
/// through an ancestor or through sibling branches. A sheet reached again
/// without closing a loop is a reused sheet and is listed once. Missing and
/// unreadable child sheets are reported and their branch skipped; the root
/// failing to parse is an error.
#[instrument(name = "discover_sheets", skip_all)]
pub fn discover_sheets(root: &Path, warnings: &mut Vec<Warning>) -> Result<Vec<PathBuf>, ProjectError> {
    let root = fs::canonicalize(root).map_err(|source| ProjectError::Io {
        path: root.to_path_buf(),
        source,
    })?;

    let mut visited: HashSet<PathBuf> = HashSet::from([root.clone()]);
    let mut graph = SheetGraph::default();
    let mut sheets = Vec::new();
    let mut level = vec![root.clone()];
    let mut depth = 0;

    while !level.is_empty() {
        log::debug!("  Sheet level {}: {} file(s)", depth, level.len());
        let results: Vec<_> = level.par_iter().map(|path| read_sheet_refs(path)).collect();

        let mut next = Vec::new();
        for (path, result) in level.into_iter().zip(results) {
            let refs = match result {
                Ok(refs) => refs,
                Err(err) if path == root => return Err(err),
                Err(err) => {
                    warnings.push(Warning::UnreadableFile {
                        path: path.clone(),
                        message: error_chain(&err),
                    });
                    continue;
                }
            };
            sheets.push(path.clone());

            let base = path.parent().unwrap_or(Path::new("."));
            for sheet in refs {
                let candidate = base.join(&sheet.file);
                if !candidate.is_file() {
                    warnings.push(Warning::MissingSheet {
                        sheet: candidate,
                        referenced_from: path.clone(),
                    });
                    continue;
                }
                let canonical = match fs::canonicalize(&candidate) {
                    Ok(canonical) => canonical,
                    Err(err) => {
                        warnings.push(Warning::UnreadableFile {
                            path: candidate,
                            message: err.to_string(),
                        });
                        continue;
                    }
                };

                if !graph.add_edge(&path, &canonical) {
                    warnings.push(Warning::HierarchyCycle {
                        sheet: canonical,
                        referenced_from: path.clone(),
                    });
                    continue;
                }
                if !visited.insert(canonical.clone()) {
                    log::debug!(
                        "Sheet {} ({}) is reused, reading it once",
                        sheet.name,
                        canonical.display()
                    );
                    continue;
                }
                next.push(canonical);
            }
        }

        level = next;
        depth += 1;
    }

    Ok(sheets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jbom_test_utils::kicad::{SchematicBuilder, Symbol};
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_breadth_first_order_with_reuse() {
        let tmp = TempDir::new().unwrap();
        let d = tmp.path();
        write(
            d,
            "top.kicad_sch",
            &SchematicBuilder::new()
                .sheet("A", "a.kicad_sch")
                .sheet("B", "sub/b.kicad_sch")
                .build(),
        );
        write(d, "a.kicad_sch", &SchematicBuilder::new().sheet("C", "c.kicad_sch").build());
        // b reuses c from another branch
        write(
            d,
            "sub/b.kicad_sch",
            &SchematicBuilder::new().sheet("C", "../c.kicad_sch").build(),
        );
        write(
            d,
            "c.kicad_sch",
            &SchematicBuilder::new()
                .symbol(Symbol::resistor("R1", "1K", "0402"))
                .build(),
        );

        let mut warnings = Vec::new();
        let sheets = discover_sheets(&d.join("top.kicad_sch"), &mut warnings).unwrap();
        let d = d.canonicalize().unwrap();
        assert_eq!(
            sheets,
            vec![
                d.join("top.kicad_sch"),
                d.join("a.kicad_sch"),
                d.join("sub/b.kicad_sch"),
                d.join("c.kicad_sch"),
            ]
        );
        assert!(warnings.is_empty(), "{warnings:?}");
    }

    #[test]
    fn test_cycle_reports_once() {
        let tmp = TempDir::new().unwrap();
        let d = tmp.path();
        write(d, "top.kicad_sch", &SchematicBuilder::new().sheet("A", "a.kicad_sch").build());
        write(
            d,
            "a.kicad_sch",
            &SchematicBuilder::new()
                .sheet("Back", "top.kicad_sch")
                .sheet("Self", "a.kicad_sch")
                .build(),
        );

        let mut warnings = Vec::new();
        let sheets = discover_sheets(&d.join("top.kicad_sch"), &mut warnings).unwrap();
        assert_eq!(sheets.len(), 2);

        let d = d.canonicalize().unwrap();
        assert_eq!(
            warnings,
            vec![
                Warning::HierarchyCycle {
                    sheet: d.join("top.kicad_sch"),
                    referenced_from: d.join("a.kicad_sch"),
                },
                Warning::HierarchyCycle {
                    sheet: d.join("a.kicad_sch"),
                    referenced_from: d.join("a.kicad_sch"),
                },
            ]
        );
    }

    #[test]
    fn test_sibling_cycle() {
        let tmp = TempDir::new().unwrap();
        let d = tmp.path();
        write(
            d,
            "top.kicad_sch",
            &SchematicBuilder::new()
                .sheet("A", "a.kicad_sch")
                .sheet("B", "b.kicad_sch")
                .build(),
        );
        write(d, "a.kicad_sch", &SchematicBuilder::new().sheet("B", "b.kicad_sch").build());
        write(d, "b.kicad_sch", &SchematicBuilder::new().sheet("A", "a.kicad_sch").build());

        let mut warnings = Vec::new();
        let sheets = discover_sheets(&d.join("top.kicad_sch"), &mut warnings).unwrap();
        let d = d.canonicalize().unwrap();
        assert_eq!(
            sheets,
            vec![d.join("top.kicad_sch"), d.join("a.kicad_sch"), d.join("b.kicad_sch")]
        );
        assert_eq!(
            warnings,
            vec![Warning::HierarchyCycle {
                sheet: d.join("a.kicad_sch"),
                referenced_from: d.join("b.kicad_sch"),
            }]
        );
    }

    #[test]
    fn test_missing_and_broken_children() {
        let tmp = TempDir::new().unwrap();
        let d = tmp.path();
        write(
            d,
            "top.kicad_sch",
            &SchematicBuilder::new()
                .sheet("Gone", "gone.kicad_sch")
                .sheet("Broken", "broken.kicad_sch")
                .build(),
        );
        write(d, "broken.kicad_sch", "(kicad_sch (symbol (lib_id \"Device:R\")");

        let mut warnings = Vec::new();
        let sheets = discover_sheets(&d.join("top.kicad_sch"), &mut warnings).unwrap();
        assert_eq!(sheets.len(), 1);
        assert!(matches!(
            warnings.as_slice(),
            [
                Warning::MissingSheet { .. },
                Warning::UnreadableFile { message, .. },
            ] if message.contains("unclosed list")
        ));
    }

    #[test]
    fn test_error_chain() {
        let err = ProjectError::Syntax {
            path: PathBuf::from("x.kicad_sch"),
            source: jbom_sexpr::parse("(a").unwrap_err(),
        };
        assert_eq!(
            error_chain(&err),
            "failed to parse x.kicad_sch: unclosed list at line 1, column 1"
        );
    }
}
