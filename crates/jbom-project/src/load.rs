use std::fs;
use std::path::Path;

use jbom_sch::{Component, PcbComponent, PlacementOrigin, SchematicSheet, Warning};
use rayon::prelude::*;
use tracing::instrument;

use crate::hierarchy::{error_chain, parse_sheet_file};
use crate::{ProjectError, ProjectLayout};

/// How much the caller depends on the board file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BoardLoad {
    #[default]
    Skip,
    /// Read placements if possible; failures become warnings.
    BestEffort,
    /// Placements are the output; a missing or broken board is an error.
    Required,
}

#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    pub schematics: bool,
    pub board: BoardLoad,
    pub origin: PlacementOrigin,
}

#[derive(Debug, Clone)]
pub struct LoadedProject {
    pub layout: ProjectLayout,
    /// Consolidated components of every sheet, in sheet order.
    pub components: Vec<Component>,
    pub placements: Vec<PcbComponent>,
    pub warnings: Vec<Warning>,
}

fn load_sheet(path: &Path, project: &str) -> Result<SchematicSheet, ProjectError> {
    let root = parse_sheet_file(path)?;
    jbom_sch::extract_schematic(&root, path, Some(project)).map_err(|source| {
        ProjectError::WrongFileKind {
            path: path.to_path_buf(),
            kind: "schematic",
            source: Box::new(source),
        }
    })
}

fn load_board(path: &Path, origin: PlacementOrigin) -> Result<Vec<PcbComponent>, ProjectError> {
    let text = fs::read_to_string(path).map_err(|source| ProjectError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let root = jbom_sexpr::parse(&text).map_err(|source| ProjectError::Syntax {
        path: path.to_path_buf(),
        source,
    })?;
    jbom_sch::extract_pcb(&root, origin).map_err(|source| ProjectError::WrongFileKind {
        path: path.to_path_buf(),
        kind: "board",
        source: Box::new(source),
    })
}

/// Extract components and placements of a resolved project.
///
/// Sheets and the board are parsed in parallel; results are merged in sheet
/// order so output does not depend on scheduling.
#[instrument(name = "load_project", skip_all)]
pub fn load_project(layout: &ProjectLayout, options: &LoadOptions) -> Result<LoadedProject, ProjectError> {
    let project = layout.name();

    if options.board == BoardLoad::Required && layout.pcb.is_none() {
        return Err(ProjectError::MissingBoard {
            project: layout.project_file.clone(),
        });
    }

    let (sheet_results, board_result) = rayon::join(
        || {
            if !options.schematics {
                return Vec::new();
            }
            layout
                .sheets
                .par_iter()
                .map(|path| load_sheet(path, project))
                .collect::<Vec<_>>()
        },
        || match (options.board, &layout.pcb) {
            (BoardLoad::Skip, _) | (_, None) => None,
            (_, Some(pcb)) => Some(load_board(pcb, options.origin)),
        },
    );

    let mut warnings = Vec::new();
    let mut sheets = Vec::with_capacity(sheet_results.len());
    for (path, result) in layout.sheets.iter().zip(sheet_results) {
        match result {
            Ok(sheet) => {
                warnings.extend(sheet.warnings.iter().cloned());
                sheets.push(sheet);
            }
            Err(err) => {
                log::warn!("Skipping {}: {}", path.display(), err);
                warnings.push(Warning::UnreadableFile {
                    path: path.clone(),
                    message: error_chain(&err),
                });
            }
        }
    }
    let components = jbom_sch::merge_sheet_components(&sheets, &mut warnings);

    let placements = match board_result {
        None => Vec::new(),
        Some(Ok(placements)) => placements,
        Some(Err(err)) if options.board == BoardLoad::Required => return Err(err),
        Some(Err(err)) => {
            warnings.push(Warning::UnreadableFile {
                path: layout.pcb.clone().unwrap_or_default(),
                message: error_chain(&err),
            });
            Vec::new()
        }
    };

    log::debug!(
        "Loaded {} components from {} sheet(s) and {} placements",
        components.len(),
        sheets.len(),
        placements.len()
    );

    Ok(LoadedProject {
        layout: layout.clone(),
        components,
        placements,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve;
    use jbom_test_utils::kicad::{BoardBuilder, PROJECT_FILE, SchematicBuilder, Symbol};
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, contents: &str) {
        fs::write(dir.join(rel), contents).unwrap();
    }

    fn hierarchical_project() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let d = tmp.path();
        write(d, "board.kicad_pro", PROJECT_FILE);
        write(
            d,
            "board.kicad_sch",
            &SchematicBuilder::new()
                .symbol(Symbol::resistor("R1", "10K", "0603"))
                .symbol(Symbol::new("U1", "Amplifier_Operational:LM358", "LM358", "Package_SO:SOIC-8_3.9x4.9mm_P1.27mm"))
                .symbol(Symbol::power("#PWR01", "GND"))
                .sheet("Power", "power.kicad_sch")
                .build(),
        );
        write(
            d,
            "power.kicad_sch",
            &SchematicBuilder::new()
                .symbol(Symbol::capacitor("C1", "100nF", "0402"))
                .symbol(Symbol::new("U1", "Amplifier_Operational:LM358", "LM358", "").unit(2))
                .build(),
        );
        write(
            d,
            "board.kicad_pcb",
            &BoardBuilder::new()
                .aux_origin(100.0, 100.0)
                .smd("R1", "10K", "Resistor_SMD:R_0603_1608Metric", 110.0, 105.0, 0.0)
                .smd("C1", "100nF", "Capacitor_SMD:C_0402_1005Metric", 120.0, 105.0, -90.0)
                .build(),
        );
        tmp
    }

    #[test]
    fn test_load_components_and_placements() {
        let tmp = hierarchical_project();
        let layout = resolve(Some(tmp.path())).unwrap().layout;
        let options = LoadOptions {
            schematics: true,
            board: BoardLoad::Required,
            origin: PlacementOrigin::Aux,
        };
        let loaded = load_project(&layout, &options).unwrap();

        let refs: Vec<&str> = loaded.components.iter().map(|c| c.reference.as_str()).collect();
        assert_eq!(refs, vec!["R1", "U1", "#PWR01", "C1"]);
        let u1 = &loaded.components[1];
        assert_eq!(u1.units.len(), 2);
        assert_eq!(u1.footprint, "Package_SO:SOIC-8_3.9x4.9mm_P1.27mm");

        assert_eq!(loaded.placements.len(), 2);
        assert_eq!((loaded.placements[0].x, loaded.placements[0].y), (10.0, 5.0));
        assert_eq!(loaded.placements[1].rotation, 270.0);
        assert!(loaded.warnings.is_empty(), "{:?}", loaded.warnings);
    }

    #[test]
    fn test_board_modes() {
        let tmp = hierarchical_project();
        write(tmp.path(), "board.kicad_pcb", "(kicad_pcb (footprint");
        let layout = resolve(Some(tmp.path())).unwrap().layout;

        let best_effort = LoadOptions {
            schematics: false,
            board: BoardLoad::BestEffort,
            ..Default::default()
        };
        let loaded = load_project(&layout, &best_effort).unwrap();
        assert!(loaded.components.is_empty());
        assert!(loaded.placements.is_empty());
        assert!(matches!(
            loaded.warnings.as_slice(),
            [Warning::UnreadableFile { .. }]
        ));

        let required = LoadOptions {
            board: BoardLoad::Required,
            ..best_effort
        };
        let err = load_project(&layout, &required).unwrap_err();
        assert!(matches!(err, ProjectError::Syntax { .. }));
    }

    #[test]
    fn test_broken_sheet_is_skipped() {
        let tmp = hierarchical_project();
        let layout = resolve(Some(tmp.path())).unwrap().layout;
        // the sheet breaks after discovery
        write(tmp.path(), "power.kicad_sch", "(kicad_sch (symbol");

        let options = LoadOptions {
            schematics: true,
            ..Default::default()
        };
        let loaded = load_project(&layout, &options).unwrap();
        assert_eq!(loaded.components.len(), 3);
        assert!(matches!(
            loaded.warnings.as_slice(),
            [Warning::UnreadableFile { path, .. }] if path.ends_with("power.kicad_sch")
        ));
    }
}
