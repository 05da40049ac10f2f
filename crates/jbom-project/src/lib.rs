//! Locate a KiCad project on disk and the files that make it up.
//!
//! [`resolve`] turns whatever the user pointed at (a directory, a project
//! file, a schematic, a board, or nothing at all) into a [`ProjectLayout`];
//! [`load_project`] then extracts every sheet and the board in parallel.

use std::fs;
use std::path::{Path, PathBuf};

use jbom_sch::Warning;
use serde::Serialize;
use tracing::instrument;

mod hierarchy;
mod load;

pub use hierarchy::discover_sheets;
pub use load::{BoardLoad, LoadOptions, LoadedProject, load_project};

pub const PROJECT_EXT: &str = "kicad_pro";
pub const SCHEMATIC_EXT: &str = "kicad_sch";
pub const BOARD_EXT: &str = "kicad_pcb";

#[derive(Debug, thiserror::Error)]
pub enum ProjectError {
    #[error("{} does not exist", .path.display())]
    NotFound { path: PathBuf },

    #[error("expected exactly one .kicad_pro file in {}, found {}", .dir.display(), describe_found(.found))]
    AmbiguousProject { dir: PathBuf, found: Vec<PathBuf> },

    #[error("project {} has neither a schematic nor a board file", .project.display())]
    MissingDomainFile { project: PathBuf },

    #[error("project {} has no board file", .project.display())]
    MissingBoard { project: PathBuf },

    #[error("failed to read {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}", .path.display())]
    Syntax {
        path: PathBuf,
        #[source]
        source: jbom_sexpr::ParseError,
    },

    #[error("{} is not a KiCad {kind} file", .path.display())]
    WrongFileKind {
        path: PathBuf,
        kind: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

fn describe_found(found: &[PathBuf]) -> String {
    if found.is_empty() {
        return "none".to_string();
    }
    found
        .iter()
        .map(|p| {
            p.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| p.display().to_string())
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// The files making up one KiCad project. All paths are canonical.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProjectLayout {
    pub project_file: PathBuf,
    pub dir: PathBuf,
    pub root_schematic: Option<PathBuf>,
    pub pcb: Option<PathBuf>,
    /// Every reachable schematic sheet, root first, breadth-first.
    pub sheets: Vec<PathBuf>,
    /// The file the user named, if they named one.
    pub hint: Option<PathBuf>,
}

impl ProjectLayout {
    /// Project name: the `.kicad_pro` file stem.
    pub fn name(&self) -> &str {
        self.project_file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone)]
pub struct Resolution {
    pub layout: ProjectLayout,
    pub warnings: Vec<Warning>,
}

fn canonicalize(path: &Path) -> Result<PathBuf, ProjectError> {
    fs::canonicalize(path).map_err(|source| ProjectError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn find_project_files(dir: &Path) -> Result<Vec<PathBuf>, ProjectError> {
    let io_err = |source| ProjectError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let mut found = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == PROJECT_EXT) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Resolve a project from a user-supplied path.
///
/// `None` means the current directory. A file argument selects its parent
/// directory and is remembered as the hint; when the hint turns out not to be
/// part of the discovered project a [`Warning::ProjectFileMismatch`] is
/// reported and the project is used anyway.
#[instrument(name = "resolve_project", skip_all)]
pub fn resolve(path: Option<&Path>) -> Result<Resolution, ProjectError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => std::env::current_dir().map_err(|source| ProjectError::Io {
            path: PathBuf::from("."),
            source,
        })?,
    };
    if !path.exists() {
        return Err(ProjectError::NotFound { path });
    }
    let path = canonicalize(&path)?;

    let (dir, hint) = if path.is_file() {
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        (dir, Some(path))
    } else {
        (path, None)
    };

    let found = find_project_files(&dir)?;
    let [project_file] = found.as_slice() else {
        return Err(ProjectError::AmbiguousProject { dir, found });
    };
    let project_file = project_file.clone();

    let existing = |ext: &str| {
        let candidate = project_file.with_extension(ext);
        candidate.is_file().then_some(candidate)
    };
    let root_schematic = existing(SCHEMATIC_EXT);
    let pcb = existing(BOARD_EXT);
    if root_schematic.is_none() && pcb.is_none() {
        return Err(ProjectError::MissingDomainFile {
            project: project_file,
        });
    }

    let mut warnings = Vec::new();
    let sheets = match &root_schematic {
        Some(root) => discover_sheets(root, &mut warnings)?,
        None => Vec::new(),
    };
    log::debug!(
        "Resolved project {} with {} sheet(s), board: {}",
        project_file.display(),
        sheets.len(),
        pcb.as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "none".to_string())
    );

    if let Some(hint) = &hint {
        let belongs = *hint == project_file
            || pcb.as_ref() == Some(hint)
            || sheets.iter().any(|s| s == hint);
        if !belongs {
            warnings.push(Warning::ProjectFileMismatch {
                hint: hint.clone(),
                project: project_file.clone(),
            });
        }
    }

    Ok(Resolution {
        layout: ProjectLayout {
            project_file,
            dir,
            root_schematic,
            pcb,
            sheets,
            hint,
        },
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jbom_test_utils::kicad::{BoardBuilder, PROJECT_FILE, SchematicBuilder, Symbol};
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &Path, rel: &str, contents: &str) -> PathBuf {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        path
    }

    fn simple_project() -> TempDir {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "board.kicad_pro", PROJECT_FILE);
        write(
            tmp.path(),
            "board.kicad_sch",
            &SchematicBuilder::new()
                .symbol(Symbol::resistor("R1", "10K", "0603"))
                .build(),
        );
        write(tmp.path(), "board.kicad_pcb", &BoardBuilder::new().build());
        tmp
    }

    #[test]
    fn test_resolve_directory() {
        let tmp = simple_project();
        let dir = tmp.path().canonicalize().unwrap();
        let resolution = resolve(Some(tmp.path())).unwrap();
        let layout = resolution.layout;

        assert_eq!(layout.dir, dir);
        assert_eq!(layout.project_file, dir.join("board.kicad_pro"));
        assert_eq!(layout.root_schematic, Some(dir.join("board.kicad_sch")));
        assert_eq!(layout.pcb, Some(dir.join("board.kicad_pcb")));
        assert_eq!(layout.sheets, vec![dir.join("board.kicad_sch")]);
        assert_eq!(layout.hint, None);
        assert_eq!(layout.name(), "board");
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn test_resolve_from_member_file() {
        let tmp = simple_project();
        let resolution = resolve(Some(&tmp.path().join("board.kicad_pcb"))).unwrap();
        assert!(resolution.layout.hint.is_some());
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn test_resolve_foreign_hint_warns() {
        let tmp = simple_project();
        let stray = write(tmp.path(), "notes.kicad_sch", &SchematicBuilder::new().build());
        let resolution = resolve(Some(&stray)).unwrap();
        assert!(matches!(
            resolution.warnings.as_slice(),
            [Warning::ProjectFileMismatch { .. }]
        ));
        assert_eq!(resolution.layout.name(), "board");
    }

    #[test]
    fn test_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = resolve(Some(&tmp.path().join("missing"))).unwrap_err();
        assert!(matches!(err, ProjectError::NotFound { .. }));
    }

    #[test]
    fn test_ambiguous_project() {
        let tmp = simple_project();
        write(tmp.path(), "other.kicad_pro", PROJECT_FILE);
        let err = resolve(Some(tmp.path())).unwrap_err();
        match &err {
            ProjectError::AmbiguousProject { found, .. } => assert_eq!(found.len(), 2),
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().ends_with("found board.kicad_pro, other.kicad_pro"));

        let empty = TempDir::new().unwrap();
        let err = resolve(Some(empty.path())).unwrap_err();
        assert!(err.to_string().ends_with("found none"));
    }

    #[test]
    fn test_missing_domain_files() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "board.kicad_pro", PROJECT_FILE);
        let err = resolve(Some(tmp.path())).unwrap_err();
        assert!(matches!(err, ProjectError::MissingDomainFile { .. }));
    }

    #[test]
    fn test_board_only_project() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "board.kicad_pro", PROJECT_FILE);
        write(tmp.path(), "board.kicad_pcb", &BoardBuilder::new().build());
        let layout = resolve(Some(tmp.path())).unwrap().layout;
        assert!(layout.root_schematic.is_none());
        assert!(layout.sheets.is_empty());
    }

    #[test]
    fn test_root_syntax_error_is_fatal() {
        let tmp = TempDir::new().unwrap();
        write(tmp.path(), "board.kicad_pro", PROJECT_FILE);
        write(tmp.path(), "board.kicad_sch", "(kicad_sch (symbol");
        let err = resolve(Some(tmp.path())).unwrap_err();
        assert!(matches!(err, ProjectError::Syntax { .. }));
    }
}
