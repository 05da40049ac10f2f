use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use jbom_project::{LoadOptions, LoadedProject, Resolution};

use crate::config::JbomConfig;

/// Arguments shared by every command that reads a project.
#[derive(Args, Debug, Clone)]
pub struct ProjectArgs {
    /// Project directory, .kicad_pro, schematic or board file (defaults to the current directory)
    #[arg(value_name = "PROJECT", value_hint = clap::ValueHint::AnyPath)]
    pub project: Option<PathBuf>,

    /// Configuration file (defaults to jbom.toml next to the project)
    #[arg(long, value_name = "FILE", value_hint = clap::ValueHint::FilePath)]
    pub config: Option<PathBuf>,
}

/// A resolved project with its configuration.
pub struct Session {
    pub resolution: Resolution,
    pub config: JbomConfig,
}

impl Session {
    pub fn open(args: &ProjectArgs) -> Result<Self> {
        let resolution = jbom_project::resolve(args.project.as_deref()).with_context(|| match &args.project {
            Some(path) => format!("Failed to resolve KiCad project at {}", path.display()),
            None => "Failed to resolve KiCad project in the current directory".to_string(),
        })?;
        let config = JbomConfig::load(args.config.as_deref(), &resolution.layout.dir)?;
        Ok(Self { resolution, config })
    }

    /// Load the project, folding resolution warnings into the result.
    pub fn load(&self, options: &LoadOptions) -> Result<LoadedProject> {
        let layout = &self.resolution.layout;
        let mut loaded = jbom_project::load_project(layout, options)
            .with_context(|| format!("Failed to load project {}", layout.project_file.display()))?;
        let mut warnings = self.resolution.warnings.clone();
        warnings.append(&mut loaded.warnings);
        loaded.warnings = warnings;
        Ok(loaded)
    }
}
