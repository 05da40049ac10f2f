use std::path::Path;

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use jbom_project::{BoardLoad, LoadOptions, LoadedProject};
use jbom_sch::BomOptions;
use serde_json::json;

use crate::output;
use crate::project::{ProjectArgs, Session};

#[derive(Args, Debug)]
#[command(about = "Show the resolved project layout and what it contains")]
pub struct InfoArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Output format
    #[arg(short = 'f', long, value_enum, default_value = "human")]
    pub format: InfoFormat,
}

#[derive(Debug, Clone, clap::ValueEnum)]
pub enum InfoFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

pub fn execute(args: InfoArgs) -> Result<()> {
    let session = Session::open(&args.project)?;
    let loaded = session.load(&LoadOptions {
        schematics: true,
        board: BoardLoad::BestEffort,
        ..Default::default()
    })?;

    match args.format {
        InfoFormat::Human => {
            print_human_readable(&loaded);
            output::print_warnings(&loaded.warnings);
        }
        InfoFormat::Json => {
            let document = json!({
                "layout": loaded.layout,
                "components": loaded.components.len(),
                "bom_components": bom_count(&loaded),
                "placements": loaded.placements.len(),
                "warnings": loaded.warnings,
            });
            output::write_json(std::io::stdout().lock(), &document)?;
        }
    }
    Ok(())
}

fn bom_count(loaded: &LoadedProject) -> usize {
    let options = BomOptions::default();
    loaded.components.iter().filter(|c| options.keeps(c)).count()
}

fn relative<'a>(path: &'a Path, dir: &Path) -> std::path::Display<'a> {
    path.strip_prefix(dir).unwrap_or(path).display()
}

fn print_human_readable(loaded: &LoadedProject) {
    let layout = &loaded.layout;
    println!("{} {}", "Project".blue().bold(), layout.name().bold());
    println!("Directory: {}", layout.dir.display());
    println!("Project file: {}", relative(&layout.project_file, &layout.dir));
    match &layout.root_schematic {
        Some(path) => println!("Schematic: {}", relative(path, &layout.dir)),
        None => println!("Schematic: {}", "none".dimmed()),
    }
    match &layout.pcb {
        Some(path) => println!("Board: {}", relative(path, &layout.dir)),
        None => println!("Board: {}", "none".dimmed()),
    }

    if !layout.sheets.is_empty() {
        println!();
        println!("{} ({})", "Sheets".blue().bold(), layout.sheets.len());
        for (i, sheet) in layout.sheets.iter().enumerate() {
            println!("  {}. {}", i + 1, relative(sheet, &layout.dir));
        }
    }

    println!();
    println!(
        "Components: {} ({} in BOM)",
        loaded.components.len(),
        bom_count(loaded)
    );
    println!("Placements: {}", loaded.placements.len());
}
