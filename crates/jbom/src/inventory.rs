use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use jbom_inventory::{ExtractOptions, extract_parts, load_inventories, merge_inventories, parts_table};
use jbom_project::{BoardLoad, LoadOptions};

use crate::output::{self, OutputFormat};
use crate::project::{ProjectArgs, Session};

#[derive(Args, Debug, Clone)]
#[command(about = "Extract an inventory table from the design's components")]
pub struct InventoryArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Existing inventory file to compare against; repeatable
    #[arg(short = 'i', long = "inventory", value_name = "FILE", requires = "missing_only")]
    pub inventory: Vec<PathBuf>,

    /// Only list parts the given inventory does not cover yet
    #[arg(long, requires = "inventory")]
    pub missing_only: bool,

    /// Lowest heuristic score that counts as covered (0-100)
    #[arg(long, value_name = "SCORE", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub min_confidence: Option<u8>,

    /// Output format (defaults to the output file extension, else csv)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Write to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

pub fn execute(args: InventoryArgs) -> Result<()> {
    let session = Session::open(&args.project)?;
    let loaded = session.load(&LoadOptions {
        schematics: true,
        board: BoardLoad::Skip,
        ..Default::default()
    })?;
    let mut warnings = loaded.warnings;

    let existing = if args.missing_only {
        let items = load_inventories(&args.inventory).context("Failed to load inventory")?;
        let inventory = merge_inventories(items);
        warnings.extend(inventory.warnings.iter().cloned());
        Some(inventory)
    } else {
        None
    };
    let match_config = session.config.match_config(args.min_confidence, None);
    let options = ExtractOptions {
        missing_from: existing.as_ref().map(|inventory| (inventory, &match_config)),
    };
    let parts = extract_parts(&loaded.components, &options);
    log::debug!("Extracted {} parts", parts.len());

    let format = output::resolve_format(args.format, args.output.as_deref())?;
    let mut writer = output::open_output(args.output.as_deref())?;
    match format {
        OutputFormat::Json => output::write_json(&mut writer, &parts)?,
        _ => {
            let table = parts_table(&parts);
            output::write_rows(&mut writer, format, &table.columns, &table.cells())?;
        }
    }
    writer.flush()?;

    output::print_warnings(&warnings);
    Ok(())
}
