use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use jbom_inventory::{Match, assignments, load_inventories, match_components, merge_inventories};
use jbom_project::{BoardLoad, LoadOptions};
use jbom_sch::{Bom, BomOptions, Component};
use serde_json::json;

use crate::config;
use crate::output::{self, OutputFormat};
use crate::project::{ProjectArgs, Session};

#[derive(Args, Debug, Clone)]
#[command(about = "Generate a Bill of Materials from a KiCad project")]
pub struct BomArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Inventory file (.csv or .tsv); repeat for several sources, earlier ones win conflicts
    #[arg(short = 'i', long = "inventory", value_name = "FILE")]
    pub inventory: Vec<PathBuf>,

    /// Fabricator preset selecting columns and distributor (generic, jlc, pcbway, seeed or from jbom.toml)
    #[arg(long, default_value = "generic")]
    pub fabricator: String,

    /// Only match inventory items sold by this distributor
    #[arg(long, value_name = "NAME")]
    pub distributor: Option<String>,

    /// Lowest heuristic score accepted as a match (0-100)
    #[arg(long, value_name = "SCORE", value_parser = clap::value_parser!(u8).range(0..=100))]
    pub min_confidence: Option<u8>,

    /// Comma-separated column keys, e.g. reference,quantity,value,I:Tolerance,C:Voltage
    #[arg(long, value_name = "KEYS")]
    pub fields: Option<String>,

    /// Keep do-not-populate parts, marked DNP
    #[arg(long)]
    pub include_dnp: bool,

    /// Keep parts flagged "exclude from BOM"
    #[arg(long)]
    pub include_excluded: bool,

    /// Keep power symbols and other # references
    #[arg(long)]
    pub include_virtual: bool,

    /// Output format (defaults to the output file extension, else csv)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Write to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Report every component's ranked inventory candidates
    #[arg(short, long)]
    pub verbose: bool,
}

pub fn execute(args: BomArgs) -> Result<()> {
    let session = Session::open(&args.project)?;
    let loaded = session.load(&LoadOptions {
        schematics: true,
        board: BoardLoad::Skip,
        ..Default::default()
    })?;
    let mut warnings = loaded.warnings;

    let options = BomOptions {
        include_dnp: args.include_dnp,
        include_excluded: args.include_excluded,
        include_virtual: args.include_virtual,
    };
    let fabricator = session.config.fabricator(&args.fabricator)?;
    let columns = config::bom_columns(args.fields.as_deref(), &fabricator);

    let mut matches: Vec<Match> = Vec::new();
    if !args.inventory.is_empty() {
        let items = load_inventories(&args.inventory).context("Failed to load inventory")?;
        let inventory = merge_inventories(items);
        warnings.extend(inventory.warnings.iter().cloned());

        let distributor = args.distributor.clone().or(fabricator.distributor.clone());
        let match_config = session.config.match_config(args.min_confidence, distributor);
        let wanted: Vec<Component> = loaded
            .components
            .iter()
            .filter(|c| options.keeps(c))
            .cloned()
            .collect();
        let (found, match_warnings) = match_components(&wanted, &inventory, &match_config);
        warnings.extend(match_warnings);
        matches = found;
    }
    let assignments = if matches.is_empty() {
        HashMap::new()
    } else {
        assignments(&matches)
    };

    let bom = Bom::build(&loaded.components, &assignments, &options);
    log::debug!("BOM: {} rows, {} parts", bom.len(), bom.part_count());

    let format = output::resolve_format(args.format, args.output.as_deref())?;
    let mut writer = output::open_output(args.output.as_deref())?;
    match format {
        OutputFormat::Json => {
            let mut document = json!({
                "rows": bom.to_json(&columns),
                "warnings": warnings,
            });
            if args.verbose {
                document["matches"] = serde_json::to_value(&matches)?;
            }
            output::write_json(&mut writer, &document)?;
        }
        OutputFormat::Table => bom.write_table(&mut writer, &columns)?,
        OutputFormat::Csv | OutputFormat::Tsv => {
            let headers: Vec<String> = columns.iter().map(|(h, _)| h.clone()).collect();
            output::write_rows(&mut writer, format, &headers, &bom.render(&columns))?;
        }
    }
    writer.flush()?;

    if args.verbose && format != OutputFormat::Json {
        write_match_report(io::stderr().lock(), &matches)?;
    }
    output::print_warnings(&warnings);
    Ok(())
}

fn write_match_report<W: Write>(writer: W, matches: &[Match]) -> Result<()> {
    let headers: Vec<String> = [
        "Reference",
        "Outcome",
        "IPN",
        "Score",
        "Rule",
        "Priority",
        "Distributor",
        "Source",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect();

    let mut rows = Vec::new();
    for m in matches {
        if m.candidates.is_empty() {
            rows.push(vec![
                m.reference.clone(),
                m.outcome.to_string(),
                "-".to_string(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
            ]);
            continue;
        }
        for (i, candidate) in m.candidates.iter().enumerate() {
            let item = &candidate.item;
            let (reference, outcome) = if i == 0 {
                (m.reference.clone(), m.outcome.to_string())
            } else {
                (String::new(), String::new())
            };
            rows.push(vec![
                reference,
                outcome,
                item.ipn.clone(),
                candidate.score.to_string(),
                candidate.rule.to_string(),
                item.priority.map(|p| p.to_string()).unwrap_or_default(),
                item.distributor.clone(),
                item.location(),
            ]);
        }
    }
    jbom_sch::write_rows_table(writer, &headers, &rows)?;
    Ok(())
}
