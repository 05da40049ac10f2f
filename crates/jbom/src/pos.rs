use std::io::Write;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};
use jbom_project::{BoardLoad, LoadOptions};
use jbom_sch::{PlacementOrigin, PosOptions, Side, Units, pos_rows};

use crate::config;
use crate::output::{self, OutputFormat};
use crate::project::{ProjectArgs, Session};

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum OriginArg {
    /// Board file coordinates
    #[default]
    Board,
    /// Relative to the drill/place (auxiliary axis) origin
    Aux,
}

#[derive(ValueEnum, Debug, Clone, Copy, Default)]
pub enum UnitsArg {
    #[default]
    Mm,
    Inch,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
pub enum SideArg {
    Top,
    Bottom,
}

#[derive(Args, Debug, Clone)]
#[command(about = "Generate a placement (pick and place) file from the board")]
pub struct PosArgs {
    #[command(flatten)]
    pub project: ProjectArgs,

    /// Fabricator preset selecting the columns
    #[arg(long, default_value = "generic")]
    pub fabricator: String,

    #[arg(long, value_enum, default_value_t = OriginArg::Board)]
    pub origin: OriginArg,

    #[arg(long, value_enum, default_value_t = UnitsArg::Mm)]
    pub units: UnitsArg,

    /// Only surface-mount parts
    #[arg(long)]
    pub smd_only: bool,

    /// Only parts on this side
    #[arg(long, value_enum)]
    pub side: Option<SideArg>,

    /// Keep do-not-populate parts
    #[arg(long)]
    pub include_dnp: bool,

    /// Keep # references
    #[arg(long)]
    pub include_virtual: bool,

    /// Output format (defaults to the output file extension, else csv)
    #[arg(short, long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Write to this file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl PosArgs {
    fn options(&self) -> PosOptions {
        PosOptions {
            units: match self.units {
                UnitsArg::Mm => Units::Mm,
                UnitsArg::Inch => Units::Inch,
            },
            smd_only: self.smd_only,
            side: self.side.map(|side| match side {
                SideArg::Top => Side::Top,
                SideArg::Bottom => Side::Bottom,
            }),
            include_dnp: self.include_dnp,
            include_virtual: self.include_virtual,
        }
    }
}

pub fn execute(args: PosArgs) -> Result<()> {
    let session = Session::open(&args.project)?;
    let loaded = session.load(&LoadOptions {
        schematics: false,
        board: BoardLoad::Required,
        origin: match args.origin {
            OriginArg::Board => PlacementOrigin::Board,
            OriginArg::Aux => PlacementOrigin::Aux,
        },
    })?;

    let fabricator = session.config.fabricator(&args.fabricator)?;
    let columns = config::pos_columns(&fabricator)?;
    let options = args.options();
    let placements = pos_rows(&loaded.placements, &options);
    log::debug!(
        "{} of {} placements selected",
        placements.len(),
        loaded.placements.len()
    );

    let headers: Vec<String> = columns.iter().map(|(h, _)| h.clone()).collect();
    let rows: Vec<Vec<String>> = placements
        .iter()
        .map(|p| {
            columns
                .iter()
                .map(|(_, column)| column.render(p, options.units))
                .collect()
        })
        .collect();

    let format = output::resolve_format(args.format, args.output.as_deref())?;
    let mut writer = output::open_output(args.output.as_deref())?;
    output::write_rows(&mut writer, format, &headers, &rows)?;
    writer.flush()?;

    output::print_warnings(&loaded.warnings);
    Ok(())
}
