use clap::{Parser, Subcommand};
use colored::Colorize;
use env_logger::Env;

mod bom;
mod config;
mod info;
mod inventory;
mod output;
mod pos;
mod profiling;
mod project;

#[derive(Parser)]
#[command(name = "jbom")]
#[command(about = "Bills of materials, placement files and inventory extracts for KiCad projects", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(short = 'd', long = "debug", global = true)]
    debug: bool,

    /// Write a performance profile to the specified path (Chrome tracing JSON format).
    /// View with chrome://tracing or https://ui.perfetto.dev/
    #[arg(long = "profile", global = true, value_name = "PATH", hide = true)]
    profile: Option<std::path::PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a Bill of Materials, optionally matched against inventory
    Bom(bom::BomArgs),

    /// Generate a placement (pick and place) file from the board
    Pos(pos::PosArgs),

    /// Extract an inventory table from the design's components
    #[command(alias = "inv")]
    Inventory(inventory::InventoryArgs),

    /// Show the resolved project layout
    Info(info::InfoArgs),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("{} {e}", "Error:".red());
        for cause in e.chain().skip(1) {
            eprintln!("  {cause}");
        }
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // RUST_LOG overrides the default level; set up before the tracing subscriber
    let env = if cli.debug {
        Env::default().default_filter_or("debug")
    } else {
        Env::default().default_filter_or("error")
    };
    env_logger::Builder::from_env(env).init();

    let _profile_guard = profiling::init(cli.profile);

    match cli.command {
        Commands::Bom(args) => bom::execute(args),
        Commands::Pos(args) => pos::execute(args),
        Commands::Inventory(args) => inventory::execute(args),
        Commands::Info(args) => info::execute(args),
    }
}
