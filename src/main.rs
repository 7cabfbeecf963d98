use astre::config::DetectionParams;
use astre::error::AstreResult;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process;
use tracing::{error, Level};

mod cmd;
mod reports;

#[derive(Parser, Debug)]
#[command(author, version, about = "A-contrario trajectory detection", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON file of detection parameters (replaces the command-line values)
    #[arg(global = true, long)]
    params: Option<PathBuf>,

    #[arg(global = true, long, default_value_t = false)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Detect trajectories in a points file
    Detect(cmd::detect::DetectArgs),
    /// Characteristics of one trajectory given by a descriptor
    Info(cmd::info::InfoArgs),
    /// Compare detected links with a ground truth
    Stats(cmd::stats::StatsArgs),
    /// Generate a synthetic scene
    Generate(cmd::generate::GenerateArgs),
    /// Randomly remove inner trajectory points of a ground truth
    Cripple(cmd::cripple::CrippleArgs),
}

fn execute(cli: Cli) -> AstreResult<()> {
    // JSON parameters take precedence over the flags of the subcommand
    let params = cli
        .params
        .as_ref()
        .map(DetectionParams::load_from_file)
        .transpose()?;

    match cli.command {
        Commands::Detect(mut args) => {
            if let Some(p) = params {
                args.config.detection = p;
            }
            cmd::detect::run(args)
        }
        Commands::Info(mut args) => {
            if let Some(p) = params {
                args.detection = p;
            }
            cmd::info::run(args)
        }
        Commands::Stats(args) => cmd::stats::run(args),
        Commands::Generate(args) => cmd::generate::run(args),
        Commands::Cripple(args) => cmd::cripple::run(args),
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = execute(cli) {
        error!("{}", e);
        process::exit(1);
    }
}
