use crate::reports;
use astre::error::AstreResult;
use astre::points::PointsFile;
use astre::stats;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct StatsArgs {
    /// Ground truth points file
    pub real: PathBuf,

    /// Detection result on the same points (defaults to the ground truth file)
    pub found: Option<PathBuf>,

    /// Trajectory field of the ground truth (0 = x, negative from the end)
    #[arg(short = 'r', long, default_value_t = 2, allow_negative_numbers = true)]
    pub real_field: i64,

    /// Trajectory field of the result (0 = x, negative from the end)
    #[arg(short = 'f', long, default_value_t = -1, allow_negative_numbers = true)]
    pub found_field: i64,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub fn run(args: StatsArgs) -> AstreResult<()> {
    let real = PointsFile::load(&args.real)?;
    let found = match &args.found {
        Some(path) => PointsFile::load(path)?,
        None => real.clone(),
    };
    let s = stats::link_stats(&real, args.real_field, &found, args.found_field)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&s)?);
    } else {
        reports::print_link_stats(&s);
    }
    Ok(())
}
