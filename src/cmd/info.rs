use crate::reports;
use astre::api;
use astre::config::DetectionParams;
use astre::error::AstreResult;
use astre::points::PointsFile;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct InfoArgs {
    pub points: PathBuf,

    /// Trajectory descriptor, e.g. "S0 P3 H1 P7 P2"
    pub descriptor: String,

    #[command(flatten)]
    pub detection: DetectionParams,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub fn run(args: InfoArgs) -> AstreResult<()> {
    let points = PointsFile::load(&args.points)?;
    let c = api::describe_trajectory(&points, &args.descriptor, &args.detection)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&c)?);
    } else {
        reports::print_characteristics(&args.descriptor, &c);
    }
    Ok(())
}
