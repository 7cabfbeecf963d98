use astre::cripple::{self, CrippleParams};
use astre::error::AstreResult;
use astre::points::PointsFile;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct CrippleArgs {
    /// Ground truth points file
    pub input: PathBuf,

    /// Output points file
    pub output: PathBuf,

    #[command(flatten)]
    pub params: CrippleParams,
}

pub fn run(args: CrippleArgs) -> AstreResult<()> {
    let points = PointsFile::load(&args.input)?;
    println!("\n✂️  Removing inner trajectory points ({}%)", args.params.rate);

    let crippled = cripple::cripple(&points, &args.params)?;
    crippled.points.save(&args.output)?;

    println!(
        "💾 {} points kept, {} removed -> {}",
        crippled.points.total_points(),
        crippled.removed,
        args.output.display()
    );
    Ok(())
}
