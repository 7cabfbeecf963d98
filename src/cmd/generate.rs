use astre::error::AstreResult;
use astre::generator::{self, SceneParams};
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct GenerateArgs {
    /// Output points file
    pub output: PathBuf,

    #[command(flatten)]
    pub scene: SceneParams,
}

pub fn run(args: GenerateArgs) -> AstreResult<()> {
    println!("\n🎲 Generating {} frames", args.scene.frames);
    let scene = generator::generate(&args.scene)?;
    scene.points.save(&args.output)?;

    println!(
        "💾 {} trajectories, {} points -> {}",
        scene.trajectories,
        scene.points.total_points(),
        args.output.display()
    );
    println!(
        "   max speed {:.2} | max acceleration {:.2}",
        scene.max_speed, scene.max_accel
    );
    Ok(())
}
