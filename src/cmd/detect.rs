use crate::reports;
use astre::api::{self, DetectionSummary};
use astre::config::Config;
use astre::detector::{ProgressCallback, RoundOutcome, RoundReport, Silent};
use astre::error::AstreResult;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Debug, Clone)]
pub struct DetectArgs {
    /// Input points file
    pub input: PathBuf,

    /// Output points file with a trajectory column
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub config: Config,

    /// Print the summary as JSON instead of tables
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Write one CSV row per trajectory
    #[arg(long)]
    pub summary: Option<PathBuf>,
}

struct ConsoleProgress;

impl ProgressCallback for ConsoleProgress {
    fn on_round(&self, r: &RoundReport) {
        let min = r
            .min_log_nfa
            .map_or_else(|| "-".to_string(), |v| format!("{:.2}", v));
        let status = match r.outcome {
            RoundOutcome::Recompute => "refill",
            RoundOutcome::Done => "done",
        };
        println!(
            "🔁 Round {:3} | min lNFA {:>8} | +{} trajectories | {} broken | {}",
            r.round, min, r.committed, r.broken, status
        );
    }
}

pub fn run(args: DetectArgs) -> AstreResult<()> {
    let output = args.output.as_deref();

    if args.json {
        let (_, summary) = api::detect_file(&args.input, output, &args.config, &Silent)?;
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return write_summary(&args, &summary);
    }

    println!("\n🚀 Detecting trajectories in {}", args.input.display());
    let (result, summary) = api::detect_file(&args.input, output, &args.config, &ConsoleProgress)?;

    reports::print_trajectory_table(&summary.trajectories);
    println!(
        "\n=== 🏁 {} trajectories ({} restored) | {} rounds | {:.2}s ===",
        result.store.len(),
        result.restored,
        result.rounds,
        result.elapsed_secs
    );
    if let Some(path) = output {
        println!("💾 Saved to {}", path.display());
    }
    write_summary(&args, &summary)
}

fn write_summary(args: &DetectArgs, summary: &DetectionSummary) -> AstreResult<()> {
    if let Some(path) = &args.summary {
        reports::write_summary_csv(path, &summary.trajectories)?;
    }
    Ok(())
}
