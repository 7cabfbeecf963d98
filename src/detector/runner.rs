use super::extract::{RoundOutcome, RoundReport};
use super::Session;
use crate::config::Config;
use crate::error::AstreResult;
use crate::points::PointsFile;
use crate::scorer::Characteristics;
use crate::trajectory::TrajectoryStore;
use std::path::PathBuf;
use std::time::Instant;
use tracing::info;

#[derive(Debug, Clone, PartialEq)]
pub struct DetectionOptions {
    pub max_log_nfa: f64,
    pub max_len: usize,
    pub max_hole: i64,
    pub auto_crop: bool,
    pub restart: Option<PathBuf>,
    pub save_partial: Option<PathBuf>,
    pub tag_only: bool,
}

impl Default for DetectionOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for DetectionOptions {
    fn from(cfg: &Config) -> Self {
        Self {
            max_log_nfa: cfg.detection.max_log_nfa,
            max_len: cfg.detection.max_len,
            max_hole: cfg.detection.max_hole,
            auto_crop: cfg.detection.auto_crop,
            restart: cfg.run.restart.clone(),
            save_partial: cfg.run.save_partial.clone(),
            tag_only: cfg.run.tag_nfa,
        }
    }
}

/// Receives a report after every fill and extraction round.
pub trait ProgressCallback: Send + Sync {
    fn on_round(&self, report: &RoundReport);
}

/// Callback for runs nobody watches.
pub struct Silent;

impl ProgressCallback for Silent {
    fn on_round(&self, _report: &RoundReport) {}
}

pub struct DetectionResult {
    pub input: PointsFile,
    pub annotated: PointsFile,
    pub store: TrajectoryStore,
    pub characteristics: Vec<Characteristics>,
    pub restored: usize,
    pub rounds: usize,
    pub elapsed_secs: f64,
}

pub struct Detector {
    options: DetectionOptions,
}

impl Detector {
    pub fn new(options: DetectionOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DetectionOptions {
        &self.options
    }

    pub fn run<CB: ProgressCallback>(&self, input: PointsFile, callback: &CB) -> AstreResult<DetectionResult> {
        let opts = &self.options;
        let start = Instant::now();

        // 1. Tables and masks
        let mut session = Session::new(input, opts)?;

        // 2. Previous trajectories
        let restored = if opts.tag_only {
            let own = session.input().clone();
            session.restore(&own)?
        } else if let Some(path) = &opts.restart {
            let previous = PointsFile::load(path)?;
            session.restore(&previous)?
        } else {
            0
        };
        if restored > 0 {
            info!("Restored {} trajectories", restored);
        }

        // 3. Fill / extract until nothing is left under the threshold
        let mut rounds = 0;
        if !opts.tag_only {
            loop {
                rounds += 1;
                session.fill();
                let report = session.extract_round(rounds)?;
                callback.on_round(&report);

                if let Some(path) = &opts.save_partial {
                    session.annotated_output()?.save(path)?;
                }
                if report.outcome == RoundOutcome::Done {
                    break;
                }
            }
        }

        // 4. Results
        let annotated = session.annotated_output()?;
        let characteristics = session.characteristics()?;
        let (input, store) = session.into_parts();
        info!(
            "Detection finished: {} trajectories in {} rounds",
            store.len(),
            rounds
        );

        Ok(DetectionResult {
            input,
            annotated,
            store,
            characteristics,
            restored,
            rounds,
            elapsed_secs: start.elapsed().as_secs_f64(),
        })
    }
}
