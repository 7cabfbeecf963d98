use crate::config::{Config, DetectionParams};
use crate::detector::{Bounds, DetectionOptions, DetectionResult, Detector, ProgressCallback};
use crate::error::AstreResult;
use crate::points::PointsFile;
use crate::scorer::{Characteristics, NfaModel};
use crate::trajectory::Trajectory;
use serde::Serialize;
use std::path::Path;
use tracing::info;

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrajectoryReport {
    pub id: usize,
    /// Frame number as written in the input file.
    pub start: i64,
    pub length: usize,
    pub size: usize,
    pub runs: usize,
    pub delta: f32,
    pub log_nfa: f64,
    pub descriptor: String,
}

#[derive(Serialize, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DetectionSummary {
    pub input: String,
    pub output: Option<String>,
    pub frames: usize,
    pub points: usize,
    pub rounds: usize,
    pub restored: usize,
    pub elapsed_secs: f64,
    pub trajectories: Vec<TrajectoryReport>,
}

impl DetectionSummary {
    pub fn new(input: &Path, output: Option<&Path>, result: &DetectionResult) -> Self {
        let trajectories = result
            .store
            .iter()
            .zip(&result.characteristics)
            .enumerate()
            .map(|(id, (traj, c))| TrajectoryReport {
                id,
                start: c.start as i64 + result.input.first_frame,
                length: c.len,
                size: c.size,
                runs: c.runs,
                delta: c.delta,
                log_nfa: c.log_nfa,
                descriptor: traj.descriptor().trim_end().to_string(),
            })
            .collect();

        Self {
            input: input.display().to_string(),
            output: output.map(|p| p.display().to_string()),
            frames: result.input.n_frames(),
            points: result.input.total_points(),
            rounds: result.rounds,
            restored: result.restored,
            elapsed_secs: result.elapsed_secs,
            trajectories,
        }
    }
}

/// Service: load a points file, detect its trajectories and optionally save
/// the annotated copy.
pub fn detect_file<CB: ProgressCallback>(
    input: &Path,
    output: Option<&Path>,
    config: &Config,
    callback: &CB,
) -> AstreResult<(DetectionResult, DetectionSummary)> {
    let points = PointsFile::load(input)?;
    info!(
        "Loaded {} points over {} frames from {}",
        points.total_points(),
        points.n_frames(),
        input.display()
    );

    let detector = Detector::new(DetectionOptions::from(config));
    let result = detector.run(points, callback)?;

    if let Some(path) = output {
        result.annotated.save(path)?;
        info!("Saved annotated points to {}", path.display());
    }

    let summary = DetectionSummary::new(input, output, &result);
    Ok((result, summary))
}

/// Service: characteristics of the trajectory written as `descriptor` over `points`.
pub fn describe_trajectory(
    points: &PointsFile,
    descriptor: &str,
    params: &DetectionParams,
) -> AstreResult<Characteristics> {
    let traj = Trajectory::parse_descriptor_within(descriptor, points.n_frames())?;
    let bounds = Bounds::new(points.n_frames(), params.max_len, params.max_hole);
    let model = NfaModel::new(points, params.auto_crop, bounds.adjacency_only())?;
    model.characteristics(&traj)
}
