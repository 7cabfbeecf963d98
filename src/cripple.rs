use crate::error::{AstreError, AstreResult};
use crate::points::PointsFile;
use clap::Args;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// Points kept at each end of a trajectory.
const KEPT_AT_ENDS: usize = 2;

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrippleParams {
    /// Percentage of chance that an inner trajectory point is removed
    #[arg(short = 'r', long, default_value_t = 20, allow_negative_numbers = true)]
    pub rate: i64,

    /// Trajectory field (0 = x, negative from the end)
    #[arg(short = 't', long, default_value_t = -1, allow_negative_numbers = true)]
    pub traj_field: i64,

    #[arg(long)]
    pub seed: Option<u64>,
}

impl Default for CrippleParams {
    fn default() -> Self {
        Self {
            rate: 20,
            traj_field: -1,
            seed: None,
        }
    }
}

pub struct CrippledScene {
    pub points: PointsFile,
    pub removed: usize,
}

/// Drops trajectory points at random to carve holes into a ground truth.
///
/// The first two and last two frames of every trajectory, as well as noise
/// points, are always kept. The result gets a fresh uid since its points
/// differ from the input.
pub fn cripple(points: &PointsFile, params: &CrippleParams) -> AstreResult<CrippledScene> {
    if !(0..=100).contains(&params.rate) {
        return Err(AstreError::Config(format!(
            "removal rate must lie in [0, 100], got {}",
            params.rate
        )));
    }
    let field = points.resolve_field(params.traj_field)?;
    if field < 2 {
        return Err(AstreError::Config(
            "trajectory field must come after x and y".into(),
        ));
    }

    // Frame span of every trajectory
    let spans: HashMap<i64, (usize, usize)> = points
        .extract_tagged_trajectories(field)?
        .into_iter()
        .map(|(id, t)| (id, (t.start, t.len())))
        .collect();
    let ids = points.trajectory_ids(field)?;

    let alpha = params.rate as f32 / 100.0;
    let mut rng = params.seed.map_or_else(fastrand::Rng::new, fastrand::Rng::with_seed);
    let mut out = PointsFile::new(points.width, points.height, points.tags().to_vec(), points.n_frames());
    out.headers = points.headers.clone();
    out.first_frame = points.first_frame;

    let mut removed = 0;
    for (k, frame_ids) in ids.iter().enumerate() {
        for (i, id) in frame_ids.iter().enumerate() {
            let inner = spans.get(id).is_some_and(|&(start, len)| {
                let pos = k - start;
                pos >= KEPT_AT_ENDS && pos + KEPT_AT_ENDS < len
            });
            if params.rate > 0 && inner && rng.f32() <= alpha {
                removed += 1;
                continue;
            }
            out.push_point(k, points.point(k, i))?;
        }
    }

    info!(
        "Removed {} of {} points ({} trajectories, rate {}%)",
        removed,
        points.total_points(),
        spans.len(),
        params.rate
    );
    Ok(CrippledScene {
        points: out,
        removed,
    })
}
