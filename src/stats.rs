use crate::error::{AstreError, AstreResult};
use crate::points::PointsFile;
use crate::trajectory::Trajectory;
use serde::Serialize;
use std::collections::HashMap;

/// Link-level agreement between ground truth and detections.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkStats {
    pub real_links: usize,
    pub found_links: usize,
    pub correct_links: usize,
    pub real_trajectories: usize,
    pub found_trajectories: usize,
    pub recall: Option<f64>,
    pub precision: Option<f64>,
}

/// Consecutive real detections `((frame, point), (frame, point))` of a trajectory.
fn links(traj: &Trajectory) -> impl Iterator<Item = ((usize, usize), (usize, usize))> + '_ {
    let reals: Vec<(usize, usize)> = traj.real_points().collect();
    (1..reals.len()).map(move |i| (reals[i - 1], reals[i]))
}

/// Compares the trajectory field `real_field` of `real` with the field
/// `found_field` of `found`. Fields count from `x` (0); negative values count
/// from the last field. Both files must hold the same points.
pub fn link_stats(
    real: &PointsFile,
    real_field: i64,
    found: &PointsFile,
    found_field: i64,
) -> AstreResult<LinkStats> {
    if real.uid != found.uid {
        return Err(AstreError::Validation(format!(
            "uids do not match ({} vs {})",
            real.uid, found.uid
        )));
    }
    let same_points = real.n_frames() == found.n_frames()
        && (0..real.n_frames()).all(|k| real.n_points(k) == found.n_points(k));
    if !same_points {
        return Err(AstreError::Validation(
            "the two files do not hold the same points".into(),
        ));
    }

    let rf = real.resolve_field(real_field)?;
    let ff = found.resolve_field(found_field)?;
    if rf < 2 || ff < 2 {
        return Err(AstreError::Config(
            "trajectory fields must come after x and y".into(),
        ));
    }

    let real_trajs = real.extract_tagged_trajectories(rf)?;
    let found_trajs = found.extract_trajectories(ff)?;
    let real_ids = real.trajectory_ids(rf)?;
    let by_id: HashMap<i64, &Trajectory> = real_trajs.iter().map(|(id, t)| (*id, t)).collect();

    let real_links: usize = real_trajs.iter().map(|(_, t)| t.count_links()).sum();
    let found_links: usize = found_trajs.iter().map(Trajectory::count_links).sum();

    let mut correct_links = 0;
    for traj in &found_trajs {
        for ((s, rs), (e, re)) in links(traj) {
            let id = real_ids[s][rs];
            if id < 0 || id != real_ids[e][re] {
                continue;
            }
            let Some(rt) = by_id.get(&id) else { continue };
            // The true trajectory must not have a detection in between
            let skipped = rt
                .real_points()
                .any(|(frame, _)| frame > s && frame < e);
            if !skipped {
                correct_links += 1;
            }
        }
    }

    let ratio = |num: usize, den: usize| (den > 0).then(|| num as f64 / den as f64);
    Ok(LinkStats {
        real_links,
        found_links,
        correct_links,
        real_trajectories: real_trajs.len(),
        found_trajectories: found_trajs.len(),
        recall: ratio(correct_links, real_links),
        precision: ratio(correct_links, found_links),
    })
}
