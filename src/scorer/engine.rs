use super::{Characteristics, NfaModel};
use crate::error::{AstreError, AstreResult};
use crate::trajectory::{Step, Trajectory};

/// log10(NFA) of a trajectory ending at frame `kl` with worst criterion `a`,
/// span `l`, `s` real detections grouped in `j` runs.
pub fn log_nfa(m: &NfaModel, kl: usize, a: f32, l: usize, s: usize, j: usize) -> f64 {
    let k0 = kl + 1 - l;
    let big_k = m.n_frames;
    let log_a = (a as f64).log10();

    if m.adjacency_only {
        let lnprod = m.log_nprod[m.nprod_idx(k0, l, l)];
        return m.log_k[big_k] + m.log_k[big_k - l + 1] + lnprod + accel_term(l, log_a);
    }

    let common = m.log_n_frames + m.log_k[l] + m.log_k[big_k - l + 1] + accel_term(s, log_a);
    if j > 1 {
        let gaps = (j - 1) as f64;
        // Worst case: missing frames spread evenly over the gaps
        let h = (l - s) as f64 / gaps;
        let lnprod = m.log_nprod[m.nprod_idx(k0, l, s)];
        common + m.log_cnk[m.cnk_idx(l, s)] + lnprod + gaps * ((h + 1.0) * (h + 1.0)).log10()
    } else {
        common + m.log_nprod[m.nprod_idx(k0, l, l)]
    }
}

/// `(n - 2) * log10(a)`; two points carry no acceleration sample.
#[inline(always)]
fn accel_term(n: usize, log_a: f64) -> f64 {
    if n > 2 {
        (n - 2) as f64 * log_a
    } else {
        0.0
    }
}

/// Recomputes shape and NFA of a materialized trajectory.
/// Interpolated steps count as holes.
pub fn compute_characteristics(m: &NfaModel, traj: &Trajectory) -> AstreResult<Characteristics> {
    let len = traj.len();
    if len < 2 || !traj.steps[0].is_real() || !traj.steps[len - 1].is_real() {
        return Err(AstreError::Validation(format!(
            "trajectory '{}' must start and end on a point and span at least 2 frames",
            traj.descriptor().trim()
        )));
    }
    let kl = traj.start + len - 1;
    if kl >= m.n_frames || len > m.n_frames {
        return Err(AstreError::Validation(format!(
            "trajectory '{}' ends at frame {} but there are {} frames",
            traj.descriptor().trim(),
            kl,
            m.n_frames
        )));
    }

    let reals: Vec<(usize, usize)> = traj.real_points().collect();
    for &(k, i) in &reals {
        if i >= m.n_points(k) {
            return Err(AstreError::Validation(format!(
                "frame {} has no point {}",
                k, i
            )));
        }
    }

    let mut delta = 0.0f32;
    let mut size = 2;
    let mut runs = 1;
    for i in (1..reals.len()).rev() {
        let (k, x) = reals[i];
        let (p, y) = reals[i - 1];
        if i >= 2 {
            let (q, z) = reals[i - 2];
            size += 1;
            delta = delta.max(m.criterion(k, x, p, y, q, z));
        }
        if k - p > 1 {
            runs += 1;
        }
    }

    if m.adjacency_only && traj.steps.iter().any(|s| !matches!(s, Step::Real(_))) {
        return Err(AstreError::Validation(format!(
            "trajectory '{}' has holes but holes are disabled",
            traj.descriptor().trim()
        )));
    }

    Ok(Characteristics {
        log_nfa: log_nfa(m, kl, delta, len, size, runs),
        start: traj.start,
        delta,
        len,
        size,
        runs,
    })
}
