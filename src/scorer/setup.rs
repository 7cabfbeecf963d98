use super::physics::{image_areas, DiscreteArea};
use super::NfaModel;
use crate::error::{AstreError, AstreResult};
use crate::points::PointsFile;
use tracing::debug;

/// `log10(k)` for `k` in `0..=n`, with `-1` standing in for `log10(0)`.
pub fn log_k_table(n: usize) -> Vec<f64> {
    (0..=n)
        .map(|k| if k == 0 { -1.0 } else { (k as f64).log10() })
        .collect()
}

/// `log10(k!)` as a running sum of `log_k`.
pub fn log_kfact_table(log_k: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; log_k.len()];
    for k in 2..log_k.len() {
        out[k] = out[k - 1] + log_k[k];
    }
    out
}

/// `log10(C(n, k))` for `0 <= k <= n <= N`, flat with stride `N + 1`.
/// Cells with `k > n` hold `-1`.
pub fn log_cnk_table(log_kfact: &[f64]) -> Vec<f64> {
    let side = log_kfact.len();
    let mut out = vec![-1.0; side * side];
    for n in 0..side {
        for k in 0..=n / 2 {
            out[n * side + k] = log_kfact[n] - log_kfact[n - k] - log_kfact[k];
        }
        for k in 0..(n + 1) / 2 {
            out[n * side + (n - k)] = out[n * side + k];
        }
    }
    out
}

/// Upper bound of `log10(N_i1 * ... * N_is)` over the frames `k = i1 < ... < is = k+l-1`.
///
/// Returns the flat table and the per-`k` offsets; within frame `k` the cell
/// `(l, s)` lives at `l * (l + 1) / 2 + s`. `-1` marks windows that cannot
/// hold a trajectory (an empty end frame, `s < 2`, or not enough non-empty frames).
pub fn log_nprod_table(counts: &[usize]) -> (Vec<f64>, Vec<usize>) {
    let n_frames = counts.len();
    let mut offsets = Vec::with_capacity(n_frames);
    let mut table = Vec::new();
    let mut sorted: Vec<usize> = Vec::with_capacity(n_frames);

    for k in 0..n_frames {
        offsets.push(table.len());
        for l in 0..=(n_frames - k) {
            let mut lnprod = -1.0;
            if l >= 2 {
                let (first, last) = (counts[k], counts[k + l - 1]);
                if first > 0 && last > 0 {
                    lnprod = (first as f64).log10() + (last as f64).log10();
                }
                sorted.clear();
                sorted.extend_from_slice(&counts[k + 1..k + l - 1]);
                sorted.sort_unstable_by(|a, b| b.cmp(a));
            }

            for s in 0..=l {
                if s < 2 {
                    table.push(-1.0);
                    continue;
                }
                if lnprod >= -0.5 && s >= 3 {
                    match sorted[s - 3] {
                        0 => lnprod = -1.0,
                        n => lnprod += (n as f64).log10(),
                    }
                }
                table.push(lnprod);
            }
        }
    }

    (table, offsets)
}

pub fn build_model(
    points: &PointsFile,
    auto_crop: bool,
    adjacency_only: bool,
) -> AstreResult<NfaModel> {
    let n_frames = points.n_frames();

    // Header values are untrusted, so the product is taken in f64
    let area = points.width as f64 * points.height as f64;
    if !auto_crop && area <= 0.0 {
        return Err(AstreError::Validation(format!(
            "image area {}x{} must be positive (or use auto-crop)",
            points.width, points.height
        )));
    }

    // 1. Coordinates, narrowed once for the criterion
    let coords: Vec<Vec<[f32; 2]>> = (0..n_frames)
        .map(|k| {
            (0..points.n_points(k))
                .map(|i| {
                    let (x, y) = points.xy(k, i);
                    [x as f32, y as f32]
                })
                .collect()
        })
        .collect();
    let counts: Vec<usize> = coords.iter().map(Vec::len).collect();

    // 2. Combinatorics
    let log_k = log_k_table(n_frames);
    let log_kfact = log_kfact_table(&log_k);
    let log_cnk = log_cnk_table(&log_kfact);
    let (log_nprod, nprod_offsets) = log_nprod_table(&counts);
    debug!(
        "Combinatorics ready: K={} cnk={} nprod={}",
        n_frames,
        log_cnk.len(),
        log_nprod.len()
    );

    // 3. Normalization
    let image_area = image_areas(&coords, points.width, points.height, auto_crop);
    let disc = DiscreteArea::default();

    Ok(NfaModel {
        n_frames,
        adjacency_only,
        log_n_frames: log_k.get(n_frames).copied().unwrap_or(-1.0),
        log_k,
        log_kfact,
        log_cnk,
        log_nprod,
        nprod_offsets,
        image_area,
        disc,
        coords,
    })
}
