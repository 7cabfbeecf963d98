use super::bounds::{is_unreachable, Bounds, FrameLayout, GTable, INFTY};
use super::ActivationMask;
use crate::scorer::NfaModel;
use rayon::prelude::*;
use tracing::debug;

/// Where each predecessor shape of `(p, h2)` lands in the `(k, h)` shape block.
/// `None` when the extended trajectory would exceed the span bound of `k`.
fn transition_targets(bounds: &Bounds, layouts: &[FrameLayout], k: usize) -> Vec<Vec<Vec<Option<usize>>>> {
    layouts[k]
        .holes
        .iter()
        .enumerate()
        .map(|(h, hole)| {
            let p = hole.p;
            bounds
                .holes(p)
                .map(|h2| {
                    layouts[p].holes[h2]
                        .shape
                        .shapes
                        .iter()
                        .map(|&(lp, sp, jp)| {
                            let (l, s, j) = (lp + h + 1, sp + 1, jp + usize::from(h > 0));
                            bounds
                                .contains(k, h, l, s, j)
                                .then(|| hole.shape.offset(l, s, j))
                        })
                        .collect()
                })
                .collect()
        })
        .collect()
}

/// Rebuilds every cell of the table from the active points.
///
/// Frames are processed in increasing order; within a frame the blocks of
/// different end points are independent and filled in parallel.
pub fn fill(table: &mut GTable, model: &NfaModel, active: &ActivationMask) {
    let bounds = table.bounds;
    let layouts: &[FrameLayout] = &table.layouts;
    let cells = &mut table.cells;

    for k in 1..bounds.n_frames {
        let layout = &layouts[k];
        let (done, rest) = cells.split_at_mut(k);
        let done: &[Vec<f32>] = done;
        let current = &mut rest[0];
        if layout.x_stride == 0 {
            continue;
        }
        let targets = transition_targets(&bounds, layouts, k);

        current
            .par_chunks_mut(layout.x_stride)
            .enumerate()
            .for_each(|(x, block)| {
                block.fill(INFTY);
                if !active.is_active(k, x) {
                    return;
                }

                for (h, hole) in layout.holes.iter().enumerate() {
                    let p = hole.p;
                    let cells_per_y = hole.shape.len();
                    if cells_per_y == 0 {
                        continue;
                    }

                    for y in 0..hole.n_y {
                        if !active.is_active(p, y) {
                            continue;
                        }
                        let start = hole.offset + y * cells_per_y;
                        let out = &mut block[start..start + cells_per_y];

                        for h2 in bounds.holes(p) {
                            let q = p - h2 - 1;
                            let prev_layout = &layouts[p];
                            let prev_len = prev_layout.holes[h2].shape.len();
                            let seed_shape = (h + h2 + 3, 3, 1 + usize::from(h > 0) + usize::from(h2 > 0));
                            let seed = bounds
                                .contains(k, h, seed_shape.0, seed_shape.1, seed_shape.2)
                                .then(|| hole.shape.offset(seed_shape.0, seed_shape.1, seed_shape.2));
                            let moves = &targets[h][h2];

                            for z in 0..model.n_points(q) {
                                if !active.is_active(q, z) {
                                    continue;
                                }
                                let crit = model.criterion(k, x, p, y, q, z);

                                // Three points, no history
                                if let Some(o) = seed {
                                    if crit < out[o] {
                                        out[o] = crit;
                                    }
                                }

                                // Extend every reachable history of (y, h2, z)
                                let from = prev_layout.block(y, h2, z);
                                let prev = &done[p][from..from + prev_len];
                                for (value, target) in prev.iter().zip(moves) {
                                    let Some(o) = *target else { continue };
                                    if is_unreachable(*value) {
                                        continue;
                                    }
                                    let updated = crit.max(*value);
                                    if updated < out[o] {
                                        out[o] = updated;
                                    }
                                }
                            }
                        }
                    }
                }
            });
    }

    debug!("G-table filled: {} cells", cells.iter().map(Vec::len).sum::<usize>());
}
