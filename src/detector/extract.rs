use super::bounds::{is_unreachable, Cell, GTable, INFTY};
use super::{ActivationMask, Session};
use crate::error::{AstreError, AstreResult};
use crate::points::format_g;
use crate::scorer::NfaModel;
use crate::trajectory::{Step, Trajectory};
use rayon::prelude::*;
use tracing::{debug, info, warn};

/// Initial tolerance around the minimal log-NFA when matching candidates.
pub const LOG_NFA_COMP_EPS: f64 = 1e-5;

/// Widening the tolerance up to this value means the table is inconsistent.
pub const PREC_CAP: f64 = 1e-2;

/// Slack on the running criterion while walking back.
pub const TRACE_SLACK: f32 = 1.0;

/// Accepted gap between the table's log-NFA and the recomputed one.
pub const RECOMPUTE_TOLERANCE: f64 = 1e-2;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BreakReason {
    /// No active predecessor reproduces the running criterion.
    MissingPredecessor { frame: usize },
    /// The materialized trajectory does not have the expected log-NFA.
    NfaMismatch { table: f64, recomputed: f64 },
}

/// Result of one back-trace.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TraceOutcome {
    Committed(usize),
    Broken(BreakReason),
}

/// Result of one scanning pass at the current minimal log-NFA.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractOutcome {
    /// Every candidate was committed; the number of trajectories added.
    Committed(usize),
    /// At least one candidate depended on a consumed point; the table is stale.
    Broken { committed: usize, broken: usize },
    /// No cell matched the minimum within the tolerance.
    NoneFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Points were consumed: fill again and keep extracting.
    Recompute,
    /// Nothing left under the threshold.
    Done,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RoundReport {
    pub round: usize,
    /// Minimal log-NFA of the first scan, `None` when nothing is reachable.
    pub min_log_nfa: Option<f64>,
    pub committed: usize,
    pub broken: usize,
    pub stalls: usize,
    pub outcome: RoundOutcome,
}

enum TraceState {
    Walking,
    Finished,
    Broken(BreakReason),
}

/// Iterative walk from a DP cell back to the first point of its trajectory.
///
/// Steps are gathered newest first and reversed once the walk ends.
pub struct BackTrace {
    cell: Cell,
    target: f32,
    end_frame: usize,
    steps: Vec<Step>,
}

impl BackTrace {
    pub fn new(cell: Cell, target: f32) -> Self {
        Self {
            cell,
            target,
            end_frame: cell.k,
            steps: Vec::with_capacity(cell.l),
        }
    }

    fn push_point(&mut self, x: usize, holes: usize) {
        self.steps.push(Step::Real(x));
        self.steps.extend(std::iter::repeat(Step::Absent).take(holes));
    }

    fn step(&mut self, table: &GTable, model: &NfaModel, active: &ActivationMask) -> AstreResult<TraceState> {
        let c = self.cell;
        let p = c.p();
        if !active.is_active(c.k, c.x) || !active.is_active(p, c.y) {
            return Err(AstreError::Consistency(format!(
                "back-trace reached inactive points ({}, {}) / ({}, {})",
                c.k, c.x, p, c.y
            )));
        }

        if c.l == c.h + 2 {
            self.push_point(c.x, c.h);
            self.steps.push(Step::Real(c.y));
            return Ok(TraceState::Finished);
        }

        let bounds = &table.bounds;
        let l_prev = c.l - c.h - 1;
        let s_prev = c.s - 1;
        let j_prev = c.j - usize::from(c.h > 0);
        let has_prev = c.s > 3;

        let mut min_crit = INFTY;
        let mut best: Option<(usize, usize)> = None;

        for h2 in bounds.holes(p) {
            // Only the predecessor shapes the fill could have produced
            let shape_ok = if has_prev {
                bounds.contains(p, h2, l_prev, s_prev, j_prev)
            } else {
                l_prev == h2 + 2 && j_prev == 1 + usize::from(h2 > 0)
            };
            if !shape_ok {
                continue;
            }

            let q = p - h2 - 1;
            for z in 0..model.n_points(q) {
                if !active.is_active(q, z) {
                    continue;
                }
                let prev = if has_prev {
                    let v = table.get(&Cell {
                        k: p,
                        x: c.y,
                        h: h2,
                        y: z,
                        l: l_prev,
                        s: s_prev,
                        j: j_prev,
                    });
                    if v >= min_crit {
                        continue;
                    }
                    Some(v)
                } else {
                    None
                };

                let crit = model.criterion(c.k, c.x, p, c.y, q, z);
                let updated = prev.map_or(crit, |v| crit.max(v));
                if updated < min_crit {
                    min_crit = updated;
                    best = Some((h2, z));
                }
            }
        }

        match best {
            Some((h2, z)) if !is_unreachable(min_crit) && min_crit <= self.target + TRACE_SLACK => {
                self.push_point(c.x, c.h);
                self.cell = Cell {
                    k: p,
                    x: c.y,
                    h: h2,
                    y: z,
                    l: l_prev,
                    s: s_prev,
                    j: j_prev,
                };
                Ok(TraceState::Walking)
            }
            _ => Ok(TraceState::Broken(BreakReason::MissingPredecessor { frame: p })),
        }
    }

    /// Walks to the first point. The inner error tells why the path no longer exists.
    pub fn run(
        mut self,
        table: &GTable,
        model: &NfaModel,
        active: &ActivationMask,
    ) -> AstreResult<Result<Trajectory, BreakReason>> {
        loop {
            match self.step(table, model, active)? {
                TraceState::Walking => continue,
                TraceState::Finished => break,
                TraceState::Broken(reason) => return Ok(Err(reason)),
            }
        }
        self.steps.reverse();
        let start = self.end_frame + 1 - self.steps.len();
        Ok(Ok(Trajectory::new(start, self.steps)))
    }
}

impl Session {
    /// Smallest log-NFA over the reachable cells between active points.
    pub fn find_minimal_nfa(&self) -> f64 {
        let Some(table) = self.table.as_ref() else {
            return INFTY as f64;
        };
        let model = &self.model;
        let active = &self.active;

        (1..table.bounds.n_frames)
            .into_par_iter()
            .map(|k| {
                let mut best = INFTY as f64;
                let layout = &table.layouts[k];
                for x in 0..layout.n_x {
                    if !active.is_active(k, x) {
                        continue;
                    }
                    for (h, hole) in layout.holes.iter().enumerate() {
                        for y in 0..hole.n_y {
                            if !active.is_active(hole.p, y) {
                                continue;
                            }
                            let (values, shape) = table.block(k, x, h, y);
                            for (&v, &(l, s, j)) in values.iter().zip(&shape.shapes) {
                                if is_unreachable(v) {
                                    continue;
                                }
                                best = best.min(model.log_nfa(k, v, l, s, j));
                            }
                        }
                    }
                }
                best
            })
            .reduce(|| INFTY as f64, f64::min)
    }

    /// Back-traces one candidate and commits it when it still holds.
    fn extract_candidate(&mut self, cell: Cell, value: f32, log_nfa: f64) -> AstreResult<TraceOutcome> {
        let Some(table) = self.table.as_ref() else {
            return Err(AstreError::Consistency("extraction before the first fill".into()));
        };

        let mut traj = match BackTrace::new(cell, value).run(table, &self.model, &self.active)? {
            Ok(t) => t,
            Err(reason) => return Ok(TraceOutcome::Broken(reason)),
        };

        let recomputed = self.model.characteristics(&traj)?.log_nfa;
        if (recomputed - log_nfa).abs() > RECOMPUTE_TOLERANCE {
            return Ok(TraceOutcome::Broken(BreakReason::NfaMismatch {
                table: log_nfa,
                recomputed,
            }));
        }

        traj.payload = format_g(recomputed);
        let id = self.commit(traj)?;
        Ok(TraceOutcome::Committed(id))
    }

    /// One scanning pass: extracts every cell within `prec` of `min`, in
    /// frame, end point, hole, predecessor, then shape order.
    fn scan_level(&mut self, min: f64, prec: f64) -> AstreResult<ExtractOutcome> {
        let bounds = self.bounds;
        let mut committed = 0;
        let mut broken = 0;

        for k in 1..bounds.n_frames {
            'next_x: for x in 0..self.model.n_points(k) {
                if !self.active.is_active(k, x) {
                    continue;
                }
                for h in bounds.holes(k) {
                    let p = k - h - 1;
                    for y in 0..self.model.n_points(p) {
                        if !self.active.is_active(p, y) {
                            continue;
                        }
                        let candidates: Vec<(Cell, f32, f64)> = match self.table.as_ref() {
                            Some(table) => {
                                let (values, shape) = table.block(k, x, h, y);
                                values
                                    .iter()
                                    .zip(&shape.shapes)
                                    .filter(|(v, _)| !is_unreachable(**v))
                                    .map(|(&v, &(l, s, j))| {
                                        (Cell { k, x, h, y, l, s, j }, v, self.model.log_nfa(k, v, l, s, j))
                                    })
                                    .filter(|c| c.2 <= min + prec)
                                    .collect()
                            }
                            None => Vec::new(),
                        };

                        for (cell, value, log_nfa) in candidates {
                            match self.extract_candidate(cell, value, log_nfa)? {
                                TraceOutcome::Committed(id) => {
                                    debug!("Committed trajectory {} (log NFA {:.3})", id, log_nfa);
                                    committed += 1;
                                    continue 'next_x;
                                }
                                TraceOutcome::Broken(reason) => {
                                    debug!("Broken candidate {:?}: {:?}", cell, reason);
                                    broken += 1;
                                }
                            }
                        }
                    }
                }
            }
        }

        Ok(match (committed, broken) {
            (0, 0) => ExtractOutcome::NoneFound,
            (n, 0) => ExtractOutcome::Committed(n),
            (committed, broken) => ExtractOutcome::Broken { committed, broken },
        })
    }

    /// Extracts trajectories from the current table until it is exhausted
    /// under the threshold or goes stale.
    pub fn extract_round(&mut self, round: usize) -> AstreResult<RoundReport> {
        let mut prec = LOG_NFA_COMP_EPS;
        let mut report = RoundReport {
            round,
            min_log_nfa: None,
            committed: 0,
            broken: 0,
            stalls: 0,
            outcome: RoundOutcome::Done,
        };

        loop {
            let min = self.find_minimal_nfa();
            if report.min_log_nfa.is_none() && min < INFTY as f64 - 1.0 {
                report.min_log_nfa = Some(min);
            }
            if min > self.max_log_nfa {
                report.outcome = RoundOutcome::Done;
                break;
            }

            match self.scan_level(min, prec)? {
                ExtractOutcome::NoneFound => {
                    prec *= 10.0;
                    report.stalls += 1;
                    warn!("No candidate at log NFA {:.6}; widening tolerance to {:e}", min, prec);
                    if prec >= PREC_CAP {
                        return Err(AstreError::Consistency(format!(
                            "no candidate matches the minimal log NFA {} within {}",
                            min, prec
                        )));
                    }
                }
                ExtractOutcome::Committed(n) => {
                    report.committed += n;
                    prec = LOG_NFA_COMP_EPS;
                }
                ExtractOutcome::Broken { committed, broken } => {
                    report.committed += committed;
                    report.broken += broken;
                    // A fresh table reproduces its own minimum, so a refill
                    // would break the same candidates again.
                    if report.committed == 0 && !self.stale {
                        return Err(AstreError::Consistency(format!(
                            "round {} made no progress: every candidate at log NFA {} broke",
                            round, min
                        )));
                    }
                    report.outcome = RoundOutcome::Recompute;
                    break;
                }
            }
        }

        info!(
            "Round {}: min log NFA {}, {} committed, {} broken",
            round,
            report
                .min_log_nfa
                .map_or_else(|| "-".to_string(), |v| format!("{:.3}", v)),
            report.committed,
            report.broken
        );
        Ok(report)
    }
}
