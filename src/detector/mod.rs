pub mod bounds;
pub mod extract;
pub mod fill;
pub mod runner;

pub use self::bounds::{Bounds, Cell, GTable, INFTY};
pub use self::extract::{ExtractOutcome, RoundOutcome, RoundReport};
pub use self::runner::{DetectionOptions, DetectionResult, Detector, ProgressCallback, Silent};

use crate::error::{AstreError, AstreResult};
use crate::points::{format_g, PointsFile};
use crate::scorer::{Characteristics, NfaModel};
use crate::trajectory::{Trajectory, TrajectoryStore};
use tracing::debug;

/// Points not yet consumed by a committed trajectory.
#[derive(Debug, Clone)]
pub struct ActivationMask {
    frames: Vec<Vec<bool>>,
}

impl ActivationMask {
    pub fn new(counts: &[usize]) -> Self {
        Self {
            frames: counts.iter().map(|&n| vec![true; n]).collect(),
        }
    }

    #[inline(always)]
    pub fn is_active(&self, k: usize, i: usize) -> bool {
        self.frames[k][i]
    }

    pub fn active_count(&self) -> usize {
        self.frames.iter().flatten().filter(|a| **a).count()
    }

    fn deactivate(&mut self, k: usize, i: usize) {
        self.frames[k][i] = false;
    }
}

/// State of one detection run over a point sequence.
pub struct Session {
    input: PointsFile,
    model: NfaModel,
    bounds: Bounds,
    max_log_nfa: f64,
    active: ActivationMask,
    table: Option<GTable>,
    /// Points were consumed since the last fill.
    stale: bool,
    store: TrajectoryStore,
}

impl Session {
    pub fn new(input: PointsFile, options: &DetectionOptions) -> AstreResult<Self> {
        let n_frames = input.n_frames();
        if n_frames < 3 {
            return Err(AstreError::Validation(format!(
                "at least 3 frames are needed, found {}",
                n_frames
            )));
        }

        let bounds = Bounds::new(n_frames, options.max_len, options.max_hole);
        let model = NfaModel::new(&input, options.auto_crop, bounds.adjacency_only())?;
        let counts: Vec<usize> = (0..n_frames).map(|k| input.n_points(k)).collect();
        debug!(
            "Session: K={} N={} max_len={} max_hole={}",
            n_frames,
            input.max_points(),
            bounds.max_len,
            bounds.max_hole
        );

        Ok(Self {
            active: ActivationMask::new(&counts),
            input,
            model,
            bounds,
            max_log_nfa: options.max_log_nfa,
            table: None,
            stale: false,
            store: TrajectoryStore::new(),
        })
    }

    pub fn input(&self) -> &PointsFile {
        &self.input
    }

    pub fn model(&self) -> &NfaModel {
        &self.model
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn active(&self) -> &ActivationMask {
        &self.active
    }

    pub fn store(&self) -> &TrajectoryStore {
        &self.store
    }

    pub fn table(&self) -> Option<&GTable> {
        self.table.as_ref()
    }

    /// Rebuilds the G-table from the currently active points.
    pub fn fill(&mut self) {
        let bounds = self.bounds;
        let model = &self.model;
        let table = self.table.get_or_insert_with(|| {
            let counts: Vec<usize> = (0..bounds.n_frames).map(|k| model.n_points(k)).collect();
            let table = GTable::new(bounds, &counts);
            debug!("G-table allocated: {} cells", table.len());
            table
        });
        fill::fill(table, &self.model, &self.active);
        self.stale = false;
    }

    /// True when points were consumed after the table was last filled.
    pub fn is_stale(&self) -> bool {
        self.stale
    }

    /// Appends a trajectory and consumes its points.
    pub fn commit(&mut self, traj: Trajectory) -> AstreResult<usize> {
        for (k, i) in traj.real_points() {
            let known = k < self.input.n_frames() && i < self.input.n_points(k);
            if !known || !self.active.is_active(k, i) {
                return Err(AstreError::Consistency(format!(
                    "point {} of frame {} is claimed twice or does not exist",
                    i, k
                )));
            }
        }
        for (k, i) in traj.real_points() {
            self.active.deactivate(k, i);
        }
        self.stale = true;
        Ok(self.store.push(traj))
    }

    /// Re-registers the trajectories tagged in the last field of `previous`.
    /// Returns how many were restored.
    pub fn restore(&mut self, previous: &PointsFile) -> AstreResult<usize> {
        if previous.uid != self.input.uid {
            return Err(AstreError::Validation(format!(
                "restart file uid {} does not match input uid {}",
                previous.uid, self.input.uid
            )));
        }
        if previous.n_fields() < 3 {
            return Err(AstreError::Validation(
                "restart file needs a trajectory field after x and y".into(),
            ));
        }
        let same_points = previous.n_frames() == self.input.n_frames()
            && (0..self.input.n_frames()).all(|k| previous.n_points(k) == self.input.n_points(k));
        if !same_points {
            return Err(AstreError::Validation(
                "restart file does not hold the same points as the input".into(),
            ));
        }

        let trajectories = previous.extract_trajectories(previous.n_fields() - 1)?;
        let count = trajectories.len();
        for mut traj in trajectories {
            let log_nfa = self.model.characteristics(&traj)?.log_nfa;
            traj.payload = format_g(log_nfa);
            self.commit(traj)?;
        }
        debug!("Restored {} trajectories", count);
        Ok(count)
    }

    pub fn characteristics(&self) -> AstreResult<Vec<Characteristics>> {
        self.store
            .iter()
            .map(|t| self.model.characteristics(t))
            .collect()
    }

    /// The input points with the trajectory column and NFA headers.
    pub fn annotated_output(&self) -> AstreResult<PointsFile> {
        self.input.with_trajectory_column(&self.store)
    }

    pub fn into_parts(self) -> (PointsFile, TrajectoryStore) {
        (self.input, self.store)
    }
}
