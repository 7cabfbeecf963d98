pub mod engine;
pub mod physics;
pub mod setup;
pub mod types;

pub use self::physics::DiscreteArea;
pub use self::types::Characteristics;
use crate::error::AstreResult;
use crate::points::PointsFile;
use crate::trajectory::Trajectory;

/// Read-only tables shared by the fill, the extraction and the NFA checks.
pub struct NfaModel {
    pub n_frames: usize,
    /// Holes disabled: the NFA counts every frame of the span as a detection.
    pub adjacency_only: bool,

    // --- Combinatorics (log10) ---
    pub log_n_frames: f64,
    pub log_k: Vec<f64>,
    pub log_kfact: Vec<f64>,
    pub log_cnk: Vec<f64>,
    pub log_nprod: Vec<f64>,
    pub nprod_offsets: Vec<usize>,

    // --- Criterion ---
    pub image_area: Vec<f64>,
    pub disc: DiscreteArea,
    pub coords: Vec<Vec<[f32; 2]>>,
}

impl NfaModel {
    pub fn new(points: &PointsFile, auto_crop: bool, adjacency_only: bool) -> AstreResult<Self> {
        setup::build_model(points, auto_crop, adjacency_only)
    }

    #[inline(always)]
    pub fn cnk_idx(&self, n: usize, k: usize) -> usize {
        n * (self.n_frames + 1) + k
    }

    #[inline(always)]
    pub fn nprod_idx(&self, k: usize, l: usize, s: usize) -> usize {
        self.nprod_offsets[k] + l * (l + 1) / 2 + s
    }

    pub fn n_points(&self, k: usize) -> usize {
        self.coords[k].len()
    }

    /// Criterion of point `x` of frame `k` preceded by `y` of frame `p` and `z` of frame `q`.
    #[inline(always)]
    pub fn criterion(&self, k: usize, x: usize, p: usize, y: usize, q: usize, z: usize) -> f32 {
        physics::criterion(
            &self.disc,
            self.coords[k][x],
            self.coords[p][y],
            self.coords[q][z],
            k - p - 1,
            p - q - 1,
            self.image_area[q],
        )
    }

    pub fn log_nfa(&self, kl: usize, a: f32, l: usize, s: usize, j: usize) -> f64 {
        engine::log_nfa(self, kl, a, l, s, j)
    }

    pub fn characteristics(&self, traj: &Trajectory) -> AstreResult<Characteristics> {
        engine::compute_characteristics(self, traj)
    }
}
