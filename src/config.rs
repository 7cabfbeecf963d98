use crate::error::{AstreError, AstreResult};
use clap::Args;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Args, Debug, Clone, Default)]
pub struct Config {
    #[command(flatten)]
    pub detection: DetectionParams,
    #[command(flatten)]
    pub run: RunParams,
}

#[derive(Args, Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    // === ACCEPTANCE ===
    /// Maximal log10(NFA) for a trajectory to be reported
    #[arg(short = 'e', long = "epsilon", default_value_t = 0.0, allow_negative_numbers = true)]
    pub max_log_nfa: f64,

    // === SHAPE ===
    /// Maximal trajectory length in frames (0: number of frames)
    #[arg(long, default_value_t = 0)]
    pub max_len: usize,

    /// Maximal hole length (negative: number of frames - 3, 0: no holes)
    #[arg(short = 'H', long = "max-hole-length", default_value_t = -1, allow_negative_numbers = true)]
    pub max_hole: i64,

    // === NORMALIZATION ===
    /// Use the bounding box of each frame's points as image area
    #[arg(long, default_value_t = false)]
    pub auto_crop: bool,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            max_log_nfa: 0.0,
            max_len: 0,
            max_hole: -1,
            auto_crop: false,
        }
    }
}

impl DetectionParams {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> AstreResult<Self> {
        let content = fs::read_to_string(&path).map_err(|e| {
            AstreError::Config(format!(
                "Failed to read parameters file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;
        let params: Self = serde_json::from_str(&content)?;
        Ok(params)
    }
}

#[derive(Args, Debug, Clone, Default)]
pub struct RunParams {
    /// Restart from the trajectories of a previous (partial) result
    #[arg(short, long)]
    pub restart: Option<PathBuf>,

    /// Save the trajectories found so far after every round
    #[arg(short, long)]
    pub save_partial: Option<PathBuf>,

    /// Only compute the NFA of the trajectories already tagged in the input
    #[arg(long = "tag-nfa", default_value_t = false)]
    pub tag_nfa: bool,
}
