use serde::Serialize;

/// Shape and quality of one materialized trajectory.
#[derive(Debug, Default, Clone, Copy, PartialEq, Serialize)]
pub struct Characteristics {
    pub log_nfa: f64,
    pub start: usize,
    /// Worst criterion along the trajectory.
    pub delta: f32,
    /// Span in frames.
    pub len: usize,
    /// Frames holding a real detection.
    pub size: usize,
    /// Blocks of consecutive real detections.
    pub runs: usize,
}
