use thiserror::Error;

#[derive(Error, Debug)]
pub enum AstreError {
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV Writing Error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON Parsing Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Malformed PointsFile: {0}")]
    Format(String),

    #[error("Invalid Trajectory Descriptor: {0}")]
    Descriptor(String),

    #[error("Data Validation Error: {0}")]
    Validation(String),

    /// Internal invariant broken; the run cannot continue.
    #[error("Consistency Violation: {0}")]
    Consistency(String),
}

pub type AstreResult<T> = Result<T, AstreError>;
