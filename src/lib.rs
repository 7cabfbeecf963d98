pub mod api;
pub mod config;
pub mod cripple;
pub mod detector;
pub mod error;
pub mod generator;
pub mod points;
pub mod scorer;
pub mod stats;
pub mod trajectory;
// cmd and reports are modules of the binary crate (main).
