pub mod cripple;
pub mod detect;
pub mod generate;
pub mod info;
pub mod stats;
