pub mod config;
pub mod error;
pub mod rule;

pub use config::WorkerConfig;
pub use error::*;
pub use rule::*;
