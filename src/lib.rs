/// Tabular Q-learning
pub mod algo;

/// Durable agent checkpoints
pub mod checkpoint;

/// Session configuration
pub mod config;

/// Implementations of strategies for time-decaying hyperparameters
pub mod decay;

/// Data structures
pub mod ds;

/// Environment
pub mod env;

/// Error types
pub mod error;

/// Exploration policies
pub mod exploration;

/// Discretization of player positions
pub mod grid;

/// Built-in level environment
pub mod gym;

/// Episode reward bookkeeping
pub mod metrics;

/// Training loop
pub mod train;

mod util;

pub use error::{Error, Result};
