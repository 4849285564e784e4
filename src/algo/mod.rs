use crate::grid::Position;

mod q_learning;
mod q_table;

pub use q_learning::{AgentConfig, QLearningAgent};
pub use q_table::QTable;

/// Represents a single step of experience
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Exp {
    /// Player position before taking the action
    pub state: Position,
    /// The action taken at `state`
    pub action: usize,
    /// The (shaped) reward received for the action
    pub reward: f64,
    /// Player position after the action
    pub next_state: Position,
    /// Whether the step ended the episode
    pub done: bool,
}
