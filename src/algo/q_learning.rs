use log::{info, warn};
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::{
    checkpoint::CheckpointStore,
    error::{Error, Result},
    exploration::{Choice, Exploration, ExplorationConfig, ExplorationContext, Policy},
    grid::{Grid, Position, StateIndex},
    metrics::{EpisodeMetrics, Record},
    util::check_interval,
};

use super::{Exp, QTable};

/// Configuration for the [`QLearningAgent`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// α, in `(0, 1]`
    pub learning_rate: f64,
    /// γ, in `[0, 1]`
    pub discount_factor: f64,
    pub exploration: ExplorationConfig,
    pub grid: Grid,
    /// When set, a terminal step with negative reward multiplies the whole action row of the
    /// state it was taken from by this factor after the regular update. This wipes out what was
    /// learned about the other actions in that state as well.
    pub failure_decay: Option<f64>,
    /// Seed for the exploration RNG; entropy-seeded when `None`
    pub seed: Option<u64>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            learning_rate: 0.3,
            discount_factor: 0.95,
            exploration: ExplorationConfig::default(),
            grid: Grid::default(),
            failure_decay: None,
            seed: None,
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(Error::InvalidConfig(format!(
                "`learning_rate` is {}, must be in the interval (0, 1]",
                self.learning_rate
            )));
        }
        check_interval("discount_factor", self.discount_factor, 0.0, 1.0)?;
        if let Some(factor) = self.failure_decay {
            check_interval("failure_decay", factor, 0.0, 1.0)?;
        }
        self.grid.validate()?;
        self.exploration.validate()
    }
}

/// Tabular Q-learning agent over a discretized player position
///
/// Owns the Q-table, the exploration policy and the episode metrics. The table has one row per
/// [`Grid`] cell and is fixed in size for the lifetime of the agent.
#[derive(Debug, Clone)]
pub struct QLearningAgent {
    table: QTable,
    grid: Grid,
    policy: Policy,
    alpha: f64,
    gamma: f64,
    failure_decay: Option<f64>,
    metrics: EpisodeMetrics,
    rng: StdRng,
}

impl QLearningAgent {
    /// Initialize a fresh agent with a zeroed table for `action_count` actions
    pub fn new(config: &AgentConfig, action_count: usize) -> Result<Self> {
        config.validate()?;
        if action_count == 0 {
            return Err(Error::InvalidConfig("the action set is empty".into()));
        }
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            table: QTable::new(config.grid.state_count(), action_count),
            grid: config.grid.clone(),
            policy: Policy::from_config(&config.exploration)?,
            alpha: config.learning_rate,
            gamma: config.discount_factor,
            failure_decay: config.failure_decay,
            metrics: EpisodeMetrics::new(),
            rng,
        })
    }

    /// Like [`QLearningAgent::new`], then restore `slot` from `store` if it holds a usable
    /// checkpoint
    pub fn restore_or_new(
        config: &AgentConfig,
        action_count: usize,
        store: &CheckpointStore,
        slot: &str,
    ) -> Result<Self> {
        let mut agent = Self::new(config, action_count)?;
        agent.load(store, slot);
        Ok(agent)
    }

    pub fn discretize(&self, pos: Position) -> StateIndex {
        self.grid.discretize(pos)
    }

    /// Random-action probability the policy would use at `pos`
    pub fn exploration_rate(&self, pos: Position, recent_avg_x: f64) -> f64 {
        self.policy.rate(&ExplorationContext {
            x: pos.x,
            recent_avg_x,
        })
    }

    /// Pick an action for the player at `pos`
    ///
    /// `recent_avg_x` is the mean final x of the last few episodes, used by the position scaled
    /// policy to explore less in parts of the level that were already cleared.
    pub fn choose_action(&mut self, pos: Position, recent_avg_x: f64) -> usize {
        let ctx = ExplorationContext {
            x: pos.x,
            recent_avg_x,
        };
        match self.policy.choose(&mut self.rng, &ctx) {
            Choice::Explore => self.rng.gen_range(0..self.table.action_count()),
            Choice::Exploit => self.table.best_action(self.discretize(pos)),
        }
    }

    /// Learn from a single step
    pub fn learn(&mut self, exp: &Exp) {
        let state = self.discretize(exp.state);
        let next_state = self.discretize(exp.next_state);
        self.update(state, exp.action, exp.reward, next_state, exp.done);
        if exp.done {
            self.policy.on_terminal();
        }
    }

    /// Temporal difference update of `Q[state][action]`
    ///
    /// The bootstrap term is dropped on terminal steps. Rewards must be finite.
    pub fn update(
        &mut self,
        state: StateIndex,
        action: usize,
        reward: f64,
        next_state: StateIndex,
        done: bool,
    ) {
        let next_max = if done {
            0.0
        } else {
            self.table.best_value(next_state)
        };
        let target = reward + self.gamma * next_max;
        let q_value = self.table.get(state, action);
        self.table
            .set(state, action, (1.0 - self.alpha) * q_value + self.alpha * target);

        if let Some(factor) = self.failure_decay {
            if done && reward < 0.0 {
                self.table.scale_row(state, factor);
            }
        }
    }

    /// Append an episode's total reward to the metrics
    ///
    /// Does not persist anything; when this returns [`Record::NewBest`] the caller is expected to
    /// [`save`](QLearningAgent::save) to its best slot.
    pub fn record_episode(&mut self, total_reward: f64) -> Record {
        self.metrics.record(total_reward)
    }

    /// Persist the table and metrics under `slot`
    pub fn save(&self, store: &CheckpointStore, slot: &str) -> Result<()> {
        store.save(slot, &self.table, &self.metrics)?;
        info!(
            "Saved agent to slot `{slot}` ({} episodes, best reward {})",
            self.metrics.episodes(),
            self.metrics.best_reward()
        );
        Ok(())
    }

    /// Restore the table and metrics from `slot`
    ///
    /// The exploration policy resumes as if it had seen one terminal step per recorded episode.
    ///
    /// **Returns** `false`, leaving the agent untouched, if the slot is missing, unreadable or
    /// was saved for a different table shape
    pub fn load(&mut self, store: &CheckpointStore, slot: &str) -> bool {
        let checkpoint = match store.load(slot) {
            Ok(checkpoint) => checkpoint,
            Err(Error::MissingCheckpoint { .. }) => {
                warn!(
                    "No saved agent in slot `{slot}` under {}",
                    store.root().display()
                );
                return false;
            }
            Err(e) => {
                warn!("Ignoring saved agent: {e}");
                return false;
            }
        };

        let (states, actions) = (checkpoint.table.state_count(), checkpoint.table.action_count());
        if states != self.table.state_count() || actions != self.table.action_count() {
            warn!(
                "Ignoring saved agent in slot `{slot}`: table is {states}x{actions}, expected {}x{}",
                self.table.state_count(),
                self.table.action_count()
            );
            return false;
        }

        self.table = checkpoint.table;
        self.metrics = checkpoint.metrics;
        let episodes = u32::try_from(self.metrics.episodes()).unwrap_or(u32::MAX);
        self.policy.resume(episodes);
        true
    }

    pub fn q_table(&self) -> &QTable {
        &self.table
    }

    #[cfg(test)]
    pub(crate) fn q_table_mut(&mut self) -> &mut QTable {
        &mut self.table
    }

    pub fn metrics(&self) -> &EpisodeMetrics {
        &self.metrics
    }

    pub fn grid(&self) -> &Grid {
        &self.grid
    }

    pub fn action_count(&self) -> usize {
        self.table.action_count()
    }
}
