//! The episode loop: action selection, reward shaping, learning and checkpointing

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    algo::{Exp, QLearningAgent},
    checkpoint::{validate_slot, CheckpointStore},
    ds::RingBuffer,
    env::{Environment, Telemetry, Transition},
    error::{Error, Result},
    grid::Position,
    util::mean,
};

/// Reward shaping applied on top of the environment's own reward
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShapingConfig {
    /// Reward replacing the step reward when a life is lost; the episode ends
    pub death_penalty: f64,
    /// Consecutive no-progress steps after which the episode is cut short
    pub stuck_threshold: u32,
    /// A step whose reward is at or below this counts as no progress
    pub no_progress_threshold: f64,
    /// Reward replacing the step reward when the episode is cut short for being stuck
    pub stuck_penalty: f64,
    /// Added to the reward whenever the player passes the furthest x of the episode
    pub progress_bonus: Option<f64>,
}

impl Default for ShapingConfig {
    fn default() -> Self {
        Self {
            death_penalty: -15.0,
            stuck_threshold: 150,
            no_progress_threshold: 0.0,
            stuck_penalty: -15.0,
            progress_bonus: None,
        }
    }
}

/// What shaping did to a step, if anything notable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapingEvent {
    Died,
    Stuck,
}

/// A step reward after shaping
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shaped {
    pub reward: f64,
    pub done: bool,
    pub event: Option<ShapingEvent>,
}

impl ShapingConfig {
    /// Shape one transition, updating the per-episode counters in `episode`
    ///
    /// Order: death override, progress bonus (not on a death step), then the stagnation check on
    /// the reward produced so far. A stuck cut-off overrides a death penalty on the same step.
    pub fn apply(&self, episode: &mut EpisodeState, transition: &Transition) -> Shaped {
        let info = transition.info;
        let mut reward = transition.reward;
        let mut done = transition.done;
        let mut event = None;

        if info.life < episode.life {
            done = true;
            reward = self.death_penalty;
            event = Some(ShapingEvent::Died);
        }
        episode.life = info.life;

        if info.x_pos > episode.max_x {
            episode.max_x = info.x_pos;
            if let (Some(bonus), None) = (self.progress_bonus, event) {
                reward += bonus;
            }
        }

        if reward <= self.no_progress_threshold {
            episode.steps_without_progress += 1;
        } else {
            episode.steps_without_progress = 0;
        }
        if episode.steps_without_progress >= self.stuck_threshold {
            done = true;
            reward = self.stuck_penalty;
            event = Some(ShapingEvent::Stuck);
            episode.steps_without_progress = 0;
        }

        Shaped {
            reward,
            done,
            event,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.stuck_threshold == 0 {
            return Err(Error::InvalidConfig(
                "`stuck_threshold` must be at least 1".into(),
            ));
        }
        let finite = [
            self.death_penalty,
            self.no_progress_threshold,
            self.stuck_penalty,
            self.progress_bonus.unwrap_or(0.0),
        ]
        .iter()
        .all(|v| v.is_finite());
        finite
            .then_some(())
            .ok_or_else(|| Error::InvalidConfig("shaping values must be finite".into()))
    }
}

/// Action selection state: either consult the policy, or replay a held jump
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ActionHold {
    #[default]
    Selecting,
    Holding { action: usize, remaining: u32 },
}

impl ActionHold {
    /// The held action for this step, if any, counting the hold down
    pub fn next(&mut self) -> Option<usize> {
        match *self {
            Self::Selecting => None,
            Self::Holding { action, remaining } => {
                *self = if remaining > 1 {
                    Self::Holding {
                        action,
                        remaining: remaining - 1,
                    }
                } else {
                    Self::Selecting
                };
                Some(action)
            }
        }
    }

    /// Register a freshly selected action; jumps are held for the next `frames` steps
    pub fn selected(&mut self, action: usize, is_jump: bool, frames: Option<u32>) {
        match (is_jump, frames) {
            (true, Some(remaining)) if remaining > 0 => {
                *self = Self::Holding { action, remaining }
            }
            _ => {}
        }
    }
}

/// Everything that lives for exactly one episode
#[derive(Debug, Clone, PartialEq)]
pub struct EpisodeState {
    pub position: Position,
    pub life: i32,
    pub max_x: f64,
    pub steps_without_progress: u32,
    pub hold: ActionHold,
    pub total_reward: f64,
    pub steps: u32,
}

impl EpisodeState {
    pub fn new(start: Telemetry) -> Self {
        Self {
            position: start.position(),
            life: start.life,
            max_x: start.x_pos,
            steps_without_progress: 0,
            hold: ActionHold::Selecting,
            total_reward: 0.0,
            steps: 0,
        }
    }
}

/// Configuration for the [`Trainer`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainerConfig {
    pub episodes: u32,
    pub max_steps: u32,
    /// Save to the primary slot every `save_interval` episodes
    pub save_interval: u32,
    pub primary_slot: String,
    /// Saved to whenever an episode sets a new best reward
    pub best_slot: String,
    /// Number of recent episodes averaged into the exploration progress signal
    pub progress_window: usize,
    /// Replay a selected jump action for this many following steps
    pub jump_hold_frames: Option<u32>,
    pub shaping: ShapingConfig,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            episodes: 1000,
            max_steps: 5000,
            save_interval: 1,
            primary_slot: "agent".into(),
            best_slot: "agent_best".into(),
            progress_window: 3,
            jump_hold_frames: None,
            shaping: ShapingConfig::default(),
        }
    }
}

impl TrainerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.save_interval == 0 {
            return Err(Error::InvalidConfig(
                "`save_interval` must be at least 1".into(),
            ));
        }
        if self.progress_window == 0 {
            return Err(Error::InvalidConfig(
                "`progress_window` must be at least 1".into(),
            ));
        }
        validate_slot(&self.primary_slot)?;
        validate_slot(&self.best_slot)?;
        self.shaping.validate()
    }
}

/// How a single episode went
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpisodeOutcome {
    pub total_reward: f64,
    pub final_x: f64,
    pub steps: u32,
    pub event: Option<ShapingEvent>,
    /// The stop flag was raised mid-episode; the episode was abandoned
    pub interrupted: bool,
}

/// How a training run went
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingSummary {
    /// Completed episodes in this run
    pub episodes: u32,
    pub best_reward: f64,
    pub last_reward: Option<f64>,
    pub interrupted: bool,
}

/// Drives a [`QLearningAgent`] through episodes of an [`Environment`]
pub struct Trainer<E: Environment> {
    env: E,
    agent: QLearningAgent,
    store: CheckpointStore,
    config: TrainerConfig,
    progress: RingBuffer<f64>,
    stop: Arc<AtomicBool>,
}

impl<E: Environment> Trainer<E> {
    pub fn new(
        env: E,
        agent: QLearningAgent,
        store: CheckpointStore,
        config: TrainerConfig,
    ) -> Result<Self> {
        config.validate()?;
        if env.action_count() != agent.action_count() {
            return Err(Error::InvalidConfig(format!(
                "environment has {} actions, agent was built for {}",
                env.action_count(),
                agent.action_count()
            )));
        }
        Ok(Self {
            env,
            agent,
            store,
            progress: RingBuffer::new(config.progress_window),
            config,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Flag that, once set, makes [`Trainer::run`] save and return at the next step
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    pub fn agent(&self) -> &QLearningAgent {
        &self.agent
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn into_parts(self) -> (E, QLearningAgent) {
        (self.env, self.agent)
    }

    /// Mean final x of the last few completed episodes, 0 before the first one
    pub fn recent_avg_x(&self) -> f64 {
        mean(self.progress.view()).unwrap_or(0.0)
    }

    /// Run the configured number of episodes
    ///
    /// The primary slot is always saved before returning, including when the stop flag is raised
    /// or the environment fails.
    pub fn run(&mut self) -> Result<TrainingSummary> {
        let mut summary = TrainingSummary {
            episodes: 0,
            best_reward: self.agent.metrics().best_reward(),
            last_reward: None,
            interrupted: false,
        };

        for episode in 1..=self.config.episodes {
            let outcome = match self.run_episode() {
                Ok(outcome) => outcome,
                Err(e) => {
                    self.checkpoint(&self.config.primary_slot, "environment failure");
                    return Err(e);
                }
            };
            if outcome.interrupted {
                summary.interrupted = true;
                break;
            }

            self.finish_episode(episode, &outcome);
            summary.episodes += 1;
            summary.last_reward = Some(outcome.total_reward);
        }

        let reason = if summary.interrupted {
            info!("Stop requested, flushing agent state");
            "stop requested"
        } else {
            "training finished"
        };
        self.checkpoint(&self.config.primary_slot, reason);
        summary.best_reward = self.agent.metrics().best_reward();
        Ok(summary)
    }

    /// Play one episode, learning from every step
    ///
    /// Does not record metrics or save; [`Trainer::run`] does that for completed episodes.
    pub fn run_episode(&mut self) -> Result<EpisodeOutcome> {
        let start = self.env.reset().map_err(env_error)?;
        let mut episode = EpisodeState::new(start);
        let recent_avg_x = self.recent_avg_x();
        let mut event = None;
        debug!(
            "Starting at x={} with exploration rate {:.3} (recent average x {recent_avg_x:.0})",
            start.x_pos,
            self.agent.exploration_rate(start.position(), recent_avg_x)
        );

        for _ in 0..self.config.max_steps {
            if self.stop.load(Ordering::Relaxed) {
                return Ok(EpisodeOutcome {
                    total_reward: episode.total_reward,
                    final_x: episode.position.x,
                    steps: episode.steps,
                    event,
                    interrupted: true,
                });
            }

            let state = episode.position;
            let action = match episode.hold.next() {
                Some(held) => held,
                None => {
                    let action = self.agent.choose_action(state, recent_avg_x);
                    episode.hold.selected(
                        action,
                        self.env.is_jump(action),
                        self.config.jump_hold_frames,
                    );
                    action
                }
            };

            let transition = self.env.step(action).map_err(env_error)?;
            let shaped = self.config.shaping.apply(&mut episode, &transition);
            match shaped.event {
                Some(ShapingEvent::Died) => debug!("Died at x={}", transition.info.x_pos),
                Some(ShapingEvent::Stuck) => debug!(
                    "No progress for {} steps at x={}",
                    self.config.shaping.stuck_threshold, transition.info.x_pos
                ),
                None => {}
            }

            let next_state = transition.info.position();
            self.agent.learn(&Exp {
                state,
                action,
                reward: shaped.reward,
                next_state,
                done: shaped.done,
            });

            episode.total_reward += shaped.reward;
            episode.position = next_state;
            episode.steps += 1;
            event = shaped.event.or(event);
            if shaped.done {
                break;
            }
        }

        Ok(EpisodeOutcome {
            total_reward: episode.total_reward,
            final_x: episode.position.x,
            steps: episode.steps,
            event,
            interrupted: false,
        })
    }

    fn finish_episode(&mut self, episode: u32, outcome: &EpisodeOutcome) {
        self.progress.push(outcome.final_x);

        let record = self.agent.record_episode(outcome.total_reward);
        if record.is_new_best() {
            self.checkpoint(&self.config.best_slot, "new best reward");
        }
        if episode % self.config.save_interval == 0 {
            self.checkpoint(&self.config.primary_slot, "save interval");
        }

        info!(
            "Episode {episode}/{}, total reward: {:.1}, final x: {:.0}, steps: {}, best reward: {:.1}",
            self.config.episodes,
            outcome.total_reward,
            outcome.final_x,
            outcome.steps,
            self.agent.metrics().best_reward()
        );
    }

    /// Save to `slot`, reporting but otherwise ignoring failures
    fn checkpoint(&self, slot: &str, reason: &str) {
        match self.agent.save(&self.store, slot) {
            Ok(()) => debug!("Checkpoint `{slot}` written ({reason})"),
            Err(e) => warn!("Could not save slot `{slot}` ({reason}): {e}"),
        }
    }
}

fn env_error<T: std::error::Error + Send + Sync + 'static>(e: T) -> Error {
    Error::Environment(Box::new(e))
}
