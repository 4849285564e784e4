use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    decay::{AnyDecay, Schedule},
    error::{Error, Result},
    util::check_interval,
};

mod position_scaled;
mod time_decayed;

pub use position_scaled::PositionScaled;
pub use time_decayed::TimeDecayed;

/// Exploration policy result
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    Explore,
    Exploit,
}

/// What a policy may look at when deciding how much to explore
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ExplorationContext {
    /// Current x position of the player
    pub x: f64,
    /// Mean final x position over the last few completed episodes
    pub recent_avg_x: f64,
}

/// A policy producing a random-action probability
pub trait Exploration {
    /// Random-action probability, already clamped into the policy's `[rate_min, rate_max]`
    fn rate(&self, ctx: &ExplorationContext) -> f64;

    /// Notify the policy that an episode just ended
    fn on_terminal(&mut self) {}

    /// Pick up after a restored session that had already seen `terminals` episode ends
    fn resume(&mut self, _terminals: u32) {}

    /// Draw once against [`Exploration::rate`]
    fn choose<R: Rng + ?Sized>(&self, rng: &mut R, ctx: &ExplorationContext) -> Choice {
        if rng.gen::<f64>() < self.rate(ctx) {
            Choice::Explore
        } else {
            Choice::Exploit
        }
    }
}

/// Serializable choice of exploration policy
///
/// Only `kind` is required; omitted fields take the values of the default position scaled
/// policy, or a `[0, 1]` range over the default [`Schedule`] for the time decayed one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExplorationConfig {
    /// rate = clamp(x_scale·x − progress_scale·(recent_avg_x − progress_offset), rate_min, rate_max)
    PositionScaled {
        #[serde(default = "defaults::x_scale")]
        x_scale: f64,
        #[serde(default = "defaults::progress_scale")]
        progress_scale: f64,
        #[serde(default = "defaults::progress_offset")]
        progress_offset: f64,
        #[serde(default = "defaults::position_rate_min")]
        rate_min: f64,
        #[serde(default = "defaults::position_rate_max")]
        rate_max: f64,
    },
    /// rate = clamp(schedule(terminal steps seen), rate_min, rate_max)
    TimeDecayed {
        #[serde(default)]
        schedule: Schedule,
        #[serde(default = "defaults::decayed_rate_min")]
        rate_min: f64,
        #[serde(default = "defaults::decayed_rate_max")]
        rate_max: f64,
    },
}

mod defaults {
    pub fn x_scale() -> f64 {
        0.005
    }

    pub fn progress_scale() -> f64 {
        0.005
    }

    pub fn progress_offset() -> f64 {
        35.0
    }

    pub fn position_rate_min() -> f64 {
        0.001
    }

    pub fn position_rate_max() -> f64 {
        0.3
    }

    pub fn decayed_rate_min() -> f64 {
        0.0
    }

    pub fn decayed_rate_max() -> f64 {
        1.0
    }
}

impl Default for ExplorationConfig {
    fn default() -> Self {
        Self::PositionScaled {
            x_scale: defaults::x_scale(),
            progress_scale: defaults::progress_scale(),
            progress_offset: defaults::progress_offset(),
            rate_min: defaults::position_rate_min(),
            rate_max: defaults::position_rate_max(),
        }
    }
}

impl ExplorationConfig {
    /// Purely greedy behavior, useful for evaluation runs
    pub fn greedy() -> Self {
        Self::PositionScaled {
            x_scale: 0.0,
            progress_scale: 0.0,
            progress_offset: 0.0,
            rate_min: 0.0,
            rate_max: 0.0,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let (rate_min, rate_max) = match *self {
            Self::PositionScaled {
                rate_min, rate_max, ..
            } => (rate_min, rate_max),
            Self::TimeDecayed {
                ref schedule,
                rate_min,
                rate_max,
            } => {
                AnyDecay::try_from(schedule)?;
                (rate_min, rate_max)
            }
        };
        check_interval("rate_min", rate_min, 0.0, 1.0)?;
        check_interval("rate_max", rate_max, 0.0, 1.0)?;
        if rate_min > rate_max {
            return Err(Error::InvalidConfig(format!(
                "rate_min {rate_min} exceeds rate_max {rate_max}"
            )));
        }
        Ok(())
    }
}

/// A constructed exploration policy
#[derive(Debug, Clone, PartialEq)]
pub enum Policy {
    PositionScaled(PositionScaled),
    TimeDecayed(TimeDecayed<AnyDecay>),
}

impl Policy {
    pub fn from_config(config: &ExplorationConfig) -> Result<Self> {
        config.validate()?;
        Ok(match *config {
            ExplorationConfig::PositionScaled {
                x_scale,
                progress_scale,
                progress_offset,
                rate_min,
                rate_max,
            } => Self::PositionScaled(PositionScaled::new(
                x_scale,
                progress_scale,
                progress_offset,
                rate_min,
                rate_max,
            )),
            ExplorationConfig::TimeDecayed {
                ref schedule,
                rate_min,
                rate_max,
            } => Self::TimeDecayed(TimeDecayed::new(
                AnyDecay::try_from(schedule)?,
                rate_min,
                rate_max,
            )),
        })
    }
}

impl Exploration for Policy {
    fn rate(&self, ctx: &ExplorationContext) -> f64 {
        match self {
            Self::PositionScaled(p) => p.rate(ctx),
            Self::TimeDecayed(p) => p.rate(ctx),
        }
    }

    fn on_terminal(&mut self) {
        match self {
            Self::PositionScaled(p) => p.on_terminal(),
            Self::TimeDecayed(p) => p.on_terminal(),
        }
    }

    fn resume(&mut self, terminals: u32) {
        match self {
            Self::PositionScaled(p) => p.resume(terminals),
            Self::TimeDecayed(p) => p.resume(terminals),
        }
    }
}
