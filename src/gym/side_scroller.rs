use serde::{Deserialize, Serialize};
use strum::{Display, EnumCount, EnumIter, FromRepr};
use thiserror::Error;

use crate::env::{Environment, Telemetry, Transition};

/// Joypad combinations available in [`SideScroller`], the "right only" subset of a full pad
#[derive(FromRepr, EnumIter, EnumCount, Display, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SSAction {
    #[strum(to_string = "NOOP")]
    Noop = 0,
    #[strum(to_string = "right")]
    Right = 1,
    #[strum(to_string = "right+A")]
    RightJump = 2,
    #[strum(to_string = "right+B")]
    RightRun = 3,
    #[strum(to_string = "right+A+B")]
    RightRunJump = 4,
}

impl SSAction {
    pub fn is_jump(self) -> bool {
        matches!(self, Self::RightJump | Self::RightRunJump)
    }

    fn is_run(self) -> bool {
        matches!(self, Self::RightRun | Self::RightRunJump)
    }
}

impl TryFrom<usize> for SSAction {
    type Error = LevelError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        Self::from_repr(value).ok_or(LevelError::InvalidAction(value))
    }
}

/// Terrain features along the x axis
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Obstacle {
    /// A solid block on `[start, end)` that the player has to clear by jumping
    Pipe { start: f64, end: f64, height: f64 },
    /// A gap in the floor on `[start, end)`; falling in costs a life
    Pit { start: f64, end: f64 },
}

impl Obstacle {
    fn covers(&self, x: f64) -> bool {
        let (Self::Pipe { start, end, .. } | Self::Pit { start, end }) = *self;
        (start..end).contains(&x)
    }
}

/// Layout and physics of a [`SideScroller`] level
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// x of the flag; reaching it completes the level
    pub length: f64,
    pub start_x: f64,
    /// `y_pos` reported while standing on the ground
    pub ground_y: f64,
    pub lives: i32,
    pub walk_speed: f64,
    pub run_speed: f64,
    pub jump_velocity: f64,
    pub gravity: f64,
    /// Depth below the ground at which a falling player is lost
    pub fall_depth: f64,
    /// Per-step reward bound, applied symmetrically to the x-delta
    pub reward_clip: f64,
    /// Added to the step reward when a life is lost
    pub death_reward: f64,
    pub obstacles: Vec<Obstacle>,
}

impl Default for LevelConfig {
    fn default() -> Self {
        let pipe = |start: f64, height: f64| Obstacle::Pipe {
            start,
            end: start + 32.0,
            height,
        };
        Self {
            length: 3000.0,
            start_x: 40.0,
            ground_y: 79.0,
            lives: 2,
            walk_speed: 2.0,
            run_speed: 4.0,
            jump_velocity: 12.0,
            gravity: 1.0,
            fall_depth: 40.0,
            reward_clip: 15.0,
            death_reward: -15.0,
            obstacles: vec![
                pipe(448.0, 32.0),
                pipe(608.0, 48.0),
                pipe(736.0, 64.0),
                pipe(912.0, 64.0),
                Obstacle::Pit {
                    start: 1104.0,
                    end: 1136.0,
                },
                Obstacle::Pit {
                    start: 1376.0,
                    end: 1424.0,
                },
                pipe(2608.0, 32.0),
                pipe(2864.0, 32.0),
            ],
        }
    }
}

impl LevelConfig {
    pub fn validate(&self) -> crate::Result<()> {
        let invalid = |msg: &str| Err(crate::Error::InvalidConfig(format!("level: {msg}")));
        if self.lives < 1 {
            return invalid("`lives` must be at least 1");
        }
        if !(self.start_x >= 0.0 && self.start_x < self.length) {
            return invalid("`start_x` must lie within the level");
        }
        let positive = [
            self.walk_speed,
            self.run_speed,
            self.jump_velocity,
            self.gravity,
            self.fall_depth,
            self.reward_clip,
        ];
        if !positive.iter().all(|v| v.is_finite() && *v > 0.0) {
            return invalid("speeds, gravity, fall depth and reward clip must be positive");
        }
        if self.obstacles.iter().any(|o| {
            let (Obstacle::Pipe { start, end, .. } | Obstacle::Pit { start, end }) = *o;
            !(start < end)
        }) {
            return invalid("every obstacle must end after it starts");
        }
        Ok(())
    }
}

/// Failures of the [`SideScroller`] environment
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum LevelError {
    #[error("no level action has index {0}")]
    InvalidAction(usize),
    #[error("the episode is over, reset the level before stepping again")]
    EpisodeOver,
}

/// A deterministic side-scrolling level with pipes and pits
///
/// The player starts at `start_x` on the ground and moves right at walking or running speed.
/// Jumping is only possible while standing on something. Pipes block horizontal movement unless
/// the player is at least as high as the pipe, and can be landed on. Walking into a pit means
/// falling until `fall_depth` below the ground, which costs a life and respawns the player at the
/// start. The reward is the clipped x-delta of the step.
#[derive(Debug, Clone)]
pub struct SideScroller {
    config: LevelConfig,
    x: f64,
    /// Height above the ground
    height: f64,
    vy: f64,
    life: i32,
    done: bool,
}

impl SideScroller {
    pub fn new(config: LevelConfig) -> Self {
        let life = config.lives;
        let x = config.start_x;
        Self {
            config,
            x,
            height: 0.0,
            vy: 0.0,
            life,
            done: false,
        }
    }

    pub fn telemetry(&self) -> Telemetry {
        Telemetry {
            x_pos: self.x,
            y_pos: self.config.ground_y + self.height,
            life: self.life,
        }
    }

    /// Height of whatever the player would stand on at `x`, `None` over a pit
    fn floor(&self, x: f64) -> Option<f64> {
        match self.config.obstacles.iter().find(|o| o.covers(x)) {
            Some(Obstacle::Pipe { height, .. }) => Some(*height),
            Some(Obstacle::Pit { .. }) => None,
            None => Some(0.0),
        }
    }

    fn on_ground(&self) -> bool {
        self.vy == 0.0 && self.floor(self.x) == Some(self.height)
    }

    /// Furthest x reachable from the current x moving right by `dx` at the current height
    fn advance(&self, dx: f64) -> f64 {
        let target = (self.x + dx).min(self.config.length);
        self.config
            .obstacles
            .iter()
            .filter_map(|o| match *o {
                Obstacle::Pipe { start, height, .. }
                    if self.height < height && self.x < start && start <= target =>
                {
                    Some(start - 1.0)
                }
                _ => None,
            })
            .fold(target, f64::min)
            .max(self.x)
    }

    fn respawn(&mut self) {
        self.x = self.config.start_x;
        self.height = 0.0;
        self.vy = 0.0;
    }
}

impl Default for SideScroller {
    fn default() -> Self {
        Self::new(LevelConfig::default())
    }
}

impl Environment for SideScroller {
    type Error = LevelError;

    fn action_count(&self) -> usize {
        SSAction::COUNT
    }

    fn is_jump(&self, action: usize) -> bool {
        SSAction::from_repr(action).is_some_and(SSAction::is_jump)
    }

    fn reset(&mut self) -> Result<Telemetry, Self::Error> {
        self.respawn();
        self.life = self.config.lives;
        self.done = false;
        Ok(self.telemetry())
    }

    fn step(&mut self, action: usize) -> Result<Transition, Self::Error> {
        let action = SSAction::try_from(action)?;
        if self.done {
            return Err(LevelError::EpisodeOver);
        }
        let start_x = self.x;

        if action.is_jump() && self.on_ground() {
            self.vy = self.config.jump_velocity;
        }
        if self.floor(self.x) != Some(self.height) || self.vy != 0.0 {
            self.height += self.vy;
            self.vy -= self.config.gravity;
        }

        // below the ground means inside a pit, where only falling is possible
        if self.height >= 0.0 {
            let dx = match action {
                SSAction::Noop => 0.0,
                a if a.is_run() => self.config.run_speed,
                _ => self.config.walk_speed,
            };
            self.x = self.advance(dx);
        }

        match self.floor(self.x) {
            Some(floor) if self.height <= floor => {
                self.height = floor;
                self.vy = 0.0;
            }
            // walked off a ledge
            Some(_) if self.vy == 0.0 => self.vy = -self.config.gravity,
            None if self.vy == 0.0 => self.vy = -self.config.gravity,
            _ => {}
        }

        let clip = self.config.reward_clip;
        let mut reward = (self.x - start_x).clamp(-clip, clip);

        if self.height < -self.config.fall_depth {
            self.life -= 1;
            reward += self.config.death_reward;
            self.respawn();
            self.done = self.life <= 0;
        } else if self.x >= self.config.length {
            self.done = true;
        }

        Ok(Transition {
            reward,
            done: self.done,
            info: self.telemetry(),
        })
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    fn flat(length: f64, obstacles: Vec<Obstacle>) -> SideScroller {
        SideScroller::new(LevelConfig {
            length,
            obstacles,
            ..Default::default()
        })
    }

    fn run(env: &mut SideScroller, action: SSAction, steps: usize) -> Transition {
        let mut last = Transition::default();
        for _ in 0..steps {
            last = env.step(action as usize).unwrap();
        }
        last
    }

    #[test]
    fn action_set() {
        let env = SideScroller::default();
        assert_eq!(env.action_count(), 5);
        let jumps: Vec<_> = SSAction::iter().filter(|a| a.is_jump()).collect();
        assert_eq!(jumps, [SSAction::RightJump, SSAction::RightRunJump]);
        assert!(env.is_jump(2) && env.is_jump(4) && !env.is_jump(3));
        assert!(!env.is_jump(9), "unknown actions are not jumps");
        assert_eq!(SSAction::RightRunJump.to_string(), "right+A+B");
    }

    #[test]
    fn reset_places_player_at_start() {
        let mut env = SideScroller::default();
        run(&mut env, SSAction::RightRun, 10);
        let start = env.reset().unwrap();
        assert_eq!(
            start,
            Telemetry {
                x_pos: 40.0,
                y_pos: 79.0,
                life: 2
            }
        );
    }

    #[test]
    fn reward_is_x_delta() {
        let mut env = flat(3000.0, vec![]);
        env.reset().unwrap();
        let walk = env.step(SSAction::Right as usize).unwrap();
        assert_eq!(walk.reward, 2.0);
        assert_eq!(walk.info.x_pos, 42.0);
        let run = env.step(SSAction::RightRun as usize).unwrap();
        assert_eq!(run.reward, 4.0);
        let idle = env.step(SSAction::Noop as usize).unwrap();
        assert_eq!(idle.reward, 0.0, "standing still earns nothing");
        assert!(!idle.done);
    }

    #[test]
    fn jump_arc_returns_to_ground() {
        let mut env = flat(3000.0, vec![]);
        env.reset().unwrap();
        let up = env.step(SSAction::RightJump as usize).unwrap();
        assert_eq!(up.info.y_pos, 79.0 + 12.0);
        // held jump does not jump again mid-air
        let mut peak = up.info.y_pos;
        let mut steps = 1;
        loop {
            let t = env.step(SSAction::RightJump as usize).unwrap();
            steps += 1;
            peak = peak.max(t.info.y_pos);
            if t.info.y_pos == 79.0 {
                break;
            }
            assert!(steps < 100, "never landed");
        }
        assert_eq!(peak, 79.0 + 78.0, "12 + 11 + ... + 1");
        assert_eq!(env.telemetry().life, 2);
    }

    #[test]
    fn pipe_blocks_walking() {
        let mut env = flat(
            3000.0,
            vec![Obstacle::Pipe {
                start: 60.0,
                end: 92.0,
                height: 32.0,
            }],
        );
        env.reset().unwrap();
        let last = run(&mut env, SSAction::Right, 30);
        assert_eq!(last.info.x_pos, 59.0, "stopped at the pipe");
        assert_eq!(last.reward, 0.0);
    }

    #[test]
    fn jump_clears_pipe() {
        let mut env = flat(
            3000.0,
            vec![Obstacle::Pipe {
                start: 60.0,
                end: 92.0,
                height: 32.0,
            }],
        );
        env.reset().unwrap();
        let last = run(&mut env, SSAction::RightRunJump, 60);
        assert!(last.info.x_pos > 92.0, "got past the pipe: {}", last.info.x_pos);
        assert_eq!(last.info.life, 2);
    }

    #[test]
    fn pit_costs_a_life() {
        let mut env = flat(
            3000.0,
            vec![Obstacle::Pit {
                start: 50.0,
                end: 100.0,
            }],
        );
        env.reset().unwrap();
        let mut died = None;
        for _ in 0..60 {
            let t = env.step(SSAction::Right as usize).unwrap();
            if t.info.life < 2 {
                died = Some(t);
                break;
            }
        }
        let t = died.expect("fell into the pit");
        assert_eq!(t.info.life, 1);
        assert_eq!(t.info.x_pos, 40.0, "respawned at the start");
        assert!(t.reward <= -15.0);
        assert!(!t.done, "a life remains");
    }

    #[test]
    fn last_life_ends_the_episode() {
        let mut env = SideScroller::new(LevelConfig {
            lives: 1,
            obstacles: vec![Obstacle::Pit {
                start: 50.0,
                end: 100.0,
            }],
            ..Default::default()
        });
        env.reset().unwrap();
        let mut last = Transition::default();
        for _ in 0..60 {
            last = env.step(SSAction::Right as usize).unwrap();
            if last.done {
                break;
            }
        }
        assert!(last.done);
        assert_eq!(last.info.life, 0);
        assert_eq!(
            env.step(SSAction::Right as usize),
            Err(LevelError::EpisodeOver)
        );
    }

    #[test]
    fn flag_ends_the_episode() {
        let mut env = flat(60.0, vec![]);
        env.reset().unwrap();
        let last = run(&mut env, SSAction::RightRun, 5);
        assert!(last.done);
        assert_eq!(last.info.x_pos, 60.0, "x never passes the flag");
    }

    #[test]
    fn config_validation() {
        assert!(LevelConfig::default().validate().is_ok());
        let bad = [
            LevelConfig {
                lives: 0,
                ..Default::default()
            },
            LevelConfig {
                gravity: 0.0,
                ..Default::default()
            },
            LevelConfig {
                start_x: 4000.0,
                ..Default::default()
            },
            LevelConfig {
                obstacles: vec![Obstacle::Pit {
                    start: 10.0,
                    end: 10.0,
                }],
                ..Default::default()
            },
        ];
        for config in bad {
            assert!(config.validate().is_err(), "{config:?} accepted");
        }
    }

    #[test]
    fn invalid_action() {
        let mut env = SideScroller::default();
        env.reset().unwrap();
        assert_eq!(env.step(5), Err(LevelError::InvalidAction(5)));
    }
}
