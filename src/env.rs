use crate::grid::Position;

/// Per-step telemetry read from the game
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Telemetry {
    pub x_pos: f64,
    pub y_pos: f64,
    /// Remaining lives; a decrease between two steps means the player died
    pub life: i32,
}

impl Telemetry {
    pub fn position(&self) -> Position {
        Position::new(self.x_pos, self.y_pos)
    }
}

/// The outcome of a single [`Environment::step`]
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Transition {
    pub reward: f64,
    pub done: bool,
    pub info: Telemetry,
}

/// A side-scrolling level the agent can play through
///
/// Actions are indices into a small fixed set; the environment decides what each index means and
/// which of them contain a jump.
pub trait Environment {
    /// Failure of the environment itself (emulator crash, closed connection, ...)
    type Error: std::error::Error + Send + Sync + 'static;

    /// Size of the discrete action set; actions are `0..action_count()`
    fn action_count(&self) -> usize;

    /// Whether `action` presses the jump button
    fn is_jump(&self, action: usize) -> bool;

    /// Reset the environment to the start of the level
    ///
    /// **Returns** the initial telemetry
    fn reset(&mut self) -> Result<Telemetry, Self::Error>;

    /// Advance one step with the given action
    fn step(&mut self, action: usize) -> Result<Transition, Self::Error>;
}

#[cfg(test)]
pub(crate) mod tests {
    use std::{collections::VecDeque, convert::Infallible};

    use super::*;

    /// An environment that replays a fixed script of transitions and records the actions it
    /// receives. Once the script runs out it keeps returning the last transition.
    pub struct ScriptedEnv {
        pub start: Telemetry,
        pub script: VecDeque<Transition>,
        pub actions: Vec<usize>,
        pub action_count: usize,
        pub jump_actions: Vec<usize>,
        last: Transition,
    }

    impl ScriptedEnv {
        pub fn new(start: Telemetry, script: Vec<Transition>) -> Self {
            Self {
                start,
                last: Transition {
                    info: start,
                    ..Default::default()
                },
                script: script.into(),
                actions: Vec::new(),
                action_count: 5,
                jump_actions: vec![2, 4],
            }
        }
    }

    impl Environment for ScriptedEnv {
        type Error = Infallible;

        fn action_count(&self) -> usize {
            self.action_count
        }

        fn is_jump(&self, action: usize) -> bool {
            self.jump_actions.contains(&action)
        }

        fn reset(&mut self) -> Result<Telemetry, Self::Error> {
            Ok(self.start)
        }

        fn step(&mut self, action: usize) -> Result<Transition, Self::Error> {
            self.actions.push(action);
            if let Some(next) = self.script.pop_front() {
                self.last = next;
            }
            Ok(self.last)
        }
    }

    #[test]
    fn scripted_env_functional() {
        let start = Telemetry {
            x_pos: 40.0,
            y_pos: 79.0,
            life: 2,
        };
        let step = Transition {
            reward: 1.0,
            done: false,
            info: Telemetry {
                x_pos: 41.0,
                ..start
            },
        };
        let mut env = ScriptedEnv::new(start, vec![step]);
        assert_eq!(env.reset().unwrap().position(), Position::new(40.0, 79.0));
        assert_eq!(env.step(3).unwrap(), step);
        assert_eq!(env.step(1).unwrap(), step, "last transition repeats");
        assert_eq!(env.actions, [3, 1], "actions recorded");
        assert!(env.is_jump(2) && !env.is_jump(1));
    }
}
