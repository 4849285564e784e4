use crate::{assert_interval, decay::Decay};

use super::{Exploration, ExplorationContext};

/// Epsilon greedy exploration with a rate that decays once per finished episode, independent of
/// position
#[derive(Debug, Clone, PartialEq)]
pub struct TimeDecayed<D: Decay> {
    epsilon: D,
    terminals: u32,
    rate_min: f64,
    rate_max: f64,
}

impl<D: Decay> TimeDecayed<D> {
    /// Initialize the policy with a decay strategy evaluated at the number of terminal steps seen
    ///
    /// **Panics** if the rates are not in `[0,1]` or `rate_min > rate_max`
    pub fn new(decay: D, rate_min: f64, rate_max: f64) -> Self {
        assert_interval!(rate_min, 0.0, 1.0);
        assert_interval!(rate_max, rate_min, 1.0);
        Self {
            epsilon: decay,
            terminals: 0,
            rate_min,
            rate_max,
        }
    }

    pub fn terminals(&self) -> u32 {
        self.terminals
    }
}

impl<D: Decay> Exploration for TimeDecayed<D> {
    fn rate(&self, _ctx: &ExplorationContext) -> f64 {
        self.epsilon
            .evaluate(self.terminals as f64)
            .min(self.rate_max)
            .max(self.rate_min)
    }

    fn on_terminal(&mut self) {
        self.terminals = self.terminals.saturating_add(1);
    }

    fn resume(&mut self, terminals: u32) {
        self.terminals = terminals;
    }
}

#[cfg(test)]
mod tests {
    use crate::decay::Geometric;

    use super::*;

    #[test]
    fn decays_per_terminal_step() {
        let mut policy = TimeDecayed::new(Geometric::new(0.5, 1.0, 0.1).unwrap(), 0.0, 1.0);
        let ctx = ExplorationContext::default();
        assert_eq!(policy.rate(&ctx), 1.0);

        policy.on_terminal();
        assert_eq!(policy.rate(&ctx), 0.5);
        policy.on_terminal();
        assert_eq!(policy.rate(&ctx), 0.25);
        assert_eq!(policy.terminals(), 2);

        for _ in 0..10 {
            policy.on_terminal();
        }
        assert_eq!(policy.rate(&ctx), 0.1, "floored at schedule minimum");
    }

    #[test]
    fn resume_restores_decay_progress() {
        let mut policy = TimeDecayed::new(Geometric::new(0.5, 1.0, 0.01).unwrap(), 0.0, 1.0);
        policy.resume(3);
        assert_eq!(policy.terminals(), 3);
        assert_eq!(policy.rate(&ExplorationContext::default()), 0.125);
        policy.on_terminal();
        assert_eq!(policy.rate(&ExplorationContext::default()), 0.0625);
    }

    #[test]
    fn ignores_position() {
        let policy = TimeDecayed::new(Geometric::new(0.5, 0.8, 0.1).unwrap(), 0.0, 1.0);
        let near = ExplorationContext {
            x: 0.0,
            recent_avg_x: 0.0,
        };
        let far = ExplorationContext {
            x: 2500.0,
            recent_avg_x: 900.0,
        };
        assert_eq!(policy.rate(&near), policy.rate(&far));
    }

    #[test]
    fn clamps_into_bounds() {
        let mut policy = TimeDecayed::new(Geometric::new(0.5, 1.0, 0.0).unwrap(), 0.2, 0.6);
        let ctx = ExplorationContext::default();
        assert_eq!(policy.rate(&ctx), 0.6);
        for _ in 0..20 {
            policy.on_terminal();
        }
        assert_eq!(policy.rate(&ctx), 0.2);
    }
}
