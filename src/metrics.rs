use serde::{Deserialize, Serialize};

use crate::util::mean;

/// Outcome of [`EpisodeMetrics::record`]
#[must_use = "a new best should usually be checkpointed"]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    NewBest,
    NotBest,
}

impl Record {
    pub fn is_new_best(self) -> bool {
        self == Self::NewBest
    }
}

/// Per-episode cumulative rewards and the best of them
///
/// Serialized as `{"best_reward": ..., "episode_rewards": [...]}`; a best reward of −∞ (nothing
/// recorded yet) is written as `null` since JSON has no infinities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpisodeMetrics {
    #[serde(with = "finite_or_null")]
    best_reward: f64,
    episode_rewards: Vec<f64>,
}

impl Default for EpisodeMetrics {
    fn default() -> Self {
        Self {
            best_reward: f64::NEG_INFINITY,
            episode_rewards: Vec::new(),
        }
    }
}

impl EpisodeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an episode's total reward and report whether it beat the previous best
    ///
    /// Only compares and flags; persisting the new best is up to the caller.
    pub fn record(&mut self, total_reward: f64) -> Record {
        self.episode_rewards.push(total_reward);
        if total_reward > self.best_reward {
            self.best_reward = total_reward;
            Record::NewBest
        } else {
            Record::NotBest
        }
    }

    /// Best episode reward so far, −∞ before the first episode
    pub fn best_reward(&self) -> f64 {
        self.best_reward
    }

    pub fn episode_rewards(&self) -> &[f64] {
        &self.episode_rewards
    }

    pub fn episodes(&self) -> usize {
        self.episode_rewards.len()
    }

    /// Mean reward of the last `n` episodes
    pub fn recent_mean(&self, n: usize) -> Option<f64> {
        let start = self.episode_rewards.len().saturating_sub(n);
        mean(&self.episode_rewards[start..])
    }
}

mod finite_or_null {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_some(value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NEG_INFINITY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_functional() {
        let mut metrics = EpisodeMetrics::new();
        assert_eq!(metrics.best_reward(), f64::NEG_INFINITY);

        assert_eq!(metrics.record(-13.0), Record::NewBest, "first episode is a best");
        assert_eq!(metrics.record(-20.0), Record::NotBest);
        assert_eq!(metrics.record(-13.0), Record::NotBest, "ties are not a new best");
        assert_eq!(metrics.record(40.5), Record::NewBest);

        assert_eq!(metrics.best_reward(), 40.5);
        assert_eq!(metrics.episode_rewards(), [-13.0, -20.0, -13.0, 40.5]);
    }

    #[test]
    fn best_is_monotonic() {
        let mut metrics = EpisodeMetrics::new();
        let rewards = [3.0, -1.0, 8.0, 2.0, 8.5, -100.0, 0.0];
        let mut prev_best = metrics.best_reward();
        for (i, r) in rewards.into_iter().enumerate() {
            let _ = metrics.record(r);
            assert_eq!(metrics.episodes(), i + 1, "length grows by one per call");
            assert!(metrics.best_reward() >= prev_best);
            prev_best = metrics.best_reward();
        }
        assert_eq!(prev_best, 8.5);
    }

    #[test]
    fn recent_mean_functional() {
        let mut metrics = EpisodeMetrics::new();
        assert_eq!(metrics.recent_mean(3), None);
        for r in [1.0, 2.0, 3.0, 4.0] {
            let _ = metrics.record(r);
        }
        assert_eq!(metrics.recent_mean(2), Some(3.5));
        assert_eq!(metrics.recent_mean(100), Some(2.5));
    }

    #[test]
    fn json_shape() {
        let fresh = serde_json::to_value(EpisodeMetrics::new()).unwrap();
        assert_eq!(
            fresh,
            serde_json::json!({"best_reward": null, "episode_rewards": []})
        );

        let mut metrics = EpisodeMetrics::new();
        let _ = metrics.record(12.5);
        let text = serde_json::to_string(&metrics).unwrap();
        assert_eq!(text, r#"{"best_reward":12.5,"episode_rewards":[12.5]}"#);
        let back: EpisodeMetrics = serde_json::from_str(&text).unwrap();
        assert_eq!(back, metrics);

        let restored: EpisodeMetrics = serde_json::from_value(fresh).unwrap();
        assert_eq!(restored.best_reward(), f64::NEG_INFINITY);
    }
}
