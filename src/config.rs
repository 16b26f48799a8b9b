//! Engine tunables. Everything here has a serde default so a partial JSON file works.

use serde::{Deserialize, Serialize};

/// Settings for the search engine as a whole.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Candidate evaluations between suspension points in async generation.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Template sets up to this size are materialized and cached; larger ones are streamed.
    #[serde(default = "default_materialize_limit")]
    pub materialize_limit: u64,
    #[serde(default)]
    pub randomized: RandomizedConfig,
}

fn default_batch_size() -> usize {
    100
}

fn default_materialize_limit() -> u64 {
    200_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            materialize_limit: default_materialize_limit(),
            randomized: RandomizedConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}

/// Retry budgets and penalty constants for the randomized strategy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RandomizedConfig {
    /// Shuffled trials per phase (Phase 1, Phase 1.5 and Phase 2 each get this many).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
    /// Added per player faced again straight after facing them last round.
    #[serde(default = "default_consecutive_opponent_penalty")]
    pub consecutive_opponent_penalty: u32,
    /// Added to a resting candidate that also rested last round.
    #[serde(default = "default_consecutive_rest_penalty")]
    pub consecutive_rest_penalty: u32,
    /// Multiplier on the worst single pair/opponent repeat in the quick score.
    #[serde(default = "default_worst_case_weight")]
    pub worst_case_weight: u32,
}

fn default_max_attempts() -> usize {
    100
}

fn default_consecutive_opponent_penalty() -> u32 {
    100
}

fn default_consecutive_rest_penalty() -> u32 {
    1000
}

fn default_worst_case_weight() -> u32 {
    100
}

impl Default for RandomizedConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            consecutive_opponent_penalty: default_consecutive_opponent_penalty(),
            consecutive_rest_penalty: default_consecutive_rest_penalty(),
            worst_case_weight: default_worst_case_weight(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_fills_defaults() {
        let config = EngineConfig::from_json(r#"{ "batch_size": 10, "randomized": { "max_attempts": 5 } }"#)
            .unwrap();
        assert_eq!(config.batch_size, 10);
        assert_eq!(config.materialize_limit, 200_000);
        assert_eq!(config.randomized.max_attempts, 5);
        assert_eq!(config.randomized.consecutive_opponent_penalty, 100);
    }

    #[test]
    fn empty_json_is_default() {
        assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
    }
}
