//! Schedule, Evaluation and the generation error/state types.

use crate::models::game::{FixedPair, Round};
use crate::models::player::{PlayerId, PlayerStats};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use uuid::Uuid;

/// Errors that can occur while generating or regenerating a schedule.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ScheduleError {
    /// No arrangement satisfies the fixed pairs for this round.
    #[error("No arrangement satisfies the fixed pairs in round {round}")]
    ConstraintUnsatisfiable { round: u32 },
    /// Not enough active players to fill every court.
    #[error("Need at least {required} active players, have {available}")]
    InsufficientPlayers { required: usize, available: usize },
    /// Cooperative cancellation; carries the rounds committed before it was observed.
    #[error("Generation cancelled after {} round(s)", .completed_rounds.len())]
    Cancelled { completed_rounds: Vec<Round> },
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
    #[error("Invalid fixed pair ({}, {}): {reason}", .pair.player1, .pair.player2)]
    InvalidFixedPair { pair: FixedPair, reason: String },
}

impl ScheduleError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ScheduleError::Cancelled { .. })
    }
}

/// Lifecycle of one generation run.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationState {
    #[default]
    Idle,
    Running,
    Completed,
    /// Unsatisfiable fixed pairs, too few players, bad parameters. Partial work is discarded.
    Failed,
    /// Stopped by the caller. Rounds committed so far are kept.
    Cancelled,
}

/// Weights for combining the three standard deviations into one score.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FairnessWeights {
    #[serde(default = "default_weight")]
    pub pair: f64,
    #[serde(default = "default_weight")]
    pub opponent: f64,
    /// Inert when nobody ever rests.
    #[serde(default = "default_weight")]
    pub rest: f64,
}

fn default_weight() -> f64 {
    1.0
}

impl Default for FairnessWeights {
    fn default() -> Self {
        Self {
            pair: default_weight(),
            opponent: default_weight(),
            rest: default_weight(),
        }
    }
}

impl FairnessWeights {
    pub fn new(pair: f64, opponent: f64, rest: f64) -> Self {
        Self { pair, opponent, rest }
    }
}

/// Fairness snapshot. Lower `total_score` is better; all zeros is perfectly balanced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub pair_std_dev: f64,
    pub oppo_std_dev: f64,
    pub rest_std_dev: f64,
    pub total_score: f64,
}

impl Evaluation {
    pub fn new(pair_std_dev: f64, oppo_std_dev: f64, rest_std_dev: f64, weights: &FairnessWeights) -> Self {
        Self {
            pair_std_dev,
            oppo_std_dev,
            rest_std_dev,
            total_score: pair_std_dev * weights.pair
                + oppo_std_dev * weights.opponent
                + rest_std_dev * weights.rest,
        }
    }
}

/// Unique identifier for a generated schedule.
pub type ScheduleId = Uuid;

/// A complete (or regenerated) schedule. Immutable once returned by the generator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Schedule {
    pub id: ScheduleId,
    pub courts_count: usize,
    /// Highest player id seen in the roster or in any round.
    pub players_count: usize,
    /// Sorted by round number.
    pub rounds: Vec<Round>,
    pub evaluation: Evaluation,
    pub fixed_pairs: Vec<FixedPair>,
    /// Players currently in the tournament, sorted ascending.
    pub active_players: Vec<PlayerId>,
    pub generated_at: DateTime<Utc>,
}

impl Schedule {
    pub fn new(
        courts_count: usize,
        mut rounds: Vec<Round>,
        evaluation: Evaluation,
        fixed_pairs: Vec<FixedPair>,
        mut active_players: Vec<PlayerId>,
    ) -> Self {
        rounds.sort_by_key(|r| r.round_number);
        active_players.sort_unstable();
        active_players.dedup();
        let players_count = rounds
            .iter()
            .flat_map(|r| r.playing_players().chain(r.resting_players.iter().copied()))
            .chain(active_players.iter().copied())
            .max()
            .unwrap_or(0) as usize;
        Self {
            id: Uuid::new_v4(),
            courts_count,
            players_count,
            rounds,
            evaluation,
            fixed_pairs,
            active_players,
            generated_at: Utc::now(),
        }
    }

    pub fn round(&self, round_number: u32) -> Option<&Round> {
        self.rounds.iter().find(|r| r.round_number == round_number)
    }

    /// Copy of the active roster with `added` joined and `removed` dropped, sorted.
    /// This is the roster to pass to suffix regeneration after a mid-tournament change.
    pub fn with_active_players(&self, added: &[PlayerId], removed: &[PlayerId]) -> Vec<PlayerId> {
        let removed: HashSet<PlayerId> = removed.iter().copied().collect();
        let mut roster: Vec<PlayerId> = self
            .active_players
            .iter()
            .chain(added.iter())
            .copied()
            .filter(|p| !removed.contains(p))
            .collect();
        roster.sort_unstable();
        roster.dedup();
        roster
    }

    /// Per-player summary for every active player (sorted by id).
    pub fn player_stats(&self) -> Vec<PlayerStats> {
        let mut stats: BTreeMap<PlayerId, PlayerStats> = self
            .active_players
            .iter()
            .map(|&p| (p, PlayerStats::new(p)))
            .collect();
        let mut partners: BTreeMap<PlayerId, HashSet<PlayerId>> = BTreeMap::new();
        let mut opponents: BTreeMap<PlayerId, HashSet<PlayerId>> = BTreeMap::new();

        for round in &self.rounds {
            for m in &round.matches {
                for pair in [m.pair_a, m.pair_b] {
                    partners.entry(pair.player1).or_default().insert(pair.player2);
                    partners.entry(pair.player2).or_default().insert(pair.player1);
                }
                for (x, y) in m.opponents() {
                    opponents.entry(x).or_default().insert(y);
                    opponents.entry(y).or_default().insert(x);
                }
                for p in m.players() {
                    if let Some(s) = stats.get_mut(&p) {
                        s.add_game();
                    }
                }
            }
            for p in &round.resting_players {
                if let Some(s) = stats.get_mut(p) {
                    s.record_rest();
                }
            }
        }

        for (p, s) in stats.iter_mut() {
            s.distinct_partners = partners.get(p).map_or(0, |set| set.len() as u32);
            s.distinct_opponents = opponents.get(p).map_or(0, |set| set.len() as u32);
        }
        stats.into_values().collect()
    }
}
