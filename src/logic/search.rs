//! Strategy selection and the resumable per-round search both strategies implement.
//!
//! A round search is driven in slices: [`RoundSearch::step`] does at most `budget` candidate
//! evaluations and either reports progress or hands back the finished round. The synchronous
//! driver passes an unlimited budget; the async driver suspends between slices.

use crate::config::EngineConfig;
use crate::logic::canonical::{canonical_count, TemplateCache};
use crate::logic::fairness::CumulativeState;
use crate::logic::greedy::{self, GreedySearch};
use crate::logic::randomized::{self, RandomizedSearch};
use crate::logic::resting::{combination_count, rest_count};
use crate::models::{FairnessWeights, FixedPair, PlayerId, Round, ScheduleError};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which round-generation algorithm to run.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Score every legal candidate, keep the minimum. Deterministic; may fail on fixed pairs.
    #[default]
    Greedy,
    /// Constrained random backtracking with a scoring fallback. Never fails.
    Randomized,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 2] = [StrategyKind::Greedy, StrategyKind::Randomized];

    pub fn id(&self) -> &'static str {
        match self {
            StrategyKind::Greedy => "greedy",
            StrategyKind::Randomized => "randomized",
        }
    }

    /// Closed-form estimate of candidate evaluations for a whole run (progress denominators only).
    pub fn estimate_total_evaluations(
        &self,
        players_count: usize,
        courts_count: usize,
        rounds_count: usize,
        config: &EngineConfig,
    ) -> u64 {
        let rounds = rounds_count as u64;
        match self {
            StrategyKind::Greedy => {
                let resting = combination_count(players_count, rest_count(players_count, courts_count));
                resting
                    .saturating_mul(canonical_count(courts_count))
                    .saturating_mul(rounds)
            }
            // Phase 1 usually succeeds well within budget; count one full phase per round.
            StrategyKind::Randomized => (config.randomized.max_attempts.max(1) as u64).saturating_mul(rounds),
        }
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for StrategyKind {
    type Err = ScheduleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.id().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| ScheduleError::InvalidParameters(format!("unknown strategy '{s}'")))
    }
}

/// Everything a strategy needs to know about the round it is about to build.
#[derive(Clone, Copy, Debug)]
pub struct RoundContext<'a> {
    pub round_number: u32,
    pub courts: usize,
    /// Active players, sorted ascending.
    pub roster: &'a [PlayerId],
    /// Fixed pairs with both members in the roster.
    pub fixed_pairs: &'a [FixedPair],
    /// Most recently committed round, if any.
    pub previous: Option<&'a Round>,
    pub weights: &'a FairnessWeights,
    pub config: &'a EngineConfig,
}

impl RoundContext<'_> {
    pub fn rest_count(&self) -> usize {
        rest_count(self.roster.len(), self.courts)
    }

    pub fn previous_resting(&self) -> &[PlayerId] {
        self.previous.map_or(&[][..], |r| r.resting_players.as_slice())
    }
}

/// Outcome of one search slice.
#[derive(Clone, Debug, PartialEq)]
pub enum SearchStep {
    Pending { evaluated: usize },
    Done { round: Round, evaluated: usize },
}

/// In-flight search for one round.
#[derive(Debug)]
pub enum RoundSearch {
    /// Round decided without search (fixed first-round layouts).
    Ready(Option<Round>),
    Greedy(GreedySearch),
    Randomized(RandomizedSearch),
}

impl RoundSearch {
    /// Set up the search for the round described by `ctx`.
    pub fn begin(
        kind: StrategyKind,
        ctx: &RoundContext<'_>,
        state: &CumulativeState,
        rng: &mut StdRng,
    ) -> Result<Self, ScheduleError> {
        match kind {
            StrategyKind::Greedy => greedy::begin_round(ctx, state),
            StrategyKind::Randomized => Ok(randomized::begin_round(ctx, state, rng)),
        }
    }

    pub fn step(
        &mut self,
        state: &CumulativeState,
        cache: &mut TemplateCache,
        rng: &mut StdRng,
        budget: usize,
    ) -> Result<SearchStep, ScheduleError> {
        match self {
            RoundSearch::Ready(round) => match round.take() {
                Some(round) => Ok(SearchStep::Done { round, evaluated: 0 }),
                None => Err(ScheduleError::InvalidParameters(
                    "round search stepped after completion".to_string(),
                )),
            },
            RoundSearch::Greedy(search) => search.step(state, cache, budget),
            RoundSearch::Randomized(search) => search.step(state, rng, budget),
        }
    }

    /// Drive the search to completion in one go.
    pub fn run_to_end(
        &mut self,
        state: &CumulativeState,
        cache: &mut TemplateCache,
        rng: &mut StdRng,
    ) -> Result<(Round, u64), ScheduleError> {
        let mut total = 0u64;
        loop {
            match self.step(state, cache, rng, usize::MAX)? {
                SearchStep::Pending { evaluated } => total += evaluated as u64,
                SearchStep::Done { round, evaluated } => return Ok((round, total + evaluated as u64)),
            }
        }
    }
}

/// Trivial layout: the given players in order, four to a court, `(1,2)` vs `(3,4)`.
pub fn ascending_round(round_number: u32, playing: &[PlayerId], resting: Vec<PlayerId>) -> Round {
    let matches = playing
        .chunks_exact(4)
        .map(|c| crate::models::Match::from_players(c[0], c[1], c[2], c[3]))
        .collect();
    Round::new(round_number, matches, resting)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_ids_round_trip() {
        for kind in StrategyKind::ALL {
            assert_eq!(kind.id().parse::<StrategyKind>().unwrap(), kind);
        }
        assert!("simulated-annealing".parse::<StrategyKind>().is_err());
    }

    #[test]
    fn greedy_estimate_counts_resting_sets_and_templates() {
        let config = EngineConfig::default();
        // C(10, 2) = 45 resting sets, 315 templates for two courts, 7 rounds
        assert_eq!(
            StrategyKind::Greedy.estimate_total_evaluations(10, 2, 7, &config),
            45 * 315 * 7
        );
    }
}
