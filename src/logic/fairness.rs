//! Cumulative fairness state and the incremental evaluator.
//!
//! Pair, opponent and rest counts are kept with a running `(sum, sum of squares, population)`
//! triple each, so a standard deviation costs O(1) and scoring a candidate round costs
//! O(courts + resting) instead of O(players²).

use crate::models::{Evaluation, FairnessWeights, PlayerId, Round};

/// Symmetric player-by-player counter over dense roster indices. The diagonal stays 0.
#[derive(Clone, Debug, PartialEq)]
pub struct CountMatrix {
    size: usize,
    cells: Vec<u32>,
}

impl CountMatrix {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            cells: vec![0; size * size],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, i: usize, j: usize) -> u32 {
        self.cells[i * self.size + j]
    }

    /// Bump both directions and return the value before the bump.
    fn increment(&mut self, i: usize, j: usize) -> u32 {
        let old = self.cells[i * self.size + j];
        self.cells[i * self.size + j] = old + 1;
        self.cells[j * self.size + i] = old + 1;
        old
    }

    /// Upper-triangle values, one per unordered pair.
    pub fn pair_values(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.size).flat_map(move |i| ((i + 1)..self.size).map(move |j| self.get(i, j)))
    }
}

/// Running sum / sum of squares over a fixed population of counters.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct RunningStats {
    pub sum: u64,
    pub sum_sq: u64,
    pub population: u64,
}

impl RunningStats {
    pub fn new(population: u64) -> Self {
        Self {
            population,
            ..Self::default()
        }
    }

    /// Account for one counter going from `old` to `old + 1`: (v+1)² - v² = 2v + 1.
    fn record(&mut self, old: u32) {
        self.sum += 1;
        self.sum_sq += 2 * u64::from(old) + 1;
    }

    /// Population standard deviation; 0 for empty or singleton populations.
    pub fn std_dev(&self) -> f64 {
        if self.population <= 1 {
            return 0.0;
        }
        let n = self.population as f64;
        let mean = self.sum as f64 / n;
        let variance = self.sum_sq as f64 / n - mean * mean;
        variance.max(0.0).sqrt()
    }
}

/// Authoritative running fairness state for one generation run.
///
/// Only [`CumulativeState::commit`] mutates it; every `evaluate_*` method is read-only.
/// Players outside the roster are ignored, which is how retained rounds are restricted to the
/// current roster during suffix regeneration.
#[derive(Clone, Debug, PartialEq)]
pub struct CumulativeState {
    roster: Vec<PlayerId>,
    /// Dense index by player id.
    index: Vec<Option<usize>>,
    pair_counts: CountMatrix,
    oppo_counts: CountMatrix,
    rest_counts: Vec<u32>,
    pair_stats: RunningStats,
    oppo_stats: RunningStats,
    rest_stats: RunningStats,
    rounds_committed: usize,
}

impl CumulativeState {
    /// Fresh state for players `1..=players_count`.
    pub fn new(players_count: usize) -> Self {
        let roster: Vec<PlayerId> = (1..=players_count as PlayerId).collect();
        Self::for_roster(&roster)
    }

    /// Fresh state for an arbitrary roster of player ids.
    pub fn for_roster(roster: &[PlayerId]) -> Self {
        let mut roster = roster.to_vec();
        roster.sort_unstable();
        roster.dedup();
        let max_id = roster.last().copied().unwrap_or(0) as usize;
        let mut index = vec![None; max_id + 1];
        for (i, &p) in roster.iter().enumerate() {
            index[p as usize] = Some(i);
        }
        let n = roster.len();
        let pairs = (n * n.saturating_sub(1) / 2) as u64;
        Self {
            index,
            pair_counts: CountMatrix::new(n),
            oppo_counts: CountMatrix::new(n),
            rest_counts: vec![0; n],
            pair_stats: RunningStats::new(pairs),
            oppo_stats: RunningStats::new(pairs),
            rest_stats: RunningStats::new(n as u64),
            rounds_committed: 0,
            roster,
        }
    }

    /// State after committing `rounds` in order, restricted to `roster`.
    pub fn from_rounds(roster: &[PlayerId], rounds: &[Round]) -> Self {
        let mut state = Self::for_roster(roster);
        for round in rounds {
            state.commit(round);
        }
        state
    }

    pub fn roster(&self) -> &[PlayerId] {
        &self.roster
    }

    pub fn rounds_committed(&self) -> usize {
        self.rounds_committed
    }

    pub fn index_of(&self, player: PlayerId) -> Option<usize> {
        self.index.get(player as usize).copied().flatten()
    }

    pub fn pair_counts(&self) -> &CountMatrix {
        &self.pair_counts
    }

    pub fn oppo_counts(&self) -> &CountMatrix {
        &self.oppo_counts
    }

    pub fn rest_counts(&self) -> &[u32] {
        &self.rest_counts
    }

    pub fn pair_stats(&self) -> RunningStats {
        self.pair_stats
    }

    pub fn oppo_stats(&self) -> RunningStats {
        self.oppo_stats
    }

    pub fn rest_stats(&self) -> RunningStats {
        self.rest_stats
    }

    /// Rounds `a` and `b` were teammates (0 if either is unknown).
    pub fn pair_count(&self, a: PlayerId, b: PlayerId) -> u32 {
        match (self.index_of(a), self.index_of(b)) {
            (Some(i), Some(j)) if i != j => self.pair_counts.get(i, j),
            _ => 0,
        }
    }

    /// Rounds `a` and `b` faced each other (0 if either is unknown).
    pub fn oppo_count(&self, a: PlayerId, b: PlayerId) -> u32 {
        match (self.index_of(a), self.index_of(b)) {
            (Some(i), Some(j)) if i != j => self.oppo_counts.get(i, j),
            _ => 0,
        }
    }

    pub fn rest_count(&self, player: PlayerId) -> u32 {
        self.index_of(player).map_or(0, |i| self.rest_counts[i])
    }

    /// Fold a finished round into the counts.
    pub fn commit(&mut self, round: &Round) {
        for m in &round.matches {
            for pair in [m.pair_a, m.pair_b] {
                if let (Some(i), Some(j)) = (self.index_of(pair.player1), self.index_of(pair.player2)) {
                    let old = self.pair_counts.increment(i, j);
                    self.pair_stats.record(old);
                }
            }
            for (x, y) in m.opponents() {
                if let (Some(i), Some(j)) = (self.index_of(x), self.index_of(y)) {
                    let old = self.oppo_counts.increment(i, j);
                    self.oppo_stats.record(old);
                }
            }
        }
        for &p in &round.resting_players {
            if let Some(i) = self.index_of(p) {
                let old = self.rest_counts[i];
                self.rest_counts[i] = old + 1;
                self.rest_stats.record(old);
            }
        }
        self.rounds_committed += 1;
    }

    /// Score the round a template would produce, without touching the state.
    ///
    /// `player_map[local]` is the real id for template index `local`.
    pub fn evaluate_candidate(
        &self,
        template: &[usize],
        player_map: &[PlayerId],
        resting_players: &[PlayerId],
        weights: &FairnessWeights,
    ) -> f64 {
        let courts = template.chunks_exact(4).map(|c| {
            [
                player_map[c[0]],
                player_map[c[1]],
                player_map[c[2]],
                player_map[c[3]],
            ]
        });
        self.evaluate_courts(courts, resting_players, weights).total_score
    }

    /// Same as [`CumulativeState::evaluate_candidate`] for an already materialized round.
    pub fn evaluate_round(&self, round: &Round, weights: &FairnessWeights) -> Evaluation {
        self.evaluate_courts(
            round.matches.iter().map(|m| m.players()),
            &round.resting_players,
            weights,
        )
    }

    /// Current standard deviations and weighted score.
    pub fn evaluate(&self, weights: &FairnessWeights) -> Evaluation {
        Evaluation::new(
            self.pair_stats.std_dev(),
            self.oppo_stats.std_dev(),
            self.rest_stats.std_dev(),
            weights,
        )
    }

    /// Courts are `[a1, a2, b1, b2]`. Each pair and each cross-net combination occurs at most
    /// once per round, so reading old values straight from the matrices is exact.
    fn evaluate_courts(
        &self,
        courts: impl Iterator<Item = [PlayerId; 4]>,
        resting_players: &[PlayerId],
        weights: &FairnessWeights,
    ) -> Evaluation {
        let mut pair = self.pair_stats;
        let mut oppo = self.oppo_stats;
        let mut rest = self.rest_stats;

        for [a1, a2, b1, b2] in courts {
            let idx = [a1, a2, b1, b2].map(|p| self.index_of(p));
            for (x, y) in [(0, 1), (2, 3)] {
                if let (Some(i), Some(j)) = (idx[x], idx[y]) {
                    pair.record(self.pair_counts.get(i, j));
                }
            }
            for (x, y) in [(0, 2), (0, 3), (1, 2), (1, 3)] {
                if let (Some(i), Some(j)) = (idx[x], idx[y]) {
                    oppo.record(self.oppo_counts.get(i, j));
                }
            }
        }
        for &p in resting_players {
            if let Some(i) = self.index_of(p) {
                rest.record(self.rest_counts[i]);
            }
        }
        Evaluation::new(pair.std_dev(), oppo.std_dev(), rest.std_dev(), weights)
    }
}

/// Full (non-incremental) evaluation of a list of rounds over `roster`.
pub fn evaluate_schedule(roster: &[PlayerId], rounds: &[Round], weights: &FairnessWeights) -> Evaluation {
    CumulativeState::from_rounds(roster, rounds).evaluate(weights)
}
