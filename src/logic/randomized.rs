//! Randomized backtracking: fast approximate rounds with a fallback that always succeeds.
//!
//! Per round the resting set is drawn once, then three phases run until one yields a round:
//!
//! 1. **Strict**: shuffled court-by-court search where teammates have never paired and every
//!    cross-net combination has never met.
//! 2. **Relaxed**: opponents must still be fresh, teammates are only preferred fresh.
//! 3. **Scoring**: greedy argmin assignment that cannot fail; the best of all attempts by
//!    [`quick_evaluate`] wins.
//!
//! Fixed pairs on court are placed as whole sides. Each court takes a fixed pair for side A
//! while any remain, and also for side B when the remaining courts could not otherwise hold them.

use crate::config::RandomizedConfig;
use crate::logic::fairness::CumulativeState;
use crate::logic::resting::select_resting_single_draw;
use crate::logic::search::{ascending_round, RoundContext, RoundSearch, SearchStep};
use crate::models::{FixedPair, Match, Pair, PlayerId, Round, ScheduleError};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;

/// Set up the randomized search for one round.
pub fn begin_round(ctx: &RoundContext<'_>, state: &CumulativeState, rng: &mut StdRng) -> RoundSearch {
    let courts = ctx.courts;
    if state.rounds_committed() == 0 && ctx.fixed_pairs.is_empty() {
        let (playing, resting) = ctx.roster.split_at(courts * 4);
        return RoundSearch::Ready(Some(ascending_round(ctx.round_number, playing, resting.to_vec())));
    }

    let config = ctx.config.randomized.clone();
    let resting = select_resting_single_draw(
        ctx.roster,
        ctx.rest_count(),
        |p| state.rest_count(p),
        ctx.previous_resting(),
        ctx.fixed_pairs,
        config.consecutive_rest_penalty,
        rng,
    );
    let playing: Vec<PlayerId> = ctx.roster.iter().copied().filter(|p| !resting.contains(p)).collect();
    let pinned: Vec<FixedPair> = ctx
        .fixed_pairs
        .iter()
        .copied()
        .filter(|fp| playing.contains(&fp.player1) && playing.contains(&fp.player2))
        .collect();
    let solos: Vec<PlayerId> = playing
        .iter()
        .copied()
        .filter(|&p| !pinned.iter().any(|fp| fp.contains(p)))
        .collect();
    let previous_opponents: HashSet<(PlayerId, PlayerId)> = ctx
        .previous
        .map(|r| {
            r.matches
                .iter()
                .flat_map(|m| m.opponents())
                .map(|(x, y)| ordered(x, y))
                .collect()
        })
        .unwrap_or_default();

    RoundSearch::Randomized(RandomizedSearch {
        round_number: ctx.round_number,
        courts,
        resting,
        solos,
        pinned,
        previous_opponents,
        config,
        phase: Phase::Strict,
        attempt: 0,
        best: None,
    })
}

fn ordered(x: PlayerId, y: PlayerId) -> (PlayerId, PlayerId) {
    if x < y {
        (x, y)
    } else {
        (y, x)
    }
}

/// Which stage of the per-round search is running.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    Strict,
    Relaxed,
    Scoring,
}

/// In-flight randomized search for one round.
#[derive(Debug)]
pub struct RandomizedSearch {
    round_number: u32,
    courts: usize,
    resting: Vec<PlayerId>,
    /// Playing players that are not part of a fixed pair on court.
    solos: Vec<PlayerId>,
    pinned: Vec<FixedPair>,
    previous_opponents: HashSet<(PlayerId, PlayerId)>,
    config: RandomizedConfig,
    phase: Phase,
    attempt: usize,
    best: Option<(u64, Vec<Match>)>,
}

impl RandomizedSearch {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn resting(&self) -> &[PlayerId] {
        &self.resting
    }

    pub fn step(
        &mut self,
        state: &CumulativeState,
        rng: &mut StdRng,
        budget: usize,
    ) -> Result<SearchStep, ScheduleError> {
        let mut evaluated = 0;
        while evaluated < budget {
            match self.phase {
                Phase::Strict | Phase::Relaxed => {
                    if self.attempt >= self.config.max_attempts {
                        self.phase = if self.phase == Phase::Strict {
                            Phase::Relaxed
                        } else {
                            log::warn!("Round {}: backtracking exhausted, scoring fallback", self.round_number);
                            Phase::Scoring
                        };
                        self.attempt = 0;
                        continue;
                    }
                    self.attempt += 1;
                    evaluated += 1;
                    let relaxed = self.phase == Phase::Relaxed;
                    if let Some(matches) = self.try_backtracking(state, rng, relaxed) {
                        log::debug!(
                            "Round {}: {:?} phase succeeded on attempt {}",
                            self.round_number,
                            self.phase,
                            self.attempt
                        );
                        return Ok(self.done(matches, evaluated));
                    }
                }
                Phase::Scoring => {
                    if self.attempt >= self.config.max_attempts.max(1) {
                        let Some((score, matches)) = self.best.take() else {
                            return Err(ScheduleError::ConstraintUnsatisfiable {
                                round: self.round_number,
                            });
                        };
                        log::debug!("Round {}: scoring fallback kept quick score {score}", self.round_number);
                        return Ok(self.done(matches, evaluated));
                    }
                    self.attempt += 1;
                    evaluated += 1;
                    if let Some(matches) = self.try_scoring(state, rng) {
                        let score = quick_evaluate(&matches, state, &self.previous_opponents, &self.config);
                        if self.best.as_ref().map_or(true, |(b, _)| score < *b) {
                            self.best = Some((score, matches));
                        }
                    }
                }
            }
        }
        Ok(SearchStep::Pending { evaluated })
    }

    fn done(&self, matches: Vec<Match>, evaluated: usize) -> SearchStep {
        SearchStep::Done {
            round: Round::new(self.round_number, matches, self.resting.clone()),
            evaluated,
        }
    }

    /// One shuffled Phase 1 / Phase 1.5 trial. `None` if some court cannot be filled.
    fn try_backtracking(&self, state: &CumulativeState, rng: &mut StdRng, relaxed: bool) -> Option<Vec<Match>> {
        let mut pinned = self.pinned.clone();
        pinned.shuffle(rng);
        let mut solos = self.solos.clone();
        solos.shuffle(rng);

        let mut matches = Vec::with_capacity(self.courts);
        for court in 0..self.courts {
            let courts_after = self.courts - court - 1;
            let m = if let Some(side_a) = pinned.pop() {
                let side_b = if pinned.len() > courts_after {
                    let idx = pinned
                        .iter()
                        .position(|b| fresh_against(state, side_a.members(), b.player1, b.player2))?;
                    pinned.remove(idx)
                } else {
                    let (p3, p4) = pick_side_b(state, side_a.members(), &solos, relaxed)?;
                    solos.retain(|&p| p != p3 && p != p4);
                    Pair::new(p3, p4)
                };
                Match::new(side_a, side_b)
            } else {
                let (p1, p2, p3, p4) = solo_court(state, &solos, relaxed)?;
                solos.retain(|&p| p != p1 && p != p2 && p != p3 && p != p4);
                Match::from_players(p1, p2, p3, p4)
            };
            matches.push(m);
        }
        Some(matches)
    }

    /// One Phase 2 trial: argmin assignment court by court.
    fn try_scoring(&self, state: &CumulativeState, rng: &mut StdRng) -> Option<Vec<Match>> {
        let mut pinned = self.pinned.clone();
        pinned.shuffle(rng);
        let mut solos = self.solos.clone();
        solos.shuffle(rng);
        let penalty = u64::from(self.config.consecutive_opponent_penalty);
        let repeat_penalty = |side: [PlayerId; 2], x: PlayerId| -> u64 {
            side.iter()
                .filter(|&&a| self.previous_opponents.contains(&ordered(a, x)))
                .count() as u64
                * penalty
        };
        let against = |side: [PlayerId; 2], x: PlayerId| -> u64 {
            u64::from(state.oppo_count(side[0], x)) + u64::from(state.oppo_count(side[1], x))
        };

        let mut matches = Vec::with_capacity(self.courts);
        for court in 0..self.courts {
            let courts_after = self.courts - court - 1;
            let side_a = match pinned.pop() {
                Some(fp) => fp,
                None => {
                    let p1 = solos.pop()?;
                    let i = argmin_random(&solos, rng, |x| u64::from(state.pair_count(p1, x)))?;
                    Pair::new(p1, solos.swap_remove(i))
                }
            };
            let a = side_a.members();
            let side_b = if pinned.len() > courts_after {
                let i = argmin_random(&pinned, rng, |b| {
                    b.members()
                        .iter()
                        .map(|&x| against(a, x) + repeat_penalty(a, x))
                        .sum()
                })?;
                pinned.swap_remove(i)
            } else {
                let i = argmin_random(&solos, rng, |x| against(a, x) + repeat_penalty(a, x))?;
                let p3 = solos.swap_remove(i);
                let j = argmin_random(&solos, rng, |x| {
                    against(a, x) + u64::from(state.pair_count(p3, x)) + repeat_penalty(a, x)
                })?;
                Pair::new(p3, solos.swap_remove(j))
            };
            matches.push(Match::new(side_a, side_b));
        }
        Some(matches)
    }
}

/// `x` and `y` have never faced anyone on `side`.
fn fresh_against(state: &CumulativeState, side: [PlayerId; 2], x: PlayerId, y: PlayerId) -> bool {
    [x, y]
        .iter()
        .all(|&p| side.iter().all(|&s| state.oppo_count(s, p) == 0))
}

/// Opposing pair for `side` from `pool`: both must be fresh opponents of `side`.
/// Strict: the pair must never have teamed up. Relaxed: least-teamed `p4` for the first workable `p3`.
fn pick_side_b(
    state: &CumulativeState,
    side: [PlayerId; 2],
    pool: &[PlayerId],
    relaxed: bool,
) -> Option<(PlayerId, PlayerId)> {
    let fresh: Vec<PlayerId> = pool
        .iter()
        .copied()
        .filter(|&x| !side.contains(&x) && side.iter().all(|&s| state.oppo_count(s, x) == 0))
        .collect();
    for &p3 in &fresh {
        let others = fresh.iter().copied().filter(|&p4| p4 != p3);
        let p4 = if relaxed {
            others.min_by_key(|&p4| state.pair_count(p3, p4))
        } else {
            others.into_iter().find(|&p4| state.pair_count(p3, p4) == 0)
        };
        if let Some(p4) = p4 {
            return Some((p3, p4));
        }
    }
    None
}

/// DFS over a court made only of solo players, in pool order.
fn solo_court(
    state: &CumulativeState,
    pool: &[PlayerId],
    relaxed: bool,
) -> Option<(PlayerId, PlayerId, PlayerId, PlayerId)> {
    for &p1 in pool {
        let mut partners: Vec<PlayerId> = pool
            .iter()
            .copied()
            .filter(|&p2| p2 != p1 && (relaxed || state.pair_count(p1, p2) == 0))
            .collect();
        if relaxed {
            partners.sort_by_key(|&p2| state.pair_count(p1, p2));
        }
        for p2 in partners {
            let rest: Vec<PlayerId> = pool.iter().copied().filter(|&p| p != p1 && p != p2).collect();
            if let Some((p3, p4)) = pick_side_b(state, [p1, p2], &rest, relaxed) {
                return Some((p1, p2, p3, p4));
            }
        }
    }
    None
}

/// Index of the minimum of `key` over `items`, ties broken uniformly at random.
fn argmin_random<T: Copy, R: Rng + ?Sized>(items: &[T], rng: &mut R, key: impl Fn(T) -> u64) -> Option<usize> {
    items
        .iter()
        .enumerate()
        .map(|(i, &item)| (key(item), rng.gen::<u32>(), i))
        .min()
        .map(|(_, _, i)| i)
}

/// Cheap round score: worst single repeat first, then the raw history total.
///
/// Sums existing pair and opponent counts over the round, adds the consecutive-opponent penalty
/// for every cross-net combination that also met last round, and weights the largest single pair
/// and opponent counts by `worst_case_weight`.
pub fn quick_evaluate(
    matches: &[Match],
    state: &CumulativeState,
    previous_opponents: &HashSet<(PlayerId, PlayerId)>,
    config: &RandomizedConfig,
) -> u64 {
    let mut raw = 0u64;
    let mut pair_max = 0u32;
    let mut oppo_max = 0u32;
    let mut penalty = 0u64;
    for m in matches {
        for pair in [m.pair_a, m.pair_b] {
            let c = state.pair_count(pair.player1, pair.player2);
            raw += u64::from(c);
            pair_max = pair_max.max(c);
        }
        for (x, y) in m.opponents() {
            let c = state.oppo_count(x, y);
            raw += u64::from(c);
            oppo_max = oppo_max.max(c);
            if previous_opponents.contains(&ordered(x, y)) {
                penalty += u64::from(config.consecutive_opponent_penalty);
            }
        }
    }
    let weight = u64::from(config.worst_case_weight);
    u64::from(pair_max) * weight + u64::from(oppo_max) * weight + raw + penalty
}
