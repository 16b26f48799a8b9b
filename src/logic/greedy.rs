//! Greedy search: score every (resting set × canonical template) candidate, keep the minimum.
//!
//! Iteration order is the tiebreak: resting sets in lexicographic order, templates in canonical
//! emission order, and a candidate only replaces the best on a strictly lower score. The first
//! round of a run with no history stops at the first candidate that respects the fixed pairs.

use crate::logic::canonical::{TemplateCache, TemplateCursor};
use crate::logic::fairness::CumulativeState;
use crate::logic::resting::{
    all_resting_sets, fair_resting_sets, resting_candidates, splits_fixed_pair, Combinations,
};
use crate::logic::search::{ascending_round, RoundContext, RoundSearch, SearchStep};
use crate::models::{FairnessWeights, FixedPair, Match, PlayerId, Round, ScheduleError};

/// Set up the greedy search for one round (or decide the trivial first round outright).
pub fn begin_round(ctx: &RoundContext<'_>, state: &CumulativeState) -> Result<RoundSearch, ScheduleError> {
    let rest = ctx.rest_count();
    let first_round = state.rounds_committed() == 0;
    if first_round && rest == 0 && ctx.fixed_pairs.is_empty() {
        return Ok(RoundSearch::Ready(Some(ascending_round(
            ctx.round_number,
            ctx.roster,
            Vec::new(),
        ))));
    }

    // Narrowest source first: fair and disjoint from last round, then fair, then anything.
    let rest_of = |p| state.rest_count(p);
    let sources = [
        resting_candidates(ctx.roster, rest, rest_of, ctx.previous_resting()),
        fair_resting_sets(ctx.roster, rest, rest_of),
        all_resting_sets(ctx.roster, rest),
    ];
    let mut chosen = None;
    for (level, mut sets) in sources.into_iter().enumerate() {
        if let Some(first) = sets.find(|r| !splits_fixed_pair(r, ctx.fixed_pairs)) {
            match level {
                0 => {}
                1 => log::warn!(
                    "Round {}: every resting set avoiding last round's resters splits a fixed pair; allowing repeat rests",
                    ctx.round_number
                ),
                _ => log::warn!(
                    "Round {}: every fair resting set splits a fixed pair; widening to all resting sets",
                    ctx.round_number
                ),
            }
            chosen = Some((first, sets));
            break;
        }
    }
    let Some((first, resting_sets)) = chosen else {
        return Err(ScheduleError::ConstraintUnsatisfiable {
            round: ctx.round_number,
        });
    };

    Ok(RoundSearch::Greedy(GreedySearch {
        round_number: ctx.round_number,
        courts: ctx.courts,
        roster: ctx.roster.to_vec(),
        fixed_pairs: ctx.fixed_pairs.to_vec(),
        weights: *ctx.weights,
        first_match: first_round,
        next_resting: Some(first),
        resting_sets,
        scan: None,
        best: None,
        evaluated: 0,
    }))
}

/// Winning candidate so far. The template is copied out of the cursor when it is kept.
#[derive(Clone, Debug)]
struct Best {
    score: f64,
    template: Vec<usize>,
    playing: Vec<PlayerId>,
    resting: Vec<PlayerId>,
}

/// Template pass for one resting set.
#[derive(Debug)]
struct CandidateScan {
    resting: Vec<PlayerId>,
    /// Sorted; `playing[local]` is the player at template index `local`.
    playing: Vec<PlayerId>,
    /// Fixed pairs on court this round, as local indices.
    pinned: Vec<(usize, usize)>,
    cursor: TemplateCursor,
    partner: Vec<usize>,
}

impl CandidateScan {
    fn new(
        resting: Vec<PlayerId>,
        roster: &[PlayerId],
        courts: usize,
        fixed_pairs: &[FixedPair],
        cache: &mut TemplateCache,
    ) -> Result<Self, ScheduleError> {
        let playing: Vec<PlayerId> = roster.iter().copied().filter(|p| !resting.contains(p)).collect();
        let local = |p: PlayerId| playing.binary_search(&p).ok();
        let pinned = fixed_pairs
            .iter()
            .filter_map(|fp| Some((local(fp.player1)?, local(fp.player2)?)))
            .collect();
        let cursor = cache.templates(courts, playing.len())?;
        let partner = vec![0; playing.len()];
        Ok(Self {
            resting,
            playing,
            pinned,
            cursor,
            partner,
        })
    }
}

/// Every pinned pair must share a side of some court.
fn satisfies_fixed_pairs(template: &[usize], pinned: &[(usize, usize)], partner: &mut [usize]) -> bool {
    if pinned.is_empty() {
        return true;
    }
    for c in template.chunks_exact(4) {
        partner[c[0]] = c[1];
        partner[c[1]] = c[0];
        partner[c[2]] = c[3];
        partner[c[3]] = c[2];
    }
    pinned.iter().all(|&(a, b)| partner[a] == b)
}

/// In-flight greedy search for one round.
#[derive(Debug)]
pub struct GreedySearch {
    round_number: u32,
    courts: usize,
    roster: Vec<PlayerId>,
    fixed_pairs: Vec<FixedPair>,
    weights: FairnessWeights,
    first_match: bool,
    /// First acceptable resting set, found while choosing the source.
    next_resting: Option<Vec<PlayerId>>,
    /// Remaining resting sets, streamed; those splitting a fixed pair are skipped.
    resting_sets: Combinations,
    scan: Option<CandidateScan>,
    best: Option<Best>,
    evaluated: u64,
}

impl GreedySearch {
    pub fn step(
        &mut self,
        state: &CumulativeState,
        cache: &mut TemplateCache,
        budget: usize,
    ) -> Result<SearchStep, ScheduleError> {
        let mut evaluated = 0;
        while evaluated < budget {
            if self.scan.is_none() {
                let Some(resting) = self.next_resting_set() else {
                    return self.finish(evaluated);
                };
                self.scan = Some(CandidateScan::new(
                    resting,
                    &self.roster,
                    self.courts,
                    &self.fixed_pairs,
                    cache,
                )?);
            }
            let Some(scan) = self.scan.as_mut() else {
                continue;
            };

            let mut exhausted = false;
            let mut stop = false;
            match scan.cursor.next_template() {
                None => exhausted = true,
                Some(template) => {
                    evaluated += 1;
                    if satisfies_fixed_pairs(template, &scan.pinned, &mut scan.partner) {
                        let score =
                            state.evaluate_candidate(template, &scan.playing, &scan.resting, &self.weights);
                        if self.best.as_ref().map_or(true, |b| score < b.score) {
                            self.best = Some(Best {
                                score,
                                template: template.to_vec(),
                                playing: scan.playing.clone(),
                                resting: scan.resting.clone(),
                            });
                        }
                        stop = self.first_match;
                    }
                }
            }
            if exhausted {
                self.scan = None;
            }
            if stop {
                return self.finish(evaluated);
            }
        }
        self.evaluated += evaluated as u64;
        Ok(SearchStep::Pending { evaluated })
    }

    fn next_resting_set(&mut self) -> Option<Vec<PlayerId>> {
        if let Some(first) = self.next_resting.take() {
            return Some(first);
        }
        let fixed_pairs = &self.fixed_pairs;
        self.resting_sets.find(|r| !splits_fixed_pair(r, fixed_pairs))
    }

    fn finish(&mut self, evaluated: usize) -> Result<SearchStep, ScheduleError> {
        self.evaluated += evaluated as u64;
        let Some(best) = self.best.take() else {
            return Err(ScheduleError::ConstraintUnsatisfiable {
                round: self.round_number,
            });
        };
        log::debug!(
            "Round {}: greedy picked score {:.4} after {} candidate(s)",
            self.round_number,
            best.score,
            self.evaluated
        );
        let p = &best.playing;
        let matches = best
            .template
            .chunks_exact(4)
            .map(|c| Match::from_players(p[c[0]], p[c[1]], p[c[2]], p[c[3]]))
            .collect();
        Ok(SearchStep::Done {
            round: Round::new(self.round_number, matches, best.resting),
            evaluated,
        })
    }
}
