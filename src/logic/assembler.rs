//! Schedule assembly: drive a strategy round by round, carry history forward, build the Schedule.
//!
//! Three modes share one run loop:
//! - fresh generation ([`ScheduleGenerator::generate`]),
//! - async generation with progress and cooperative cancellation
//!   ([`ScheduleGenerator::generate_async`]),
//! - suffix regeneration after a roster change ([`ScheduleGenerator::regenerate_suffix`]).

use crate::config::EngineConfig;
use crate::logic::canonical::TemplateCache;
use crate::logic::fairness::CumulativeState;
use crate::logic::search::{RoundContext, RoundSearch, SearchStep, StrategyKind};
use crate::models::{
    FairnessWeights, FixedPair, GenerationState, Pair, PlayerId, Round, Schedule, ScheduleError,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Parameters for a fresh schedule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub courts_count: usize,
    pub players_count: usize,
    pub rounds_count: usize,
    #[serde(default)]
    pub weights: FairnessWeights,
    #[serde(default)]
    pub fixed_pairs: Vec<FixedPair>,
    #[serde(default)]
    pub strategy: StrategyKind,
    /// Random seed for reproducibility (None = entropy).
    #[serde(default)]
    pub seed: Option<u64>,
}

impl GenerationParams {
    pub fn new(courts_count: usize, players_count: usize, rounds_count: usize) -> Self {
        Self {
            courts_count,
            players_count,
            rounds_count,
            weights: FairnessWeights::default(),
            fixed_pairs: Vec::new(),
            strategy: StrategyKind::default(),
            seed: None,
        }
    }

    pub fn with_weights(mut self, weights: FairnessWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_fixed_pairs(mut self, fixed_pairs: Vec<FixedPair>) -> Self {
        self.fixed_pairs = fixed_pairs;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Parameters for regenerating the unplayed rounds of an existing schedule.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SuffixParams {
    pub courts_count: usize,
    /// Rounds already played; copied into the result unchanged.
    pub completed_rounds: Vec<Round>,
    pub active_players: Vec<PlayerId>,
    pub remaining_rounds: usize,
    #[serde(default)]
    pub weights: FairnessWeights,
    #[serde(default)]
    pub fixed_pairs: Vec<FixedPair>,
    #[serde(default)]
    pub strategy: StrategyKind,
    #[serde(default)]
    pub seed: Option<u64>,
}

impl SuffixParams {
    pub fn new(
        courts_count: usize,
        completed_rounds: Vec<Round>,
        active_players: Vec<PlayerId>,
        remaining_rounds: usize,
    ) -> Self {
        Self {
            courts_count,
            completed_rounds,
            active_players,
            remaining_rounds,
            weights: FairnessWeights::default(),
            fixed_pairs: Vec::new(),
            strategy: StrategyKind::default(),
            seed: None,
        }
    }

    pub fn with_weights(mut self, weights: FairnessWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn with_fixed_pairs(mut self, fixed_pairs: Vec<FixedPair>) -> Self {
        self.fixed_pairs = fixed_pairs;
        self
    }

    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Progress snapshot passed to the progress callback.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Progress {
    pub current_evaluations: u64,
    pub total_evaluations: u64,
    pub percentage: f64,
    pub current_round: u32,
    pub total_rounds: u32,
}

/// Cooperative cancellation flag, shared between the caller and a running generation.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

type ProgressFn<'a> = Box<dyn FnMut(&Progress) + Send + 'a>;
type RoundFn<'a> = Box<dyn FnMut(&[Round]) + Send + 'a>;

/// Callbacks and cancellation for async generation.
#[derive(Default)]
pub struct GenerationHooks<'a> {
    pub cancel: CancelToken,
    on_progress: Option<ProgressFn<'a>>,
    on_round: Option<RoundFn<'a>>,
}

impl<'a> GenerationHooks<'a> {
    pub fn new(cancel: CancelToken) -> Self {
        Self {
            cancel,
            on_progress: None,
            on_round: None,
        }
    }

    /// Called after every batch of evaluations and at every round completion.
    pub fn with_progress(mut self, f: impl FnMut(&Progress) + Send + 'a) -> Self {
        self.on_progress = Some(Box::new(f));
        self
    }

    /// Called with all rounds so far (retained and new) whenever a round is committed.
    pub fn with_round_callback(mut self, f: impl FnMut(&[Round]) + Send + 'a) -> Self {
        self.on_round = Some(Box::new(f));
        self
    }

    fn progress(&mut self, progress: Progress) {
        if let Some(f) = self.on_progress.as_mut() {
            f(&progress);
        }
    }

    fn round_completed(&mut self, rounds: &[Round]) {
        if let Some(f) = self.on_round.as_mut() {
            f(rounds);
        }
    }
}

/// State of one generation run.
struct Run {
    strategy: StrategyKind,
    courts: usize,
    roster: Vec<PlayerId>,
    /// Fixed pairs as given (kept on the schedule).
    fixed_pairs: Vec<FixedPair>,
    /// Fixed pairs with both members in the roster.
    active_pairs: Vec<FixedPair>,
    weights: FairnessWeights,
    state: CumulativeState,
    /// Retained rounds first, then generated ones.
    rounds: Vec<Round>,
    /// Round numbers still to fill, in order.
    slots: Vec<u32>,
    rng: StdRng,
    evaluations: u64,
    total_evaluations: u64,
    total_rounds: u32,
}

impl Run {
    fn commit(&mut self, round: Round) {
        self.state.commit(&round);
        log::debug!(
            "Committed round {} (score now {:.4})",
            round.round_number,
            self.state.evaluate(&self.weights).total_score
        );
        self.rounds.push(round);
    }

    fn progress(&self, current_round: u32) -> Progress {
        let percentage = if self.total_evaluations == 0 {
            100.0
        } else {
            (self.evaluations as f64 / self.total_evaluations as f64 * 100.0).min(100.0)
        };
        Progress {
            current_evaluations: self.evaluations,
            total_evaluations: self.total_evaluations,
            percentage,
            current_round,
            total_rounds: self.total_rounds,
        }
    }

    fn finish(self) -> Schedule {
        let evaluation = self.state.evaluate(&self.weights);
        log::info!(
            "Generated {} round(s) with {} strategy: score {:.4} (pair {:.4}, opponent {:.4}, rest {:.4})",
            self.rounds.len(),
            self.strategy,
            evaluation.total_score,
            evaluation.pair_std_dev,
            evaluation.oppo_std_dev,
            evaluation.rest_std_dev
        );
        Schedule::new(self.courts, self.rounds, evaluation, self.fixed_pairs, self.roster)
    }
}

/// Round generator. Owns the canonical-template cache, which outlives individual runs.
#[derive(Debug)]
pub struct ScheduleGenerator {
    config: EngineConfig,
    cache: TemplateCache,
}

impl Default for ScheduleGenerator {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl ScheduleGenerator {
    pub fn new(config: EngineConfig) -> Self {
        let cache = TemplateCache::new(config.materialize_limit);
        Self { config, cache }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &TemplateCache {
        &self.cache
    }

    /// Closed-form evaluation count for progress bars; not needed for correctness.
    pub fn estimate_total_evaluations(
        &self,
        strategy: StrategyKind,
        players_count: usize,
        courts_count: usize,
        rounds_count: usize,
    ) -> u64 {
        strategy.estimate_total_evaluations(players_count, courts_count, rounds_count, &self.config)
    }

    /// Build a fresh schedule synchronously.
    pub fn generate(&mut self, params: &GenerationParams) -> Result<Schedule, ScheduleError> {
        let run = self.fresh_run(params)?;
        self.drive(run)
    }

    /// Build a fresh schedule, suspending every `batch_size` evaluations. The count runs across
    /// rounds, and a round decided without search counts as one evaluation.
    pub async fn generate_async(
        &mut self,
        params: &GenerationParams,
        hooks: GenerationHooks<'_>,
    ) -> Result<Schedule, ScheduleError> {
        let run = self.fresh_run(params)?;
        self.drive_async(run, hooks).await
    }

    /// Keep `completed_rounds`, rebuild history from them for the new roster, and generate the rest.
    pub fn regenerate_suffix(&mut self, params: &SuffixParams) -> Result<Schedule, ScheduleError> {
        let run = self.suffix_run(params)?;
        self.drive(run)
    }

    pub async fn regenerate_suffix_async(
        &mut self,
        params: &SuffixParams,
        hooks: GenerationHooks<'_>,
    ) -> Result<Schedule, ScheduleError> {
        let run = self.suffix_run(params)?;
        self.drive_async(run, hooks).await
    }

    fn fresh_run(&self, params: &GenerationParams) -> Result<Run, ScheduleError> {
        if params.courts_count == 0 {
            return Err(ScheduleError::InvalidParameters("need at least one court".to_string()));
        }
        if params.rounds_count == 0 {
            return Err(ScheduleError::InvalidParameters("need at least one round".to_string()));
        }
        let required = params.courts_count * 4;
        if params.players_count < required {
            return Err(ScheduleError::InsufficientPlayers {
                required,
                available: params.players_count,
            });
        }
        let fixed_pairs = validate_fixed_pairs(&params.fixed_pairs, Some(params.players_count))?;
        let roster: Vec<PlayerId> = (1..=params.players_count as PlayerId).collect();
        let slots = (1..=params.rounds_count as u32).collect();

        log::info!(
            "Generating {} round(s): {} players on {} court(s), {} strategy, {} fixed pair(s)",
            params.rounds_count,
            params.players_count,
            params.courts_count,
            params.strategy,
            fixed_pairs.len()
        );
        Ok(self.new_run(
            params.strategy,
            params.courts_count,
            roster,
            fixed_pairs,
            params.weights,
            Vec::new(),
            slots,
            params.seed,
        ))
    }

    fn suffix_run(&self, params: &SuffixParams) -> Result<Run, ScheduleError> {
        if params.courts_count == 0 {
            return Err(ScheduleError::InvalidParameters("need at least one court".to_string()));
        }
        let mut roster = params.active_players.clone();
        roster.sort_unstable();
        roster.dedup();
        let required = params.courts_count * 4;
        if roster.len() < required {
            return Err(ScheduleError::InsufficientPlayers {
                required,
                available: roster.len(),
            });
        }
        let fixed_pairs = validate_fixed_pairs(&params.fixed_pairs, None)?;

        let mut retained = params.completed_rounds.clone();
        retained.sort_by_key(|r| r.round_number);
        let used: HashSet<u32> = retained.iter().map(|r| r.round_number).collect();
        let slots: Vec<u32> = (1u32..)
            .filter(|n| !used.contains(n))
            .take(params.remaining_rounds)
            .collect();

        log::info!(
            "Regenerating {} round(s) after {} completed: {} active players on {} court(s), {} strategy",
            params.remaining_rounds,
            retained.len(),
            roster.len(),
            params.courts_count,
            params.strategy
        );
        Ok(self.new_run(
            params.strategy,
            params.courts_count,
            roster,
            fixed_pairs,
            params.weights,
            retained,
            slots,
            params.seed,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    fn new_run(
        &self,
        strategy: StrategyKind,
        courts: usize,
        roster: Vec<PlayerId>,
        fixed_pairs: Vec<FixedPair>,
        weights: FairnessWeights,
        retained: Vec<Round>,
        slots: Vec<u32>,
        seed: Option<u64>,
    ) -> Run {
        let state = CumulativeState::from_rounds(&roster, &retained);
        let active_pairs = fixed_pairs
            .iter()
            .copied()
            .filter(|fp| roster.contains(&fp.player1) && roster.contains(&fp.player2))
            .collect();
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let total_evaluations =
            self.estimate_total_evaluations(strategy, roster.len(), courts, slots.len());
        let total_rounds = (retained.len() + slots.len()) as u32;
        Run {
            strategy,
            courts,
            roster,
            fixed_pairs,
            active_pairs,
            weights,
            state,
            rounds: retained,
            slots,
            rng,
            evaluations: 0,
            total_evaluations,
            total_rounds,
        }
    }

    fn drive(&mut self, mut run: Run) -> Result<Schedule, ScheduleError> {
        let slots = run.slots.clone();
        for round_number in slots {
            let mut search = begin_round(&mut run, round_number, &self.config)?;
            let (round, evaluated) = search.run_to_end(&run.state, &mut self.cache, &mut run.rng)?;
            run.evaluations += evaluated;
            run.commit(round);
        }
        Ok(run.finish())
    }

    async fn drive_async(&mut self, mut run: Run, mut hooks: GenerationHooks<'_>) -> Result<Schedule, ScheduleError> {
        let batch = self.config.batch_size.max(1);
        let slots = run.slots.clone();
        // Evaluations since the last suspension; carried across rounds.
        let mut since_yield = 0usize;
        for round_number in slots {
            if hooks.cancel.is_cancelled() {
                return Err(cancelled(run));
            }
            let mut search = begin_round(&mut run, round_number, &self.config)?;
            loop {
                let budget = batch - since_yield;
                let round_done = match search.step(&run.state, &mut self.cache, &mut run.rng, budget)? {
                    SearchStep::Pending { evaluated } => {
                        run.evaluations += evaluated as u64;
                        since_yield += evaluated;
                        false
                    }
                    SearchStep::Done { round, evaluated } => {
                        run.evaluations += evaluated as u64;
                        // a round decided without search still counts toward the batch
                        since_yield += evaluated.max(1);
                        run.commit(round);
                        hooks.progress(run.progress(round_number));
                        hooks.round_completed(&run.rounds);
                        true
                    }
                };
                if since_yield >= batch {
                    since_yield = 0;
                    if !round_done {
                        hooks.progress(run.progress(round_number));
                    }
                    tokio::task::yield_now().await;
                    if hooks.cancel.is_cancelled() {
                        return Err(cancelled(run));
                    }
                }
                if round_done {
                    break;
                }
            }
        }
        Ok(run.finish())
    }
}

fn begin_round(run: &mut Run, round_number: u32, config: &EngineConfig) -> Result<RoundSearch, ScheduleError> {
    let ctx = RoundContext {
        round_number,
        courts: run.courts,
        roster: &run.roster,
        fixed_pairs: &run.active_pairs,
        previous: run.rounds.last(),
        weights: &run.weights,
        config,
    };
    RoundSearch::begin(run.strategy, &ctx, &run.state, &mut run.rng)
}

fn cancelled(run: Run) -> ScheduleError {
    log::info!("Generation cancelled with {} round(s) committed", run.rounds.len());
    ScheduleError::Cancelled {
        completed_rounds: run.rounds,
    }
}

/// Normalize fixed pairs and reject self-pairs, out-of-range members and overlapping pairs.
fn validate_fixed_pairs(pairs: &[FixedPair], players_count: Option<usize>) -> Result<Vec<FixedPair>, ScheduleError> {
    let mut seen = HashSet::new();
    let mut out = Vec::with_capacity(pairs.len());
    for raw in pairs {
        let pair = Pair::new(raw.player1, raw.player2);
        let invalid = |reason: &str| ScheduleError::InvalidFixedPair {
            pair,
            reason: reason.to_string(),
        };
        if pair.player1 == pair.player2 {
            return Err(invalid("a player cannot be paired with themselves"));
        }
        if pair.player1 == 0 {
            return Err(invalid("player ids start at 1"));
        }
        if let Some(n) = players_count {
            if pair.player2 as usize > n {
                return Err(invalid("member outside the player range"));
            }
        }
        if !seen.insert(pair.player1) || !seen.insert(pair.player2) {
            return Err(invalid("player already belongs to another fixed pair"));
        }
        out.push(pair);
    }
    Ok(out)
}

/// What a [`GenerationSession`] should run.
#[derive(Clone, Debug)]
pub enum GenerationJob {
    Fresh(GenerationParams),
    Suffix(SuffixParams),
}

/// One caller's generation session: at most one run in flight, tracked through
/// [`GenerationState`].
///
/// [`GenerationSession::start`] hands out the token for the next run and cancels the previous
/// one, so a run abandoned mid-flight can never keep mutating shared state.
#[derive(Debug, Default)]
pub struct GenerationSession {
    generator: ScheduleGenerator,
    state: GenerationState,
    active: Option<CancelToken>,
    partial_rounds: Vec<Round>,
}

impl GenerationSession {
    pub fn new(generator: ScheduleGenerator) -> Self {
        Self {
            generator,
            ..Self::default()
        }
    }

    pub fn state(&self) -> GenerationState {
        self.state
    }

    /// Rounds kept from the last cancelled run.
    pub fn partial_rounds(&self) -> &[Round] {
        &self.partial_rounds
    }

    pub fn generator(&self) -> &ScheduleGenerator {
        &self.generator
    }

    /// Cancel whatever run is in flight and hand out the token for the next one.
    pub fn start(&mut self) -> CancelToken {
        if let Some(previous) = self.active.take() {
            if self.state == GenerationState::Running {
                log::info!("Cancelling previous generation before starting a new one");
            }
            previous.cancel();
        }
        let token = CancelToken::new();
        self.active = Some(token.clone());
        self.state = GenerationState::Running;
        self.partial_rounds.clear();
        token
    }

    /// Cancel the run in flight, if any.
    pub fn cancel(&self) {
        if let Some(token) = &self.active {
            token.cancel();
        }
    }

    /// Run `job` under the token from the latest [`GenerationSession::start`] (starting one if
    /// no run is pending). Any cancel token inside `hooks` is replaced by the session's.
    pub async fn run(&mut self, job: GenerationJob, hooks: GenerationHooks<'_>) -> Result<Schedule, ScheduleError> {
        let token = match (&self.active, self.state) {
            (Some(token), GenerationState::Running) => token.clone(),
            _ => self.start(),
        };
        let hooks = GenerationHooks { cancel: token, ..hooks };
        let result = match &job {
            GenerationJob::Fresh(params) => self.generator.generate_async(params, hooks).await,
            GenerationJob::Suffix(params) => self.generator.regenerate_suffix_async(params, hooks).await,
        };
        self.active = None;
        match &result {
            Ok(_) => self.state = GenerationState::Completed,
            Err(ScheduleError::Cancelled { completed_rounds }) => {
                self.state = GenerationState::Cancelled;
                self.partial_rounds = completed_rounds.clone();
            }
            Err(e) => {
                log::warn!("Generation failed: {e}");
                self.state = GenerationState::Failed;
                self.partial_rounds.clear();
            }
        }
        result
    }
}
