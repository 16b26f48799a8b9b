//! Integration tests for the randomized strategy: partition invariant, phase fallback, rest fairness.

use doubles_scheduler::logic::{
    CumulativeState, Phase, RoundContext, RoundSearch, SearchStep, TemplateCache,
};
use doubles_scheduler::{
    EngineConfig, FairnessWeights, GenerationParams, Match, Pair, Round, ScheduleGenerator, StrategyKind,
};
use rand::rngs::StdRng;
use rand::SeedableRng;

fn randomized(courts: usize, players: usize, rounds: usize, seed: u64) -> GenerationParams {
    GenerationParams::new(courts, players, rounds)
        .with_strategy(StrategyKind::Randomized)
        .with_seed(seed)
}

fn roster(n: u32) -> Vec<u32> {
    (1..=n).collect()
}

#[test]
fn every_round_partitions_the_roster() {
    let mut generator = ScheduleGenerator::default();
    for (courts, players) in [(1, 4), (1, 7), (2, 8), (2, 11), (3, 14)] {
        let schedule = generator.generate(&randomized(courts, players, 12, 42)).unwrap();
        assert_eq!(schedule.rounds.len(), 12);
        for round in &schedule.rounds {
            round.validate(&roster(players as u32)).unwrap();
            assert_eq!(round.matches.len(), courts);
            assert_eq!(round.resting_players.len(), players - courts * 4);
        }
    }
}

#[test]
fn first_round_without_fixed_pairs_is_ascending() {
    let schedule = ScheduleGenerator::default().generate(&randomized(2, 10, 1, 7)).unwrap();
    let first = &schedule.rounds[0];
    assert_eq!(
        first.matches,
        vec![Match::from_players(1, 2, 3, 4), Match::from_players(5, 6, 7, 8)]
    );
    assert_eq!(first.resting_players, vec![9, 10]);
}

#[test]
fn same_seed_same_schedule() {
    let a = ScheduleGenerator::default().generate(&randomized(2, 10, 8, 1234)).unwrap();
    let b = ScheduleGenerator::default().generate(&randomized(2, 10, 8, 1234)).unwrap();
    assert_eq!(a.rounds, b.rounds);
}

#[test]
fn one_rest_per_round_rotates_evenly() {
    let schedule = ScheduleGenerator::default().generate(&randomized(1, 5, 40, 3)).unwrap();
    let mut rests = [0u32; 5];
    for round in &schedule.rounds {
        assert_eq!(round.resting_players.len(), 1);
        rests[round.resting_players[0] as usize - 1] += 1;
        let max = rests.iter().max().unwrap();
        let min = rests.iter().min().unwrap();
        assert!(max - min <= 1, "rests {rests:?} after round {}", round.round_number);
    }
    assert_eq!(rests, [8; 5]);
}

#[test]
fn fixed_pairs_are_placed_as_sides() {
    let pairs = vec![Pair::new(1, 2), Pair::new(3, 4), Pair::new(5, 6)];
    let params = randomized(2, 11, 15, 21).with_fixed_pairs(pairs.clone());
    let schedule = ScheduleGenerator::default().generate(&params).unwrap();
    for round in &schedule.rounds {
        round.validate(&roster(11)).unwrap();
        for fp in &pairs {
            assert_eq!(round.is_resting(fp.player1), round.is_resting(fp.player2));
            if !round.is_resting(fp.player1) {
                assert_eq!(round.partner_of(fp.player1), Some(fp.player2), "round {}", round.round_number);
            }
        }
    }
}

#[test]
fn three_fixed_pairs_on_two_courts_meet_each_other() {
    // six pinned players and two solos on eight seats: one court must be pair against pair
    let pairs = vec![Pair::new(1, 2), Pair::new(3, 4), Pair::new(5, 6)];
    let params = randomized(2, 8, 6, 8).with_fixed_pairs(pairs.clone());
    let schedule = ScheduleGenerator::default().generate(&params).unwrap();
    for round in &schedule.rounds {
        round.validate(&roster(8)).unwrap();
        for fp in &pairs {
            assert_eq!(round.partner_of(fp.player1), Some(fp.player2));
        }
    }
}

#[test]
fn scoring_phase_completes_saturated_history() {
    // after these two rounds every player has faced every other, so no fresh opponents exist
    let players = roster(4);
    let history = vec![
        Round::new(1, vec![Match::from_players(1, 2, 3, 4)], vec![]),
        Round::new(2, vec![Match::from_players(1, 3, 2, 4)], vec![]),
    ];
    let state = CumulativeState::from_rounds(&players, &history);
    let mut config = EngineConfig::default();
    config.randomized.max_attempts = 3;
    let weights = FairnessWeights::default();
    let ctx = RoundContext {
        round_number: 3,
        courts: 1,
        roster: &players,
        fixed_pairs: &[],
        previous: history.last(),
        weights: &weights,
        config: &config,
    };
    let mut rng = StdRng::seed_from_u64(17);
    let mut cache = TemplateCache::default();
    let mut search = RoundSearch::begin(StrategyKind::Randomized, &ctx, &state, &mut rng).unwrap();

    let mut phases = Vec::new();
    let round = loop {
        if let RoundSearch::Randomized(s) = &search {
            phases.push(s.phase());
        }
        match search.step(&state, &mut cache, &mut rng, 1).unwrap() {
            SearchStep::Pending { evaluated } => assert!(evaluated <= 1),
            SearchStep::Done { round, .. } => break round,
        }
    };
    assert!(phases.contains(&Phase::Relaxed));
    assert!(phases.contains(&Phase::Scoring));
    round.validate(&players).unwrap();
    assert_eq!(round.round_number, 3);
}

#[test]
fn long_runs_never_fail() {
    let mut config = EngineConfig::default();
    config.randomized.max_attempts = 2;
    let mut generator = ScheduleGenerator::new(config);
    let params = randomized(2, 9, 60, 5).with_fixed_pairs(vec![Pair::new(2, 7)]);
    let schedule = generator.generate(&params).unwrap();
    assert_eq!(schedule.rounds.len(), 60);
    for round in &schedule.rounds {
        round.validate(&roster(9)).unwrap();
    }
}

#[test]
fn drawn_resting_set_is_the_rounds_resting_set() {
    let players = roster(7);
    let history = vec![Round::new(1, vec![Match::from_players(1, 2, 3, 4)], vec![5, 6, 7])];
    let state = CumulativeState::from_rounds(&players, &history);
    let config = EngineConfig::default();
    let weights = FairnessWeights::default();
    let ctx = RoundContext {
        round_number: 2,
        courts: 1,
        roster: &players,
        fixed_pairs: &[],
        previous: history.last(),
        weights: &weights,
        config: &config,
    };
    let mut rng = StdRng::seed_from_u64(30);
    let mut search = RoundSearch::begin(StrategyKind::Randomized, &ctx, &state, &mut rng).unwrap();
    let drawn = match &search {
        RoundSearch::Randomized(s) => s.resting().to_vec(),
        other => panic!("expected a randomized search, got {other:?}"),
    };
    // the three who rested last round have the highest rest count
    assert_eq!(drawn.len(), 3);
    assert!(drawn.iter().all(|p| !history[0].is_resting(*p)));

    let (round, _) = search.run_to_end(&state, &mut TemplateCache::default(), &mut rng).unwrap();
    assert_eq!(round.resting_players, drawn);
    round.validate(&players).unwrap();
}
