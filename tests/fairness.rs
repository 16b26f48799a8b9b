//! Integration tests for the cumulative fairness state: commits, incremental scoring, restriction.

use doubles_scheduler::logic::{evaluate_schedule, CumulativeState, TemplateStream};
use doubles_scheduler::{FairnessWeights, Match, Round};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

fn round(n: u32, courts: &[[u32; 4]], resting: &[u32]) -> Round {
    let matches = courts
        .iter()
        .map(|c| Match::from_players(c[0], c[1], c[2], c[3]))
        .collect();
    Round::new(n, matches, resting.to_vec())
}

/// A random valid round over players 1..=n.
fn random_round(n: u32, courts: usize, number: u32, rng: &mut StdRng) -> Round {
    let mut players: Vec<u32> = (1..=n).collect();
    players.shuffle(rng);
    let (playing, resting) = players.split_at(courts * 4);
    let matches = playing
        .chunks_exact(4)
        .map(|c| Match::from_players(c[0], c[1], c[2], c[3]))
        .collect();
    Round::new(number, matches, resting.to_vec())
}

#[test]
fn single_round_scores() {
    let mut state = CumulativeState::new(4);
    state.commit(&round(1, &[[1, 2, 3, 4]], &[]));
    assert_eq!(state.pair_count(1, 2), 1);
    assert_eq!(state.pair_count(2, 1), 1);
    assert_eq!(state.pair_count(1, 3), 0);
    assert_eq!(state.oppo_count(1, 3), 1);
    assert_eq!(state.oppo_count(1, 2), 0);

    let eval = state.evaluate(&FairnessWeights::default());
    // two of six pair entries at 1: sd = sqrt(1/3 - 1/9)
    assert!((eval.pair_std_dev - (2.0f64).sqrt() / 3.0).abs() < 1e-12);
    // four of six opponent entries at 1
    assert!((eval.oppo_std_dev - (2.0f64).sqrt() / 3.0).abs() < 1e-12);
    assert_eq!(eval.rest_std_dev, 0.0);
}

#[test]
fn candidate_evaluation_matches_commit_then_evaluate() {
    let mut rng = StdRng::seed_from_u64(11);
    let weights = FairnessWeights::new(1.0, 0.5, 2.0);
    let mut state = CumulativeState::new(10);
    for number in 1..=6 {
        state.commit(&random_round(10, 2, number, &mut rng));
    }

    let templates = TemplateStream::new(2).collect_all();
    for _ in 0..50 {
        let mut players: Vec<u32> = (1..=10).collect();
        players.shuffle(&mut rng);
        let mut resting = players.split_off(8);
        resting.sort_unstable();
        players.sort_unstable();
        let template = templates.choose(&mut rng).unwrap();

        let incremental = state.evaluate_candidate(template, &players, &resting, &weights);

        let matches = template
            .chunks_exact(4)
            .map(|c| Match::from_players(players[c[0]], players[c[1]], players[c[2]], players[c[3]]))
            .collect();
        let candidate = Round::new(7, matches, resting.clone());
        let mut committed = state.clone();
        committed.commit(&candidate);
        assert_eq!(incremental, committed.evaluate(&weights).total_score);
        assert_eq!(state.evaluate_round(&candidate, &weights), committed.evaluate(&weights));
    }
}

#[test]
fn evaluation_is_read_only() {
    let mut state = CumulativeState::new(5);
    state.commit(&round(1, &[[1, 2, 3, 4]], &[5]));
    let before = state.clone();
    let _ = state.evaluate_round(&round(2, &[[1, 5, 2, 3]], &[4]), &FairnessWeights::default());
    let _ = state.evaluate_candidate(&[0, 1, 2, 3], &[2, 3, 4, 5], &[1], &FairnessWeights::default());
    assert_eq!(state, before);
}

#[test]
fn counts_never_decrease_across_commits() {
    let mut rng = StdRng::seed_from_u64(3);
    let mut state = CumulativeState::new(9);
    for number in 1..=20 {
        let before = state.clone();
        state.commit(&random_round(9, 2, number, &mut rng));
        for (old, new) in before.pair_counts().pair_values().zip(state.pair_counts().pair_values()) {
            assert!(new >= old);
        }
        for (old, new) in before.oppo_counts().pair_values().zip(state.oppo_counts().pair_values()) {
            assert!(new >= old);
        }
        for (old, new) in before.rest_counts().iter().zip(state.rest_counts()) {
            assert!(new >= old);
        }
    }
    assert_eq!(state.rounds_committed(), 20);
    assert_eq!(state.rest_counts().iter().sum::<u32>(), 20);
}

#[test]
fn players_outside_the_roster_are_ignored() {
    let rounds = vec![
        round(1, &[[1, 2, 3, 4]], &[5]),
        round(2, &[[1, 5, 2, 3]], &[4]),
    ];
    // player 5 left: their rest and every pairing involving them drop out
    let state = CumulativeState::from_rounds(&[1, 2, 3, 4], &rounds);
    assert_eq!(state.roster(), &[1, 2, 3, 4]);
    assert_eq!(state.index_of(5), None);
    assert_eq!(state.rest_count(5), 0);
    assert_eq!(state.pair_count(1, 5), 0);
    assert_eq!(state.rest_counts(), &[0, 0, 0, 1]);
    assert_eq!(state.pair_count(1, 2), 1);
    assert_eq!(state.pair_count(2, 3), 1);
    assert_eq!(state.pair_stats().sum, 3);
}

#[test]
fn evaluate_schedule_agrees_with_incremental_state() {
    let mut rng = StdRng::seed_from_u64(5);
    let roster: Vec<u32> = (1..=12).collect();
    let rounds: Vec<Round> = (1..=8).map(|n| random_round(12, 2, n, &mut rng)).collect();
    let weights = FairnessWeights::default();

    let mut state = CumulativeState::for_roster(&roster);
    for r in &rounds {
        state.commit(r);
    }
    assert_eq!(evaluate_schedule(&roster, &rounds, &weights), state.evaluate(&weights));
}
