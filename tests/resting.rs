//! Integration tests for resting-set selection.

use doubles_scheduler::logic::resting::{
    all_resting_sets, combination_count, fair_resting_sets, rest_count, splits_fixed_pair,
};
use doubles_scheduler::logic::{resting_candidates, select_resting_single_draw};
use doubles_scheduler::Pair;
use rand::rngs::StdRng;
use rand::SeedableRng;

fn players(n: u32) -> Vec<u32> {
    (1..=n).collect()
}

#[test]
fn rest_count_is_surplus_over_court_capacity() {
    assert_eq!(rest_count(10, 2), 2);
    assert_eq!(rest_count(8, 2), 0);
    assert_eq!(rest_count(5, 1), 1);
}

#[test]
fn no_rest_yields_single_empty_set() {
    let sets: Vec<_> = resting_candidates(&players(8), 0, |_| 0, &[]).collect();
    assert_eq!(sets, vec![Vec::<u32>::new()]);
}

#[test]
fn prefers_sets_disjoint_from_last_round() {
    let sets: Vec<_> = resting_candidates(&players(6), 2, |_| 0, &[1, 2]).collect();
    assert_eq!(sets.len(), 6); // C(4, 2) over players 3..=6
    for set in &sets {
        assert!(!set.contains(&1) && !set.contains(&2), "{set:?} overlaps last round");
    }
    assert_eq!(sets[0], vec![3, 4]);
}

#[test]
fn falls_back_to_overlapping_sets_when_nothing_is_disjoint() {
    // only player 5 played last round, so no two-player set avoids a repeat rest
    let sets: Vec<_> = resting_candidates(&players(5), 2, |_| 0, &[1, 2, 3, 4]).collect();
    assert!(!sets.is_empty());
    assert!(sets.iter().all(|s| s.len() == 2));
}

#[test]
fn wide_rest_spread_restricts_candidates_to_least_rested() {
    let counts = [2u32, 2, 0, 0, 1, 1];
    let sets: Vec<_> = resting_candidates(&players(6), 2, |p| counts[p as usize - 1], &[]).collect();
    assert_eq!(sets, vec![vec![3, 4]]);
}

#[test]
fn fixed_pair_split_detection() {
    let pairs = [Pair::new(1, 2)];
    assert!(splits_fixed_pair(&[1, 5], &pairs));
    assert!(!splits_fixed_pair(&[1, 2], &pairs));
    assert!(!splits_fixed_pair(&[3, 4], &pairs));
    assert_eq!(all_resting_sets(&players(4), 2).count(), 6);
}

#[test]
fn single_draw_rests_the_least_rested() {
    let counts = [3u32, 1, 0, 2, 1];
    let mut rng = StdRng::seed_from_u64(1);
    for _ in 0..20 {
        let resting = select_resting_single_draw(
            &players(5),
            2,
            |p| counts[p as usize - 1],
            &[],
            &[],
            1000,
            &mut rng,
        );
        assert_eq!(resting.len(), 2);
        assert!(resting.contains(&3));
        assert!(resting.contains(&2) || resting.contains(&5));
    }
}

#[test]
fn single_draw_breaks_ties_toward_players_who_played_last_round() {
    let mut rng = StdRng::seed_from_u64(2);
    for _ in 0..20 {
        let resting = select_resting_single_draw(&players(6), 2, |_| 1, &[1, 2], &[], 1000, &mut rng);
        assert!(!resting.contains(&1) && !resting.contains(&2));
    }
}

#[test]
fn single_draw_keeps_fixed_pairs_together() {
    let pairs = [Pair::new(1, 2), Pair::new(3, 4)];
    let mut rng = StdRng::seed_from_u64(9);
    for round in 0..30u32 {
        // everyone even except the pairs, who are owed a rest
        let counts = |p: u32| if p <= 4 { 0 } else { round % 3 };
        let resting = select_resting_single_draw(&players(10), 2, counts, &[], &pairs, 1000, &mut rng);
        assert_eq!(resting.len(), 2);
        assert!(!splits_fixed_pair(&resting, &pairs), "{resting:?} splits a fixed pair");
    }
}

#[test]
fn single_draw_prefers_pair_rest_when_solos_rested_last_round() {
    let pairs = [Pair::new(1, 2)];
    let mut rng = StdRng::seed_from_u64(4);
    // 3..=6 rested last round: resting the pair avoids the consecutive-rest penalty
    let resting = select_resting_single_draw(&players(6), 2, |_| 0, &[3, 4, 5, 6], &pairs, 1000, &mut rng);
    assert_eq!(resting, vec![1, 2]);
}

#[test]
fn fair_sets_ignore_last_round_but_keep_the_pool() {
    let counts = [0u32, 0, 2, 2, 0, 2];
    let sets: Vec<_> = fair_resting_sets(&players(6), 2, |p| counts[p as usize - 1]).collect();
    assert_eq!(sets, vec![vec![1, 2], vec![1, 5], vec![2, 5]]);
}

#[test]
fn large_resting_spaces_are_streamed() {
    // C(60, 30) sets: far too many to hold, but the first few arrive at once
    let roster = players(60);
    assert!(combination_count(60, 30) > 1u64 << 56);
    let first: Vec<_> = all_resting_sets(&roster, 30).take(2).collect();
    assert_eq!(first[0], (1..=30).collect::<Vec<u32>>());
    assert_eq!(first[1], (1..=29).chain([31]).collect::<Vec<u32>>());
}
