//! Choosing who sits out a round.
//!
//! Two selectors:
//! - [`resting_candidates`]: a lazy stream of acceptable resting sets, for the greedy search to score.
//! - [`select_resting_single_draw`]: one resting set drawn by rank, for the randomized search.

use crate::models::{FixedPair, PlayerId};
use rand::Rng;

/// Players who must rest when `players_count` players share `courts` courts.
pub fn rest_count(players_count: usize, courts: usize) -> usize {
    players_count.saturating_sub(courts * 4)
}

/// Lazy stream of the `k`-subsets of a pool, in lexicographic order of positions (pool order is
/// kept inside each subset). Only the current index tuple is held in memory.
#[derive(Clone, Debug)]
pub struct Combinations {
    pool: Vec<PlayerId>,
    idx: Vec<usize>,
    done: bool,
}

impl Combinations {
    pub fn new(pool: Vec<PlayerId>, k: usize) -> Self {
        Self {
            done: k > pool.len(),
            idx: (0..k).collect(),
            pool,
        }
    }
}

impl Iterator for Combinations {
    type Item = Vec<PlayerId>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.idx.iter().map(|&i| self.pool[i]).collect();
        let (n, k) = (self.pool.len(), self.idx.len());
        // rightmost position that can still move
        match (0..k).rev().find(|&i| self.idx[i] < n - k + i) {
            Some(pos) => {
                self.idx[pos] += 1;
                for i in (pos + 1)..k {
                    self.idx[i] = self.idx[i - 1] + 1;
                }
            }
            None => self.done = true,
        }
        Some(item)
    }
}

/// All `k`-subsets of `pool`; see [`Combinations`].
pub fn combinations(pool: &[PlayerId], k: usize) -> Combinations {
    Combinations::new(pool.to_vec(), k)
}

/// Number of `k`-subsets of `n` items, saturating.
pub fn combination_count(n: usize, k: usize) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut acc: u128 = 1;
    for i in 0..k {
        acc = acc * (n - i) as u128 / (i + 1) as u128;
        if acc > u64::MAX as u128 {
            return u64::MAX;
        }
    }
    acc as u64
}

/// Players eligible to rest once rest counts drift apart.
///
/// With a spread of two or more, only the least-rested players may rest, topped up with everyone
/// below the maximum when that group is too small. Otherwise everyone is eligible.
fn fairness_pool<F>(players: &[PlayerId], rest_count: usize, rest_of: &F) -> Vec<PlayerId>
where
    F: Fn(PlayerId) -> u32,
{
    let min_rest = players.iter().map(|&p| rest_of(p)).min().unwrap_or(0);
    let max_rest = players.iter().map(|&p| rest_of(p)).max().unwrap_or(0);
    if max_rest - min_rest >= 2 {
        let at_min: Vec<PlayerId> = players.iter().copied().filter(|&p| rest_of(p) == min_rest).collect();
        if at_min.len() >= rest_count {
            return at_min;
        }
        let below_max: Vec<PlayerId> = players.iter().copied().filter(|&p| rest_of(p) < max_rest).collect();
        if below_max.len() >= rest_count {
            return below_max;
        }
    }
    players.to_vec()
}

/// Every resting set the greedy search should consider, in lexicographic order.
///
/// When `previous` is non-empty, sets disjoint from it are preferred: if any exist only those are
/// produced, otherwise the overlapping sets are produced rather than nothing.
pub fn resting_candidates<F>(
    players: &[PlayerId],
    rest_count: usize,
    rest_of: F,
    previous: &[PlayerId],
) -> Combinations
where
    F: Fn(PlayerId) -> u32,
{
    let mut players = players.to_vec();
    players.sort_unstable();
    let pool = fairness_pool(&players, rest_count, &rest_of);

    if rest_count > 0 && !previous.is_empty() {
        let fresh: Vec<PlayerId> = pool.iter().copied().filter(|p| !previous.contains(p)).collect();
        if fresh.len() >= rest_count {
            return Combinations::new(fresh, rest_count);
        }
        log::warn!("No resting set avoids last round's resters; allowing consecutive rests");
    }
    Combinations::new(pool, rest_count)
}

/// Resting sets drawn from the fairness pool, whether or not they overlap last round's resters.
pub fn fair_resting_sets<F>(players: &[PlayerId], rest_count: usize, rest_of: F) -> Combinations
where
    F: Fn(PlayerId) -> u32,
{
    let mut players = players.to_vec();
    players.sort_unstable();
    let pool = fairness_pool(&players, rest_count, &rest_of);
    Combinations::new(pool, rest_count)
}

/// Unconstrained generator: every `rest_count`-subset of `players`.
pub fn all_resting_sets(players: &[PlayerId], rest_count: usize) -> Combinations {
    let mut players = players.to_vec();
    players.sort_unstable();
    Combinations::new(players, rest_count)
}

/// True if the set rests exactly one member of a fixed pair whose members are both active.
pub fn splits_fixed_pair(resting: &[PlayerId], fixed_pairs: &[FixedPair]) -> bool {
    fixed_pairs
        .iter()
        .any(|fp| resting.contains(&fp.player1) != resting.contains(&fp.player2))
}

/// Draw one resting set: lowest rest count first, then players who played last round, then random.
///
/// Fixed pairs (both members in `players`) compete as two-seat units scored by their combined
/// rest count, against solo players scored at double weight; `consecutive_rest_penalty` is added
/// to any unit with a member who rested last round. If whole units cannot fill the quota exactly,
/// the per-player ranking is used instead. The result is sorted.
pub fn select_resting_single_draw<R, F>(
    players: &[PlayerId],
    rest_count: usize,
    rest_of: F,
    previous: &[PlayerId],
    fixed_pairs: &[FixedPair],
    consecutive_rest_penalty: u32,
    rng: &mut R,
) -> Vec<PlayerId>
where
    R: Rng + ?Sized,
    F: Fn(PlayerId) -> u32,
{
    if rest_count == 0 {
        return Vec::new();
    }
    let active_pairs: Vec<FixedPair> = fixed_pairs
        .iter()
        .copied()
        .filter(|fp| players.contains(&fp.player1) && players.contains(&fp.player2))
        .collect();

    if !active_pairs.is_empty() {
        if let Some(resting) = fill_with_units(
            players,
            rest_count,
            &rest_of,
            previous,
            &active_pairs,
            consecutive_rest_penalty,
            rng,
        ) {
            return resting;
        }
        log::warn!("Fixed pairs cannot fill {rest_count} resting seat(s) exactly; ranking players individually");
    }

    let mut ranked: Vec<(PlayerId, (u32, bool, u32))> = players
        .iter()
        .map(|&p| (p, (rest_of(p), previous.contains(&p), rng.gen::<u32>())))
        .collect();
    ranked.sort_by_key(|&(_, key)| key);
    let mut resting: Vec<PlayerId> = ranked.into_iter().take(rest_count).map(|(p, _)| p).collect();
    resting.sort_unstable();
    resting
}

fn fill_with_units<R, F>(
    players: &[PlayerId],
    rest_count: usize,
    rest_of: &F,
    previous: &[PlayerId],
    active_pairs: &[FixedPair],
    penalty: u32,
    rng: &mut R,
) -> Option<Vec<PlayerId>>
where
    R: Rng + ?Sized,
    F: Fn(PlayerId) -> u32,
{
    let rested_last = |p: PlayerId| previous.contains(&p);
    let mut units: Vec<(Vec<PlayerId>, (u32, u32))> = Vec::with_capacity(players.len());
    for fp in active_pairs {
        let mut score = rest_of(fp.player1) + rest_of(fp.player2);
        if rested_last(fp.player1) || rested_last(fp.player2) {
            score += penalty;
        }
        units.push((fp.members().to_vec(), (score, rng.gen())));
    }
    for &p in players {
        if active_pairs.iter().any(|fp| fp.contains(p)) {
            continue;
        }
        let mut score = rest_of(p) * 2;
        if rested_last(p) {
            score += penalty;
        }
        units.push((vec![p], (score, rng.gen())));
    }
    units.sort_by_key(|(_, key)| *key);

    let mut resting = Vec::with_capacity(rest_count);
    for (members, _) in units {
        let left = rest_count - resting.len();
        if left == 0 {
            break;
        }
        if members.len() <= left {
            resting.extend(members);
        }
    }
    if resting.len() != rest_count {
        return None;
    }
    resting.sort_unstable();
    Some(resting)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn combinations_are_lexicographic() {
        let got: Vec<_> = combinations(&[1, 2, 3, 4], 2).collect();
        assert_eq!(
            got,
            vec![vec![1, 2], vec![1, 3], vec![1, 4], vec![2, 3], vec![2, 4], vec![3, 4]]
        );
        assert_eq!(combination_count(4, 2), 6);
        assert_eq!(combination_count(10, 2), 45);
        assert_eq!(combinations(&[1, 2, 3], 0).collect::<Vec<_>>(), vec![Vec::<PlayerId>::new()]);
        assert_eq!(combinations(&[1, 2], 3).count(), 0);
        assert_eq!(combinations(&(1..=10).collect::<Vec<_>>(), 4).count() as u64, combination_count(10, 4));
    }

    #[test]
    fn wide_spread_restricts_pool_to_least_rested() {
        let counts = [0u32, 2, 2, 0, 1];
        let pool = fairness_pool(&[1, 2, 3, 4, 5], 2, &|p: PlayerId| counts[p as usize - 1]);
        assert_eq!(pool, vec![1, 4]);
        let pool = fairness_pool(&[1, 2, 3, 4, 5], 3, &|p: PlayerId| counts[p as usize - 1]);
        assert_eq!(pool, vec![1, 4, 5]);
    }
}
