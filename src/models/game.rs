//! Pair, Match and Round for 2v2 doubles courts.

use crate::models::player::PlayerId;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Two distinct players on the same side of a court. Always stored with `player1 < player2`.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Pair {
    pub player1: PlayerId,
    pub player2: PlayerId,
}

/// Two players that must always be teammates whenever both are active.
pub type FixedPair = Pair;

impl Pair {
    /// Build a pair in canonical order, whichever way round the ids are given.
    pub fn new(a: PlayerId, b: PlayerId) -> Self {
        if a <= b {
            Self { player1: a, player2: b }
        } else {
            Self { player1: b, player2: a }
        }
    }

    pub fn contains(&self, player: PlayerId) -> bool {
        self.player1 == player || self.player2 == player
    }

    /// The other member, if `player` is in this pair.
    pub fn partner_of(&self, player: PlayerId) -> Option<PlayerId> {
        if self.player1 == player {
            Some(self.player2)
        } else if self.player2 == player {
            Some(self.player1)
        } else {
            None
        }
    }

    pub fn members(&self) -> [PlayerId; 2] {
        [self.player1, self.player2]
    }
}

/// One court: `pair_a` against `pair_b`, with `pair_a.player1 < pair_b.player1`.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub pair_a: Pair,
    pub pair_b: Pair,
}

impl Match {
    /// Build a match in canonical order (pairs normalized, lower-min pair first).
    pub fn new(a: Pair, b: Pair) -> Self {
        let (a, b) = (Pair::new(a.player1, a.player2), Pair::new(b.player1, b.player2));
        if a.player1 < b.player1 {
            Self { pair_a: a, pair_b: b }
        } else {
            Self { pair_a: b, pair_b: a }
        }
    }

    /// Convenience constructor from four ids: `(a1, a2)` vs `(b1, b2)`.
    pub fn from_players(a1: PlayerId, a2: PlayerId, b1: PlayerId, b2: PlayerId) -> Self {
        Self::new(Pair::new(a1, a2), Pair::new(b1, b2))
    }

    pub fn players(&self) -> [PlayerId; 4] {
        [
            self.pair_a.player1,
            self.pair_a.player2,
            self.pair_b.player1,
            self.pair_b.player2,
        ]
    }

    /// The four cross-net combinations (one player from each side).
    pub fn opponents(&self) -> [(PlayerId, PlayerId); 4] {
        let [a1, a2] = self.pair_a.members();
        let [b1, b2] = self.pair_b.members();
        [(a1, b1), (a1, b2), (a2, b1), (a2, b2)]
    }
}

/// One round: a match per court and the players sitting out.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Round {
    /// 1-based round number.
    pub round_number: u32,
    /// One match per court. Court order carries no meaning.
    pub matches: Vec<Match>,
    /// Sorted ascending.
    pub resting_players: Vec<PlayerId>,
}

/// Why a round failed [`Round::validate`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RoundViolation {
    /// A player appears more than once across matches and resting list.
    Duplicate(PlayerId),
    /// An active player is neither playing nor resting.
    Missing(PlayerId),
    /// A player in the round is not part of the active roster.
    NotActive(PlayerId),
    /// A pair or match is not stored in canonical order.
    NotCanonical,
}

impl Round {
    pub fn new(round_number: u32, matches: Vec<Match>, mut resting_players: Vec<PlayerId>) -> Self {
        resting_players.sort_unstable();
        Self {
            round_number,
            matches,
            resting_players,
        }
    }

    /// All players on court, in court order.
    pub fn playing_players(&self) -> impl Iterator<Item = PlayerId> + '_ {
        self.matches.iter().flat_map(|m| m.players())
    }

    pub fn is_resting(&self, player: PlayerId) -> bool {
        self.resting_players.binary_search(&player).is_ok()
    }

    /// Teammate of `player` this round, if they are on court.
    pub fn partner_of(&self, player: PlayerId) -> Option<PlayerId> {
        self.matches.iter().find_map(|m| {
            m.pair_a
                .partner_of(player)
                .or_else(|| m.pair_b.partner_of(player))
        })
    }

    /// Check the partition invariant against `active`: every active player appears exactly once,
    /// either in a match or in the resting list, and all pairs/matches are canonical.
    pub fn validate(&self, active: &[PlayerId]) -> Result<(), RoundViolation> {
        let active: HashSet<PlayerId> = active.iter().copied().collect();
        let mut seen = HashSet::with_capacity(active.len());
        for m in &self.matches {
            let canonical = m.pair_a.player1 < m.pair_a.player2
                && m.pair_b.player1 < m.pair_b.player2
                && m.pair_a.player1 < m.pair_b.player1;
            if !canonical {
                return Err(RoundViolation::NotCanonical);
            }
        }
        for p in self.playing_players().chain(self.resting_players.iter().copied()) {
            if !active.contains(&p) {
                return Err(RoundViolation::NotActive(p));
            }
            if !seen.insert(p) {
                return Err(RoundViolation::Duplicate(p));
            }
        }
        let mut missing: Vec<_> = active.difference(&seen).copied().collect();
        missing.sort_unstable();
        match missing.first() {
            Some(&p) => Err(RoundViolation::Missing(p)),
            None => Ok(()),
        }
    }

    /// Shuffle court order (for display only).
    pub fn shuffle_courts<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.matches.shuffle(rng);
    }
}
