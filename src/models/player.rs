//! Player ids and per-player schedule statistics.

use serde::{Deserialize, Serialize};

/// 1-based player identifier. Players carry no other attributes.
pub type PlayerId = u32;

/// Statistics view of one player over a whole schedule (for display / export).
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct PlayerStats {
    pub player: PlayerId,
    pub games_played: u32,
    pub times_rested: u32,
    /// Number of different teammates this player had.
    pub distinct_partners: u32,
    /// Number of different players this player faced across the net.
    pub distinct_opponents: u32,
}

impl PlayerStats {
    /// Empty stats for a player that has not appeared in any round yet.
    pub fn new(player: PlayerId) -> Self {
        Self {
            player,
            ..Self::default()
        }
    }

    /// Record that this player played one match.
    pub fn add_game(&mut self) {
        self.games_played += 1;
    }

    /// Record that this player sat out one round.
    pub fn record_rest(&mut self) {
        self.times_rested += 1;
    }
}
