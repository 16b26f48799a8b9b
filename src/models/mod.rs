//! Data structures for doubles scheduling: players, pairs, matches, rounds, schedules.

mod game;
mod player;
mod schedule;

pub use game::{FixedPair, Match, Pair, Round, RoundViolation};
pub use player::{PlayerId, PlayerStats};
pub use schedule::{
    Evaluation, FairnessWeights, GenerationState, Schedule, ScheduleError, ScheduleId,
};
