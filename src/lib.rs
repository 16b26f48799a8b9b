//! Doubles round-robin scheduler: library with models and the round-generation engine.

pub mod config;
pub mod logic;
pub mod models;

pub use config::{EngineConfig, RandomizedConfig};
pub use logic::{
    evaluate_schedule, CancelToken, CumulativeState, GenerationHooks, GenerationJob, GenerationParams,
    GenerationSession, Progress, ScheduleGenerator, StrategyKind, SuffixParams,
};
pub use models::{
    Evaluation, FairnessWeights, FixedPair, GenerationState, Match, Pair, PlayerId, PlayerStats, Round,
    RoundViolation, Schedule, ScheduleError, ScheduleId,
};
