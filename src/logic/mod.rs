//! Round-generation engine: enumeration, resting selection, fairness state, strategies, assembly.

mod assembler;
pub mod canonical;
pub mod fairness;
mod greedy;
mod randomized;
pub mod resting;
mod search;

pub use assembler::{
    CancelToken, GenerationHooks, GenerationJob, GenerationParams, GenerationSession, Progress,
    ScheduleGenerator, SuffixParams,
};
pub use canonical::{canonical_count, is_canonical, Template, TemplateCache, TemplateCursor, TemplateStream};
pub use fairness::{evaluate_schedule, CountMatrix, CumulativeState, RunningStats};
pub use greedy::GreedySearch;
pub use randomized::{quick_evaluate, Phase, RandomizedSearch};
pub use resting::{resting_candidates, select_resting_single_draw};
pub use search::{ascending_round, RoundContext, RoundSearch, SearchStep, StrategyKind};
