//! Title parsing and candidate ranking.
//!
//! [`TitleRanker`] is the parse/rank primitive; [`CandidateRanker`] applies
//! deduplication, country and coverage rules on top of it for one media item.

mod heuristic;
mod ranker;
mod types;

pub use heuristic::HeuristicTitleRanker;
pub use ranker::{CandidateRanker, RankOptions};
pub use types::*;
