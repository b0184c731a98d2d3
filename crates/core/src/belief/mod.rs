//! The belief store: typed, confidence-scored statements with an
//! append-only change log, decay-aware pruning, and FTS/semantic search
//! (spec §3, §4.2).

mod decay;
mod fts;
mod model;
pub mod store;

pub use decay::effective_confidence;
pub use fts::sanitize_fts5_query;
pub use model::{
    Belief, BeliefChange, BeliefLink, BeliefStatus, BeliefType, ChangeType, Episode, FtsMatch,
    SemanticMatch,
};
pub use store::{BeliefStats, DEFAULT_CONFIDENCE};
