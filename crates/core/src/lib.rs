//! A persistent memory engine for conversational agents.
//!
//! Ingests free-form observations, distills them into typed, confidence-scored
//! *beliefs*, detects duplication and contradiction, decays stale knowledge,
//! synthesizes higher-order insights, and serves relevance-ranked context back
//! to the agent on demand. A companion knowledge store ingests long documents,
//! chunks them, and serves hybrid keyword+vector search with source
//! attribution.
//!
//! The crate never generates embeddings or runs an LLM itself — every such
//! call is delegated to an injected [`provider::EmbeddingClient`] /
//! [`provider::ChatClient`]. Callers own the [`storage::Storage`] handle and
//! the provider clients; there is no global state.

pub mod belief;
pub mod clock;
pub mod error;
pub mod export;
pub mod ids;
pub mod jobs;
pub mod knowledge;
pub mod logger;
mod memory;
pub mod provider;
pub mod reflection;
pub mod remember;
pub mod retrieval;
pub mod storage;
pub mod vector;

pub use error::{Error, Result};
pub use memory::{Knowledge, Memory};

/// Re-exports of the most commonly used types, for `use recall_core::prelude::*`.
pub mod prelude {
    pub use crate::belief::{Belief, BeliefChange, BeliefLink, BeliefStatus, BeliefType, ChangeType, Episode};
    pub use crate::clock::{Clock, SystemClock};
    pub use crate::error::{Error, Result};
    pub use crate::knowledge::{KnowledgeChunk, KnowledgeMatch, KnowledgeSource, LearnOutcome};
    pub use crate::logger::{Logger, TracingLogger};
    pub use crate::provider::{ChatClient, ChatMessage, ChatOptions, ChatResponse, EmbeddingClient};
    pub use crate::{Knowledge, Memory};
}
