//! Belief store data model (spec §3)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The kind of statement a belief represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeliefType {
    Factual,
    Preference,
    Procedural,
    Architectural,
    Insight,
    Meta,
}

impl BeliefType {
    /// Parse a value against the extraction whitelist
    /// `{factual, preference, procedural, architectural}`, defaulting to
    /// `factual` on anything else (spec §4.3 step 1). `insight`/`meta` are
    /// valid belief types but are never produced by extraction — they are
    /// reserved for direct API calls and synthesis, respectively.
    pub fn from_extraction(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "factual" => BeliefType::Factual,
            "preference" => BeliefType::Preference,
            "procedural" => BeliefType::Procedural,
            "architectural" => BeliefType::Architectural,
            _ => BeliefType::Factual,
        }
    }
}

impl std::fmt::Display for BeliefType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BeliefType::Factual => "factual",
            BeliefType::Preference => "preference",
            BeliefType::Procedural => "procedural",
            BeliefType::Architectural => "architectural",
            BeliefType::Insight => "insight",
            BeliefType::Meta => "meta",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for BeliefType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "factual" => BeliefType::Factual,
            "preference" => BeliefType::Preference,
            "procedural" => BeliefType::Procedural,
            "architectural" => BeliefType::Architectural,
            "insight" => BeliefType::Insight,
            "meta" => BeliefType::Meta,
            other => {
                return Err(crate::Error::InvalidArgument(format!("unknown belief type: {other}")))
            }
        })
    }
}

/// The belief lifecycle state (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BeliefStatus {
    Active,
    Invalidated,
    Forgotten,
    Pruned,
}

impl std::fmt::Display for BeliefStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BeliefStatus::Active => "active",
            BeliefStatus::Invalidated => "invalidated",
            BeliefStatus::Forgotten => "forgotten",
            BeliefStatus::Pruned => "pruned",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for BeliefStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "active" => BeliefStatus::Active,
            "invalidated" => BeliefStatus::Invalidated,
            "forgotten" => BeliefStatus::Forgotten,
            "pruned" => BeliefStatus::Pruned,
            other => {
                return Err(crate::Error::InvalidArgument(format!("unknown belief status: {other}")))
            }
        })
    }
}

/// A persisted, typed, confidence-scored statement attributed to a subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Belief {
    pub id: String,
    pub statement: String,
    #[serde(rename = "type")]
    pub belief_type: BeliefType,
    pub confidence: f64,
    pub status: BeliefStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub importance: i32,
    pub stability: f64,
    pub subject: String,
    pub supersedes: Option<String>,
    pub superseded_by: Option<String>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: i64,
}

/// A raw observation, the evidence anchor for beliefs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub action: String,
    pub context: Option<String>,
    pub outcome: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// The kind of mutation recorded in the append-only belief audit log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Created,
    Reinforced,
    Weakened,
    Contradicted,
    Forgotten,
    Pruned,
    Merged,
    Superseded,
    Synthesized,
}

impl std::fmt::Display for ChangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ChangeType::Created => "created",
            ChangeType::Reinforced => "reinforced",
            ChangeType::Weakened => "weakened",
            ChangeType::Contradicted => "contradicted",
            ChangeType::Forgotten => "forgotten",
            ChangeType::Pruned => "pruned",
            ChangeType::Merged => "merged",
            ChangeType::Superseded => "superseded",
            ChangeType::Synthesized => "synthesized",
        };
        write!(f, "{s}")
    }
}

/// An append-only audit record for a belief mutation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeliefChange {
    pub id: String,
    pub belief_id: String,
    pub change_type: ChangeType,
    pub detail: Option<String>,
    pub episode_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// An undirected Zettelkasten-style association between two beliefs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeliefLink {
    pub a: String,
    pub b: String,
    pub created_at: DateTime<Utc>,
}

/// A belief ranked by full-text relevance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FtsMatch {
    pub belief_id: String,
    pub statement: String,
    pub confidence: f64,
}

/// A belief ranked by semantic similarity to a query vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SemanticMatch {
    pub belief_id: String,
    pub statement: String,
    pub confidence: f64,
    #[serde(rename = "type")]
    pub belief_type: BeliefType,
    pub similarity: f64,
}
