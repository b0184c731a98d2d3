//! The remember pipeline: observation → episode → extraction →
//! dedup/contradiction decision → belief creation or reinforcement
//! (spec §4.3).

use std::sync::Arc;

use serde::Deserialize;

use crate::belief::{store, Belief, BeliefType, ChangeType};
use crate::error::{Error, Result};
use crate::provider::{ChatClient, ChatMessage, ChatOptions, EmbeddingClient};
use crate::storage::Storage;

/// Top similarity strictly above this reinforces the match outright.
pub const REINFORCE_THRESHOLD: f64 = 0.85;

/// Top similarity at or below this, but above [`GREY_ZONE_LOW`], requires an
/// LLM relationship classification.
pub const GREY_ZONE_LOW: f64 = 0.70;

/// Supporting-episode count at or above which a contradiction weakens the
/// old belief instead of invalidating it (spec §4.3.5).
pub const STRONG_EVIDENCE_THRESHOLD: i64 = 3;

/// Lower/upper bounds (inclusive/exclusive) for associative `BeliefLink`
/// creation around a freshly created belief.
const NEIGHBOR_LINK_LOW: f64 = 0.4;
const NEIGHBOR_LINK_HIGH: f64 = 0.85;
const MAX_NEIGHBOR_LINKS: usize = 3;

/// How many similar beliefs `findSimilarBeliefs` considers per remember call.
const SIMILAR_CANDIDATES: usize = 5;

/// The result of a single `remember` call.
#[derive(Debug, Clone, serde::Serialize)]
pub struct RememberOutcome {
    pub episode_id: String,
    pub belief_ids: Vec<String>,
    pub is_reinforcement: bool,
}

#[derive(Debug, Clone, Deserialize)]
struct RawExtraction {
    fact: String,
    #[serde(rename = "factType", default)]
    fact_type: Option<String>,
    #[serde(default)]
    importance: Option<f64>,
    #[serde(default)]
    insight: Option<String>,
    #[serde(default)]
    subject: Option<String>,
}

/// The result of LLM-assisted fact extraction from raw observation text.
#[derive(Debug, Clone)]
struct Extracted {
    fact: String,
    fact_type: BeliefType,
    importance: i32,
    subject: String,
}

const EXTRACTION_SYSTEM_PROMPT: &str = "You extract a single durable fact from a user observation. \
Respond with exactly one JSON object: \
{\"fact\": string, \"factType\": \"factual\"|\"preference\"|\"procedural\"|\"architectural\", \
\"importance\": integer 1-10, \"insight\": string|null, \"subject\": string}. \
No prose outside the JSON object.";

/// Extract the first top-level `{...}` object from `text`, tolerating
/// surrounding markdown code fences and prose (spec §4.3 step 1).
fn extract_first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0i32;
    for (offset, ch) in text[start..].char_indices() {
        match ch {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_extraction(raw_response: &str) -> Result<Extracted> {
    let json = extract_first_json_object(raw_response)
        .ok_or_else(|| Error::ProviderFailure("extraction response contained no JSON object".into()))?;
    let raw: RawExtraction = serde_json::from_str(json)
        .map_err(|e| Error::ProviderFailure(format!("malformed extraction JSON: {e}")))?;

    Ok(Extracted {
        fact: raw.fact,
        fact_type: raw.fact_type.as_deref().map(BeliefType::from_extraction).unwrap_or(BeliefType::Factual),
        importance: raw.importance.map(store::clamp_importance).unwrap_or(5),
        subject: raw.subject.map(|s| s.to_lowercase()).filter(|s| !s.is_empty()).unwrap_or_else(|| "owner".to_string()),
    })
}

async fn extract_fact(chat: &dyn ChatClient, observation: &str) -> Result<Extracted> {
    let messages = [ChatMessage::system(EXTRACTION_SYSTEM_PROMPT), ChatMessage::user(observation)];
    let response = chat
        .chat(&messages, ChatOptions::default())
        .await
        .map_err(|e| Error::ProviderFailure(e.0))?;
    parse_extraction(&response.text)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Relationship {
    Reinforcement,
    Contradiction,
    Independent,
}

const CLASSIFY_SYSTEM_PROMPT: &str = "Compare a new statement to an existing one about the same subject. \
Respond with exactly one word: REINFORCEMENT if the new statement confirms the same fact, \
CONTRADICTION if it conflicts with the existing one, or INDEPENDENT if they are unrelated facts \
that merely resemble each other.";

async fn classify_relationship(chat: &dyn ChatClient, fact: &str, existing_statement: &str) -> Relationship {
    let prompt = format!("Existing: {existing_statement}\nNew: {fact}");
    let messages = [ChatMessage::system(CLASSIFY_SYSTEM_PROMPT), ChatMessage::user(prompt)];
    match chat.chat(&messages, ChatOptions::default()).await {
        Ok(response) => match response.text.trim().to_uppercase().as_str() {
            "REINFORCEMENT" => Relationship::Reinforcement,
            "CONTRADICTION" => Relationship::Contradiction,
            _ => Relationship::Independent,
        },
        Err(_) => Relationship::Independent,
    }
}

/// Embed-store a fact, link it to `episode_id`, and create associative
/// `BeliefLink`s to active neighbors with similarity in
/// `[NEIGHBOR_LINK_LOW, NEIGHBOR_LINK_HIGH)` (spec §4.3 step 6).
fn create_belief_with_links(
    storage: &Storage,
    fact: &str,
    fact_type: BeliefType,
    importance: i32,
    subject: &str,
    confidence: f64,
    embedding: Option<&[f32]>,
    episode_id: &str,
    detail: Option<&str>,
) -> Result<Belief> {
    let belief = store::create_belief(storage, fact, confidence, fact_type, importance, subject)?;
    store::record_change(storage, &belief.id, ChangeType::Created, detail, Some(episode_id))?;
    store::link_episode_to_belief(storage, episode_id, &belief.id)?;

    if let Some(vector) = embedding {
        store::set_belief_embedding(storage, &belief.id, vector)?;

        let neighbors = store::find_similar_beliefs(storage, vector, SIMILAR_CANDIDATES + MAX_NEIGHBOR_LINKS, Some(&belief.id))?;
        let mut linked = 0;
        for neighbor in neighbors {
            if linked >= MAX_NEIGHBOR_LINKS {
                break;
            }
            if neighbor.similarity >= NEIGHBOR_LINK_LOW && neighbor.similarity < NEIGHBOR_LINK_HIGH {
                store::link_beliefs(storage, &belief.id, &neighbor.belief_id)?;
                linked += 1;
            }
        }
    }

    Ok(belief)
}

/// Resolve a grey-zone or strong-similarity contradiction (spec §4.3.5):
/// weaken the old belief if it has strong supporting evidence, otherwise
/// invalidate it outright; either way create the new belief and record a
/// supersession edge old → new.
fn resolve_contradiction(
    storage: &Storage,
    old_belief_id: &str,
    fact: &str,
    fact_type: BeliefType,
    importance: i32,
    subject: &str,
    embedding: Option<&[f32]>,
    episode_id: &str,
) -> Result<Belief> {
    let supporting = store::supporting_episode_count(storage, old_belief_id)?;

    if supporting >= STRONG_EVIDENCE_THRESHOLD {
        store::weaken_belief(storage, old_belief_id, supporting)?;
        store::record_change(
            storage,
            old_belief_id,
            ChangeType::Weakened,
            Some(&format!("contradicted by new evidence, {supporting} supporting episodes")),
            Some(episode_id),
        )?;
    } else {
        store::invalidate_belief(storage, old_belief_id)?;
        store::record_change(
            storage,
            old_belief_id,
            ChangeType::Contradicted,
            Some(&format!("contradicted by new evidence, {supporting} supporting episodes")),
            Some(episode_id),
        )?;
    }

    let new_belief = create_belief_with_links(
        storage,
        fact,
        fact_type,
        importance,
        subject,
        store::DEFAULT_CONFIDENCE,
        embedding,
        episode_id,
        Some("created to supersede contradicted belief"),
    )?;
    store::set_supersedes(storage, old_belief_id, &new_belief.id)?;

    Ok(new_belief)
}

/// Reinforce `belief_id` and record the episode link (spec §4.3 step 4,
/// the `s > 0.85` and grey-zone REINFORCEMENT branches).
fn reinforce(storage: &Storage, belief_id: &str, similarity: f64, episode_id: &str) -> Result<Belief> {
    let belief = store::reinforce_belief(storage, belief_id, 0.1)?;
    store::link_episode_to_belief(storage, episode_id, belief_id)?;
    store::record_change(
        storage,
        belief_id,
        ChangeType::Reinforced,
        Some(&format!("similarity {similarity:.3}")),
        Some(episode_id),
    )?;
    Ok(belief)
}

/// Run the full remember pipeline over a raw observation.
pub async fn remember(
    storage: &Storage,
    embedder: &Arc<dyn EmbeddingClient>,
    chat: &Arc<dyn ChatClient>,
    text: &str,
) -> Result<RememberOutcome> {
    let episode = store::create_episode(storage, text, None)?;

    if let Ok(episode_vector) = embedder.embed(text).await {
        let _ = store::set_episode_embedding(storage, &episode.id, &episode_vector);
    } else {
        storage.logger().warn("episode embedding failed, continuing without it", None);
    }

    let extracted = extract_fact(chat, text).await?;

    let fact_embedding = match embedder.embed(&extracted.fact).await {
        Ok(vector) => Some(vector),
        Err(e) => {
            storage.logger().warn(
                "fact embedding failed, creating belief without dedup/contradiction check",
                Some(serde_json::json!({ "error": e.0 })),
            );
            None
        }
    };

    let Some(fact_embedding) = fact_embedding else {
        let belief = create_belief_with_links(
            storage,
            &extracted.fact,
            extracted.fact_type,
            extracted.importance,
            &extracted.subject,
            store::DEFAULT_CONFIDENCE,
            None,
            &episode.id,
            Some("no embedding available"),
        )?;
        return Ok(RememberOutcome { episode_id: episode.id, belief_ids: vec![belief.id], is_reinforcement: false });
    };

    let candidates = store::find_similar_beliefs(storage, &fact_embedding, SIMILAR_CANDIDATES, None)?;
    let top = candidates.first();

    let (belief_id, is_reinforcement) = match top {
        Some(top_match) if top_match.similarity > REINFORCE_THRESHOLD => {
            let belief = reinforce(storage, &top_match.belief_id, top_match.similarity, &episode.id)?;
            (belief.id, true)
        }
        Some(top_match) if top_match.similarity > GREY_ZONE_LOW => {
            match classify_relationship(chat, &extracted.fact, &top_match.statement).await {
                Relationship::Reinforcement => {
                    let belief = reinforce(storage, &top_match.belief_id, top_match.similarity, &episode.id)?;
                    (belief.id, true)
                }
                Relationship::Contradiction => {
                    let belief = resolve_contradiction(
                        storage,
                        &top_match.belief_id,
                        &extracted.fact,
                        extracted.fact_type,
                        extracted.importance,
                        &extracted.subject,
                        Some(&fact_embedding),
                        &episode.id,
                    )?;
                    (belief.id, false)
                }
                Relationship::Independent => {
                    let belief = create_belief_with_links(
                        storage,
                        &extracted.fact,
                        extracted.fact_type,
                        extracted.importance,
                        &extracted.subject,
                        store::DEFAULT_CONFIDENCE,
                        Some(&fact_embedding),
                        &episode.id,
                        None,
                    )?;
                    (belief.id, false)
                }
            }
        }
        _ => {
            let belief = create_belief_with_links(
                storage,
                &extracted.fact,
                extracted.fact_type,
                extracted.importance,
                &extracted.subject,
                store::DEFAULT_CONFIDENCE,
                Some(&fact_embedding),
                &episode.id,
                None,
            )?;
            (belief.id, false)
        }
    };

    Ok(RememberOutcome { episode_id: episode.id, belief_ids: vec![belief_id], is_reinforcement })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_json_object_from_fenced_markdown() {
        let text = "Here you go:\n```json\n{\"fact\": \"likes tea\", \"factType\": \"preference\"}\n```\nthanks";
        let json = extract_first_json_object(text).unwrap();
        assert_eq!(json, "{\"fact\": \"likes tea\", \"factType\": \"preference\"}");
    }

    #[test]
    fn parse_extraction_defaults_missing_fields() {
        let extracted = parse_extraction("{\"fact\": \"uses Rust\"}").unwrap();
        assert_eq!(extracted.fact, "uses Rust");
        assert_eq!(extracted.fact_type, BeliefType::Factual);
        assert_eq!(extracted.importance, 5);
        assert_eq!(extracted.subject, "owner");
    }

    #[test]
    fn parse_extraction_clamps_importance_and_lowercases_subject() {
        let extracted =
            parse_extraction("{\"fact\": \"x\", \"importance\": 99, \"subject\": \"OWNER\"}").unwrap();
        assert_eq!(extracted.importance, 10);
        assert_eq!(extracted.subject, "owner");
    }

    #[test]
    fn parse_extraction_errors_with_no_json_object() {
        assert!(parse_extraction("no json here").is_err());
    }
}
