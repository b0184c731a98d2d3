//! End-to-end remember-pipeline scenarios: fresh install, reinforcement,
//! weak contradiction, and strong contradiction.

use std::sync::Arc;

use recall_core::belief::BeliefStatus;
use recall_integration_tests::{test_memory, ScriptedChat, ScriptedEmbedder};

fn unit_vector_at_angle(cos_theta: f32) -> Vec<f32> {
    let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
    vec![cos_theta, sin_theta]
}

#[tokio::test]
async fn fresh_install_creates_one_episode_and_one_belief() {
    let (_db, memory) = test_memory();
    let embedder = Arc::new(ScriptedEmbedder::new());
    let chat = Arc::new(ScriptedChat::new());
    chat.push(ScriptedChat::extraction_json("User prefers TypeScript", "preference", 5, "owner"));
    let memory = memory.with_embedder(embedder).with_chat(chat);

    let outcome = memory.remember("I prefer TypeScript").await.unwrap();

    assert_eq!(outcome.belief_ids.len(), 1);
    assert!(!outcome.is_reinforcement);

    let belief = memory.beliefs(None).unwrap().into_iter().next().unwrap();
    assert_eq!(belief.statement, "User prefers TypeScript");
    assert!((belief.confidence - 0.6).abs() < 1e-9);
    assert_eq!(belief.status, BeliefStatus::Active);

    let history = memory.history(&belief.id).unwrap();
    assert_eq!(history.len(), 1);
}

#[tokio::test]
async fn identical_observation_reinforces_the_same_belief() {
    let (_db, memory) = test_memory();
    let embedder = Arc::new(ScriptedEmbedder::new());
    embedder.register("User prefers TypeScript", vec![1.0, 0.0, 0.0]);
    let chat = Arc::new(ScriptedChat::new());
    chat.push(ScriptedChat::extraction_json("User prefers TypeScript", "preference", 5, "owner"));
    chat.push(ScriptedChat::extraction_json("User prefers TypeScript", "preference", 5, "owner"));
    let memory = memory.with_embedder(embedder).with_chat(chat);

    let first = memory.remember("I prefer TypeScript").await.unwrap();
    let second = memory.remember("I prefer TypeScript again").await.unwrap();

    assert!(second.is_reinforcement);
    assert_eq!(second.belief_ids, first.belief_ids);

    let belief = memory.beliefs(None).unwrap().into_iter().next().unwrap();
    assert!((belief.confidence - 0.7).abs() < 1e-9, "got {}", belief.confidence);

    let history = memory.history(&belief.id).unwrap();
    let kinds: Vec<_> = history.iter().map(|c| c.change_type.to_string()).collect();
    assert!(kinds.contains(&"created".to_string()));
    assert!(kinds.contains(&"reinforced".to_string()));
}

#[tokio::test]
async fn weak_contradiction_invalidates_the_old_belief() {
    let (_db, memory) = test_memory();
    let embedder = Arc::new(ScriptedEmbedder::new());
    let zod_vector = vec![1.0_f32, 0.0];
    let joi_vector = unit_vector_at_angle(0.75);
    embedder.register("uses Zod", zod_vector);
    embedder.register("uses Joi", joi_vector);

    let chat = Arc::new(ScriptedChat::new());
    chat.push(ScriptedChat::extraction_json("uses Zod", "procedural", 5, "owner"));
    chat.push(ScriptedChat::extraction_json("uses Joi", "procedural", 5, "owner"));
    chat.push("CONTRADICTION");
    let memory = memory.with_embedder(embedder).with_chat(chat);

    memory.remember("I use Zod for validation").await.unwrap();
    let second = memory.remember("I use Joi for validation").await.unwrap();

    assert!(!second.is_reinforcement);

    let beliefs = memory.beliefs(None).unwrap();
    let zod = beliefs.iter().find(|b| b.statement == "uses Zod").unwrap();
    let joi = beliefs.iter().find(|b| b.statement == "uses Joi").unwrap();

    assert_eq!(zod.status, BeliefStatus::Invalidated);
    assert_eq!(joi.status, BeliefStatus::Active);
    assert_eq!(zod.superseded_by.as_deref(), Some(joi.id.as_str()));
    assert_eq!(joi.supersedes.as_deref(), Some(zod.id.as_str()));
}

#[tokio::test]
async fn strong_contradiction_weakens_instead_of_invalidating() {
    let (_db, memory) = test_memory();
    let embedder = Arc::new(ScriptedEmbedder::new());
    let zod_vector = vec![1.0_f32, 0.0];
    let joi_vector = unit_vector_at_angle(0.75);
    embedder.register("uses Zod", zod_vector);
    embedder.register("uses Joi", joi_vector);

    let chat = Arc::new(ScriptedChat::new());
    // One creation + four reinforcements, each a distinct supporting episode.
    for _ in 0..5 {
        chat.push(ScriptedChat::extraction_json("uses Zod", "procedural", 5, "owner"));
    }
    chat.push(ScriptedChat::extraction_json("uses Joi", "procedural", 5, "owner"));
    chat.push("CONTRADICTION");
    let memory = memory.with_embedder(embedder).with_chat(chat);

    for _ in 0..5 {
        memory.remember("I use Zod for validation").await.unwrap();
    }
    memory.remember("I use Joi for validation").await.unwrap();

    let beliefs = memory.beliefs(None).unwrap();
    let zod = beliefs.iter().find(|b| b.statement == "uses Zod").unwrap();
    let joi = beliefs.iter().find(|b| b.statement == "uses Joi").unwrap();

    assert_eq!(zod.status, BeliefStatus::Active, "5 supporting episodes should weaken, not invalidate");
    let expected = 1.0 - (1.0_f64 / 6.0).min(0.2);
    assert!((zod.confidence - expected).abs() < 1e-6, "got {}", zod.confidence);
    assert_eq!(joi.status, BeliefStatus::Active);
    assert_eq!(zod.superseded_by.as_deref(), Some(joi.id.as_str()));
}
