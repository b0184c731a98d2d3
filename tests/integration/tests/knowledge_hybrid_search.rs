//! Knowledge store hybrid search (spec §8 scenario 6): a learned document
//! is retrievable by a topically related query, and re-learning the same
//! URL is a no-op unless forced.

use std::sync::Arc;

use recall_integration_tests::{test_knowledge, ScriptedEmbedder};

const URL: &str = "https://react.dev/learn/server-components";
const TITLE: &str = "React Server Components";
const HOSTNAME: &str = "react.dev";
const MARKDOWN: &str =
    "Server components and useState hooks let React applications render on the server \
     while keeping interactive state on the client.";

fn expected_chunk_content() -> String {
    format!("# {TITLE}\nSource: {HOSTNAME}\n\n{MARKDOWN}")
}

#[tokio::test]
async fn learning_a_document_makes_it_searchable_and_learn_is_idempotent() {
    let (_db, knowledge) = test_knowledge();
    let embedder = Arc::new(ScriptedEmbedder::new());
    let shared_vector = vec![0.2_f32, 0.8, 0.1, 0.4];
    embedder.register(expected_chunk_content(), shared_vector.clone());
    embedder.register("server components useState", shared_vector);
    let knowledge = knowledge.with_embedder(embedder);

    let outcome = knowledge.learn(URL, TITLE, MARKDOWN, false, &[]).await.unwrap();
    assert!(!outcome.skipped);
    assert_eq!(outcome.source.chunk_count, 1);

    let results = knowledge.search("server components useState", 5, None).await.unwrap();
    assert!(!results.is_empty(), "expected at least one matching chunk");
    assert!(results[0].score >= 0.5, "got score {}", results[0].score);
    assert_eq!(results[0].source.url, outcome.source.url);

    let second = knowledge.learn(URL, TITLE, MARKDOWN, false, &[]).await.unwrap();
    assert!(second.skipped);
    assert_eq!(second.source.id, outcome.source.id);
}

#[tokio::test]
async fn forgetting_a_source_removes_it_from_search() {
    let (_db, knowledge) = test_knowledge();
    let embedder = Arc::new(ScriptedEmbedder::new());
    let shared_vector = vec![0.5_f32, 0.1, 0.3, 0.9];
    embedder.register(expected_chunk_content(), shared_vector.clone());
    embedder.register("server components useState", shared_vector);
    let knowledge = knowledge.with_embedder(embedder);

    let outcome = knowledge.learn(URL, TITLE, MARKDOWN, false, &[]).await.unwrap();
    knowledge.forget_source(&outcome.source.id).unwrap();

    assert!(knowledge.source_chunks(&outcome.source.id).unwrap().is_empty());
    let results = knowledge.search("server components useState", 5, None).await.unwrap();
    assert!(results.iter().all(|r| r.source.id != outcome.source.id));
}
