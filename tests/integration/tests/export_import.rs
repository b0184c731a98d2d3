//! Export/import round-tripping and idempotence (spec §8 round-trip
//! properties).

use recall_core::belief::{store, BeliefType};
use recall_integration_tests::test_memory;

#[test]
fn export_import_export_preserves_belief_and_episode_ids() {
    let (_db, source) = test_memory();
    store::create_belief(source.storage(), "first fact", 0.6, BeliefType::Factual, 5, "owner").unwrap();
    store::create_belief(source.storage(), "second fact", 0.7, BeliefType::Preference, 6, "owner").unwrap();
    store::create_episode(source.storage(), "did something", None).unwrap();

    let first_export = source.export().unwrap();
    assert_eq!(first_export.beliefs.len(), 2);
    assert_eq!(first_export.episodes.len(), 1);

    let (_db2, destination) = test_memory();
    let import_outcome = destination.import(&first_export).unwrap();
    assert_eq!(import_outcome.beliefs, 2);
    assert_eq!(import_outcome.episodes, 1);

    let second_export = destination.export().unwrap();
    let mut first_ids: Vec<_> = first_export.beliefs.iter().map(|b| b.id.clone()).collect();
    let mut second_ids: Vec<_> = second_export.beliefs.iter().map(|b| b.id.clone()).collect();
    first_ids.sort();
    second_ids.sort();
    assert_eq!(first_ids, second_ids);

    let mut first_episode_ids: Vec<_> = first_export.episodes.iter().map(|e| e.id.clone()).collect();
    let mut second_episode_ids: Vec<_> = second_export.episodes.iter().map(|e| e.id.clone()).collect();
    first_episode_ids.sort();
    second_episode_ids.sort();
    assert_eq!(first_episode_ids, second_episode_ids);
}

#[test]
fn import_is_idempotent_by_id() {
    let (_db, source) = test_memory();
    store::create_belief(source.storage(), "durable fact", 0.6, BeliefType::Factual, 5, "owner").unwrap();
    let envelope = source.export().unwrap();

    let (_db2, destination) = test_memory();
    let first_import = destination.import(&envelope).unwrap();
    let second_import = destination.import(&envelope).unwrap();

    assert_eq!(first_import.beliefs, 1);
    assert_eq!(second_import.beliefs, 0, "re-importing the same envelope must skip existing ids");
    assert_eq!(destination.beliefs(None).unwrap().len(), 1);
}
