//! Decay and pruning (spec §8 scenario 5): effective confidence decays
//! exponentially since `updated_at`, and pruning only removes beliefs whose
//! effective confidence has dropped below the caller's threshold.

use chrono::Duration;
use recall_core::belief::{effective_confidence, store, BeliefStatus, BeliefType};
use recall_integration_tests::test_memory;

#[test]
fn thirty_days_halves_effective_confidence_and_prune_respects_threshold() {
    let (db, memory) = test_memory();
    let belief = store::create_belief(memory.storage(), "stmt", 0.8, BeliefType::Insight, 5, "owner").unwrap();

    db.clock.advance(Duration::days(30));

    let reloaded = store::get_belief(memory.storage(), &belief.id).unwrap();
    let now = memory.storage().clock().now();
    let eff = effective_confidence(reloaded.confidence, reloaded.stability, reloaded.updated_at, now);
    assert!((eff - 0.4).abs() < 0.01, "got {eff}");

    let pruned = memory.prune(0.3).unwrap();
    assert!(pruned.is_empty(), "0.3 threshold should not prune a belief at ~0.4 effective confidence");

    db.clock.advance(Duration::days(90));
    let reloaded = store::get_belief(memory.storage(), &belief.id).unwrap();
    let now = memory.storage().clock().now();
    let eff = effective_confidence(reloaded.confidence, reloaded.stability, reloaded.updated_at, now);
    assert!(eff < 0.1, "got {eff}");

    let pruned = memory.prune(0.1).unwrap();
    assert_eq!(pruned, vec![belief.id.clone()]);

    let reloaded = store::get_belief(memory.storage(), &belief.id).unwrap();
    assert_eq!(reloaded.status, BeliefStatus::Pruned);
}
