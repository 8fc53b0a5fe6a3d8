use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use chrono::Duration as ChronoDuration;

use super::common::*;
use crate::config::EngineSettings;
use crate::evaluation::domain::{
    DecisionOrigin, DecisionResult, EvaluationContext, EvaluationId, EvaluationType,
};
use crate::evaluation::{
    CriteriaError, EvaluationCriteria, EvaluationEngine, KindActivity, FALLBACK_CONFIDENCE,
};

#[test]
fn evaluation_records_decision_and_audit_entry() {
    let (engine, audit, _clock) = build_engine();

    let decision = engine.evaluate(
        &breakthrough_candidate("c-star"),
        None,
        &EvaluationContext::with_id("eval-star"),
    );

    assert_eq!(decision.result, DecisionResult::EurekaPromote);
    assert_eq!(decision.evaluation_id, EvaluationId("eval-star".to_string()));
    assert_eq!(decision.origin, DecisionOrigin::Primary);
    assert_eq!(decision.evaluation_type, EvaluationType::Eureka);
    assert_eq!(decision.timestamp, start());
    assert!(decision.confidence > FALLBACK_CONFIDENCE);

    assert_eq!(engine.recent_decisions(10), vec![decision.clone()]);
    assert_eq!(engine.decisions_for("c-star"), vec![decision.clone()]);
    assert_eq!(engine.eureka_ids(), vec!["c-star".to_string()]);
    assert!(engine.adopted_ids().is_empty());

    let entries = audit.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].candidate_id, "c-star");
    assert!(entries[0].eureka_detected);
    assert!(!entries[0].fallback);
    assert_eq!(entries[0].combined, decision.scores.combined);

    assert_eq!(engine.active_locks(), 0);
    assert_eq!(engine.state().activity("analytical").in_flight, 0);
}

#[test]
fn malformed_candidate_degrades_to_fallback() {
    let (engine, audit, _clock) = build_engine();

    let decision = engine.evaluate(
        &malformed_candidate("c-broken"),
        None,
        &EvaluationContext::default(),
    );

    assert_eq!(decision.origin, DecisionOrigin::Fallback);
    assert_eq!(decision.result, DecisionResult::Adopt);
    assert_eq!(decision.confidence, FALLBACK_CONFIDENCE);
    assert_eq!(engine.adopted_ids(), vec!["c-broken".to_string()]);

    let stats = engine.statistics();
    assert_eq!(stats.fallback_count, 1);
    assert_eq!(stats.error_decision_count, 0);
    assert_eq!(stats.total_evaluations, 1);
    assert_eq!(stats.adoption_rate, 1.0);
    assert_eq!(
        stats.activity.get("fusion"),
        Some(&KindActivity {
            in_flight: 0,
            errors: 1,
        })
    );

    assert!(audit.entries()[0].fallback);
}

#[test]
fn empty_engine_reports_zeroed_statistics() {
    let (engine, _audit, _clock) = build_engine();

    let stats = engine.statistics();

    assert_eq!(stats.total_evaluations, 0);
    assert_eq!(stats.adoption_rate, 0.0);
    assert_eq!(stats.rejection_rate, 0.0);
    assert_eq!(stats.eureka_rate, 0.0);
    assert_eq!(stats.further_test_rate, 0.0);
    assert_eq!(stats.average_confidence, 0.0);
    assert_eq!(stats.average_combined_score, 0.0);
    assert_eq!(stats.ledger_size, 0);
    assert!(stats.activity.is_empty());
}

#[test]
fn statistics_split_results_evenly() {
    let (engine, _audit, clock) = build_engine();

    for candidate in [
        breakthrough_candidate("c-1"),
        adoptable_candidate("c-2"),
        middling_candidate("c-3"),
        weak_candidate("c-4"),
    ] {
        engine.evaluate(&candidate, None, &EvaluationContext::default());
        clock.advance(minutes(1));
    }

    let stats = engine.statistics();
    assert_eq!(stats.total_evaluations, 4);
    assert_eq!(stats.eureka_rate, 0.25);
    assert_eq!(stats.adoption_rate, 0.25);
    assert_eq!(stats.further_test_rate, 0.25);
    assert_eq!(stats.rejection_rate, 0.25);
    assert_eq!(stats.ledger_size, 4);
    // (0.898 + 0.762 + 0.579 + 0.17) / 4
    assert!((stats.average_combined_score - 0.60225).abs() < 1e-9);
    assert!(stats.average_confidence > 0.0 && stats.average_confidence <= 1.0);
    assert_eq!(stats.activity["analytical"].errors, 0);
}

#[test]
fn invalid_criteria_update_keeps_previous_snapshot() {
    let (engine, _audit, _clock) = build_engine();

    let rejected = engine.update_criteria(EvaluationCriteria {
        adopt_threshold: 0.2,
        reject_threshold: 0.5,
        ..criteria()
    });

    assert_eq!(
        rejected,
        Err(CriteriaError::ThresholdOrder {
            reject: 0.5,
            adopt: 0.2,
        })
    );
    assert_eq!(*engine.criteria(), criteria());
}

#[test]
fn criteria_update_applies_to_the_next_evaluation() {
    let (engine, _audit, _clock) = build_engine();

    let before = engine.evaluate(&adoptable_candidate("c-1"), None, &EvaluationContext::default());
    engine
        .update_criteria(EvaluationCriteria {
            adopt_threshold: 0.95,
            ..criteria()
        })
        .expect("valid criteria");
    let after = engine.evaluate(&adoptable_candidate("c-1"), None, &EvaluationContext::default());

    assert_eq!(before.result, DecisionResult::Adopt);
    assert_eq!(after.result, DecisionResult::FurtherTest);
    assert_eq!(engine.criteria().adopt_threshold, 0.95);
}

#[test]
fn construction_rejects_invalid_criteria() {
    let result = EvaluationEngine::new(
        Arc::new(MemoryAudit::default()),
        EvaluationCriteria {
            max_candidates: 0,
            ..criteria()
        },
    );

    assert!(matches!(result, Err(CriteriaError::InvalidCapacity)));
}

#[test]
fn expired_decisions_are_dropped_before_scoring() {
    let (engine, _audit, clock) = build_engine_with(EvaluationCriteria {
        ttl_secs: 3600,
        ..criteria()
    });

    engine.evaluate(&adoptable_candidate("c-old"), None, &EvaluationContext::default());
    clock.advance(ChronoDuration::hours(2));
    engine.evaluate(&weak_candidate("c-new"), None, &EvaluationContext::default());

    let stats = engine.statistics();
    assert_eq!(stats.ledger_size, 1);
    assert_eq!(stats.expired_count, 1);
    assert!(engine.decisions_for("c-old").is_empty());
    assert!(engine.adopted_ids().is_empty());
    // tallies outlive the ledger entries
    assert_eq!(stats.total_evaluations, 2);
}

#[test]
fn expiry_sweep_respects_cleanup_interval() {
    let (engine, _audit, clock) = build_engine_with(EvaluationCriteria {
        ttl_secs: 3600,
        ..criteria()
    });
    let engine = engine.with_settings(&EngineSettings {
        cleanup_interval: ChronoDuration::hours(6),
        ..EngineSettings::default()
    });

    engine.evaluate(&weak_candidate("c-1"), None, &EvaluationContext::default());
    clock.advance(ChronoDuration::hours(2));
    engine.evaluate(&weak_candidate("c-2"), None, &EvaluationContext::default());
    assert_eq!(engine.statistics().ledger_size, 2);

    clock.advance(ChronoDuration::hours(5));
    engine.evaluate(&weak_candidate("c-3"), None, &EvaluationContext::default());

    let stats = engine.statistics();
    assert_eq!(stats.ledger_size, 1);
    assert_eq!(stats.expired_count, 2);
}

#[test]
fn capacity_is_enforced_before_each_evaluation() {
    let (engine, _audit, clock) = build_engine_with(EvaluationCriteria {
        max_candidates: 2,
        ..criteria()
    });

    for step in 0..4 {
        engine.evaluate(
            &weak_candidate(&format!("c-{step}")),
            None,
            &EvaluationContext::default(),
        );
        clock.advance(minutes(1));
    }

    // pruned to 2 before the last append
    let stats = engine.statistics();
    assert_eq!(stats.ledger_size, 3);
    assert_eq!(stats.evicted_count, 1);
    assert!(engine.decisions_for("c-0").is_empty());
    assert_eq!(engine.decisions_for("c-3").len(), 1);
}

#[test]
fn missing_evaluation_ids_are_generated() {
    let (engine, _audit, _clock) = build_engine();

    let first = engine.evaluate(&weak_candidate("c-1"), None, &EvaluationContext::default());
    let second = engine.evaluate(&weak_candidate("c-1"), None, &EvaluationContext::default());

    assert!(first.evaluation_id.0.starts_with("eval-"));
    assert!(second.evaluation_id.0.starts_with("eval-"));
    assert_ne!(first.evaluation_id, second.evaluation_id);
    assert_eq!(engine.decisions_for("c-1").len(), 2);
}

#[test]
fn ranking_orders_candidates_without_recording() {
    let (engine, audit, _clock) = build_engine();

    let ranking = engine.rank(
        &[
            middling_candidate("c-mid"),
            malformed_candidate("c-broken"),
            breakthrough_candidate("c-star"),
            adoptable_candidate("c-solid"),
        ],
        None,
    );

    let order: Vec<_> = ranking
        .ranked
        .iter()
        .map(|entry| (entry.rank, entry.candidate_id.as_str()))
        .collect();
    assert_eq!(order, vec![(1, "c-star"), (2, "c-solid"), (3, "c-mid")]);
    assert!(ranking.ranked[0].eureka_detected);
    assert_eq!(ranking.unscored.len(), 1);
    assert_eq!(ranking.unscored[0].candidate_id, "c-broken");

    assert_eq!(engine.statistics().total_evaluations, 0);
    assert!(audit.entries().is_empty());
}

#[test]
fn ranking_ties_break_on_candidate_id() {
    let (engine, _audit, _clock) = build_engine();

    let ranking = engine.rank(&[weak_candidate("b"), weak_candidate("a")], None);

    assert_eq!(ranking.ranked[0].candidate_id, "a");
    assert_eq!(ranking.ranked[1].candidate_id, "b");
}

#[test]
fn audit_failures_do_not_fail_evaluation() {
    let engine = EvaluationEngine::new(Arc::new(OfflineAudit), criteria()).expect("valid criteria");

    let decision = engine.evaluate(&adoptable_candidate("c-1"), None, &EvaluationContext::default());

    assert_eq!(decision.result, DecisionResult::Adopt);
    assert_eq!(engine.recent_decisions(5).len(), 1);
}

#[test]
fn busy_evaluation_id_times_out_into_fallback() {
    let (engine, _audit, _clock) = build_engine();
    let engine = engine.with_settings(&EngineSettings {
        lock_timeout: Some(Duration::from_millis(20)),
        ..EngineSettings::default()
    });
    let busy = EvaluationId("eval-busy".to_string());

    let held = engine
        .lock_registry()
        .acquire(&busy, None)
        .expect("free id");
    let decision = engine.evaluate(
        &adoptable_candidate("c-1"),
        None,
        &EvaluationContext::with_id("eval-busy"),
    );
    drop(held);

    assert_eq!(decision.origin, DecisionOrigin::Fallback);
    assert_eq!(decision.confidence, FALLBACK_CONFIDENCE);
    assert_eq!(decision.evaluation_id, busy);

    let stats = engine.statistics();
    assert_eq!(stats.fallback_count, 1);
    assert_eq!(
        stats.activity.get("analytical"),
        Some(&KindActivity {
            in_flight: 0,
            errors: 1,
        })
    );
    assert_eq!(engine.active_locks(), 0);
}

#[test]
fn timed_out_evaluations_still_respect_capacity() {
    let (engine, _audit, clock) = build_engine_with(EvaluationCriteria {
        max_candidates: 2,
        ..criteria()
    });
    let engine = engine.with_settings(&EngineSettings {
        lock_timeout: Some(Duration::from_millis(5)),
        ..EngineSettings::default()
    });
    let busy = EvaluationId("eval-busy".to_string());
    let held = engine
        .lock_registry()
        .acquire(&busy, None)
        .expect("free id");

    for step in 0..10 {
        let decision = engine.evaluate(
            &weak_candidate(&format!("c-{step}")),
            None,
            &EvaluationContext::with_id("eval-busy"),
        );
        assert_eq!(decision.origin, DecisionOrigin::Fallback);
        clock.advance(minutes(1));
    }
    drop(held);

    // pruned to 2 before each append
    let stats = engine.statistics();
    assert_eq!(stats.ledger_size, 3);
    assert_eq!(stats.evicted_count, 7);
    assert_eq!(stats.fallback_count, 10);
    assert!(engine.decisions_for("c-0").is_empty());
    assert_eq!(engine.decisions_for("c-9").len(), 1);
}

#[test]
fn panicking_audit_sink_does_not_escape_evaluate() {
    let engine =
        EvaluationEngine::new(Arc::new(PanickingAudit), criteria()).expect("valid criteria");

    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        engine.evaluate(&adoptable_candidate("c-1"), None, &EvaluationContext::default())
    }));

    let decision = outcome.expect("evaluate returns despite the sink");
    assert_eq!(decision.result, DecisionResult::Adopt);
    assert_eq!(engine.recent_decisions(5), vec![decision]);
    assert_eq!(engine.statistics().total_evaluations, 1);
    assert_eq!(engine.state().activity("analytical").in_flight, 0);
    assert_eq!(engine.active_locks(), 0);
}

#[test]
fn panic_during_primary_scoring_falls_back() {
    let (engine, audit, _clock) = build_engine();
    // first read prunes the ledger, the second stamps the primary decision
    let engine = engine.with_clock(Arc::new(FailingReadClock::new(2)));

    let decision = engine.evaluate(&adoptable_candidate("c-1"), None, &EvaluationContext::default());

    assert_eq!(decision.origin, DecisionOrigin::Fallback);
    assert_eq!(decision.confidence, FALLBACK_CONFIDENCE);
    let stats = engine.statistics();
    assert_eq!(stats.fallback_count, 1);
    assert_eq!(stats.ledger_size, 1);
    assert_eq!(
        stats.activity.get("analytical"),
        Some(&KindActivity {
            in_flight: 0,
            errors: 1,
        })
    );
    assert!(audit.entries()[0].fallback);
}

#[test]
fn failing_fallback_returns_error_decision() {
    let (engine, audit, _clock) = build_engine();
    let engine = engine.with_fallback(Arc::new(PanickingFallback));

    let decision = engine.evaluate(
        &malformed_candidate("c-broken"),
        None,
        &EvaluationContext::with_id("eval-broken"),
    );

    assert_eq!(decision.origin, DecisionOrigin::Error);
    assert_eq!(decision.result, DecisionResult::Reject);
    assert_eq!(decision.confidence, 0.0);
    assert_eq!(decision.scores.combined, 0.0);
    assert_eq!(decision.reasoning, vec!["evaluation error".to_string()]);
    assert_eq!(decision.evaluation_id, EvaluationId("eval-broken".to_string()));

    let stats = engine.statistics();
    assert_eq!(stats.error_decision_count, 1);
    assert_eq!(stats.fallback_count, 0);
    assert_eq!(stats.total_evaluations, 0);
    assert_eq!(stats.ledger_size, 0);
    assert_eq!(
        stats.activity.get("fusion"),
        Some(&KindActivity {
            in_flight: 0,
            errors: 1,
        })
    );
    assert!(audit.entries().is_empty());
    assert_eq!(engine.active_locks(), 0);
}
