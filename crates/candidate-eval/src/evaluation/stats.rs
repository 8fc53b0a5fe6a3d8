use std::collections::BTreeMap;

use serde::Serialize;

use super::concurrency::{KindActivity, TallySnapshot};
use super::ledger::EvaluationLedger;

/// Aggregate view over the ledger and the engine counters.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsSnapshot {
    pub total_evaluations: u64,
    pub adoption_rate: f64,
    pub rejection_rate: f64,
    pub eureka_rate: f64,
    pub further_test_rate: f64,
    pub average_confidence: f64,
    pub average_combined_score: f64,
    pub ledger_size: usize,
    pub expired_count: u64,
    pub evicted_count: u64,
    pub fallback_count: u64,
    pub error_decision_count: u64,
    pub activity: BTreeMap<String, KindActivity>,
}

pub(crate) fn aggregate(
    tallies: TallySnapshot,
    ledger: &EvaluationLedger,
    activity: BTreeMap<String, KindActivity>,
) -> StatisticsSnapshot {
    let total = tallies.total();
    let rate = |count: u64| {
        if total == 0 {
            0.0
        } else {
            count as f64 / total as f64
        }
    };

    let (confidence_sum, combined_sum) = ledger.iter().fold((0.0, 0.0), |(conf, comb), entry| {
        (conf + entry.confidence, comb + entry.scores.combined)
    });
    let average = |sum: f64| {
        if ledger.is_empty() {
            0.0
        } else {
            sum / ledger.len() as f64
        }
    };

    let counts = ledger.counts();

    StatisticsSnapshot {
        total_evaluations: total,
        adoption_rate: rate(tallies.adoptions),
        rejection_rate: rate(tallies.rejections),
        eureka_rate: rate(tallies.eureka_detections),
        further_test_rate: rate(tallies.further_tests),
        average_confidence: average(confidence_sum),
        average_combined_score: average(combined_sum),
        ledger_size: counts.size,
        expired_count: counts.expired,
        evicted_count: counts.evicted,
        fallback_count: tallies.fallbacks,
        error_decision_count: tallies.error_decisions,
        activity,
    }
}
