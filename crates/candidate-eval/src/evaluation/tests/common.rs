use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::evaluation::audit::{AuditEntry, AuditError, AuditSink};
use crate::evaluation::clock::{Clock, ManualClock};
use crate::evaluation::domain::{
    Candidate, Decision, DecisionOrigin, DecisionResult, DecisionScores, EvaluationContext,
    EvaluationId, EvaluationType,
};
use crate::evaluation::fallback::FallbackScorer;
use crate::evaluation::{EvaluationCriteria, EvaluationEngine};

pub(super) fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0)
        .single()
        .expect("valid start time")
}

pub(super) fn criteria() -> EvaluationCriteria {
    EvaluationCriteria::default()
}

/// High-performing, highly novel analytical candidate.
pub(super) fn breakthrough_candidate(id: &str) -> Candidate {
    Candidate::new(id, "analytical")
        .with_performance("expected_performance", 1.0)
        .with_performance("priority", 1.0)
        .with_novelty("novelty", 1.0)
        .with_novelty("complexity", 1.0)
        .with_confidence_hint(1.0)
}

/// Clears the adopt threshold without meeting either eureka rule.
pub(super) fn adoptable_candidate(id: &str) -> Candidate {
    Candidate::new(id, "analytical")
        .with_performance("expected_performance", 0.9)
        .with_performance("priority", 1.0)
        .with_novelty("novelty", 0.6)
        .with_confidence_hint(0.9)
}

/// Candidate that lands in the further-test band under default criteria.
pub(super) fn middling_candidate(id: &str) -> Candidate {
    Candidate::new(id, "analytical")
        .with_performance("expected_performance", 0.6)
        .with_confidence_hint(0.5)
}

pub(super) fn weak_candidate(id: &str) -> Candidate {
    Candidate::new(id, "analytical")
        .with_performance("expected_performance", 0.0)
        .with_performance("priority", 0.0)
        .with_novelty("novelty", 0.0)
        .with_novelty("complexity", 0.0)
        .with_confidence_hint(0.0)
}

pub(super) fn malformed_candidate(id: &str) -> Candidate {
    Candidate::new(id, "fusion")
        .with_performance("expected_performance", f64::NAN)
        .with_performance("latency_gain", 0.9)
        .with_novelty("novelty", 0.8)
}

pub(super) fn decision_at(
    candidate_id: &str,
    result: DecisionResult,
    timestamp: DateTime<Utc>,
) -> Decision {
    Decision {
        candidate_id: candidate_id.to_string(),
        evaluation_id: EvaluationId(format!("eval-{candidate_id}")),
        scores: DecisionScores {
            performance: 0.5,
            novelty: 0.5,
            stability: 0.5,
            efficiency: 0.5,
            combined: 0.5,
        },
        result,
        confidence: 0.6,
        reasoning: vec!["fixture".to_string()],
        eureka_detected: result == DecisionResult::EurekaPromote,
        evaluation_type: EvaluationType::Standard,
        origin: DecisionOrigin::Primary,
        timestamp,
    }
}

pub(super) fn minutes(count: i64) -> Duration {
    Duration::minutes(count)
}

pub(super) fn build_engine() -> (
    EvaluationEngine<MemoryAudit>,
    Arc<MemoryAudit>,
    Arc<ManualClock>,
) {
    build_engine_with(criteria())
}

pub(super) fn build_engine_with(
    criteria: EvaluationCriteria,
) -> (
    EvaluationEngine<MemoryAudit>,
    Arc<MemoryAudit>,
    Arc<ManualClock>,
) {
    let audit = Arc::new(MemoryAudit::default());
    let clock = Arc::new(ManualClock::new(start()));
    let engine = EvaluationEngine::new(audit.clone(), criteria)
        .expect("valid criteria")
        .with_clock(clock.clone());
    (engine, audit, clock)
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

#[derive(Default, Clone)]
pub(super) struct MemoryAudit {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAudit {
    pub(super) fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit mutex poisoned").clone()
    }
}

impl AuditSink for MemoryAudit {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        self.entries
            .lock()
            .expect("audit mutex poisoned")
            .push(entry);
        Ok(())
    }
}

pub(super) struct OfflineAudit;

impl AuditSink for OfflineAudit {
    fn record(&self, _entry: AuditEntry) -> Result<(), AuditError> {
        Err(AuditError::Transport("log shipper offline".to_string()))
    }
}

pub(super) struct PanickingAudit;

impl AuditSink for PanickingAudit {
    fn record(&self, _entry: AuditEntry) -> Result<(), AuditError> {
        panic!("audit sink crashed");
    }
}

pub(super) struct PanickingFallback;

impl FallbackScorer for PanickingFallback {
    fn score(
        &self,
        _candidate: &Candidate,
        _current_performance: Option<f64>,
        _context: &EvaluationContext,
        _evaluation_id: EvaluationId,
        _timestamp: DateTime<Utc>,
    ) -> Decision {
        panic!("fallback scorer crashed");
    }
}

/// Fixed clock that panics on exactly one read, counted from 1.
pub(super) struct FailingReadClock {
    reads: AtomicUsize,
    fail_on: usize,
}

impl FailingReadClock {
    pub(super) fn new(fail_on: usize) -> Self {
        Self {
            reads: AtomicUsize::new(0),
            fail_on,
        }
    }
}

impl Clock for FailingReadClock {
    fn now(&self) -> DateTime<Utc> {
        let read = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if read == self.fail_on {
            panic!("clock read {read} failed");
        }
        start()
    }
}
