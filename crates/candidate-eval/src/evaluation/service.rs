use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::audit::{AuditEntry, AuditSink};
use super::clock::{Clock, SystemClock};
use super::concurrency::{ConcurrencyState, KeyedLocks};
use super::confidence::estimate_confidence;
use super::criteria::{CriteriaError, CriteriaStore, EvaluationCriteria};
use super::decision::DecisionEngine;
use super::domain::{
    Candidate, Decision, DecisionOrigin, DecisionResult, DecisionScores, EvaluationContext,
    EvaluationId,
};
use super::fallback::{FallbackEvaluator, FallbackScorer};
use super::ledger::EvaluationLedger;
use super::scoring::ScoringError;
use super::stats::{aggregate, StatisticsSnapshot};
use crate::config::EngineSettings;

static EVALUATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_evaluation_id() -> EvaluationId {
    let id = EVALUATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    EvaluationId(format!("eval-{id:06}"))
}

/// Engine composing criteria, scoring, the ledger, and the audit hook.
///
/// [`EvaluationEngine::evaluate`] is total: scoring failures degrade to the fallback
/// scorer and, failing that, to a fixed error decision.
pub struct EvaluationEngine<A> {
    criteria: CriteriaStore,
    ledger: Mutex<EvaluationLedger>,
    locks: KeyedLocks,
    state: Arc<ConcurrencyState>,
    audit: Arc<A>,
    clock: Arc<dyn Clock>,
    decisions: DecisionEngine,
    fallback: Arc<dyn FallbackScorer>,
    cleanup_interval: chrono::Duration,
    lock_timeout: Option<Duration>,
}

/// One entry of a comparative ranking.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedCandidate {
    pub rank: usize,
    pub candidate_id: String,
    pub scores: DecisionScores,
    pub result: DecisionResult,
    pub confidence: f64,
    pub eureka_detected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnscoredCandidate {
    pub candidate_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Ranking {
    pub ranked: Vec<RankedCandidate>,
    pub unscored: Vec<UnscoredCandidate>,
}

impl<A> EvaluationEngine<A>
where
    A: AuditSink + 'static,
{
    pub fn new(audit: Arc<A>, criteria: EvaluationCriteria) -> Result<Self, CriteriaError> {
        let defaults = EngineSettings::default();
        Ok(Self {
            criteria: CriteriaStore::new(criteria)?,
            ledger: Mutex::new(EvaluationLedger::new()),
            locks: KeyedLocks::new(),
            state: Arc::new(ConcurrencyState::new()),
            audit,
            clock: Arc::new(SystemClock),
            decisions: DecisionEngine,
            fallback: Arc::new(FallbackEvaluator),
            cleanup_interval: defaults.cleanup_interval,
            lock_timeout: defaults.lock_timeout,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the scorer used when primary scoring fails.
    pub fn with_fallback(mut self, fallback: Arc<dyn FallbackScorer>) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_state(mut self, state: Arc<ConcurrencyState>) -> Self {
        self.state = state;
        self
    }

    /// Apply the cleanup cadence and lock wait bound from loaded settings.
    pub fn with_settings(mut self, settings: &EngineSettings) -> Self {
        self.cleanup_interval = settings.cleanup_interval;
        self.lock_timeout = settings.lock_timeout;
        self
    }

    pub fn evaluate(
        &self,
        candidate: &Candidate,
        current_performance: Option<f64>,
        context: &EvaluationContext,
    ) -> Decision {
        let evaluation_id = context
            .evaluation_id
            .clone()
            .unwrap_or_else(next_evaluation_id);
        let strategy_kind = candidate.strategy_kind();
        let kind = strategy_kind.label();

        let _permit = match self.locks.acquire(&evaluation_id, self.lock_timeout) {
            Ok(permit) => permit,
            Err(timeout) => {
                warn!(
                    %evaluation_id,
                    candidate_id = %candidate.id,
                    %timeout,
                    "evaluation lock wait timed out"
                );
                let _in_flight = self.state.enter(kind);
                self.state.record_error(kind);
                self.prune(&self.criteria.snapshot());
                return self.degrade(candidate, current_performance, context, evaluation_id);
            }
        };
        let _in_flight = self.state.enter(kind);

        let criteria = self.criteria.snapshot();
        self.prune(&criteria);

        let primary = panic::catch_unwind(AssertUnwindSafe(|| {
            self.primary(candidate, &criteria, current_performance, &evaluation_id)
        }))
        .unwrap_or_else(|payload| Err(ScoringError::Panicked(panic_message(payload.as_ref()))));

        match primary {
            Ok(decision) => {
                self.state.record_result(decision.result);
                self.commit(&decision);
                decision
            }
            Err(err) => {
                warn!(
                    %evaluation_id,
                    candidate_id = %candidate.id,
                    error = %err,
                    "primary evaluation failed, using fallback"
                );
                self.state.record_error(kind);
                self.degrade(candidate, current_performance, context, evaluation_id)
            }
        }
    }

    /// Replace the criteria snapshot. Invalid criteria leave the current snapshot active.
    pub fn update_criteria(&self, criteria: EvaluationCriteria) -> Result<(), CriteriaError> {
        match self.criteria.replace(criteria) {
            Ok(()) => {
                let current = self.criteria.snapshot();
                info!(
                    adopt = current.adopt_threshold,
                    reject = current.reject_threshold,
                    eureka = current.eureka_threshold,
                    max_candidates = current.max_candidates,
                    ttl_secs = current.ttl_secs,
                    "evaluation criteria replaced"
                );
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "rejected criteria update");
                Err(err)
            }
        }
    }

    pub fn criteria(&self) -> Arc<EvaluationCriteria> {
        self.criteria.snapshot()
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        let tallies = self.state.tallies();
        let activity = self.state.activity_by_kind();
        let ledger = self.ledger.lock();
        aggregate(tallies, &ledger, activity)
    }

    /// Most recent decisions first.
    pub fn recent_decisions(&self, limit: usize) -> Vec<Decision> {
        self.ledger.lock().recent(limit)
    }

    pub fn decisions_for(&self, candidate_id: &str) -> Vec<Decision> {
        self.ledger.lock().for_candidate(candidate_id)
    }

    pub fn adopted_ids(&self) -> Vec<String> {
        self.ledger.lock().adopted_ids().to_vec()
    }

    pub fn eureka_ids(&self) -> Vec<String> {
        self.ledger.lock().eureka_ids().to_vec()
    }

    pub fn state(&self) -> &ConcurrencyState {
        &self.state
    }

    pub fn active_locks(&self) -> usize {
        self.locks.active()
    }

    pub(crate) fn lock_registry(&self) -> &KeyedLocks {
        &self.locks
    }

    /// Score several candidates side by side without recording anything.
    ///
    /// Ordered by combined score, then novelty, then candidate id.
    pub fn rank(&self, candidates: &[Candidate], current_performance: Option<f64>) -> Ranking {
        let criteria = self.criteria.snapshot();
        let mut ranking = Ranking::default();

        for candidate in candidates {
            match self
                .decisions
                .decide(candidate, &criteria, current_performance)
            {
                Ok(verdict) => {
                    let confidence = estimate_confidence(&verdict.scores.components());
                    ranking.ranked.push(RankedCandidate {
                        rank: 0,
                        candidate_id: candidate.id.clone(),
                        scores: verdict.scores,
                        result: verdict.result,
                        confidence,
                        eureka_detected: verdict.eureka_detected,
                    });
                }
                Err(err) => ranking.unscored.push(UnscoredCandidate {
                    candidate_id: candidate.id.clone(),
                    reason: err.to_string(),
                }),
            }
        }

        ranking.ranked.sort_by(|a, b| {
            b.scores
                .combined
                .total_cmp(&a.scores.combined)
                .then_with(|| b.scores.novelty.total_cmp(&a.scores.novelty))
                .then_with(|| a.candidate_id.cmp(&b.candidate_id))
        });
        for (index, entry) in ranking.ranked.iter_mut().enumerate() {
            entry.rank = index + 1;
        }
        ranking
    }

    fn primary(
        &self,
        candidate: &Candidate,
        criteria: &EvaluationCriteria,
        current_performance: Option<f64>,
        evaluation_id: &EvaluationId,
    ) -> Result<Decision, ScoringError> {
        let verdict = self
            .decisions
            .decide(candidate, criteria, current_performance)?;
        let confidence = estimate_confidence(&verdict.scores.components());

        Ok(Decision {
            candidate_id: candidate.id.clone(),
            evaluation_id: evaluation_id.clone(),
            scores: verdict.scores,
            result: verdict.result,
            confidence,
            reasoning: verdict.reasoning,
            eureka_detected: verdict.eureka_detected,
            evaluation_type: verdict.evaluation_type,
            origin: DecisionOrigin::Primary,
            timestamp: self.clock.now(),
        })
    }

    fn degrade(
        &self,
        candidate: &Candidate,
        current_performance: Option<f64>,
        context: &EvaluationContext,
        evaluation_id: EvaluationId,
    ) -> Decision {
        let timestamp = self.clock.now();
        let attempt = panic::catch_unwind(AssertUnwindSafe(|| {
            self.fallback.score(
                candidate,
                current_performance,
                context,
                evaluation_id.clone(),
                timestamp,
            )
        }));

        match attempt {
            Ok(decision) => {
                self.state.record_fallback();
                self.state.record_result(decision.result);
                self.commit(&decision);
                decision
            }
            Err(payload) => {
                error!(
                    %evaluation_id,
                    candidate_id = %candidate.id,
                    panic = %panic_message(payload.as_ref()),
                    "fallback evaluation failed"
                );
                self.state.record_error_decision();
                Decision::evaluation_error(candidate.id.clone(), evaluation_id, timestamp)
            }
        }
    }

    fn prune(&self, criteria: &EvaluationCriteria) {
        let now = self.clock.now();
        let mut ledger = self.ledger.lock();

        if let Some(expired) =
            ledger.maybe_cleanup_expired(now, criteria.ttl(), self.cleanup_interval)
        {
            if expired > 0 {
                info!(expired, ttl_secs = criteria.ttl_secs, "expired decisions removed");
            }
        }

        let evicted = ledger.enforce_max_candidates(criteria.max_candidates);
        if evicted > 0 {
            info!(
                evicted,
                max_candidates = criteria.max_candidates,
                "ledger trimmed to capacity"
            );
        }
    }

    fn commit(&self, decision: &Decision) {
        self.ledger.lock().append(decision.clone());

        debug!(
            evaluation_id = %decision.evaluation_id,
            candidate_id = %decision.candidate_id,
            result = decision.result.label(),
            combined = decision.scores.combined,
            confidence = decision.confidence,
            fallback = decision.is_fallback(),
            "decision appended"
        );

        let entry = AuditEntry::from(decision);
        match panic::catch_unwind(AssertUnwindSafe(|| self.audit.record(entry))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(
                evaluation_id = %decision.evaluation_id,
                error = %err,
                "audit sink rejected entry"
            ),
            Err(payload) => error!(
                evaluation_id = %decision.evaluation_id,
                panic = %panic_message(payload.as_ref()),
                "audit sink panicked"
            ),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
