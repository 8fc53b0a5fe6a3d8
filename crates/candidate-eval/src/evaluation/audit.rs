use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{Decision, DecisionResult, DecisionScores, EvaluationId};
use crate::telemetry::AUDIT_TARGET;

/// Record forwarded to the audit log for every decision that reaches the ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub candidate_id: String,
    pub evaluation_id: EvaluationId,
    pub scores: DecisionScores,
    pub combined: f64,
    pub result: DecisionResult,
    pub confidence: f64,
    pub eureka_detected: bool,
    pub fallback: bool,
    pub timestamp: DateTime<Utc>,
}

impl From<&Decision> for AuditEntry {
    fn from(decision: &Decision) -> Self {
        Self {
            candidate_id: decision.candidate_id.clone(),
            evaluation_id: decision.evaluation_id.clone(),
            scores: decision.scores,
            combined: decision.scores.combined,
            result: decision.result,
            confidence: decision.confidence,
            eureka_detected: decision.eureka_detected,
            fallback: decision.is_fallback(),
            timestamp: decision.timestamp,
        }
    }
}

/// Outbound hook for the append-only audit log kept by another system.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("audit transport unavailable: {0}")]
    Transport(String),
}

/// Emits each entry as a structured `tracing` event on the audit target.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        info!(
            target: AUDIT_TARGET,
            candidate_id = %entry.candidate_id,
            evaluation_id = %entry.evaluation_id,
            performance = entry.scores.performance,
            novelty = entry.scores.novelty,
            stability = entry.scores.stability,
            efficiency = entry.scores.efficiency,
            combined = entry.combined,
            result = entry.result.label(),
            confidence = entry.confidence,
            eureka_detected = entry.eureka_detected,
            fallback = entry.fallback,
            timestamp = %entry.timestamp,
            "decision recorded"
        );
        Ok(())
    }
}
