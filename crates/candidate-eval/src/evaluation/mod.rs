//! Candidate evaluation: scoring, adopt/reject/defer decisions, eureka promotion, and a
//! bounded decision ledger shared across concurrent callers.
//!
//! A call to [`EvaluationEngine::evaluate`] takes the per-evaluation-id lock, prunes the
//! ledger (TTL first, then capacity), scores the candidate, classifies it, attaches a
//! confidence, and appends the decision. Scoring failures never reach the caller: they are
//! answered by [`FallbackEvaluator`] with a fixed low confidence.

pub mod audit;
pub mod clock;
pub mod concurrency;
pub mod confidence;
pub mod criteria;
pub mod decision;
pub mod domain;
pub mod fallback;
pub mod ledger;
pub mod router;
pub mod scoring;
pub mod service;
pub mod stats;

#[cfg(test)]
mod tests;

pub use audit::{AuditEntry, AuditError, AuditSink, TracingAuditSink};
pub use clock::{Clock, ManualClock, SystemClock};
pub use concurrency::{
    ConcurrencyState, EvaluationPermit, InFlightGuard, KeyedLocks, KindActivity, LockTimeout,
    TallySnapshot,
};
pub use confidence::estimate_confidence;
pub use criteria::{CriteriaError, CriteriaStore, CriteriaWeights, EvaluationCriteria};
pub use decision::{combine, DecisionEngine, Verdict};
pub use domain::{
    Candidate, ComponentScores, Decision, DecisionOrigin, DecisionResult, DecisionScores,
    EvaluationContext, EvaluationId, EvaluationType, StrategyKind,
};
pub use fallback::{FallbackEvaluator, FallbackScorer, FALLBACK_CONFIDENCE};
pub use ledger::{EvaluationLedger, LedgerCounts};
pub use router::{evaluation_router, EvaluationRequest, RankRequest, RecentQuery};
pub use scoring::{score_candidate, ScoringError};
pub use service::{EvaluationEngine, RankedCandidate, Ranking, UnscoredCandidate};
pub use stats::StatisticsSnapshot;
