use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use super::domain::{
    Candidate, Decision, DecisionOrigin, DecisionResult, DecisionScores, EvaluationContext,
    EvaluationId, EvaluationType,
};

/// Confidence attached to every degraded decision.
pub const FALLBACK_CONFIDENCE: f64 = 0.3;

const DEFAULT_FACTOR: f64 = 0.5;
const ADOPT_ABOVE: f64 = 0.7;
const FURTHER_TEST_ABOVE: f64 = 0.5;

/// Scorer the engine falls back to when primary scoring fails.
pub trait FallbackScorer: Send + Sync {
    fn score(
        &self,
        candidate: &Candidate,
        current_performance: Option<f64>,
        context: &EvaluationContext,
        evaluation_id: EvaluationId,
        timestamp: DateTime<Utc>,
    ) -> Decision;
}

/// Reduced scorer used when the primary pipeline fails.
///
/// Only averages the finite values it finds, so it has nothing left to fail on.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallbackEvaluator;

impl FallbackEvaluator {
    pub fn evaluate(
        &self,
        candidate: &Candidate,
        current_performance: Option<f64>,
        context: &EvaluationContext,
        evaluation_id: EvaluationId,
        timestamp: DateTime<Utc>,
    ) -> Decision {
        let performance = finite_mean(&candidate.performance_indicators);
        let novelty = finite_mean(&candidate.novelty_indicators);
        let combined = (performance * 0.6 + novelty * 0.4).clamp(0.0, 1.0);

        let result = if combined > ADOPT_ABOVE {
            DecisionResult::Adopt
        } else if combined > FURTHER_TEST_ABOVE {
            DecisionResult::FurtherTest
        } else {
            DecisionResult::Reject
        };

        let mut reasoning = vec![
            "fallback evaluation: primary scoring unavailable".to_string(),
            format!(
                "combined {:.3} = performance {:.3} * 0.6 + novelty {:.3} * 0.4",
                combined, performance, novelty
            ),
            match result {
                DecisionResult::Adopt => format!("adopt: combined {combined:.3} > {ADOPT_ABOVE:.2}"),
                DecisionResult::FurtherTest => {
                    format!("further test: combined {combined:.3} > {FURTHER_TEST_ABOVE:.2}")
                }
                _ => format!("reject: combined {combined:.3} <= {FURTHER_TEST_ABOVE:.2}"),
            },
        ];
        if let Some(baseline) = current_performance.filter(|value| value.is_finite()) {
            reasoning.push(format!("baseline performance {baseline:.3} not applied"));
        }
        if !context.attributes.is_empty() {
            reasoning.push(format!(
                "context attributes: {}",
                context
                    .attributes
                    .keys()
                    .map(String::as_str)
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }

        Decision {
            candidate_id: candidate.id.clone(),
            evaluation_id,
            scores: DecisionScores {
                performance,
                novelty,
                stability: 0.0,
                efficiency: 0.0,
                combined,
            },
            result,
            confidence: FALLBACK_CONFIDENCE,
            reasoning,
            eureka_detected: false,
            evaluation_type: EvaluationType::Standard,
            origin: DecisionOrigin::Fallback,
            timestamp,
        }
    }
}

impl FallbackScorer for FallbackEvaluator {
    fn score(
        &self,
        candidate: &Candidate,
        current_performance: Option<f64>,
        context: &EvaluationContext,
        evaluation_id: EvaluationId,
        timestamp: DateTime<Utc>,
    ) -> Decision {
        self.evaluate(candidate, current_performance, context, evaluation_id, timestamp)
    }
}

fn finite_mean(values: &BTreeMap<String, f64>) -> f64 {
    let (sum, count) = values
        .values()
        .filter(|value| value.is_finite())
        .fold((0.0, 0usize), |(sum, count), value| (sum + value, count + 1));

    let mean = sum / count as f64;
    if count == 0 || !mean.is_finite() {
        DEFAULT_FACTOR
    } else {
        mean.clamp(0.0, 1.0)
    }
}
