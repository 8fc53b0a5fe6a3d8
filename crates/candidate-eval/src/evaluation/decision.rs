use super::criteria::EvaluationCriteria;
use super::domain::{
    Candidate, ComponentScores, DecisionResult, DecisionScores, EvaluationType, StrategyKind,
};
use super::scoring::{score_candidate, ScoringError};

const EUREKA_COMPONENT_FLOOR: f64 = 0.8;
const BREAKTHROUGH_COMBINED: f64 = 0.9;
const BREAKTHROUGH_NOVELTY: f64 = 0.9;

/// Classification of a candidate before confidence and bookkeeping are attached.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub scores: DecisionScores,
    pub result: DecisionResult,
    pub eureka_detected: bool,
    pub evaluation_type: EvaluationType,
    pub reasoning: Vec<String>,
}

/// Combines component scores under the active criteria and applies the decision rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecisionEngine;

impl DecisionEngine {
    pub fn decide(
        &self,
        candidate: &Candidate,
        criteria: &EvaluationCriteria,
        current_performance: Option<f64>,
    ) -> Result<Verdict, ScoringError> {
        let scores = score_candidate(candidate, current_performance)?;
        Ok(self.classify(&candidate.strategy_kind(), &scores, criteria))
    }

    /// Apply eureka detection, then the adopt/reject thresholds. Eureka always wins.
    pub fn classify(
        &self,
        kind: &StrategyKind,
        scores: &ComponentScores,
        criteria: &EvaluationCriteria,
    ) -> Verdict {
        let combined = combine(scores, criteria);
        let mut reasoning = vec![format!(
            "combined {:.3} from performance {:.3}, novelty {:.3}, stability {:.3}, efficiency {:.3}",
            combined, scores.performance, scores.novelty, scores.stability, scores.efficiency
        )];

        if let Some(clause) = eureka_clause(scores, combined, criteria) {
            reasoning.push(clause);
            return Verdict {
                scores: scores.with_combined(combined),
                result: DecisionResult::EurekaPromote,
                eureka_detected: true,
                evaluation_type: EvaluationType::Eureka,
                reasoning,
            };
        }

        let result = if combined >= criteria.adopt_threshold {
            reasoning.push(format!(
                "adopt: combined {:.3} >= adopt threshold {:.3}",
                combined, criteria.adopt_threshold
            ));
            DecisionResult::Adopt
        } else if combined <= criteria.reject_threshold {
            reasoning.push(format!(
                "reject: combined {:.3} <= reject threshold {:.3}",
                combined, criteria.reject_threshold
            ));
            DecisionResult::Reject
        } else {
            reasoning.push(format!(
                "further test: combined {:.3} between reject threshold {:.3} and adopt threshold {:.3}",
                combined, criteria.reject_threshold, criteria.adopt_threshold
            ));
            DecisionResult::FurtherTest
        };

        let evaluation_type = evaluation_type_for(kind);
        if evaluation_type != EvaluationType::Standard {
            reasoning.push(format!(
                "{} candidates are tagged {:?}",
                kind.label(),
                evaluation_type
            ));
        }

        Verdict {
            scores: scores.with_combined(combined),
            result,
            eureka_detected: false,
            evaluation_type,
            reasoning,
        }
    }
}

/// Weighted sum of the component scores, clamped to `[0, 1]`.
pub fn combine(scores: &ComponentScores, criteria: &EvaluationCriteria) -> f64 {
    criteria.weights.apply(scores).clamp(0.0, 1.0)
}

fn eureka_clause(
    scores: &ComponentScores,
    combined: f64,
    criteria: &EvaluationCriteria,
) -> Option<String> {
    if combined >= criteria.eureka_threshold
        && scores.novelty >= EUREKA_COMPONENT_FLOOR
        && scores.performance >= EUREKA_COMPONENT_FLOOR
    {
        return Some(format!(
            "eureka: combined {:.3} >= eureka threshold {:.3} with novelty {:.3} and performance {:.3} >= {:.2}",
            combined,
            criteria.eureka_threshold,
            scores.novelty,
            scores.performance,
            EUREKA_COMPONENT_FLOOR
        ));
    }

    if combined >= BREAKTHROUGH_COMBINED && scores.novelty >= BREAKTHROUGH_NOVELTY {
        return Some(format!(
            "eureka: combined {:.3} >= {:.2} with novelty {:.3} >= {:.2}",
            combined, BREAKTHROUGH_COMBINED, scores.novelty, BREAKTHROUGH_NOVELTY
        ));
    }

    None
}

fn evaluation_type_for(kind: &StrategyKind) -> EvaluationType {
    match kind {
        StrategyKind::Intuition => EvaluationType::Eureka,
        StrategyKind::Fusion => EvaluationType::Comparative,
        StrategyKind::Predictive => EvaluationType::Predictive,
        StrategyKind::Analytical | StrategyKind::Other(_) => EvaluationType::Standard,
    }
}
