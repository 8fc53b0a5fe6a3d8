use std::collections::BTreeMap;

use super::domain::{Candidate, ComponentScores, StrategyKind};

pub(crate) const EXPECTED_PERFORMANCE: &str = "expected_performance";
pub(crate) const PRIORITY: &str = "priority";
pub(crate) const NOVELTY: &str = "novelty";
pub(crate) const COMPLEXITY: &str = "complexity";

const IMPROVEMENT_SCALE: f64 = 0.3;
const COMPLEXITY_SCALE: f64 = 0.2;
const DEFAULT_COMPLEXITY: f64 = 0.5;
const DEFAULT_PRIORITY: f64 = 0.5;

/// Per-kind constants feeding the component scores.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct KindProfile {
    pub performance_weight: f64,
    pub novelty: f64,
    pub stability: f64,
    pub efficiency: f64,
}

pub(crate) fn kind_profile(kind: &StrategyKind) -> KindProfile {
    match kind {
        StrategyKind::Intuition => KindProfile {
            performance_weight: 0.7,
            novelty: 0.9,
            stability: 0.5,
            efficiency: 0.6,
        },
        StrategyKind::Fusion => KindProfile {
            performance_weight: 0.85,
            novelty: 0.8,
            stability: 0.6,
            efficiency: 0.65,
        },
        StrategyKind::Analytical => KindProfile {
            performance_weight: 0.9,
            novelty: 0.6,
            stability: 0.8,
            efficiency: 0.7,
        },
        StrategyKind::Predictive => KindProfile {
            performance_weight: 0.8,
            novelty: 0.7,
            stability: 0.7,
            efficiency: 0.8,
        },
        StrategyKind::Other(_) => KindProfile {
            performance_weight: 0.8,
            novelty: 0.7,
            stability: 0.65,
            efficiency: 0.7,
        },
    }
}

/// Raised when a candidate carries values the primary scorer cannot work with.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("indicator '{key}' in {map} indicators is not a finite number")]
    NonFiniteIndicator { map: &'static str, key: String },
    #[error("confidence hint is not a finite number")]
    NonFiniteConfidenceHint,
    #[error("baseline performance is not a finite number")]
    NonFiniteBaseline,
    #[error("scoring panicked: {0}")]
    Panicked(String),
}

fn check_finite(map: &'static str, indicators: &BTreeMap<String, f64>) -> Result<(), ScoringError> {
    match indicators.iter().find(|(_, value)| !value.is_finite()) {
        Some((key, _)) => Err(ScoringError::NonFiniteIndicator {
            map,
            key: key.clone(),
        }),
        None => Ok(()),
    }
}

fn c01(v: f64) -> f64 {
    v.clamp(0.0, 1.0)
}

/// Compute the four component scores for a candidate.
///
/// Missing indicators fall back to defaults; only non-finite inputs are errors.
pub fn score_candidate(
    candidate: &Candidate,
    current_performance: Option<f64>,
) -> Result<ComponentScores, ScoringError> {
    check_finite("performance", &candidate.performance_indicators)?;
    check_finite("novelty", &candidate.novelty_indicators)?;
    if !candidate.confidence_hint.is_finite() {
        return Err(ScoringError::NonFiniteConfidenceHint);
    }
    if current_performance.is_some_and(|baseline| !baseline.is_finite()) {
        return Err(ScoringError::NonFiniteBaseline);
    }

    let profile = kind_profile(&candidate.strategy_kind());

    Ok(ComponentScores {
        performance: performance_score(candidate, &profile, current_performance),
        novelty: novelty_score(candidate, &profile),
        stability: stability_score(candidate, &profile),
        efficiency: efficiency_score(candidate, &profile),
    })
}

fn performance_score(
    candidate: &Candidate,
    profile: &KindProfile,
    current_performance: Option<f64>,
) -> f64 {
    let base = candidate
        .performance_indicators
        .get(EXPECTED_PERFORMANCE)
        .copied()
        .unwrap_or(candidate.confidence_hint);

    let adjusted = match current_performance {
        Some(current) if current > 0.0 => base + IMPROVEMENT_SCALE * (base - current) / current,
        _ => base,
    };

    c01(adjusted * profile.performance_weight)
}

fn novelty_score(candidate: &Candidate, profile: &KindProfile) -> f64 {
    let reported = candidate
        .novelty_indicators
        .get(NOVELTY)
        .copied()
        .unwrap_or(profile.novelty);
    let complexity = candidate
        .novelty_indicators
        .get(COMPLEXITY)
        .copied()
        .unwrap_or(DEFAULT_COMPLEXITY);

    let blended = (reported + profile.novelty) / 2.0;
    c01(blended * (1.0 + complexity * COMPLEXITY_SCALE))
}

fn stability_score(candidate: &Candidate, profile: &KindProfile) -> f64 {
    c01((profile.stability + candidate.confidence_hint) / 2.0)
}

fn efficiency_score(candidate: &Candidate, profile: &KindProfile) -> f64 {
    let priority = candidate
        .performance_indicators
        .get(PRIORITY)
        .copied()
        .unwrap_or(DEFAULT_PRIORITY);
    c01(profile.efficiency * priority)
}
