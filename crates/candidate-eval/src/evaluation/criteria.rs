use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use super::domain::ComponentScores;

/// Upper bound accepted for `ttl_secs` (ten years).
pub(crate) const MAX_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Relative weight of each component in the combined score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriteriaWeights {
    pub performance: f64,
    pub novelty: f64,
    pub stability: f64,
    pub efficiency: f64,
}

impl Default for CriteriaWeights {
    fn default() -> Self {
        Self {
            performance: 0.4,
            novelty: 0.3,
            stability: 0.2,
            efficiency: 0.1,
        }
    }
}

impl CriteriaWeights {
    /// Weighted sum of the component scores, not yet clamped.
    pub fn apply(&self, scores: &ComponentScores) -> f64 {
        scores.performance * self.performance
            + scores.novelty * self.novelty
            + scores.stability * self.stability
            + scores.efficiency * self.efficiency
    }

    fn as_array(&self) -> [f64; 4] {
        [
            self.performance,
            self.novelty,
            self.stability,
            self.efficiency,
        ]
    }
}

/// Active scoring configuration. Replaced as a whole, never field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationCriteria {
    pub weights: CriteriaWeights,
    pub eureka_threshold: f64,
    pub adopt_threshold: f64,
    pub reject_threshold: f64,
    pub ttl_secs: i64,
    pub max_candidates: usize,
}

impl Default for EvaluationCriteria {
    fn default() -> Self {
        Self {
            weights: CriteriaWeights::default(),
            eureka_threshold: 0.85,
            adopt_threshold: 0.7,
            reject_threshold: 0.3,
            ttl_secs: 24 * 60 * 60,
            max_candidates: 1000,
        }
    }
}

impl EvaluationCriteria {
    pub fn ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.ttl_secs)
    }

    pub fn validate(&self) -> Result<(), CriteriaError> {
        let thresholds = [
            ("eureka_threshold", self.eureka_threshold),
            ("adopt_threshold", self.adopt_threshold),
            ("reject_threshold", self.reject_threshold),
        ];
        for (field, value) in thresholds {
            if !value.is_finite() {
                return Err(CriteriaError::NonFiniteValue(field));
            }
        }

        let weights = self.weights.as_array();
        if weights.iter().any(|weight| !weight.is_finite()) {
            return Err(CriteriaError::NonFiniteValue("weights"));
        }
        if weights.iter().any(|weight| *weight < 0.0) {
            return Err(CriteriaError::NegativeWeight);
        }
        if weights.iter().all(|weight| *weight == 0.0) {
            return Err(CriteriaError::ZeroWeights);
        }

        if self.reject_threshold >= self.adopt_threshold {
            return Err(CriteriaError::ThresholdOrder {
                reject: self.reject_threshold,
                adopt: self.adopt_threshold,
            });
        }

        if self.ttl_secs <= 0 || self.ttl_secs > MAX_TTL_SECS {
            return Err(CriteriaError::InvalidTtl(self.ttl_secs));
        }
        if self.max_candidates == 0 {
            return Err(CriteriaError::InvalidCapacity);
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CriteriaError {
    #[error("reject threshold {reject} must be below adopt threshold {adopt}")]
    ThresholdOrder { reject: f64, adopt: f64 },
    #[error("{0} must be a finite number")]
    NonFiniteValue(&'static str),
    #[error("weights must not be negative")]
    NegativeWeight,
    #[error("at least one weight must be positive")]
    ZeroWeights,
    #[error("ttl of {0}s is outside the accepted range")]
    InvalidTtl(i64),
    #[error("max_candidates must be greater than zero")]
    InvalidCapacity,
}

/// Holds the current criteria snapshot; readers clone the `Arc`, writers swap it.
#[derive(Debug)]
pub struct CriteriaStore {
    current: RwLock<Arc<EvaluationCriteria>>,
}

impl CriteriaStore {
    pub fn new(criteria: EvaluationCriteria) -> Result<Self, CriteriaError> {
        criteria.validate()?;
        Ok(Self {
            current: RwLock::new(Arc::new(criteria)),
        })
    }

    pub fn snapshot(&self) -> Arc<EvaluationCriteria> {
        Arc::clone(&self.current.read())
    }

    /// Validates before swapping; on error the previous snapshot stays active.
    pub fn replace(&self, criteria: EvaluationCriteria) -> Result<(), CriteriaError> {
        criteria.validate()?;
        *self.current.write() = Arc::new(criteria);
        Ok(())
    }
}

impl Default for CriteriaStore {
    fn default() -> Self {
        Self {
            current: RwLock::new(Arc::new(EvaluationCriteria::default())),
        }
    }
}
