use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for a single evaluation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvaluationId(pub String);

impl fmt::Display for EvaluationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Proposed strategy handed over by a generator. The engine never mutates it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub id: String,
    pub kind: String,
    #[serde(default)]
    pub performance_indicators: BTreeMap<String, f64>,
    #[serde(default)]
    pub novelty_indicators: BTreeMap<String, f64>,
    #[serde(default = "default_confidence_hint")]
    pub confidence_hint: f64,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
}

fn default_confidence_hint() -> f64 {
    0.5
}

impl Candidate {
    pub fn new(id: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: kind.into(),
            performance_indicators: BTreeMap::new(),
            novelty_indicators: BTreeMap::new(),
            confidence_hint: default_confidence_hint(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_performance(mut self, key: impl Into<String>, value: f64) -> Self {
        self.performance_indicators.insert(key.into(), value);
        self
    }

    pub fn with_novelty(mut self, key: impl Into<String>, value: f64) -> Self {
        self.novelty_indicators.insert(key.into(), value);
        self
    }

    pub fn with_confidence_hint(mut self, hint: f64) -> Self {
        self.confidence_hint = hint;
        self
    }

    pub fn strategy_kind(&self) -> StrategyKind {
        StrategyKind::parse(&self.kind)
    }
}

/// Strategy categories with dedicated weighting tables.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyKind {
    Intuition,
    Fusion,
    Analytical,
    Predictive,
    Other(String),
}

impl StrategyKind {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "intuition" => Self::Intuition,
            "fusion" => Self::Fusion,
            "analytical" => Self::Analytical,
            "predictive" => Self::Predictive,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            Self::Intuition => "intuition",
            Self::Fusion => "fusion",
            Self::Analytical => "analytical",
            Self::Predictive => "predictive",
            Self::Other(name) => name,
        }
    }
}

/// Caller-side context for one `evaluate` call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationContext {
    #[serde(default)]
    pub evaluation_id: Option<EvaluationId>,
    #[serde(default)]
    pub attributes: BTreeMap<String, serde_json::Value>,
}

impl EvaluationContext {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            evaluation_id: Some(EvaluationId(id.into())),
            attributes: BTreeMap::new(),
        }
    }
}

/// The four per-candidate component scores, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ComponentScores {
    pub performance: f64,
    pub novelty: f64,
    pub stability: f64,
    pub efficiency: f64,
}

impl ComponentScores {
    pub fn as_array(&self) -> [f64; 4] {
        [
            self.performance,
            self.novelty,
            self.stability,
            self.efficiency,
        ]
    }

    pub fn with_combined(self, combined: f64) -> DecisionScores {
        DecisionScores {
            performance: self.performance,
            novelty: self.novelty,
            stability: self.stability,
            efficiency: self.efficiency,
            combined,
        }
    }
}

/// Component scores plus the weighted combination recorded on a decision.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DecisionScores {
    pub performance: f64,
    pub novelty: f64,
    pub stability: f64,
    pub efficiency: f64,
    pub combined: f64,
}

impl DecisionScores {
    pub fn components(&self) -> ComponentScores {
        ComponentScores {
            performance: self.performance,
            novelty: self.novelty,
            stability: self.stability,
            efficiency: self.efficiency,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionResult {
    Adopt,
    Reject,
    FurtherTest,
    EurekaPromote,
}

impl DecisionResult {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Adopt => "adopt",
            Self::Reject => "reject",
            Self::FurtherTest => "further_test",
            Self::EurekaPromote => "eureka_promote",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationType {
    Standard,
    Eureka,
    Comparative,
    Predictive,
}

/// Which pipeline produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionOrigin {
    Primary,
    Fallback,
    Error,
}

/// Outcome of evaluating one candidate. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub candidate_id: String,
    pub evaluation_id: EvaluationId,
    pub scores: DecisionScores,
    pub result: DecisionResult,
    pub confidence: f64,
    pub reasoning: Vec<String>,
    pub eureka_detected: bool,
    pub evaluation_type: EvaluationType,
    pub origin: DecisionOrigin,
    pub timestamp: DateTime<Utc>,
}

impl Decision {
    /// Minimal decision returned when both scoring paths failed.
    pub fn evaluation_error(
        candidate_id: impl Into<String>,
        evaluation_id: EvaluationId,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            candidate_id: candidate_id.into(),
            evaluation_id,
            scores: DecisionScores::default(),
            result: DecisionResult::Reject,
            confidence: 0.0,
            reasoning: vec!["evaluation error".to_string()],
            eureka_detected: false,
            evaluation_type: EvaluationType::Standard,
            origin: DecisionOrigin::Error,
            timestamp,
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.origin == DecisionOrigin::Fallback
    }

    pub fn summary(&self) -> String {
        format!(
            "{} {} (combined {:.3}, confidence {:.2})",
            self.candidate_id,
            self.result.label(),
            self.scores.combined,
            self.confidence
        )
    }
}
