//! Turns detector scores into risk levels at the service boundary.

use crate::config::RiskConfig;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: f64, config: &RiskConfig) -> Self {
        if score >= config.high_threshold {
            RiskLevel::High
        } else if score >= config.medium_threshold {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Score as handed over by upstream code: a bare number or a wrapped object.
/// Resolved to a plain `f64` here, never inside the detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScoreInput {
    Score(f64),
    ScoreEnvelope {
        #[serde(alias = "anomaly_score")]
        score: f64,
        #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
        context: serde_json::Value,
    },
}

impl ScoreInput {
    /// Clamped to `[0, 1]`; non-finite scores resolve to 0.
    pub fn resolve(&self) -> f64 {
        let raw = match self {
            ScoreInput::Score(s) => *s,
            ScoreInput::ScoreEnvelope { score, .. } => *score,
        };
        if raw.is_finite() {
            raw.clamp(0.0, 1.0)
        } else {
            0.0
        }
    }

    pub fn context(&self) -> Option<&serde_json::Value> {
        match self {
            ScoreInput::ScoreEnvelope { context, .. } if !context.is_null() => Some(context),
            _ => None,
        }
    }
}

impl From<f64> for ScoreInput {
    fn from(score: f64) -> Self {
        ScoreInput::Score(score)
    }
}

/// Risk result for a single connection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskResult {
    pub event_id: String,
    pub score: f64,
    pub level: RiskLevel,
    pub ts: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

pub struct RiskEngine {
    config: RiskConfig,
}

impl RiskEngine {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn assess(&self, event_id: String, input: impl Into<ScoreInput>, ts: i64) -> RiskResult {
        let input = input.into();
        let score = input.resolve();
        RiskResult {
            event_id,
            score,
            level: RiskLevel::from_score(score, &self.config),
            ts,
            context: input.context().cloned(),
        }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }
}
