//! Risk scoring at the detector's output boundary.

mod engine;

pub use engine::{RiskEngine, RiskLevel, RiskResult, ScoreInput};
