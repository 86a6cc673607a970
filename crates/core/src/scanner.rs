//! Safety scanner boundary and scan result types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use crate::error::ScannerError;

/// Raw verdict returned by the content-safety model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanVerdict {
    pub safe: bool,
    /// Scanner confidence in [0, 1]
    pub confidence: f32,
    #[serde(default)]
    pub threats: Vec<String>,
    #[serde(default)]
    pub explanation: String,
}

/// The content-safety scanner.
#[async_trait]
pub trait SafetyScanner: Send + Sync {
    async fn scan_content(&self, text: &str) -> std::result::Result<ScanVerdict, ScannerError>;
}

/// Assessed risk of a piece of content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    None,
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::None => "none",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        f.write_str(s)
    }
}

/// What to do when the scanner cannot be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailMode {
    /// Allow content through unscanned
    Open,
    /// Block content (default)
    #[default]
    Closed,
}

/// Gating decision for one scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanResult {
    pub allowed: bool,
    pub risk: RiskLevel,
    pub reason: String,
    #[serde(default)]
    pub threats: Vec<String>,
}

impl ScanResult {
    /// Content allowed without inspection (scanning disabled).
    pub fn allowed(reason: impl Into<String>) -> Self {
        Self {
            allowed: true,
            risk: RiskLevel::None,
            reason: reason.into(),
            threats: Vec::new(),
        }
    }

    /// Decision taken when the scanner is unreachable.
    pub fn from_fail_mode(mode: FailMode, cause: &str) -> Self {
        match mode {
            FailMode::Open => Self {
                allowed: true,
                risk: RiskLevel::None,
                reason: format!("scanner unavailable, failing open: {cause}"),
                threats: Vec::new(),
            },
            FailMode::Closed => Self {
                allowed: false,
                risk: RiskLevel::High,
                reason: format!("scanner unavailable, failing closed: {cause}"),
                threats: vec!["scanner_unavailable".into()],
            },
        }
    }

    /// Map a scanner verdict onto a gating decision.
    pub fn from_verdict(verdict: &ScanVerdict) -> Self {
        let risk = if verdict.safe {
            if verdict.threats.is_empty() {
                RiskLevel::None
            } else {
                RiskLevel::Low
            }
        } else if verdict.confidence >= 0.8 {
            RiskLevel::High
        } else if verdict.confidence >= 0.5 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        Self {
            allowed: verdict.safe,
            risk,
            reason: verdict.explanation.clone(),
            threats: verdict.threats.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verdict(safe: bool, confidence: f32, threats: &[&str]) -> ScanVerdict {
        ScanVerdict {
            safe,
            confidence,
            threats: threats.iter().map(|t| t.to_string()).collect(),
            explanation: "test".into(),
        }
    }

    #[test]
    fn fail_closed_blocks_with_high_risk() {
        let result = ScanResult::from_fail_mode(FailMode::Closed, "connection refused");
        assert!(!result.allowed);
        assert_eq!(result.risk, RiskLevel::High);
    }

    #[test]
    fn fail_open_allows_with_no_risk() {
        let result = ScanResult::from_fail_mode(FailMode::Open, "connection refused");
        assert!(result.allowed);
        assert_eq!(result.risk, RiskLevel::None);
    }

    #[test]
    fn unsafe_verdict_risk_follows_confidence() {
        assert_eq!(ScanResult::from_verdict(&verdict(false, 0.95, &[])).risk, RiskLevel::High);
        assert_eq!(ScanResult::from_verdict(&verdict(false, 0.6, &[])).risk, RiskLevel::Medium);
        assert_eq!(ScanResult::from_verdict(&verdict(false, 0.2, &[])).risk, RiskLevel::Low);
    }

    #[test]
    fn safe_verdict_with_threats_is_low_risk() {
        let result = ScanResult::from_verdict(&verdict(true, 0.9, &["pii"]));
        assert!(result.allowed);
        assert_eq!(result.risk, RiskLevel::Low);
        assert_eq!(result.threats, vec!["pii".to_string()]);
    }

    #[test]
    fn fail_mode_parses_lowercase() {
        let mode: FailMode = serde_json::from_str("\"open\"").unwrap();
        assert_eq!(mode, FailMode::Open);
        assert_eq!(FailMode::default(), FailMode::Closed);
    }
}
