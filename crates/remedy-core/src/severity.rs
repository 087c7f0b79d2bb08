//! Keyword severity classification
//!
//! An ordered rule table over the lower-cased failure type. The first rule
//! with a matching keyword wins; nothing matching means [`Severity::Low`].

use remedy_model::Severity;
use serde::{Deserialize, Serialize};

/// Keywords mapped to one severity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityRule {
    /// Substrings to look for (matched case-insensitively)
    pub keywords: Vec<String>,
    /// Severity assigned on match
    pub severity: Severity,
}

impl SeverityRule {
    /// Create rule
    #[must_use]
    pub fn new<I, S>(keywords: I, severity: Severity) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keywords: keywords.into_iter().map(Into::into).collect(),
            severity,
        }
    }

    fn matches(&self, failure_type: &str) -> bool {
        self.keywords
            .iter()
            .any(|k| !k.is_empty() && failure_type.contains(&k.to_lowercase()))
    }
}

/// Ordered severity rule table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SeverityRules {
    rules: Vec<SeverityRule>,
}

impl SeverityRules {
    /// Create table from rules in priority order
    #[must_use]
    pub fn new(rules: Vec<SeverityRule>) -> Self {
        Self { rules }
    }

    /// Rules in priority order
    #[inline]
    #[must_use]
    pub fn rules(&self) -> &[SeverityRule] {
        &self.rules
    }

    /// Classify a failure type
    #[must_use]
    pub fn classify(&self, failure_type: &str) -> Severity {
        let lowered = failure_type.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map_or(Severity::Low, |rule| rule.severity)
    }
}

impl Default for SeverityRules {
    fn default() -> Self {
        Self::new(vec![
            SeverityRule::new(["crashloop"], Severity::Critical),
            SeverityRule::new(["failed", "error"], Severity::High),
            SeverityRule::new(["unhealthy", "pressure"], Severity::Medium),
        ])
    }
}
