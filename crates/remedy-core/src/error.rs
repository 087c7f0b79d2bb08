//! Error type for the remediation pipeline as a whole

use crate::config::ConfigError;
use crate::enforcer::EnforceError;
use crate::normalizer::NormalizationError;
use crate::plan::PlanGenerationError;

/// Main Remedy error type
#[derive(Debug, thiserror::Error)]
pub enum RemedyError {
    /// Event could not be normalized
    #[error("normalization failed: {0}")]
    Normalization(#[from] NormalizationError),

    /// No plan could be produced
    #[error("plan generation failed: {0}")]
    Generation(#[from] PlanGenerationError),

    /// Enforcement did not reach a verdict
    #[error("enforcement failed: {0}")]
    Enforce(#[from] EnforceError),

    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl RemedyError {
    /// Check if the error happened before any incident existed
    #[inline]
    #[must_use]
    pub fn is_ingress(&self) -> bool {
        matches!(self, Self::Normalization(_))
    }
}
