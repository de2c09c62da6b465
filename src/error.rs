//! Error types for profile generation and recommendation scoring.
//!
//! Schema problems are fatal for the call that hit them. Lookup misses and
//! label-introspection failures never show up here: they degrade in place.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Profile lacks a feature the classifier was trained on
    #[error("profile is missing required feature '{0}'")]
    MissingFeature(String),

    /// Profile carries a feature the classifier was not trained on
    #[error("profile has unexpected feature '{0}'")]
    UnexpectedFeature(String),

    /// Same feature set, wrong column order
    #[error("feature '{feature}' is at position {found}, model expects position {expected}")]
    FeatureOrder {
        feature: String,
        expected: usize,
        found: usize,
    },

    /// Mood table has no sampling rule for a requested feature
    #[error("mood '{mood}' defines no rule for feature '{feature}'")]
    NoRule { mood: String, feature: String },

    /// Percentile rule used without statistics for the feature
    #[error("mood '{mood}' needs dataset ranges for feature '{feature}'")]
    MissingRange { mood: String, feature: String },

    /// Sampling interval with a NaN or infinite endpoint
    #[error("invalid sampling interval for '{feature}': [{low}, {high})")]
    InvalidBounds { feature: String, low: f64, high: f64 },

    #[error("unknown mood '{0}'")]
    UnknownMood(String),

    /// Confidence floor outside [0, 1] or not a number
    #[error("min_confidence must be within [0, 1], got {0}")]
    InvalidConfidence(f64),

    /// Probability vector does not line up with the class labels
    #[error("model returned {found} probabilities for {expected} classes")]
    ClassCountMismatch { expected: usize, found: usize },

    #[error("model returned a non-finite probability for class {0}")]
    NonFiniteProbability(usize),

    /// Underlying inference backend failed
    #[error("model inference failed: {0}")]
    Inference(String),
}

impl Error {
    /// Whether the error was caused by the caller's input rather than the model.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            Error::ClassCountMismatch { .. } | Error::NonFiniteProbability(_) | Error::Inference(_)
        )
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Inference(format!("{err:#}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_name_the_feature() {
        let err = Error::MissingFeature("ndvi".to_string());
        assert_eq!(err.to_string(), "profile is missing required feature 'ndvi'");

        let err = Error::NoRule {
            mood: "Cozy".to_string(),
            feature: "nightlight".to_string(),
        };
        assert!(err.to_string().contains("nightlight"));
        assert!(err.to_string().contains("Cozy"));
    }

    #[test]
    fn test_client_error_classification() {
        assert!(Error::UnknownMood("Sleepy".to_string()).is_client_error());
        assert!(Error::UnexpectedFeature("humidity".to_string()).is_client_error());
        assert!(Error::InvalidConfidence(f64::NAN).is_client_error());
        assert!(!Error::Inference("session poisoned".to_string()).is_client_error());
        assert!(!Error::ClassCountMismatch { expected: 3, found: 2 }.is_client_error());
    }

    #[test]
    fn test_from_anyhow_keeps_context_chain() {
        let err = anyhow::anyhow!("shape [1, 2]").context("Failed to extract probability tensor");
        let converted: Error = err.into();
        match converted {
            Error::Inference(msg) => {
                assert!(msg.contains("Failed to extract probability tensor"));
                assert!(msg.contains("shape [1, 2]"));
            }
            other => panic!("Expected Inference variant, got {other:?}"),
        }
    }
}
