//! Request and response types for the cafe mood API.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::features::FeatureVector;
use crate::lookup::LabelEncoding;
use crate::recommend::{MoodRecommendations, Recommendation};
use crate::report::MoodSummaryTable;

/// Recommendation or explanation request.
///
/// Either `mood` (a synthetic profile is generated) or `features` (an
/// explicit profile keyed by feature name) must be given.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecommendRequest {
    #[serde(default)]
    pub mood: Option<String>,
    #[serde(default)]
    pub features: Option<HashMap<String, f64>>,
    #[serde(default)]
    pub top_n: Option<usize>,
    #[serde(default)]
    pub min_confidence: Option<f64>,
    /// Seed for the generated profile; ignored with explicit features
    #[serde(default)]
    pub seed: Option<u64>,
    /// Mood catalog: dynamic, canonical or ensemble
    #[serde(default)]
    pub catalog: Option<String>,
}

/// Ranked cafes for one profile.
#[derive(Debug, Serialize)]
pub struct RecommendResponse {
    pub mood: String,
    pub profile: FeatureVector,
    pub recommendations: Vec<Recommendation>,
}

/// Query parameters for the multi-mood summary.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MoodsQuery {
    pub top_n: Option<usize>,
    pub min_confidence: Option<f64>,
    pub seed: Option<u64>,
    pub catalog: Option<String>,
}

/// Every mood of a catalog scored at once.
#[derive(Debug, Serialize)]
pub struct MoodSummaryResponse {
    pub catalog: String,
    pub results: Vec<MoodRecommendations>,
    pub summary: MoodSummaryTable,
}

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Model info response
#[derive(Debug, Serialize)]
pub struct ModelInfoResponse {
    pub model_path: String,
    pub num_features: usize,
    pub feature_names: Vec<String>,
    pub num_classes: usize,
    pub label_encoding: LabelEncoding,
    pub num_cafes: usize,
}

/// API error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_with_features() {
        let json = r#"{"features": {"ndvi": 0.4, "nightlight": 20.0}, "top_n": 3}"#;
        let req: RecommendRequest = serde_json::from_str(json).unwrap();
        assert!(req.mood.is_none());
        assert_eq!(req.top_n, Some(3));
        assert_eq!(req.features.unwrap().get("ndvi"), Some(&0.4));
    }

    #[test]
    fn test_request_with_mood_only() {
        let req: RecommendRequest = serde_json::from_str(r#"{"mood": "Cozy", "seed": 7}"#).unwrap();
        assert_eq!(req.mood.as_deref(), Some("Cozy"));
        assert_eq!(req.seed, Some(7));
        assert!(req.features.is_none());
        assert!(req.min_confidence.is_none());
    }
}
