//! API route handlers.

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::dataset::CafeDataset;
use crate::error::Error;
use crate::features::{FeatureRangeTable, FeatureVector};
use crate::lookup::{CafeLookup, ClassLabelMap};
use crate::model::{create_shared_classifier, Classifier, SharedClassifier};
use crate::moods::{MoodCatalog, MoodProfile, ProfileGenerator};
use crate::recommend::{check_floor, Explanation, Recommender};
use crate::report::MoodSummaryTable;
use crate::types::{
    ErrorResponse, HealthResponse, ModelInfoResponse, MoodSummaryResponse, MoodsQuery,
    RecommendRequest, RecommendResponse,
};

/// Name given to profiles passed in as explicit features.
pub const CUSTOM_PROFILE: &str = "Custom";

/// Application state shared across handlers.
pub struct AppState {
    pub classifier: SharedClassifier,
    pub lookup: CafeLookup,
    pub label_map: ClassLabelMap,
    pub ranges: FeatureRangeTable,
    pub config: AppConfig,
}

impl AppState {
    /// Load the model and dataset named in the config and derive lookups.
    pub fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        tracing::info!("Loading ONNX model from {}", config.model.path);
        let classifier =
            create_shared_classifier(&config.model.path, config.model.metadata_path())?;
        tracing::info!(
            "Model loaded ({} features)",
            classifier.feature_names().len()
        );

        let dataset = CafeDataset::from_csv(&config.dataset.path, &config.dataset)
            .context("Failed to load training dataset")?;

        Ok(Self::from_parts(classifier, &dataset, config))
    }

    pub fn from_parts(classifier: SharedClassifier, dataset: &CafeDataset, config: AppConfig) -> Self {
        let lookup = CafeLookup::build(
            dataset,
            &config.dataset.key_column,
            &config.dataset.address_column,
        );
        let sorted_keys = dataset.distinct_keys(&config.dataset.key_column);
        let label_map = ClassLabelMap::build(&*classifier, &sorted_keys);
        let ranges = dataset.feature_ranges();

        if lookup.is_empty() {
            tracing::warn!("No cafes found in column '{}'", config.dataset.key_column);
        }
        if ranges.is_empty() {
            tracing::warn!("No feature ranges available, percentile moods will fail");
        }
        if let Some(column) = lookup.display_column() {
            tracing::debug!("Display names from column '{}'", column);
        }

        tracing::info!(
            "Lookup ready: {} cafes, {} classes ({:?} labels), {} feature ranges",
            lookup.len(),
            label_map.num_classes(),
            label_map.encoding(),
            ranges.len()
        );

        Self {
            classifier,
            lookup,
            label_map,
            ranges,
            config,
        }
    }

    pub fn recommender(&self) -> Recommender<'_, dyn Classifier> {
        Recommender::new(&*self.classifier, &self.lookup, &self.label_map)
    }

    pub fn generator(&self) -> ProfileGenerator<'_> {
        ProfileGenerator::new(self.classifier.feature_names(), Some(&self.ranges))
    }

    /// Named catalog, or the configured default.
    pub fn catalog(&self, name: Option<&str>) -> Option<MoodCatalog> {
        MoodCatalog::from_name(name.unwrap_or(&self.config.profiles.catalog))
    }
}

/// Error type for API handlers.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: msg.into(),
        }
    }
}

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        if err.is_client_error() {
            ApiError::bad_request(err.to_string())
        } else {
            tracing::error!("Scoring failed: {}", err);
            ApiError::internal(err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorResponse {
            error: self.status.to_string(),
            message: self.message,
        });
        (self.status, body).into_response()
    }
}

fn unknown_catalog(name: Option<&str>) -> ApiError {
    ApiError::bad_request(format!("Unknown mood catalog '{}'", name.unwrap_or_default()))
}

/// Profile from explicit features if given, otherwise generated for the mood.
fn resolve_profile(state: &AppState, req: &RecommendRequest) -> Result<MoodProfile, ApiError> {
    if let Some(features) = &req.features {
        let features = FeatureVector::from_map(features, state.classifier.feature_names())?;
        return Ok(MoodProfile {
            name: req.mood.clone().unwrap_or_else(|| CUSTOM_PROFILE.to_string()),
            features,
        });
    }

    let mood = req
        .mood
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("Either 'mood' or 'features' is required"))?;
    let catalog = state
        .catalog(req.catalog.as_deref())
        .ok_or_else(|| unknown_catalog(req.catalog.as_deref()))?;
    let spec = catalog.get(mood)?;
    let seed = req.seed.or(state.config.profiles.seed);

    Ok(state.generator().generate_seeded(spec, seed)?)
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Model info endpoint.
pub async fn model_info(State(state): State<Arc<AppState>>) -> Json<ModelInfoResponse> {
    let feature_names = state.classifier.feature_names().to_vec();
    Json(ModelInfoResponse {
        model_path: state.config.model.path.clone(),
        num_features: feature_names.len(),
        feature_names,
        num_classes: state.label_map.num_classes(),
        label_encoding: state.label_map.encoding(),
        num_cafes: state.lookup.len(),
    })
}

/// Multi-mood summary endpoint.
pub async fn moods(
    State(state): State<Arc<AppState>>,
    Query(query): Query<MoodsQuery>,
) -> Result<Json<MoodSummaryResponse>, ApiError> {
    let catalog = state
        .catalog(query.catalog.as_deref())
        .ok_or_else(|| unknown_catalog(query.catalog.as_deref()))?;
    let top_n = query.top_n.unwrap_or(state.config.recommendation.summary_top_n);
    let min_confidence = check_floor(
        query
            .min_confidence
            .unwrap_or(state.config.recommendation.summary_min_confidence),
    )?;
    let seed = query.seed.or(state.config.profiles.seed);

    let profiles = state.generator().generate_all(catalog.moods(), seed)?;
    let results = state
        .recommender()
        .predict_all_moods(&profiles, top_n, min_confidence)?;
    let summary = MoodSummaryTable::from_results(&results);

    Ok(Json(MoodSummaryResponse {
        catalog: catalog.kind().name().to_string(),
        results,
        summary,
    }))
}

/// Recommendation endpoint.
pub async fn recommend(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecommendRequest>,
) -> Result<Json<RecommendResponse>, ApiError> {
    let top_n = req.top_n.unwrap_or(state.config.recommendation.top_n);
    let min_confidence = check_floor(
        req.min_confidence
            .unwrap_or(state.config.recommendation.min_confidence),
    )?;

    let profile = resolve_profile(&state, &req)?;
    let recommendations =
        state
            .recommender()
            .predict_with_confidence(&profile.features, top_n, min_confidence)?;

    Ok(Json(RecommendResponse {
        mood: profile.name,
        profile: profile.features,
        recommendations,
    }))
}

/// Explanation endpoint.
pub async fn explain(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RecommendRequest>,
) -> Result<Json<Explanation>, ApiError> {
    let profile = resolve_profile(&state, &req)?;
    Ok(Json(state.recommender().explain(&profile)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FEATURE_NAMES;
    use crate::model::testing::FixedClassifier;
    use std::collections::HashMap;

    fn state(probs: Vec<f64>) -> Arc<AppState> {
        let classifier: SharedClassifier = Arc::new(FixedClassifier::indexed(probs));
        let mut dataset = CafeDataset::new(3)
            .with_text_column(
                "name_updated",
                vec![
                    Some("Gamma".into()),
                    Some("Alpha".into()),
                    Some("Beta".into()),
                ],
            )
            .with_text_column(
                "name",
                vec![
                    Some("Gamma Coffee".into()),
                    Some("Alpha Coffee".into()),
                    Some("Beta Coffee".into()),
                ],
            );
        for (i, feature) in FEATURE_NAMES.iter().enumerate() {
            let base = i as f64;
            dataset = dataset.with_feature_column(feature, vec![base, base + 1.0, base + 2.0]);
        }
        Arc::new(AppState::from_parts(classifier, &dataset, AppConfig::default()))
    }

    fn explicit_features(value: f64) -> HashMap<String, f64> {
        FEATURE_NAMES.iter().map(|n| (n.to_string(), value)).collect()
    }

    #[tokio::test]
    async fn test_recommend_by_mood() {
        let req = RecommendRequest {
            mood: Some("cozy".to_string()),
            seed: Some(42),
            ..Default::default()
        };
        let Json(resp) = recommend(State(state(vec![0.6, 0.1, 0.3])), Json(req))
            .await
            .unwrap();

        assert_eq!(resp.mood, "Cozy");
        assert_eq!(resp.profile.len(), 8);
        // The 0.10 floor is inclusive
        assert_eq!(resp.recommendations.len(), 3);
        assert_eq!(resp.recommendations[0].cafe_key, "Alpha");
        assert_eq!(resp.recommendations[0].name, "Alpha Coffee");
        assert_eq!(resp.recommendations[1].cafe_key, "Gamma");
        assert_eq!(resp.recommendations[2].cafe_key, "Beta");
    }

    #[tokio::test]
    async fn test_recommend_with_explicit_features() {
        let req = RecommendRequest {
            features: Some(explicit_features(1.5)),
            top_n: Some(1),
            ..Default::default()
        };
        let Json(resp) = recommend(State(state(vec![0.2, 0.7, 0.1])), Json(req))
            .await
            .unwrap();

        assert_eq!(resp.mood, CUSTOM_PROFILE);
        assert_eq!(resp.recommendations.len(), 1);
        assert_eq!(resp.recommendations[0].name, "Beta Coffee");
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let st = state(vec![0.6, 0.1, 0.3]);

        let err = recommend(State(st.clone()), Json(RecommendRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let req = RecommendRequest {
            mood: Some("Sleepy".to_string()),
            ..Default::default()
        };
        let err = recommend(State(st.clone()), Json(req)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("Sleepy"));

        let mut features = explicit_features(1.0);
        features.insert("humidity".to_string(), 80.0);
        let req = RecommendRequest {
            features: Some(features),
            ..Default::default()
        };
        let err = recommend(State(st.clone()), Json(req)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let req = RecommendRequest {
            mood: Some("Cozy".to_string()),
            min_confidence: Some(1.5),
            ..Default::default()
        };
        let err = recommend(State(st), Json(req)).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.contains("min_confidence"));
    }

    #[tokio::test]
    async fn test_model_output_error_is_internal() {
        let req = RecommendRequest {
            mood: Some("Cozy".to_string()),
            ..Default::default()
        };
        let err = recommend(State(state(vec![0.6, f64::NAN, 0.3])), Json(req))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_moods_summary() {
        let query = MoodsQuery {
            seed: Some(1),
            ..Default::default()
        };
        let Json(resp) = moods(State(state(vec![0.6, 0.1, 0.3])), Query(query))
            .await
            .unwrap();

        assert_eq!(resp.catalog, "dynamic");
        assert_eq!(resp.results.len(), 8);
        assert_eq!(resp.summary.rows.len(), 8);
        assert_eq!(resp.summary.rows[0][0], "Cozy");
        assert_eq!(resp.summary.rows[0][1], "Alpha Coffee");

        let query = MoodsQuery {
            catalog: Some("astrology".to_string()),
            ..Default::default()
        };
        let err = moods(State(state(vec![0.6, 0.1, 0.3])), Query(query))
            .await
            .unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_explain_and_model_info() {
        let st = state(vec![0.3, 0.3, 0.4]);
        let req = RecommendRequest {
            mood: Some("Green".to_string()),
            catalog: Some("canonical".to_string()),
            ..Default::default()
        };
        let Json(explanation) = explain(State(st.clone()), Json(req)).await.unwrap();
        assert_eq!(explanation.cafe_key, "Gamma");
        assert_eq!(explanation.top_features.len(), 3);

        let Json(info) = model_info(State(st)).await;
        assert_eq!(info.num_features, 8);
        assert_eq!(info.num_classes, 3);
        assert_eq!(info.num_cafes, 3);
    }
}
