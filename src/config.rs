//! Configuration for the cafe mood API.

use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// Replace host and port with the values given on the command line.
    pub fn apply_overrides(&mut self, host: Option<String>, port: Option<u16>) {
        if let Some(host) = host {
            self.host = host;
        }
        if let Some(port) = port {
            self.port = port;
        }
    }
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "default_model_path")]
    pub path: String,
    /// JSON sidecar with feature names, class labels and importances.
    /// Defaults to the model path with a `.json` extension.
    #[serde(default)]
    pub metadata_path: Option<String>,
}

fn default_model_path() -> String {
    "data/models/cafe_classifier.onnx".to_string()
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            metadata_path: None,
        }
    }
}

impl ModelConfig {
    /// Resolved metadata sidecar path.
    pub fn metadata_path(&self) -> String {
        match &self.metadata_path {
            Some(path) => path.clone(),
            None => std::path::Path::new(&self.path)
                .with_extension("json")
                .to_string_lossy()
                .to_string(),
        }
    }
}

/// Training dataset configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    #[serde(default = "default_dataset_path")]
    pub path: String,
    #[serde(default = "default_key_column")]
    pub key_column: String,
    #[serde(default = "default_address_column")]
    pub address_column: String,
}

fn default_dataset_path() -> String {
    "data/processed/lap_locations_final_merged.csv".to_string()
}

fn default_key_column() -> String {
    "name_updated".to_string()
}

fn default_address_column() -> String {
    "address".to_string()
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: default_dataset_path(),
            key_column: default_key_column(),
            address_column: default_address_column(),
        }
    }
}

/// Recommendation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationConfig {
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
    /// Results per mood when building the multi-mood summary.
    #[serde(default = "default_summary_top_n")]
    pub summary_top_n: usize,
    /// Looser floor for the summary so that most moods show a match.
    #[serde(default = "default_summary_min_confidence")]
    pub summary_min_confidence: f64,
}

fn default_top_n() -> usize {
    5
}

fn default_min_confidence() -> f64 {
    0.10
}

fn default_summary_top_n() -> usize {
    2
}

fn default_summary_min_confidence() -> f64 {
    0.05
}

impl Default for RecommendationConfig {
    fn default() -> Self {
        Self {
            top_n: default_top_n(),
            min_confidence: default_min_confidence(),
            summary_top_n: default_summary_top_n(),
            summary_min_confidence: default_summary_min_confidence(),
        }
    }
}

/// Mood profile generation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfilesConfig {
    /// Fixed seed for reproducible profiles; fresh entropy when unset
    #[serde(default)]
    pub seed: Option<u64>,
    /// Which mood catalog to draw single profiles from (dynamic, canonical, ensemble)
    #[serde(default = "default_catalog")]
    pub catalog: String,
    #[serde(default = "default_ensemble_samples")]
    pub ensemble_samples: usize,
}

fn default_catalog() -> String {
    "dynamic".to_string()
}

fn default_ensemble_samples() -> usize {
    100
}

impl Default for ProfilesConfig {
    fn default() -> Self {
        Self {
            seed: None,
            catalog: default_catalog(),
            ensemble_samples: default_ensemble_samples(),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub dataset: DatasetConfig,
    #[serde(default)]
    pub recommendation: RecommendationConfig,
    #[serde(default)]
    pub profiles: ProfilesConfig,
}

impl AppConfig {
    /// Load configuration from environment and config file
    pub fn load() -> anyhow::Result<Self> {
        Self::load_with_env(env_source())
    }

    fn load_with_env(env: config::Environment) -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Start with defaults
            .add_source(config::Config::try_from(&AppConfig::default())?)
            // Add config file if exists
            .add_source(config::File::with_name("config").required(false))
            // Override with environment variables
            .add_source(env)
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

/// `CAFE_MOOD_SERVER__PORT`, `CAFE_MOOD_RECOMMENDATION__MIN_CONFIDENCE`, etc.
fn env_source() -> config::Environment {
    config::Environment::with_prefix("CAFE_MOOD")
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

/// Feature names in model input order
pub const FEATURE_NAMES: [&str; 8] = [
    "parks_count_1km",
    "open_bars_count_500m",
    "lst_celsius_1km",
    "temp_max",
    "temp_min",
    "precip_mm",
    "ndvi",
    "nightlight",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.recommendation.top_n, 5);
        assert!((config.recommendation.min_confidence - 0.10).abs() < 1e-12);
        assert_eq!(config.dataset.key_column, "name_updated");
        assert_eq!(config.profiles.catalog, "dynamic");
        assert!(config.profiles.seed.is_none());
    }

    #[test]
    fn test_metadata_path_defaults_to_sidecar() {
        let model = ModelConfig {
            path: "models/rfc.onnx".to_string(),
            metadata_path: None,
        };
        assert_eq!(model.metadata_path(), "models/rfc.json");

        let model = ModelConfig {
            path: "models/rfc.onnx".to_string(),
            metadata_path: Some("meta/rfc_meta.json".to_string()),
        };
        assert_eq!(model.metadata_path(), "meta/rfc_meta.json");
    }

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        env_source().source(Some(map))
    }

    #[test]
    fn test_env_overrides() {
        let config = AppConfig::load_with_env(env(&[
            ("CAFE_MOOD_SERVER__PORT", "9191"),
            ("CAFE_MOOD_SERVER__HOST", "127.0.0.1"),
            ("CAFE_MOOD_RECOMMENDATION__MIN_CONFIDENCE", "0.25"),
            ("CAFE_MOOD_PROFILES__SEED", "7"),
            ("OTHER_SERVER__PORT", "1"),
        ]))
        .unwrap();
        assert_eq!(config.server.port, 9191);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!((config.recommendation.min_confidence - 0.25).abs() < 1e-12);
        assert_eq!(config.profiles.seed, Some(7));
        assert_eq!(config.recommendation.top_n, 5);
    }

    #[test]
    fn test_server_overrides_only_when_given() {
        let mut server = AppConfig::load_with_env(env(&[("CAFE_MOOD_SERVER__HOST", "10.0.0.5")]))
            .unwrap()
            .server;
        server.apply_overrides(None, None);
        assert_eq!(server.host, "10.0.0.5");
        assert_eq!(server.port, 8080);

        server.apply_overrides(None, Some(9000));
        assert_eq!(server.host, "10.0.0.5");
        assert_eq!(server.port, 9000);

        server.apply_overrides(Some("127.0.0.1".to_string()), None);
        assert_eq!(server.host, "127.0.0.1");
        assert_eq!(server.port, 9000);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"recommendation": {"top_n": 3}, "profiles": {"seed": 42}}"#;
        let config: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.recommendation.top_n, 3);
        assert!((config.recommendation.summary_min_confidence - 0.05).abs() < 1e-12);
        assert_eq!(config.profiles.seed, Some(42));
        assert_eq!(config.model.path, "data/models/cafe_classifier.onnx");
    }
}
