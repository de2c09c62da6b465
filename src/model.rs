//! Classifier interface and ONNX model inference.

use anyhow::{Context, Result};
use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::config::FEATURE_NAMES;
use crate::features::FeatureVector;

/// Raw class label as the classifier reports it.
///
/// Integer labels mean the training pipeline label-encoded the cafe keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum ClassLabel {
    Index(i64),
    Key(String),
}

impl ClassLabel {
    /// Interpret one entry of the metadata `classes` array.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        match value {
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Ok(ClassLabel::Index(i)),
                None => Ok(ClassLabel::Key(n.to_string())),
            },
            serde_json::Value::String(s) => Ok(ClassLabel::Key(s.clone())),
            other => anyhow::bail!("Unsupported class label type: {}", other),
        }
    }
}

impl fmt::Display for ClassLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassLabel::Index(i) => write!(f, "{}", i),
            ClassLabel::Key(k) => write!(f, "{}", k),
        }
    }
}

/// What the recommender needs from a trained multi-class model.
pub trait Classifier: Send + Sync {
    /// Features the model was trained on, in input order.
    fn feature_names(&self) -> &[String];

    /// Raw class labels in output order.
    fn class_labels(&self) -> Result<Vec<ClassLabel>>;

    /// One probability per class, in `class_labels` order.
    fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>>;

    /// Relative importance per feature, in `feature_names` order.
    fn feature_importances(&self) -> Vec<(String, f64)>;
}

/// Thread-safe classifier handle for use in web handlers.
pub type SharedClassifier = Arc<dyn Classifier>;

fn default_feature_names() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}

/// Sidecar written next to the exported model by the training pipeline.
///
/// JSON format:
/// ```json
/// {"feature_names": ["parks_count_1km", ...],
///  "classes": [0, 1, 2],
///  "feature_importances": [0.12, ...]}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    #[serde(default = "default_feature_names")]
    pub feature_names: Vec<String>,
    #[serde(default)]
    pub classes: Option<Vec<serde_json::Value>>,
    #[serde(default)]
    pub feature_importances: Vec<f64>,
}

impl Default for ModelMetadata {
    fn default() -> Self {
        Self {
            feature_names: default_feature_names(),
            classes: None,
            feature_importances: Vec::new(),
        }
    }
}

impl ModelMetadata {
    /// Load metadata from JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read model metadata: {}", path.as_ref().display()))?;
        let metadata: ModelMetadata = serde_json::from_str(&content)?;
        Ok(metadata)
    }

    /// Parse the raw `classes` array.
    pub fn class_labels(&self) -> Result<Vec<ClassLabel>> {
        let classes = self
            .classes
            .as_ref()
            .context("Model metadata does not list class labels")?;
        classes.iter().map(ClassLabel::from_json).collect()
    }

    /// Importances paired with feature names. Missing entries count as zero.
    pub fn importances(&self) -> Vec<(String, f64)> {
        self.feature_names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let score = self.feature_importances.get(i).copied().unwrap_or(0.0);
                (name.clone(), score)
            })
            .collect()
    }
}

/// ONNX export of the trained cafe classifier.
pub struct OnnxClassifier {
    session: Mutex<Session>,
    metadata: ModelMetadata,
}

impl OnnxClassifier {
    /// Load ONNX model and its metadata sidecar.
    pub fn load<P: AsRef<Path>, M: AsRef<Path>>(path: P, metadata_path: M) -> Result<Self> {
        let session = Session::builder()?
            .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
            .with_intra_threads(1)?
            .commit_from_file(path.as_ref())
            .context("Failed to load ONNX model")?;

        let metadata = ModelMetadata::from_file(metadata_path)?;
        if !metadata.feature_importances.is_empty()
            && metadata.feature_importances.len() != metadata.feature_names.len()
        {
            tracing::warn!(
                "Model metadata lists {} importances for {} features",
                metadata.feature_importances.len(),
                metadata.feature_names.len()
            );
        }

        Ok(Self {
            session: Mutex::new(session),
            metadata,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn feature_names(&self) -> &[String] {
        &self.metadata.feature_names
    }

    fn class_labels(&self) -> Result<Vec<ClassLabel>> {
        self.metadata.class_labels()
    }

    fn predict_proba(&self, features: &FeatureVector) -> Result<Vec<f64>> {
        let input = Array2::from_shape_vec((1, features.len()), features.to_f32_vec())?;
        let input_tensor = Tensor::from_array(input)?;

        // Lock the session for inference
        let mut session = self
            .session
            .lock()
            .map_err(|e| anyhow::anyhow!("Failed to lock session: {}", e))?;

        let outputs = session.run(ort::inputs![input_tensor])?;

        // Output 0 is the predicted label, output 1 the class probabilities
        if outputs.len() < 2 {
            anyhow::bail!("Expected at least 2 outputs from model");
        }

        let (shape, probs_data) = outputs[1]
            .try_extract_tensor::<f32>()
            .context("Failed to extract probability tensor")?;

        let shape_dims: Vec<i64> = shape.iter().copied().collect();
        if shape_dims.len() != 2 || shape_dims[0] != 1 {
            anyhow::bail!("Unexpected output shape: {:?}, expected [1, n_classes]", shape_dims);
        }

        let n_cols = shape_dims[1] as usize;
        Ok(probs_data[..n_cols].iter().map(|p| *p as f64).collect())
    }

    fn feature_importances(&self) -> Vec<(String, f64)> {
        self.metadata.importances()
    }
}

/// Create a shared classifier instance.
pub fn create_shared_classifier<P: AsRef<Path>, M: AsRef<Path>>(
    path: P,
    metadata_path: M,
) -> Result<SharedClassifier> {
    let classifier = OnnxClassifier::load(path, metadata_path)?;
    Ok(Arc::new(classifier))
}

/// In-memory classifier with canned probabilities.
#[cfg(test)]
pub mod testing {
    use super::*;

    pub struct FixedClassifier {
        pub feature_names: Vec<String>,
        pub labels: Option<Vec<ClassLabel>>,
        pub probabilities: Vec<f64>,
        pub importances: Vec<f64>,
    }

    impl FixedClassifier {
        pub fn new(labels: Vec<ClassLabel>, probabilities: Vec<f64>) -> Self {
            Self {
                feature_names: default_feature_names(),
                labels: Some(labels),
                probabilities,
                importances: vec![0.05, 0.10, 0.20, 0.08, 0.07, 0.15, 0.25, 0.10],
            }
        }

        pub fn indexed(probabilities: Vec<f64>) -> Self {
            let labels = (0..probabilities.len() as i64).map(ClassLabel::Index).collect();
            Self::new(labels, probabilities)
        }
    }

    impl Classifier for FixedClassifier {
        fn feature_names(&self) -> &[String] {
            &self.feature_names
        }

        fn class_labels(&self) -> Result<Vec<ClassLabel>> {
            self.labels
                .clone()
                .context("classes_ attribute not available")
        }

        fn predict_proba(&self, _features: &FeatureVector) -> Result<Vec<f64>> {
            Ok(self.probabilities.clone())
        }

        fn feature_importances(&self) -> Vec<(String, f64)> {
            self.feature_names
                .iter()
                .cloned()
                .zip(self.importances.iter().copied())
                .collect()
        }
    }

    /// A profile with every default feature set to `value`.
    pub fn flat_profile(value: f64) -> FeatureVector {
        FeatureVector::new(default_feature_names().into_iter().map(|n| (n, value)).collect())
    }
}
