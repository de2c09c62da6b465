//! Feature vectors and per-feature range statistics.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Ordered feature name -> value mapping fed to the classifier.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureVector {
    values: Vec<(String, f64)>,
}

impl FeatureVector {
    pub fn new(values: Vec<(String, f64)>) -> Self {
        Self { values }
    }

    /// Build a vector in model order from an unordered map.
    ///
    /// Fails on the first missing feature, then on any feature the model
    /// does not know about.
    pub fn from_map(map: &HashMap<String, f64>, feature_names: &[String]) -> Result<Self> {
        let mut values = Vec::with_capacity(feature_names.len());
        for name in feature_names {
            let value = map
                .get(name)
                .copied()
                .ok_or_else(|| Error::MissingFeature(name.clone()))?;
            values.push((name.clone(), value));
        }

        let mut extras: Vec<&String> = map
            .keys()
            .filter(|k| !feature_names.contains(k))
            .collect();
        extras.sort();
        if let Some(extra) = extras.first() {
            return Err(Error::UnexpectedFeature((*extra).clone()));
        }

        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| *v)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.iter().map(|(n, _)| n.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(n, v)| (n.as_str(), *v))
    }

    /// Values in order, narrowed for the ONNX input tensor.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        self.values.iter().map(|(_, v)| *v as f32).collect()
    }

    /// Check that this vector carries exactly `expected`, in that order.
    pub fn ensure_matches(&self, expected: &[String]) -> Result<()> {
        for name in expected {
            if self.get(name).is_none() {
                return Err(Error::MissingFeature(name.clone()));
            }
        }
        for name in self.names() {
            if !expected.iter().any(|e| e == name) {
                return Err(Error::UnexpectedFeature(name.to_string()));
            }
        }
        for (found, name) in self.names().enumerate() {
            // Both sides hold the same names at this point
            let expected_pos = expected.iter().position(|e| e == name).unwrap_or(found);
            if expected_pos != found {
                return Err(Error::FeatureOrder {
                    feature: name.to_string(),
                    expected: expected_pos,
                    found,
                });
            }
        }
        Ok(())
    }
}

impl Serialize for FeatureVector {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.values.len()))?;
        for (name, value) in &self.values {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

/// Summary statistic of a feature's training distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stat {
    Min,
    P25,
    P50,
    P75,
    Max,
}

impl Stat {
    pub fn name(&self) -> &'static str {
        match self {
            Stat::Min => "min",
            Stat::P25 => "p25",
            Stat::P50 => "p50",
            Stat::P75 => "p75",
            Stat::Max => "max",
        }
    }
}

/// Five-number summary of one feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FeatureStats {
    pub min: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub max: f64,
}

impl FeatureStats {
    /// Summarize the finite values of a column. `None` when nothing is left.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        let mut sorted: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        if sorted.is_empty() {
            return None;
        }
        sorted.sort_by(|a, b| a.total_cmp(b));

        Some(Self {
            min: sorted[0],
            p25: percentile(&sorted, 0.25),
            p50: percentile(&sorted, 0.50),
            p75: percentile(&sorted, 0.75),
            max: sorted[sorted.len() - 1],
        })
    }

    pub fn get(&self, stat: Stat) -> f64 {
        match stat {
            Stat::Min => self.min,
            Stat::P25 => self.p25,
            Stat::P50 => self.p50,
            Stat::P75 => self.p75,
            Stat::Max => self.max,
        }
    }
}

/// Percentile with linear interpolation between closest ranks.
///
/// `sorted` must be non-empty and ascending.
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}

/// Per-feature statistics of the training dataset, in column order.
#[derive(Debug, Clone, Default)]
pub struct FeatureRangeTable {
    features: Vec<(String, FeatureStats)>,
}

impl FeatureRangeTable {
    /// Compute stats for each named column. Columns without any finite value
    /// are left out.
    pub fn from_columns<'a, I>(columns: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a [f64])>,
    {
        let mut features = Vec::new();
        for (name, values) in columns {
            match FeatureStats::from_values(values) {
                Some(stats) => features.push((name.to_string(), stats)),
                None => tracing::warn!("Feature '{}' has no finite values, no range computed", name),
            }
        }
        Self { features }
    }

    pub fn get(&self, feature: &str) -> Option<&FeatureStats> {
        self.features
            .iter()
            .find(|(n, _)| n == feature)
            .map(|(_, s)| s)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureStats)> {
        self.features.iter().map(|(n, s)| (n.as_str(), s))
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl Serialize for FeatureRangeTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.features.len()))?;
        for (name, stats) in &self.features {
            map.serialize_entry(name, stats)?;
        }
        map.end()
    }
}
