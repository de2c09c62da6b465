//! Confidence-filtered cafe ranking.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::features::FeatureVector;
use crate::lookup::{CafeLookup, ClassLabelMap, ADDRESS_UNAVAILABLE};
use crate::model::Classifier;
use crate::moods::MoodProfile;

/// Number of features reported by [`Recommender::explain`].
pub const EXPLAIN_TOP_FEATURES: usize = 3;

/// Qualitative bucket of a class probability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConfidenceTier {
    High,
    Medium,
    Low,
    #[serde(rename = "Very Low")]
    VeryLow,
}

impl ConfidenceTier {
    pub fn from_probability(p: f64) -> Self {
        if p >= 0.50 {
            ConfidenceTier::High
        } else if p >= 0.30 {
            ConfidenceTier::Medium
        } else if p >= 0.15 {
            ConfidenceTier::Low
        } else {
            ConfidenceTier::VeryLow
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ConfidenceTier::High => "High",
            ConfidenceTier::Medium => "Medium",
            ConfidenceTier::Low => "Low",
            ConfidenceTier::VeryLow => "Very Low",
        }
    }
}

impl fmt::Display for ConfidenceTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One ranked cafe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub rank: usize,
    pub cafe_key: String,
    pub name: String,
    pub address: String,
    /// Probability as a percentage
    pub suitability_score: f64,
    pub confidence: ConfidenceTier,
    pub probability: f64,
}

/// Recommendations for one mood.
#[derive(Debug, Clone, Serialize)]
pub struct MoodRecommendations {
    pub mood: String,
    pub profile: FeatureVector,
    pub recommendations: Vec<Recommendation>,
}

/// A feature with its model importance and the value used.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureContribution {
    pub feature: String,
    pub importance: f64,
    pub value: f64,
}

/// Why a profile maps to its best cafe.
#[derive(Debug, Clone, Serialize)]
pub struct Explanation {
    pub mood: String,
    pub cafe_key: String,
    pub name: String,
    pub address: String,
    pub probability: f64,
    pub confidence: ConfidenceTier,
    pub top_features: Vec<FeatureContribution>,
    pub profile: FeatureVector,
}

/// How often one cafe won across an ensemble.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TallyEntry {
    pub cafe_key: String,
    pub name: String,
    pub wins: usize,
    pub share: f64,
    pub mean_probability: f64,
}

/// Distribution of top recommendations over many profiles of one mood.
#[derive(Debug, Clone, Serialize)]
pub struct EnsembleTally {
    pub mood: String,
    pub samples: usize,
    pub no_match: usize,
    pub no_match_share: f64,
    pub entries: Vec<TallyEntry>,
}

/// Scores profiles against a classifier and resolves classes to cafes.
pub struct Recommender<'a, C: Classifier + ?Sized> {
    classifier: &'a C,
    lookup: &'a CafeLookup,
    label_map: &'a ClassLabelMap,
}

impl<'a, C: Classifier + ?Sized> Recommender<'a, C> {
    pub fn new(classifier: &'a C, lookup: &'a CafeLookup, label_map: &'a ClassLabelMap) -> Self {
        Self {
            classifier,
            lookup,
            label_map,
        }
    }

    /// Rank cafes for one profile.
    ///
    /// Classes below `min_confidence` are skipped and at most `top_n`
    /// survivors are returned. An empty list is a valid answer. A floor
    /// outside [0, 1], NaN included, is rejected.
    pub fn predict_with_confidence(
        &self,
        features: &FeatureVector,
        top_n: usize,
        min_confidence: f64,
    ) -> Result<Vec<Recommendation>> {
        check_floor(min_confidence)?;
        let probs = self.probabilities(features)?;

        let mut recommendations = Vec::new();
        for class_index in ranked_indices(&probs) {
            if recommendations.len() >= top_n {
                break;
            }
            let p = probs[class_index];
            if p < min_confidence {
                continue;
            }
            let Some(cafe_key) = self.label_map.key_for_class(class_index) else {
                continue;
            };
            let (name, address) = self.describe(&cafe_key);

            recommendations.push(Recommendation {
                rank: recommendations.len() + 1,
                cafe_key,
                name,
                address,
                suitability_score: p * 100.0,
                confidence: ConfidenceTier::from_probability(p),
                probability: p,
            });
        }

        tracing::debug!(
            "{} of {} classes passed the {:.2} floor",
            recommendations.len(),
            probs.len(),
            min_confidence
        );

        Ok(recommendations)
    }

    /// Score each profile independently, keeping input order.
    pub fn predict_all_moods(
        &self,
        profiles: &[MoodProfile],
        top_n: usize,
        min_confidence: f64,
    ) -> Result<Vec<MoodRecommendations>> {
        profiles
            .iter()
            .map(|profile| {
                let recommendations =
                    self.predict_with_confidence(&profile.features, top_n, min_confidence)?;
                Ok(MoodRecommendations {
                    mood: profile.name.clone(),
                    profile: profile.features.clone(),
                    recommendations,
                })
            })
            .collect()
    }

    /// Best class without any floor, plus the most important features.
    pub fn explain(&self, profile: &MoodProfile) -> Result<Explanation> {
        let probs = self.probabilities(&profile.features)?;
        let best = ranked_indices(&probs)
            .first()
            .copied()
            .ok_or_else(|| Error::Inference("model reported no classes".to_string()))?;
        let cafe_key = self
            .label_map
            .key_for_class(best)
            .unwrap_or_else(|| best.to_string());
        let (name, address) = self.describe(&cafe_key);

        let mut importances: Vec<(usize, String, f64)> = self
            .classifier
            .feature_importances()
            .into_iter()
            .enumerate()
            .map(|(i, (feature, importance))| (i, feature, importance))
            .collect();
        importances.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.0.cmp(&b.0)));

        let top_features = importances
            .into_iter()
            .take(EXPLAIN_TOP_FEATURES)
            .map(|(_, feature, importance)| {
                let value = profile.features.get(&feature).unwrap_or(f64::NAN);
                FeatureContribution {
                    feature,
                    importance,
                    value,
                }
            })
            .collect();

        let probability = probs[best];
        Ok(Explanation {
            mood: profile.name.clone(),
            cafe_key,
            name,
            address,
            probability,
            confidence: ConfidenceTier::from_probability(probability),
            top_features,
            profile: profile.features.clone(),
        })
    }

    /// Count top-1 recommendations over an ensemble of profiles.
    pub fn tally_ensemble(
        &self,
        mood: &str,
        samples: &[FeatureVector],
        min_confidence: f64,
    ) -> Result<EnsembleTally> {
        check_floor(min_confidence)?;
        let mut wins: HashMap<String, (String, usize, f64)> = HashMap::new();
        let mut no_match = 0;

        for features in samples {
            match self.predict_with_confidence(features, 1, min_confidence)?.into_iter().next() {
                Some(top) => {
                    let entry = wins.entry(top.cafe_key).or_insert((top.name, 0, 0.0));
                    entry.1 += 1;
                    entry.2 += top.probability;
                }
                None => no_match += 1,
            }
        }

        let total = samples.len();
        let share = |count: usize| {
            if total == 0 {
                0.0
            } else {
                count as f64 / total as f64
            }
        };

        let mut entries: Vec<TallyEntry> = wins
            .into_iter()
            .map(|(cafe_key, (name, count, sum))| TallyEntry {
                cafe_key,
                name,
                wins: count,
                share: share(count),
                mean_probability: sum / count as f64,
            })
            .collect();
        entries.sort_by(|a, b| b.wins.cmp(&a.wins).then_with(|| a.cafe_key.cmp(&b.cafe_key)));

        tracing::info!(
            "Ensemble '{}': {} samples, {} distinct winners, {} without a confident match",
            mood,
            total,
            entries.len(),
            no_match
        );

        Ok(EnsembleTally {
            mood: mood.to_string(),
            samples: total,
            no_match,
            no_match_share: share(no_match),
            entries,
        })
    }

    /// Validated class probabilities for a profile.
    fn probabilities(&self, features: &FeatureVector) -> Result<Vec<f64>> {
        features.ensure_matches(self.classifier.feature_names())?;

        let probs = self.classifier.predict_proba(features)?;
        if probs.len() != self.label_map.num_classes() {
            return Err(Error::ClassCountMismatch {
                expected: self.label_map.num_classes(),
                found: probs.len(),
            });
        }
        if let Some(i) = probs.iter().position(|p| !p.is_finite()) {
            return Err(Error::NonFiniteProbability(i));
        }
        Ok(probs)
    }

    fn describe(&self, cafe_key: &str) -> (String, String) {
        match self.lookup.get(cafe_key) {
            Some(record) => (record.name.clone(), record.address.clone()),
            None => {
                tracing::debug!("Cafe '{}' not in lookup table", cafe_key);
                (cafe_key.to_string(), ADDRESS_UNAVAILABLE.to_string())
            }
        }
    }
}

/// Accept a confidence floor within [0, 1].
pub fn check_floor(min_confidence: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&min_confidence) {
        Ok(min_confidence)
    } else {
        Err(Error::InvalidConfidence(min_confidence))
    }
}

/// Class indices by descending probability. Ties keep the lower index first.
fn ranked_indices(probs: &[f64]) -> Vec<usize> {
    let mut indices: Vec<usize> = (0..probs.len()).collect();
    indices.sort_by(|&a, &b| probs[b].total_cmp(&probs[a]));
    indices
}
