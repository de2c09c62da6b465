//! Synthetic mood profiles.
//!
//! Every mood is a row in a declarative table: one [`FeatureRule`] per model
//! feature. A single generic sampler interprets the table, so adding a mood
//! never means adding code.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use crate::config::FEATURE_NAMES;
use crate::error::{Error, Result};
use crate::features::{FeatureRangeTable, FeatureStats, FeatureVector, Stat};

/// One endpoint of a percentile-derived interval: `stat * scale + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bound {
    pub stat: Stat,
    pub scale: f64,
    pub offset: f64,
}

impl Bound {
    pub const fn of(stat: Stat) -> Self {
        Self {
            stat,
            scale: 1.0,
            offset: 0.0,
        }
    }

    pub const fn plus(self, offset: f64) -> Self {
        Self { offset, ..self }
    }

    pub const fn times(self, scale: f64) -> Self {
        Self { scale, ..self }
    }

    pub fn resolve(&self, stats: &FeatureStats) -> f64 {
        stats.get(self.stat) * self.scale + self.offset
    }
}

/// How to pick a value for one feature of one mood.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FeatureRule {
    /// Archetypal value, no randomness
    Fixed(f64),
    /// Uniform draw from a hand-tuned `[low, high)`
    Uniform { low: f64, high: f64 },
    /// Uniform draw between two statistics of the training distribution
    Percentile { low: Bound, high: Bound },
}

impl FeatureRule {
    pub const fn between(low: Stat, high: Stat) -> Self {
        FeatureRule::Percentile {
            low: Bound::of(low),
            high: Bound::of(high),
        }
    }

    pub const fn uniform(low: f64, high: f64) -> Self {
        FeatureRule::Uniform { low, high }
    }
}

/// A named mood and its per-feature sampling rules.
#[derive(Debug, Clone)]
pub struct MoodSpec {
    pub name: String,
    pub description: String,
    rules: Vec<(String, FeatureRule)>,
}

impl MoodSpec {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            rules: Vec::new(),
        }
    }

    /// Set the rule for a feature, replacing any earlier one.
    pub fn rule(mut self, feature: &str, rule: FeatureRule) -> Self {
        self.rules.retain(|(f, _)| f != feature);
        self.rules.push((feature.to_string(), rule));
        self
    }

    pub fn rule_for(&self, feature: &str) -> Option<&FeatureRule> {
        self.rules.iter().find(|(f, _)| f == feature).map(|(_, r)| r)
    }

    /// Display label, e.g. "Cozy (Cold & Sheltered)".
    pub fn label(&self) -> String {
        format!("{} ({})", self.name, self.description)
    }
}

/// Rules listed in `FEATURE_NAMES` order.
fn mood(name: &str, description: &str, rules: [FeatureRule; 8]) -> MoodSpec {
    FEATURE_NAMES
        .iter()
        .zip(rules)
        .fold(MoodSpec::new(name, description), |spec, (feature, rule)| {
            spec.rule(feature, rule)
        })
}

/// Which table of moods to draw from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CatalogKind {
    /// Percentile-derived from the training data
    Dynamic,
    /// Fixed archetypal values
    Canonical,
    /// Bounded-uniform ranges for Monte-Carlo ensembles
    Ensemble,
}

impl CatalogKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "dynamic" | "percentile" => Some(CatalogKind::Dynamic),
            "canonical" | "fixed" => Some(CatalogKind::Canonical),
            "ensemble" | "uniform" => Some(CatalogKind::Ensemble),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CatalogKind::Dynamic => "dynamic",
            CatalogKind::Canonical => "canonical",
            CatalogKind::Ensemble => "ensemble",
        }
    }
}

/// Ordered set of moods.
#[derive(Debug, Clone)]
pub struct MoodCatalog {
    kind: CatalogKind,
    moods: Vec<MoodSpec>,
}

impl MoodCatalog {
    pub fn new(kind: CatalogKind, moods: Vec<MoodSpec>) -> Self {
        Self { kind, moods }
    }

    pub fn for_kind(kind: CatalogKind) -> Self {
        match kind {
            CatalogKind::Dynamic => Self::dynamic(),
            CatalogKind::Canonical => Self::canonical(),
            CatalogKind::Ensemble => Self::ensemble(),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        CatalogKind::parse(name).map(Self::for_kind)
    }

    /// Moods expressed as intervals between training-set statistics.
    pub fn dynamic() -> Self {
        use Stat::*;
        let between = FeatureRule::between;

        let moods = vec![
            mood(
                "Cozy",
                "Cold & Sheltered",
                [
                    between(P75, Max),
                    between(Min, P25),
                    between(Min, P25),
                    between(P25, P50),
                    between(Min, P25),
                    FeatureRule::Percentile {
                        low: Bound::of(Min),
                        high: Bound::of(Min).plus(0.1),
                    },
                    between(P25, P50),
                    between(Min, P25),
                ],
            ),
            mood(
                "Green",
                "Nature Escape",
                [
                    between(P75, Max),
                    between(Min, P25),
                    between(Min, P50),
                    between(P50, P75),
                    between(P25, P50),
                    between(Min, P25),
                    between(P75, Max),
                    between(Min, P25),
                ],
            ),
            mood(
                "Buzz",
                "Urban Activity",
                [
                    between(Min, P25),
                    between(P75, Max),
                    between(P75, Max),
                    between(P75, Max),
                    between(P50, P75),
                    between(P25, P75),
                    between(Min, P25),
                    between(P75, Max),
                ],
            ),
            mood(
                "Lazy",
                "High Comfort",
                [
                    between(P25, P75),
                    between(P25, P75),
                    between(P25, P50),
                    between(P25, P75),
                    between(P25, P75),
                    FeatureRule::Percentile {
                        low: Bound::of(Min),
                        high: Bound::of(Min).plus(0.1),
                    },
                    between(P25, P75),
                    between(P25, P50),
                ],
            ),
            mood(
                "Focused",
                "Quiet Productivity",
                [
                    between(P50, P75),
                    between(Min, P25),
                    between(P25, P50),
                    between(P50, P75),
                    between(P25, P50),
                    between(Min, P25),
                    between(P50, P75),
                    between(P25, P50),
                ],
            ),
            mood(
                "Nightlife",
                "Evening Energy",
                [
                    between(Min, P25),
                    between(P75, Max),
                    between(P75, Max),
                    between(P75, Max),
                    between(P50, P75),
                    between(Min, P25),
                    between(Min, P25),
                    between(P75, Max),
                ],
            ),
            mood(
                "Rainy",
                "Rainy-Day Comfort",
                [
                    between(P25, P50),
                    between(Min, P25),
                    between(Min, P25),
                    between(Min, P25),
                    between(Min, P25),
                    between(P75, Max),
                    between(P25, P50),
                    between(P50, P75),
                ],
            ),
            mood(
                "Random",
                "Balanced Profile",
                [FeatureRule::Percentile {
                    low: Bound::of(P50).times(0.9),
                    high: Bound::of(P50).times(1.1),
                }; 8],
            ),
        ];

        Self::new(CatalogKind::Dynamic, moods)
    }

    /// Fixed archetypal profiles, reproducible without a seed.
    pub fn canonical() -> Self {
        use FeatureRule::Fixed;

        // parks, bars, lst, temp_max, temp_min, precip, ndvi, nightlight
        let moods = vec![
            mood(
                "Cozy",
                "Cold & Sheltered",
                [Fixed(12.0), Fixed(2.0), Fixed(4.0), Fixed(8.0), Fixed(1.0), Fixed(0.0), Fixed(0.35), Fixed(15.0)],
            ),
            mood(
                "Green",
                "Nature Escape",
                [Fixed(20.0), Fixed(1.0), Fixed(18.0), Fixed(22.0), Fixed(12.0), Fixed(0.0), Fixed(0.65), Fixed(10.0)],
            ),
            mood(
                "Buzz",
                "Urban Activity",
                [Fixed(3.0), Fixed(25.0), Fixed(28.0), Fixed(27.0), Fixed(17.0), Fixed(1.0), Fixed(0.15), Fixed(60.0)],
            ),
            mood(
                "Lazy",
                "High Comfort",
                [Fixed(10.0), Fixed(8.0), Fixed(15.0), Fixed(18.0), Fixed(9.0), Fixed(0.0), Fixed(0.40), Fixed(30.0)],
            ),
            mood(
                "Focused",
                "Quiet Productivity",
                [Fixed(12.0), Fixed(2.0), Fixed(14.0), Fixed(20.0), Fixed(9.0), Fixed(0.0), Fixed(0.45), Fixed(28.0)],
            ),
            mood(
                "Nightlife",
                "Evening Energy",
                [Fixed(3.0), Fixed(30.0), Fixed(26.0), Fixed(26.0), Fixed(16.0), Fixed(0.0), Fixed(0.12), Fixed(70.0)],
            ),
            mood(
                "Rainy",
                "Rainy-Day Comfort",
                [Fixed(8.0), Fixed(3.0), Fixed(6.0), Fixed(9.0), Fixed(3.0), Fixed(12.0), Fixed(0.35), Fixed(40.0)],
            ),
        ];

        Self::new(CatalogKind::Canonical, moods)
    }

    /// Hand-tuned plausible ranges per mood for Monte-Carlo sampling.
    pub fn ensemble() -> Self {
        let u = FeatureRule::uniform;

        // parks, bars, lst, temp_max, temp_min, precip, ndvi, nightlight
        let moods = vec![
            mood(
                "Cozy",
                "Cold & Sheltered",
                [u(8.0, 20.0), u(0.0, 5.0), u(0.0, 8.0), u(3.0, 12.0), u(-3.0, 5.0), u(0.0, 0.5), u(0.25, 0.45), u(5.0, 25.0)],
            ),
            mood(
                "Green",
                "Nature Escape",
                [u(15.0, 30.0), u(0.0, 4.0), u(12.0, 22.0), u(18.0, 26.0), u(9.0, 15.0), u(0.0, 0.5), u(0.55, 0.8), u(2.0, 20.0)],
            ),
            mood(
                "Buzz",
                "Urban Activity",
                [u(0.0, 6.0), u(15.0, 40.0), u(22.0, 34.0), u(24.0, 32.0), u(14.0, 20.0), u(0.0, 3.0), u(0.05, 0.25), u(45.0, 80.0)],
            ),
            mood(
                "Lazy",
                "High Comfort",
                [u(6.0, 15.0), u(4.0, 12.0), u(12.0, 18.0), u(15.0, 22.0), u(7.0, 12.0), u(0.0, 0.5), u(0.3, 0.5), u(20.0, 40.0)],
            ),
            mood(
                "Focused",
                "Quiet Productivity",
                [u(10.0, 18.0), u(0.0, 5.0), u(12.0, 18.0), u(17.0, 23.0), u(7.0, 12.0), u(0.0, 1.0), u(0.4, 0.55), u(20.0, 35.0)],
            ),
            mood(
                "Nightlife",
                "Evening Energy",
                [u(0.0, 6.0), u(20.0, 40.0), u(22.0, 32.0), u(23.0, 30.0), u(14.0, 20.0), u(0.0, 1.0), u(0.05, 0.2), u(55.0, 80.0)],
            ),
            mood(
                "Rainy",
                "Rainy-Day Comfort",
                [u(5.0, 12.0), u(0.0, 6.0), u(2.0, 10.0), u(5.0, 13.0), u(1.0, 7.0), u(5.0, 25.0), u(0.25, 0.45), u(30.0, 50.0)],
            ),
        ];

        Self::new(CatalogKind::Ensemble, moods)
    }

    pub fn kind(&self) -> CatalogKind {
        self.kind
    }

    /// Case-insensitive lookup by mood name.
    pub fn get(&self, name: &str) -> Result<&MoodSpec> {
        self.moods
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| Error::UnknownMood(name.to_string()))
    }

    pub fn moods(&self) -> &[MoodSpec] {
        &self.moods
    }

    pub fn names(&self) -> Vec<&str> {
        self.moods.iter().map(|m| m.name.as_str()).collect()
    }
}

/// A generated feature vector tagged with its mood.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodProfile {
    pub name: String,
    pub features: FeatureVector,
}

/// Seeded RNG, or a fresh one from OS entropy.
pub fn rng_from_seed(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Distinct per-mood seed derived from a base seed (splitmix64 step).
pub fn derive_mood_seed(base: u64, index: usize) -> u64 {
    let mut z = base.wrapping_add((index as u64).wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Samples mood tables into feature vectors for one model's feature set.
pub struct ProfileGenerator<'a> {
    feature_names: &'a [String],
    ranges: Option<&'a FeatureRangeTable>,
}

impl<'a> ProfileGenerator<'a> {
    pub fn new(feature_names: &'a [String], ranges: Option<&'a FeatureRangeTable>) -> Self {
        Self {
            feature_names,
            ranges,
        }
    }

    /// Draw one profile. Exactly the model's features are emitted, in order.
    pub fn generate<R: Rng + ?Sized>(&self, mood: &MoodSpec, rng: &mut R) -> Result<MoodProfile> {
        let mut values = Vec::with_capacity(self.feature_names.len());
        for feature in self.feature_names {
            let rule = mood.rule_for(feature).ok_or_else(|| Error::NoRule {
                mood: mood.name.clone(),
                feature: feature.clone(),
            })?;
            let value = self.sample(mood, feature, rule, rng)?;
            values.push((feature.clone(), value));
        }

        Ok(MoodProfile {
            name: mood.name.clone(),
            features: FeatureVector::new(values),
        })
    }

    pub fn generate_seeded(&self, mood: &MoodSpec, seed: Option<u64>) -> Result<MoodProfile> {
        let mut rng = rng_from_seed(seed);
        self.generate(mood, &mut rng)
    }

    /// One profile per mood; with a seed, each mood gets its own derived seed.
    pub fn generate_all(&self, moods: &[MoodSpec], seed: Option<u64>) -> Result<Vec<MoodProfile>> {
        moods
            .iter()
            .enumerate()
            .map(|(i, mood)| self.generate_seeded(mood, seed.map(|s| derive_mood_seed(s, i))))
            .collect()
    }

    /// `n` independent draws of the same mood.
    pub fn generate_ensemble(
        &self,
        mood: &MoodSpec,
        n: usize,
        seed: Option<u64>,
    ) -> Result<Vec<FeatureVector>> {
        let mut rng = rng_from_seed(seed);
        (0..n)
            .map(|_| self.generate(mood, &mut rng).map(|p| p.features))
            .collect()
    }

    fn sample<R: Rng + ?Sized>(
        &self,
        mood: &MoodSpec,
        feature: &str,
        rule: &FeatureRule,
        rng: &mut R,
    ) -> Result<f64> {
        match rule {
            FeatureRule::Fixed(value) => Ok(*value),
            FeatureRule::Uniform { low, high } => sample_uniform(feature, *low, *high, rng),
            FeatureRule::Percentile { low, high } => {
                let stats = self
                    .ranges
                    .and_then(|r| r.get(feature))
                    .ok_or_else(|| Error::MissingRange {
                        mood: mood.name.clone(),
                        feature: feature.to_string(),
                    })?;
                sample_uniform(feature, low.resolve(stats), high.resolve(stats), rng)
            }
        }
    }
}

/// Uniform on `[min(a, b), max(a, b))`; a zero-width interval yields its point.
fn sample_uniform<R: Rng + ?Sized>(feature: &str, a: f64, b: f64, rng: &mut R) -> Result<f64> {
    if !a.is_finite() || !b.is_finite() {
        return Err(Error::InvalidBounds {
            feature: feature.to_string(),
            low: a,
            high: b,
        });
    }
    let (low, high) = if a <= b { (a, b) } else { (b, a) };
    if low == high {
        return Ok(low);
    }
    Ok(rng.random_range(low..high))
}
