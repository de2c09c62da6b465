//! CLI commands for cafe-mood-api.
//!
//! Supports API server mode plus one-shot recommendation, summary, ensemble,
//! explanation and dataset-range commands.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::dataset::CafeDataset;
use crate::moods::{MoodCatalog, MoodSpec};
use crate::report::{
    format_explanation, format_ranges, format_report, format_tally, MoodSummaryTable,
    RecommendationTable,
};
use crate::routes::AppState;
use crate::types::{MoodSummaryResponse, RecommendResponse};

#[derive(Parser)]
#[command(name = "cafe-mood-api")]
#[command(version, about = "Mood-based cafe recommendations from ambient conditions", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// Model and dataset overrides shared by the scoring commands.
#[derive(Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// Model path override
    #[arg(short, long)]
    pub model: Option<PathBuf>,

    /// Training dataset CSV override
    #[arg(short, long)]
    pub dataset: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the API server
    Serve {
        /// Host to bind to (overrides server.host)
        #[arg(short = 'H', long)]
        host: Option<String>,

        /// Port to bind to (overrides server.port)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Recommend cafes for one mood
    Recommend {
        /// Mood name (Cozy, Green, Buzz, Lazy, Focused, Nightlife, Rainy, Random)
        #[arg(value_name = "MOOD")]
        mood: String,

        /// Maximum number of cafes
        #[arg(short = 'n', long)]
        top_n: Option<usize>,

        /// Minimum class probability
        #[arg(short = 'c', long)]
        min_confidence: Option<f64>,

        /// Seed for reproducible profiles
        #[arg(short, long)]
        seed: Option<u64>,

        /// Mood catalog (dynamic, canonical, ensemble)
        #[arg(long)]
        catalog: Option<String>,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Summarize the top cafe for every mood
    Moods {
        /// Cafes scored per mood
        #[arg(short = 'n', long)]
        top_n: Option<usize>,

        /// Minimum class probability
        #[arg(short = 'c', long)]
        min_confidence: Option<f64>,

        /// Seed for reproducible profiles
        #[arg(short, long)]
        seed: Option<u64>,

        /// Mood catalog (dynamic, canonical, ensemble)
        #[arg(long)]
        catalog: Option<String>,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Score many randomized profiles of one mood
    Ensemble {
        /// Mood name
        #[arg(value_name = "MOOD")]
        mood: String,

        /// Number of profiles to draw
        #[arg(long)]
        samples: Option<usize>,

        /// Minimum class probability
        #[arg(short = 'c', long)]
        min_confidence: Option<f64>,

        /// Seed for reproducible profiles
        #[arg(short, long)]
        seed: Option<u64>,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Explain the best cafe for one mood
    Explain {
        /// Mood name
        #[arg(value_name = "MOOD")]
        mood: String,

        /// Seed for reproducible profiles
        #[arg(short, long)]
        seed: Option<u64>,

        /// Mood catalog (dynamic, canonical, ensemble)
        #[arg(long)]
        catalog: Option<String>,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,

        #[command(flatten)]
        source: SourceArgs,
    },

    /// Show per-feature statistics of the training dataset
    Ranges {
        /// Training dataset CSV override
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Output format (json, table)
        #[arg(short, long, default_value = "table")]
        format: String,
    },
}

/// Load config and apply path overrides.
fn load_config(source: &SourceArgs) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load()?;

    if let Some(path) = &source.model {
        config.model.path = path.to_string_lossy().to_string();
    }
    if let Some(path) = &source.dataset {
        config.dataset.path = path.to_string_lossy().to_string();
    }

    Ok(config)
}

fn load_state(source: &SourceArgs) -> anyhow::Result<AppState> {
    AppState::from_config(load_config(source)?)
}

fn catalog_for(state: &AppState, name: Option<&str>) -> anyhow::Result<MoodCatalog> {
    let name = name.unwrap_or(&state.config.profiles.catalog);
    MoodCatalog::from_name(name)
        .with_context(|| format!("Unknown mood catalog '{}' (dynamic, canonical, ensemble)", name))
}

fn mood_spec<'c>(catalog: &'c MoodCatalog, mood: &str) -> anyhow::Result<&'c MoodSpec> {
    catalog
        .get(mood)
        .with_context(|| format!("Available moods: {}", catalog.names().join(", ")))
}

/// Print `value` as JSON, or the text rendering for the table format.
fn emit<T: Serialize>(format: &str, value: &T, table: impl FnOnce() -> String) -> anyhow::Result<()> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(value)?),
        "table" => println!("{}", table()),
        _ => {
            tracing::warn!("Unknown format: {}. Using JSON.", format);
            println!("{}", serde_json::to_string_pretty(value)?);
        }
    }
    Ok(())
}

/// Recommend cafes for a single mood.
pub async fn run_recommend(
    mood: String,
    top_n: Option<usize>,
    min_confidence: Option<f64>,
    seed: Option<u64>,
    catalog: Option<String>,
    format: String,
    source: SourceArgs,
) -> anyhow::Result<()> {
    let state = load_state(&source)?;
    let catalog = catalog_for(&state, catalog.as_deref())?;

    let spec = mood_spec(&catalog, &mood)?;
    let seed = seed.or(state.config.profiles.seed);
    let top_n = top_n.unwrap_or(state.config.recommendation.top_n);
    let min_confidence = min_confidence.unwrap_or(state.config.recommendation.min_confidence);

    let profile = state.generator().generate_seeded(spec, seed)?;
    let recommendations =
        state
            .recommender()
            .predict_with_confidence(&profile.features, top_n, min_confidence)?;

    let response = RecommendResponse {
        mood: profile.name,
        profile: profile.features,
        recommendations,
    };

    emit(&format, &response, || {
        format!(
            "{}\n{}",
            format_report(&spec.label(), &response.recommendations, &response.profile),
            RecommendationTable::from_recommendations(&response.recommendations).render()
        )
    })
}

/// Score every mood of a catalog and print the summary table.
pub async fn run_moods(
    top_n: Option<usize>,
    min_confidence: Option<f64>,
    seed: Option<u64>,
    catalog: Option<String>,
    format: String,
    source: SourceArgs,
) -> anyhow::Result<()> {
    let state = load_state(&source)?;
    let catalog = catalog_for(&state, catalog.as_deref())?;

    let seed = seed.or(state.config.profiles.seed);
    let top_n = top_n.unwrap_or(state.config.recommendation.summary_top_n);
    let min_confidence =
        min_confidence.unwrap_or(state.config.recommendation.summary_min_confidence);

    let profiles = state.generator().generate_all(catalog.moods(), seed)?;
    let results = state
        .recommender()
        .predict_all_moods(&profiles, top_n, min_confidence)?;
    let summary = MoodSummaryTable::from_results(&results);

    let response = MoodSummaryResponse {
        catalog: catalog.kind().name().to_string(),
        results,
        summary,
    };

    emit(&format, &response, || {
        format!(
            "Mood summary ({} catalog)\n\n{}",
            response.catalog,
            response.summary.render()
        )
    })
}

/// Monte-Carlo ensemble of one mood.
pub async fn run_ensemble(
    mood: String,
    samples: Option<usize>,
    min_confidence: Option<f64>,
    seed: Option<u64>,
    format: String,
    source: SourceArgs,
) -> anyhow::Result<()> {
    let state = load_state(&source)?;
    let catalog = MoodCatalog::ensemble();

    let spec = mood_spec(&catalog, &mood)?;
    let samples = samples.unwrap_or(state.config.profiles.ensemble_samples);
    let seed = seed.or(state.config.profiles.seed);
    let min_confidence = min_confidence.unwrap_or(state.config.recommendation.min_confidence);

    tracing::info!("Drawing {} '{}' profiles", samples, spec.name);
    let profiles = state.generator().generate_ensemble(spec, samples, seed)?;
    let tally = state
        .recommender()
        .tally_ensemble(&spec.name, &profiles, min_confidence)?;

    emit(&format, &tally, || format_tally(&tally))
}

/// Explain the top cafe for one mood.
pub async fn run_explain(
    mood: String,
    seed: Option<u64>,
    catalog: Option<String>,
    format: String,
    source: SourceArgs,
) -> anyhow::Result<()> {
    let state = load_state(&source)?;
    let catalog = catalog_for(&state, catalog.as_deref())?;

    let spec = mood_spec(&catalog, &mood)?;
    let seed = seed.or(state.config.profiles.seed);
    let profile = state.generator().generate_seeded(spec, seed)?;
    let explanation = state.recommender().explain(&profile)?;

    emit(&format, &explanation, || format_explanation(&explanation))
}

/// Print the feature statistics the dynamic moods sample from.
pub async fn run_ranges(dataset: Option<PathBuf>, format: String) -> anyhow::Result<()> {
    let config = load_config(&SourceArgs {
        model: None,
        dataset,
    })?;

    let data = CafeDataset::from_csv(&config.dataset.path, &config.dataset)?;
    let ranges = data.feature_ranges();

    emit(&format, &ranges, || format_ranges(&ranges))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_recommend() {
        let cli = Cli::try_parse_from([
            "cafe-mood-api",
            "recommend",
            "Cozy",
            "-n",
            "3",
            "--min-confidence",
            "0.2",
            "--seed",
            "42",
            "--format",
            "json",
            "--model",
            "models/rfc.onnx",
        ])
        .unwrap();

        match cli.command {
            Commands::Recommend {
                mood,
                top_n,
                min_confidence,
                seed,
                catalog,
                format,
                source,
            } => {
                assert_eq!(mood, "Cozy");
                assert_eq!(top_n, Some(3));
                assert_eq!(min_confidence, Some(0.2));
                assert_eq!(seed, Some(42));
                assert!(catalog.is_none());
                assert_eq!(format, "json");
                assert_eq!(source.model, Some(PathBuf::from("models/rfc.onnx")));
                assert!(source.dataset.is_none());
            }
            _ => panic!("Expected Recommend command"),
        }
    }

    #[test]
    fn test_parse_serve_leaves_config_alone() {
        let cli = Cli::try_parse_from(["cafe-mood-api", "serve"]).unwrap();
        match cli.command {
            Commands::Serve { host, port } => {
                assert!(host.is_none());
                assert!(port.is_none());
            }
            _ => panic!("Expected Serve command"),
        }

        let cli = Cli::try_parse_from(["cafe-mood-api", "serve", "-p", "9000"]).unwrap();
        match cli.command {
            Commands::Serve { host, port } => {
                assert!(host.is_none());
                assert_eq!(port, Some(9000));
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_parse_ensemble_and_ranges() {
        let cli = Cli::try_parse_from(["cafe-mood-api", "ensemble", "Rainy", "--samples", "500"]).unwrap();
        match cli.command {
            Commands::Ensemble { mood, samples, format, .. } => {
                assert_eq!(mood, "Rainy");
                assert_eq!(samples, Some(500));
                assert_eq!(format, "table");
            }
            _ => panic!("Expected Ensemble command"),
        }

        let cli = Cli::try_parse_from(["cafe-mood-api", "ranges", "-d", "data.csv"]).unwrap();
        assert!(matches!(cli.command, Commands::Ranges { dataset: Some(_), .. }));
    }

    #[test]
    fn test_missing_mood_is_rejected() {
        assert!(Cli::try_parse_from(["cafe-mood-api", "explain"]).is_err());
    }
}
