//! Plain-text tables and reports.

use serde::Serialize;

use crate::features::{FeatureRangeTable, FeatureVector, Stat};
use crate::lookup::ADDRESS_UNAVAILABLE;
use crate::recommend::{EnsembleTally, Explanation, MoodRecommendations, Recommendation};

pub const NO_RECOMMENDATIONS: &str = "No confident recommendations found";
pub const NO_MATCH: &str = "No confident match";

const RULE_WIDTH: usize = 70;

/// Ranked recommendations for a single profile.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecommendationTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl RecommendationTable {
    pub fn from_recommendations(recs: &[Recommendation]) -> Self {
        if recs.is_empty() {
            return Self {
                headers: vec!["Message".to_string()],
                rows: vec![vec![NO_RECOMMENDATIONS.to_string()]],
            };
        }

        let headers = ["Rank", "Cafe Name", "Address", "Suitability (%)", "Confidence"];
        let rows = recs
            .iter()
            .map(|r| {
                vec![
                    r.rank.to_string(),
                    r.name.clone(),
                    r.address.clone(),
                    format!("{:.1}", r.suitability_score),
                    r.confidence.to_string(),
                ]
            })
            .collect();

        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    pub fn render(&self) -> String {
        render_table(&self.headers, &self.rows)
    }
}

/// One row per mood with its top recommendation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodSummaryTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl MoodSummaryTable {
    pub fn from_results(results: &[MoodRecommendations]) -> Self {
        let headers = ["Mood", "Top Recommendation", "Address", "Suitability Score", "Confidence Level"];
        let rows = results
            .iter()
            .map(|result| match result.recommendations.first() {
                Some(top) => vec![
                    result.mood.clone(),
                    top.name.clone(),
                    top.address.clone(),
                    format!("{:.1}%", top.suitability_score),
                    top.confidence.to_string(),
                ],
                None => vec![
                    result.mood.clone(),
                    NO_MATCH.to_string(),
                    ADDRESS_UNAVAILABLE.to_string(),
                    ADDRESS_UNAVAILABLE.to_string(),
                    ADDRESS_UNAVAILABLE.to_string(),
                ],
            })
            .collect();

        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    pub fn render(&self) -> String {
        render_table(&self.headers, &self.rows)
    }
}

/// Multi-line report for one mood.
pub fn format_report(mood: &str, recs: &[Recommendation], profile: &FeatureVector) -> String {
    let rule = "=".repeat(RULE_WIDTH);
    let mut lines = vec![
        String::new(),
        rule.clone(),
        format!("Recommendations for: {}", mood),
        rule,
    ];

    if recs.is_empty() {
        lines.push(String::new());
        lines.push(format!("{} for this profile.", NO_RECOMMENDATIONS));
        lines.push("Consider adjusting the minimum confidence threshold or mood features.".to_string());
        return lines.join("\n");
    }

    lines.push(String::new());
    lines.push(format!("Found {} suitable cafe(s):", recs.len()));
    lines.push(String::new());

    for rec in recs {
        lines.push(format!("{}. {}", rec.rank, rec.name));
        lines.push(format!("   Address: {}", rec.address));
        lines.push(format!("   Suitability: {:.1}%", rec.suitability_score));
        lines.push(format!("   Confidence: {}", rec.confidence));
        lines.push(String::new());
    }

    if !profile.is_empty() {
        lines.push(String::new());
        lines.push("Profile Features Used:".to_string());
        for (feature, value) in profile.iter() {
            lines.push(format!("  - {}: {:.2}", feature, value));
        }
        lines.push(String::new());
    }

    lines.join("\n")
}

pub fn format_explanation(explanation: &Explanation) -> String {
    let mut lines = vec![
        format!("Mood: {}", explanation.mood),
        format!("Predicted cafe: {} ({})", explanation.name, explanation.cafe_key),
        format!("Address: {}", explanation.address),
        format!(
            "Probability: {:.1}% ({})",
            explanation.probability * 100.0,
            explanation.confidence
        ),
        String::new(),
        "Most important features:".to_string(),
    ];

    for f in &explanation.top_features {
        lines.push(format!(
            "  - {}: importance {:.3}, value {:.2}",
            f.feature, f.importance, f.value
        ));
    }

    lines.push(String::new());
    lines.push("Profile values:".to_string());
    for (feature, value) in explanation.profile.iter() {
        lines.push(format!("  - {}: {:.2}", feature, value));
    }

    lines.join("\n")
}

pub fn format_tally(tally: &EnsembleTally) -> String {
    let mut lines = vec![format!(
        "Ensemble for {}: {} samples, {} without a confident match ({:.1}%)",
        tally.mood,
        tally.samples,
        tally.no_match,
        tally.no_match_share * 100.0
    )];

    if tally.entries.is_empty() {
        lines.push(NO_RECOMMENDATIONS.to_string());
        return lines.join("\n");
    }

    let headers: Vec<String> = ["Cafe Name", "Top-1 Wins", "Share (%)", "Mean Probability"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let rows: Vec<Vec<String>> = tally
        .entries
        .iter()
        .map(|e| {
            vec![
                e.name.clone(),
                e.wins.to_string(),
                format!("{:.1}", e.share * 100.0),
                format!("{:.3}", e.mean_probability),
            ]
        })
        .collect();
    lines.push(String::new());
    lines.push(render_table(&headers, &rows));

    lines.join("\n")
}

/// Training-set statistics per feature.
pub fn format_ranges(ranges: &FeatureRangeTable) -> String {
    let stats = [Stat::Min, Stat::P25, Stat::P50, Stat::P75, Stat::Max];
    let mut headers = vec!["Feature".to_string()];
    headers.extend(stats.iter().map(|s| s.name().to_string()));

    let rows: Vec<Vec<String>> = ranges
        .iter()
        .map(|(feature, s)| {
            let mut row = vec![feature.to_string()];
            row.extend(stats.iter().map(|stat| format!("{:.2}", s.get(*stat))));
            row
        })
        .collect();

    render_table(&headers, &rows)
}

/// Left-aligned columns separated by two spaces, with a dashed rule under
/// the header.
fn render_table(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count()).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |cells: &[String]| {
        cells
            .iter()
            .zip(&widths)
            .map(|(cell, w)| format!("{:<width$}", cell, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = vec![line(headers)];
    out.push(
        widths
            .iter()
            .map(|w| "-".repeat(*w))
            .collect::<Vec<_>>()
            .join("  "),
    );
    out.extend(rows.iter().map(|row| line(row)));
    out.join("\n")
}
