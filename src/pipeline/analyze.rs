// Thematic analysis pipeline.
//
// normalize every review -> fit TF-IDF once over the whole corpus ->
// cluster each bank's rows on the shared matrix -> write cleaned text,
// keywords and theme back onto each row by position.
//
// Pure CPU work with no I/O. Callers on an async runtime should run it
// inside spawn_blocking.

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::config::AnalysisConfig;
use crate::reviews::models::{ReviewTable, ThemedReview, ThemedTable};
use crate::themes::clusterer::assign_themes;
use crate::themes::normalize::TextNormalizer;
use crate::themes::summary::{summarize_groups, GroupReport};
use crate::themes::tfidf::fit_transform;

/// Enriched table plus the per-bank theme breakdown.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub table: ThemedTable,
    pub vocabulary_size: usize,
    pub groups: Vec<GroupReport>,
}

/// Serializable run summary, stored as run state after `analyze --store`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary<'a> {
    pub rows: usize,
    pub vocabulary_size: usize,
    pub groups: &'a [GroupReport],
}

impl AnalysisReport {
    pub fn summary(&self) -> RunSummary<'_> {
        RunSummary {
            rows: self.table.len(),
            vocabulary_size: self.vocabulary_size,
            groups: &self.groups,
        }
    }
}

pub struct ThematicAnalyzer {
    config: AnalysisConfig,
    normalizer: TextNormalizer,
}

impl ThematicAnalyzer {
    /// Validates the config and builds the English normalizer.
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        let normalizer = TextNormalizer::english()?;
        Ok(Self { config, normalizer })
    }

    /// Use a custom normalizer (different stop words or lemmatizer).
    pub fn with_normalizer(config: AnalysisConfig, normalizer: TextNormalizer) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, normalizer })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run the full analysis over `table`. An empty table is returned as-is.
    pub fn process(&self, table: &ReviewTable) -> Result<AnalysisReport> {
        if table.is_empty() {
            info!("No reviews to analyze");
            return Ok(AnalysisReport {
                table: ThemedTable::empty(table.headers.clone()),
                vocabulary_size: 0,
                groups: Vec::new(),
            });
        }

        let cleaned = self.normalizer.normalize_all(table.texts());
        let features = fit_transform(&cleaned, self.config.max_features, self.config.top_keywords);

        let bank_codes = table.bank_codes();
        let assignment = assign_themes(&features.matrix, &bank_codes, &self.config.kmeans_params())
            .context("Theme clustering failed")?;

        let groups = summarize_groups(
            &assignment,
            &features.matrix,
            &features.vocabulary,
            self.config.top_keywords,
        );

        let rows: Vec<ThemedReview> = table
            .records
            .iter()
            .zip(cleaned)
            .zip(features.keywords)
            .zip(&assignment.labels)
            .map(|(((record, cleaned_text), keywords), theme)| ThemedReview {
                record: record.clone(),
                cleaned_text,
                keywords,
                theme: theme.to_string(),
            })
            .collect();

        info!(
            rows = rows.len(),
            banks = groups.len(),
            vocabulary = features.vocabulary.len(),
            "Thematic analysis complete"
        );

        Ok(AnalysisReport {
            table: ThemedTable {
                headers: table.headers.clone(),
                rows,
            },
            vocabulary_size: features.vocabulary.len(),
            groups,
        })
    }
}
