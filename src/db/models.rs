// Data models: Rust structs that map to database rows.
//
// These are separate from the queries so the CLI and status report can use
// them without depending on a specific backend.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::reviews::models::{ReviewRecord, ThemedReview};

/// Format used for review_date in SQLite TEXT columns.
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row of `reviews_with_themes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredReview {
    pub review_id: String,
    pub bank_id: Option<String>,
    pub review_text: Option<String>,
    pub rating: Option<f64>,
    pub review_date: Option<NaiveDateTime>,
    pub bank_name: Option<String>,
    pub bank_code: String,
    pub source: Option<String>,
    pub sentiment_label: Option<String>,
    pub sentiment_score: Option<f64>,
    pub sentiment_group: Option<String>,
    pub cleaned_text: String,
    pub keywords: String,
    pub theme: String,
}

impl From<&ThemedReview> for StoredReview {
    fn from(review: &ThemedReview) -> Self {
        let r: &ReviewRecord = &review.record;
        Self {
            review_id: r.review_id.clone(),
            bank_id: r.bank_id.clone(),
            review_text: r.review_text.clone(),
            rating: r.rating,
            review_date: r.review_date,
            bank_name: r.bank_name.clone(),
            bank_code: r.bank_code.clone(),
            source: r.source.clone(),
            sentiment_label: r.sentiment_label.clone(),
            sentiment_score: r.sentiment_score,
            sentiment_group: r.sentiment_group.clone(),
            cleaned_text: review.cleaned_text.clone(),
            keywords: review.keywords.clone(),
            theme: review.theme.clone(),
        }
    }
}

/// Number of stored reviews for one (bank, theme) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeCount {
    pub bank_code: String,
    pub theme: String,
    pub count: i64,
}

/// What happened to a batch of inserts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InsertOutcome {
    /// Rows written.
    pub inserted: usize,
    /// Rows whose review_id was already stored.
    pub duplicates: usize,
    /// Rows the database rejected (logged and skipped).
    pub failed: usize,
}

impl InsertOutcome {
    pub fn total(&self) -> usize {
        self.inserted + self.duplicates + self.failed
    }

    pub fn merge(&mut self, other: InsertOutcome) {
        self.inserted += other.inserted;
        self.duplicates += other.duplicates;
        self.failed += other.failed;
    }
}

/// Run state keys written by the CLI.
pub mod run_keys {
    pub const LAST_ANALYSIS_AT: &str = "last_analysis_at";
    pub const LAST_ANALYSIS_INPUT: &str = "last_analysis_input";
    pub const LAST_ANALYSIS_SUMMARY: &str = "last_analysis_summary";
    pub const LAST_STORE_AT: &str = "last_store_at";
}
