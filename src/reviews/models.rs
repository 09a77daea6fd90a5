// Review data types.
//
// A ReviewRecord keeps the handful of typed fields the pipeline and the
// database care about, plus every raw cell of the input row so the output can
// reproduce the input columns exactly. Malformed optional values (a rating of
// "n/a", an unparseable date) become None rather than failing the row.

use std::collections::BTreeMap;

use anyhow::{bail, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::Serialize;
use tracing::debug;

pub const REVIEW_ID: &str = "review_id";
pub const BANK_ID: &str = "bank_id";
pub const REVIEW_TEXT: &str = "review_text";
pub const RATING: &str = "rating";
pub const REVIEW_DATE: &str = "review_date";
pub const BANK_NAME: &str = "bank_name";
pub const BANK_CODE: &str = "bank_code";
pub const SOURCE: &str = "source";
pub const SENTIMENT_LABEL: &str = "sentiment_label";
pub const SENTIMENT_SCORE: &str = "sentiment_score";
pub const SENTIMENT_GROUP: &str = "sentiment_group";
pub const CLEANED_TEXT: &str = "cleaned_text";
pub const KEYWORDS: &str = "keywords";
pub const THEME: &str = "theme";

/// Columns every input table must have.
pub const REQUIRED_COLUMNS: &[&str] = &[REVIEW_TEXT, BANK_CODE];

/// Columns the analysis appends to its output.
pub const DERIVED_COLUMNS: &[&str] = &[CLEANED_TEXT, KEYWORDS, THEME];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReviewRecord {
    pub review_id: String,
    pub bank_code: String,
    pub review_text: Option<String>,
    pub bank_id: Option<String>,
    pub bank_name: Option<String>,
    pub rating: Option<f64>,
    pub review_date: Option<NaiveDateTime>,
    pub source: Option<String>,
    pub sentiment_label: Option<String>,
    pub sentiment_score: Option<f64>,
    pub sentiment_group: Option<String>,
    /// Every non-empty cell of the input row, keyed by column name.
    #[serde(skip)]
    pub cells: BTreeMap<String, String>,
}

impl ReviewRecord {
    /// A record with just the fields the analysis reads.
    pub fn new(review_id: &str, bank_code: &str, review_text: Option<&str>) -> Self {
        let mut cells = BTreeMap::new();
        cells.insert(REVIEW_ID.to_string(), review_id.to_string());
        cells.insert(BANK_CODE.to_string(), bank_code.to_string());
        if let Some(text) = review_text {
            cells.insert(REVIEW_TEXT.to_string(), text.to_string());
        }
        Self::from_cells(cells, 0)
    }

    /// Build a record from raw cells. Empty cells are treated as absent.
    ///
    /// `row_number` (1-based) stands in for the id when there is no
    /// `review_id` cell.
    pub fn from_cells(cells: BTreeMap<String, String>, row_number: usize) -> Self {
        let cells: BTreeMap<String, String> =
            cells.into_iter().filter(|(_, v)| !v.is_empty()).collect();
        let text = |column: &str| cells.get(column).cloned();

        let review_id = text(REVIEW_ID).unwrap_or_else(|| row_number.to_string());

        Self {
            bank_code: text(BANK_CODE).unwrap_or_default(),
            review_text: text(REVIEW_TEXT),
            bank_id: text(BANK_ID),
            bank_name: text(BANK_NAME),
            rating: parse_number(&review_id, RATING, cells.get(RATING)),
            review_date: cells.get(REVIEW_DATE).and_then(|raw| {
                let parsed = parse_review_date(raw);
                if parsed.is_none() {
                    debug!(review_id, value = raw.as_str(), "Unparseable review_date");
                }
                parsed
            }),
            source: text(SOURCE),
            sentiment_label: text(SENTIMENT_LABEL),
            sentiment_score: parse_number(&review_id, SENTIMENT_SCORE, cells.get(SENTIMENT_SCORE)),
            sentiment_group: text(SENTIMENT_GROUP),
            review_id,
            cells,
        }
    }

    /// The raw cell for `column`, if the row had one.
    pub fn cell(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(String::as_str)
    }
}

fn parse_number(review_id: &str, column: &str, raw: Option<&String>) -> Option<f64> {
    let raw = raw?;
    match raw.trim().parse::<f64>() {
        Ok(value) if value.is_finite() => Some(value),
        _ => {
            debug!(review_id, column, value = raw.as_str(), "Unparseable number");
            None
        }
    }
}

/// Parse the date formats review exports use: RFC 3339, `YYYY-MM-DD HH:MM:SS`
/// (optionally with fractional seconds) and plain `YYYY-MM-DD`.
pub fn parse_review_date(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in DATE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// An input table: column headers in file order plus the parsed rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewTable {
    pub headers: Vec<String>,
    pub records: Vec<ReviewRecord>,
}

impl ReviewTable {
    /// Fails when a required column is missing from `headers`.
    pub fn new(headers: Vec<String>, records: Vec<ReviewRecord>) -> Result<Self> {
        require_columns(&headers, REQUIRED_COLUMNS)?;
        Ok(Self { headers, records })
    }

    /// A table with the minimal column set, for records built in code.
    pub fn from_records(records: Vec<ReviewRecord>) -> Self {
        Self {
            headers: [REVIEW_ID, BANK_CODE, REVIEW_TEXT]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            records,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    pub fn texts(&self) -> impl Iterator<Item = Option<&str>> {
        self.records.iter().map(|r| r.review_text.as_deref())
    }

    pub fn bank_codes(&self) -> Vec<&str> {
        self.records.iter().map(|r| r.bank_code.as_str()).collect()
    }
}

/// Fails naming the first of `required` absent from `headers`.
pub fn require_columns(headers: &[String], required: &[&str]) -> Result<()> {
    for column in required {
        if !headers.iter().any(|h| h == column) {
            bail!("Missing required column '{column}'");
        }
    }
    Ok(())
}

/// A review with the three analysis columns filled in.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ThemedReview {
    #[serde(flatten)]
    pub record: ReviewRecord,
    pub cleaned_text: String,
    pub keywords: String,
    pub theme: String,
}

impl ThemedReview {
    /// Value of `column` as it should appear in the output table.
    pub fn output_cell(&self, column: &str) -> Option<&str> {
        match column {
            CLEANED_TEXT => Some(&self.cleaned_text),
            KEYWORDS => Some(&self.keywords),
            THEME => Some(&self.theme),
            other => self.record.cell(other),
        }
    }
}

/// The themed output table, rows in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct ThemedTable {
    /// Headers of the input table.
    pub headers: Vec<String>,
    pub rows: Vec<ThemedReview>,
}

impl ThemedTable {
    pub fn empty(headers: Vec<String>) -> Self {
        Self {
            headers,
            rows: Vec::new(),
        }
    }

    /// Input headers followed by the derived columns the input did not have.
    pub fn output_headers(&self) -> Vec<String> {
        let mut headers = self.headers.clone();
        for column in DERIVED_COLUMNS {
            if !headers.iter().any(|h| h == column) {
                headers.push(column.to_string());
            }
        }
        headers
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
