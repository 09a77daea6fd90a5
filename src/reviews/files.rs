// Reading and writing review tables on disk.
//
// Input is always CSV with a header row. Output is CSV, or a JSON array of
// row objects when the destination ends in `.json`. Cells are kept as text;
// typed parsing of ratings, scores and dates happens in ReviewRecord.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::models::{
    require_columns, ReviewRecord, ReviewTable, ThemedReview, ThemedTable, CLEANED_TEXT, KEYWORDS,
    REVIEW_ID, THEME,
};
use super::traits::ReviewSource;

/// Reviews exported to a CSV file.
pub struct CsvReviewSource {
    path: PathBuf,
}

impl CsvReviewSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ReviewSource for CsvReviewSource {
    fn load(&self) -> Result<ReviewTable> {
        let file = File::open(&self.path)
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        let table = read_reviews(file)
            .with_context(|| format!("Failed to read reviews from {}", self.path.display()))?;
        info!(
            path = %self.path.display(),
            rows = table.len(),
            columns = table.headers.len(),
            "Loaded reviews"
        );
        Ok(table)
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Parse a review CSV. Fails when `review_text` or `bank_code` is missing.
pub fn read_reviews<R: Read>(reader: R) -> Result<ReviewTable> {
    let mut rdr = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()
        .context("Failed to read CSV header row")?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    // Validate before touching any rows so a bad file fails fast.
    let table = ReviewTable::new(headers, Vec::new())?;
    if !table.has_column(REVIEW_ID) {
        warn!("No review_id column; using 1-based row numbers as review ids");
    }

    let mut records = Vec::new();
    for (index, row) in rdr.records().enumerate() {
        let row = row.with_context(|| format!("Malformed CSV row {}", index + 1))?;
        let cells: BTreeMap<String, String> = table
            .headers
            .iter()
            .zip(row.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();
        records.push(ReviewRecord::from_cells(cells, index + 1));
    }

    Ok(ReviewTable {
        headers: table.headers,
        records,
    })
}

/// Parse a CSV previously written by the analysis (it must carry a `theme` column).
pub fn read_themed<R: Read>(reader: R) -> Result<ThemedTable> {
    let table = read_reviews(reader)?;
    require_columns(&table.headers, &[THEME])?;

    let rows = table
        .records
        .into_iter()
        .map(|record| {
            let take = |column: &str| record.cell(column).unwrap_or_default().to_string();
            ThemedReview {
                cleaned_text: take(CLEANED_TEXT),
                keywords: take(KEYWORDS),
                theme: take(THEME),
                record,
            }
        })
        .collect();

    Ok(ThemedTable {
        headers: table.headers,
        rows,
    })
}

/// Load a themed CSV from disk.
pub fn load_themed(path: &Path) -> Result<ThemedTable> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    read_themed(file).with_context(|| format!("Failed to read themed reviews from {}", path.display()))
}

/// Write the themed table as CSV: input columns first, then the derived ones.
pub fn write_csv<W: Write>(table: &ThemedTable, writer: W) -> Result<()> {
    let headers = table.output_headers();
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(&headers)
        .context("Failed to write CSV header")?;
    for row in &table.rows {
        wtr.write_record(headers.iter().map(|h| row.output_cell(h).unwrap_or_default()))
            .with_context(|| format!("Failed to write review {}", row.record.review_id))?;
    }
    wtr.flush().context("Failed to flush CSV output")?;
    Ok(())
}

/// Write the themed table as a JSON array of objects. Absent cells are null.
pub fn write_json<W: Write>(table: &ThemedTable, writer: W) -> Result<()> {
    let headers = table.output_headers();
    let rows: Vec<serde_json::Value> = table
        .rows
        .iter()
        .map(|row| {
            let object: serde_json::Map<String, serde_json::Value> = headers
                .iter()
                .map(|h| {
                    let value = row
                        .output_cell(h)
                        .map(|v| serde_json::Value::String(v.to_string()))
                        .unwrap_or(serde_json::Value::Null);
                    (h.clone(), value)
                })
                .collect();
            serde_json::Value::Object(object)
        })
        .collect();
    serde_json::to_writer_pretty(writer, &rows).context("Failed to serialize themed reviews")?;
    Ok(())
}

/// Write to `path`, as JSON when it ends in `.json` and CSV otherwise.
pub fn write_output(table: &ThemedTable, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut writer = BufWriter::new(file);

    if is_json(path) {
        write_json(table, &mut writer)?;
    } else {
        write_csv(table, &mut writer)?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", path.display()))?;

    info!(path = %path.display(), rows = table.len(), "Wrote themed reviews");
    Ok(())
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// `<dir>/<stem>_with_themes.csv` next to the input file.
pub fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("reviews");
    input.with_file_name(format!("{stem}_with_themes.csv"))
}
