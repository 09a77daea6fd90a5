// Composition tests: CSV in -> normalize -> TF-IDF -> per-bank k-means ->
// themed table out, with no database involved. File round trips use
// tempfile directories.

use std::collections::BTreeSet;

use review_themes::config::AnalysisConfig;
use review_themes::pipeline::analyze::ThematicAnalyzer;
use review_themes::reviews::files::{self, read_reviews, read_themed, write_csv, write_json};
use review_themes::reviews::models::{ReviewRecord, ReviewTable};

fn analyzer(themes: usize) -> ThematicAnalyzer {
    ThematicAnalyzer::new(AnalysisConfig {
        themes_per_group: themes,
        ..AnalysisConfig::default()
    })
    .unwrap()
}

/// Five rows per bank: three about login trouble, two about fees.
fn two_bank_table() -> ReviewTable {
    let mut records = Vec::new();
    for bank in ["A", "B"] {
        for i in 0..3 {
            records.push(ReviewRecord::new(
                &format!("{bank}-login-{i}"),
                bank,
                Some("Password reset OTP never arrives, login locked"),
            ));
        }
        for i in 0..2 {
            records.push(ReviewRecord::new(
                &format!("{bank}-fee-{i}"),
                bank,
                Some("Transfer fee charged twice, deducted from balance"),
            ));
        }
    }
    ReviewTable::from_records(records)
}

// ============================================================
// Pipeline
// ============================================================

#[test]
fn small_bank_gets_single_theme() {
    let table = ReviewTable::from_records(vec![
        ReviewRecord::new("1", "A", Some("App crashes on startup")),
        ReviewRecord::new("2", "A", Some("Cannot transfer money")),
        ReviewRecord::new("3", "A", Some("Great service, fast transfers")),
    ]);
    let report = analyzer(5).process(&table).unwrap();
    assert_eq!(report.table.len(), 3);
    assert!(report.table.rows.iter().all(|r| r.theme == "Theme_0"));
    assert_eq!(report.groups.len(), 1);
    assert!(report.groups[0].fallback);
}

#[test]
fn each_bank_splits_its_own_topics() {
    let report = analyzer(2).process(&two_bank_table()).unwrap();
    assert_eq!(report.table.len(), 10);

    for bank in ["A", "B"] {
        let rows: Vec<_> = report
            .table
            .rows
            .iter()
            .filter(|r| r.record.bank_code == bank)
            .collect();
        let themes: BTreeSet<&str> = rows.iter().map(|r| r.theme.as_str()).collect();
        assert_eq!(
            themes,
            BTreeSet::from(["Theme_0", "Theme_1"]),
            "bank {bank}"
        );
        // Identical texts share a theme.
        assert!(rows[..3].iter().all(|r| r.theme == rows[0].theme));
        assert!(rows[3..].iter().all(|r| r.theme == rows[3].theme));
        assert_ne!(rows[0].theme, rows[3].theme);
    }

    let group_names: Vec<&str> = report.groups.iter().map(|g| g.group.as_str()).collect();
    assert_eq!(group_names, vec!["A", "B"]);
    assert!(report.groups.iter().all(|g| !g.fallback && g.converged));
}

#[test]
fn derived_columns_are_filled() {
    let report = analyzer(2).process(&two_bank_table()).unwrap();
    for row in &report.table.rows {
        assert!(!row.cleaned_text.is_empty());
        assert_eq!(row.cleaned_text, row.cleaned_text.to_lowercase());
        assert!(!row.keywords.is_empty());
        for keyword in row.keywords.split(", ") {
            assert!(row.cleaned_text.split_whitespace().any(|t| t == keyword));
        }
    }
}

#[test]
fn same_input_same_themes() {
    let table = two_bank_table();
    let first = analyzer(2).process(&table).unwrap();
    let second = analyzer(2).process(&table).unwrap();
    assert_eq!(first.table, second.table);
}

// ============================================================
// Files in and out
// ============================================================

#[test]
fn csv_round_trip_keeps_input_columns() {
    let input = "\
review_id,review_text,rating,bank_code,extra
r1,Login fails every time,1,A,x
r2,,5,A,y
r3,Fees are too high,2,B,z
";
    let table = read_reviews(input.as_bytes()).unwrap();
    let report = analyzer(5).process(&table).unwrap();

    let mut buffer = Vec::new();
    write_csv(&report.table, &mut buffer).unwrap();
    let written = String::from_utf8(buffer).unwrap();
    let header = written.lines().next().unwrap();
    assert_eq!(
        header,
        "review_id,review_text,rating,bank_code,extra,cleaned_text,keywords,theme"
    );

    let back = read_themed(written.as_bytes()).unwrap();
    assert_eq!(back.len(), 3);
    assert_eq!(back.rows[0].record.cell("extra"), Some("x"));
    assert_eq!(back.rows[1].record.review_text, None);
    assert_eq!(back.rows[1].cleaned_text, "");
    assert!(back.rows.iter().all(|r| r.theme == "Theme_0"));
}

#[test]
fn missing_column_is_named() {
    let err = read_reviews("review_id,review_text\n1,hello\n".as_bytes()).unwrap_err();
    assert!(format!("{err:#}").contains("bank_code"), "{err:#}");
}

#[test]
fn json_output_has_one_object_per_row() {
    let report = analyzer(2).process(&two_bank_table()).unwrap();
    let mut buffer = Vec::new();
    write_json(&report.table, &mut buffer).unwrap();
    let value: serde_json::Value = serde_json::from_slice(&buffer).unwrap();
    let rows = value.as_array().unwrap();
    assert_eq!(rows.len(), 10);
    assert_eq!(rows[0]["review_id"], "A-login-0");
    assert!(rows[0]["theme"].as_str().unwrap().starts_with("Theme_"));
}

#[test]
fn write_output_picks_format_from_extension() {
    let dir = tempfile::tempdir().unwrap();
    let report = analyzer(2).process(&two_bank_table()).unwrap();

    let csv_path = dir.path().join("out/themes.csv");
    files::write_output(&report.table, &csv_path).unwrap();
    let loaded = files::load_themed(&csv_path).unwrap();
    assert_eq!(loaded.len(), 10);

    let json_path = dir.path().join("themes.json");
    files::write_output(&report.table, &json_path).unwrap();
    let raw = std::fs::read_to_string(&json_path).unwrap();
    assert!(raw.trim_start().starts_with('['));
}

#[test]
fn default_output_sits_next_to_input() {
    let path = files::default_output_path(std::path::Path::new("data/reviews.csv"));
    assert_eq!(path, std::path::Path::new("data/reviews_with_themes.csv"));
}
