// Unit tests for seeded k-means and per-bank theme assignment.

use std::collections::BTreeSet;

use review_themes::themes::clusterer::{assign_themes, partition_by_group, ThemeLabel};
use review_themes::themes::kmeans::{KMeansModel, KMeansParams};
use review_themes::themes::tfidf::{fit_transform, DocumentTermMatrix};

fn matrix(texts: &[&str]) -> DocumentTermMatrix {
    let docs: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
    fit_transform(&docs, 1000, 5).matrix
}

/// Two clearly separated topics, `per_topic` rows each.
fn two_topics(per_topic: usize) -> Vec<&'static str> {
    let mut texts = Vec::new();
    for _ in 0..per_topic {
        texts.push("login otp password locked");
    }
    for _ in 0..per_topic {
        texts.push("transfer fee charge deducted");
    }
    texts
}

// ============================================================
// k-means
// ============================================================

#[test]
fn separated_topics_land_in_different_clusters() {
    let texts = two_topics(4);
    let m = matrix(&texts);
    let points: Vec<_> = (0..m.rows()).map(|i| m.row(i)).collect();
    let model = KMeansModel::fit(&points, m.cols(), &KMeansParams::with_clusters(2)).unwrap();

    let labels = model.labels();
    assert!(labels[..4].iter().all(|&l| l == labels[0]));
    assert!(labels[4..].iter().all(|&l| l == labels[4]));
    assert_ne!(labels[0], labels[4]);
    assert!(model.converged());
    assert!(model.inertia() < 1e-9);
    assert_eq!(model.cluster_sizes(), vec![4, 4]);
}

#[test]
fn predict_matches_fitted_labels() {
    let texts = two_topics(3);
    let m = matrix(&texts);
    let points: Vec<_> = (0..m.rows()).map(|i| m.row(i)).collect();
    let model = KMeansModel::fit(&points, m.cols(), &KMeansParams::with_clusters(2)).unwrap();
    for (i, point) in points.iter().enumerate() {
        assert_eq!(model.predict(point), model.labels()[i]);
    }
}

#[test]
fn same_seed_same_labels() {
    let texts = [
        "app crash update",
        "crash after update",
        "login otp fail",
        "otp never arrives",
        "fee too high",
        "hidden fee charge",
        "great app",
        "love this app",
    ];
    let m = matrix(&texts);
    let points: Vec<_> = (0..m.rows()).map(|i| m.row(i)).collect();
    let params = KMeansParams {
        seed: 7,
        ..KMeansParams::with_clusters(3)
    };
    let first = KMeansModel::fit(&points, m.cols(), &params).unwrap();
    let second = KMeansModel::fit(&points, m.cols(), &params).unwrap();
    assert_eq!(first.labels(), second.labels());
    assert_eq!(first.inertia(), second.inertia());
}

#[test]
fn every_cluster_is_used_when_points_are_distinct() {
    let texts = ["alpha", "bravo", "charlie", "delta", "echo"];
    let m = matrix(&texts);
    let points: Vec<_> = (0..m.rows()).map(|i| m.row(i)).collect();
    let model = KMeansModel::fit(&points, m.cols(), &KMeansParams::with_clusters(5)).unwrap();
    let used: BTreeSet<usize> = model.labels().iter().copied().collect();
    assert_eq!(used.len(), 5);
}

#[test]
fn noisy_topics_separate_with_restarts() {
    // Every row is distinct, so this goes through full k-means rather than
    // the one-cluster-per-distinct-row path.
    let texts = [
        "login otp password",
        "login otp locked",
        "login password reset",
        "fee charge deducted",
        "fee charge hidden",
        "transfer fee charge",
    ];
    let m = matrix(&texts);
    let points: Vec<_> = (0..m.rows()).map(|i| m.row(i)).collect();
    let params = KMeansParams {
        n_init: 10,
        ..KMeansParams::with_clusters(2)
    };
    let model = KMeansModel::fit(&points, m.cols(), &params).unwrap();

    let labels = model.labels();
    assert!(labels[..3].iter().all(|&l| l == labels[0]), "{labels:?}");
    assert!(labels[3..].iter().all(|&l| l == labels[3]), "{labels:?}");
    assert_ne!(labels[0], labels[3]);
    assert_eq!(model.n_clusters(), 2);
    assert!(model.inertia() > 0.0);
}

/// Rows that share words across every pair, so no split is clean.
fn overlapping() -> Vec<&'static str> {
    vec![
        "app crash update",
        "app slow update",
        "crash login otp",
        "otp fee charge",
        "fee transfer slow",
        "login transfer app",
        "charge crash slow",
    ]
}

#[test]
fn iteration_budget_exhausted_still_returns_assignment() {
    let texts = overlapping();
    let m = matrix(&texts);
    let points: Vec<_> = (0..m.rows()).map(|i| m.row(i)).collect();
    let params = KMeansParams {
        max_iter: 1,
        tol: 0.0,
        ..KMeansParams::with_clusters(3)
    };
    let model = KMeansModel::fit(&points, m.cols(), &params).unwrap();
    assert_eq!(model.labels().len(), texts.len());
    assert!(model.labels().iter().all(|&l| l < 3));

    let banks = vec!["A"; texts.len()];
    let assignment = assign_themes(&m, &banks, &params).unwrap();
    assert_eq!(assignment.labels.len(), texts.len());
    assert!(assignment.labels.iter().all(|l| l.index() < 3));
    assert!(assignment.labels.iter().all(|l| l.to_string().starts_with("Theme_")));
    assert!(assignment.fallback_groups().next().is_none());
}

#[test]
fn too_few_points_is_an_error() {
    let m = matrix(&["alpha", "bravo"]);
    let points: Vec<_> = (0..m.rows()).map(|i| m.row(i)).collect();
    assert!(KMeansModel::fit(&points, m.cols(), &KMeansParams::with_clusters(3)).is_err());
}

#[test]
fn all_empty_rows_still_cluster() {
    let m = matrix(&["", "", "", ""]);
    let points: Vec<_> = (0..m.rows()).map(|i| m.row(i)).collect();
    let model = KMeansModel::fit(&points, m.cols(), &KMeansParams::with_clusters(2)).unwrap();
    assert_eq!(model.labels().len(), 4);
    assert!(model.labels().iter().all(|&l| l < 2));
}

// ============================================================
// Per-group assignment
// ============================================================

#[test]
fn partition_keeps_row_order() {
    let groups = partition_by_group(&["B", "A", "B", "A", "C"]);
    assert_eq!(groups["A"], vec![1, 3]);
    assert_eq!(groups["B"], vec![0, 2]);
    assert_eq!(groups["C"], vec![4]);
}

#[test]
fn small_groups_fall_back_to_theme_zero() {
    let texts = ["login otp", "fee charge", "crash update"];
    let m = matrix(&texts);
    let assignment = assign_themes(&m, &["A", "A", "A"], &KMeansParams::with_clusters(5)).unwrap();
    assert!(assignment.labels.iter().all(|&l| l == ThemeLabel(0)));
    assert_eq!(assignment.fallback_groups().collect::<Vec<_>>(), vec!["A"]);
}

#[test]
fn labels_stay_within_k() {
    let mut texts = two_topics(5);
    texts.extend(["slow app", "slow loading", "great service"]);
    let banks: Vec<&str> = (0..texts.len()).map(|i| if i % 2 == 0 { "A" } else { "B" }).collect();
    let m = matrix(&texts);
    let assignment = assign_themes(&m, &banks, &KMeansParams::with_clusters(3)).unwrap();
    assert_eq!(assignment.labels.len(), texts.len());
    assert!(assignment.labels.iter().all(|l| l.index() < 3));
    assert_eq!(assignment.models.len(), 2);
}

#[test]
fn groups_are_clustered_independently() {
    // Group A alone, then A next to an unrelated group B: A's labels must not move.
    let a_texts = two_topics(3);
    let m_alone = matrix(&a_texts);
    let alone = assign_themes(&m_alone, &["A"; 6], &KMeansParams::with_clusters(2)).unwrap();

    let mut texts = a_texts.clone();
    texts.extend(["crash", "crash", "crash"]);
    let mut banks = vec!["A"; 6];
    banks.extend(["B"; 3]);
    let m_both = matrix(&texts);
    let both = assign_themes(&m_both, &banks, &KMeansParams::with_clusters(2)).unwrap();

    // Partition equality: same rows grouped together, whatever the numbering.
    let same_cluster = |labels: &[ThemeLabel], i: usize, j: usize| labels[i] == labels[j];
    for i in 0..6 {
        for j in 0..6 {
            assert_eq!(
                same_cluster(&alone.labels, i, j),
                same_cluster(&both.labels, i, j),
                "rows {i} and {j}"
            );
        }
    }
}

#[test]
fn mismatched_labels_are_rejected() {
    let m = matrix(&["alpha", "bravo"]);
    let err = assign_themes(&m, &["A"], &KMeansParams::with_clusters(1)).unwrap_err();
    assert!(err.to_string().contains("do not line up"));
}

#[test]
fn theme_label_round_trips_through_text() {
    let label: ThemeLabel = "Theme_3".parse().unwrap();
    assert_eq!(label, ThemeLabel(3));
    assert_eq!(label.to_string(), "Theme_3");
    assert!("Topic_3".parse::<ThemeLabel>().is_err());
}
