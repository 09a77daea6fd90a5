// Per-group theme reports: how many rows each theme holds and which terms
// characterize it. Clustered groups are described by their centroids; a
// fallback group is described by the mean of its rows.

use serde::Serialize;

use super::clusterer::{GroupModel, ThemeAssignment, ThemeLabel, FALLBACK_THEME};
use super::tfidf::{DocumentTermMatrix, FittedVocabulary};

#[derive(Debug, Clone, Serialize)]
pub struct ThemeSummary {
    pub theme: String,
    pub size: usize,
    pub top_terms: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GroupReport {
    pub group: String,
    pub rows: usize,
    pub fallback: bool,
    pub converged: bool,
    /// Sum of squared distances to the assigned centroids; 0 for a fallback group.
    pub inertia: f64,
    pub themes: Vec<ThemeSummary>,
}

/// One report per group, in group order.
pub fn summarize_groups(
    assignment: &ThemeAssignment,
    matrix: &DocumentTermMatrix,
    vocabulary: &FittedVocabulary,
    top_n: usize,
) -> Vec<GroupReport> {
    assignment
        .models
        .iter()
        .map(|(group, model)| {
            let rows = assignment
                .group_rows
                .get(group)
                .map(Vec::as_slice)
                .unwrap_or_default();
            summarize_group(group, rows, model, matrix, vocabulary, top_n)
        })
        .collect()
}

fn summarize_group(
    group: &str,
    rows: &[usize],
    model: &GroupModel,
    matrix: &DocumentTermMatrix,
    vocabulary: &FittedVocabulary,
    top_n: usize,
) -> GroupReport {
    match model {
        GroupModel::Fallback { rows: count } => {
            let mut mean = vec![0.0; matrix.cols()];
            for &row in rows {
                matrix.row(row).add_to(&mut mean);
            }
            if !rows.is_empty() {
                mean.iter_mut().for_each(|v| *v /= rows.len() as f64);
            }
            GroupReport {
                group: group.to_string(),
                rows: *count,
                fallback: true,
                converged: true,
                inertia: 0.0,
                themes: vec![ThemeSummary {
                    theme: FALLBACK_THEME.to_string(),
                    size: *count,
                    top_terms: vocabulary.top_terms(mean.into_iter().enumerate(), top_n),
                }],
            }
        }
        GroupModel::Clustered(kmeans) => {
            let sizes = kmeans.cluster_sizes();
            let themes = kmeans
                .centroids()
                .rows()
                .into_iter()
                .zip(sizes)
                .enumerate()
                .map(|(k, (centroid, size))| ThemeSummary {
                    theme: ThemeLabel(k).to_string(),
                    size,
                    top_terms: vocabulary.top_terms(centroid.iter().copied().enumerate(), top_n),
                })
                .collect();
            GroupReport {
                group: group.to_string(),
                rows: rows.len(),
                fallback: false,
                converged: kmeans.converged(),
                inertia: kmeans.inertia(),
                themes,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::themes::clusterer::assign_themes;
    use crate::themes::kmeans::KMeansParams;
    use crate::themes::tfidf::fit_transform;

    #[test]
    fn test_reports_cover_every_group() {
        let docs: Vec<String> = [
            "login otp", "login otp", "fee charge", "fee charge", "slow app",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let out = fit_transform(&docs, 100, 5);
        let groups = ["A", "A", "A", "A", "B"];
        let assignment =
            assign_themes(&out.matrix, &groups, &KMeansParams::with_clusters(2)).unwrap();

        let reports = summarize_groups(&assignment, &out.matrix, &out.vocabulary, 3);
        assert_eq!(reports.len(), 2);

        let a = &reports[0];
        assert_eq!(a.group, "A");
        assert!(!a.fallback);
        assert_eq!(a.themes.len(), 2);
        assert_eq!(a.themes.iter().map(|t| t.size).sum::<usize>(), 4);
        let mut terms: Vec<&str> = a
            .themes
            .iter()
            .flat_map(|t| t.top_terms.iter().map(String::as_str))
            .collect();
        terms.sort_unstable();
        assert_eq!(terms, vec!["charge", "fee", "login", "otp"]);

        let b = &reports[1];
        assert!(b.fallback);
        assert_eq!(b.themes[0].theme, "Theme_0");
        assert_eq!(b.themes[0].size, 1);
        assert_eq!(b.themes[0].top_terms, vec!["app", "slow"]);
    }
}
