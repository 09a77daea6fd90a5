// Per-bank theme assignment.
//
// Rows are partitioned by group code and each partition is clustered on its
// own slice of the shared TF-IDF matrix. Partitions share no state, so they
// run on the rayon pool and are gathered back into an ordered map. Labels are
// scattered back to their original row positions, never recomputed by order.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use rayon::prelude::*;
use tracing::{debug, info};

use super::kmeans::{KMeansModel, KMeansParams};
use super::tfidf::{DocumentTermMatrix, SparseRow};

/// A cluster label scoped to one group. Displays as `Theme_<k>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ThemeLabel(pub usize);

/// Label given to every row of a group too small to cluster.
pub const FALLBACK_THEME: ThemeLabel = ThemeLabel(0);

const THEME_PREFIX: &str = "Theme_";

impl ThemeLabel {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ThemeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{THEME_PREFIX}{}", self.0)
    }
}

impl FromStr for ThemeLabel {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let Some(index) = s.strip_prefix(THEME_PREFIX) else {
            bail!("Not a theme label: {s:?}");
        };
        let index = index
            .parse::<usize>()
            .with_context(|| format!("Not a theme label: {s:?}"))?;
        Ok(Self(index))
    }
}

/// What was built for one group.
#[derive(Debug, Clone)]
pub enum GroupModel {
    /// Fewer rows than themes: everything is `Theme_0`, nothing was fit.
    Fallback { rows: usize },
    Clustered(KMeansModel),
}

impl GroupModel {
    pub fn is_fallback(&self) -> bool {
        matches!(self, GroupModel::Fallback { .. })
    }

    pub fn kmeans(&self) -> Option<&KMeansModel> {
        match self {
            GroupModel::Clustered(model) => Some(model),
            GroupModel::Fallback { .. } => None,
        }
    }
}

/// Theme labels for every row plus the per-group models behind them.
#[derive(Debug, Clone)]
pub struct ThemeAssignment {
    /// One label per matrix row, in row order.
    pub labels: Vec<ThemeLabel>,
    pub models: BTreeMap<String, GroupModel>,
    /// Row indices of each group, ascending.
    pub group_rows: BTreeMap<String, Vec<usize>>,
}

impl ThemeAssignment {
    pub fn fallback_groups(&self) -> impl Iterator<Item = &str> {
        self.models
            .iter()
            .filter(|(_, m)| m.is_fallback())
            .map(|(g, _)| g.as_str())
    }
}

/// Row indices per group code, in ascending row order within each group.
pub fn partition_by_group<S: AsRef<str>>(group_labels: &[S]) -> BTreeMap<String, Vec<usize>> {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for (row, label) in group_labels.iter().enumerate() {
        groups.entry(label.as_ref().to_string()).or_default().push(row);
    }
    groups
}

/// Cluster each group's rows into `params.n_clusters` themes.
///
/// `group_labels[i]` is the group of matrix row `i`. Groups with fewer rows
/// than themes fall back to `Theme_0` for every row.
pub fn assign_themes<S>(
    matrix: &DocumentTermMatrix,
    group_labels: &[S],
    params: &KMeansParams,
) -> Result<ThemeAssignment>
where
    S: AsRef<str> + Sync,
{
    if group_labels.len() != matrix.rows() {
        bail!(
            "Group labels ({}) do not line up with matrix rows ({})",
            group_labels.len(),
            matrix.rows()
        );
    }
    if params.n_clusters == 0 {
        bail!("Themes per group must be at least 1");
    }

    let group_rows = partition_by_group(group_labels);

    let models: BTreeMap<String, GroupModel> = group_rows
        .par_iter()
        .map(|(group, rows)| {
            let model = fit_group(matrix, rows, params)
                .with_context(|| format!("Failed to cluster group {group:?}"))?;
            Ok((group.clone(), model))
        })
        .collect::<Result<Vec<_>>>()?
        .into_iter()
        .collect();

    let mut labels = vec![FALLBACK_THEME; matrix.rows()];
    for (group, model) in &models {
        let Some(kmeans) = model.kmeans() else {
            continue;
        };
        let rows = group_rows.get(group).map(Vec::as_slice).unwrap_or_default();
        for (&row, &cluster) in rows.iter().zip(kmeans.labels()) {
            labels[row] = ThemeLabel(cluster);
        }
    }

    let fallback = models.values().filter(|m| m.is_fallback()).count();
    info!(
        groups = models.len(),
        fallback,
        themes_per_group = params.n_clusters,
        "Assigned themes"
    );

    Ok(ThemeAssignment {
        labels,
        models,
        group_rows,
    })
}

fn fit_group(
    matrix: &DocumentTermMatrix,
    rows: &[usize],
    params: &KMeansParams,
) -> Result<GroupModel> {
    if rows.len() < params.n_clusters {
        debug!(
            rows = rows.len(),
            themes = params.n_clusters,
            "Group too small to cluster; using fallback theme"
        );
        return Ok(GroupModel::Fallback { rows: rows.len() });
    }

    let points: Vec<SparseRow<'_>> = rows.iter().map(|&r| matrix.row(r)).collect();
    let model = KMeansModel::fit(&points, matrix.cols(), params)?;
    Ok(GroupModel::Clustered(model))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::themes::tfidf::fit_transform;

    fn matrix(texts: &[&str]) -> DocumentTermMatrix {
        let docs: Vec<String> = texts.iter().map(|s| s.to_string()).collect();
        fit_transform(&docs, 100, 5).matrix
    }

    #[test]
    fn test_theme_label_display_and_parse() {
        assert_eq!(ThemeLabel(3).to_string(), "Theme_3");
        assert_eq!("Theme_12".parse::<ThemeLabel>().unwrap(), ThemeLabel(12));
        assert!("Topic_1".parse::<ThemeLabel>().is_err());
        assert!("Theme_x".parse::<ThemeLabel>().is_err());
    }

    #[test]
    fn test_partition_preserves_row_order() {
        let groups = partition_by_group(&["B", "A", "B", "A", "C"]);
        assert_eq!(groups["A"], vec![1, 3]);
        assert_eq!(groups["B"], vec![0, 2]);
        assert_eq!(groups["C"], vec![4]);
        assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["A", "B", "C"]);
    }

    #[test]
    fn test_misaligned_labels_rejected() {
        let m = matrix(&["app crash", "fee charge"]);
        let err = assign_themes(&m, &["A"], &KMeansParams::with_clusters(2)).unwrap_err();
        assert!(err.to_string().contains("do not line up"));
    }

    #[test]
    fn test_zero_themes_rejected() {
        let m = matrix(&["app crash"]);
        assert!(assign_themes(&m, &["A"], &KMeansParams::with_clusters(0)).is_err());
    }

    #[test]
    fn test_small_group_falls_back() {
        let m = matrix(&["app crash", "fee charge", "login otp"]);
        let result = assign_themes(&m, &["A", "A", "A"], &KMeansParams::with_clusters(5)).unwrap();
        assert_eq!(result.labels, vec![FALLBACK_THEME; 3]);
        assert!(result.models["A"].is_fallback());
        assert_eq!(result.fallback_groups().collect::<Vec<_>>(), vec!["A"]);
    }

    #[test]
    fn test_labels_land_on_their_rows() {
        let m = matrix(&[
            "login otp",
            "fee charge",
            "login otp",
            "fee charge",
            "slow app",
        ]);
        // A = rows 0, 2, 4; B = rows 1, 3 (too small for 3 themes)
        let groups = ["A", "B", "A", "B", "A"];
        let result = assign_themes(&m, &groups, &KMeansParams::with_clusters(3)).unwrap();

        assert_eq!(result.labels[1], FALLBACK_THEME);
        assert_eq!(result.labels[3], FALLBACK_THEME);
        assert!(result.models["B"].is_fallback());

        let a = result.models["A"].kmeans().unwrap();
        assert_eq!(result.labels[0], ThemeLabel(a.labels()[0]));
        assert_eq!(result.labels[2], ThemeLabel(a.labels()[1]));
        assert_eq!(result.labels[4], ThemeLabel(a.labels()[2]));
        assert_eq!(result.labels[0], result.labels[2]);
        assert_ne!(result.labels[0], result.labels[4]);
    }

    #[test]
    fn test_group_labels_do_not_depend_on_other_groups() {
        let texts = [
            "login otp", "login otp", "fee charge", "fee charge", "slow app", "slow app",
        ];
        let m = matrix(&texts);
        let params = KMeansParams::with_clusters(2);

        let alone = assign_themes(&m, &["A", "A", "A", "A", "Z", "Z"], &params).unwrap();
        let split = assign_themes(&m, &["A", "A", "A", "A", "Y", "Y"], &params).unwrap();
        assert_eq!(alone.labels[..4], split.labels[..4]);
    }
}
