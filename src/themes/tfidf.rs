// TF-IDF document-term matrix and per-review keywords.
//
// The vocabulary is fit once over every cleaned review in the run, so all
// banks share the same columns and the same IDF scale. Weighting follows the
// usual smoothed scheme:
//
//   idf(t)    = ln((1 + n) / (1 + df(t))) + 1
//   w(d, t)   = count(d, t) * idf(t), then each row is L2-normalized
//
// The vocabulary is capped at `max_features` terms by total corpus count
// (ties alphabetical). Surviving terms are ordered alphabetically and that
// order is the column order. Tokens shorter than two characters never
// enter the vocabulary.

use std::collections::{BTreeMap, HashMap, HashSet};

use sprs::{CsMat, CsVecView, TriMat};
use tracing::{debug, info};

pub const DEFAULT_MAX_FEATURES: usize = 5000;
pub const DEFAULT_TOP_KEYWORDS: usize = 5;

/// Separator used when joining a row's keywords into one string.
pub const KEYWORD_SEPARATOR: &str = ", ";

const MIN_TOKEN_CHARS: usize = 2;

/// The fitted, immutable vocabulary and IDF weights.
#[derive(Debug, Clone)]
pub struct FittedVocabulary {
    terms: Vec<String>,
    index: HashMap<String, usize>,
    idf: Vec<f64>,
    document_count: usize,
}

/// Result of fitting and transforming a corpus in one step.
#[derive(Debug, Clone)]
pub struct TfIdfOutput {
    pub vocabulary: FittedVocabulary,
    pub matrix: DocumentTermMatrix,
    /// One comma-joined keyword summary per document, in document order.
    pub keywords: Vec<String>,
}

/// Sparse document-term matrix, one row per document.
#[derive(Debug, Clone)]
pub struct DocumentTermMatrix {
    inner: CsMat<f64>,
}

/// A borrowed view of one matrix row.
#[derive(Debug, Clone)]
pub struct SparseRow<'a> {
    view: Option<CsVecView<'a, f64>>,
}

/// Fit the vocabulary over `documents`, build the matrix and keyword summaries.
///
/// An empty corpus yields a 0x0 matrix and no keywords. A corpus with no
/// usable tokens yields an n x 0 matrix and n empty keyword summaries.
pub fn fit_transform(documents: &[String], max_features: usize, top_n: usize) -> TfIdfOutput {
    let vocabulary = FittedVocabulary::fit(documents, max_features);
    let matrix = vocabulary.transform(documents);
    let keywords = vocabulary.keyword_summaries(&matrix, top_n);

    info!(
        documents = documents.len(),
        vocabulary = vocabulary.len(),
        nonzero = matrix.nnz(),
        "Fitted TF-IDF vocabulary"
    );

    TfIdfOutput {
        vocabulary,
        matrix,
        keywords,
    }
}

fn tokens(document: &str) -> impl Iterator<Item = &str> {
    document
        .split_whitespace()
        .filter(|t| t.chars().count() >= MIN_TOKEN_CHARS)
}

impl FittedVocabulary {
    /// Fit a vocabulary of at most `max_features` terms.
    pub fn fit(documents: &[String], max_features: usize) -> Self {
        // term -> (total count, document frequency)
        let mut stats: HashMap<&str, (usize, usize)> = HashMap::new();
        for doc in documents {
            let mut seen: HashSet<&str> = HashSet::new();
            for token in tokens(doc) {
                let entry = stats.entry(token).or_insert((0, 0));
                entry.0 += 1;
                if seen.insert(token) {
                    entry.1 += 1;
                }
            }
        }

        let mut ranked: Vec<(&str, usize, usize)> = stats
            .into_iter()
            .map(|(term, (count, df))| (term, count, df))
            .collect();
        let candidates = ranked.len();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        ranked.truncate(max_features);
        ranked.sort_by(|a, b| a.0.cmp(b.0));

        if candidates > ranked.len() {
            debug!(
                dropped = candidates - ranked.len(),
                max_features, "Vocabulary capped"
            );
        }

        let n = documents.len() as f64;
        let terms: Vec<String> = ranked.iter().map(|(t, _, _)| t.to_string()).collect();
        let idf: Vec<f64> = ranked
            .iter()
            .map(|(_, _, df)| ((1.0 + n) / (1.0 + *df as f64)).ln() + 1.0)
            .collect();
        let index = terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.clone(), i))
            .collect();

        Self {
            terms,
            index,
            idf,
            document_count: documents.len(),
        }
    }

    /// Map documents into this vocabulary's column space.
    ///
    /// Tokens outside the vocabulary are ignored.
    pub fn transform(&self, documents: &[String]) -> DocumentTermMatrix {
        let mut triplets: TriMat<f64> = TriMat::new((documents.len(), self.terms.len()));

        for (row, doc) in documents.iter().enumerate() {
            let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
            for token in tokens(doc) {
                if let Some(&col) = self.index.get(token) {
                    *counts.entry(col).or_insert(0.0) += 1.0;
                }
            }

            let weights: Vec<(usize, f64)> = counts
                .into_iter()
                .map(|(col, count)| (col, count * self.idf[col]))
                .collect();
            let norm = weights.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
            if norm == 0.0 {
                continue;
            }
            for (col, w) in weights {
                triplets.add_triplet(row, col, w / norm);
            }
        }

        DocumentTermMatrix {
            inner: triplets.to_csr(),
        }
    }

    /// The top `top_n` terms of every row, comma-joined.
    pub fn keyword_summaries(&self, matrix: &DocumentTermMatrix, top_n: usize) -> Vec<String> {
        (0..matrix.rows())
            .map(|i| self.top_terms(matrix.row(i).iter(), top_n).join(KEYWORD_SEPARATOR))
            .collect()
    }

    /// The `top_n` highest-weighted terms among `weights`, heaviest first.
    ///
    /// Zero weights are never returned. Equal weights resolve to the lower
    /// column index, so results are stable across runs.
    pub fn top_terms<I>(&self, weights: I, top_n: usize) -> Vec<String>
    where
        I: IntoIterator<Item = (usize, f64)>,
    {
        top_columns(weights, top_n)
            .into_iter()
            .filter_map(|col| self.terms.get(col).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Terms in column order.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn column_of(&self, term: &str) -> Option<usize> {
        self.index.get(term).copied()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.index.contains_key(term)
    }

    pub fn idf(&self) -> &[f64] {
        &self.idf
    }

    /// Number of documents the vocabulary was fit on.
    pub fn document_count(&self) -> usize {
        self.document_count
    }
}

/// Column indices of the `top_n` largest positive weights, heaviest first.
pub(crate) fn top_columns<I>(weights: I, top_n: usize) -> Vec<usize>
where
    I: IntoIterator<Item = (usize, f64)>,
{
    let mut positive: Vec<(usize, f64)> = weights.into_iter().filter(|(_, w)| *w > 0.0).collect();
    positive.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    positive.truncate(top_n);
    positive.into_iter().map(|(col, _)| col).collect()
}

impl DocumentTermMatrix {
    pub fn rows(&self) -> usize {
        self.inner.rows()
    }

    pub fn cols(&self) -> usize {
        self.inner.cols()
    }

    /// Number of stored (nonzero) entries.
    pub fn nnz(&self) -> usize {
        self.inner.nnz()
    }

    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }

    /// Row `i`. Out-of-range rows read as all-zero.
    pub fn row(&self, i: usize) -> SparseRow<'_> {
        SparseRow {
            view: self.inner.outer_view(i),
        }
    }

    /// Dense weight lookup, mostly useful in tests.
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.row(row)
            .iter()
            .find(|(c, _)| *c == col)
            .map(|(_, w)| w)
            .unwrap_or(0.0)
    }

    pub fn as_csmat(&self) -> &CsMat<f64> {
        &self.inner
    }
}

impl<'a> SparseRow<'a> {
    /// (column, weight) pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.view
            .iter()
            .flat_map(|v| v.iter().map(|(col, &w)| (col, w)))
    }

    pub fn nnz(&self) -> usize {
        self.view.as_ref().map_or(0, |v| v.nnz())
    }

    pub fn is_empty(&self) -> bool {
        self.nnz() == 0
    }

    pub fn squared_norm(&self) -> f64 {
        self.iter().map(|(_, w)| w * w).sum()
    }

    /// Add this row into a dense accumulator.
    pub fn add_to(&self, dense: &mut [f64]) {
        for (col, w) in self.iter() {
            if let Some(slot) = dense.get_mut(col) {
                *slot += w;
            }
        }
    }
}
