// Theme extraction: text normalization, TF-IDF features, per-bank k-means.

pub mod clusterer;
pub mod kmeans;
pub mod lemma;
pub mod normalize;
pub mod summary;
pub mod tfidf;
pub mod traits;
