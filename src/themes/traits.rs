// Lemmatizer trait: swap-ready abstraction.
//
// The normalizer only needs a deterministic token -> base form mapping. The
// default is a small rule-based English noun lemmatizer, but a dictionary
// backed implementation can replace it without touching the pipeline.

/// Reduce a clean lowercase token to its dictionary base form.
///
/// Implementations must be deterministic and idempotent:
/// `lemmatize(lemmatize(t)) == lemmatize(t)`, and the output must only
/// contain lowercase ASCII letters and digits.
pub trait Lemmatizer: Send + Sync {
    fn lemmatize(&self, token: &str) -> String;
}
