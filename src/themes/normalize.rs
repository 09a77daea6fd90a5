// Review text normalization.
//
// Turns a raw review into a whitespace-joined string of lemmas: lowercase,
// strip everything except ASCII letters, digits and whitespace, drop English
// stop words, lemmatize what is left. The output is what the TF-IDF
// vectorizer sees and what ends up in the `cleaned_text` column.
//
// normalize() never fails. Absent text becomes the empty string.

use std::collections::HashSet;

use anyhow::{Context, Result};
use regex_lite::Regex;
use stop_words::{get, LANGUAGE};

use super::lemma::RuleLemmatizer;
use super::traits::Lemmatizer;

pub struct TextNormalizer {
    stop_words: HashSet<String>,
    lemmatizer: Box<dyn Lemmatizer>,
    non_alphanumeric: Regex,
}

impl TextNormalizer {
    /// NLTK's English stop words (via the `stop-words` crate) and the
    /// rule-based lemmatizer.
    pub fn english() -> Result<Self> {
        let stop_words: Vec<String> = get(LANGUAGE::English);
        Self::new(stop_words, Box::new(RuleLemmatizer))
    }

    /// Build a normalizer from an explicit stop word list and lemmatizer.
    ///
    /// Entries are matched in their lowercase form only. A list entry such as
    /// "don't" never matches the cleaned token "dont", which is kept.
    pub fn new<I>(stop_words: I, lemmatizer: Box<dyn Lemmatizer>) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let non_alphanumeric =
            Regex::new(r"[^a-z0-9\s]").context("Failed to compile text cleaning pattern")?;

        Ok(Self {
            stop_words: stop_words.into_iter().map(|w| w.to_lowercase()).collect(),
            lemmatizer,
            non_alphanumeric,
        })
    }

    /// Normalize a single review text. `None` maps to the empty string.
    pub fn normalize(&self, raw_text: Option<&str>) -> String {
        let Some(text) = raw_text else {
            return String::new();
        };

        let lower = text.to_lowercase();
        let cleaned = self.non_alphanumeric.replace_all(&lower, "");

        let lemmas: Vec<String> = cleaned
            .split_whitespace()
            .filter(|token| !self.is_stop_word(token))
            .map(|token| self.lemmatizer.lemmatize(token))
            // A lemma can itself be a stop word ("wills" -> "will"); dropping it
            // here keeps normalize(normalize(s)) == normalize(s).
            .filter(|lemma| !lemma.is_empty() && !self.is_stop_word(lemma))
            .collect();

        lemmas.join(" ")
    }

    /// Normalize every text in order.
    pub fn normalize_all<'a, I>(&self, texts: I) -> Vec<String>
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        texts.into_iter().map(|t| self.normalize(t)).collect()
    }

    pub fn is_stop_word(&self, token: &str) -> bool {
        self.stop_words.contains(token)
    }
}
