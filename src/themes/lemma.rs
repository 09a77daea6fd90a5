// Rule-based English noun lemmatizer.
//
// Reviews are mostly short noun-heavy complaints ("transactions", "updates",
// "branches"), so folding plurals into their singular form is what unifies
// the vocabulary. There is no dictionary here: irregular plurals come from a
// fixed table, a handful of common words that merely end in "s" are left
// alone, and everything else goes through suffix rules.
//
// A rule result is only accepted when the rules leave it unchanged, which
// keeps the mapping idempotent even where the suffix rules misfire.

use super::traits::Lemmatizer;

/// Irregular plural -> singular forms.
const IRREGULAR: &[(&str, &str)] = &[
    ("analyses", "analysis"),
    ("children", "child"),
    ("crises", "crisis"),
    ("criteria", "criterion"),
    ("diagnoses", "diagnosis"),
    ("feet", "foot"),
    ("geese", "goose"),
    ("halves", "half"),
    ("knives", "knife"),
    ("leaves", "leaf"),
    ("lives", "life"),
    ("men", "man"),
    ("mice", "mouse"),
    ("phenomena", "phenomenon"),
    ("selves", "self"),
    ("shelves", "shelf"),
    ("teeth", "tooth"),
    ("thieves", "thief"),
    ("wives", "wife"),
    ("wolves", "wolf"),
    ("women", "woman"),
];

/// Words ending in "s" that are not plurals.
const INVARIANT: &[&str] = &[
    "always", "goes", "lens", "news", "perhaps", "series", "species", "whereas",
];

/// Tokens at or below this length are never rewritten ("bus", "gas", "sms").
const MIN_REWRITE_LEN: usize = 4;

/// The default lemmatizer used by the text normalizer.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuleLemmatizer;

impl Lemmatizer for RuleLemmatizer {
    fn lemmatize(&self, token: &str) -> String {
        let candidate = apply_rules(token);
        if candidate != token && apply_rules(&candidate) != candidate {
            return token.to_string();
        }
        candidate
    }
}

fn apply_rules(token: &str) -> String {
    if let Some((_, lemma)) = IRREGULAR.iter().find(|(plural, _)| *plural == token) {
        return (*lemma).to_string();
    }

    if token.len() < MIN_REWRITE_LEN
        || !token.ends_with('s')
        || token.bytes().any(|b| b.is_ascii_digit())
        || INVARIANT.contains(&token)
    {
        return token.to_string();
    }

    let len = token.len();

    if token.ends_with("ies") && len > 4 {
        return format!("{}y", &token[..len - 3]);
    }
    if token.ends_with("sses") || token.ends_with("shes") || token.ends_with("xes") {
        return token[..len - 2].to_string();
    }
    if token.ends_with("ches") {
        // "branches" -> "branch", but "headaches" -> "headache"
        let before = token.as_bytes().get(len.wrapping_sub(5)).copied();
        return match before {
            Some(b) if !is_vowel(b) => token[..len - 2].to_string(),
            _ => token[..len - 1].to_string(),
        };
    }
    if token.ends_with("ss") || token.ends_with("us") || token.ends_with("is") {
        return token.to_string();
    }

    token[..len - 1].to_string()
}

fn is_vowel(b: u8) -> bool {
    matches!(b, b'a' | b'e' | b'i' | b'o' | b'u')
}
