//! Keyword extraction from prompts and the cache fingerprint derived
//! from a keyword set.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

const MAX_KEYWORDS: usize = 10;

static STOPWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "the", "and", "for", "that", "this", "with", "from", "have", "what", "how", "can",
        "you", "are", "please", "help", "want", "need", "make", "use", "get", "add", "fix",
        "update", "change", "create", "delete", "remove", "show", "find", "look", "see", "let",
        "know", "would", "could", "should", "will", "just", "like", "also", "more", "some",
        "any", "all", "new", "now", "about", "into",
    ]
    .into_iter()
    .collect()
});

static IDENTIFIER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[a-zA-Z_][a-zA-Z0-9_]*\b").expect("identifier regex"));

static FILE_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\w\-]+\.(?:py|rs|js|ts|tsx|go|java|c|cpp|h|md|json|yaml|yml|toml|sh|sql)")
        .expect("file pattern regex")
});

/// Extract likely file/symbol keywords from a prompt.
///
/// Lowercased identifiers minus stopwords, plus the stems of anything that
/// looks like a filename; order-preserving dedupe, capped.
#[must_use]
pub fn extract_keywords(prompt: &str) -> Vec<String> {
    let lowered = prompt.to_lowercase();
    let mut seen = HashSet::new();
    let mut keywords = Vec::new();

    for found in IDENTIFIER.find_iter(&lowered) {
        let word = found.as_str();
        if word.len() <= 2 || STOPWORDS.contains(word) {
            continue;
        }
        if seen.insert(word.to_string()) {
            keywords.push(word.to_string());
        }
    }

    for found in FILE_LIKE.find_iter(&lowered) {
        let name = found
            .as_str()
            .rsplit_once('.')
            .map(|(stem, _)| stem)
            .unwrap_or(found.as_str());
        if !name.is_empty() && seen.insert(name.to_string()) {
            keywords.push(name.to_string());
        }
    }

    keywords.truncate(MAX_KEYWORDS);
    keywords
}

/// Stable cache fingerprint: sorted keywords joined by `|`, hashed.
#[must_use]
pub fn fingerprint(keywords: &[String]) -> String {
    let mut sorted: Vec<&str> = keywords.iter().map(String::as_str).collect();
    sorted.sort_unstable();
    sorted.dedup();
    let canonical = sorted.join("|");

    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    let digest = hasher.finalize();
    digest[..12].iter().map(|b| format!("{b:02x}")).collect()
}
