//! Content-addressed inverted index from identifier tokens to file
//! positions, with filename-stem boosting.
//!
//! Writers replace a whole path at a time under the write lock, so readers
//! observe either the pre-update or post-update state for any given file,
//! never a partial one.

use crate::error::{Result, SymbolError};
use crate::tokenize::{self, TokenAt};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::RwLock;

pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Exact filename-stem matches must always outrank body matches of equal
/// density; density is bounded by 1.0, so any positive multiple of the
/// boost tiers {3,2,1} keeps that ordering.
const NAME_BOOST_ALPHA: f64 = 1.0;

/// Upper bound on candidate paths considered per query before scoring.
const CANDIDATE_CAP: usize = 2_048;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMeta {
    pub path: String,
    pub mtime: u64,
    pub size: u64,
    pub language: String,
    pub content_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Posting {
    pub path: String,
    pub line: u32,
}

/// Per-token occurrence stats for one path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStat {
    pub count: u32,
    pub first_line: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymbolMatch {
    pub path: String,
    pub line: u32,
    pub score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    And,
    Or,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SymbolStats {
    pub files: usize,
    pub tokens: usize,
    pub postings: usize,
}

#[derive(Default, Serialize, Deserialize)]
struct Inner {
    format_version: u32,
    files: HashMap<String, FileMeta>,
    /// token -> every occurrence.
    postings: HashMap<String, Vec<Posting>>,
    /// token -> path -> occurrence stats; drives density scoring.
    stats: HashMap<String, HashMap<String, TokenStat>>,
    /// path -> tokens it contains; symmetric with `postings`.
    path_tokens: HashMap<String, HashSet<String>>,
    /// filename stem token -> paths.
    stems: HashMap<String, HashSet<String>>,
}

pub struct SymbolStore {
    inner: RwLock<Inner>,
}

impl Default for SymbolStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                format_version: INDEX_FORMAT_VERSION,
                ..Inner::default()
            }),
        }
    }

    /// Load a previously saved index file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        let inner: Inner = serde_json::from_slice(&bytes)
            .map_err(|e| SymbolError::Corrupt(e.to_string()))?;
        if inner.format_version != INDEX_FORMAT_VERSION {
            return Err(SymbolError::Corrupt(format!(
                "unsupported index format {}",
                inner.format_version
            )));
        }
        Ok(Self {
            inner: RwLock::new(inner),
        })
    }

    /// Persist the index as JSON, atomically (write temp, then rename).
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = {
            let inner = self.inner.read().expect("symbol index lock poisoned");
            serde_json::to_vec(&*inner)?
        };
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Index (or re-index) one file's content. Returns `false` when the
    /// content hash is unchanged and nothing was touched.
    pub fn index_content(&self, rel_path: &str, content: &str, mtime: u64, size: u64) -> bool {
        let content_hash = short_hash(content);

        // Tokenize outside the lock; only the swap is serialized.
        let tokens = tokenize::tokenize(content);
        let mut stats: HashMap<String, TokenStat> = HashMap::new();
        let mut postings: HashMap<String, Vec<Posting>> = HashMap::new();
        for TokenAt { text, line } in tokens {
            postings.entry(text.clone()).or_default().push(Posting {
                path: rel_path.to_string(),
                line,
            });
            let entry = stats.entry(text).or_insert(TokenStat {
                count: 0,
                first_line: line,
            });
            entry.count += 1;
        }
        let meta = FileMeta {
            path: rel_path.to_string(),
            mtime,
            size,
            language: tokenize::language_for(rel_path).to_string(),
            content_hash,
        };

        let mut inner = self.inner.write().expect("symbol index lock poisoned");
        if let Some(existing) = inner.files.get(rel_path) {
            if existing.content_hash == meta.content_hash {
                return false;
            }
            remove_path_locked(&mut inner, rel_path);
        }

        for (token, stat) in &stats {
            inner
                .stats
                .entry(token.clone())
                .or_default()
                .insert(rel_path.to_string(), *stat);
        }
        for (token, occurrences) in postings {
            inner.postings.entry(token).or_default().extend(occurrences);
        }
        inner
            .path_tokens
            .insert(rel_path.to_string(), stats.into_keys().collect());
        for stem_token in tokenize::stem_tokens(rel_path) {
            inner
                .stems
                .entry(stem_token)
                .or_default()
                .insert(rel_path.to_string());
        }
        inner.files.insert(rel_path.to_string(), meta);
        true
    }

    /// Drop a path and every posting that references it.
    pub fn remove_path(&self, rel_path: &str) -> bool {
        let mut inner = self.inner.write().expect("symbol index lock poisoned");
        if !inner.files.contains_key(rel_path) {
            return false;
        }
        remove_path_locked(&mut inner, rel_path);
        true
    }

    /// Single-term (or whitespace-separated OR) symbol lookup.
    #[must_use]
    pub fn symbol(&self, query: &str, limit: usize) -> Vec<SymbolMatch> {
        let tokens = tokenize::tokenize_term(query);
        self.query(&tokens, QueryMode::Or, limit)
    }

    /// Multi-token query; AND intersects, OR unions.
    #[must_use]
    pub fn multi(&self, terms: &[String], mode: QueryMode, limit: usize) -> Vec<SymbolMatch> {
        let tokens: Vec<String> = terms
            .iter()
            .flat_map(|t| tokenize::tokenize_term(t))
            .collect();
        self.query(&tokens, mode, limit)
    }

    fn query(&self, tokens: &[String], mode: QueryMode, limit: usize) -> Vec<SymbolMatch> {
        if tokens.is_empty() || limit == 0 {
            return Vec::new();
        }
        let inner = self.inner.read().expect("symbol index lock poisoned");

        // AND with any unknown token is empty by contract.
        if mode == QueryMode::And && tokens.iter().any(|t| !inner.stats.contains_key(t)) {
            return Vec::new();
        }

        // Walk tokens rarest-first so the candidate cap keeps the most
        // selective paths.
        let mut ordered: Vec<&String> = tokens.iter().collect();
        ordered.sort_by_key(|t| inner.stats.get(*t).map_or(0, |paths| paths.len()));

        let mut candidates: HashSet<&String> = HashSet::new();
        match mode {
            QueryMode::And => {
                let first = match inner.stats.get(ordered[0]) {
                    Some(paths) => paths,
                    None => return Vec::new(),
                };
                candidates = first.keys().collect();
                for token in &ordered[1..] {
                    let Some(paths) = inner.stats.get(*token) else {
                        return Vec::new();
                    };
                    candidates.retain(|p| paths.contains_key(*p));
                    if candidates.is_empty() {
                        return Vec::new();
                    }
                }
            }
            QueryMode::Or => {
                'outer: for token in &ordered {
                    if let Some(paths) = inner.stats.get(*token) {
                        for path in paths.keys() {
                            candidates.insert(path);
                            if candidates.len() >= CANDIDATE_CAP {
                                break 'outer;
                            }
                        }
                    }
                }
            }
        }

        let denom: u64 = tokens
            .iter()
            .map(|t| {
                inner
                    .stats
                    .get(t)
                    .map_or(0u64, |m| m.values().map(|s| u64::from(s.count)).sum())
            })
            .sum();

        let mut scored: Vec<SymbolMatch> = candidates
            .into_iter()
            .map(|path| {
                let mut numer = 0u64;
                let mut line = u32::MAX;
                for token in tokens {
                    if let Some(stat) = inner.stats.get(token).and_then(|m| m.get(path)) {
                        numer += u64::from(stat.count);
                        line = line.min(stat.first_line);
                    }
                }
                let density = if denom > 0 {
                    numer as f64 / denom as f64
                } else {
                    0.0
                };
                let boost = name_boost(path, tokens);
                SymbolMatch {
                    path: path.clone(),
                    line: if line == u32::MAX { 1 } else { line },
                    score: density + NAME_BOOST_ALPHA * boost,
                }
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.path.len().cmp(&b.path.len()))
                .then_with(|| a.path.cmp(&b.path))
        });
        scored.truncate(limit);
        scored
    }

    /// List indexed files, most recently modified first, optionally
    /// filtered by substring or `*` glob.
    #[must_use]
    pub fn list_files(&self, pattern: Option<&str>, limit: usize) -> Vec<FileMeta> {
        let inner = self.inner.read().expect("symbol index lock poisoned");
        let mut files: Vec<FileMeta> = match pattern {
            Some(pat) if pat.contains('*') => {
                let escaped = regex::escape(pat).replace("\\*", ".*");
                match regex::Regex::new(&escaped) {
                    Ok(re) => inner
                        .files
                        .values()
                        .filter(|f| re.is_match(&f.path))
                        .cloned()
                        .collect(),
                    Err(_) => Vec::new(),
                }
            }
            Some(pat) => inner
                .files
                .values()
                .filter(|f| f.path.contains(pat))
                .cloned()
                .collect(),
            None => inner.files.values().cloned().collect(),
        };
        files.sort_by(|a, b| b.mtime.cmp(&a.mtime).then_with(|| a.path.cmp(&b.path)));
        files.truncate(limit);
        files
    }

    #[must_use]
    pub fn file_meta(&self, rel_path: &str) -> Option<FileMeta> {
        let inner = self.inner.read().expect("symbol index lock poisoned");
        inner.files.get(rel_path).cloned()
    }

    #[must_use]
    pub fn contains_path(&self, rel_path: &str) -> bool {
        let inner = self.inner.read().expect("symbol index lock poisoned");
        inner.files.contains_key(rel_path)
    }

    #[must_use]
    pub fn tokens_for_path(&self, rel_path: &str) -> HashSet<String> {
        let inner = self.inner.read().expect("symbol index lock poisoned");
        inner.path_tokens.get(rel_path).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn paths_for_token(&self, token: &str) -> HashSet<String> {
        let inner = self.inner.read().expect("symbol index lock poisoned");
        inner
            .postings
            .get(token)
            .map(|postings| postings.iter().map(|p| p.path.clone()).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn stats(&self) -> SymbolStats {
        let inner = self.inner.read().expect("symbol index lock poisoned");
        SymbolStats {
            files: inner.files.len(),
            tokens: inner.postings.len(),
            postings: inner.postings.values().map(Vec::len).sum(),
        }
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("symbol index lock poisoned");
        *inner = Inner {
            format_version: INDEX_FORMAT_VERSION,
            ..Inner::default()
        };
    }
}

fn remove_path_locked(inner: &mut Inner, rel_path: &str) {
    if let Some(tokens) = inner.path_tokens.remove(rel_path) {
        for token in tokens {
            if let Some(postings) = inner.postings.get_mut(&token) {
                postings.retain(|p| p.path != rel_path);
                if postings.is_empty() {
                    inner.postings.remove(&token);
                }
            }
            if let Some(paths) = inner.stats.get_mut(&token) {
                paths.remove(rel_path);
                if paths.is_empty() {
                    inner.stats.remove(&token);
                }
            }
        }
    }
    for stem_token in tokenize::stem_tokens(rel_path) {
        if let Some(paths) = inner.stems.get_mut(&stem_token) {
            paths.remove(rel_path);
            if paths.is_empty() {
                inner.stems.remove(&stem_token);
            }
        }
    }
    inner.files.remove(rel_path);
}

/// Filename boost tiers: 3 exact stem token, 2 stem prefix, 1 stem
/// substring, 0 otherwise. The strongest tier across query tokens wins.
fn name_boost(path: &str, tokens: &[String]) -> f64 {
    let full_stem = tokenize::stem(path);
    let stem_tokens = tokenize::stem_tokens(path);
    let mut best = 0.0f64;
    for token in tokens {
        let tier = if stem_tokens.iter().any(|s| s == token) || full_stem == *token {
            3.0
        } else if full_stem.starts_with(token.as_str()) {
            2.0
        } else if full_stem.contains(token.as_str()) {
            1.0
        } else {
            0.0
        };
        best = best.max(tier);
    }
    best
}

fn short_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let digest = hasher.finalize();
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn store_with(files: &[(&str, &str)]) -> SymbolStore {
        let store = SymbolStore::new();
        for (idx, (path, content)) in files.iter().enumerate() {
            store.index_content(path, content, 1_000 + idx as u64, content.len() as u64);
        }
        store
    }

    #[test]
    fn tokenization_law_holds_both_ways() {
        let store = store_with(&[("src/auth.rs", "fn login_user() { token_cache }")]);
        for token in store.tokens_for_path("src/auth.rs") {
            assert!(
                store.paths_for_token(&token).contains("src/auth.rs"),
                "posting missing for {token}"
            );
        }
        for path in store.paths_for_token("login_user") {
            assert!(store.tokens_for_path(&path).contains("login_user"));
        }
    }

    #[test]
    fn removing_a_path_purges_every_posting() {
        let store = store_with(&[
            ("src/a.rs", "shared_token unique_a"),
            ("src/b.rs", "shared_token unique_b"),
        ]);
        assert!(store.remove_path("src/a.rs"));
        assert!(store.paths_for_token("unique_a").is_empty());
        assert_eq!(
            store.paths_for_token("shared_token"),
            HashSet::from(["src/b.rs".to_string()])
        );
        assert!(store.tokens_for_path("src/a.rs").is_empty());
    }

    #[test]
    fn reindex_with_same_content_is_a_noop() {
        let store = store_with(&[("src/a.rs", "alpha beta")]);
        assert!(!store.index_content("src/a.rs", "alpha beta", 2_000, 10));
        assert!(store.index_content("src/a.rs", "alpha gamma", 2_000, 11));
        assert!(store.paths_for_token("beta").is_empty());
        assert!(!store.paths_for_token("gamma").is_empty());
    }

    #[test]
    fn and_query_with_unknown_token_is_empty() {
        let store = store_with(&[("src/a.rs", "alpha beta")]);
        let hits = store.multi(
            &["alpha".to_string(), "missing".to_string()],
            QueryMode::And,
            10,
        );
        assert!(hits.is_empty());
    }

    #[test]
    fn and_query_requires_every_token() {
        let store = store_with(&[
            ("src/a.rs", "alpha beta"),
            ("src/b.rs", "alpha"),
        ]);
        let hits = store.multi(
            &["alpha".to_string(), "beta".to_string()],
            QueryMode::And,
            10,
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "src/a.rs");
    }

    #[test]
    fn exact_filename_stem_outranks_body_match() {
        let store = store_with(&[
            ("src/routes.rs", "handler handler handler"),
            ("src/handler.rs", "once"),
        ]);
        let hits = store.symbol("handler", 10);
        assert_eq!(hits[0].path, "src/handler.rs");
        assert!(hits[0].score > hits[1].score);
    }

    #[test]
    fn ties_break_on_shorter_then_lexicographic_path() {
        let store = store_with(&[
            ("src/deep/nested/thing.rs", "needle"),
            ("src/z.rs", "needle"),
            ("src/a.rs", "needle"),
        ]);
        let hits = store.symbol("needle", 10);
        assert_eq!(hits[0].path, "src/a.rs");
        assert_eq!(hits[1].path, "src/z.rs");
        assert_eq!(hits[2].path, "src/deep/nested/thing.rs");
    }

    #[test]
    fn case_preserved_query_matches_lowercase_index() {
        let store = store_with(&[("src/server.rs", "HttpServer::bind")]);
        let hits = store.symbol("httpserver", 10);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].path, "src/server.rs");
    }

    #[test]
    fn list_files_supports_glob_and_substring() {
        let store = store_with(&[
            ("src/auth.rs", "x1"),
            ("tests/auth_test.rs", "x2"),
            ("docs/readme.md", "x3"),
        ]);
        let globbed = store.list_files(Some("src/*.rs"), 10);
        assert_eq!(globbed.len(), 1);
        assert_eq!(globbed[0].path, "src/auth.rs");
        let sub = store.list_files(Some("auth"), 10);
        assert_eq!(sub.len(), 2);
    }

    #[tokio::test]
    async fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        let store = store_with(&[("src/a.rs", "alpha beta")]);
        store.save(&path).await.unwrap();

        let loaded = SymbolStore::load(&path).await.unwrap();
        assert_eq!(loaded.stats().files, 1);
        let hits = loaded.symbol("alpha", 5);
        assert_eq!(hits[0].path, "src/a.rs");
    }
}
