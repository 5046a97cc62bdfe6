//! Regex scan over the working set.
//!
//! The caller supplies the paths to scan (the recently-accessed working
//! set, bounded upstream); this module never walks the repository itself.

use crate::error::{Result, SymbolError};
use regex::Regex;
use std::path::Path;
use std::time::{Duration, Instant};

const MAX_MATCH_CHARS: usize = 100;
const MAX_CONTEXT_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq)]
pub struct PatternHit {
    pub path: String,
    pub line: u32,
    pub matched: String,
    pub context: String,
}

#[derive(Debug, Clone, Default)]
pub struct PatternScanOutput {
    pub hits: Vec<PatternHit>,
    pub scanned_paths: usize,
    pub truncated: bool,
}

/// Compile the request patterns, surfacing the first invalid one as a
/// typed `BadQuery`.
pub fn compile_patterns(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|raw| {
            Regex::new(raw).map_err(|e| SymbolError::BadQuery {
                label: raw.clone(),
                message: e.to_string(),
            })
        })
        .collect()
}

/// Scan `paths` (relative to `root`) against the compiled patterns.
///
/// Stops early once `limit` hits are collected or the time budget is
/// spent; in either case the returned prefix is correct and `truncated`
/// is set. Unreadable files are skipped and logged.
pub async fn scan_paths(
    root: &Path,
    paths: &[String],
    patterns: &[Regex],
    limit: usize,
    budget: Duration,
) -> PatternScanOutput {
    let started = Instant::now();
    let mut out = PatternScanOutput::default();

    for rel_path in paths {
        if out.hits.len() >= limit {
            out.truncated = true;
            break;
        }
        if started.elapsed() >= budget {
            out.truncated = true;
            break;
        }

        let full_path = root.join(rel_path);
        let content = match tokio::fs::read_to_string(&full_path).await {
            Ok(content) => content,
            Err(err) => {
                log::warn!("pattern scan skipping {}: {err}", full_path.display());
                continue;
            }
        };
        out.scanned_paths += 1;

        let lines: Vec<&str> = content.lines().collect();
        for regex in patterns {
            for found in regex.find_iter(&content) {
                if out.hits.len() >= limit {
                    out.truncated = true;
                    break;
                }
                let line_no = content[..found.start()].matches('\n').count() + 1;
                let context = lines
                    .get(line_no - 1)
                    .map(|l| truncate_chars(l.trim(), MAX_CONTEXT_CHARS))
                    .unwrap_or_default();
                out.hits.push(PatternHit {
                    path: rel_path.clone(),
                    line: line_no as u32,
                    matched: truncate_chars(found.as_str(), MAX_MATCH_CHARS),
                    context,
                });
            }
        }
    }

    out
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn invalid_regex_is_a_typed_bad_query() {
        let err = compile_patterns(&["fn (".to_string()]).unwrap_err();
        match err {
            SymbolError::BadQuery { label, .. } => assert_eq!(label, "fn ("),
            other => panic!("expected BadQuery, got {other}"),
        }
    }

    #[tokio::test]
    async fn scan_reports_line_numbers_and_context() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("lib.rs"),
            "mod auth;\nfn login_user() {}\nfn logout_user() {}\n",
        )
        .unwrap();

        let patterns = compile_patterns(&[r"fn \w+_user".to_string()]).unwrap();
        let out = scan_paths(
            dir.path(),
            &["lib.rs".to_string()],
            &patterns,
            50,
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(out.scanned_paths, 1);
        assert!(!out.truncated);
        assert_eq!(out.hits.len(), 2);
        assert_eq!(out.hits[0].line, 2);
        assert_eq!(out.hits[0].matched, "fn login_user");
        assert_eq!(out.hits[0].context, "fn login_user() {}");
    }

    #[tokio::test]
    async fn scan_stops_at_limit_with_truncated_flag() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("many.rs"), "hit\nhit\nhit\nhit\n").unwrap();

        let patterns = compile_patterns(&["hit".to_string()]).unwrap();
        let out = scan_paths(
            dir.path(),
            &["many.rs".to_string()],
            &patterns,
            2,
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(out.hits.len(), 2);
        assert!(out.truncated);
    }

    #[tokio::test]
    async fn missing_files_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("real.rs"), "needle\n").unwrap();

        let patterns = compile_patterns(&["needle".to_string()]).unwrap();
        let out = scan_paths(
            dir.path(),
            &["ghost.rs".to_string(), "real.rs".to_string()],
            &patterns,
            50,
            Duration::from_secs(5),
        )
        .await;

        assert_eq!(out.scanned_paths, 1);
        assert_eq!(out.hits.len(), 1);
    }
}
