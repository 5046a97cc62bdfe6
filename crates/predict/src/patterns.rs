//! Intent tag inference.
//!
//! An ordered regex table maps the combined text of prompt and file paths
//! to domain tags; every matching row contributes. Tool identity and file
//! extensions add synthetic tags on top.

use foresight_protocol::ToolKind;
use once_cell::sync::Lazy;
use regex::RegexBuilder;

struct IntentPattern {
    regex: regex::Regex,
    tags: &'static [&'static str],
}

fn pattern(raw: &str, tags: &'static [&'static str]) -> IntentPattern {
    IntentPattern {
        regex: RegexBuilder::new(raw)
            .case_insensitive(true)
            .build()
            .expect("intent pattern regex"),
        tags,
    }
}

static INTENT_PATTERNS: Lazy<Vec<IntentPattern>> = Lazy::new(|| {
    vec![
        pattern(
            r"auth|login|session|oauth|jwt|token|credential",
            &["#authentication", "#security"],
        ),
        pattern(r"test[s]?[/_]|_test\.|\bspec[s]?\b", &["#testing"]),
        pattern(r"config|settings|\.env|environ", &["#configuration"]),
        pattern(r"api|endpoint|route|handler|middleware", &["#api"]),
        pattern(r"index|search|query|scorer|ranking", &["#search"]),
        pattern(r"database|\bdb\b|schema|migration", &["#database"]),
        pattern(r"log|logger|logging", &["#logging"]),
        pattern(r"redis|cache|memo", &["#caching"]),
        pattern(
            r"docker|compose|supervisor|deploy|ci|cd|pipeline",
            &["#devops"],
        ),
        pattern(r"payment|stripe|checkout|billing", &["#payments"]),
        pattern(
            r"ml|model|training|inference|embedding",
            &["#machine-learning"],
        ),
        pattern(r"ui|react|component|render", &["#ui"]),
        pattern(r"error|exception|catch|throw|raise|panic", &["#errors"]),
        pattern(r"async|await|promise|thread|concurrent", &["#async"]),
        pattern(r"hook|plugin|extension", &["#hooks"]),
        pattern(r"doc|readme|comment|docstring", &["#documentation"]),
        pattern(r"util|helper|common|shared", &["#utilities"]),
    ]
});

/// Run the pattern table over combined text; tags are union-deduplicated
/// in table order.
#[must_use]
pub fn infer_tags(text: &str) -> Vec<String> {
    let mut tags = Vec::new();
    for entry in INTENT_PATTERNS.iter() {
        if entry.regex.is_match(text) {
            for tag in entry.tags {
                if !tags.iter().any(|t: &String| t == tag) {
                    tags.push((*tag).to_string());
                }
            }
        }
    }
    tags
}

/// Language tags inferred from path extensions.
#[must_use]
pub fn language_tags(paths: &[String]) -> Vec<String> {
    let mut tags = Vec::new();
    for path in paths {
        let tag = match path.rsplit('.').next().unwrap_or("") {
            "py" => Some("#python"),
            "js" | "ts" | "tsx" | "jsx" => Some("#javascript"),
            "go" => Some("#go"),
            "rs" => Some("#rust"),
            "c" | "cpp" | "h" => Some("#cpp"),
            "java" => Some("#java"),
            "sh" => Some("#shell"),
            "sql" => Some("#sql"),
            "md" => Some("#markdown"),
            _ => None,
        };
        if let Some(tag) = tag {
            if !tags.iter().any(|t: &String| t == tag) {
                tags.push(tag.to_string());
            }
        }
    }
    tags
}

/// Full tag set for one hook event: synthetic tool tag, pattern matches
/// over prompt + paths, and language tags.
#[must_use]
pub fn tags_for_event(kind: ToolKind, paths: &[String], prompt: Option<&str>) -> Vec<String> {
    let mut tags = Vec::new();
    if let Some(tag) = kind.synthetic_tag() {
        tags.push(tag.to_string());
    }

    let mut combined = paths.join(" ");
    if let Some(prompt) = prompt {
        combined.push(' ');
        combined.push_str(prompt);
    }
    for tag in infer_tags(&combined) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    for tag in language_tags(paths) {
        if !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn auth_text_yields_security_tags() {
        let tags = infer_tags("fix the oauth login flow");
        assert_eq!(
            tags,
            vec!["#authentication".to_string(), "#security".to_string()]
        );
    }

    #[test]
    fn multiple_rows_union_without_duplicates() {
        let tags = infer_tags("add a search endpoint for the user index");
        assert!(tags.contains(&"#api".to_string()));
        assert!(tags.contains(&"#search".to_string()));
        let unique: std::collections::HashSet<&String> = tags.iter().collect();
        assert_eq!(unique.len(), tags.len());
    }

    #[test]
    fn test_paths_match_the_testing_row() {
        assert!(infer_tags("tests/test_routes.py").contains(&"#testing".to_string()));
        assert!(infer_tags("src/routes_test.rs").contains(&"#testing".to_string()));
    }

    #[test]
    fn event_tags_combine_tool_patterns_and_language() {
        let tags = tags_for_event(
            ToolKind::Edit,
            &["/src/auth/login.rs".to_string()],
            None,
        );
        assert_eq!(tags[0], "#editing");
        assert!(tags.contains(&"#authentication".to_string()));
        assert!(tags.contains(&"#rust".to_string()));
    }

    #[test]
    fn matching_is_case_insensitive() {
        assert!(infer_tags("Update the Dockerfile and CI pipeline").contains(&"#devops".to_string()));
    }
}
