//! Identifier tokenization shared by content indexing and filename stems.
//!
//! The rules are deliberately dumb and stable: split on anything that is not
//! a letter, digit, or underscore (`-` and `.` split, `_` does not), emit the
//! raw token plus its lowercase form, and drop tokens shorter than two
//! characters or made of digits only.

/// A token occurrence inside file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenAt {
    pub text: String,
    pub line: u32,
}

fn is_token_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn keep(token: &str) -> bool {
    token.len() >= 2 && !token.bytes().all(|b| b.is_ascii_digit())
}

/// Tokenize file content, recording the 1-based line of each occurrence.
///
/// Case-preserved tokens are additionally emitted in lowercase so queries
/// match either form.
pub fn tokenize(content: &str) -> Vec<TokenAt> {
    let mut out = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line_no = (idx + 1) as u32;
        for raw in line.split(|c| !is_token_char(c)) {
            if !keep(raw) {
                continue;
            }
            out.push(TokenAt {
                text: raw.to_string(),
                line: line_no,
            });
            let lower = raw.to_lowercase();
            if lower != raw {
                out.push(TokenAt {
                    text: lower,
                    line: line_no,
                });
            }
        }
    }
    out
}

/// Tokenize a single term the way content is tokenized, without positions.
/// Used to normalize incoming query strings.
pub fn tokenize_term(term: &str) -> Vec<String> {
    term.split(|c: char| !is_token_char(c))
        .filter(|t| keep(t))
        .map(str::to_lowercase)
        .collect()
}

/// The filename stem: basename without its final extension.
pub fn stem(path: &str) -> String {
    let base = path.rsplit(['/', '\\']).next().unwrap_or(path);
    match base.rsplit_once('.') {
        Some((name, _ext)) if !name.is_empty() => name.to_lowercase(),
        _ => base.to_lowercase(),
    }
}

/// Stem tokens of a path, produced with the same splitter as content.
pub fn stem_tokens(path: &str) -> Vec<String> {
    tokenize_term(&stem(path))
}

/// Map an extension to a coarse language label for file metadata.
pub fn language_for(path: &str) -> &'static str {
    let ext = path.rsplit('.').next().unwrap_or("").to_lowercase();
    match ext.as_str() {
        "ts" | "tsx" => "typescript",
        "js" | "jsx" | "mjs" => "javascript",
        "py" => "python",
        "rs" => "rust",
        "go" => "go",
        "java" => "java",
        "c" | "h" => "c",
        "cpp" | "hpp" | "cc" => "cpp",
        "rb" => "ruby",
        "php" => "php",
        "swift" => "swift",
        "kt" => "kotlin",
        "scala" => "scala",
        "cs" => "csharp",
        "sh" => "shell",
        "sql" => "sql",
        "json" => "json",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "md" => "markdown",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn texts(content: &str) -> Vec<String> {
        tokenize(content).into_iter().map(|t| t.text).collect()
    }

    #[test]
    fn dash_and_dot_split_but_underscore_does_not() {
        assert_eq!(texts("tree-sitter"), vec!["tree", "sitter"]);
        assert_eq!(texts("app.post"), vec!["app", "post"]);
        assert_eq!(texts("tree_sitter"), vec!["tree_sitter"]);
    }

    #[test]
    fn case_preserved_tokens_also_index_lowercase() {
        assert_eq!(texts("HttpServer"), vec!["HttpServer", "httpserver"]);
        assert_eq!(texts("plain"), vec!["plain"]);
    }

    #[test]
    fn short_and_numeric_tokens_dropped() {
        assert_eq!(texts("a 1 42 x9 ok"), vec!["x9", "ok"]);
    }

    #[test]
    fn lines_are_one_based() {
        let tokens = tokenize("alpha\nbeta gamma");
        assert_eq!(tokens[0], TokenAt { text: "alpha".into(), line: 1 });
        assert_eq!(tokens[1], TokenAt { text: "beta".into(), line: 2 });
        assert_eq!(tokens[2], TokenAt { text: "gamma".into(), line: 2 });
    }

    #[test]
    fn stems_strip_directory_and_extension() {
        assert_eq!(stem("src/auth/login_handler.rs"), "login_handler");
        assert_eq!(stem("Makefile"), "makefile");
        assert_eq!(stem(".env"), ".env");
        assert_eq!(stem_tokens("src/tree-sitter.ts"), vec!["tree", "sitter"]);
    }

    #[test]
    fn language_mapping_covers_common_extensions() {
        assert_eq!(language_for("src/main.rs"), "rust");
        assert_eq!(language_for("app.tsx"), "typescript");
        assert_eq!(language_for("notes.txt"), "unknown");
    }
}
