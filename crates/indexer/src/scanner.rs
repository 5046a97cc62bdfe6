use crate::error::Result;
use ignore::WalkBuilder;
use std::path::{Path, PathBuf};

/// Directory names never worth indexing, on top of .gitignore.
pub const IGNORED_SCOPES: &[&str] = &[
    "node_modules",
    "__pycache__",
    "target",
    "dist",
    "build",
    ".next",
    ".nuxt",
    "vendor",
    "venv",
    ".venv",
    ".idea",
    ".vscode",
    "coverage",
    ".cache",
];

const EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "py", "rs", "go", "java", "c", "h", "cpp", "hpp", "cc",
    "rb", "php", "swift", "kt", "scala", "cs", "sh", "sql", "json", "yaml", "yml", "toml", "md",
];

/// Scanner for finding indexable source files in a project
pub struct FileScanner {
    root: PathBuf,
}

impl FileScanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Scan directory for source files (.gitignore aware)
    pub fn scan(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        let mut builder = WalkBuilder::new(&self.root);
        builder
            .hidden(true)
            .git_ignore(true)
            .git_global(true)
            .git_exclude(true);
        builder.filter_entry(|entry| {
            let name = entry.file_name().to_string_lossy().to_lowercase();
            !IGNORED_SCOPES.iter().any(|scope| *scope == name)
        });

        for result in builder.build() {
            match result {
                Ok(entry) => {
                    if entry.file_type().is_some_and(|ft| ft.is_file())
                        && Self::is_indexable(entry.path())
                    {
                        files.push(entry.path().to_path_buf());
                    }
                }
                Err(e) => log::warn!("Failed to read entry: {}", e),
            }
        }

        log::info!("Found {} source files", files.len());
        Ok(files)
    }

    /// Check if file has an extension worth indexing
    pub fn is_indexable(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let lowered = ext.to_lowercase();
                EXTENSIONS.iter().any(|known| *known == lowered)
            })
            .unwrap_or(false)
    }

    /// Check whether a path sits under an always-ignored directory.
    pub fn is_ignored(root: &Path, path: &Path) -> bool {
        let Ok(relative) = path.strip_prefix(root) else {
            return true;
        };
        relative.components().any(|component| {
            if let std::path::Component::Normal(name) = component {
                let lowered = name.to_string_lossy().to_lowercase();
                lowered.starts_with('.') || IGNORED_SCOPES.iter().any(|scope| *scope == lowered)
            } else {
                false
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn scan_skips_vendor_and_hidden_dirs() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src")).unwrap();
        fs::create_dir_all(dir.path().join("node_modules/pkg")).unwrap();
        fs::create_dir_all(dir.path().join(".hidden")).unwrap();
        fs::write(dir.path().join("src/main.rs"), "fn main() {}").unwrap();
        fs::write(dir.path().join("node_modules/pkg/index.js"), "x").unwrap();
        fs::write(dir.path().join(".hidden/secret.py"), "x").unwrap();
        fs::write(dir.path().join("binary.bin"), "x").unwrap();

        let files = FileScanner::new(dir.path()).scan().unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| p.strip_prefix(dir.path()).unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["src/main.rs".to_string()]);
    }

    #[test]
    fn ignored_predicate_matches_scan_rules() {
        let root = Path::new("/proj");
        assert!(FileScanner::is_ignored(root, Path::new("/proj/target/debug/x.rs")));
        assert!(FileScanner::is_ignored(root, Path::new("/proj/.git/config")));
        assert!(!FileScanner::is_ignored(root, Path::new("/proj/src/lib.rs")));
        assert!(FileScanner::is_ignored(Path::new("/other"), Path::new("/proj/src/lib.rs")));
    }
}
