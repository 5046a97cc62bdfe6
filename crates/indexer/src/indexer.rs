use crate::error::{IndexerError, Result};
use crate::scanner::FileScanner;
use crate::stats::IndexStats;
use foresight_symbols::{tokenize, SymbolStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Outcome of an incremental single-file update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileUpdate {
    Added,
    Modified,
    Unchanged,
    Skipped,
}

/// Project indexer that scans files and maintains the symbol store
pub struct ProjectIndexer {
    root: PathBuf,
    index_path: PathBuf,
    store: Arc<SymbolStore>,
}

impl ProjectIndexer {
    /// Create an indexer for a project root, loading the on-disk index
    /// when one exists.
    pub async fn new(root: impl AsRef<Path>, index_path: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.exists() {
            return Err(IndexerError::InvalidPath(format!(
                "Path does not exist: {:?}",
                root
            )));
        }
        let index_path = index_path.as_ref().to_path_buf();

        let store = if index_path.exists() {
            match SymbolStore::load(&index_path).await {
                Ok(store) => store,
                Err(e) => {
                    log::warn!("Failed to load existing index: {}, starting fresh", e);
                    SymbolStore::new()
                }
            }
        } else {
            SymbolStore::new()
        };

        Ok(Self {
            root,
            index_path,
            store: Arc::new(store),
        })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    #[must_use]
    pub fn store(&self) -> Arc<SymbolStore> {
        Arc::clone(&self.store)
    }

    /// Full sweep of the project root. Content-hash checks make repeat
    /// sweeps cheap, so this doubles as the incremental catch-up pass.
    pub async fn index(&self) -> Result<IndexStats> {
        let start = Instant::now();
        let mut stats = IndexStats::new();

        log::info!("Indexing project at {:?}", self.root);

        let scanner = FileScanner::new(&self.root);
        let files = scanner.scan()?;

        for file_path in files {
            let Some(rel) = self.relative(&file_path) else {
                continue;
            };
            let content = match tokio::fs::read_to_string(&file_path).await {
                Ok(content) => content,
                Err(e) => {
                    log::warn!("Skipping unreadable file {:?}: {}", file_path, e);
                    stats.add_error(format!("{:?}: {}", file_path, e));
                    continue;
                }
            };
            let metadata = match tokio::fs::metadata(&file_path).await {
                Ok(metadata) => metadata,
                Err(e) => {
                    stats.add_error(format!("{:?}: {}", file_path, e));
                    continue;
                }
            };
            let mtime = metadata
                .modified()
                .ok()
                .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs())
                .unwrap_or(0);

            if self.store.index_content(&rel, &content, mtime, metadata.len()) {
                stats.add_file(tokenize::language_for(&rel), content.lines().count());
            } else {
                stats.unchanged += 1;
            }
        }

        self.save().await?;

        stats.time_ms = start.elapsed().as_millis() as u64;
        let index_stats = self.store.stats();
        log::info!(
            "Indexing completed: {} changed, {} unchanged, {} tokens, {}ms",
            stats.files,
            stats.unchanged,
            index_stats.tokens,
            stats.time_ms
        );
        Ok(stats)
    }

    /// Index one file; the delete-then-insert swap inside the store keeps
    /// readers consistent per path.
    pub async fn index_file(&self, path: &Path) -> Result<FileUpdate> {
        if !FileScanner::is_indexable(path) || FileScanner::is_ignored(&self.root, path) {
            return Ok(FileUpdate::Skipped);
        }
        let Some(rel) = self.relative(path) else {
            return Ok(FileUpdate::Skipped);
        };

        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) => {
                // Unreadable files are skipped, never fatal.
                log::warn!("Skipping unreadable file {:?}: {}", path, e);
                return Ok(FileUpdate::Skipped);
            }
        };
        let metadata = tokio::fs::metadata(path).await?;
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|m| m.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let existed = self.store.contains_path(&rel);
        let changed = self
            .store
            .index_content(&rel, &content, mtime, metadata.len());

        Ok(match (existed, changed) {
            (false, _) => FileUpdate::Added,
            (true, true) => FileUpdate::Modified,
            (true, false) => FileUpdate::Unchanged,
        })
    }

    /// Drop a deleted file from the index.
    pub fn remove_file(&self, path: &Path) -> bool {
        match self.relative(path) {
            Some(rel) => self.store.remove_path(&rel),
            None => false,
        }
    }

    pub async fn save(&self) -> Result<()> {
        self.store.save(&self.index_path).await?;
        Ok(())
    }

    fn relative(&self, path: &Path) -> Option<String> {
        path.strip_prefix(&self.root)
            .ok()
            .map(|p| p.to_string_lossy().to_string())
    }
}

pub(crate) fn epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
