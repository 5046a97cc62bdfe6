//! # Foresight Indexer
//!
//! Project indexing for the symbol store.
//!
//! ## Pipeline
//!
//! ```text
//! Directory
//!     │
//!     ├──> File Scanner (.gitignore aware)
//!     │      └─> Source files
//!     │
//!     ├──> Tokenizing index build (content-hash incremental)
//!     │      └─> Symbol store postings
//!     │
//!     └──> Streaming watcher (notify + debounce)
//!            └─> Per-file updates + change log + health
//! ```

mod changes;
mod error;
mod indexer;
mod scanner;
mod stats;
mod watcher;

pub use changes::{ChangeLog, ChangeRecord, ChangeType};
pub use error::{IndexerError, Result};
pub use indexer::{FileUpdate, ProjectIndexer};
pub use scanner::{FileScanner, IGNORED_SCOPES};
pub use stats::IndexStats;
pub use watcher::{
    IndexUpdate, IndexerHealth, StreamingIndexer, StreamingIndexerConfig,
};
