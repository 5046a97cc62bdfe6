//! # Foresight Symbols
//!
//! Inverted symbol index for fast token lookup.
//!
//! ## Pipeline
//!
//! ```text
//! File content
//!     │
//!     ├──> Tokenizer (identifier splitting, lowercase mirror)
//!     │      └─> token occurrences
//!     │
//!     └──> Symbol Store
//!            ├─> token -> postings (path, line)
//!            ├─> path -> tokens
//!            └─> filename stem -> paths
//! ```
//!
//! Queries rank by posting density plus a filename-stem boost; regex
//! queries scan only a caller-supplied working set of paths.

mod error;
mod pattern;
mod store;
pub mod tokenize;

pub use error::{Result, SymbolError};
pub use pattern::{compile_patterns, scan_paths, PatternHit, PatternScanOutput};
pub use store::{
    FileMeta, Posting, QueryMode, SymbolMatch, SymbolStats, SymbolStore, TokenStat,
    INDEX_FORMAT_VERSION,
};
