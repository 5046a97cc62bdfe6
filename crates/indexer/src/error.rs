use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Symbol store error: {0}")]
    Symbols(#[from] foresight_symbols::SymbolError),

    #[error("Watcher error: {0}")]
    Notify(#[from] notify::Error),

    #[error("Invalid project path: {0}")]
    InvalidPath(String),

    #[error("{0}")]
    Other(String),
}
