use thiserror::Error;

pub type Result<T> = std::result::Result<T, SymbolError>;

#[derive(Error, Debug)]
pub enum SymbolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Invalid pattern '{label}': {message}")]
    BadQuery { label: String, message: String },

    #[error("Index file corrupt: {0}")]
    Corrupt(String),
}
