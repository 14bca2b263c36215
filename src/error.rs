// File: src/error.rs

/// Errors from the fallible edges: loading configuration and catalogs,
/// compiling custom slot patterns and persisting the lexicon. Matching
/// itself never fails.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to read or write file: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Lexicon encoding error: {0}")]
    Encoding(#[from] bincode::Error),

    #[error("Could not replace lexicon file: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("Invalid pattern for entity '{entity}': {source}")]
    Pattern {
        entity: String,
        #[source]
        source: regex::Error,
    },

    #[error("Unknown action spec: {0}")]
    UnknownSpec(String),
}

pub type Result<T> = std::result::Result<T, Error>;
