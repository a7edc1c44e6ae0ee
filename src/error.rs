#[derive(Debug, thiserror::Error)]
pub enum MnemoError {
    #[error("content must not be empty")]
    EmptyContent,

    #[error("validation error: {0}")]
    Validation(String),

    #[error("memory not found: {0}")]
    NotFound(String),

    #[error("tag already exists: {0}")]
    TagExists(String),

    #[error("embeddings service unavailable: {0}")]
    EmbedUnavailable(String),

    #[error("no embedding returned")]
    NoEmbedding,

    #[error("{0} - run 'mnemo reindex' first")]
    NotIndexed(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MnemoError {
    /// Failures a write path downgrades to a warning instead of aborting.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::EmbedUnavailable(_) | Self::NoEmbedding)
    }
}
