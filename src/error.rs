use thiserror::Error;

/// Why a single file produced no track. Never fatal to a scan.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("unrecognized audio format: {0}")]
    UnrecognizedFormat(String),

    #[error("no metadata tag found")]
    MissingTag,

    #[error("failed to read tags: {0}")]
    Tags(#[from] lofty::error::LoftyError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum CatalogError {
    /// A song row collided with an existing path during a bulk insert.
    /// The whole batch has been rolled back.
    #[error("integrity violation inserting song '{path}': {source}")]
    IntegrityViolation {
        path: String,
        source: rusqlite::Error,
    },

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    pub fn is_integrity_violation(&self) -> bool {
        matches!(self, CatalogError::IntegrityViolation { .. })
    }
}

pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
