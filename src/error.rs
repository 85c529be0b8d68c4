use thiserror::Error;

/// Failures surfaced by the diff and insertion pipelines.
///
/// Every fault is converted to one of these variants where it occurs; nothing
/// crossing the library boundary panics.
#[derive(Debug, Error)]
pub enum Error {
    /// Column/row count disagreement between two frames, or between rows and a schema.
    #[error("{0}")]
    Shape(String),
    /// A row element could not be converted to its declared column type.
    #[error("Insertion validation error: {0}")]
    Cast(String),
    /// A creation statement did not have the expected structure.
    #[error("Schema parse failed: {0}")]
    Parse(String),
    /// The underlying database call failed.
    #[error("Backend error: {0}")]
    Backend(String),
    #[error("Duplicate key {key:?} in {side} snapshot; keys must be unique among matched rows")]
    DuplicateKey { side: &'static str, key: Vec<String> },
    #[error("Column '{0}' not found")]
    UnknownColumn(String),
    /// Invalid table definition.
    #[error("Invalid table definition: {0}")]
    Definition(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Backend(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
