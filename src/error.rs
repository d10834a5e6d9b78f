use std::path::PathBuf;

/// Errors raised while setting up or running a lamina job.
///
/// Every variant is fatal to the whole job: the binary converts them into a
/// diagnostic on stderr plus a group-wide abort (or a plain exit 1 when no
/// communication has started yet).
#[derive(thiserror::Error, Debug)]
pub enum LaminaError {
    /// Required command line argument missing or malformed.
    #[error("Usage: {0} <matrix_size>")]
    Usage(String),

    /// The job parameters cannot form a valid row-block decomposition.
    #[error("{0}")]
    Config(String),

    /// A matrix file could not be opened or read.
    #[error("Error: Cannot open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A matrix file was readable but not a valid CSV matrix.
    #[error("{path}: {reason}")]
    Format { path: PathBuf, reason: String },

    /// Buffer allocation failed, or a transfer exceeds the staging region.
    #[error("Memory allocation failed: {0}")]
    Resource(String),
}

pub type LaminaResult<T> = Result<T, LaminaError>;
