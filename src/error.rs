use thiserror::Error;

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, ReaderError>;

#[derive(Debug, Error)]
/// Errors returned by the k-mer reader and its helpers.
pub enum ReaderError {
    /// I/O error from the underlying character source.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// Invalid construction parameters.
    #[error("Invalid configuration: {0}")]
    Config(String),
    /// Missing or malformed sequence header.
    #[error("Invalid sequence header: {0}")]
    Format(String),
    /// Destination or input slice too small for the requested run.
    #[error("Capacity error: need {needed} slots, have {available}")]
    Capacity { needed: usize, available: usize },
    /// Buffer handed back to a reader that did not lend it.
    #[error("Buffer does not belong to this reader")]
    ForeignBuffer,
    /// Borrowed buffers were not recycled and a fill cycle cannot proceed.
    #[error("Buffer pool exhausted: cycle needs {needed} free buffers, {free} available")]
    PoolExhausted { needed: usize, free: usize },
    /// Reader was closed.
    #[error("Reader is closed")]
    Closed,
    /// The read-ahead thread stopped without reporting.
    #[error("Read-ahead worker terminated unexpectedly")]
    ReadAheadLost,
}
