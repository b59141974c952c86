//! Error types for the session crate

use thiserror::Error;

/// Result type alias for session operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by a [`Session`](crate::Session)
#[derive(Debug, Error)]
pub enum Error {
    /// Cell store error (addresses, sheet names, empty reads)
    #[error(transparent)]
    Core(#[from] sheetsync_core::Error),

    /// A row/column change could not be applied; the session was left unchanged
    #[error("Cannot restructure sheet '{sheet}': {reason}")]
    Reindex { sheet: String, reason: String },

    /// The workbook file codec failed
    #[error("Codec error: {0}")]
    Codec(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Whether this is a read of a cell that was never set
    pub fn is_empty_cell(&self) -> bool {
        matches!(self, Error::Core(e) if e.is_empty_cell())
    }

    pub(crate) fn codec<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        Error::Codec(Box::new(err))
    }
}
