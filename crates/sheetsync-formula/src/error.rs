//! Formula error types

use thiserror::Error;

/// Result type for formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Errors that can occur during formula parsing, evaluation or rewriting
#[derive(Debug, Error)]
pub enum FormulaError {
    /// Formula parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Formula evaluation error
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Reference to invalid cell
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// A rewritten reference would fall off the sheet
    #[error("Reference {reference} cannot move past the sheet edge")]
    ShiftOutOfBounds { reference: String },
}

impl FormulaError {
    /// The in-cell error value this failure is shown as
    pub fn as_cell_error(&self) -> sheetsync_core::CellError {
        use sheetsync_core::CellError;
        match self {
            FormulaError::Parse(_) => CellError::Parse,
            FormulaError::UnknownFunction(_) => CellError::Name,
            FormulaError::InvalidReference(_) | FormulaError::ShiftOutOfBounds { .. } => {
                CellError::Ref
            }
            FormulaError::Evaluation(_) | FormulaError::ArgumentCount { .. } => CellError::Value,
        }
    }
}
