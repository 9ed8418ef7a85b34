//! Expression error types

use thiserror::Error;

/// Result type for expression operations
pub type ExprResult<T> = std::result::Result<T, ExprError>;

/// Errors that can occur while parsing or executing a template
#[derive(Debug, Error)]
pub enum ExprError {
    /// Template parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Unknown function name in an action
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    Argument(String),

    /// Field lookup on a map without that key
    #[error("map has no entry for key \"{0}\"")]
    MissingKey(String),

    /// Execution error
    #[error("Evaluation error: {0}")]
    Evaluation(String),

    /// An error raised by the action in a given input fragment
    #[error("{error} (fragment {fragment})")]
    InFragment {
        fragment: usize,
        error: Box<ExprError>,
    },
}

impl ExprError {
    /// Attach the fragment the failing action came from (innermost wins)
    pub(crate) fn at(self, fragment: usize) -> Self {
        match self {
            located @ ExprError::InFragment { .. } => located,
            error => ExprError::InFragment {
                fragment,
                error: Box::new(error),
            },
        }
    }

    /// Index of the fragment the error was raised in, if known
    pub fn fragment(&self) -> Option<usize> {
        match self {
            ExprError::InFragment { fragment, .. } => Some(*fragment),
            _ => None,
        }
    }

    /// The error without its location
    pub fn kind(&self) -> &ExprError {
        match self {
            ExprError::InFragment { error, .. } => error,
            other => other,
        }
    }
}
