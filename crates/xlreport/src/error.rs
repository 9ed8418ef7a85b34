//! Render error types

use std::fmt;

use thiserror::Error;
use xlreport_core::CellAddress;
use xlreport_expr::ExprError;
use xlreport_xlsx::XlsxError;

/// Result type for rendering
pub type RenderResult<T> = std::result::Result<T, RenderError>;

/// A template cell, for error messages and render reports
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub sheet: usize,
    pub sheet_name: String,
    pub row: u32,
    pub col: u16,
}

impl Location {
    pub fn address(&self) -> CellAddress {
        CellAddress::new(self.row, self.col)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}'!{}", self.sheet_name, self.address())
    }
}

/// Errors that abort a render
///
/// All of them are deterministic for a given template and data tree.
#[derive(Debug, Error)]
pub enum RenderError {
    /// The template workbook has no sheets
    #[error("template has no sheets")]
    EmptyDocument,

    /// Range blocks that cannot be matched up
    #[error("malformed template (sheet {sheet}, row {}): {reason}", .row + 1)]
    MalformedTemplate {
        sheet: usize,
        row: u32,
        reason: String,
    },

    /// A placeholder failed to parse or execute
    #[error("placeholder at {location}: {source}")]
    Evaluation {
        location: Location,
        #[source]
        source: ExprError,
    },

    /// Grid edit failed
    #[error("Grid error: {0}")]
    Grid(#[from] xlreport_core::Error),

    /// Reading or writing the workbook file failed
    #[error("XLSX error: {0}")]
    Xlsx(#[from] XlsxError),
}

impl RenderError {
    pub(crate) fn malformed<S: Into<String>>(sheet: usize, row: u32, reason: S) -> Self {
        RenderError::MalformedTemplate {
            sheet,
            row,
            reason: reason.into(),
        }
    }
}
