//! Cell-related types
//!
//! - [`CellValue`] - The value stored in a cell
//! - [`CellType`] - The declared type of a cell (value plus number format)
//! - [`CellAddress`] / [`CellRange`] - Cell locations (e.g., "A1", "A1:C3")
//! - [`CellData`] - A value and the style index it is displayed with

mod address;
mod value;

pub use address::{CellAddress, CellRange};
pub use value::{CellType, CellValue};

/// Complete data for a single cell
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CellData {
    /// The cell's value
    pub value: CellValue,
    /// Index into the workbook's `cellXfs` table (0 = default style)
    pub style_index: u32,
}

impl CellData {
    /// Create a new cell with a value and default style
    pub fn new(value: CellValue) -> Self {
        Self {
            value,
            style_index: 0,
        }
    }

    /// Create a new cell with a value and style
    pub fn with_style(value: CellValue, style_index: u32) -> Self {
        Self { value, style_index }
    }

    /// Check if this cell carries neither a value nor a style
    pub fn is_empty(&self) -> bool {
        self.value.is_empty() && self.style_index == 0
    }

    /// The cell's text, if it holds a string
    pub fn text(&self) -> Option<&str> {
        self.value.as_string()
    }
}
