//! # xlreport-core
//!
//! The in-memory grid that report templates are rendered into.
//!
//! - [`Workbook`] - ordered sheets plus the style table (`cellXfs` index → [`NumberFormat`])
//! - [`Worksheet`] - a dense, ordered sequence of [`Row`]s and the sheet's merged regions
//! - [`Row`] - row metadata and the cells of that row keyed by column
//! - [`CellData`] - a [`CellValue`] and the style index it is displayed with
//!
//! Row positions are indices into the sheet's row vector, so inserting or removing a row
//! shifts every row (and merged region) after it.
//!
//! ## Example
//!
//! ```rust
//! use xlreport_core::{CellValue, Workbook};
//!
//! let mut workbook = Workbook::new();
//! let sheet = workbook.worksheet_mut(0).unwrap();
//!
//! sheet.set_cell_value_at(0, 0, "{{range .Items}}").unwrap();
//! sheet.set_cell_value_at(0, 1, 42.0).unwrap();
//!
//! sheet.insert_row_copies(0, 2).unwrap();
//! assert_eq!(sheet.row_count(), 3);
//! assert_eq!(sheet.get_value_at(2, 1), CellValue::Number(42.0));
//! ```

pub mod cell;
pub mod error;
pub mod number_format;
pub mod package;
pub mod row;
pub mod workbook;
pub mod worksheet;

pub use cell::{CellAddress, CellData, CellRange, CellType, CellValue};
pub use error::{Error, Result};
pub use number_format::NumberFormat;
pub use package::{RawParts, SheetSource};
pub use row::Row;
pub use workbook::Workbook;
pub use worksheet::Worksheet;

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit)
pub const MAX_COLS: u16 = 16_384;

/// Maximum length of a sheet name
pub const MAX_SHEET_NAME_LEN: usize = 31;
