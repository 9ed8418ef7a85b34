//! # xlreport-xlsx
//!
//! XLSX (Office Open XML) reader and writer for xlreport.
//!
//! The reader loads cell data, merged regions and the cell format table into a
//! [`xlreport_core::Workbook`] and keeps every other part of the package as raw
//! bytes. The writer regenerates worksheet cell data and merges and copies the
//! rest back, so themes, column widths, print setup and drawings of a template
//! survive rendering.

pub mod error;
pub mod reader;
pub mod writer;

mod package;
mod styles;

pub use error::{XlsxError, XlsxResult};
pub use reader::XlsxReader;
pub use writer::XlsxWriter;
