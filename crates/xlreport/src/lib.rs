//! # xlreport
//!
//! Spreadsheet report templates.
//!
//! A template is an ordinary workbook whose cells carry `{{ ... }}`
//! placeholders. Rendering it against a JSON data tree:
//!
//! 1. fills every placeholder outside range blocks in place
//! 2. evaluates every `{{range ...}}` ... `{{end.}}` block and turns it into
//!    one row per generated line, shifting everything below
//! 3. merges the cells marked with `<<` ... `>>`
//!
//! Number formats and styles of the template cells survive: a value that
//! parses as a number is stored as a number under the cell's own format.
//!
//! ## Example
//!
//! ```rust,no_run
//! use serde_json::json;
//! use xlreport::{RenderOptions, StaticContext, Template};
//!
//! let statics = StaticContext::with_current_time().company_name("Elephant Soft");
//! let template = Template::open("invoice.xlsx", statics)?;
//!
//! let data = json!({
//!     "Number": "A-17",
//!     "Items": [
//!         {"Name": "Cement", "Weight": 1250000, "Price": 150050},
//!         {"Name": "Sand", "Weight": 300000, "Price": 4000}
//!     ]
//! });
//! let rendered = template.render(&data, &RenderOptions::default())?;
//! rendered.save("invoice-A-17.xlsx")?;
//! # Ok::<(), xlreport::RenderError>(())
//! ```

pub mod cell_writer;
pub mod context;
pub mod edit;
pub mod error;
pub mod merge;
pub mod reconciler;
pub mod scanner;
pub mod sheet;
pub mod template;

pub use cell_writer::{write_cell, WriteOutcome};
pub use context::StaticContext;
pub use edit::GridEdit;
pub use error::{Location, RenderError, RenderResult};
pub use merge::{build_merges, MergedRegion};
pub use reconciler::{BlockOutcome, OffsetMap};
pub use scanner::{scan, BlockPlan, ScanPlan, Tag, TagKind};
pub use sheet::{clone_sheet, rename_variable};
pub use template::{RenderOptions, RenderReport, Rendered, Template};

pub use xlreport_expr::MissingKey;
