//! # xlreport-expr
//!
//! Placeholder language for xlreport templates.
//!
//! This crate provides:
//! - A `{{ ... }}` template language (fields, pipelines, `if`, `range`,
//!   `with`, variables)
//! - Builtin functions plus the report helpers (`fdate`, `nfmt`,
//!   `toMeters`, `toTonnes`, `toKMeters`, `toRubles`)
//! - Execution over fragment streams that carry opaque markers through
//!   the output
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use xlreport_expr::{render_str, ExecOptions};
//!
//! let data = json!({"Name": "Ivanov", "Sum": 150050});
//! let out = render_str("{{.Name}}: {{toRubles .Sum}}", &data, &ExecOptions::default()).unwrap();
//! assert_eq!(out, "Ivanov: 1500.50");
//! ```

pub mod ast;
pub mod error;
mod evaluator;
pub mod functions;
mod lexer;
mod parser;
pub mod template;
pub mod value;

pub use error::{ExprError, ExprResult};
pub use functions::{registry, FunctionDef, FunctionRegistry};
pub use template::{render_str, ExecOptions, Fragment, MissingKey, Output, Template};
pub use value::{print_value, truth};
