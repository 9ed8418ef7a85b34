//! Parsed templates and their inputs and outputs

use serde_json::Value;

use crate::ast::Node;
use crate::error::ExprResult;
use crate::evaluator;
use crate::parser;

/// One piece of template input
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment<M> {
    /// Template source; actions must be complete within one fragment
    Text(String),
    /// Opaque item copied to the output wherever execution passes it
    Marker(M),
}

/// One piece of execution output
#[derive(Debug, Clone, PartialEq)]
pub enum Output<M> {
    Text(String),
    Marker(M),
}

/// What a field lookup on a map without that key yields
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingKey {
    /// Fail execution
    #[default]
    Error,
    /// Yield `null`, which prints as nothing
    Zero,
}

/// Execution settings
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    pub missing_key: MissingKey,
}

impl ExecOptions {
    pub fn with_missing_key(mut self, missing_key: MissingKey) -> Self {
        self.missing_key = missing_key;
        self
    }
}

/// A parsed template
///
/// # Example
///
/// ```rust
/// use serde_json::json;
/// use xlreport_expr::{ExecOptions, Fragment, Output, Template};
///
/// let template = Template::from_fragments(vec![
///     Fragment::Text("{{range .Items}}{{.}}".to_string()),
///     Fragment::Marker('|'),
///     Fragment::Text("{{end}}".to_string()),
/// ])
/// .unwrap();
///
/// let out = template
///     .execute(&json!({"Items": ["a", "b"]}), &ExecOptions::default())
///     .unwrap();
/// assert_eq!(
///     out,
///     vec![
///         Output::Text("a".into()),
///         Output::Marker('|'),
///         Output::Text("b".into()),
///         Output::Marker('|'),
///     ]
/// );
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Template<M = ()> {
    nodes: Vec<Node<M>>,
}

impl<M: Clone> Template<M> {
    /// Parse a sequence of source fragments and markers
    ///
    /// Errors carry the index of the fragment they were found in.
    pub fn from_fragments<I>(fragments: I) -> ExprResult<Self>
    where
        I: IntoIterator<Item = Fragment<M>>,
    {
        let nodes = parser::parse(fragments.into_iter().collect())?;
        Ok(Self { nodes })
    }

    /// Execute against a data tree
    ///
    /// Adjacent text is merged, so text and markers alternate in the output.
    pub fn execute(&self, data: &Value, options: &ExecOptions) -> ExprResult<Vec<Output<M>>> {
        evaluator::execute(&self.nodes, data, options)
    }
}

impl Template<()> {
    /// Parse a single template string
    pub fn parse(src: &str) -> ExprResult<Self> {
        Self::from_fragments(std::iter::once(Fragment::Text(src.to_string())))
    }

    /// Execute and concatenate the output text
    pub fn render(&self, data: &Value, options: &ExecOptions) -> ExprResult<String> {
        let mut text = String::new();
        for item in self.execute(data, options)? {
            if let Output::Text(t) = item {
                text.push_str(&t);
            }
        }
        Ok(text)
    }
}

/// Parse and execute a template string in one go
pub fn render_str(src: &str, data: &Value, options: &ExecOptions) -> ExprResult<String> {
    Template::parse(src)?.render(data, options)
}
