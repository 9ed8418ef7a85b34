//! Template syntax tree

use std::fmt;

use serde_json::Value;

/// Template node
///
/// Action nodes remember the index of the input fragment they were written in
/// so errors can be traced back to it.
#[derive(Debug, Clone, PartialEq)]
pub enum Node<M> {
    Text(String),
    /// Pass-through item from the input
    Marker(M),
    /// `{{pipeline}}`
    Action { fragment: usize, pipe: Pipeline },
    /// `{{if}} … {{else}} … {{end}}`; `else if` nests in `otherwise`
    If {
        fragment: usize,
        pipe: Pipeline,
        then: Vec<Node<M>>,
        otherwise: Vec<Node<M>>,
    },
    /// `{{range}} … {{else}} … {{end}}`
    Range {
        fragment: usize,
        pipe: Pipeline,
        body: Vec<Node<M>>,
        otherwise: Vec<Node<M>>,
    },
    /// `{{with}} … {{else}} … {{end}}`
    With {
        fragment: usize,
        pipe: Pipeline,
        body: Vec<Node<M>>,
        otherwise: Vec<Node<M>>,
    },
}

/// Commands joined by `|`, optionally declaring or assigning variables
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pipeline {
    /// Variable names, including `$`
    pub decl: Vec<String>,
    /// `=` rather than `:=`
    pub assign: bool,
    pub commands: Vec<Command>,
}

/// A function call or a single operand
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub args: Vec<Operand>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// `.`
    Dot,
    /// `.A.B`, relative to dot
    Field(Vec<String>),
    /// `$x.A.B`
    Variable { name: String, fields: Vec<String> },
    Literal(Value),
    Nil,
    /// Function name
    Function(String),
    /// `(pipeline).A.B`
    Pipeline { pipe: Box<Pipeline>, fields: Vec<String> },
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Dot => write!(f, "."),
            Operand::Field(fields) => {
                for name in fields {
                    write!(f, ".{}", name)?;
                }
                Ok(())
            }
            Operand::Variable { name, fields } => {
                write!(f, "{}", name)?;
                for field in fields {
                    write!(f, ".{}", field)?;
                }
                Ok(())
            }
            Operand::Literal(Value::String(s)) => write!(f, "{:?}", s),
            Operand::Literal(v) => write!(f, "{}", v),
            Operand::Nil => write!(f, "nil"),
            Operand::Function(name) => write!(f, "{}", name),
            Operand::Pipeline { fields, .. } => {
                write!(f, "(…)")?;
                for field in fields {
                    write!(f, ".{}", field)?;
                }
                Ok(())
            }
        }
    }
}
