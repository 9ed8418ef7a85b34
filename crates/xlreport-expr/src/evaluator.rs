//! Template executor
//!
//! Walks the node tree with a current value (dot), a variable stack and an
//! output buffer. Variables live until the end of the control structure that
//! declared them.

use serde_json::Value;

use crate::ast::{Command, Node, Operand, Pipeline};
use crate::error::{ExprError, ExprResult};
use crate::functions;
use crate::template::{ExecOptions, MissingKey, Output};
use crate::value::{as_integer, print_value, truth, type_name};

pub(crate) fn execute<M: Clone>(
    nodes: &[Node<M>],
    data: &Value,
    options: &ExecOptions,
) -> ExprResult<Vec<Output<M>>> {
    let mut state = State {
        root: data,
        options,
        vars: Vec::new(),
        out: Vec::new(),
    };
    state.walk(nodes, data)?;
    Ok(state.out)
}

struct State<'a, M> {
    root: &'a Value,
    options: &'a ExecOptions,
    vars: Vec<(String, Value)>,
    out: Vec<Output<M>>,
}

impl<'a, M: Clone> State<'a, M> {
    fn push_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.out.last_mut() {
            Some(Output::Text(t)) => t.push_str(text),
            _ => self.out.push(Output::Text(text.to_string())),
        }
    }

    fn walk(&mut self, nodes: &[Node<M>], dot: &Value) -> ExprResult<()> {
        for node in nodes {
            match node {
                Node::Text(s) => self.push_text(s),
                Node::Marker(m) => self.out.push(Output::Marker(m.clone())),
                Node::Action { fragment, pipe } => {
                    let value = self
                        .eval_pipeline(pipe, dot)
                        .map_err(|e| e.at(*fragment))?;
                    if pipe.decl.is_empty() {
                        self.push_text(&print_value(&value));
                    }
                }
                Node::If {
                    fragment,
                    pipe,
                    then,
                    otherwise,
                } => {
                    let mark = self.vars.len();
                    let value = self
                        .eval_pipeline(pipe, dot)
                        .map_err(|e| e.at(*fragment))?;
                    if truth(&value) {
                        self.walk(then, dot)?;
                    } else {
                        self.walk(otherwise, dot)?;
                    }
                    self.vars.truncate(mark);
                }
                Node::With {
                    fragment,
                    pipe,
                    body,
                    otherwise,
                } => {
                    let mark = self.vars.len();
                    let value = self
                        .eval_pipeline(pipe, dot)
                        .map_err(|e| e.at(*fragment))?;
                    if truth(&value) {
                        self.walk(body, &value)?;
                    } else {
                        self.walk(otherwise, dot)?;
                    }
                    self.vars.truncate(mark);
                }
                Node::Range {
                    fragment,
                    pipe,
                    body,
                    otherwise,
                } => self.walk_range(*fragment, pipe, body, otherwise, dot)?,
            }
        }
        Ok(())
    }

    fn walk_range(
        &mut self,
        fragment: usize,
        pipe: &Pipeline,
        body: &[Node<M>],
        otherwise: &[Node<M>],
        dot: &Value,
    ) -> ExprResult<()> {
        let value = self
            .eval_commands(&pipe.commands, dot)
            .map_err(|e| e.at(fragment))?;
        let mark = self.vars.len();

        let mut iterations = 0usize;
        match &value {
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.iteration(pipe, Value::from(i), item, body, mark)
                        .map_err(|e| e.at(fragment))?;
                    iterations += 1;
                }
            }
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for key in keys {
                    if let Some(item) = map.get(key) {
                        self.iteration(pipe, Value::String(key.clone()), item, body, mark)
                            .map_err(|e| e.at(fragment))?;
                        iterations += 1;
                    }
                }
            }
            Value::Number(_) => {
                let count = as_integer(&value).ok_or_else(|| {
                    ExprError::Evaluation(format!("range can't iterate over {}", value))
                        .at(fragment)
                })?;
                if pipe.decl.len() > 1 {
                    return Err(ExprError::Evaluation(
                        "can't use two variables when ranging over an integer".into(),
                    )
                    .at(fragment));
                }
                for i in 0..count.max(0) {
                    let item = Value::from(i);
                    self.iteration(pipe, item.clone(), &item, body, mark)
                        .map_err(|e| e.at(fragment))?;
                    iterations += 1;
                }
            }
            Value::Null => {}
            other => {
                return Err(ExprError::Evaluation(format!(
                    "range can't iterate over {}",
                    type_name(other)
                ))
                .at(fragment))
            }
        }

        if iterations == 0 {
            self.walk(otherwise, dot)?;
        }
        self.vars.truncate(mark);
        Ok(())
    }

    fn iteration(
        &mut self,
        pipe: &Pipeline,
        key: Value,
        item: &Value,
        body: &[Node<M>],
        mark: usize,
    ) -> ExprResult<()> {
        self.vars.truncate(mark);
        match pipe.decl.as_slice() {
            [] => {}
            [elem] => self.vars.push((elem.clone(), item.clone())),
            [index, elem, ..] => {
                self.vars.push((index.clone(), key));
                self.vars.push((elem.clone(), item.clone()));
            }
        }
        self.walk(body, item)
    }

    /// Evaluate a pipeline and bind its variables
    fn eval_pipeline(&mut self, pipe: &Pipeline, dot: &Value) -> ExprResult<Value> {
        let value = self.eval_commands(&pipe.commands, dot)?;
        for name in &pipe.decl {
            if pipe.assign {
                let slot = self
                    .vars
                    .iter_mut()
                    .rev()
                    .find(|(n, _)| n == name)
                    .ok_or_else(|| {
                        ExprError::Evaluation(format!("undefined variable: {}", name))
                    })?;
                slot.1 = value.clone();
            } else {
                self.vars.push((name.clone(), value.clone()));
            }
        }
        Ok(value)
    }

    fn eval_commands(&mut self, commands: &[Command], dot: &Value) -> ExprResult<Value> {
        let mut last: Option<Value> = None;
        for command in commands {
            last = Some(self.eval_command(command, dot, last.take())?);
        }
        Ok(last.unwrap_or(Value::Null))
    }

    fn eval_command(
        &mut self,
        command: &Command,
        dot: &Value,
        piped: Option<Value>,
    ) -> ExprResult<Value> {
        let (first, rest) = command
            .args
            .split_first()
            .ok_or_else(|| ExprError::Evaluation("empty command".into()))?;

        match first {
            Operand::Function(name) => {
                let mut args = Vec::with_capacity(rest.len() + 1);
                for arg in rest {
                    args.push(self.eval_operand(arg, dot)?);
                }
                args.extend(piped);
                functions::call(name, &args)
            }
            Operand::Nil => Err(ExprError::Evaluation("nil is not a command".into())),
            _ if !rest.is_empty() || piped.is_some() => Err(ExprError::Evaluation(format!(
                "can't give argument to non-function {}",
                first
            ))),
            _ => self.eval_operand(first, dot),
        }
    }

    fn eval_operand(&mut self, operand: &Operand, dot: &Value) -> ExprResult<Value> {
        match operand {
            Operand::Dot => Ok(dot.clone()),
            Operand::Field(fields) => self.fields(dot, fields),
            Operand::Variable { name, fields } => {
                if name == "$" {
                    return self.fields(self.root, fields);
                }
                let value = self
                    .vars
                    .iter()
                    .rev()
                    .find(|(n, _)| n == name)
                    .map(|(_, v)| v)
                    .ok_or_else(|| {
                        ExprError::Evaluation(format!("undefined variable: {}", name))
                    })?;
                self.fields(value, fields)
            }
            Operand::Literal(v) => Ok(v.clone()),
            Operand::Nil => Ok(Value::Null),
            Operand::Function(name) => functions::call(name, &[]),
            Operand::Pipeline { pipe, fields } => {
                let value = self.eval_commands(&pipe.commands, dot)?;
                self.fields(&value, fields)
            }
        }
    }

    /// Follow a field chain from `base`
    fn fields(&self, base: &Value, fields: &[String]) -> ExprResult<Value> {
        let mut current = base;
        for name in fields {
            current = match current {
                Value::Object(map) => match map.get(name) {
                    Some(v) => v,
                    None => {
                        return match self.options.missing_key {
                            MissingKey::Error => Err(ExprError::MissingKey(name.clone())),
                            MissingKey::Zero => Ok(Value::Null),
                        }
                    }
                },
                Value::Null => {
                    return match self.options.missing_key {
                        MissingKey::Error => Err(ExprError::Evaluation(format!(
                            "nil value evaluating field .{}",
                            name
                        ))),
                        MissingKey::Zero => Ok(Value::Null),
                    }
                }
                other => {
                    return Err(ExprError::Evaluation(format!(
                        "can't evaluate field {} in type {}",
                        name,
                        type_name(other)
                    )))
                }
            };
        }
        Ok(current.clone())
    }
}
