//! Template parser
//!
//! A recursive descent parser over the lexed pieces of all input fragments.
//! Control structures may span fragments; a single action may not.

use crate::ast::{Command, Node, Operand, Pipeline};
use crate::error::{ExprError, ExprResult};
use crate::functions;
use crate::lexer::{lex, Piece, Token};
use crate::template::Fragment;
use serde_json::Value;

/// Parse fragments into a node list
pub(crate) fn parse<M>(fragments: Vec<Fragment<M>>) -> ExprResult<Vec<Node<M>>> {
    let items = flatten(fragments)?;
    let mut parser = Parser {
        items: items.into_iter(),
    };

    let (nodes, stop) = parser.parse_list()?;
    match stop {
        Stop::Eof => Ok(nodes),
        Stop::End { fragment } => {
            Err(ExprError::Parse("unexpected {{end}}".into()).at(fragment))
        }
        Stop::Else { fragment, .. } => {
            Err(ExprError::Parse("unexpected {{else}}".into()).at(fragment))
        }
    }
}

enum Item<M> {
    Text(String),
    Marker(M),
    Action { fragment: usize, tokens: Vec<Token> },
}

enum Raw<M> {
    Piece(usize, Piece),
    Marker(M),
}

/// Lex every fragment and apply trim markers
fn flatten<M>(fragments: Vec<Fragment<M>>) -> ExprResult<Vec<Item<M>>> {
    let mut raw: Vec<Raw<M>> = Vec::new();
    for (index, fragment) in fragments.into_iter().enumerate() {
        match fragment {
            Fragment::Text(src) => {
                for piece in lex(&src).map_err(|e| e.at(index))? {
                    raw.push(Raw::Piece(index, piece));
                }
            }
            Fragment::Marker(m) => raw.push(Raw::Marker(m)),
        }
    }

    // `{{-` and `-}}` trim the adjacent text; markers stop the trim
    for i in 0..raw.len() {
        let (trim_left, trim_right) = match &raw[i] {
            Raw::Piece(_, Piece::Action { trim_left, trim_right, .. })
            | Raw::Piece(_, Piece::Comment { trim_left, trim_right }) => (*trim_left, *trim_right),
            _ => continue,
        };
        if trim_left && i > 0 {
            if let Raw::Piece(_, Piece::Text(text)) = &mut raw[i - 1] {
                let len = text.trim_end().len();
                text.truncate(len);
            }
        }
        if trim_right {
            if let Some(Raw::Piece(_, Piece::Text(text))) = raw.get_mut(i + 1) {
                *text = text.trim_start().to_string();
            }
        }
    }

    Ok(raw
        .into_iter()
        .filter_map(|r| match r {
            Raw::Marker(m) => Some(Item::Marker(m)),
            Raw::Piece(_, Piece::Text(t)) if t.is_empty() => None,
            Raw::Piece(_, Piece::Text(t)) => Some(Item::Text(t)),
            Raw::Piece(fragment, Piece::Action { tokens, .. }) => {
                Some(Item::Action { fragment, tokens })
            }
            Raw::Piece(_, Piece::Comment { .. }) => None,
        })
        .collect())
}

/// What ended a node list
enum Stop {
    Eof,
    End { fragment: usize },
    Else { fragment: usize, tokens: Vec<Token> },
}

struct Parser<M> {
    items: std::vec::IntoIter<Item<M>>,
}

impl<M> Parser<M> {
    fn parse_list(&mut self) -> ExprResult<(Vec<Node<M>>, Stop)> {
        let mut nodes = Vec::new();

        while let Some(item) = self.items.next() {
            let (fragment, mut tokens) = match item {
                Item::Text(s) => {
                    nodes.push(Node::Text(s));
                    continue;
                }
                Item::Marker(m) => {
                    nodes.push(Node::Marker(m));
                    continue;
                }
                Item::Action { fragment, tokens } => (fragment, tokens),
            };

            let keyword = match tokens.first() {
                Some(Token::Ident(k)) => k.clone(),
                _ => String::new(),
            };
            match keyword.as_str() {
                "end" => {
                    if tokens.len() > 1 {
                        return Err(ExprError::Parse("unexpected tokens after end".into())
                            .at(fragment));
                    }
                    return Ok((nodes, Stop::End { fragment }));
                }
                "else" => {
                    tokens.remove(0);
                    return Ok((nodes, Stop::Else { fragment, tokens }));
                }
                "if" => nodes.push(self.parse_if(fragment, &tokens[1..])?),
                "range" => nodes.push(self.parse_range(fragment, &tokens[1..])?),
                "with" => nodes.push(self.parse_with(fragment, &tokens[1..])?),
                "define" | "template" | "block" | "break" | "continue" => {
                    return Err(ExprError::Parse(format!("unsupported action '{}'", keyword))
                        .at(fragment));
                }
                _ => {
                    let pipe = parse_pipeline(&tokens, false).map_err(|e| e.at(fragment))?;
                    nodes.push(Node::Action { fragment, pipe });
                }
            }
        }

        Ok((nodes, Stop::Eof))
    }

    fn parse_if(&mut self, fragment: usize, tokens: &[Token]) -> ExprResult<Node<M>> {
        let pipe = control_pipeline("if", tokens, false).map_err(|e| e.at(fragment))?;
        let (then, stop) = self.parse_list()?;
        let otherwise = match stop {
            Stop::End { .. } => Vec::new(),
            Stop::Else { fragment, tokens } if tokens.is_empty() => self.parse_else(fragment)?,
            Stop::Else { fragment, tokens } if is_keyword(&tokens, "if") => {
                vec![self.parse_if(fragment, &tokens[1..])?]
            }
            Stop::Else { fragment, .. } => {
                return Err(ExprError::Parse("unexpected tokens after else".into()).at(fragment))
            }
            Stop::Eof => return Err(missing_end("if", fragment)),
        };
        Ok(Node::If {
            fragment,
            pipe,
            then,
            otherwise,
        })
    }

    fn parse_with(&mut self, fragment: usize, tokens: &[Token]) -> ExprResult<Node<M>> {
        let pipe = control_pipeline("with", tokens, false).map_err(|e| e.at(fragment))?;
        let (body, stop) = self.parse_list()?;
        let otherwise = match stop {
            Stop::End { .. } => Vec::new(),
            Stop::Else { fragment, tokens } if tokens.is_empty() => self.parse_else(fragment)?,
            Stop::Else { fragment, tokens } if is_keyword(&tokens, "with") => {
                vec![self.parse_with(fragment, &tokens[1..])?]
            }
            Stop::Else { fragment, .. } => {
                return Err(ExprError::Parse("unexpected tokens after else".into()).at(fragment))
            }
            Stop::Eof => return Err(missing_end("with", fragment)),
        };
        Ok(Node::With {
            fragment,
            pipe,
            body,
            otherwise,
        })
    }

    fn parse_range(&mut self, fragment: usize, tokens: &[Token]) -> ExprResult<Node<M>> {
        let pipe = control_pipeline("range", tokens, true).map_err(|e| e.at(fragment))?;
        let (body, stop) = self.parse_list()?;
        let otherwise = match stop {
            Stop::End { .. } => Vec::new(),
            Stop::Else { fragment, tokens } if tokens.is_empty() => self.parse_else(fragment)?,
            Stop::Else { fragment, .. } => {
                return Err(ExprError::Parse("unexpected tokens after else".into()).at(fragment))
            }
            Stop::Eof => return Err(missing_end("range", fragment)),
        };
        Ok(Node::Range {
            fragment,
            pipe,
            body,
            otherwise,
        })
    }

    /// Body of a plain `{{else}}`, which must be closed by `{{end}}`
    fn parse_else(&mut self, fragment: usize) -> ExprResult<Vec<Node<M>>> {
        let (nodes, stop) = self.parse_list()?;
        match stop {
            Stop::End { .. } => Ok(nodes),
            Stop::Else { fragment, .. } => {
                Err(ExprError::Parse("expected end; found {{else}}".into()).at(fragment))
            }
            Stop::Eof => Err(missing_end("else", fragment)),
        }
    }
}

fn is_keyword(tokens: &[Token], keyword: &str) -> bool {
    matches!(tokens.first(), Some(Token::Ident(k)) if k == keyword)
}

fn missing_end(what: &str, fragment: usize) -> ExprError {
    ExprError::Parse(format!("unexpected EOF: missing {{{{end}}}} for {}", what)).at(fragment)
}

fn control_pipeline(what: &str, tokens: &[Token], allow_two_vars: bool) -> ExprResult<Pipeline> {
    let pipe = parse_pipeline(tokens, allow_two_vars)?;
    if pipe.commands.is_empty() {
        return Err(ExprError::Parse(format!("missing value for {}", what)));
    }
    Ok(pipe)
}

/// Parse the tokens of one action into a pipeline
pub(crate) fn parse_pipeline(tokens: &[Token], allow_two_vars: bool) -> ExprResult<Pipeline> {
    let mut pipe = Pipeline::default();
    let mut pos = 0;

    match tokens {
        [Token::Variable(v), op @ (Token::Declare | Token::Assign), ..] => {
            pipe.decl.push(v.clone());
            pipe.assign = *op == Token::Assign;
            pos = 2;
        }
        [Token::Variable(a), Token::Comma, Token::Variable(b), op @ (Token::Declare | Token::Assign), ..] =>
        {
            if !allow_two_vars {
                return Err(ExprError::Parse("too many declarations in command".into()));
            }
            pipe.decl.push(a.clone());
            pipe.decl.push(b.clone());
            pipe.assign = *op == Token::Assign;
            pos = 4;
        }
        _ => {}
    }

    let mut cursor = Cursor { tokens, pos };
    pipe.commands = cursor.commands(false)?;
    if cursor.pos < tokens.len() {
        return Err(ExprError::Parse(format!(
            "unexpected {:?} in command",
            tokens[cursor.pos]
        )));
    }
    if pipe.commands.is_empty() {
        return Err(ExprError::Parse("missing value for command".into()));
    }
    Ok(pipe)
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// Commands up to the end of the tokens, or up to `)` when `in_parens`
    fn commands(&mut self, in_parens: bool) -> ExprResult<Vec<Command>> {
        let mut commands = Vec::new();
        loop {
            match self.peek() {
                None => break,
                Some(Token::RightParen) if in_parens => break,
                _ => {}
            }
            commands.push(self.command(in_parens)?);
            match self.peek() {
                Some(Token::Pipe) => {
                    self.pos += 1;
                    if matches!(self.peek(), None | Some(Token::RightParen)) {
                        return Err(ExprError::Parse("missing command after |".into()));
                    }
                }
                Some(Token::RightParen) if in_parens => break,
                None => break,
                Some(other) => {
                    return Err(ExprError::Parse(format!("unexpected {:?} in operand", other)))
                }
            }
        }
        Ok(commands)
    }

    fn command(&mut self, in_parens: bool) -> ExprResult<Command> {
        let mut args = Vec::new();
        loop {
            match self.peek() {
                None | Some(Token::Pipe) => break,
                Some(Token::RightParen) if in_parens => break,
                _ => args.push(self.operand()?),
            }
        }
        if args.is_empty() {
            return Err(ExprError::Parse("missing value for command".into()));
        }
        Ok(Command { args })
    }

    fn operand(&mut self) -> ExprResult<Operand> {
        let token = self
            .next()
            .ok_or_else(|| ExprError::Parse("missing operand".into()))?;

        Ok(match token {
            Token::Dot => Operand::Dot,
            Token::Field { name, .. } => {
                let mut fields = vec![name.clone()];
                fields.extend(self.chain());
                Operand::Field(fields)
            }
            Token::Variable(name) => Operand::Variable {
                name: name.clone(),
                fields: self.chain(),
            },
            Token::Ident(name) => {
                if matches!(
                    name.as_str(),
                    "if" | "else" | "end" | "range" | "with" | "define" | "template" | "block"
                ) {
                    return Err(ExprError::Parse(format!("unexpected keyword '{}'", name)));
                }
                if functions::registry().get(name).is_none() {
                    return Err(ExprError::UnknownFunction(name.clone()));
                }
                Operand::Function(name.clone())
            }
            Token::String(s) => Operand::Literal(Value::String(s.clone())),
            Token::Int(n) => Operand::Literal(Value::from(*n)),
            Token::Float(f) => Operand::Literal(
                serde_json::Number::from_f64(*f)
                    .map(Value::Number)
                    .ok_or_else(|| ExprError::Parse(format!("number {} out of range", f)))?,
            ),
            Token::Bool(b) => Operand::Literal(Value::Bool(*b)),
            Token::Nil => Operand::Nil,
            Token::LeftParen => {
                let commands = self.commands(true)?;
                if self.next() != Some(&Token::RightParen) {
                    return Err(ExprError::Parse("unclosed left paren".into()));
                }
                if commands.is_empty() {
                    return Err(ExprError::Parse("missing value for command".into()));
                }
                Operand::Pipeline {
                    pipe: Box::new(Pipeline {
                        commands,
                        ..Pipeline::default()
                    }),
                    fields: self.chain(),
                }
            }
            other => return Err(ExprError::Parse(format!("unexpected {:?} in operand", other))),
        })
    }

    /// Field names written directly after the previous operand
    fn chain(&mut self) -> Vec<String> {
        let mut fields = Vec::new();
        while let Some(Token::Field { name, joined: true }) = self.peek() {
            fields.push(name.clone());
            self.pos += 1;
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn parse_text(src: &str) -> ExprResult<Vec<Node<()>>> {
        parse(vec![Fragment::Text(src.to_string())])
    }

    fn field(names: &[&str]) -> Operand {
        Operand::Field(names.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_parse_action() {
        let nodes = parse_text("Hello {{.User.Name}}!").unwrap();
        assert_eq!(
            nodes,
            vec![
                Node::Text("Hello ".into()),
                Node::Action {
                    fragment: 0,
                    pipe: Pipeline {
                        commands: vec![Command {
                            args: vec![field(&["User", "Name"])],
                        }],
                        ..Pipeline::default()
                    },
                },
                Node::Text("!".into()),
            ]
        );
    }

    #[test]
    fn test_parse_pipeline() {
        let pipe = parse_pipeline(
            &lex("{{$v := .Price | printf \"%.2f\"}}").unwrap().into_iter().find_map(|p| match p {
                Piece::Action { tokens, .. } => Some(tokens),
                _ => None,
            }).unwrap(),
            false,
        )
        .unwrap();
        assert_eq!(pipe.decl, vec!["$v".to_string()]);
        assert!(!pipe.assign);
        assert_eq!(pipe.commands.len(), 2);
        assert_eq!(
            pipe.commands[1].args,
            vec![
                Operand::Function("printf".into()),
                Operand::Literal(Value::String("%.2f".into())),
            ]
        );
    }

    #[test]
    fn test_parse_else_if_chain() {
        let nodes = parse_text("{{if .A}}a{{else if .B}}b{{else}}c{{end}}").unwrap();
        assert_eq!(nodes.len(), 1);
        match &nodes[0] {
            Node::If { then, otherwise, .. } => {
                assert_eq!(then, &vec![Node::Text("a".into())]);
                assert!(matches!(
                    otherwise.as_slice(),
                    [Node::If { otherwise, .. }] if otherwise == &vec![Node::Text("c".into())]
                ));
            }
            other => panic!("expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_range_across_fragments() {
        let nodes = parse(vec![
            Fragment::Marker(1),
            Fragment::Text("{{range $i, $e := .Items}}{{$e.Name}}".into()),
            Fragment::Marker(2),
            Fragment::Text("{{end}}".into()),
        ])
        .unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0], Node::Marker(1));
        match &nodes[1] {
            Node::Range { pipe, body, .. } => {
                assert_eq!(pipe.decl, vec!["$i".to_string(), "$e".to_string()]);
                assert_eq!(body.len(), 2);
                assert_eq!(body[1], Node::Marker(2));
            }
            other => panic!("expected range, got {:?}", other),
        }
    }

    #[test]
    fn test_trim_markers() {
        let nodes = parse_text("a  {{- .X -}}  b{{/* c */ -}}\n d").unwrap();
        assert_eq!(nodes[0], Node::Text("a".into()));
        assert_eq!(nodes[2], Node::Text("b".into()));
        assert_eq!(nodes[3], Node::Text("d".into()));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse_text("{{if .A}}x").unwrap_err().kind(),
            ExprError::Parse(_)
        ));
        assert!(parse_text("{{end}}").is_err());
        assert!(parse_text("{{else}}").is_err());
        assert!(parse_text("{{range .A}}{{else if .B}}{{end}}").is_err());
        assert!(parse_text("{{.A | }}").is_err());
        assert!(parse_text("{{}}").is_err());
        assert!(parse_text("{{(.A}}").is_err());
        assert!(parse_text("{{$a, $b := .X}}").is_err());
        assert!(parse_text("{{template \"x\"}}").is_err());
        assert!(matches!(
            parse_text("a{{nosuchfunc .A}}").unwrap_err().kind(),
            ExprError::UnknownFunction(name) if name == "nosuchfunc"
        ));
    }

    #[test]
    fn test_error_fragment() {
        let err = parse(vec![
            Fragment::Text("{{.A}}".to_string()),
            Fragment::Marker(()),
            Fragment::Text("{{.B".to_string()),
        ])
        .unwrap_err();
        assert_eq!(err.fragment(), Some(2));
    }
}
