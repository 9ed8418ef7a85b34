//! Template lexer
//!
//! Splits template text into literal text and `{{ … }}` actions, and the body
//! of each action into tokens.

use crate::error::{ExprError, ExprResult};

/// Token inside an action
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// `.Name`; `joined` when written right after the operand it applies to
    /// (`.A.B`, `$x.Name`, `(…).Name`)
    Field { name: String, joined: bool },
    /// `.`
    Dot,
    /// `$` or `$name`, including the `$`
    Variable(String),
    Ident(String),
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Nil,
    LeftParen,
    RightParen,
    Pipe,
    /// `:=`
    Declare,
    /// `=`
    Assign,
    Comma,
}

impl Token {
    /// Whether a `.Name` written directly after this token continues it
    fn is_chainable(&self) -> bool {
        matches!(
            self,
            Token::Field { .. } | Token::Variable(_) | Token::RightParen
        )
    }
}

/// A lexed piece of template text
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Piece {
    Text(String),
    Action {
        tokens: Vec<Token>,
        trim_left: bool,
        trim_right: bool,
    },
    Comment {
        trim_left: bool,
        trim_right: bool,
    },
}

/// Lex one piece of template source
pub(crate) fn lex(src: &str) -> ExprResult<Vec<Piece>> {
    let mut pieces = Vec::new();
    let mut pos = 0;

    while let Some(found) = src[pos..].find("{{") {
        let open = pos + found;
        if open > pos {
            pieces.push(Piece::Text(src[pos..open].to_string()));
        }
        let mut lexer = ActionLexer {
            src,
            start: open,
            pos: open + 2,
        };
        pieces.push(lexer.lex_action()?);
        pos = lexer.pos;
    }
    if pos < src.len() {
        pieces.push(Piece::Text(src[pos..].to_string()));
    }

    Ok(pieces)
}

struct ActionLexer<'a> {
    src: &'a str,
    /// Offset of the opening `{{`
    start: usize,
    pos: usize,
}

impl<'a> ActionLexer<'a> {
    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn error(&self, message: &str) -> ExprError {
        let snippet: String = self.src[self.start..].chars().take(40).collect();
        ExprError::Parse(format!("{} in action '{}'", message, snippet))
    }

    /// Skip whitespace, returning whether there was any
    fn skip_whitespace(&mut self) -> bool {
        let before = self.pos;
        while self.peek().map_or(false, char::is_whitespace) {
            self.bump();
        }
        self.pos > before
    }

    fn lex_action(&mut self) -> ExprResult<Piece> {
        let trim_left = {
            let mut chars = self.rest().chars();
            chars.next() == Some('-') && chars.next().map_or(false, char::is_whitespace)
        };
        if trim_left {
            self.pos += 1;
        }

        self.skip_whitespace();
        if self.rest().starts_with("/*") {
            let end = self
                .rest()
                .find("*/")
                .ok_or_else(|| self.error("unclosed comment"))?;
            self.pos += end + 2;
            let skipped = self.skip_whitespace();
            let trim_right = self
                .close(skipped)
                .ok_or_else(|| self.error("comment ends before closing delimiter"))?;
            return Ok(Piece::Comment {
                trim_left,
                trim_right,
            });
        }

        let mut tokens: Vec<Token> = Vec::new();
        let mut skipped = true;
        loop {
            if self.rest().is_empty() {
                return Err(self.error("unclosed action"));
            }
            if let Some(trim_right) = self.close(skipped) {
                return Ok(Piece::Action {
                    tokens,
                    trim_left,
                    trim_right,
                });
            }
            let token = self.next_token(tokens.last(), skipped)?;
            tokens.push(token);
            skipped = self.skip_whitespace();
        }
    }

    /// Consume a closing delimiter, returning whether it trims
    fn close(&mut self, after_space: bool) -> Option<bool> {
        if self.rest().starts_with("}}") {
            self.pos += 2;
            Some(false)
        } else if after_space && self.rest().starts_with("-}}") {
            self.pos += 3;
            Some(true)
        } else {
            None
        }
    }

    fn next_token(&mut self, prev: Option<&Token>, after_space: bool) -> ExprResult<Token> {
        let c = self.peek().ok_or_else(|| self.error("unexpected end"))?;
        match c {
            '.' => {
                self.bump();
                if self.peek().map_or(false, |c| c.is_ascii_digit()) {
                    self.pos -= 1;
                    return self.number();
                }
                let name = self.ident();
                if name.is_empty() {
                    return Ok(Token::Dot);
                }
                let joined = !after_space && prev.map_or(false, Token::is_chainable);
                Ok(Token::Field { name, joined })
            }
            '$' => {
                self.bump();
                Ok(Token::Variable(format!("${}", self.ident())))
            }
            '"' => self.quoted(),
            '`' => {
                self.bump();
                let end = self
                    .rest()
                    .find('`')
                    .ok_or_else(|| self.error("unterminated raw string"))?;
                let s = self.rest()[..end].to_string();
                self.pos += end + 1;
                Ok(Token::String(s))
            }
            '\'' => self.char_constant(),
            '(' => {
                self.bump();
                Ok(Token::LeftParen)
            }
            ')' => {
                self.bump();
                Ok(Token::RightParen)
            }
            '|' => {
                self.bump();
                Ok(Token::Pipe)
            }
            ',' => {
                self.bump();
                Ok(Token::Comma)
            }
            ':' => {
                self.bump();
                if self.bump() == Some('=') {
                    Ok(Token::Declare)
                } else {
                    Err(self.error("expected :="))
                }
            }
            '=' => {
                self.bump();
                Ok(Token::Assign)
            }
            '+' | '-' | '0'..='9' => self.number(),
            c if c.is_alphabetic() || c == '_' => {
                let name = self.ident();
                Ok(match name.as_str() {
                    "true" => Token::Bool(true),
                    "false" => Token::Bool(false),
                    "nil" => Token::Nil,
                    _ => Token::Ident(name),
                })
            }
            c => Err(self.error(&format!("unexpected character '{}'", c))),
        }
    }

    fn ident(&mut self) -> String {
        let start = self.pos;
        while self
            .peek()
            .map_or(false, |c| c.is_alphanumeric() || c == '_')
        {
            self.bump();
        }
        self.src[start..self.pos].to_string()
    }

    fn number(&mut self) -> ExprResult<Token> {
        let start = self.pos;
        if matches!(self.peek(), Some('+') | Some('-')) {
            self.bump();
        }

        let body = self.rest();
        if body.starts_with("0x") || body.starts_with("0X") {
            self.pos += 2;
            let digits_start = self.pos;
            while self.peek().map_or(false, |c| c.is_ascii_hexdigit()) {
                self.bump();
            }
            let value = i64::from_str_radix(&self.src[digits_start..self.pos], 16)
                .map_err(|_| self.error("bad hex number"))?;
            let negative = self.src[start..].starts_with('-');
            return Ok(Token::Int(if negative { -value } else { value }));
        }

        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | '_' => {}
                '.' => is_float = true,
                'e' | 'E' => {
                    is_float = true;
                    self.bump();
                    if matches!(self.peek(), Some('+') | Some('-')) {
                        self.bump();
                    }
                    continue;
                }
                _ => break,
            }
            self.bump();
        }

        let text: String = self.src[start..self.pos]
            .chars()
            .filter(|c| *c != '_')
            .collect();
        if text == "+" || text == "-" {
            return Err(self.error("bad number syntax"));
        }
        if !is_float {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Token::Int(n));
            }
        }
        text.parse::<f64>()
            .map(Token::Float)
            .map_err(|_| self.error(&format!("bad number syntax '{}'", text)))
    }

    fn quoted(&mut self) -> ExprResult<Token> {
        self.bump();
        let mut s = String::new();
        loop {
            match self.bump() {
                None => return Err(self.error("unterminated quoted string")),
                Some('"') => return Ok(Token::String(s)),
                Some('\\') => s.push(self.escape()?),
                Some(c) => s.push(c),
            }
        }
    }

    fn escape(&mut self) -> ExprResult<char> {
        let c = self.bump().ok_or_else(|| self.error("bad escape"))?;
        Ok(match c {
            'n' => '\n',
            't' => '\t',
            'r' => '\r',
            '0' => '\0',
            '\\' => '\\',
            '"' => '"',
            '\'' => '\'',
            'x' | 'u' | 'U' => {
                let len = match c {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let hex = self
                    .rest()
                    .get(..len)
                    .ok_or_else(|| self.error("bad escape"))?;
                let code = u32::from_str_radix(hex, 16).map_err(|_| self.error("bad escape"))?;
                self.pos += len;
                char::from_u32(code).ok_or_else(|| self.error("bad escape"))?
            }
            _ => return Err(self.error(&format!("unknown escape '\\{}'", c))),
        })
    }

    fn char_constant(&mut self) -> ExprResult<Token> {
        self.bump();
        let c = match self.bump() {
            Some('\\') => self.escape()?,
            Some(c) => c,
            None => return Err(self.error("unterminated character constant")),
        };
        if self.bump() != Some('\'') {
            return Err(self.error("unterminated character constant"));
        }
        Ok(Token::Int(c as i64))
    }
}
