//! DAX tokenizer with byte spans
//!
//! Spans point into the original formula so a rename can splice new names
//! into the text without reformatting anything around them.

use crate::error::{DaxError, DaxResult};
use std::ops::Range;

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Bare identifier: table, function or variable name
    Identifier(String),
    /// `'Sales Table'`, unescaped
    QuotedIdentifier(String),
    /// `[Amount]`, unescaped and trimmed
    BracketIdentifier(String),
    Number(f64),
    String(String),
    Var,
    Return,
    In,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Comma,
    Semicolon,
    /// Arithmetic, comparison and logical operators
    Operator(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Byte range of the token in the formula, delimiters included
    pub span: Range<usize>,
}

struct Lexer<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.input[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn consume_while<F>(&mut self, mut predicate: F) -> &'a str
    where
        F: FnMut(char) -> bool,
    {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !predicate(c) {
                break;
            }
            self.bump();
        }
        &self.input[start..self.pos]
    }

    /// Skip whitespace and `//`, `--` and `/* */` comments
    fn skip_trivia(&mut self) -> DaxResult<()> {
        loop {
            self.consume_while(char::is_whitespace);
            match (self.peek(), self.peek_second()) {
                (Some('/'), Some('/')) | (Some('-'), Some('-')) => {
                    self.consume_while(|c| c != '\n');
                }
                (Some('/'), Some('*')) => {
                    let start = self.pos;
                    match self.input[self.pos + 2..].find("*/") {
                        Some(end) => self.pos += 2 + end + 2,
                        None => {
                            return Err(DaxError::Unterminated {
                                what: "comment",
                                offset: start,
                            })
                        }
                    }
                }
                _ => return Ok(()),
            }
        }
    }

    /// Read a delimited literal whose closing delimiter is escaped by doubling it
    fn delimited(&mut self, close: char, what: &'static str) -> DaxResult<String> {
        let start = self.pos;
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(DaxError::Unterminated { what, offset: start }),
                Some(c) if c == close => {
                    if self.peek() == Some(close) {
                        self.bump();
                        out.push(close);
                        continue;
                    }
                    return Ok(out);
                }
                Some(c) => out.push(c),
            }
        }
    }

    fn number(&mut self) -> DaxResult<TokenKind> {
        let start = self.pos;
        self.consume_while(|c| c.is_ascii_digit() || c == '.');
        if matches!(self.peek(), Some('e' | 'E')) {
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            if self.consume_while(|c| c.is_ascii_digit()).is_empty() {
                return Err(DaxError::InvalidNumber {
                    text: self.input[start..self.pos].to_string(),
                    offset: start,
                });
            }
        }
        let text = &self.input[start..self.pos];
        text.parse()
            .map(TokenKind::Number)
            .map_err(|_| DaxError::InvalidNumber {
                text: text.to_string(),
                offset: start,
            })
    }

    fn operator(&mut self, c: char) -> DaxResult<TokenKind> {
        let start = self.pos;
        self.bump();
        let next = self.peek();
        let op = match (c, next) {
            ('<', Some('=')) => "<=",
            ('<', Some('>')) => "<>",
            ('>', Some('=')) => ">=",
            ('=', Some('=')) => "==",
            ('&', Some('&')) => "&&",
            ('|', Some('|')) => "||",
            ('+', _) => "+",
            ('-', _) => "-",
            ('*', _) => "*",
            ('/', _) => "/",
            ('^', _) => "^",
            ('=', _) => "=",
            ('<', _) => "<",
            ('>', _) => ">",
            ('&', _) => "&",
            _ => return Err(DaxError::UnexpectedChar { ch: c, offset: start }),
        };
        if op.len() == 2 {
            self.bump();
        }
        Ok(TokenKind::Operator(op))
    }

    fn next_token(&mut self) -> DaxResult<Option<Token>> {
        self.skip_trivia()?;
        let start = self.pos;
        let Some(c) = self.peek() else {
            return Ok(None);
        };

        let kind = match c {
            '(' | ')' | '{' | '}' | ',' | ';' => {
                self.bump();
                match c {
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    '{' => TokenKind::LBrace,
                    '}' => TokenKind::RBrace,
                    ',' => TokenKind::Comma,
                    _ => TokenKind::Semicolon,
                }
            }
            '"' => TokenKind::String(self.delimited('"', "string")?),
            '\'' => TokenKind::QuotedIdentifier(self.delimited('\'', "quoted name")?),
            '[' => {
                let name = self.delimited(']', "bracket name")?;
                TokenKind::BracketIdentifier(name.trim().to_string())
            }
            c if c.is_ascii_digit() || (c == '.' && self.peek_second().is_some_and(|d| d.is_ascii_digit())) => {
                self.number()?
            }
            c if is_ident_start(c) => {
                let ident = self.consume_while(is_ident_part);
                if ident.eq_ignore_ascii_case("VAR") {
                    TokenKind::Var
                } else if ident.eq_ignore_ascii_case("RETURN") {
                    TokenKind::Return
                } else if ident.eq_ignore_ascii_case("IN") {
                    TokenKind::In
                } else {
                    TokenKind::Identifier(ident.to_string())
                }
            }
            other => self.operator(other)?,
        };

        Ok(Some(Token {
            kind,
            span: start..self.pos,
        }))
    }
}

/// Tokenize a formula, checking that parentheses and braces balance
pub fn tokenize(input: &str) -> DaxResult<Vec<Token>> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    let mut open: Vec<(char, usize)> = Vec::new();

    while let Some(token) = lexer.next_token()? {
        match token.kind {
            TokenKind::LParen => open.push(('(', token.span.start)),
            TokenKind::LBrace => open.push(('{', token.span.start)),
            TokenKind::RParen | TokenKind::RBrace => {
                let (expected, delimiter) = if token.kind == TokenKind::RParen {
                    ('(', ')')
                } else {
                    ('{', '}')
                };
                match open.pop() {
                    Some((opener, _)) if opener == expected => {}
                    _ => {
                        return Err(DaxError::Unbalanced {
                            delimiter,
                            offset: token.span.start,
                        })
                    }
                }
            }
            _ => {}
        }
        tokens.push(token);
    }

    match open.pop() {
        Some((delimiter, offset)) => Err(DaxError::Unbalanced { delimiter, offset }),
        None => Ok(tokens),
    }
}

pub(crate) fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

pub(crate) fn is_ident_part(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '.'
}

#[cfg(test)]
#[path = "lexer_test.rs"]
mod tests;
