//! Restricted-grammar parser for the metadata literal.
//!
//! Accepts the object/array/string/number/bool/null subset that tool authors
//! actually write: single- or double-quoted strings, bare or quoted object
//! keys, trailing commas, nested literals (including an embedded schema) and
//! `//` / `/* */` comments. It is a real recursive-descent parser, not regex
//! scraping, and it never evaluates the source.

use serde_json::{Map, Number, Value};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("literal parse error at offset {offset}: {message}")]
pub struct LiteralError {
    pub offset: usize,
    pub message: String,
}

pub(crate) struct Cursor {
    chars: Vec<char>,
    pos: usize,
}

impl Cursor {
    pub(crate) fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            pos: 0,
        }
    }

    pub(crate) fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek();
        if ch.is_some() {
            self.pos += 1;
        }
        ch
    }

    pub(crate) fn offset(&self) -> usize {
        self.pos
    }

    fn error(&self, message: impl Into<String>) -> LiteralError {
        LiteralError {
            offset: self.pos,
            message: message.into(),
        }
    }

    /// Skip whitespace, `//` line comments and `/* */` block comments.
    pub(crate) fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(ch) if ch.is_whitespace() => {
                    self.pos += 1;
                }
                Some('/') if self.chars.get(self.pos + 1) == Some(&'/') => {
                    while let Some(ch) = self.peek() {
                        self.pos += 1;
                        if ch == '\n' {
                            break;
                        }
                    }
                }
                Some('/') if self.chars.get(self.pos + 1) == Some(&'*') => {
                    self.pos += 2;
                    while self.pos < self.chars.len() {
                        if self.peek() == Some('*') && self.chars.get(self.pos + 1) == Some(&'/') {
                            self.pos += 2;
                            break;
                        }
                        self.pos += 1;
                    }
                }
                _ => break,
            }
        }
    }

    pub(crate) fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub(crate) fn parse_value(&mut self) -> Result<Value, LiteralError> {
        self.skip_trivia();
        match self.peek() {
            Some('{') => self.parse_object(),
            Some('[') => self.parse_array(),
            Some('"') | Some('\'') => Ok(Value::String(self.parse_string()?)),
            Some(ch) if ch == '-' || ch.is_ascii_digit() => self.parse_number(),
            Some(ch) if ch.is_ascii_alphabetic() => {
                let word = self.parse_bare_word();
                match word.as_str() {
                    "true" => Ok(Value::Bool(true)),
                    "false" => Ok(Value::Bool(false)),
                    "null" => Ok(Value::Null),
                    other => Err(self.error(format!("unexpected token `{other}`"))),
                }
            }
            Some(ch) => Err(self.error(format!("unexpected character `{ch}`"))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn parse_object(&mut self) -> Result<Value, LiteralError> {
        // caller guarantees '{'
        self.bump();
        let mut map = Map::new();
        loop {
            self.skip_trivia();
            if self.eat('}') {
                return Ok(Value::Object(map));
            }
            let key = self.parse_key()?;
            self.skip_trivia();
            if !self.eat(':') {
                return Err(self.error("expected `:` after object key"));
            }
            let value = self.parse_value()?;
            map.insert(key, value);
            self.skip_trivia();
            if self.eat(',') {
                continue; // trailing comma handled by the `}` check above
            }
            self.skip_trivia();
            if self.eat('}') {
                return Ok(Value::Object(map));
            }
            return Err(self.error("expected `,` or `}` in object"));
        }
    }

    fn parse_array(&mut self) -> Result<Value, LiteralError> {
        self.bump();
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            if self.eat(']') {
                return Ok(Value::Array(items));
            }
            items.push(self.parse_value()?);
            self.skip_trivia();
            if self.eat(',') {
                continue;
            }
            self.skip_trivia();
            if self.eat(']') {
                return Ok(Value::Array(items));
            }
            return Err(self.error("expected `,` or `]` in array"));
        }
    }

    fn parse_key(&mut self) -> Result<String, LiteralError> {
        match self.peek() {
            Some('"') | Some('\'') => self.parse_string(),
            Some(ch) if ch.is_ascii_alphabetic() || ch == '_' || ch == '$' => {
                Ok(self.parse_bare_word())
            }
            _ => Err(self.error("expected object key")),
        }
    }

    fn parse_bare_word(&mut self) -> String {
        let mut word = String::new();
        while let Some(ch) = self.peek() {
            if ch.is_ascii_alphanumeric() || ch == '_' || ch == '$' {
                word.push(ch);
                self.pos += 1;
            } else {
                break;
            }
        }
        word
    }

    pub(crate) fn parse_string(&mut self) -> Result<String, LiteralError> {
        let quote = self
            .bump()
            .ok_or_else(|| self.error("expected string"))?;
        let mut out = String::new();
        loop {
            match self.bump() {
                Some(ch) if ch == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some('u') => {
                        let mut code = 0u32;
                        for _ in 0..4 {
                            let digit = self
                                .bump()
                                .and_then(|c| c.to_digit(16))
                                .ok_or_else(|| self.error("invalid \\u escape"))?;
                            code = code * 16 + digit;
                        }
                        out.push(
                            char::from_u32(code)
                                .ok_or_else(|| self.error("invalid \\u escape"))?,
                        );
                    }
                    Some(other) => out.push(other),
                    None => return Err(self.error("unterminated escape")),
                },
                Some(ch) => out.push(ch),
                None => return Err(self.error("unterminated string")),
            }
        }
    }

    fn parse_number(&mut self) -> Result<Value, LiteralError> {
        let start = self.pos;
        if self.peek() == Some('-') {
            self.pos += 1;
        }
        let mut integral = true;
        while let Some(ch) = self.peek() {
            match ch {
                '0'..='9' => self.pos += 1,
                '.' | 'e' | 'E' | '+' | '-' => {
                    integral = false;
                    self.pos += 1;
                }
                _ => break,
            }
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        if integral {
            if let Ok(n) = text.parse::<i64>() {
                return Ok(Value::Number(Number::from(n)));
            }
        }
        let n = text
            .parse::<f64>()
            .map_err(|_| self.error(format!("invalid number `{text}`")))?;
        Number::from_f64(n)
            .map(Value::Number)
            .ok_or_else(|| self.error(format!("non-finite number `{text}`")))
    }
}

/// Parse a single literal value starting at `text`. Returns the value and the
/// number of characters consumed.
pub fn parse_literal(text: &str) -> Result<(Value, usize), LiteralError> {
    let mut cursor = Cursor::new(text);
    let value = cursor.parse_value()?;
    Ok((value, cursor.offset()))
}
