//! Parser for the structured literals the manifest query tool prints.
//!
//! Accepts the Python-literal subset gclient emits for GCS dependencies:
//! lists, tuples, dicts, single- or double-quoted strings, integers,
//! `True` / `False` / `None`. Dict keys may also be bare identifiers.

use std::iter::Peekable;
use std::str::Chars;

/// A parsed literal value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Literal {
    Str(String),
    Num(String),
    Bool(bool),
    Null,
    List(Vec<Literal>),
    Map(Vec<(String, Literal)>),
}

impl Literal {
    /// Look up a key in a map literal.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Literal> {
        match self {
            Self::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// The string payload, if this is a string.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// Parse `input` as exactly one literal, allowing surrounding whitespace.
///
/// # Errors
///
/// Returns a description of the first syntax problem.
pub fn parse(input: &str) -> Result<Literal, String> {
    let mut parser = Parser {
        chars: input.chars().peekable(),
    };
    let value = parser.value()?;
    parser.skip_ws();
    match parser.chars.next() {
        None => Ok(value),
        Some(c) => Err(format!("unexpected trailing character '{c}'")),
    }
}

struct Parser<'a> {
    chars: Peekable<Chars<'a>>,
}

impl Parser<'_> {
    fn skip_ws(&mut self) {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
        }
    }

    fn expect(&mut self, wanted: char) -> Result<(), String> {
        self.skip_ws();
        match self.chars.next() {
            Some(c) if c == wanted => Ok(()),
            Some(c) => Err(format!("expected '{wanted}', found '{c}'")),
            None => Err(format!("expected '{wanted}', found end of input")),
        }
    }

    fn value(&mut self) -> Result<Literal, String> {
        self.skip_ws();
        match self.chars.peek().copied() {
            Some('[') => self.sequence('[', ']'),
            Some('(') => self.sequence('(', ')'),
            Some('{') => self.map(),
            Some(q @ ('\'' | '"')) => self.string(q).map(Literal::Str),
            Some(c) if c.is_ascii_digit() || c == '-' => Ok(Literal::Num(self.number())),
            Some(c) if is_ident_start(c) => {
                let word = self.ident();
                Ok(match word.as_str() {
                    "True" | "true" => Literal::Bool(true),
                    "False" | "false" => Literal::Bool(false),
                    "None" | "null" => Literal::Null,
                    _ => Literal::Str(word),
                })
            }
            Some(c) => Err(format!("unexpected character '{c}'")),
            None => Err("unexpected end of input".to_string()),
        }
    }

    fn sequence(&mut self, open: char, close: char) -> Result<Literal, String> {
        self.expect(open)?;
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.chars.peek() == Some(&close) {
                self.chars.next();
                return Ok(Literal::List(items));
            }
            items.push(self.value()?);
            self.skip_ws();
            match self.chars.next() {
                Some(',') => {}
                Some(c) if c == close => return Ok(Literal::List(items)),
                Some(c) => return Err(format!("expected ',' or '{close}', found '{c}'")),
                None => return Err(format!("unterminated sequence, expected '{close}'")),
            }
        }
    }

    fn map(&mut self) -> Result<Literal, String> {
        self.expect('{')?;
        let mut entries = Vec::new();
        loop {
            self.skip_ws();
            let key = match self.chars.peek().copied() {
                Some('}') => {
                    self.chars.next();
                    return Ok(Literal::Map(entries));
                }
                Some(q @ ('\'' | '"')) => self.string(q)?,
                Some(c) if is_ident_start(c) => self.ident(),
                Some(c) => return Err(format!("unexpected character '{c}' in key")),
                None => return Err("unterminated map, expected '}'".to_string()),
            };
            self.expect(':')?;
            let value = self.value()?;
            entries.push((key, value));
            self.skip_ws();
            match self.chars.next() {
                Some(',') => {}
                Some('}') => return Ok(Literal::Map(entries)),
                Some(c) => return Err(format!("expected ',' or '}}', found '{c}'")),
                None => return Err("unterminated map, expected '}'".to_string()),
            }
        }
    }

    fn string(&mut self, quote: char) -> Result<String, String> {
        self.chars.next();
        let mut out = String::new();
        loop {
            match self.chars.next() {
                Some('\\') => match self.chars.next() {
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some(c) => out.push(c),
                    None => return Err("unterminated escape".to_string()),
                },
                Some(c) if c == quote => return Ok(out),
                Some(c) => out.push(c),
                None => return Err("unterminated string".to_string()),
            }
        }
    }

    fn number(&mut self) -> String {
        let mut out = String::new();
        while let Some(&c) = self.chars.peek() {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_') {
                out.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        out
    }

    fn ident(&mut self) -> String {
        let mut out = String::new();
        while let Some(&c) = self.chars.peek() {
            if is_ident_start(c) || c.is_ascii_digit() || matches!(c, '-' | '.') {
                out.push(c);
                self.chars.next();
            } else {
                break;
            }
        }
        out
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}
