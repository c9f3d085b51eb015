use tracing::debug;

use super::lexer::{Spanned, Token, tokenize};
use super::value::{Key, Table, Value};
use super::{MAX_DEPTH, ParseError, ParseErrorKind};

/// A parsed document: every top-level statement, plus whether the text ended
/// before all of its tables were closed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    pub globals: Table,
    pub truncated: bool,
}

impl Document {
    /// The table the document is about: the `mission` assignment when there
    /// is one, otherwise a lone bare table, otherwise the top level itself.
    pub fn root(&self) -> &Table {
        if let Some(mission) = self.globals.table("mission") {
            return mission;
        }
        match self.globals.entries() {
            [(Key::Index(_), Value::Table(table))] => table,
            _ => &self.globals,
        }
    }
}

struct Reader<'s, 't> {
    src: &'s str,
    tokens: &'t [Spanned<Token<'s>>],
    pos: usize,
    truncated: bool,
}

impl<'s> Reader<'s, '_> {
    fn peek(&self) -> Option<&Token<'s>> {
        self.tokens.get(self.pos).map(|t| &t.value)
    }

    fn peek_second(&self) -> Option<&Token<'s>> {
        self.tokens.get(self.pos + 1).map(|t| &t.value)
    }

    fn error(&self, kind: ParseErrorKind) -> ParseError {
        let offset = self
            .tokens
            .get(self.pos)
            .map(|t| t.offset)
            .unwrap_or(self.src.len());
        ParseError::at(self.src, offset, kind)
    }

    fn unexpected(&self) -> ParseError {
        let what = self
            .peek()
            .map(Token::describe)
            .unwrap_or_else(|| "end of input".to_string());
        self.error(ParseErrorKind::UnexpectedToken(what))
    }

    /// Consumes `=` after a key. Returns `false` at end of input.
    fn expect_equals(&mut self) -> Result<bool, ParseError> {
        match self.peek() {
            Some(Token::Equals) => {
                self.pos += 1;
                Ok(true)
            }
            None => {
                self.truncated = true;
                Ok(false)
            }
            Some(_) => Err(self.unexpected()),
        }
    }

    /// Reads one value. `None` means the input ended first.
    fn value(&mut self, depth: usize) -> Result<Option<Value>, ParseError> {
        let Some(token) = self.peek() else {
            self.truncated = true;
            return Ok(None);
        };
        let value = match token {
            Token::Open => return self.table(depth + 1).map(|t| Some(Value::Table(t))),
            Token::Str(s) => Value::Str(s.clone()),
            Token::Number(n) => Value::Number(*n),
            Token::Ident("true") => Value::Bool(true),
            Token::Ident("false") => Value::Bool(false),
            Token::Ident("nil") => Value::Nil,
            _ => return Err(self.unexpected()),
        };
        self.pos += 1;
        Ok(Some(value))
    }

    /// Reads a table whose opening brace is the current token.
    fn table(&mut self, depth: usize) -> Result<Table, ParseError> {
        if depth > MAX_DEPTH {
            return Err(self.error(ParseErrorKind::TooDeep(MAX_DEPTH)));
        }
        self.pos += 1;

        let mut table = Table::new();
        let mut next_index = 1;
        loop {
            let key = match self.peek() {
                None => {
                    self.truncated = true;
                    return Ok(table);
                }
                Some(Token::Close) => {
                    self.pos += 1;
                    return Ok(table);
                }
                Some(Token::Separator) => {
                    self.pos += 1;
                    continue;
                }
                Some(Token::Key(k)) => Some(Key::Str(k.clone())),
                Some(Token::Index(i)) => Some(Key::Index(*i)),
                Some(Token::Ident(name)) if self.peek_second() == Some(&Token::Equals) => {
                    Some(Key::Str(name.to_string()))
                }
                Some(_) => None,
            };

            let key = match key {
                Some(key) => {
                    self.pos += 1;
                    if !self.expect_equals()? {
                        return Ok(table);
                    }
                    key
                }
                None => {
                    let key = Key::Index(next_index);
                    next_index += 1;
                    key
                }
            };

            match self.value(depth)? {
                Some(value) => table.push(key, value),
                None => return Ok(table),
            }
        }
    }

    fn document(&mut self) -> Result<Document, ParseError> {
        let mut globals = Table::new();
        let mut next_index = 1;
        while let Some(token) = self.peek() {
            match token {
                Token::Separator => {
                    self.pos += 1;
                }
                Token::Ident("return" | "local") => {
                    self.pos += 1;
                }
                Token::Ident(name) if self.peek_second() == Some(&Token::Equals) => {
                    let key = Key::Str(name.to_string());
                    self.pos += 2;
                    match self.value(0)? {
                        Some(value) => globals.push(key, value),
                        None => break,
                    }
                }
                Token::Open => {
                    if let Some(value) = self.value(0)? {
                        globals.push(Key::Index(next_index), value);
                        next_index += 1;
                    }
                }
                _ => return Err(self.unexpected()),
            }
        }
        Ok(Document {
            globals,
            truncated: self.truncated,
        })
    }
}

/// Tokenizes and reads `src` into a [`Document`].
///
/// Text that ends inside a table is accepted: the open tables are closed
/// where the input stops and [`Document::truncated`] is set.
pub fn parse_document(src: &str) -> Result<Document, ParseError> {
    let tokens = tokenize(src)?;
    let mut reader = Reader {
        src,
        tokens: &tokens,
        pos: 0,
        truncated: false,
    };
    let document = reader.document()?;
    if document.truncated {
        debug!("document ended before all of its tables were closed");
    }
    Ok(document)
}
