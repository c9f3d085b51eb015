use winnow::Parser;
use winnow::ascii::{float, hex_digit1, till_line_ending};
use winnow::combinator::{alt, opt};
use winnow::error::{ContextError, ErrMode};
use winnow::token::{any, one_of, take, take_till, take_until, take_while};

use super::{ParseError, ParseErrorKind};

/// Common result type for winnow parsers.
pub type WResult<T> = Result<T, ErrMode<ContextError>>;

#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    Open,
    Close,
    Equals,
    /// `,` or `;`
    Separator,
    /// `["key"]`, or a bracketed non-integral number
    Key(String),
    /// `[n]`
    Index(i64),
    Str(String),
    Number(f64),
    Ident(&'a str),
}

impl Token<'_> {
    pub fn describe(&self) -> String {
        match self {
            Token::Open => "'{'".to_string(),
            Token::Close => "'}'".to_string(),
            Token::Equals => "'='".to_string(),
            Token::Separator => "separator".to_string(),
            Token::Key(k) => format!("key [{k:?}]"),
            Token::Index(i) => format!("index [{i}]"),
            Token::Str(_) => "string".to_string(),
            Token::Number(n) => format!("number {n}"),
            Token::Ident(i) => format!("identifier {i}"),
        }
    }
}

/// A token and the byte offset it starts at.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned<T> {
    pub value: T,
    pub offset: usize,
}

fn backtrack<T>() -> WResult<T> {
    Err(ErrMode::Backtrack(ContextError::new()))
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Level of a long bracket opening at the start of `input`: `[[` is 0,
/// `[==[` is 2.
fn long_bracket_level(input: &str) -> Option<usize> {
    let rest = input.strip_prefix('[')?;
    let level = rest.bytes().take_while(|b| *b == b'=').count();
    (rest.as_bytes().get(level) == Some(&b'[')).then_some(level)
}

fn long_bracket<'a>(input: &mut &'a str, level: usize) -> WResult<&'a str> {
    take(level + 2).parse_next(input)?;
    let close = format!("]{}]", "=".repeat(level));
    let body = take_until(0.., close.as_str()).parse_next(input)?;
    take(close.len()).parse_next(input)?;
    // A newline directly after the opening bracket is not part of the text.
    Ok(body
        .strip_prefix("\r\n")
        .or_else(|| body.strip_prefix('\n'))
        .unwrap_or(body))
}

fn comment(input: &mut &str) -> WResult<()> {
    "--".parse_next(input)?;
    match long_bracket_level(input) {
        Some(level) => {
            // An unclosed block comment runs to the end of the document.
            if long_bracket(input, level).is_err() {
                *input = &input[input.len()..];
            }
        }
        None => {
            till_line_ending.parse_next(input)?;
        }
    }
    Ok(())
}

fn trivia(input: &mut &str) -> WResult<()> {
    loop {
        take_while(0.., char::is_whitespace).parse_next(input)?;
        if !input.starts_with("--") {
            return Ok(());
        }
        comment(input)?;
    }
}

fn escape_sequence(input: &mut &str, out: &mut String) -> WResult<()> {
    let c = any.parse_next(input)?;
    match c {
        'n' => out.push('\n'),
        't' => out.push('\t'),
        'r' => out.push('\r'),
        'a' => out.push('\x07'),
        'b' => out.push('\x08'),
        'f' => out.push('\x0c'),
        'v' => out.push('\x0b'),
        '0'..='9' => {
            let rest = take_while(0..=2, |c: char| c.is_ascii_digit()).parse_next(input)?;
            let code: u32 = format!("{c}{rest}").parse().unwrap_or(u32::MAX);
            match u8::try_from(code) {
                Ok(byte) => out.push(char::from(byte)),
                Err(_) => return backtrack(),
            }
        }
        // Quotes, backslashes and escaped line breaks stand for themselves.
        other => out.push(other),
    }
    Ok(())
}

fn quoted(input: &mut &str) -> WResult<String> {
    let quote = one_of(['"', '\'']).parse_next(input)?;
    let mut out = String::new();
    loop {
        let chunk = take_till(0.., (quote, '\\')).parse_next(input)?;
        out.push_str(chunk);
        match any.parse_next(input)? {
            '\\' => escape_sequence(input, &mut out)?,
            _ => return Ok(out),
        }
    }
}

fn number(input: &mut &str) -> WResult<f64> {
    let negative = opt('-').parse_next(input)?.is_some();
    let value: f64 = if opt(alt(("0x", "0X"))).parse_next(input)?.is_some() {
        hex_digit1
            .try_map(|digits| u64::from_str_radix(digits, 16))
            .parse_next(input)? as f64
    } else {
        float.parse_next(input)?
    };
    if input.starts_with(is_ident_char) {
        return backtrack();
    }
    Ok(if negative { -value } else { value })
}

fn identifier<'a>(input: &mut &'a str) -> WResult<&'a str> {
    take_while(1.., is_ident_char).parse_next(input)
}

fn bracket(input: &mut &str) -> WResult<Token<'static>> {
    if let Some(level) = long_bracket_level(input) {
        return long_bracket(input, level).map(|s| Token::Str(s.to_string()));
    }

    '['.parse_next(input)?;
    trivia(input)?;
    let token = match input.chars().next() {
        Some('"' | '\'') => Token::Key(quoted(input)?),
        Some(c) if c.is_ascii_digit() || c == '-' || c == '.' => {
            let n = number(input)?;
            if n.fract() == 0.0 && n.abs() < i64::MAX as f64 {
                Token::Index(n as i64)
            } else {
                Token::Key(n.to_string())
            }
        }
        _ => return backtrack(),
    };
    trivia(input)?;
    ']'.parse_next(input)?;
    Ok(token)
}

fn starts_number(input: &str) -> bool {
    let rest = input.strip_prefix('-').unwrap_or(input);
    let mut chars = rest.chars();
    match chars.next() {
        Some(c) if c.is_ascii_digit() => true,
        Some('.') => chars.next().is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

fn token<'a>(input: &mut &'a str, first: char) -> WResult<Token<'a>> {
    match first {
        '{' | '}' | '=' | ',' | ';' => {
            any.parse_next(input)?;
            Ok(match first {
                '{' => Token::Open,
                '}' => Token::Close,
                '=' => Token::Equals,
                _ => Token::Separator,
            })
        }
        '"' | '\'' => quoted.map(Token::Str).parse_next(input),
        '[' => bracket(input),
        _ if starts_number(input) => number.map(Token::Number).parse_next(input),
        c if c.is_alphabetic() || c == '_' => identifier.map(Token::Ident).parse_next(input),
        _ => backtrack(),
    }
}

fn failure_kind(input: &str, first: char) -> ParseErrorKind {
    match first {
        '"' | '\'' => ParseErrorKind::UnterminatedString,
        '[' if long_bracket_level(input).is_some() => ParseErrorKind::UnterminatedString,
        '[' => ParseErrorKind::MalformedKey,
        _ if starts_number(input) => ParseErrorKind::MalformedNumber,
        c => ParseErrorKind::UnexpectedCharacter(c),
    }
}

/// Splits `src` into tokens, skipping whitespace and comments.
pub fn tokenize(src: &str) -> Result<Vec<Spanned<Token<'_>>>, ParseError> {
    let mut input = src;
    let mut tokens = Vec::new();
    loop {
        // Trivia cannot fail: unclosed block comments are consumed whole.
        let _ = trivia(&mut input);
        let Some(first) = input.chars().next() else {
            break;
        };
        let offset = src.len() - input.len();
        let start = input;
        match token(&mut input, first) {
            Ok(value) => tokens.push(Spanned { value, offset }),
            Err(_) => return Err(ParseError::at(src, offset, failure_kind(start, first))),
        }
    }
    Ok(tokens)
}
