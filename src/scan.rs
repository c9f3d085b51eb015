//! Text-level scanning over raw serialized-table text.
//!
//! Nothing in here understands the table language. Blocks are found by
//! counting braces and fields are found by pattern matching, which makes
//! these helpers usable on documents the tokenizer in [`crate::lua`] rejects,
//! and on single lines of a document that is being streamed.

use std::ops::Range;
use std::sync::LazyLock;

use regex::{Captures, Regex, RegexBuilder};

use crate::dictionary::unescape;

/// Value portion shared by every field pattern: a double or single quoted
/// string, a numeric literal, the opening brace of a nested table, or a bare
/// word such as `true`.
const VALUE_PATTERN: &str = r#"\s*=\s*(?:"((?:[^"\\]|\\.)*)"|'((?:[^'\\]|\\.)*)'|([-+]?(?:\d+\.?\d*|\.\d+)(?:[eE][-+]?\d+)?)|(\{)|([A-Za-z_]\w*))"#;

static INDEXED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*(\d+)\s*\]\s*=\s*\{").expect("valid indexed block regex"));

static QUOTED_STRING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)(\[\s*)?"((?:[^"\\]|\\.)*)""#).expect("valid quoted string regex")
});

/// Returns the byte range of the balanced block starting at `start`.
///
/// `start` must index an opening brace. The range covers both the opening
/// brace and its depth-matching closing brace. `None` is returned when the
/// text ends before the block closes.
pub fn block_range(text: &str, start: usize) -> Option<Range<usize>> {
    let bytes = text.as_bytes();
    if bytes.get(start) != Some(&b'{') {
        return None;
    }

    let mut depth = 0usize;
    for (offset, byte) in bytes[start..].iter().enumerate() {
        match byte {
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(start..start + offset + 1);
                }
            }
            _ => {}
        }
    }

    None
}

/// Returns the balanced block starting at `start`, braces included.
pub fn extract_block(text: &str, start: usize) -> Option<&str> {
    block_range(text, start).and_then(|range| text.get(range))
}

/// A field value as it appears in the text, before any interpretation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawValue<'a> {
    /// Contents of a quoted string with escape sequences left in place.
    Quoted(&'a str),
    Number(&'a str),
    /// Byte offset of the opening brace within the searched text.
    Block(usize),
    Word(&'a str),
}

impl<'a> RawValue<'a> {
    /// The value text as written. Blocks have no inline text.
    pub fn text(&self) -> &'a str {
        match self {
            RawValue::Quoted(s) | RawValue::Number(s) | RawValue::Word(s) => s,
            RawValue::Block(_) => "{",
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Number(s) | RawValue::Quoted(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            RawValue::Number(s) | RawValue::Quoted(s) => parse_int(s.trim()),
            _ => None,
        }
    }
}

/// Parses an integer, accepting float spellings of integral values such as
/// `2.0` or `1e3`.
pub fn parse_int(text: &str) -> Option<i64> {
    if let Ok(value) = text.parse::<i64>() {
        return Some(value);
    }

    let value = text.parse::<f64>().ok()?;
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

/// A compiled `key = value` matcher for one key.
#[derive(Debug, Clone)]
pub struct FieldPattern {
    regex: Regex,
}

impl FieldPattern {
    pub fn new(key: &str) -> Self {
        Self::build(key, false)
    }

    /// Like [`FieldPattern::new`] but the key matches regardless of case.
    pub fn case_insensitive(key: &str) -> Self {
        Self::build(key, true)
    }

    fn build(key: &str, case_insensitive: bool) -> Self {
        let key = regex::escape(key);
        let pattern = format!(r#"(?s)(?:\[\s*["']{key}["']\s*\]|\b{key}\b){VALUE_PATTERN}"#);
        let regex = RegexBuilder::new(&pattern)
            .case_insensitive(case_insensitive)
            .build()
            .expect("escaped key always yields a valid pattern");
        Self { regex }
    }

    /// First match anywhere in `text`.
    pub fn find<'a>(&self, text: &'a str) -> Option<RawValue<'a>> {
        self.regex
            .captures(text)
            .and_then(|caps| raw_value_from(&caps))
    }

    /// First match at nesting depth 1 of `block`, i.e. a field that belongs
    /// to the block itself rather than to a table nested inside it.
    pub fn find_shallow<'a>(&self, block: &'a str) -> Option<RawValue<'a>> {
        let mut depth = DepthTracker::default();
        self.regex.captures_iter(block).find_map(|caps| {
            let start = caps.get(0)?.start();
            if depth.depth_at(block, start) == 1 {
                raw_value_from(&caps)
            } else {
                None
            }
        })
    }
}

fn raw_value_from<'a>(caps: &Captures<'a>) -> Option<RawValue<'a>> {
    if let Some(m) = caps.get(1).or_else(|| caps.get(2)) {
        Some(RawValue::Quoted(m.as_str()))
    } else if let Some(m) = caps.get(3) {
        Some(RawValue::Number(m.as_str()))
    } else if let Some(m) = caps.get(4) {
        Some(RawValue::Block(m.start()))
    } else {
        caps.get(5).map(|m| RawValue::Word(m.as_str()))
    }
}

/// Incremental brace depth counter for monotonically increasing offsets.
#[derive(Debug, Default)]
struct DepthTracker {
    scanned_to: usize,
    depth: isize,
}

impl DepthTracker {
    fn depth_at(&mut self, text: &str, offset: usize) -> isize {
        debug_assert!(offset >= self.scanned_to);
        for byte in &text.as_bytes()[self.scanned_to..offset] {
            match byte {
                b'{' => self.depth += 1,
                b'}' => self.depth -= 1,
                _ => {}
            }
        }
        self.scanned_to = offset;
        self.depth
    }
}

/// Finds the first `key = value` anywhere in `block`.
pub fn find_field<'a>(block: &'a str, key: &str) -> Option<RawValue<'a>> {
    FieldPattern::new(key).find(block)
}

/// Finds `key = value` belonging directly to `block`.
pub fn find_field_shallow<'a>(block: &'a str, key: &str) -> Option<RawValue<'a>> {
    FieldPattern::new(key).find_shallow(block)
}

/// Reads a string field, returning an empty string when it is absent.
pub fn read_string(block: &str, key: &str) -> String {
    match find_field(block, key) {
        Some(RawValue::Quoted(raw)) => unescape(raw),
        _ => String::new(),
    }
}

/// Reads an integer field, returning zero when it is absent or unparsable.
pub fn read_int(block: &str, key: &str) -> i64 {
    find_field(block, key)
        .and_then(|value| value.as_i64())
        .unwrap_or(0)
}

/// Reads a floating point field, returning zero when it is absent or unparsable.
pub fn read_float(block: &str, key: &str) -> f64 {
    find_field(block, key)
        .and_then(|value| value.as_f64())
        .unwrap_or(0.0)
}

/// Every `[n] = { ... }` entry directly inside `block`, in document order.
///
/// Entries whose block never closes are skipped.
pub fn indexed_blocks(block: &str) -> Vec<(i64, &str)> {
    let mut depth = DepthTracker::default();
    let mut out = Vec::new();
    for caps in INDEXED_BLOCK.captures_iter(block) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if depth.depth_at(block, whole.start()) != 1 {
            continue;
        }
        let Some(index) = caps.get(1).and_then(|m| m.as_str().parse::<i64>().ok()) else {
            continue;
        };
        // The match always ends with the opening brace.
        if let Some(entry) = extract_block(block, whole.end() - 1) {
            out.push((index, entry));
        }
    }
    out
}

/// Every quoted string value directly inside `block`. Bracketed keys are not
/// values and are skipped.
pub fn shallow_string_values(block: &str) -> Vec<String> {
    let mut depth = DepthTracker::default();
    let mut out = Vec::new();
    for caps in QUOTED_STRING.captures_iter(block) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        if caps.get(1).is_some() || depth.depth_at(block, whole.start()) != 1 {
            continue;
        }
        if let Some(value) = caps.get(2) {
            out.push(unescape(value.as_str()));
        }
    }
    out
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn extracts_outermost_block() {
        let text = r#"x = { a = { b = 1 }, c = { { } } } tail"#;
        let start = text.find('{').unwrap();
        let block = extract_block(text, start).unwrap();
        assert_eq!(block, "{ a = { b = 1 }, c = { { } } }");
        assert_eq!(block.len(), 30);
        assert_eq!(block.matches('{').count(), block.matches('}').count());
    }

    #[test]
    fn extracts_inner_block() {
        let text = "{ [1] = { 1, 2 }, [2] = {} }";
        let start = text.find("{ 1").unwrap();
        assert_eq!(extract_block(text, start), Some("{ 1, 2 }"));
    }

    #[test]
    fn truncated_block_is_none() {
        assert_eq!(extract_block("{ a = { b = 1 }", 0), None);
        assert_eq!(extract_block("{{{", 1), None);
    }

    #[test]
    fn start_must_be_an_open_brace() {
        assert_eq!(extract_block("a{}", 0), None);
        assert_eq!(extract_block("{}", 5), None);
        assert_eq!(extract_block("}", 0), None);
    }

    #[test]
    fn field_quoting_variants() {
        assert_eq!(read_string(r#"["name"] = "Alpha""#, "name"), "Alpha");
        assert_eq!(read_string(r#"['name']='Bravo'"#, "name"), "Bravo");
        assert_eq!(read_string("name = \"Charlie\"", "name"), "Charlie");
        assert_eq!(read_string("[ \"name\" ]\n  =\n  \"Delta\"", "name"), "Delta");
        assert_eq!(read_string(r#"["other"] = "x""#, "name"), "");
    }

    #[test]
    fn numeric_fields() {
        let block = r#"{ ["x"] = -1.25e+5, ["unitId"] = 42, ["alt"] = 2000.0, ["speed"] = .5 }"#;
        assert_eq!(read_float(block, "x"), -125000.0);
        assert_eq!(read_int(block, "unitId"), 42);
        assert_eq!(read_int(block, "alt"), 2000);
        assert_eq!(read_float(block, "speed"), 0.5);
        assert_eq!(read_float(block, "heading"), 0.0);
    }

    #[test]
    fn escaped_quotes_stay_inside_value() {
        let block = r#"["task"] = "say \"hi\"", ["name"] = "n""#;
        assert_eq!(read_string(block, "task"), "say \"hi\"");
        assert_eq!(read_string(block, "name"), "n");
    }

    #[test]
    fn first_match_anywhere_versus_shallow() {
        let block = r#"{ ["callsign"] = { ["name"] = "Enfield11" }, ["name"] = "Pilot" }"#;
        assert_eq!(find_field(block, "name"), Some(RawValue::Quoted("Enfield11")));
        assert_eq!(find_field_shallow(block, "name"), Some(RawValue::Quoted("Pilot")));
    }

    #[test]
    fn block_values_report_offset() {
        let block = r#"{ ["route"] = { ["points"] = {} } }"#;
        let Some(RawValue::Block(offset)) = find_field_shallow(block, "route") else {
            panic!("expected block value");
        };
        assert_eq!(extract_block(block, offset), Some(r#"{ ["points"] = {} }"#));
    }

    #[test]
    fn case_insensitive_pattern() {
        let pattern = FieldPattern::case_insensitive("theatre");
        assert_eq!(
            pattern.find(r#"    ["Theatre"] = "Syria","#),
            Some(RawValue::Quoted("Syria"))
        );
        assert_eq!(FieldPattern::new("theatre").find(r#"["Theatre"] = "Syria""#), None);
    }

    #[test]
    fn indexed_blocks_skip_nested_entries() {
        let block = r#"{
            [1] = { ["type"] = "F-16C", ["payload"] = { ["pylons"] = { [1] = { ["CLSID"] = "x" } } } },
            [2] = { ["type"] = "F-15C" },
            [3] = { ["type"] = "broken""#;
        let entries = indexed_blocks(block);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, 1);
        assert_eq!(read_string(entries[0].1, "type"), "F-16C");
        assert_eq!(entries[1].0, 2);
    }

    #[test]
    fn string_values_ignore_keys_and_nesting() {
        let block = r#"{ ["A-10C"] = "A-10C", [2] = "F-14", ["x"] = { [1] = "nested" } }"#;
        assert_eq!(shallow_string_values(block), vec!["A-10C", "F-14"]);
    }

    #[test]
    fn integral_floats_parse_as_ints() {
        assert_eq!(parse_int("7"), Some(7));
        assert_eq!(parse_int("1e3"), Some(1000));
        assert_eq!(parse_int("2.5"), None);
        assert_eq!(parse_int("abc"), None);
    }
}
