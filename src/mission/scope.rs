use crate::dictionary::unescape;
use crate::extracted::Extracted;
use crate::lua::{Table, Value};
use crate::scan::{self, RawValue};

/// Raw text recorded for a field that holds a table where a scalar belongs.
const TABLE_PLACEHOLDER: &str = "{ ... }";

/// Field access on one table of a mission.
///
/// Reads never leave the table they are called on: a key that only exists
/// in a nested table is absent here. Scalars are converted leniently, so a
/// quoted number reads as a number and a number reads as a string.
pub trait Scope: Sized {
    fn str_field(&self, key: &str) -> Extracted<String>;

    fn num_field(&self, key: &str) -> Extracted<f64>;

    fn int_field(&self, key: &str) -> Extracted<i64>;

    /// The nested table stored under `key`.
    fn child(&self, key: &str) -> Option<Self>;

    /// Tables stored under integer keys, in index order.
    fn indexed_children(&self) -> Vec<(i64, Self)>;

    /// Every string value held directly by this table, in document order.
    fn string_values(&self) -> Vec<String>;
}

/// Formats a number the way it is written in mission files: integral values
/// without a fractional part.
pub fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        n.to_string()
    }
}

fn parse_number(text: &str) -> Extracted<f64> {
    match text.trim().parse::<f64>() {
        Ok(n) => Extracted::Found(n),
        Err(_) => Extracted::Malformed(text.to_string()),
    }
}

fn parse_integer(text: &str) -> Extracted<i64> {
    match scan::parse_int(text.trim()) {
        Some(n) => Extracted::Found(n),
        None => Extracted::Malformed(text.to_string()),
    }
}

/// A [`Scope`] over a table read by [`crate::lua::parse_document`].
#[derive(Debug, Clone, Copy)]
pub struct TableScope<'a>(&'a Table);

impl<'a> TableScope<'a> {
    pub fn new(table: &'a Table) -> Self {
        Self(table)
    }

    pub fn table(&self) -> &'a Table {
        self.0
    }

    fn value(&self, key: &str) -> Option<&'a Value> {
        self.0.get(key).filter(|v| !v.is_nil())
    }
}

impl Scope for TableScope<'_> {
    fn str_field(&self, key: &str) -> Extracted<String> {
        match self.value(key) {
            None | Some(Value::Nil) => Extracted::Defaulted,
            Some(Value::Str(s)) => Extracted::Found(s.clone()),
            Some(Value::Number(n)) => Extracted::Found(format_number(*n)),
            Some(Value::Bool(b)) => Extracted::Found(b.to_string()),
            Some(Value::Table(_)) => Extracted::Malformed(TABLE_PLACEHOLDER.to_string()),
        }
    }

    fn num_field(&self, key: &str) -> Extracted<f64> {
        match self.value(key) {
            None | Some(Value::Nil) => Extracted::Defaulted,
            Some(Value::Number(n)) => Extracted::Found(*n),
            Some(Value::Str(s)) => parse_number(s),
            Some(Value::Bool(b)) => Extracted::Malformed(b.to_string()),
            Some(Value::Table(_)) => Extracted::Malformed(TABLE_PLACEHOLDER.to_string()),
        }
    }

    fn int_field(&self, key: &str) -> Extracted<i64> {
        match self.value(key) {
            None | Some(Value::Nil) => Extracted::Defaulted,
            Some(Value::Number(n)) => parse_integer(&n.to_string()),
            Some(Value::Str(s)) => parse_integer(s),
            Some(Value::Bool(b)) => Extracted::Malformed(b.to_string()),
            Some(Value::Table(_)) => Extracted::Malformed(TABLE_PLACEHOLDER.to_string()),
        }
    }

    fn child(&self, key: &str) -> Option<Self> {
        self.0.table(key).map(TableScope)
    }

    fn indexed_children(&self) -> Vec<(i64, Self)> {
        self.0
            .indexed()
            .into_iter()
            .filter_map(|(index, value)| value.table_ref().map(|t| (index, TableScope(t))))
            .collect()
    }

    fn string_values(&self) -> Vec<String> {
        self.0
            .entries()
            .iter()
            .filter_map(|(_, value)| value.str_ref().cloned())
            .collect()
    }
}

/// A [`Scope`] over the raw text of one brace-delimited block.
///
/// Only matches at the first nesting level of the block count as its
/// fields. A block that never closes extends to the end of the text.
#[derive(Debug, Clone, Copy)]
pub struct BlockScope<'a> {
    text: &'a str,
}

impl<'a> BlockScope<'a> {
    /// `text` must start with the block's opening brace.
    pub fn new(text: &'a str) -> Self {
        Self { text }
    }

    /// Scope over a block starting at `start`, or over the rest of `text`
    /// when the block is truncated.
    fn at(text: &'a str, start: usize) -> Option<Self> {
        match scan::extract_block(text, start) {
            Some(block) => Some(Self::new(block)),
            None => text.get(start..).map(Self::new),
        }
    }

    /// The mission table of a whole mission document: the block assigned to
    /// `mission`, or the first block in the text.
    pub fn mission_root(text: &'a str) -> Self {
        let start = match scan::find_field(text, "mission") {
            Some(RawValue::Block(start)) => Some(start),
            _ => text.find('{'),
        };
        start
            .and_then(|start| Self::at(text, start))
            .unwrap_or(Self::new("{}"))
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    fn raw(&self, key: &str) -> Option<RawValue<'a>> {
        match scan::find_field_shallow(self.text, key) {
            Some(RawValue::Word("nil")) | None => None,
            other => other,
        }
    }
}

impl Scope for BlockScope<'_> {
    fn str_field(&self, key: &str) -> Extracted<String> {
        match self.raw(key) {
            None => Extracted::Defaulted,
            Some(RawValue::Quoted(raw)) => Extracted::Found(unescape(raw)),
            Some(RawValue::Number(raw)) => match raw.parse::<f64>() {
                Ok(n) => Extracted::Found(format_number(n)),
                Err(_) => Extracted::Found(raw.to_string()),
            },
            Some(RawValue::Word(word @ ("true" | "false"))) => Extracted::Found(word.to_string()),
            Some(RawValue::Word(word)) => Extracted::Malformed(word.to_string()),
            Some(RawValue::Block(_)) => Extracted::Malformed(TABLE_PLACEHOLDER.to_string()),
        }
    }

    fn num_field(&self, key: &str) -> Extracted<f64> {
        match self.raw(key) {
            None => Extracted::Defaulted,
            Some(RawValue::Number(raw)) => parse_number(raw),
            Some(RawValue::Quoted(raw)) => parse_number(&unescape(raw)),
            Some(RawValue::Word(word)) => Extracted::Malformed(word.to_string()),
            Some(RawValue::Block(_)) => Extracted::Malformed(TABLE_PLACEHOLDER.to_string()),
        }
    }

    fn int_field(&self, key: &str) -> Extracted<i64> {
        match self.raw(key) {
            None => Extracted::Defaulted,
            Some(RawValue::Number(raw)) => parse_integer(raw),
            Some(RawValue::Quoted(raw)) => parse_integer(&unescape(raw)),
            Some(RawValue::Word(word)) => Extracted::Malformed(word.to_string()),
            Some(RawValue::Block(_)) => Extracted::Malformed(TABLE_PLACEHOLDER.to_string()),
        }
    }

    fn child(&self, key: &str) -> Option<Self> {
        match self.raw(key)? {
            RawValue::Block(start) => Self::at(self.text, start),
            _ => None,
        }
    }

    fn indexed_children(&self) -> Vec<(i64, Self)> {
        let mut children: Vec<_> = scan::indexed_blocks(self.text)
            .into_iter()
            .map(|(index, block)| (index, Self::new(block)))
            .collect();
        children.sort_by_key(|(index, _)| *index);
        children
    }

    fn string_values(&self) -> Vec<String> {
        scan::shallow_string_values(self.text)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::lua::parse_document;

    const UNIT: &str = r#"{
        ["type"] = "F-16C_50",
        ["unitId"] = "12",
        ["x"] = -281000.5,
        ["y"] = "oops",
        ["skill"] = "Client",
        ["callsign"] = { [1] = 1, ["name"] = "Enfield11" },
        ["name"] = "Viper 1",
        ["onboard_num"] = 10,
        ["payload"] = { ["pylons"] = { [2] = { ["CLSID"] = "x" }, [1] = { ["CLSID"] = "y" } } },
    }"#;

    fn check_unit<S: Scope>(scope: &S) {
        assert_eq!(scope.str_field("type").into_found().as_deref(), Some("F-16C_50"));
        assert_eq!(scope.str_field("name").into_found().as_deref(), Some("Viper 1"));
        assert_eq!(scope.int_field("unitId"), Extracted::Found(12));
        assert_eq!(scope.num_field("x"), Extracted::Found(-281000.5));
        assert_eq!(scope.num_field("y"), Extracted::Malformed("oops".to_string()));
        assert_eq!(scope.num_field("alt"), Extracted::Defaulted);
        assert_eq!(scope.str_field("onboard_num").into_found().as_deref(), Some("10"));
        assert!(scope.str_field("callsign").is_malformed());

        let callsign = scope.child("callsign").unwrap();
        assert_eq!(callsign.str_field("name").into_found().as_deref(), Some("Enfield11"));
        assert!(scope.child("type").is_none());

        let pylons = scope.child("payload").and_then(|p| p.child("pylons")).unwrap();
        let indices: Vec<_> = pylons.indexed_children().into_iter().map(|(i, _)| i).collect();
        assert_eq!(indices, [1, 2]);
        assert!(scope.indexed_children().is_empty());
    }

    #[test]
    fn tree_scope_fields() {
        let doc = parse_document(UNIT).unwrap();
        check_unit(&TableScope::new(doc.root()));
    }

    #[test]
    fn block_scope_fields() {
        check_unit(&BlockScope::new(UNIT));
    }

    #[test]
    fn string_values_agree() {
        let text = r#"{ ["A-10C"] = "A-10C", ["F-14"] = "F-14", ["n"] = 3 }"#;
        let doc = parse_document(text).unwrap();
        let expected = vec!["A-10C".to_string(), "F-14".to_string()];
        assert_eq!(TableScope::new(doc.root()).string_values(), expected);
        assert_eq!(BlockScope::new(text).string_values(), expected);
    }

    #[test]
    fn mission_root_of_truncated_text() {
        let text = "mission = \n{\n    [\"sortie\"] = \"Cut\",\n    [\"weather\"] = { [\"qnh\"] = 760 ";
        let root = BlockScope::mission_root(text);
        assert_eq!(root.str_field("sortie").into_found().as_deref(), Some("Cut"));
        let weather = root.child("weather").unwrap();
        assert_eq!(weather.num_field("qnh"), Extracted::Found(760.0));
    }

    #[test]
    fn integral_formatting() {
        assert_eq!(format_number(101.0), "101");
        assert_eq!(format_number(-3.25), "-3.25");
    }
}
