use variantly::Variantly;

/// A table key. Positional entries are stored with the implicit index they
/// would receive at load time.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Key {
    Str(String),
    Index(i64),
}

impl Key {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Key::Str(s) => Some(s),
            Key::Index(_) => None,
        }
    }

    pub fn as_index(&self) -> Option<i64> {
        match self {
            Key::Index(i) => Some(*i),
            Key::Str(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Variantly)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Value {
    Nil,
    Bool(bool),
    Number(f64),
    Str(String),
    Table(Table),
}

/// An ordered table. Entries stay in document order and lookups resolve
/// duplicate keys to the last assignment.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Table {
    entries: Vec<(Key, Value)>,
}

impl Table {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: Key, value: Value) {
        self.entries.push((key, value));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[(Key, Value)] {
        &self.entries
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    pub fn get_index(&self, index: i64) -> Option<&Value> {
        self.entries
            .iter()
            .rev()
            .find(|(k, _)| k.as_index() == Some(index))
            .map(|(_, v)| v)
    }

    pub fn table(&self, key: &str) -> Option<&Table> {
        self.get(key).and_then(Value::table_ref)
    }

    /// All integer-keyed entries sorted by index, one per index.
    pub fn indexed(&self) -> Vec<(i64, &Value)> {
        let mut out: Vec<(i64, &Value)> = Vec::new();
        for (key, value) in &self.entries {
            let Some(index) = key.as_index() else {
                continue;
            };
            match out.iter_mut().find(|(i, _)| *i == index) {
                Some(slot) => slot.1 = value,
                None => out.push((index, value)),
            }
        }
        out.sort_by_key(|(index, _)| *index);
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lookup_is_last_wins() {
        let mut table = Table::new();
        table.push(Key::Str("name".into()), Value::Str("first".into()));
        table.push(Key::Index(1), Value::Number(1.0));
        table.push(Key::Str("name".into()), Value::Str("second".into()));
        assert_eq!(
            table.get("name").and_then(Value::str_ref).map(String::as_str),
            Some("second")
        );
        assert_eq!(table.get_index(1), Some(&Value::Number(1.0)));
        assert_eq!(table.entries().len(), 3);
    }

    #[test]
    fn indexed_entries_sort_and_dedup() {
        let mut table = Table::new();
        table.push(Key::Index(3), Value::Number(3.0));
        table.push(Key::Index(1), Value::Number(1.0));
        table.push(Key::Str("x".into()), Value::Nil);
        table.push(Key::Index(1), Value::Number(10.0));
        let indexed = table.indexed();
        assert_eq!(indexed.len(), 2);
        assert_eq!(indexed[0], (1, &Value::Number(10.0)));
        assert_eq!(indexed[1].0, 3);
    }
}
