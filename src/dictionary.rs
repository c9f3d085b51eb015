//! Localization dictionary lookups.
//!
//! Mission text fields frequently hold an indirection key such as
//! `DictKey_descriptionText_1` instead of the text itself. The text lives in
//! the archive's `l10n/DEFAULT/dictionary` entry as a flat table of
//! `["DictKey_..."] = "..."` assignments.

use std::collections::HashMap;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;

/// Prefix marking a value that must be looked up in the dictionary.
pub const DICT_KEY_PREFIX: &str = "DictKey_";

static ENTRY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)\[\s*"((?:[^"\\]|\\.)*)"\s*\]\s*=\s*"((?:[^"\\]|\\.)*)""#)
        .expect("valid dictionary entry regex")
});

/// Un-escapes a raw dictionary value.
///
/// Substitutions are applied in a fixed order: line continuations first,
/// then `\n`, then `\"`, and literal backslashes last.
pub fn unescape(raw: &str) -> String {
    raw.replace("\\\r", "\r")
        .replace("\\\n", "\n")
        .replace("\\n", "\n")
        .replace("\\\"", "\"")
        .replace("\\\\", "\\")
}

/// Escapes text for storage as a dictionary value. Line breaks are written
/// as line continuations, the way the mission editor saves them.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\\n"),
            '\r' => {}
            c => out.push(c),
        }
    }
    out
}

fn value_pattern(key: &str) -> Regex {
    let pattern = format!(
        r#"(?s)\[\s*"{}"\s*\]\s*=\s*"((?:[^"\\]|\\.)*)""#,
        regex::escape(key)
    );
    Regex::new(&pattern).expect("escaped key always yields a valid pattern")
}

/// Byte range of the raw (still escaped) value stored under `key`.
pub fn value_range(dictionary_text: &str, key: &str) -> Option<Range<usize>> {
    value_pattern(key)
        .captures(dictionary_text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.range())
}

/// Looks up `key` in raw dictionary text and returns the un-escaped value.
pub fn resolve(dictionary_text: &str, key: &str) -> Option<String> {
    if dictionary_text.is_empty() {
        return None;
    }
    value_range(dictionary_text, key).map(|range| unescape(&dictionary_text[range]))
}

/// Replaces the value stored under `key` with `new_text`, returning the
/// rewritten dictionary. `None` when the key is not present.
pub fn replace_value(dictionary_text: &str, key: &str, new_text: &str) -> Option<String> {
    let range = value_range(dictionary_text, key)?;
    let escaped = escape(new_text);
    let mut out = String::with_capacity(dictionary_text.len() + escaped.len());
    out.push_str(&dictionary_text[..range.start]);
    out.push_str(&escaped);
    out.push_str(&dictionary_text[range.end..]);
    Some(out)
}

/// True when `value` is an indirection key rather than display text.
pub fn is_dict_key(value: &str) -> bool {
    value.starts_with(DICT_KEY_PREFIX)
}

/// An indexed dictionary entry.
///
/// Every entry is read once up front; the first assignment of a key wins,
/// matching [`resolve`].
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    entries: HashMap<String, String>,
}

impl Dictionary {
    pub fn new(dictionary_text: &str) -> Self {
        let mut entries = HashMap::new();
        for caps in ENTRY.captures_iter(dictionary_text) {
            let (Some(key), Some(value)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            entries
                .entry(key.as_str().to_string())
                .or_insert_with(|| unescape(value.as_str()));
        }
        Self { entries }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn resolve(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|s| s.as_str())
    }

    /// The text to show for a raw field value. Indirection keys are resolved
    /// and fall back to the key itself when the dictionary has no entry.
    pub fn display(&self, raw: &str) -> String {
        if is_dict_key(raw) {
            self.resolve(raw).unwrap_or(raw).to_string()
        } else {
            raw.to_string()
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const DICTIONARY: &str = "dictionary = \n{\n    [\"DictKey_descriptionText_1\"] = \"Fly \\\"escaped\\\" north\\\nthen land.\",\n    [\"DictKey_sortie_2\"] = \"Operation Test\",\n    [\"DictKey_empty_3\"] = \"\",\n} -- end of dictionary\n";

    #[test]
    fn resolves_escapes_and_continuations() {
        let text = resolve(DICTIONARY, "DictKey_descriptionText_1").unwrap();
        assert_eq!(text, "Fly \"escaped\" north\nthen land.");
        assert!(!text.contains('\\'));
    }

    #[test]
    fn missing_key_is_none() {
        assert_eq!(resolve(DICTIONARY, "DictKey_nope"), None);
        assert_eq!(resolve("", "DictKey_sortie_2"), None);
        assert_eq!(resolve(DICTIONARY, "DictKey_empty_3").as_deref(), Some(""));
    }

    #[test]
    fn unescape_order() {
        assert_eq!(unescape("a\\nb"), "a\nb");
        assert_eq!(unescape("a\\\\b"), "a\\b");
        assert_eq!(unescape("line\\\r\nnext"), "line\r\nnext");
    }

    #[test]
    fn indexed_dictionary_matches_free_function() {
        let dictionary = Dictionary::new(DICTIONARY);
        assert_eq!(dictionary.len(), 3);
        for key in ["DictKey_descriptionText_1", "DictKey_sortie_2", "DictKey_empty_3"] {
            assert_eq!(
                dictionary.resolve(key).map(str::to_string),
                resolve(DICTIONARY, key)
            );
        }
    }

    #[test]
    fn display_falls_back_to_key() {
        let dictionary = Dictionary::new(DICTIONARY);
        assert_eq!(dictionary.display("DictKey_sortie_2"), "Operation Test");
        assert_eq!(dictionary.display("DictKey_missing_9"), "DictKey_missing_9");
        assert_eq!(dictionary.display("Plain text"), "Plain text");
    }

    #[test]
    fn replaced_value_reads_back() {
        let new_text = "Two\nlines with \"quotes\" and a \\ slash";
        let rewritten = replace_value(DICTIONARY, "DictKey_sortie_2", new_text).unwrap();
        assert_eq!(resolve(&rewritten, "DictKey_sortie_2").as_deref(), Some(new_text));
        assert_eq!(
            resolve(&rewritten, "DictKey_descriptionText_1"),
            resolve(DICTIONARY, "DictKey_descriptionText_1")
        );
        assert_eq!(replace_value(DICTIONARY, "DictKey_missing", "x"), None);
    }
}
