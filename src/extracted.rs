use std::fmt;

/// The outcome of reading a single field out of a mission document.
///
/// This is conceptually similar to `Option<T>`, but it keeps apart the two
/// ways a field can fail to produce a value: it was not there at all
/// ([`Extracted::Defaulted`]), or it was there with something we could not
/// interpret ([`Extracted::Malformed`]). The raw text is preserved in the
/// latter case so callers can surface it as a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Extracted<T> {
    Found(T),
    Defaulted,
    Malformed(String),
}

impl<T> Extracted<T> {
    pub fn found(&self) -> Option<&T> {
        match self {
            Extracted::Found(t) => Some(t),
            _ => None,
        }
    }

    pub fn into_found(self) -> Option<T> {
        match self {
            Extracted::Found(t) => Some(t),
            _ => None,
        }
    }

    pub fn malformed(&self) -> Option<&str> {
        match self {
            Extracted::Malformed(raw) => Some(raw),
            _ => None,
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Extracted::Found(_))
    }

    pub fn is_defaulted(&self) -> bool {
        matches!(self, Extracted::Defaulted)
    }

    pub fn is_malformed(&self) -> bool {
        matches!(self, Extracted::Malformed(_))
    }

    pub fn unwrap_or(self, default: T) -> T {
        match self {
            Extracted::Found(t) => t,
            _ => default,
        }
    }

    pub fn unwrap_or_else<F: FnOnce() -> T>(self, f: F) -> T {
        match self {
            Extracted::Found(t) => t,
            _ => f(),
        }
    }

    pub fn unwrap_or_default(self) -> T
    where
        T: Default,
    {
        self.unwrap_or_else(T::default)
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Extracted<U> {
        match self {
            Extracted::Found(t) => Extracted::Found(f(t)),
            Extracted::Defaulted => Extracted::Defaulted,
            Extracted::Malformed(raw) => Extracted::Malformed(raw),
        }
    }

    pub fn and_then<U, F: FnOnce(T) -> Extracted<U>>(self, f: F) -> Extracted<U> {
        match self {
            Extracted::Found(t) => f(t),
            Extracted::Defaulted => Extracted::Defaulted,
            Extracted::Malformed(raw) => Extracted::Malformed(raw),
        }
    }

    /// Try an alternative only when this field was absent. A malformed value
    /// is kept so the problem is not hidden by a fallback key.
    pub fn or_else<F: FnOnce() -> Extracted<T>>(self, f: F) -> Extracted<T> {
        match self {
            Extracted::Defaulted => f(),
            other => other,
        }
    }

    pub fn as_ref(&self) -> Extracted<&T> {
        match self {
            Extracted::Found(t) => Extracted::Found(t),
            Extracted::Defaulted => Extracted::Defaulted,
            Extracted::Malformed(raw) => Extracted::Malformed(raw.clone()),
        }
    }
}

impl<T> From<Option<T>> for Extracted<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(t) => Extracted::Found(t),
            None => Extracted::Defaulted,
        }
    }
}

impl<T: fmt::Display> fmt::Display for Extracted<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Extracted::Found(t) => t.fmt(f),
            Extracted::Defaulted => Ok(()),
            Extracted::Malformed(raw) => raw.fmt(f),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn or_else_only_replaces_absent() {
        let absent: Extracted<i64> = Extracted::Defaulted;
        assert_eq!(absent.or_else(|| Extracted::Found(3)), Extracted::Found(3));

        let bad: Extracted<i64> = Extracted::Malformed("abc".to_string());
        assert!(bad.or_else(|| Extracted::Found(3)).is_malformed());
    }

    #[test]
    fn defaults() {
        assert_eq!(Extracted::<String>::Defaulted.unwrap_or_default(), "");
        assert_eq!(Extracted::<f64>::Malformed("x".into()).unwrap_or(1.5), 1.5);
        assert_eq!(Extracted::Found(2).map(|v| v * 2).into_found(), Some(4));
    }
}
