//! Shared SQL building blocks: bind values, rendered fragments and the
//! placeholder dialect each backend speaks.

use std::fmt;

/// One positional bind value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    Text(String),
    Integer(i64),
    Null,
}

impl fmt::Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text:?}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Null => f.write_str("NULL"),
        }
    }
}

/// Placeholder syntax of the target store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// `$1`, `$2`, ...
    Postgres,
    /// `?1`, `?2`, ...
    Sqlite,
}

impl Dialect {
    /// Renders the 1-based positional placeholder `position`.
    pub fn placeholder(self, position: usize) -> String {
        match self {
            Self::Postgres => format!("${position}"),
            Self::Sqlite => format!("?{position}"),
        }
    }

    /// Marker character that starts every placeholder in this dialect.
    pub fn placeholder_marker(self) -> char {
        match self {
            Self::Postgres => '$',
            Self::Sqlite => '?',
        }
    }
}

/// SQL text plus the values bound to its placeholders, in placeholder order.
///
/// Values never appear in `text`; only identifiers resolved through the
/// column registry and placeholders do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlFragment {
    pub text: String,
    pub binds: Vec<SqlValue>,
}

impl SqlFragment {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

/// Wraps a search term for a substring `LIKE` match.
pub(crate) fn contains_pattern(term: &str) -> SqlValue {
    SqlValue::Text(format!("%{term}%"))
}

/// Wraps a search term for a prefix `LIKE` match.
pub(crate) fn prefix_pattern(term: &str) -> SqlValue {
    SqlValue::Text(format!("{term}%"))
}

/// Returns true when `ident` is safe to splice into SQL text unquoted.
pub(crate) fn is_plain_identifier(ident: &str) -> bool {
    let mut chars = ident.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_ascii_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
}
