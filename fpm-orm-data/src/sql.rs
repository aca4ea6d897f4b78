//! Dialect-aware SQL text helpers shared by the statement builders.
//!
//! Statements are composed with `?` placeholders everywhere and rewritten to
//! the backend's placeholder style once, in [`Statement::finalize`].

use crate::error::{DataError, DataResult};
use crate::value::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// SQLite-style `?` placeholders.
    Sqlite,
    /// MySQL-style `?` placeholders with backtick quoting.
    MySql,
    /// Postgres-style `$1, $2, ...` placeholders.
    Postgres,
}

impl Dialect {
    fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite | Dialect::MySql => "?".to_string(),
        }
    }

    pub fn quote_char(self) -> char {
        match self {
            Dialect::MySql => '`',
            Dialect::Sqlite | Dialect::Postgres => '"',
        }
    }

    /// Whether `INSERT ... RETURNING` is available.
    pub fn supports_returning(self) -> bool {
        !matches!(self, Dialect::MySql)
    }

    /// The LIMIT value meaning "no limit", for dialects that cannot express
    /// an OFFSET without one.
    pub(crate) fn unbounded_limit(self) -> Option<&'static str> {
        match self {
            Dialect::Sqlite => Some("-1"),
            Dialect::MySql => Some("18446744073709551615"),
            Dialect::Postgres => None,
        }
    }

    /// SQL expression turning a timestamp column into epoch milliseconds.
    pub(crate) fn epoch_millis(self, column: &str) -> String {
        match self {
            Dialect::Postgres => format!("(floor(extract(epoch from {column}) * 1000))::bigint"),
            Dialect::Sqlite => {
                format!("CAST((julianday({column}) - 2440587.5) * 86400000 AS INTEGER)")
            }
            Dialect::MySql => format!("CAST(UNIX_TIMESTAMP({column}) * 1000 AS SIGNED)"),
        }
    }
}

/// A SQL string together with its positional bind values.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub args: Vec<Value>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            args,
        }
    }

    /// Rewrite `?` placeholders into the dialect's style.
    pub fn finalize(mut self, dialect: Dialect) -> Self {
        self.sql = bind_placeholders(&self.sql, dialect);
        self
    }
}

/// Byte offsets of every `?` placeholder outside quoted literals and
/// quoted identifiers.
fn placeholder_positions(sql: &str) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut quote: Option<char> = None;
    for (idx, c) in sql.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                '?' => positions.push(idx),
                _ => {}
            },
        }
    }
    positions
}

/// Number of bind placeholders a condition fragment expects.
pub fn count_placeholders(sql: &str) -> usize {
    placeholder_positions(sql).len()
}

/// Rewrite `?` placeholders to the dialect's style (`$n` for Postgres).
pub fn bind_placeholders(sql: &str, dialect: Dialect) -> String {
    if !matches!(dialect, Dialect::Postgres) {
        return sql.to_string();
    }
    let mut out = String::with_capacity(sql.len() + 8);
    let mut last = 0;
    for (n, pos) in placeholder_positions(sql).into_iter().enumerate() {
        out.push_str(&sql[last..pos]);
        out.push_str(&dialect.placeholder(n + 1));
        last = pos + 1;
    }
    out.push_str(&sql[last..]);
    out
}

/// Validate an identifier and quote it for the dialect.
pub fn checked_identifier(
    ident: &str,
    allow_star: bool,
    kind: &'static str,
    dialect: Dialect,
) -> DataResult<String> {
    if !is_valid_identifier(ident, allow_star) {
        return Err(DataError::Validation(format!(
            "Invalid {kind} identifier: {ident}"
        )));
    }
    Ok(quote_identifier(ident, dialect, allow_star))
}

pub fn is_valid_identifier(ident: &str, allow_star: bool) -> bool {
    if ident.is_empty() {
        return false;
    }
    let parts: Vec<&str> = ident.split('.').collect();
    for (idx, part) in parts.iter().enumerate() {
        if allow_star && *part == "*" {
            return idx + 1 == parts.len();
        }
        if !is_valid_segment(part) {
            return false;
        }
    }
    true
}

fn is_valid_segment(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    for c in chars {
        if !(c.is_ascii_alphanumeric() || c == '_') {
            return false;
        }
    }
    true
}

fn quote_identifier(ident: &str, dialect: Dialect, allow_star: bool) -> String {
    let quote = dialect.quote_char();
    let parts: Vec<&str> = ident.split('.').collect();
    let last_idx = parts.len().saturating_sub(1);
    parts
        .into_iter()
        .enumerate()
        .map(|(idx, part)| {
            if allow_star && part == "*" && idx == last_idx {
                part.to_string()
            } else {
                format!("{quote}{part}{quote}")
            }
        })
        .collect::<Vec<_>>()
        .join(".")
}
