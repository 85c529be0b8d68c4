//! Column schema of an existing table, recovered from its `CREATE TABLE` text.
//!
//! The parser is deliberately loose: it only needs the insertable columns and
//! their storage class, not a faithful model of the statement. Entries that
//! do not describe an insertable column are dropped:
//!
//! - `INTEGER PRIMARY KEY` / `AUTOINCREMENT` columns (row id aliases),
//! - the `FOREIGN KEY` clause and everything after it,
//! - table constraints such as `UNIQUE(a, b)`, `PRIMARY KEY (a)`, `CHECK (...)`.

use std::{fmt, sync::OnceLock};

use log::{debug, error};
use regex::Regex;
use serde::Serialize;

use crate::{
    error::{Error, Result},
    value::SqlType,
};

const TABLE_CONSTRAINT_KEYWORDS: &[&str] = &["unique", "primary", "constraint", "check", "foreign"];

/// Tokens that end the declared type and start a column constraint.
const COLUMN_CONSTRAINT_KEYWORDS: &[&str] = &[
    "not",
    "null",
    "default",
    "primary",
    "unique",
    "check",
    "references",
    "collate",
    "constraint",
    "generated",
    "as",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SchemaColumn {
    pub name: String,
    pub sql_type: SqlType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TableSchema {
    pub columns: Vec<SchemaColumn>,
}

impl TableSchema {
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn types(&self) -> impl Iterator<Item = SqlType> + '_ {
        self.columns.iter().map(|c| c.sql_type)
    }
}

impl fmt::Display for TableSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered = self
            .columns
            .iter()
            .map(|c| format!("{} {}", c.name, c.sql_type))
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "({rendered})")
    }
}

fn create_table_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r#"(?is)CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?[`"\[]?[A-Z0-9_.-]+[`"\]]?\s*\((.*)\)"#,
        )
        .expect("CREATE TABLE pattern is a valid regex")
    })
}

/// Extracts the insertable `(name, type)` columns of a `CREATE TABLE` statement.
///
/// Declared types map by substring: anything containing `int` is an integer,
/// then `real`, `float` or `double` is a real, everything else is text.
pub fn parse_schema(statement: &str) -> Result<TableSchema> {
    let Some(body) = create_table_pattern()
        .captures(statement)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
    else {
        error!("Schema parse failed, no cols between (): {statement}");
        return Err(Error::Parse(format!(
            "no column list found in '{}'",
            statement.trim()
        )));
    };

    let body = match body.to_ascii_lowercase().find("foreign key") {
        Some(pos) => &body[..pos],
        None => body,
    };

    let mut columns = Vec::new();
    for entry in split_top_level(body) {
        let entry = entry.trim();
        if entry.is_empty() || is_structural(entry) {
            debug!("Skipping structural schema entry '{entry}'");
            continue;
        }
        let mut tokens = entry.split_whitespace();
        let Some(name) = tokens.next() else {
            continue;
        };
        let type_tokens = tokens
            .map(|t| t.to_ascii_lowercase())
            .take_while(|t| !COLUMN_CONSTRAINT_KEYWORDS.contains(&t.as_str()))
            .collect::<Vec<_>>();
        columns.push(SchemaColumn {
            name: unquote(name).to_string(),
            sql_type: map_declared_type(&type_tokens),
        });
    }
    Ok(TableSchema { columns })
}

/// Storage class for the lowercase declared type tokens of one column.
pub fn map_declared_type<S: AsRef<str>>(tokens: &[S]) -> SqlType {
    let joined = tokens
        .iter()
        .map(|t| t.as_ref())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.contains("int") {
        SqlType::Integer
    } else if ["real", "float", "double"].iter().any(|t| joined.contains(t)) {
        SqlType::Real
    } else {
        SqlType::Text
    }
}

fn is_structural(entry: &str) -> bool {
    let lowered = entry.to_ascii_lowercase();
    let squashed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    if squashed.contains("integer primary key")
        || squashed.contains("autoincrement")
        || squashed.contains("foreign key")
        || squashed.contains("unique(")
    {
        return true;
    }
    let first = squashed
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default();
    TABLE_CONSTRAINT_KEYWORDS.contains(&first)
}

/// Splits on commas that are not nested in parentheses or quotes.
fn split_top_level(body: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0usize;
    for (idx, ch) in body.char_indices() {
        match (quote, ch) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(ch),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                parts.push(&body[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    parts.push(&body[start..]);
    parts
}

fn unquote(name: &str) -> &str {
    name.trim_matches(|c| matches!(c, '"' | '`' | '[' | ']'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_declared_type_checks_integer_first() {
        assert_eq!(map_declared_type(&["bigint"]), SqlType::Integer);
        assert_eq!(map_declared_type(&["double", "precision"]), SqlType::Real);
        assert_eq!(map_declared_type(&["float(10)"]), SqlType::Real);
        assert_eq!(map_declared_type(&["varchar(20)"]), SqlType::Text);
        assert_eq!(map_declared_type::<&str>(&[]), SqlType::Text);
    }

    #[test]
    fn split_top_level_ignores_nested_commas() {
        let parts = split_top_level("a DECIMAL(10, 2), b TEXT DEFAULT 'x,y', UNIQUE(a, b)");
        assert_eq!(
            parts,
            vec!["a DECIMAL(10, 2)", " b TEXT DEFAULT 'x,y'", " UNIQUE(a, b)"]
        );
    }

    #[test]
    fn constraint_tokens_do_not_leak_into_type() {
        let schema = parse_schema("CREATE TABLE t(code TEXT DEFAULT 'print' NOT NULL)").unwrap();
        assert_eq!(schema.columns[0].sql_type, SqlType::Text);
    }

    #[test]
    fn structural_entries_are_detected() {
        assert!(is_structural("id INTEGER PRIMARY KEY"));
        assert!(is_structural("id integer  primary   key autoincrement"));
        assert!(is_structural("UNIQUE(a, b)"));
        assert!(is_structural("PRIMARY KEY (a, b)"));
        assert!(is_structural("CONSTRAINT pk PRIMARY KEY (a)"));
        assert!(!is_structural("name TEXT NOT NULL"));
        assert!(!is_structural("uniqueness INTEGER"));
    }
}
