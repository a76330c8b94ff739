//! Named parameters: `?name` in SQL text, bound from a JSON object.

use serde_json::{Map, Value};
use sqlx::query::Query;
use sqlx::sqlite::{Sqlite, SqliteArguments};

use super::DirectSqlError;

/// JSON parameter map of one statement execution.
pub type Params = Map<String, Value>;

#[derive(Clone, Copy)]
enum Scan {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

/// SQL text with `?name` placeholders rewritten to positional `?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSql {
    sql: String,
    names: Vec<String>,
}

impl NamedSql {
    /// Rewrites `?name` occurrences. Placeholders inside quoted literals and SQL
    /// comments are left alone, as is a bare `?` not followed by an identifier character.
    pub fn compile(text: &str) -> Self {
        let mut sql = String::with_capacity(text.len());
        let mut names = Vec::new();
        let mut state = Scan::Code;
        let mut chars = text.chars().peekable();

        while let Some(c) = chars.next() {
            sql.push(c);
            match state {
                Scan::Quoted(q) if c == q => state = Scan::Code,
                Scan::LineComment if c == '\n' => state = Scan::Code,
                Scan::BlockComment if c == '*' && chars.peek() == Some(&'/') => {
                    chars.next();
                    sql.push('/');
                    state = Scan::Code;
                }
                Scan::Quoted(_) | Scan::LineComment | Scan::BlockComment => {}
                Scan::Code => match c {
                    '\'' | '"' => state = Scan::Quoted(c),
                    '-' if chars.peek() == Some(&'-') => {
                        chars.next();
                        sql.push('-');
                        state = Scan::LineComment;
                    }
                    '/' if chars.peek() == Some(&'*') => {
                        chars.next();
                        sql.push('*');
                        state = Scan::BlockComment;
                    }
                    '?' => {
                        let mut name = String::new();
                        while let Some(&n) = chars.peek() {
                            if n.is_ascii_alphanumeric() || n == '_' {
                                name.push(n);
                                chars.next();
                            } else {
                                break;
                            }
                        }
                        if !name.is_empty() {
                            names.push(name);
                        }
                    }
                    _ => {}
                },
            }
        }

        NamedSql { sql, names }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Parameter names in placeholder order; a name may repeat.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn is_empty(&self) -> bool {
        self.sql.trim().is_empty()
    }

    /// Builds a query with every placeholder bound from `params`.
    pub fn bind<'q>(&'q self, params: &Params) -> Result<Query<'q, Sqlite, SqliteArguments<'q>>, DirectSqlError> {
        let mut query = sqlx::query(&self.sql);
        for name in &self.names {
            let value = params.get(name).ok_or_else(|| DirectSqlError::MissingParameter(name.clone()))?;
            query = bind_value(query, value);
        }
        Ok(query)
    }
}

fn bind_value<'q>(
    query: Query<'q, Sqlite, SqliteArguments<'q>>,
    value: &Value,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => query.bind(i),
            None => query.bind(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => query.bind(s.clone()),
        other => query.bind(other.to_string()),
    }
}

/// Converts a query string map into parameters; every value is a JSON string.
pub fn from_query_pairs<I, K, V>(pairs: I) -> Params
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), Value::String(v.into()))).collect()
}
