//! Named-parameter binding for SQLite statements.
//!
//! Rewrites `:name` placeholders into positional `?` markers and collects the
//! matching values in order. List values expand to `?, ?, ...` so one
//! placeholder can feed an `IN (...)` clause; an empty list becomes `NULL`,
//! which matches no rows.

use crate::error::{RepoError, RepoResult};
use crate::spliterator::value::{ArgValue, Arguments};
use once_cell::sync::Lazy;
use regex::Regex;
use rusqlite::types::Value;

// Comments and quoted literals are matched first so placeholders inside them
// are skipped.
static NAMED_PARAM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"--[^\n]*|/\*(?s:.*?)\*/|'(?:[^']|'')*'|"(?:[^"]|"")*"|:([A-Za-z_][A-Za-z0-9_]*)"#,
    )
    .expect("valid named parameter regex")
});

/// Expands named placeholders in `sql` against `arguments`.
///
/// # Errors
/// - `InvalidRequest` when a placeholder has no argument.
/// - `InvalidRequest` when a list argument contains another list.
pub fn expand_named(sql: &str, arguments: &Arguments) -> RepoResult<(String, Vec<Value>)> {
    let mut expanded = String::with_capacity(sql.len());
    let mut values = Vec::new();
    let mut copied_to = 0;

    for captures in NAMED_PARAM_RE.captures_iter(sql) {
        let Some(name) = captures.get(1) else {
            continue;
        };
        let value = arguments.get(name.as_str()).ok_or_else(|| {
            RepoError::InvalidRequest(format!("no argument bound for `:{}`", name.as_str()))
        })?;

        expanded.push_str(&sql[copied_to..name.start() - 1]);
        push_placeholder(&mut expanded, &mut values, name.as_str(), value)?;
        copied_to = name.end();
    }

    expanded.push_str(&sql[copied_to..]);
    Ok((expanded, values))
}

fn push_placeholder(
    expanded: &mut String,
    values: &mut Vec<Value>,
    name: &str,
    value: &ArgValue,
) -> RepoResult<()> {
    let ArgValue::List(items) = value else {
        expanded.push('?');
        values.push(scalar_value(value));
        return Ok(());
    };

    if items.is_empty() {
        expanded.push_str("NULL");
        return Ok(());
    }

    for (position, item) in items.iter().enumerate() {
        if matches!(item, ArgValue::List(_)) {
            return Err(RepoError::InvalidRequest(format!(
                "argument `:{name}` contains a nested list"
            )));
        }
        if position > 0 {
            expanded.push_str(", ");
        }
        expanded.push('?');
        values.push(scalar_value(item));
    }
    Ok(())
}

fn scalar_value(value: &ArgValue) -> Value {
    match value {
        ArgValue::Null | ArgValue::List(_) => Value::Null,
        ArgValue::Integer(value) => Value::Integer(*value),
        ArgValue::Real(value) => Value::Real(*value),
        ArgValue::Text(value) => Value::Text(value.clone()),
    }
}
