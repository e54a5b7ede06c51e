//! Variable resolution: turns a templated or literal condition value plus a
//! runtime variable into an operator-correct SQL literal.
//!
//! Values may contain `#{name}` placeholders. Each placeholder is replaced by
//! the SQL literal form of the runtime variable, then the result is shaped by
//! the operator's value pattern:
//!
//! | Operator | Input | Output |
//! |----------|-------|--------|
//! | `equal` | `'admin'` | `'admin'` |
//! | `like` | `'admin'` | `CONCAT('%', 'admin', '%')` |
//! | `in` | `1,2` | `(1,2)` |
//! | `between` | `1,10` | `1 AND 10` |
//! | `isNull` | anything | empty |

use chrono::NaiveDateTime;
use regex::{NoExpand, Regex};
use std::sync::LazyLock;

use crate::error::ResolveError;
use crate::operator::ConditionOperator;

/// SQL `NULL` literal.
pub const NULL_LITERAL: &str = "NULL";

/// Format used for date/time literals.
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const AND_JOINER: &str = " AND ";
const MAX_DEPTH: usize = 16;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\{([^}]+)\}").expect("placeholder pattern is valid"));

/// A runtime value bound to a placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableValue {
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
    DateTime(NaiveDateTime),
    /// Several date/times, rendered comma-separated.
    DateTimes(Vec<NaiveDateTime>),
    /// Fixed-size array, rendered comma-separated.
    Array(Vec<VariableValue>),
    /// Collection, rendered as a parenthesized list.
    List(Vec<VariableValue>),
}

impl From<&str> for VariableValue {
    fn from(value: &str) -> Self {
        VariableValue::String(value.to_string())
    }
}

impl From<String> for VariableValue {
    fn from(value: String) -> Self {
        VariableValue::String(value)
    }
}

impl From<i64> for VariableValue {
    fn from(value: i64) -> Self {
        VariableValue::Integer(value)
    }
}

impl From<i32> for VariableValue {
    fn from(value: i32) -> Self {
        VariableValue::Integer(value.into())
    }
}

impl From<f64> for VariableValue {
    fn from(value: f64) -> Self {
        VariableValue::Float(value)
    }
}

impl From<bool> for VariableValue {
    fn from(value: bool) -> Self {
        VariableValue::Bool(value)
    }
}

impl From<NaiveDateTime> for VariableValue {
    fn from(value: NaiveDateTime) -> Self {
        VariableValue::DateTime(value)
    }
}

impl From<Vec<NaiveDateTime>> for VariableValue {
    fn from(value: Vec<NaiveDateTime>) -> Self {
        VariableValue::DateTimes(value)
    }
}

impl<T: Into<VariableValue>> From<Option<T>> for VariableValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(VariableValue::Null, Into::into)
    }
}

impl From<serde_json::Value> for VariableValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => VariableValue::Null,
            Value::Bool(b) => VariableValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => VariableValue::Integer(i),
                None => VariableValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => VariableValue::String(s),
            Value::Array(items) => {
                VariableValue::List(items.into_iter().map(VariableValue::from).collect())
            }
            obj @ Value::Object(_) => VariableValue::String(obj.to_string()),
        }
    }
}

/// Resolve `value` against a runtime variable and format it for `operator`.
///
/// Values without placeholders are formatted as-is. A missing variable
/// substitutes `NULL`. If the variable cannot be rendered, the failure is
/// logged and the raw value is formatted instead.
pub fn resolve_variables(
    value: &str,
    variable: Option<&VariableValue>,
    operator: ConditionOperator,
) -> String {
    if !value.contains("#{") {
        return format_with_pattern(value, operator);
    }

    match substitute(value, variable) {
        Ok(resolved) => {
            let formatted = format_with_pattern(&resolved, operator);
            tracing::debug!(
                value,
                resolved = %formatted,
                operator = operator.code(),
                "Variable substitution succeeded"
            );
            formatted
        }
        Err(e) => {
            tracing::warn!(
                value,
                operator = operator.code(),
                error = %e,
                "Variable substitution failed, formatting raw value"
            );
            format_with_pattern(value, operator)
        }
    }
}

/// Names of the `#{...}` placeholders in `value`, in order of appearance.
pub fn placeholder_names(value: &str) -> Vec<&str> {
    PLACEHOLDER
        .captures_iter(value)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim())
        .collect()
}

fn substitute(value: &str, variable: Option<&VariableValue>) -> Result<String, ResolveError> {
    let replacement = match variable {
        Some(v) => format_value(v)?,
        None => NULL_LITERAL.to_string(),
    };
    Ok(PLACEHOLDER
        .replace_all(value, NoExpand(&replacement))
        .into_owned())
}

/// Render a runtime value as a SQL literal.
pub fn format_value(value: &VariableValue) -> Result<String, ResolveError> {
    format_value_at(value, 0)
}

fn format_value_at(value: &VariableValue, depth: usize) -> Result<String, ResolveError> {
    if depth > MAX_DEPTH {
        return Err(ResolveError::TooDeep(MAX_DEPTH));
    }

    Ok(match value {
        VariableValue::Null => NULL_LITERAL.to_string(),
        VariableValue::String(s) => quote(s),
        VariableValue::Integer(i) => i.to_string(),
        VariableValue::Float(f) => {
            if !f.is_finite() {
                return Err(ResolveError::NonFiniteNumber(*f));
            }
            f.to_string()
        }
        VariableValue::Bool(b) => b.to_string(),
        VariableValue::DateTime(dt) => quote(&dt.format(DATETIME_FORMAT).to_string()),
        VariableValue::DateTimes(dts) => dts
            .iter()
            .map(|dt| quote(&dt.format(DATETIME_FORMAT).to_string()))
            .collect::<Vec<_>>()
            .join(","),
        VariableValue::Array(items) => items
            .iter()
            .map(|item| format_value_at(item, depth + 1))
            .collect::<Result<Vec<_>, _>>()?
            .join(","),
        VariableValue::List(items) => format!(
            "({})",
            items
                .iter()
                .map(|item| format_value_at(item, depth + 1))
                .collect::<Result<Vec<_>, _>>()?
                .join(", ")
        ),
    })
}

/// Single-quote a string literal, doubling embedded quotes.
fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Shape an already-resolved value with the operator's value pattern.
pub fn format_with_pattern(value: &str, operator: ConditionOperator) -> String {
    use ConditionOperator::*;

    if operator.is_nullary() {
        return String::new();
    }
    if value == NULL_LITERAL {
        return value.to_string();
    }

    let pattern = operator.value_pattern();
    match operator {
        In | NotIn => {
            if value.starts_with('(') && value.ends_with(')') {
                value.to_string()
            } else {
                format!("({})", value)
            }
        }
        Between | NoBetween => {
            if value.contains(AND_JOINER) {
                return value.to_string();
            }
            let mut parts: Vec<&str> = value.split(',').map(str::trim).collect();
            while parts.last().is_some_and(|p| p.is_empty()) {
                parts.pop();
            }
            if parts.len() >= 2 {
                format!("{}{}{}", parts[0], AND_JOINER, parts[1])
            } else {
                pattern.replace("? AND ?", value)
            }
        }
        _ => pattern.replace('?', value),
    }
}
