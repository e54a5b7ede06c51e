//! Scope conditions: field/operator/value triples that render to a boolean
//! SQL fragment, typically stored as a custom data-scope rule.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use rowscope_core::is_sql_identifier;

use crate::error::ValidationError;
use crate::operator::ConditionOperator;
use crate::registry::ConditionRegistry;
use crate::resolver::{VariableValue, placeholder_names, resolve_variables};

/// Logical joiner between consecutive conditions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Logic {
    #[default]
    And,
    Or,
}

impl Logic {
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        match s.trim().to_ascii_uppercase().as_str() {
            "AND" => Ok(Logic::And),
            "OR" => Ok(Logic::Or),
            _ => Err(ValidationError::InvalidLogic(s.to_string())),
        }
    }
}

impl fmt::Display for Logic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Logic::And => f.write_str("AND"),
            Logic::Or => f.write_str("OR"),
        }
    }
}

/// One condition of a custom scope rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeCondition {
    /// Column the condition applies to.
    pub field: String,

    /// Operator code (`equal`, `in`, ...).
    pub operator: ConditionOperator,

    /// Literal value or `#{variable}` template. Ignored by null checks.
    #[serde(default)]
    pub value: String,

    /// How this condition joins the previous one. Ignored on the first.
    #[serde(default)]
    pub logic: Logic,

    /// Name of the runtime variable bound to the placeholder. Defaults to
    /// the first `#{name}` in `value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub variable: Option<String>,
}

impl ScopeCondition {
    pub fn new(
        field: impl Into<String>,
        operator: ConditionOperator,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
            logic: Logic::And,
            variable: None,
        }
    }

    pub fn with_logic(mut self, logic: Logic) -> Self {
        self.logic = logic;
        self
    }

    pub fn with_variable(mut self, variable: impl Into<String>) -> Self {
        self.variable = Some(variable.into());
        self
    }

    /// The variable this condition reads: the explicit binding, else the
    /// first placeholder in the value template.
    pub fn variable_name(&self) -> Option<&str> {
        self.variable
            .as_deref()
            .or_else(|| placeholder_names(&self.value).into_iter().next())
    }

    /// Render as `field OP value`.
    pub fn to_sql(&self, variable: Option<&VariableValue>) -> Result<String, ValidationError> {
        if !is_sql_identifier(&self.field) {
            return Err(ValidationError::InvalidField(self.field.clone()));
        }

        let value = resolve_variables(&self.value, variable, self.operator);
        if value.is_empty() {
            Ok(format!("{} {}", self.field, self.operator.sql_operator()))
        } else {
            Ok(format!(
                "{} {} {}",
                self.field,
                self.operator.sql_operator(),
                value
            ))
        }
    }
}

/// Render a list of conditions into one boolean SQL fragment.
///
/// Each condition's [variable](ScopeCondition::variable_name) is looked up
/// in `variables` by name. When a
/// registry is given, every field/operator pair must be allowed by it.
/// Returns `None` for an empty list.
pub fn render_conditions(
    conditions: &[ScopeCondition],
    variables: &HashMap<String, VariableValue>,
    registry: Option<&ConditionRegistry>,
) -> Result<Option<String>, ValidationError> {
    let mut sql = String::new();

    for (i, condition) in conditions.iter().enumerate() {
        if let Some(registry) = registry {
            registry.check(&condition.field, condition.operator)?;
        }

        let variable = condition
            .variable_name()
            .and_then(|name| variables.get(name));
        let fragment = condition.to_sql(variable)?;

        if i > 0 {
            sql.push(' ');
            sql.push_str(&condition.logic.to_string());
            sql.push(' ');
        }
        sql.push_str(&fragment);
    }

    if sql.is_empty() {
        Ok(None)
    } else {
        Ok(Some(sql))
    }
}
