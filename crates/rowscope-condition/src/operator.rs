//! Comparison operators and the value shapes they require.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// Value shape an operator expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParameterType {
    /// A single value (user id, name).
    Scalar,
    /// A collection (role ids).
    List,
    /// A two-ended interval.
    Range,
    /// A date/time value; supports ordering and intervals.
    Datetime,
    /// No value at all (null checks).
    None,
}

impl fmt::Display for ParameterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ParameterType::Scalar => "SCALAR",
            ParameterType::List => "LIST",
            ParameterType::Range => "RANGE",
            ParameterType::Datetime => "DATETIME",
            ParameterType::None => "NONE",
        };
        f.write_str(label)
    }
}

/// A supported comparison.
///
/// Each variant carries fixed data: a client-facing code, the SQL token, a
/// value pattern with `?` placeholders, a description and the required
/// [`ParameterType`]. Serialized as its code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionOperator {
    Equal,
    NoEqual,
    Like,
    LeftLike,
    RightLike,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
    In,
    NotIn,
    Between,
    NoBetween,
    IsNull,
    IsNotNull,
}

/// Plain-data description of one operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OperatorSpec {
    pub code: &'static str,
    pub sql_operator: &'static str,
    pub value_pattern: &'static str,
    pub description: &'static str,
    pub parameter_type: ParameterType,
}

const fn spec(
    code: &'static str,
    sql_operator: &'static str,
    value_pattern: &'static str,
    description: &'static str,
    parameter_type: ParameterType,
) -> OperatorSpec {
    OperatorSpec {
        code,
        sql_operator,
        value_pattern,
        description,
        parameter_type,
    }
}

impl ConditionOperator {
    pub const ALL: [ConditionOperator; 15] = [
        ConditionOperator::Equal,
        ConditionOperator::NoEqual,
        ConditionOperator::Like,
        ConditionOperator::LeftLike,
        ConditionOperator::RightLike,
        ConditionOperator::GreaterThan,
        ConditionOperator::GreaterThanOrEqual,
        ConditionOperator::LessThan,
        ConditionOperator::LessThanOrEqual,
        ConditionOperator::In,
        ConditionOperator::NotIn,
        ConditionOperator::Between,
        ConditionOperator::NoBetween,
        ConditionOperator::IsNull,
        ConditionOperator::IsNotNull,
    ];

    pub const fn spec(&self) -> OperatorSpec {
        use ParameterType::*;
        match self {
            ConditionOperator::Equal => spec("equal", "=", "?", "Equal to", Scalar),
            ConditionOperator::NoEqual => spec("noEqual", "!=", "?", "Not equal to", Scalar),
            ConditionOperator::Like => {
                spec("like", "LIKE", "CONCAT('%', ?, '%')", "Contains", Scalar)
            }
            ConditionOperator::LeftLike => {
                spec("leftLike", "LIKE", "CONCAT('%', ?)", "Ends with", Scalar)
            }
            ConditionOperator::RightLike => {
                spec("rightLike", "LIKE", "CONCAT(?, '%')", "Starts with", Scalar)
            }
            ConditionOperator::GreaterThan => spec("greaterThan", ">", "?", "Greater than", Scalar),
            ConditionOperator::GreaterThanOrEqual => spec(
                "greaterThanOrEqual",
                ">=",
                "?",
                "Greater than or equal to",
                Scalar,
            ),
            ConditionOperator::LessThan => spec("lessThan", "<", "?", "Less than", Scalar),
            ConditionOperator::LessThanOrEqual => {
                spec("lessThanOrEqual", "<=", "?", "Less than or equal to", Scalar)
            }
            ConditionOperator::In => spec("in", "IN", "(?)", "In list", List),
            ConditionOperator::NotIn => spec("notIn", "NOT IN", "(?)", "Not in list", List),
            ConditionOperator::Between => {
                spec("between", "BETWEEN", "? AND ?", "Within range", Range)
            }
            ConditionOperator::NoBetween => {
                spec("noBetween", "NOT BETWEEN", "? AND ?", "Outside range", Range)
            }
            ConditionOperator::IsNull => spec("isNull", "IS NULL", "", "Is empty", None),
            ConditionOperator::IsNotNull => {
                spec("isNotNull", "IS NOT NULL", "", "Is not empty", None)
            }
        }
    }

    pub fn code(&self) -> &'static str {
        self.spec().code
    }

    pub fn sql_operator(&self) -> &'static str {
        self.spec().sql_operator
    }

    pub fn value_pattern(&self) -> &'static str {
        self.spec().value_pattern
    }

    pub fn description(&self) -> &'static str {
        self.spec().description
    }

    pub fn parameter_type(&self) -> ParameterType {
        self.spec().parameter_type
    }

    /// Whether this operator takes no value (`IS NULL`, `IS NOT NULL`).
    pub fn is_nullary(&self) -> bool {
        self.parameter_type() == ParameterType::None
    }

    /// Look up an operator by its client-facing code.
    pub fn from_code(code: &str) -> Result<Self, ValidationError> {
        Self::ALL
            .into_iter()
            .find(|op| op.code() == code)
            .ok_or_else(|| ValidationError::UnknownOperator(code.to_string()))
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for ConditionOperator {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_code(s)
    }
}
