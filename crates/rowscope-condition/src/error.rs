//! Error types for the condition crate.

use thiserror::Error;

use crate::operator::{ConditionOperator, ParameterType};

/// Errors raised while building or applying operator sets.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// An operator was added to a builder of a different parameter type.
    #[error("[{code}] operator {operator} of type {operator_type} does not match builder type {builder_type}")]
    ParameterTypeMismatch {
        code: String,
        operator: ConditionOperator,
        operator_type: ParameterType,
        builder_type: ParameterType,
    },

    /// `NONE` cannot seed a builder.
    #[error("[{code}] parameter type {parameter_type} cannot seed a condition builder")]
    UnsupportedSeed {
        code: String,
        parameter_type: ParameterType,
    },

    /// `add_set` was given no operators.
    #[error("[{code}] operator set must not be empty")]
    EmptySet { code: String },

    /// No operator has this client-facing code.
    #[error("unknown condition operator code: {0}")]
    UnknownOperator(String),

    /// A field name is not a usable SQL identifier.
    #[error("invalid field name: {0}")]
    InvalidField(String),

    /// The operator is not allowed for the field.
    #[error("operator {operator} is not allowed for field {field}")]
    OperatorNotAllowed {
        field: String,
        operator: ConditionOperator,
    },

    /// A logical joiner other than AND / OR.
    #[error("invalid logic joiner: {0}")]
    InvalidLogic(String),
}

/// Errors raised while rendering a runtime value as a SQL literal.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// NaN and infinities have no SQL literal form.
    #[error("cannot render non-finite number {0} as a SQL literal")]
    NonFiniteNumber(f64),

    /// Nested collections beyond the supported depth.
    #[error("value nesting exceeds {0} levels")]
    TooDeep(usize),
}
