//! # rowscope-condition
//!
//! Typed condition operators for building and validating dynamic query
//! filters.
//!
//! - [`ConditionOperator`]: every supported comparison with its SQL token,
//!   value pattern and required [`ParameterType`]
//! - [`ConditionBuilder`] / [`ConditionSet`]: per-field allowed-operator sets,
//!   validated on every mutation
//! - [`ConditionRegistry`]: field → operator set, built once at startup
//! - [`resolve_variables`]: turns `#{var}` templates plus runtime values into
//!   quoted, pattern-formatted SQL literals
//! - [`ScopeCondition`] / [`render_conditions`]: compose resolved conditions
//!   into a boolean SQL fragment
//!
//! ```
//! use rowscope_condition::{ConditionBuilder, ConditionOperator, ParameterType};
//!
//! let set = ConditionBuilder::of("user_name", ParameterType::Scalar)?
//!     .add(ConditionOperator::Like)?
//!     .build();
//! assert!(set.contains(ConditionOperator::Like));
//!
//! assert!(ConditionBuilder::of("user_id", ParameterType::Scalar)?
//!     .add(ConditionOperator::In)
//!     .is_err());
//! # Ok::<(), rowscope_condition::ValidationError>(())
//! ```

pub mod builder;
pub mod error;
pub mod operator;
pub mod registry;
pub mod resolver;
pub mod rule;

pub use builder::{
    ConditionBuilder, ConditionSet, DATETIME_DEFAULT, LIST_DEFAULT, RANGE_DEFAULT,
    SCALAR_DEFAULT, SCALAR_NUMBER, SCALAR_STRING, default_group,
};
pub use error::{ResolveError, ValidationError};
pub use operator::{ConditionOperator, OperatorSpec, ParameterType};
pub use registry::ConditionRegistry;
pub use resolver::{VariableValue, format_value, format_with_pattern, resolve_variables};
pub use rule::{Logic, ScopeCondition, render_conditions};
