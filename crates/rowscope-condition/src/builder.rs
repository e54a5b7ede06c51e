//! Per-field operator sets.
//!
//! A [`ConditionBuilder`] is seeded with the default group for a
//! [`ParameterType`] and customized with `add` / `remove` / `add_set`. Every
//! mutation validates its operators before touching the set, so a mismatch
//! fails at the call site rather than when the set is used.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::ValidationError;
use crate::operator::{ConditionOperator, ParameterType};

use ConditionOperator::*;

/// Equality plus null checks.
pub const SCALAR_DEFAULT: &[ConditionOperator] = &[Equal, NoEqual, IsNull, IsNotNull];

/// Equality, pattern matching and null checks.
pub const SCALAR_STRING: &[ConditionOperator] =
    &[Equal, NoEqual, Like, LeftLike, RightLike, IsNull, IsNotNull];

/// Equality, ordering comparisons and null checks.
pub const SCALAR_NUMBER: &[ConditionOperator] = &[
    Equal,
    NoEqual,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    IsNull,
    IsNotNull,
];

/// Ordering comparisons and intervals.
pub const DATETIME_DEFAULT: &[ConditionOperator] = &[
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Between,
    NoBetween,
];

/// Membership only.
pub const LIST_DEFAULT: &[ConditionOperator] = &[In, NotIn];

/// Intervals only.
pub const RANGE_DEFAULT: &[ConditionOperator] = &[Between, NoBetween];

/// Default operator group for a builder seed, or `None` for
/// [`ParameterType::None`].
pub fn default_group(parameter_type: ParameterType) -> Option<&'static [ConditionOperator]> {
    match parameter_type {
        ParameterType::Scalar => Some(SCALAR_DEFAULT),
        ParameterType::List => Some(LIST_DEFAULT),
        ParameterType::Range => Some(RANGE_DEFAULT),
        ParameterType::Datetime => Some(DATETIME_DEFAULT),
        ParameterType::None => None,
    }
}

/// Whether `operator` may be used in a builder of `builder_type`.
pub fn is_compatible(operator: ConditionOperator, builder_type: ParameterType) -> bool {
    let operator_type = operator.parameter_type();
    operator_type == ParameterType::None || operator_type == builder_type
}

/// Builds the allowed operator set for one field.
#[derive(Debug, Clone)]
pub struct ConditionBuilder {
    code: String,
    builder_type: ParameterType,
    operators: BTreeSet<ConditionOperator>,
}

impl ConditionBuilder {
    /// Create a builder seeded with the default group for `parameter_type`.
    ///
    /// `code` identifies the field (used in error messages).
    pub fn of(
        code: impl Into<String>,
        parameter_type: ParameterType,
    ) -> Result<Self, ValidationError> {
        let code = code.into();
        let group = default_group(parameter_type).ok_or_else(|| {
            ValidationError::UnsupportedSeed {
                code: code.clone(),
                parameter_type,
            }
        })?;

        Ok(Self {
            code,
            builder_type: parameter_type,
            operators: group.iter().copied().collect(),
        })
    }

    /// Add one operator.
    pub fn add(mut self, operator: ConditionOperator) -> Result<Self, ValidationError> {
        self.check(operator)?;
        self.operators.insert(operator);
        Ok(self)
    }

    /// Add several operators. Nothing is added unless all of them validate.
    pub fn add_all(
        mut self,
        operators: impl IntoIterator<Item = ConditionOperator>,
    ) -> Result<Self, ValidationError> {
        let operators: Vec<_> = operators.into_iter().collect();
        for op in &operators {
            self.check(*op)?;
        }
        self.operators.extend(operators);
        Ok(self)
    }

    /// Remove one operator.
    pub fn remove(mut self, operator: ConditionOperator) -> Result<Self, ValidationError> {
        self.check(operator)?;
        self.operators.remove(&operator);
        Ok(self)
    }

    /// Add a predefined group. The group must not be empty.
    pub fn add_set(mut self, set: &[ConditionOperator]) -> Result<Self, ValidationError> {
        if set.is_empty() {
            return Err(ValidationError::EmptySet {
                code: self.code.clone(),
            });
        }
        for op in set {
            self.check(*op)?;
        }
        self.operators.extend(set.iter().copied());
        Ok(self)
    }

    /// Snapshot the current set.
    pub fn build(self) -> ConditionSet {
        ConditionSet {
            field: self.code,
            parameter_type: self.builder_type,
            operators: self.operators,
        }
    }

    fn check(&self, operator: ConditionOperator) -> Result<(), ValidationError> {
        if is_compatible(operator, self.builder_type) {
            Ok(())
        } else {
            Err(ValidationError::ParameterTypeMismatch {
                code: self.code.clone(),
                operator,
                operator_type: operator.parameter_type(),
                builder_type: self.builder_type,
            })
        }
    }
}

/// Immutable, deduplicated set of operators allowed for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionSet {
    field: String,
    parameter_type: ParameterType,
    operators: BTreeSet<ConditionOperator>,
}

impl ConditionSet {
    /// Rebuild a set from operator codes (e.g. as stored by a client).
    pub fn from_codes<'a>(
        field: impl Into<String>,
        parameter_type: ParameterType,
        codes: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, ValidationError> {
        let operators = codes
            .into_iter()
            .map(ConditionOperator::from_code)
            .collect::<Result<BTreeSet<_>, _>>()?;
        Ok(Self {
            field: field.into(),
            parameter_type,
            operators,
        })
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn parameter_type(&self) -> ParameterType {
        self.parameter_type
    }

    pub fn contains(&self, operator: ConditionOperator) -> bool {
        self.operators.contains(&operator)
    }

    pub fn len(&self) -> usize {
        self.operators.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operators.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = ConditionOperator> + '_ {
        self.operators.iter().copied()
    }

    /// Operator codes in declaration order.
    pub fn codes(&self) -> Vec<&'static str> {
        self.iter().map(|op| op.code()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_scalar_default_seed() {
        let set = ConditionBuilder::of("user_name", ParameterType::Scalar)
            .unwrap()
            .build();
        assert_eq!(set.codes(), vec!["equal", "noEqual", "isNull", "isNotNull"]);
        assert_eq!(set.field(), "user_name");
        assert_eq!(set.parameter_type(), ParameterType::Scalar);
    }

    #[test]
    fn test_none_seed_rejected() {
        let err = ConditionBuilder::of("flag", ParameterType::None).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedSeed { .. }));
    }

    #[test]
    fn test_add_list_operator_to_scalar_rejected() {
        let err = ConditionBuilder::of("user_id", ParameterType::Scalar)
            .unwrap()
            .add(In)
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::ParameterTypeMismatch {
                code: "user_id".to_string(),
                operator: In,
                operator_type: ParameterType::List,
                builder_type: ParameterType::Scalar,
            }
        );
    }

    #[test]
    fn test_null_checks_allowed_everywhere() {
        for ty in [
            ParameterType::Scalar,
            ParameterType::List,
            ParameterType::Range,
            ParameterType::Datetime,
        ] {
            let set = ConditionBuilder::of("f", ty)
                .unwrap()
                .add(IsNull)
                .unwrap()
                .add(IsNotNull)
                .unwrap()
                .build();
            assert!(set.contains(IsNull));
            assert!(set.contains(IsNotNull));
        }
    }

    #[test]
    fn test_add_all_is_atomic() {
        let builder = ConditionBuilder::of("name", ParameterType::Scalar).unwrap();
        let err = builder.clone().add_all([Like, Between]).unwrap_err();
        assert!(matches!(err, ValidationError::ParameterTypeMismatch { operator: Between, .. }));

        let set = builder.add_all([Like, LeftLike, RightLike]).unwrap().build();
        assert!(set.contains(Like));
        assert!(set.contains(RightLike));
    }

    #[test]
    fn test_remove() {
        let set = ConditionBuilder::of("ids", ParameterType::List)
            .unwrap()
            .remove(NotIn)
            .unwrap()
            .build();
        assert_eq!(set.codes(), vec!["in"]);
    }

    #[test]
    fn test_remove_validates_type() {
        let err = ConditionBuilder::of("ids", ParameterType::List)
            .unwrap()
            .remove(Equal)
            .unwrap_err();
        assert!(matches!(err, ValidationError::ParameterTypeMismatch { .. }));
    }

    #[test]
    fn test_add_set() {
        let set = ConditionBuilder::of("name", ParameterType::Scalar)
            .unwrap()
            .add_set(SCALAR_STRING)
            .unwrap()
            .build();
        assert_eq!(set.len(), SCALAR_STRING.len());

        let err = ConditionBuilder::of("name", ParameterType::Scalar)
            .unwrap()
            .add_set(&[])
            .unwrap_err();
        assert_eq!(
            err,
            ValidationError::EmptySet {
                code: "name".to_string()
            }
        );

        let err = ConditionBuilder::of("age", ParameterType::Range)
            .unwrap()
            .add_set(SCALAR_NUMBER)
            .unwrap_err();
        assert!(matches!(err, ValidationError::ParameterTypeMismatch { .. }));
    }

    #[test]
    fn test_duplicates_collapse() {
        let set = ConditionBuilder::of("name", ParameterType::Scalar)
            .unwrap()
            .add(Equal)
            .unwrap()
            .add_all([Equal, Equal])
            .unwrap()
            .build();
        assert_eq!(set.len(), SCALAR_DEFAULT.len());
    }

    #[test]
    fn test_datetime_seed_contains_ranges_and_ordering() {
        let set = ConditionBuilder::of("create_time", ParameterType::Datetime)
            .unwrap()
            .build();
        assert!(set.contains(Between));
        assert!(set.contains(GreaterThanOrEqual));
        assert!(!set.contains(Equal));
    }

    #[test]
    fn test_codes_round_trip() {
        for ty in [
            ParameterType::Scalar,
            ParameterType::List,
            ParameterType::Range,
            ParameterType::Datetime,
        ] {
            let set = ConditionBuilder::of("field", ty).unwrap().build();
            let codes = set.codes();
            let rebuilt = ConditionSet::from_codes("field", ty, codes).unwrap();
            assert_eq!(rebuilt, set);
        }
    }

    #[test]
    fn test_from_codes_unknown() {
        let err = ConditionSet::from_codes("f", ParameterType::Scalar, ["equal", "approx"]).unwrap_err();
        assert_eq!(err, ValidationError::UnknownOperator("approx".to_string()));
    }
}
