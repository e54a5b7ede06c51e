//! Field → operator-set registry.
//!
//! Built once at startup and passed to whoever renders or validates dynamic
//! filters.

use std::collections::HashMap;

use crate::builder::ConditionSet;
use crate::error::ValidationError;
use crate::operator::ConditionOperator;

/// Allowed operators per field.
#[derive(Debug, Clone, Default)]
pub struct ConditionRegistry {
    fields: HashMap<String, ConditionSet>,
}

impl ConditionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a set under its field name, replacing any previous entry.
    pub fn register(&mut self, set: ConditionSet) -> &mut Self {
        self.fields.insert(set.field().to_string(), set);
        self
    }

    pub fn with(mut self, set: ConditionSet) -> Self {
        self.register(set);
        self
    }

    pub fn get(&self, field: &str) -> Option<&ConditionSet> {
        self.fields.get(field)
    }

    /// Whether `operator` is allowed for `field`. Unregistered fields allow
    /// nothing.
    pub fn allows(&self, field: &str, operator: ConditionOperator) -> bool {
        self.get(field).is_some_and(|set| set.contains(operator))
    }

    pub fn check(&self, field: &str, operator: ConditionOperator) -> Result<(), ValidationError> {
        if self.allows(field, operator) {
            Ok(())
        } else {
            Err(ValidationError::OperatorNotAllowed {
                field: field.to_string(),
                operator,
            })
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
