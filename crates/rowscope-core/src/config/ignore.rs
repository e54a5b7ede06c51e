//! Ignore-list configuration.
//!
//! Statement identifiers follow the `namespace.method` convention
//! (`com.acme.order.OrderMapper.selectPage`). An entry in `namespaces`
//! exempts every statement in that namespace.

use serde::{Deserialize, Serialize};

/// Statements exempt from data-scope enforcement.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IgnoreConfig {
    /// Fully-qualified statement identifiers.
    #[serde(default)]
    pub statements: Vec<String>,

    /// Statement namespaces (everything before the final `.`).
    #[serde(default)]
    pub namespaces: Vec<String>,
}

impl IgnoreConfig {
    pub fn with_statement(mut self, statement_id: impl Into<String>) -> Self {
        self.statements.push(statement_id.into());
        self
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespaces.push(namespace.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = IgnoreConfig::default()
            .with_statement("a.Mapper.select")
            .with_namespace("b.Mapper");
        assert_eq!(config.statements, vec!["a.Mapper.select".to_string()]);
        assert_eq!(config.namespaces, vec!["b.Mapper".to_string()]);
    }
}
