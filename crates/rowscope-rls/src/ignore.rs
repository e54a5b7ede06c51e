//! Statements exempt from data-scope enforcement.

use std::collections::HashSet;

use rowscope_core::IgnoreConfig;

/// Ignore list keyed by statement identifier.
///
/// A statement is ignored when its identifier is registered, or when its
/// namespace (the identifier up to the last `.`) is registered.
#[derive(Debug, Clone, Default)]
pub struct IgnoreRegistry {
    statements: HashSet<String>,
    namespaces: HashSet<String>,
}

impl IgnoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &IgnoreConfig) -> Self {
        Self {
            statements: config.statements.iter().map(|s| s.trim().to_string()).collect(),
            namespaces: config.namespaces.iter().map(|s| s.trim().to_string()).collect(),
        }
    }

    pub fn ignore_statement(&mut self, statement_id: impl Into<String>) -> &mut Self {
        self.statements.insert(statement_id.into());
        self
    }

    pub fn ignore_namespace(&mut self, namespace: impl Into<String>) -> &mut Self {
        self.namespaces.insert(namespace.into());
        self
    }

    /// Whether enforcement should be skipped for `statement_id`.
    pub fn will_ignore(&self, statement_id: &str) -> bool {
        if self.statements.contains(statement_id) {
            return true;
        }
        statement_id
            .rsplit_once('.')
            .is_some_and(|(namespace, _)| self.namespaces.contains(namespace))
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty() && self.namespaces.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statement_and_namespace() {
        let registry = IgnoreRegistry::from_config(
            &IgnoreConfig::default()
                .with_statement("app.UserMapper.selectLogin")
                .with_namespace("app.ConfigMapper"),
        );

        assert!(registry.will_ignore("app.UserMapper.selectLogin"));
        assert!(!registry.will_ignore("app.UserMapper.selectPage"));
        assert!(registry.will_ignore("app.ConfigMapper.selectAll"));
        assert!(!registry.will_ignore("app.ConfigMapperExt.selectAll"));
        assert!(!registry.will_ignore("app"));
    }

    #[test]
    fn test_programmatic_registration() {
        let mut registry = IgnoreRegistry::new();
        assert!(registry.is_empty());
        registry.ignore_statement("a.M.x").ignore_namespace("b.N");
        assert!(registry.will_ignore("a.M.x"));
        assert!(registry.will_ignore("b.N.y"));
    }
}
