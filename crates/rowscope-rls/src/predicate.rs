//! Data-scope predicate construction.
//!
//! Rules, first match wins:
//!
//! 1. `UNKNOWN` scope: `1 = 0` (no rows)
//! 2. `SELF` scope: `owner_column = current_user_id`
//! 3. `CUSTOM` scope with rule text: the parsed rule, verbatim
//! 4. Non-empty authorized ids: `owner_column IN (ids)`
//! 5. Otherwise: no predicate

use rowscope_core::{CustomRuleFailure, DataScope, DataScopeType, ScopeConfig};
use sqlparser::ast::Expr;

use crate::error::RlsError;
use crate::parser::SqlAnalyzer;

/// Always-false predicate.
pub const CONTRADICTION: &str = "1 = 0";

/// Builds the boolean expression a [`DataScope`] injects.
#[derive(Debug, Clone)]
pub struct PredicateBuilder {
    analyzer: SqlAnalyzer,
    owner_column: String,
    rule_failure: CustomRuleFailure,
}

impl PredicateBuilder {
    pub fn new(config: &ScopeConfig) -> Self {
        Self {
            analyzer: SqlAnalyzer::new(config.dialect),
            owner_column: config.owner_column.clone(),
            rule_failure: config.custom_rule_failure,
        }
    }

    pub fn owner_column(&self) -> &str {
        &self.owner_column
    }

    /// Build the predicate for `scope`, or `None` if nothing should be
    /// injected.
    ///
    /// A custom rule that fails to parse is logged and handled according to
    /// the configured [`CustomRuleFailure`]; it never surfaces as an error.
    pub fn build(&self, scope: &DataScope) -> Result<Option<Expr>, RlsError> {
        match scope.scope_type {
            DataScopeType::Unknown => {
                tracing::error!(
                    permission_code = %scope.permission_code,
                    user_id = scope.current_user_id,
                    "Data scope type is unknown, restricting query to no rows"
                );
                return self.contradiction().map(Some);
            }
            DataScopeType::SelfOnly => {
                let text = format!("{} = {}", self.owner_column, scope.current_user_id);
                return self.analyzer.parse_condition(&text).map(Some);
            }
            DataScopeType::Custom => {
                if let Some(rule) = scope.custom_rule_text() {
                    return self.custom_rule(rule, scope);
                }
            }
            _ => {}
        }

        if !scope.scope_user_ids.is_empty() {
            let ids = scope
                .scope_user_ids
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let text = format!("{} IN ({})", self.owner_column, ids);
            return self.analyzer.parse_condition(&text).map(Some);
        }

        Ok(None)
    }

    /// Build the predicate and render it as SQL text.
    pub fn build_sql(&self, scope: &DataScope) -> Result<Option<String>, RlsError> {
        Ok(self.build(scope)?.map(|expr| expr.to_string()))
    }

    fn custom_rule(&self, rule: &str, scope: &DataScope) -> Result<Option<Expr>, RlsError> {
        match self.analyzer.parse_condition(rule) {
            Ok(expr) => Ok(Some(expr)),
            Err(e) => {
                tracing::error!(
                    permission_code = %scope.permission_code,
                    user_id = scope.current_user_id,
                    custom_rules = rule,
                    error = %e,
                    failure_mode = ?self.rule_failure,
                    "Failed to parse custom data scope rule"
                );
                match self.rule_failure {
                    CustomRuleFailure::Open => Ok(None),
                    CustomRuleFailure::Closed => self.contradiction().map(Some),
                }
            }
        }
    }

    fn contradiction(&self) -> Result<Expr, RlsError> {
        self.analyzer.parse_condition(CONTRADICTION)
    }
}
