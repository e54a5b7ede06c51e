//! Data-scope predicate injection.

use rowscope_core::{DataScope, ScopeConfig};
use serde::Serialize;
use sqlparser::ast::{BinaryOperator, Expr, Select, SetExpr, Statement, UnaryOperator};

use crate::error::RlsError;
use crate::parser::SqlAnalyzer;
use crate::predicate::PredicateBuilder;

/// Injects data-scope predicates into SELECT statements.
#[derive(Debug, Clone)]
pub struct ScopeInjector {
    analyzer: SqlAnalyzer,
    predicates: PredicateBuilder,
}

impl ScopeInjector {
    /// Create a new injector with the given configuration.
    pub fn new(config: &ScopeConfig) -> Self {
        Self {
            analyzer: SqlAnalyzer::new(config.dialect),
            predicates: PredicateBuilder::new(config),
        }
    }

    pub fn predicates(&self) -> &PredicateBuilder {
        &self.predicates
    }

    /// Inject the scope predicate into every plain SELECT branch of `sql`.
    ///
    /// The SQL is returned byte-identical whenever nothing is injected: `ALL`
    /// scopes, scopes without a predicate, and queries with no plain SELECT
    /// branch.
    pub fn inject(&self, sql: &str, scope: &DataScope) -> Result<InjectionResult, RlsError> {
        if scope.is_all() {
            return Ok(InjectionResult::unchanged(sql));
        }

        let stmt = self.analyzer.parse_single(sql)?;
        let Statement::Query(mut query) = stmt else {
            return Err(RlsError::NotAQuery {
                operation: self.analyzer.get_operation(&stmt),
            });
        };

        let Some(predicate) = self.predicates.build(scope)? else {
            return Ok(InjectionResult::unchanged(sql));
        };

        let mut scoped = ScopedBranches::default();
        self.scope_set_expr(query.body.as_mut(), &predicate, scope, &mut scoped);

        if scoped.count == 0 {
            return Ok(InjectionResult {
                branches_skipped: scoped.skipped,
                ..InjectionResult::unchanged(sql)
            });
        }

        let rewritten_sql = query.to_string();
        tracing::debug!(
            scope_type = %scope.scope_type,
            user_id = scope.current_user_id,
            branches = scoped.count,
            "Data scope predicate injected"
        );

        Ok(InjectionResult {
            original_sql: sql.to_string(),
            rewritten_sql,
            predicate: Some(predicate.to_string()),
            tables_scoped: scoped.tables,
            branches_scoped: scoped.count,
            branches_skipped: scoped.skipped,
        })
    }

    /// Like [`inject`](Self::inject), but any failure returns `sql` unchanged.
    pub fn rewrite(&self, sql: &str, scope: &DataScope) -> String {
        match self.inject(sql, scope) {
            Ok(result) => result.rewritten_sql,
            Err(e) => {
                tracing::error!(
                    permission_code = %scope.permission_code,
                    error = %e,
                    sql,
                    "Failed to inject data scope, passing SQL through"
                );
                sql.to_string()
            }
        }
    }

    /// Walk a query body. Set operations are flattened; every plain SELECT
    /// is scoped and anything else (parenthesized subqueries, VALUES, ...)
    /// is skipped.
    fn scope_set_expr(
        &self,
        body: &mut SetExpr,
        predicate: &Expr,
        scope: &DataScope,
        scoped: &mut ScopedBranches,
    ) {
        match body {
            SetExpr::Select(select) => {
                scoped
                    .tables
                    .extend(self.analyzer.extract_tables(select).into_iter().map(|t| t.name));
                merge_where(select, predicate.clone());
                scoped.count += 1;
            }
            SetExpr::SetOperation { left, right, .. } => {
                self.scope_set_expr(left, predicate, scope, scoped);
                self.scope_set_expr(right, predicate, scope, scoped);
            }
            other => {
                tracing::warn!(
                    scope_type = %scope.scope_type,
                    permission_code = %scope.permission_code,
                    branch = branch_kind(other),
                    "Query branch is not a plain SELECT, skipping data scope"
                );
                scoped.skipped += 1;
            }
        }
    }
}

#[derive(Default)]
struct ScopedBranches {
    count: usize,
    skipped: usize,
    tables: Vec<String>,
}

/// AND `predicate` into the WHERE clause, or make it the WHERE clause.
fn merge_where(select: &mut Select, predicate: Expr) {
    select.selection = Some(match select.selection.take() {
        Some(existing) => Expr::BinaryOp {
            left: Box::new(nest_for_conjunction(existing)),
            op: BinaryOperator::And,
            right: Box::new(nest_for_conjunction(predicate)),
        },
        None => predicate,
    });
}

/// Parenthesize `expr` unless every operator outside parentheses binds at
/// least as tightly as AND in all supported dialects.
///
/// OR, XOR and `||` (logical OR in MySQL) bind looser than AND, and sqlparser
/// ranks XOR above comparisons, so `a = 1 XOR b = 2` comes back as a
/// comparison tree and only a full walk finds the XOR.
fn nest_for_conjunction(expr: Expr) -> Expr {
    if binds_tighter_than_and(&expr) {
        expr
    } else {
        Expr::Nested(Box::new(expr))
    }
}

fn binds_tighter_than_and(expr: &Expr) -> bool {
    match expr {
        Expr::Identifier(_)
        | Expr::CompoundIdentifier(_)
        | Expr::Value(_)
        | Expr::Function(_)
        | Expr::Nested(_) => true,
        Expr::BinaryOp { left, op, right } => {
            matches!(
                op,
                BinaryOperator::And
                    | BinaryOperator::Eq
                    | BinaryOperator::NotEq
                    | BinaryOperator::Lt
                    | BinaryOperator::LtEq
                    | BinaryOperator::Gt
                    | BinaryOperator::GtEq
                    | BinaryOperator::Plus
                    | BinaryOperator::Minus
                    | BinaryOperator::Multiply
                    | BinaryOperator::Divide
                    | BinaryOperator::Modulo
            ) && binds_tighter_than_and(left)
                && binds_tighter_than_and(right)
        }
        Expr::UnaryOp {
            op: UnaryOperator::Minus | UnaryOperator::Plus,
            expr,
        } => binds_tighter_than_and(expr),
        Expr::IsNull(inner) | Expr::IsNotNull(inner) => binds_tighter_than_and(inner),
        Expr::InList { expr, list, .. } => {
            binds_tighter_than_and(expr) && list.iter().all(binds_tighter_than_and)
        }
        Expr::Between {
            expr, low, high, ..
        } => {
            binds_tighter_than_and(expr)
                && binds_tighter_than_and(low)
                && binds_tighter_than_and(high)
        }
        Expr::Like { expr, pattern, .. } => {
            binds_tighter_than_and(expr) && binds_tighter_than_and(pattern)
        }
        // NOT, CASE, subqueries and the rest are parenthesized.
        _ => false,
    }
}

fn branch_kind(body: &SetExpr) -> &'static str {
    match body {
        SetExpr::Select(_) => "select",
        SetExpr::Query(_) => "subquery",
        SetExpr::SetOperation { .. } => "set operation",
        SetExpr::Values(_) => "values",
        _ => "other",
    }
}

/// Result of data-scope injection.
#[derive(Debug, Clone, Serialize)]
pub struct InjectionResult {
    /// The original SQL statement.
    pub original_sql: String,
    /// The rewritten SQL, or the original when nothing was injected.
    pub rewritten_sql: String,
    /// The injected predicate.
    pub predicate: Option<String>,
    /// Tables in the scoped branches.
    pub tables_scoped: Vec<String>,
    /// SELECT branches that received the predicate.
    pub branches_scoped: usize,
    /// Branches skipped because they are not plain SELECTs.
    pub branches_skipped: usize,
}

impl InjectionResult {
    fn unchanged(sql: &str) -> Self {
        Self {
            original_sql: sql.to_string(),
            rewritten_sql: sql.to_string(),
            predicate: None,
            tables_scoped: Vec::new(),
            branches_scoped: 0,
            branches_skipped: 0,
        }
    }

    pub fn is_rewritten(&self) -> bool {
        self.branches_scoped > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rowscope_core::DataScopeType;

    fn injector() -> ScopeInjector {
        ScopeInjector::new(&ScopeConfig::default())
    }

    fn own(user_id: i64) -> DataScope {
        DataScope::new(DataScopeType::SelfOnly, user_id, "order:list")
    }

    #[test]
    fn test_select_without_where() {
        let result = injector().inject("SELECT * FROM orders", &own(7)).unwrap();
        assert_eq!(
            result.rewritten_sql,
            "SELECT * FROM orders WHERE create_user_id = 7"
        );
        assert_eq!(result.tables_scoped, vec!["orders".to_string()]);
        assert!(result.is_rewritten());
    }

    #[test]
    fn test_select_with_where() {
        let result = injector()
            .inject("SELECT * FROM orders WHERE status = 'pending'", &own(7))
            .unwrap();
        assert_eq!(
            result.rewritten_sql,
            "SELECT * FROM orders WHERE status = 'pending' AND create_user_id = 7"
        );
    }

    #[test]
    fn test_existing_disjunction_is_parenthesized() {
        let result = injector()
            .inject("SELECT * FROM orders WHERE a = 1 OR b = 2", &own(7))
            .unwrap();
        assert_eq!(
            result.rewritten_sql,
            "SELECT * FROM orders WHERE (a = 1 OR b = 2) AND create_user_id = 7"
        );
    }

    #[test]
    fn test_existing_xor_is_parenthesized() {
        let result = injector()
            .inject("SELECT * FROM orders WHERE a = 1 XOR b = 2", &own(7))
            .unwrap();
        assert_eq!(
            result.rewritten_sql,
            "SELECT * FROM orders WHERE (a = 1 XOR b = 2) AND create_user_id = 7"
        );
    }

    #[test]
    fn test_existing_pipe_or_is_parenthesized() {
        let result = injector()
            .inject("SELECT * FROM orders WHERE a = 1 || b = 2", &own(7))
            .unwrap();
        assert_eq!(
            result.rewritten_sql,
            "SELECT * FROM orders WHERE (a = 1 || b = 2) AND create_user_id = 7"
        );
    }

    #[test]
    fn test_existing_negation_is_parenthesized() {
        let result = injector()
            .inject("SELECT * FROM orders WHERE NOT a = 1", &own(7))
            .unwrap();
        assert_eq!(
            result.rewritten_sql,
            "SELECT * FROM orders WHERE (NOT a = 1) AND create_user_id = 7"
        );
    }

    #[test]
    fn test_simple_conditions_stay_bare() {
        let result = injector()
            .inject(
                "SELECT * FROM orders WHERE a IN (1, 2) AND b IS NULL AND c BETWEEN 1 AND 5",
                &own(7),
            )
            .unwrap();
        assert_eq!(
            result.rewritten_sql,
            "SELECT * FROM orders WHERE a IN (1, 2) AND b IS NULL AND c BETWEEN 1 AND 5 \
             AND create_user_id = 7"
        );
    }

    #[test]
    fn test_unknown_scope_under_xor_stays_restricted() {
        let scope = DataScope::new(DataScopeType::Unknown, 1, "order:list");
        let result = injector()
            .inject("SELECT * FROM orders WHERE a = 1 XOR b = 2", &scope)
            .unwrap();
        assert_eq!(
            result.rewritten_sql,
            "SELECT * FROM orders WHERE (a = 1 XOR b = 2) AND 1 = 0"
        );
    }

    #[test]
    fn test_custom_rule_with_xor_is_parenthesized() {
        let scope = DataScope::new(DataScopeType::Custom, 1, "order:list")
            .with_custom_rules("dept_id = 1 XOR dept_id = 2");
        let result = injector()
            .inject("SELECT * FROM orders WHERE paid = 1", &scope)
            .unwrap();
        assert_eq!(
            result.rewritten_sql,
            "SELECT * FROM orders WHERE paid = 1 AND (dept_id = 1 XOR dept_id = 2)"
        );
    }

    #[test]
    fn test_where_before_order_and_limit() {
        let result = injector()
            .inject("SELECT id FROM orders ORDER BY id DESC LIMIT 10", &own(7))
            .unwrap();
        assert_eq!(
            result.rewritten_sql,
            "SELECT id FROM orders WHERE create_user_id = 7 ORDER BY id DESC LIMIT 10"
        );
    }

    #[test]
    fn test_union_scopes_every_branch() {
        let result = injector()
            .inject(
                "SELECT id FROM a UNION ALL SELECT id FROM b WHERE x = 1 UNION SELECT id FROM c",
                &own(3),
            )
            .unwrap();
        assert_eq!(result.branches_scoped, 3);
        assert_eq!(result.branches_skipped, 0);
        assert_eq!(
            result.rewritten_sql,
            "SELECT id FROM a WHERE create_user_id = 3 UNION ALL \
             SELECT id FROM b WHERE x = 1 AND create_user_id = 3 UNION \
             SELECT id FROM c WHERE create_user_id = 3"
        );
    }

    #[test]
    fn test_nested_set_operation_branch_skipped() {
        let result = injector()
            .inject(
                "SELECT id FROM a UNION (SELECT id FROM b UNION SELECT id FROM c)",
                &own(3),
            )
            .unwrap();
        assert_eq!(result.branches_scoped, 1);
        assert_eq!(result.branches_skipped, 1);
        assert!(result.rewritten_sql.starts_with("SELECT id FROM a WHERE create_user_id = 3 UNION ("));
        assert!(result.rewritten_sql.contains("SELECT id FROM b UNION SELECT id FROM c"));
    }

    #[test]
    fn test_all_scope_is_byte_identical() {
        let sql = "select  *  from orders   where id=1";
        let scope = DataScope::new(DataScopeType::All, 1, "order:list").with_scope_user_ids([1]);
        let result = injector().inject(sql, &scope).unwrap();
        assert_eq!(result.rewritten_sql, sql);
        assert!(!result.is_rewritten());
    }

    #[test]
    fn test_no_predicate_is_byte_identical() {
        let sql = "select  *  from orders";
        let scope = DataScope::new(DataScopeType::Unit, 1, "order:list");
        assert_eq!(injector().inject(sql, &scope).unwrap().rewritten_sql, sql);
    }

    #[test]
    fn test_unknown_scope_injects_contradiction() {
        let scope = DataScope::new(DataScopeType::Unknown, 1, "order:list");
        let result = injector()
            .inject("SELECT * FROM orders WHERE id > 5", &scope)
            .unwrap();
        assert_eq!(
            result.rewritten_sql,
            "SELECT * FROM orders WHERE id > 5 AND 1 = 0"
        );
    }

    #[test]
    fn test_custom_rule_with_or_is_parenthesized() {
        let scope = DataScope::new(DataScopeType::Custom, 1, "order:list")
            .with_custom_rules("dept_id = 10 OR create_user_id = 1");
        let result = injector()
            .inject("SELECT * FROM orders WHERE status = 'open'", &scope)
            .unwrap();
        assert_eq!(
            result.rewritten_sql,
            "SELECT * FROM orders WHERE status = 'open' AND (dept_id = 10 OR create_user_id = 1)"
        );
    }

    #[test]
    fn test_parse_error() {
        let err = injector().inject("SELEC * FROM", &own(1)).unwrap_err();
        assert!(matches!(err, RlsError::ParseError(_)));
    }

    #[test]
    fn test_non_query_rejected() {
        let err = injector()
            .inject("UPDATE orders SET status = 'x'", &own(1))
            .unwrap_err();
        assert!(matches!(
            err,
            RlsError::NotAQuery {
                operation: crate::parser::SqlOperation::Update
            }
        ));
    }

    #[test]
    fn test_rewrite_fails_open_on_parse_error() {
        let sql = "SELECT * FROM orders WHERE";
        assert_eq!(injector().rewrite(sql, &own(1)), sql);
    }
}
