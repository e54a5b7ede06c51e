//! SQL parsing and analysis.

use std::fmt;

use rowscope_core::SqlDialectKind;
use serde::{Deserialize, Serialize};
use sqlparser::ast::{Expr, Select, Statement, TableFactor};
use sqlparser::dialect::{Dialect, GenericDialect, MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;
use sqlparser::tokenizer::Token;

use crate::error::RlsError;

/// Parses statements and standalone boolean expressions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlAnalyzer {
    dialect: SqlDialectKind,
}

impl SqlAnalyzer {
    /// Create a new SQL analyzer for the given dialect.
    pub fn new(dialect: SqlDialectKind) -> Self {
        Self { dialect }
    }

    fn dialect(&self) -> &'static dyn Dialect {
        match self.dialect {
            SqlDialectKind::Generic => &GenericDialect {},
            SqlDialectKind::Mysql => &MySqlDialect {},
            SqlDialectKind::Postgres => &PostgreSqlDialect {},
        }
    }

    /// Parse a SQL string into statements.
    pub fn parse(&self, sql: &str) -> Result<Vec<Statement>, RlsError> {
        Parser::parse_sql(self.dialect(), sql).map_err(|e| RlsError::ParseError(e.to_string()))
    }

    /// Parse a SQL string that must hold exactly one statement.
    pub fn parse_single(&self, sql: &str) -> Result<Statement, RlsError> {
        let mut statements = self.parse(sql)?;
        if statements.len() != 1 {
            return Err(RlsError::StatementCount(statements.len()));
        }
        Ok(statements.remove(0))
    }

    /// Parse a standalone boolean expression such as `dept_id IN (1, 2)`.
    ///
    /// The whole input must be consumed; trailing tokens are an error.
    pub fn parse_condition(&self, text: &str) -> Result<Expr, RlsError> {
        let mut parser = Parser::new(self.dialect())
            .try_with_sql(text)
            .map_err(|e| RlsError::ParseError(e.to_string()))?;
        let expr = parser
            .parse_expr()
            .map_err(|e| RlsError::ParseError(e.to_string()))?;

        let next = parser.peek_token();
        if next.token != Token::EOF {
            return Err(RlsError::ParseError(format!(
                "unexpected trailing input after expression: {}",
                next.token
            )));
        }
        Ok(expr)
    }

    /// Extract table names referenced by a SELECT's FROM clause and joins.
    pub fn extract_tables(&self, select: &Select) -> Vec<TableReference> {
        let mut tables = Vec::new();
        for table_with_joins in &select.from {
            self.push_table(&table_with_joins.relation, &mut tables);
            for join in &table_with_joins.joins {
                self.push_table(&join.relation, &mut tables);
            }
        }
        tables
    }

    fn push_table(&self, table_factor: &TableFactor, tables: &mut Vec<TableReference>) {
        if let TableFactor::Table { name, alias, .. } = table_factor {
            tables.push(TableReference {
                name: name.to_string(),
                alias: alias.as_ref().map(|a| a.name.value.clone()),
            });
        }
    }

    /// Get the type of SQL operation.
    pub fn get_operation(&self, stmt: &Statement) -> SqlOperation {
        match stmt {
            Statement::Query(_) => SqlOperation::Select,
            Statement::Insert { .. } => SqlOperation::Insert,
            Statement::Update { .. } => SqlOperation::Update,
            Statement::Delete(_) => SqlOperation::Delete,
            Statement::CreateTable { .. }
            | Statement::AlterTable { .. }
            | Statement::Drop { .. }
            | Statement::Truncate { .. } => SqlOperation::Ddl,
            _ => SqlOperation::Other,
        }
    }
}

/// A reference to a table in a SELECT.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableReference {
    /// The table name.
    pub name: String,
    /// Optional alias.
    pub alias: Option<String>,
}

/// Types of SQL operations. Also used as the caller's command-type flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlOperation {
    Select,
    Insert,
    Update,
    Delete,
    Ddl,
    Other,
}

impl fmt::Display for SqlOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SqlOperation::Select => "SELECT",
            SqlOperation::Insert => "INSERT",
            SqlOperation::Update => "UPDATE",
            SqlOperation::Delete => "DELETE",
            SqlOperation::Ddl => "DDL",
            SqlOperation::Other => "OTHER",
        };
        f.write_str(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_simple_select() {
        let analyzer = SqlAnalyzer::default();
        let stmt = analyzer.parse_single("SELECT * FROM users").unwrap();
        assert_eq!(analyzer.get_operation(&stmt), SqlOperation::Select);
    }

    #[test]
    fn test_parse_single_rejects_multiple() {
        let analyzer = SqlAnalyzer::default();
        let err = analyzer
            .parse_single("SELECT 1; SELECT 2")
            .unwrap_err();
        assert!(matches!(err, RlsError::StatementCount(2)));
    }

    #[test]
    fn test_parse_join_tables() {
        let analyzer = SqlAnalyzer::default();
        let stmt = analyzer
            .parse_single("SELECT * FROM orders o JOIN users u ON o.user_id = u.id")
            .unwrap();
        let Statement::Query(query) = stmt else {
            panic!("expected query");
        };
        let select = query.body.as_select().unwrap();

        let tables = analyzer.extract_tables(select);
        assert_eq!(tables.len(), 2);
        assert_eq!(tables[0].name, "orders");
        assert_eq!(tables[0].alias, Some("o".to_string()));
        assert_eq!(tables[1].name, "users");
        assert_eq!(tables[1].alias, Some("u".to_string()));
    }

    #[test]
    fn test_parse_condition() {
        let analyzer = SqlAnalyzer::default();
        let expr = analyzer.parse_condition("dept_id IN (1, 2) AND status = 'on'").unwrap();
        assert_eq!(expr.to_string(), "dept_id IN (1, 2) AND status = 'on'");
    }

    #[test]
    fn test_parse_condition_rejects_trailing_input() {
        let analyzer = SqlAnalyzer::default();
        assert!(analyzer.parse_condition("a = 1; DROP TABLE t").is_err());
        assert!(analyzer.parse_condition("a = 1 b").is_err());
        assert!(analyzer.parse_condition("a = ").is_err());
    }

    #[test]
    fn test_detect_operations() {
        let analyzer = SqlAnalyzer::new(SqlDialectKind::Postgres);
        let stmt = analyzer.parse_single("DELETE FROM t WHERE id = 1").unwrap();
        assert_eq!(analyzer.get_operation(&stmt), SqlOperation::Delete);
        let stmt = analyzer.parse_single("CREATE TABLE test (id INT)").unwrap();
        assert_eq!(analyzer.get_operation(&stmt), SqlOperation::Ddl);
    }
}
