//! Error types for the RLS crate.

use thiserror::Error;

use crate::parser::SqlOperation;

/// Errors that can occur while rewriting a statement.
#[derive(Debug, Error)]
pub enum RlsError {
    /// SQL or rule text failed to parse.
    #[error("failed to parse SQL: {0}")]
    ParseError(String),

    /// The input held zero or several statements.
    #[error("expected exactly one statement, found {0}")]
    StatementCount(usize),

    /// The statement is not a query and cannot be scoped.
    #[error("statement is not a query: {operation}")]
    NotAQuery { operation: SqlOperation },

    /// The policy collaborator failed.
    #[error("policy resolution failed: {0}")]
    Policy(#[from] anyhow::Error),
}
