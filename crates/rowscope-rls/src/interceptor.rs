//! Statement interception.
//!
//! [`DataScopeInterceptor`] sits in front of statement execution. For every
//! statement it decides whether data scope applies, resolves the scope from
//! its [`DataScopeHandler`], and rewrites the SQL. It never fails the
//! statement: on any error the original SQL goes through and the error is
//! logged.

use rowscope_core::ScopeConfig;
use serde::Serialize;

use crate::handler::DataScopeHandler;
use crate::ignore::IgnoreRegistry;
use crate::injector::ScopeInjector;
use crate::parser::SqlOperation;

/// What the interceptor did with a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    /// The statement is on the ignore list.
    Ignored,
    /// The statement is not a SELECT.
    NotSelect,
    /// The request carries no permission code.
    NoPermissionCode,
    /// No scope is configured for the permission code.
    PolicyMissing,
    /// The scope grants access to all rows.
    AllAccess,
    /// The scope injected nothing.
    Unchanged,
    /// The predicate was injected.
    Rewritten,
    /// Policy resolution or rewriting failed; the SQL went through unchanged.
    Failed,
}

impl Decision {
    pub fn is_rewritten(self) -> bool {
        self == Decision::Rewritten
    }
}

/// The SQL to execute and why.
#[derive(Debug, Clone, Serialize)]
pub struct Interception {
    pub sql: String,
    pub decision: Decision,
}

impl Interception {
    fn passthrough(sql: &str, decision: Decision) -> Self {
        Self {
            sql: sql.to_string(),
            decision,
        }
    }
}

/// Rewrites SELECT statements according to the caller's data scope.
pub struct DataScopeInterceptor<H> {
    handler: H,
    ignore: IgnoreRegistry,
    injector: ScopeInjector,
}

impl<H: DataScopeHandler> DataScopeInterceptor<H> {
    pub fn new(config: &ScopeConfig, handler: H) -> Self {
        Self {
            handler,
            ignore: IgnoreRegistry::from_config(&config.ignore),
            injector: ScopeInjector::new(config),
        }
    }

    /// Replace the ignore list built from configuration.
    pub fn with_ignore(mut self, ignore: IgnoreRegistry) -> Self {
        self.ignore = ignore;
        self
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn ignore_registry(&self) -> &IgnoreRegistry {
        &self.ignore
    }

    /// Decide and rewrite a statement about to execute.
    ///
    /// Everything logged while deciding, predicate construction included,
    /// runs inside a `data_scope` span carrying `statement_id`.
    pub fn before_query(
        &self,
        statement_id: &str,
        command_type: SqlOperation,
        sql: &str,
    ) -> Interception {
        let _span = tracing::info_span!("data_scope", statement_id).entered();

        if self.ignore.will_ignore(statement_id) {
            tracing::debug!(statement_id, "Statement is ignored, skipping data scope");
            return Interception::passthrough(sql, Decision::Ignored);
        }

        if command_type != SqlOperation::Select {
            tracing::debug!(
                statement_id,
                command = %command_type,
                "Statement is not a SELECT, skipping data scope"
            );
            return Interception::passthrough(sql, Decision::NotSelect);
        }

        let Some(permission_code) = self
            .handler
            .permission_code()
            .filter(|code| !code.trim().is_empty())
        else {
            tracing::debug!(statement_id, "Request has no permission code, skipping data scope");
            return Interception::passthrough(sql, Decision::NoPermissionCode);
        };

        let scope = match self.handler.data_scope(&permission_code) {
            Ok(Some(scope)) => scope,
            Ok(None) => {
                tracing::warn!(
                    statement_id,
                    permission_code = %permission_code,
                    "No data scope configured for permission code"
                );
                return Interception::passthrough(sql, Decision::PolicyMissing);
            }
            Err(e) => {
                tracing::error!(
                    statement_id,
                    permission_code = %permission_code,
                    error = %e,
                    "Failed to resolve data scope"
                );
                return Interception::passthrough(sql, Decision::Failed);
            }
        };

        if scope.is_all() {
            tracing::debug!(
                statement_id,
                permission_code = %permission_code,
                "Data scope grants all rows"
            );
            return Interception::passthrough(sql, Decision::AllAccess);
        }

        match self.injector.inject(sql, &scope) {
            Ok(result) if result.is_rewritten() => {
                tracing::debug!(
                    statement_id,
                    permission_code = %permission_code,
                    rewritten_sql = %result.rewritten_sql,
                    "Data scope applied"
                );
                Interception {
                    sql: result.rewritten_sql,
                    decision: Decision::Rewritten,
                }
            }
            Ok(result) => {
                tracing::warn!(
                    statement_id,
                    permission_code = %permission_code,
                    scope_type = %scope.scope_type,
                    user_id = scope.current_user_id,
                    branches_skipped = result.branches_skipped,
                    "Restricted data scope injected no predicate, rows are unrestricted"
                );
                Interception::passthrough(sql, Decision::Unchanged)
            }
            Err(e) => {
                tracing::error!(
                    statement_id,
                    permission_code = %permission_code,
                    error = %e,
                    sql,
                    "Failed to apply data scope, executing original SQL"
                );
                Interception::passthrough(sql, Decision::Failed)
            }
        }
    }

    /// Like [`before_query`](Self::before_query), returning only the SQL.
    pub fn intercept(&self, statement_id: &str, command_type: SqlOperation, sql: &str) -> String {
        self.before_query(statement_id, command_type, sql).sql
    }
}
