//! `rowscope rewrite` command implementation.
//!
//! Runs one statement through the interceptor exactly as an application
//! would, with the policy collaborator replaced by a scope file.

use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rowscope_core::{DataScope, ScopeConfig};
use rowscope_rls::{
    CacheStats, CachedDataScopeHandler, DataScopeHandler, DataScopeInterceptor, Decision,
    FixedScopeHandler, Interception, PredicateBuilder, SqlOperation,
};

use super::load_config;

#[derive(Debug)]
pub struct RewriteArgs {
    pub config: Option<PathBuf>,
    pub scope: PathBuf,
    pub sql: Option<String>,
    pub statement_id: String,
    pub command: SqlOperation,
    pub json: bool,
}

/// Outcome of a rewrite, printed with `--json`.
#[derive(Debug, Serialize)]
pub struct RewriteReport {
    pub statement_id: String,
    pub command: SqlOperation,
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub predicate: Option<String>,
    pub original_sql: String,
    pub sql: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheStats>,
}

pub fn parse_command_type(s: &str) -> Result<SqlOperation, String> {
    match s.to_ascii_lowercase().as_str() {
        "select" => Ok(SqlOperation::Select),
        "insert" => Ok(SqlOperation::Insert),
        "update" => Ok(SqlOperation::Update),
        "delete" => Ok(SqlOperation::Delete),
        "ddl" => Ok(SqlOperation::Ddl),
        "other" => Ok(SqlOperation::Other),
        _ => Err(format!(
            "unknown command type '{}' (expected select, insert, update, delete, ddl or other)",
            s
        )),
    }
}

/// Load a [`DataScope`] from a YAML or JSON file.
pub fn load_scope(path: &Path) -> Result<DataScope> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read scope file {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse scope file {}", path.display()))
}

/// Rewrite `sql` for a request whose policy resolves to `scope`.
pub fn rewrite(
    config: &ScopeConfig,
    scope: DataScope,
    statement_id: &str,
    command: SqlOperation,
    sql: &str,
) -> RewriteReport {
    let predicate = if command == SqlOperation::Select {
        PredicateBuilder::new(config).build_sql(&scope).ok().flatten()
    } else {
        None
    };

    let handler = FixedScopeHandler::new(scope.permission_code.clone(), scope.current_user_id)
        .with_scope(scope);

    let (interception, cache) = if config.cache.enabled {
        let handler = Arc::new(CachedDataScopeHandler::from_config(handler, &config.cache));
        let out = intercept_with(config, Arc::clone(&handler), statement_id, command, sql);
        (out, Some(handler.stats()))
    } else {
        (intercept_with(config, handler, statement_id, command, sql), None)
    };

    RewriteReport {
        statement_id: statement_id.to_string(),
        command,
        decision: interception.decision,
        predicate: predicate.filter(|_| interception.decision.is_rewritten()),
        original_sql: sql.to_string(),
        sql: interception.sql,
        cache,
    }
}

fn intercept_with<H: DataScopeHandler>(
    config: &ScopeConfig,
    handler: H,
    statement_id: &str,
    command: SqlOperation,
    sql: &str,
) -> Interception {
    DataScopeInterceptor::new(config, handler).before_query(statement_id, command, sql)
}

pub fn run(args: RewriteArgs) -> Result<()> {
    let config = load_config(args.config.as_deref())?;
    let scope = load_scope(&args.scope)?;

    let sql = match args.sql {
        Some(sql) => sql,
        None => {
            let mut buf = String::new();
            io::stdin()
                .read_to_string(&mut buf)
                .context("failed to read SQL from stdin")?;
            buf.trim_end().to_string()
        }
    };
    if sql.trim().is_empty() {
        anyhow::bail!("no SQL given: pass --sql or pipe a statement on stdin");
    }

    let report = rewrite(&config, scope, &args.statement_id, args.command, &sql);
    tracing::debug!(decision = ?report.decision, "Rewrite finished");

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.sql);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rowscope_core::DataScopeType;
    use std::io::Write;

    #[test]
    fn test_rewrite_report() {
        let scope = DataScope::new(DataScopeType::SelfOnly, 42, "order:list");
        let report = rewrite(
            &ScopeConfig::default(),
            scope,
            "app.OrderMapper.selectPage",
            SqlOperation::Select,
            "SELECT * FROM orders",
        );
        assert_eq!(report.decision, Decision::Rewritten);
        assert_eq!(report.sql, "SELECT * FROM orders WHERE create_user_id = 42");
        assert_eq!(report.predicate.as_deref(), Some("create_user_id = 42"));
        assert_eq!(report.cache.map(|c| c.misses), Some(1));
    }

    #[test]
    fn test_rewrite_skips_non_select() {
        let scope = DataScope::new(DataScopeType::SelfOnly, 42, "order:list");
        let sql = "DELETE FROM orders WHERE id = 1";
        let report = rewrite(&ScopeConfig::default(), scope, "x.y", SqlOperation::Delete, sql);
        assert_eq!(report.decision, Decision::NotSelect);
        assert_eq!(report.sql, sql);
        assert_eq!(report.predicate, None);
    }

    #[test]
    fn test_load_scope_from_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "scope_type: UNIT_AND_CHILD\ncurrent_user_id: 1\npermission_code: \"order:list\"\nscope_user_ids: [3, 4]"
        )
        .unwrap();

        let scope = load_scope(file.path()).unwrap();
        assert_eq!(scope.scope_type, DataScopeType::UnitAndChild);
        assert_eq!(scope.scope_user_ids.len(), 2);
    }

    #[test]
    fn test_parse_command_type() {
        assert_eq!(parse_command_type("SELECT").unwrap(), SqlOperation::Select);
        assert!(parse_command_type("merge").is_err());
    }
}
