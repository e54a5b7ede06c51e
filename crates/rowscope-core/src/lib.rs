//! # rowscope-core
//!
//! Shared data model and configuration for rowscope.
//!
//! A [`DataScope`] is the resolved row-level policy for one identity and one
//! permission code. It is produced per request by an external policy
//! collaborator and consumed (never mutated) by the SQL rewriter.
//!
//! Configuration is loaded from YAML (`rowscope.yaml`) into a [`ScopeConfig`].

// Configuration types shared across all rowscope crates
pub mod config;
pub mod scope;

pub use config::{
    is_reserved_word, is_sql_identifier, CacheConfig, ConfigError, CustomRuleFailure, IgnoreConfig, ScopeConfig,
    SqlDialectKind,
};
pub use scope::{DataScope, DataScopeType, UserId};
