//! # rowscope-rls
//!
//! Row-level data-scope enforcement for SELECT statements.
//!
//! This crate provides functionality to:
//! - Parse SQL using `sqlparser`
//! - Build the predicate a [`DataScope`](rowscope_core::DataScope) implies
//! - Inject it into every plain SELECT branch of a query, UNIONs included
//! - Decide per statement whether scope applies at all ([`DataScopeInterceptor`])
//!
//! ## How It Works
//!
//! **Before (from the application, scope `SELF` for user 42):**
//! ```sql
//! SELECT * FROM orders WHERE status = 'pending'
//! ```
//!
//! **After (to the database):**
//! ```sql
//! SELECT * FROM orders WHERE status = 'pending' AND create_user_id = 42
//! ```
//!
//! ## Scope Behavior
//!
//! | Scope                  | Injected predicate                 |
//! |------------------------|------------------------------------|
//! | `ALL`                  | none, SQL untouched                |
//! | `SELF`                 | `owner_column = current_user_id`   |
//! | `CUSTOM` with rules    | the rule text                      |
//! | any, with user ids     | `owner_column IN (ids)`            |
//! | `UNKNOWN`              | `1 = 0`                            |
//!
//! An existing WHERE clause is parenthesized before the AND unless it only
//! uses operators that bind at least as tightly, so `OR`, `XOR` and MySQL's
//! `||` in either operand cannot widen the result.
//!
//! Rewriting never fails a statement: on error the original SQL executes.

pub mod error;
pub mod handler;
pub mod ignore;
pub mod injector;
pub mod interceptor;
pub mod parser;
pub mod predicate;

pub use error::RlsError;
pub use handler::{
    CacheStats, CachedDataScopeHandler, DEFAULT_CACHE_CAPACITY, DEFAULT_CACHE_TTL,
    DataScopeHandler, FixedScopeHandler,
};
pub use ignore::IgnoreRegistry;
pub use injector::{InjectionResult, ScopeInjector};
pub use interceptor::{DataScopeInterceptor, Decision, Interception};
pub use parser::{SqlAnalyzer, SqlOperation, TableReference};
pub use predicate::{CONTRADICTION, PredicateBuilder};
