//! Configuration types for rowscope.
//!
//! Configuration is loaded from a YAML file (typically `rowscope.yaml`):
//!
//! ```yaml
//! owner_column: create_user_id
//! dialect: mysql
//! custom_rule_failure: open
//! ignore:
//!   statements:
//!     - com.acme.user.UserMapper.selectLoginUser
//!   namespaces:
//!     - com.acme.system.ConfigMapper
//! cache:
//!   enabled: true
//!   ttl_secs: 300
//!   max_capacity: 10000
//! ```

pub mod ignore;

use serde::{Deserialize, Serialize};
use sqlparser::keywords::{
    ALL_KEYWORDS, ALL_KEYWORDS_INDEX, Keyword, RESERVED_FOR_COLUMN_ALIAS, RESERVED_FOR_IDENTIFIER,
};
use std::fs;
use std::path::Path;
use std::time::Duration;

pub use ignore::IgnoreConfig;

/// Complete rowscope configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScopeConfig {
    /// Column recording row ownership. Target of every owner predicate.
    #[serde(default = "default_owner_column")]
    pub owner_column: String,

    /// SQL dialect used to parse intercepted statements and custom rules.
    #[serde(default)]
    pub dialect: SqlDialectKind,

    /// What to inject when a custom rule fails to parse.
    #[serde(default)]
    pub custom_rule_failure: CustomRuleFailure,

    /// Statements and namespaces that bypass data-scope enforcement.
    #[serde(default)]
    pub ignore: IgnoreConfig,

    /// Policy-resolution cache settings.
    #[serde(default)]
    pub cache: CacheConfig,
}

impl Default for ScopeConfig {
    fn default() -> Self {
        Self {
            owner_column: default_owner_column(),
            dialect: SqlDialectKind::default(),
            custom_rule_failure: CustomRuleFailure::default(),
            ignore: IgnoreConfig::default(),
            cache: CacheConfig::default(),
        }
    }
}

/// SQL dialect selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlDialectKind {
    Generic,
    #[default]
    Mysql,
    Postgres,
}

/// Behavior when a custom rule cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CustomRuleFailure {
    /// Inject nothing; the branch keeps its original filter.
    #[default]
    Open,
    /// Inject a contradiction so the query returns no rows.
    Closed,
}

/// Policy-resolution cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Seconds a resolved scope stays cached after insertion.
    #[serde(default = "default_cache_ttl_secs")]
    pub ttl_secs: u64,

    /// Maximum number of cached (user, permission code) entries.
    #[serde(default = "default_cache_capacity")]
    pub max_capacity: u64,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: default_cache_ttl_secs(),
            max_capacity: default_cache_capacity(),
        }
    }
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ScopeConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse and validate configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check invariants that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !is_sql_identifier(&self.owner_column) {
            return Err(ConfigError::Config(format!(
                "owner_column '{}' is not a valid SQL identifier",
                self.owner_column
            )));
        }
        if let Some(word) = self.owner_column.split('.').find(|part| is_reserved_word(part)) {
            return Err(ConfigError::Config(format!(
                "owner_column '{}' uses reserved word '{}'",
                self.owner_column, word
            )));
        }
        if let Some(bad) = self.ignore.statements.iter().find(|s| s.trim().is_empty()) {
            return Err(ConfigError::Config(format!(
                "ignore.statements contains a blank entry: '{}'",
                bad
            )));
        }
        if let Some(bad) = self.ignore.namespaces.iter().find(|s| s.trim().is_empty()) {
            return Err(ConfigError::Config(format!(
                "ignore.namespaces contains a blank entry: '{}'",
                bad
            )));
        }
        if self.cache.enabled && (self.cache.ttl_secs == 0 || self.cache.max_capacity == 0) {
            return Err(ConfigError::Config(
                "cache.ttl_secs and cache.max_capacity must be positive when the cache is enabled"
                    .to_string(),
            ));
        }
        Ok(())
    }
}

/// Keywords that break a bare `<column> = <id>` predicate beyond the ones
/// sqlparser already reserves.
const RESERVED_COLUMN_WORDS: &[Keyword] = &[
    Keyword::ALL,
    Keyword::AND,
    Keyword::ANY,
    Keyword::AS,
    Keyword::BETWEEN,
    Keyword::BY,
    Keyword::CASE,
    Keyword::DISTINCT,
    Keyword::DIV,
    Keyword::ELSE,
    Keyword::FALSE,
    Keyword::IN,
    Keyword::IS,
    Keyword::JOIN,
    Keyword::LIKE,
    Keyword::NOT,
    Keyword::NULL,
    Keyword::ON,
    Keyword::OR,
    Keyword::REGEXP,
    Keyword::TABLE,
    Keyword::THEN,
    Keyword::TRUE,
    Keyword::WHEN,
    Keyword::XOR,
];

/// Whether `word` is an SQL keyword that cannot stand unquoted as a column
/// name (`order`, `select`, `and`, ...).
pub fn is_reserved_word(word: &str) -> bool {
    let upper = word.to_ascii_uppercase();
    ALL_KEYWORDS
        .binary_search(&upper.as_str())
        .is_ok_and(|i| {
            let keyword = ALL_KEYWORDS_INDEX[i];
            RESERVED_FOR_COLUMN_ALIAS.contains(&keyword)
                || RESERVED_FOR_IDENTIFIER.contains(&keyword)
                || RESERVED_COLUMN_WORDS.contains(&keyword)
        })
}

/// Whether `name` is a plain or dot-qualified SQL identifier
/// (`col`, `t.col`, `schema.t.col`).
pub fn is_sql_identifier(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
                }
                _ => false,
            }
        })
}

// Default value functions
fn default_owner_column() -> String {
    "create_user_id".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_capacity() -> u64 {
    10_000
}
