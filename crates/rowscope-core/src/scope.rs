//! Resolved data-scope policies.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

/// Identifier of an application user.
pub type UserId = i64;

/// The kind of row-level policy a [`DataScope`] carries.
///
/// Priority is only used for ordering scopes against each other (lower value
/// means broader access); it never influences predicate construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataScopeType {
    /// Every row is visible.
    All,
    /// Rows owned by the user's organization unit and its descendants.
    UnitAndChild,
    /// Rows owned by the user's organization unit.
    Unit,
    /// Rows owned by the user and by descendant units.
    SelfAndChild,
    /// Rows matching a custom boolean rule.
    Custom,
    /// Rows owned by the current user only.
    #[serde(rename = "SELF")]
    SelfOnly,
    /// Policy resolution is broken or the type is not recognized.
    #[serde(other)]
    Unknown,
}

impl DataScopeType {
    /// All recognized scope types, in priority order.
    pub const KNOWN: [DataScopeType; 6] = [
        DataScopeType::All,
        DataScopeType::UnitAndChild,
        DataScopeType::Unit,
        DataScopeType::SelfAndChild,
        DataScopeType::Custom,
        DataScopeType::SelfOnly,
    ];

    /// Stable storage code of this scope type.
    pub fn code(&self) -> &'static str {
        match self {
            DataScopeType::All => "1",
            DataScopeType::UnitAndChild => "2",
            DataScopeType::Unit => "3",
            DataScopeType::SelfAndChild => "4",
            DataScopeType::Custom => "5",
            DataScopeType::SelfOnly => "6",
            DataScopeType::Unknown => "0",
        }
    }

    /// Human-readable name.
    pub fn name(&self) -> &'static str {
        match self {
            DataScopeType::All => "All data",
            DataScopeType::UnitAndChild => "Own unit and child units",
            DataScopeType::Unit => "Own unit",
            DataScopeType::SelfAndChild => "Self and child units",
            DataScopeType::Custom => "Custom rule",
            DataScopeType::SelfOnly => "Self only",
            DataScopeType::Unknown => "Unknown",
        }
    }

    pub fn priority(&self) -> u8 {
        match self {
            DataScopeType::All => 1,
            DataScopeType::UnitAndChild => 2,
            DataScopeType::Unit => 3,
            DataScopeType::SelfAndChild => 4,
            DataScopeType::Custom => 5,
            DataScopeType::SelfOnly => 6,
            DataScopeType::Unknown => u8::MAX,
        }
    }

    /// Compare by priority. `Less` means `self` grants broader access.
    pub fn compare_priority(&self, other: &DataScopeType) -> Ordering {
        self.priority().cmp(&other.priority())
    }

    /// Look up a scope type by its storage code.
    ///
    /// Unrecognized codes map to [`DataScopeType::Unknown`] so that a bad
    /// policy row restricts rather than widens access.
    pub fn from_code(code: &str) -> Self {
        Self::KNOWN
            .into_iter()
            .find(|t| t.code() == code.trim())
            .unwrap_or(DataScopeType::Unknown)
    }
}

impl fmt::Display for DataScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DataScopeType::All => "ALL",
            DataScopeType::UnitAndChild => "UNIT_AND_CHILD",
            DataScopeType::Unit => "UNIT",
            DataScopeType::SelfAndChild => "SELF_AND_CHILD",
            DataScopeType::Custom => "CUSTOM",
            DataScopeType::SelfOnly => "SELF",
            DataScopeType::Unknown => "UNKNOWN",
        };
        f.write_str(label)
    }
}

/// One resolved data-scope policy.
///
/// Built by the policy collaborator for a single request and handed to the
/// rewriter by reference.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataScope {
    pub scope_type: DataScopeType,

    /// The user the query runs on behalf of.
    pub current_user_id: UserId,

    /// Users whose rows are visible under this scope.
    #[serde(default)]
    pub scope_user_ids: BTreeSet<UserId>,

    /// Permission code this scope was resolved for.
    #[serde(default)]
    pub permission_code: String,

    /// Optional comma-separated list of visible fields.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_fields: Option<String>,

    /// Optional raw boolean SQL fragment, used with [`DataScopeType::Custom`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_rules: Option<String>,
}

impl DataScope {
    pub fn new(
        scope_type: DataScopeType,
        current_user_id: UserId,
        permission_code: impl Into<String>,
    ) -> Self {
        Self {
            scope_type,
            current_user_id,
            scope_user_ids: BTreeSet::new(),
            permission_code: permission_code.into(),
            custom_fields: None,
            custom_rules: None,
        }
    }

    pub fn with_scope_user_ids(mut self, ids: impl IntoIterator<Item = UserId>) -> Self {
        self.scope_user_ids.extend(ids);
        self
    }

    pub fn with_custom_rules(mut self, rules: impl Into<String>) -> Self {
        self.custom_rules = Some(rules.into());
        self
    }

    pub fn with_custom_fields(mut self, fields: impl Into<String>) -> Self {
        self.custom_fields = Some(fields.into());
        self
    }

    /// Whether this scope grants unrestricted access.
    pub fn is_all(&self) -> bool {
        self.scope_type == DataScopeType::All
    }

    /// Custom rule text, if present and non-blank.
    pub fn custom_rule_text(&self) -> Option<&str> {
        self.custom_rules
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }

    /// Visible fields parsed from `custom_fields`.
    pub fn visible_fields(&self) -> Vec<&str> {
        self.custom_fields
            .as_deref()
            .map(|f| {
                f.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_code_known_and_unknown() {
        assert_eq!(DataScopeType::from_code("1"), DataScopeType::All);
        assert_eq!(DataScopeType::from_code("6"), DataScopeType::SelfOnly);
        assert_eq!(DataScopeType::from_code(" 5 "), DataScopeType::Custom);
        assert_eq!(DataScopeType::from_code("9"), DataScopeType::Unknown);
        assert_eq!(DataScopeType::from_code(""), DataScopeType::Unknown);
    }

    #[test]
    fn test_priority_ordering() {
        assert_eq!(
            DataScopeType::All.compare_priority(&DataScopeType::SelfOnly),
            Ordering::Less
        );
        assert_eq!(
            DataScopeType::Custom.compare_priority(&DataScopeType::Custom),
            Ordering::Equal
        );
        assert_eq!(
            DataScopeType::Unknown.compare_priority(&DataScopeType::SelfOnly),
            Ordering::Greater
        );
    }

    #[test]
    fn test_deserialize_unrecognized_type_is_unknown() {
        let scope: DataScope = serde_json::from_str(
            r#"{"scope_type": "DEPARTMENT", "current_user_id": 7, "permission_code": "order:list"}"#,
        )
        .unwrap();
        assert_eq!(scope.scope_type, DataScopeType::Unknown);
        assert!(scope.scope_user_ids.is_empty());
    }

    #[test]
    fn test_deserialize_self_scope() {
        let scope: DataScope =
            serde_json::from_str(r#"{"scope_type": "SELF", "current_user_id": 42}"#).unwrap();
        assert_eq!(scope.scope_type, DataScopeType::SelfOnly);
        assert_eq!(scope.current_user_id, 42);
    }

    #[test]
    fn test_custom_rule_text_ignores_blank() {
        let scope = DataScope::new(DataScopeType::Custom, 1, "p").with_custom_rules("   ");
        assert_eq!(scope.custom_rule_text(), None);

        let scope = DataScope::new(DataScopeType::Custom, 1, "p").with_custom_rules(" a = 1 ");
        assert_eq!(scope.custom_rule_text(), Some("a = 1"));
    }

    #[test]
    fn test_visible_fields() {
        let scope = DataScope::new(DataScopeType::All, 1, "p").with_custom_fields("id, name,,email");
        assert_eq!(scope.visible_fields(), vec!["id", "name", "email"]);
    }
}
