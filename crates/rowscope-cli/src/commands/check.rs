//! `rowscope check` command implementation.
//!
//! Validates a configuration file and, optionally, a rules file that
//! declares per-field operator sets and the conditions built from them:
//! - configuration loads and passes its own validation
//! - every field operator set builds (operators match the field's type)
//! - every condition is allowed by its field's set and renders
//! - the rendered rule parses as a boolean expression in the configured dialect

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use rowscope_condition::{
    ConditionBuilder, ConditionOperator, ConditionRegistry, ParameterType, ScopeCondition,
    VariableValue, render_conditions,
};
use rowscope_core::{ConfigError, CustomRuleFailure, ScopeConfig};
use rowscope_rls::SqlAnalyzer;

/// Severity level for check results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARN"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A single check finding.
#[derive(Debug, Clone)]
pub struct CheckFinding {
    pub severity: Severity,
    /// Category of the check that produced this finding.
    pub category: &'static str,
    pub message: String,
    pub file: Option<PathBuf>,
    /// Location within the file (e.g. `fields[2]`).
    pub location: Option<String>,
}

impl CheckFinding {
    fn error(category: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, category, message)
    }

    fn warning(category: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, category, message)
    }

    fn info(category: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, category, message)
    }

    fn new(severity: Severity, category: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity,
            category,
            message: message.into(),
            file: None,
            location: None,
        }
    }

    fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = Some(file.into());
        self
    }

    fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }
}

/// Results from running all checks.
#[derive(Debug, Default)]
pub struct CheckResults {
    pub findings: Vec<CheckFinding>,
}

impl CheckResults {
    fn add(&mut self, finding: CheckFinding) {
        self.findings.push(finding);
    }

    pub fn has_errors(&self) -> bool {
        self.count(Severity::Error) > 0
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings.iter().filter(|f| f.severity == severity).count()
    }

    /// Print human-readable summary.
    pub fn print_summary(&self) {
        let mut findings: Vec<_> = self.findings.iter().collect();
        findings.sort_by(|a, b| b.severity.cmp(&a.severity).then(a.category.cmp(b.category)));

        for finding in &findings {
            print_finding(finding);
        }

        println!();
        println!("{}", "═".repeat(60));
        let errors = self.count(Severity::Error);
        let warnings = self.count(Severity::Warning);
        if errors == 0 && warnings == 0 {
            println!("✅ All checks passed!");
        } else {
            println!("Summary: {} error(s), {} warning(s)", errors, warnings);
        }
    }
}

fn print_finding(finding: &CheckFinding) {
    let icon = match finding.severity {
        Severity::Error => "✗",
        Severity::Warning => "⚠",
        Severity::Info => "ℹ",
    };

    let location = match (&finding.file, &finding.location) {
        (Some(f), Some(l)) => format!(" [{}:{}]", f.display(), l),
        (Some(f), None) => format!(" [{}]", f.display()),
        (None, Some(l)) => format!(" [{}]", l),
        (None, None) => String::new(),
    };

    println!(
        "  {} {} [{}]{}: {}",
        icon, finding.severity, finding.category, location, finding.message
    );
}

/// Rules file layout.
#[derive(Debug, Default, Deserialize)]
pub struct RulesFile {
    #[serde(default)]
    pub fields: Vec<FieldRule>,

    #[serde(default)]
    pub conditions: Vec<ScopeCondition>,

    /// Sample variable values used to render the conditions.
    #[serde(default)]
    pub variables: HashMap<String, serde_json::Value>,
}

/// Operator set declaration for one field.
#[derive(Debug, Deserialize)]
pub struct FieldRule {
    pub field: String,
    pub parameter_type: ParameterType,
    #[serde(default)]
    pub add: Vec<ConditionOperator>,
    #[serde(default)]
    pub remove: Vec<ConditionOperator>,
}

impl FieldRule {
    fn build(&self) -> Result<ConditionBuilder, rowscope_condition::ValidationError> {
        let mut builder = ConditionBuilder::of(self.field.as_str(), self.parameter_type)?
            .add_all(self.add.iter().copied())?;
        for op in &self.remove {
            builder = builder.remove(*op)?;
        }
        Ok(builder)
    }
}

/// Check a loaded configuration.
pub fn check_config(config: &ScopeConfig) -> Vec<CheckFinding> {
    let mut findings = Vec::new();

    if config.custom_rule_failure == CustomRuleFailure::Open {
        findings.push(CheckFinding::warning(
            "config",
            "custom_rule_failure is 'open': a malformed custom rule leaves queries unrestricted",
        ));
    }
    if !config.cache.enabled {
        findings.push(CheckFinding::info(
            "config",
            "policy cache is disabled, every statement resolves its scope",
        ));
    }
    findings
}

/// Check a rules file against the configuration.
pub fn check_rules(config: &ScopeConfig, rules: &RulesFile) -> Vec<CheckFinding> {
    let mut findings = Vec::new();
    let mut registry = ConditionRegistry::new();

    for (i, rule) in rules.fields.iter().enumerate() {
        match rule.build() {
            Ok(builder) => {
                registry.register(builder.build());
            }
            Err(e) => findings.push(
                CheckFinding::error("fields", e.to_string()).with_location(format!("fields[{}]", i)),
            ),
        }
    }

    let variables: HashMap<String, VariableValue> = rules
        .variables
        .iter()
        .map(|(name, value)| (name.clone(), VariableValue::from(value.clone())))
        .collect();

    let registry = (!registry.is_empty()).then_some(&registry);
    match render_conditions(&rules.conditions, &variables, registry) {
        Ok(Some(rule)) => match SqlAnalyzer::new(config.dialect).parse_condition(&rule) {
            Ok(_) => findings.push(CheckFinding::info("conditions", format!("rendered rule: {}", rule))),
            Err(e) => findings.push(CheckFinding::error(
                "conditions",
                format!("rendered rule does not parse: {} ({})", rule, e),
            )),
        },
        Ok(None) => {}
        Err(e) => findings.push(CheckFinding::error("conditions", e.to_string())),
    }

    findings
}

pub fn run_quiet(config_path: &Path, rules_path: Option<&Path>) -> Result<CheckResults> {
    let mut results = CheckResults::default();

    let config = match ScopeConfig::from_file(config_path) {
        Ok(config) => config,
        Err(ConfigError::Io(e)) => {
            return Err(e).with_context(|| format!("failed to read {}", config_path.display()));
        }
        Err(e) => {
            results.add(CheckFinding::error("config", e.to_string()).with_file(config_path));
            return Ok(results);
        }
    };

    for finding in check_config(&config) {
        results.add(finding.with_file(config_path));
    }

    if let Some(rules_path) = rules_path {
        let content = fs::read_to_string(rules_path)
            .with_context(|| format!("failed to read {}", rules_path.display()))?;
        match serde_yaml::from_str::<RulesFile>(&content) {
            Ok(rules) => {
                for finding in check_rules(&config, &rules) {
                    results.add(finding.with_file(rules_path));
                }
            }
            Err(e) => results.add(CheckFinding::error("rules", e.to_string()).with_file(rules_path)),
        }
    }

    Ok(results)
}

pub fn run(config_path: &Path, rules_path: Option<&Path>) -> Result<()> {
    let results = run_quiet(config_path, rules_path)?;
    results.print_summary();
    if results.has_errors() {
        anyhow::bail!(
            "configuration check failed with {} error(s)",
            results.count(Severity::Error)
        );
    }
    Ok(())
}
