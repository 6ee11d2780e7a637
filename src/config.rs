//! Mapping configuration: base field renames plus conditional rules.
//!
//! ```json
//! {
//!   "version": "1.0",
//!   "name": "web normalization",
//!   "mappings": [{ "source": "src_ip", "target": "source_address" }],
//!   "rules": [{
//!     "id": "apache",
//!     "conditions": [{ "type": "sourcetype", "operator": "equals", "value": "access_combined" }],
//!     "mappings": [{ "source": "clientip", "target": "source_address" }],
//!     "priority": 10,
//!     "enabled": true
//!   }]
//! }
//! ```
//!
//! Unknown condition types or operators fail while decoding; everything
//! else is checked by [`Configuration::validate`], which reports every
//! problem at once.

use std::collections::HashSet;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigurationError {
    #[error("invalid configuration JSON: {0}")]
    Json(String),
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl From<serde_json::Error> for ConfigurationError {
    fn from(err: serde_json::Error) -> Self {
        ConfigurationError::Json(err.to_string())
    }
}

/// Exact, case-sensitive rename of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mapping {
    pub source: String,
    pub target: String,
}

impl Mapping {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Mapping {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Where a condition looks for its facts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionType {
    /// Context `sourcetype`, else the query's own `sourcetype=` terms
    Sourcetype,
    /// Context `source`, else the query's own `source=` terms
    Source,
    /// Context value under the condition's `field`
    #[serde(alias = "field_value")]
    Field,
    /// Same lookup as [`ConditionType::Field`]
    #[serde(alias = "context-key", alias = "context")]
    ContextKey,
    /// Context `datamodel`, else the data models the query uses
    Datamodel,
}

impl ConditionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::Sourcetype => "sourcetype",
            ConditionType::Source => "source",
            ConditionType::Field => "field",
            ConditionType::ContextKey => "context_key",
            ConditionType::Datamodel => "datamodel",
        }
    }

    /// True for types that fall back to what the query itself declares.
    pub fn is_query_derived(&self) -> bool {
        matches!(
            self,
            ConditionType::Sourcetype | ConditionType::Source | ConditionType::Datamodel
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionOperator {
    Equals,
    NotEquals,
    Contains,
    #[serde(alias = "regex")]
    Matches,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "type")]
    pub kind: ConditionType,
    pub operator: ConditionOperator,
    pub value: String,
    /// Context key for `field` and `context_key` conditions
    #[serde(default, alias = "key", skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl Condition {
    pub fn new(kind: ConditionType, operator: ConditionOperator, value: impl Into<String>) -> Self {
        Condition {
            kind,
            operator,
            value: value.into(),
            field: None,
        }
    }

    /// Context key this condition reads.
    pub fn key(&self) -> &str {
        match self.kind {
            ConditionType::Field | ConditionType::ContextKey => {
                self.field.as_deref().unwrap_or_default()
            }
            kind => kind.as_str(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// All must hold; at least one is required
    #[serde(default)]
    pub conditions: Vec<Condition>,
    pub mappings: Vec<Mapping>,
    pub priority: i64,
    /// Omitted means disabled
    #[serde(default)]
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Configuration {
    pub version: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub mappings: Vec<Mapping>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,
}

impl Default for Configuration {
    fn default() -> Self {
        Configuration {
            version: DEFAULT_VERSION.to_string(),
            name: String::new(),
            description: String::new(),
            mappings: Vec::new(),
            rules: Vec::new(),
        }
    }
}

impl Configuration {
    /// Decodes and validates a configuration document.
    pub fn from_json(json: &str) -> Result<Self, ConfigurationError> {
        let config: Configuration = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConfigurationError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        let mut problems = Vec::new();

        if self.version.trim().is_empty() {
            problems.push("version is required".to_string());
        }

        check_mappings(&self.mappings, "mappings", &mut problems);

        let mut ids = HashSet::new();
        for (i, rule) in self.rules.iter().enumerate() {
            let at = format!("rules[{i}]");
            if rule.id.is_empty() {
                problems.push(format!("{at}: id is required"));
            } else if !ids.insert(rule.id.as_str()) {
                problems.push(format!("{at}: duplicate rule id '{}'", rule.id));
            }
            if rule.conditions.is_empty() {
                problems.push(format!("{at}: at least one condition is required"));
            }
            if rule.mappings.is_empty() {
                problems.push(format!("{at}: at least one mapping is required"));
            }
            if rule.priority <= 0 {
                problems.push(format!(
                    "{at}: priority must be a positive integer, got {}",
                    rule.priority
                ));
            }
            check_mappings(&rule.mappings, &format!("{at}.mappings"), &mut problems);

            for (j, condition) in rule.conditions.iter().enumerate() {
                let at = format!("{at}.conditions[{j}]");
                if matches!(
                    condition.kind,
                    ConditionType::Field | ConditionType::ContextKey
                ) && condition.field.as_deref().is_none_or(str::is_empty)
                {
                    problems.push(format!(
                        "{at}: field is required for type {}",
                        condition.kind.as_str()
                    ));
                }
                if condition.operator == ConditionOperator::Matches
                    && let Err(err) = Regex::new(&condition.value)
                {
                    problems.push(format!("{at}: invalid pattern: {err}"));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigurationError::Invalid(problems))
        }
    }
}

fn check_mappings(mappings: &[Mapping], at: &str, problems: &mut Vec<String>) {
    for (i, mapping) in mappings.iter().enumerate() {
        if mapping.source.is_empty() {
            problems.push(format!("{at}[{i}]: source field is required"));
        }
        if mapping.target.is_empty() {
            problems.push(format!("{at}[{i}]: target field is required"));
        }
    }
}

/// Decodes and validates a bare `[{source, target}, ...]` list.
pub fn mappings_from_json(json: &str) -> Result<Vec<Mapping>, ConfigurationError> {
    let mappings: Vec<Mapping> = serde_json::from_str(json)?;
    let mut problems = Vec::new();
    check_mappings(&mappings, "mappings", &mut problems);
    if problems.is_empty() {
        Ok(mappings)
    } else {
        Err(ConfigurationError::Invalid(problems))
    }
}
