//! Resolution of the effective field mapping for one query.
//!
//! Base mappings always apply. Enabled rules whose conditions all hold are
//! layered on top: the highest priority wins per source field, equal
//! priorities go to the rule declared first.

use indexmap::IndexMap;
use log::{debug, trace};
use regex::Regex;

use crate::{
    config::{Condition, ConditionOperator, ConditionType, Configuration, ConfigurationError, Rule},
    context::Context,
    tracker::QueryInfo,
};

enum Matcher {
    Equals(String),
    NotEquals(String),
    Contains(String),
    Matches(Regex),
}

impl Matcher {
    fn compile(condition: &Condition) -> Result<Self, ConfigurationError> {
        let value = condition.value.clone();
        Ok(match condition.operator {
            ConditionOperator::Equals => Matcher::Equals(value),
            ConditionOperator::NotEquals => Matcher::NotEquals(value),
            ConditionOperator::Contains => Matcher::Contains(value),
            ConditionOperator::Matches => Matcher::Matches(Regex::new(&value).map_err(|err| {
                ConfigurationError::Invalid(vec![format!("invalid pattern '{value}': {err}")])
            })?),
        })
    }

    /// `not_equals` needs at least one fact; the rest need one fact to match.
    fn holds(&self, facts: &[String]) -> bool {
        match self {
            Matcher::Equals(expected) => facts.iter().any(|f| f == expected),
            Matcher::NotEquals(expected) => {
                !facts.is_empty() && facts.iter().all(|f| f != expected)
            }
            Matcher::Contains(needle) => facts.iter().any(|f| f.contains(needle.as_str())),
            Matcher::Matches(pattern) => facts.iter().any(|f| pattern.is_match(f)),
        }
    }
}

struct CompiledCondition {
    kind: ConditionType,
    key: String,
    matcher: Matcher,
}

impl CompiledCondition {
    fn holds(&self, context: &Context, info: Option<&QueryInfo>) -> bool {
        let facts = match context.get(&self.key) {
            Some(values) => values,
            None if self.kind.is_query_derived() => {
                let derived = info.map(|info| match self.kind {
                    ConditionType::Sourcetype => info.source_types.as_slice(),
                    ConditionType::Source => info.sources.as_slice(),
                    ConditionType::Datamodel => info.data_models.as_slice(),
                    ConditionType::Field | ConditionType::ContextKey => &[][..],
                });
                derived.unwrap_or_default()
            }
            None => &[][..],
        };
        self.matcher.holds(facts)
    }
}

struct CompiledRule {
    id: String,
    priority: i64,
    conditions: Vec<CompiledCondition>,
    mappings: Vec<(String, String)>,
}

impl CompiledRule {
    fn compile(rule: &Rule) -> Result<Self, ConfigurationError> {
        let conditions = rule
            .conditions
            .iter()
            .map(|condition| -> Result<_, ConfigurationError> {
                Ok(CompiledCondition {
                    kind: condition.kind,
                    key: condition.key().to_string(),
                    matcher: Matcher::compile(condition)?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(CompiledRule {
            id: rule.id.clone(),
            priority: rule.priority,
            conditions,
            mappings: rule
                .mappings
                .iter()
                .map(|m| (m.source.clone(), m.target.clone()))
                .collect(),
        })
    }

    fn matches(&self, context: &Context, info: Option<&QueryInfo>) -> bool {
        self.conditions.iter().all(|c| c.holds(context, info))
    }
}

/// Validated, ready-to-evaluate form of a [`Configuration`].
#[derive(Default)]
pub struct RuleEngine {
    base: IndexMap<String, String>,
    /// Enabled rules, highest priority first, declaration order within a priority
    rules: Vec<CompiledRule>,
}

impl RuleEngine {
    pub fn new(config: &Configuration) -> Result<Self, ConfigurationError> {
        config.validate()?;

        let mut base = IndexMap::new();
        for mapping in &config.mappings {
            base.insert(mapping.source.clone(), mapping.target.clone());
        }

        let mut rules = config
            .rules
            .iter()
            .filter(|rule| rule.enabled)
            .map(CompiledRule::compile)
            .collect::<Result<Vec<_>, _>>()?;
        // stable: ties keep declaration order
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));

        debug!(
            "rule engine ready: {} base mappings, {} of {} rules enabled",
            base.len(),
            rules.len(),
            config.rules.len()
        );

        Ok(RuleEngine { base, rules })
    }

    /// True when some rule may fall back to facts read from the query.
    pub fn needs_query_info(&self) -> bool {
        self.rules.iter().any(|rule| {
            rule.conditions
                .iter()
                .any(|condition| condition.kind.is_query_derived())
        })
    }

    /// Ids of the rules that apply, in the order they take precedence.
    pub fn matched_rules(&self, context: &Context, info: Option<&QueryInfo>) -> Vec<&str> {
        self.rules
            .iter()
            .filter(|rule| rule.matches(context, info))
            .map(|rule| rule.id.as_str())
            .collect()
    }

    pub fn effective_mappings(
        &self,
        context: &Context,
        info: Option<&QueryInfo>,
    ) -> IndexMap<String, String> {
        let mut layer: IndexMap<String, String> = IndexMap::new();
        for rule in self.rules.iter().filter(|rule| rule.matches(context, info)) {
            debug!("rule '{}' (priority {}) matched", rule.id, rule.priority);
            for (source, target) in &rule.mappings {
                layer
                    .entry(source.clone())
                    .or_insert_with(|| target.clone());
            }
        }

        let mut effective = self.base.clone();
        effective.extend(layer);
        trace!("effective mapping has {} entries", effective.len());
        effective
    }
}
