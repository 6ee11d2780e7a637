// tests/mapper_tests.rs

use pretty_assertions::assert_eq;
use spl_toolkit::config::{
    Condition, ConditionOperator, ConditionType, Configuration, ConfigurationError, Mapping, Rule,
};
use spl_toolkit::{Context, Error, Mapper};

fn rule(id: &str, priority: i64, conditions: Vec<Condition>, mappings: Vec<Mapping>) -> Rule {
    Rule {
        id: id.to_string(),
        name: String::new(),
        description: String::new(),
        conditions,
        mappings,
        priority,
        enabled: true,
    }
}

fn mapper(mappings: Vec<Mapping>, rules: Vec<Rule>) -> Mapper {
    Mapper::with_config(Configuration {
        mappings,
        rules,
        ..Configuration::default()
    })
    .unwrap()
}

fn keyed(kind: ConditionType, key: &str, operator: ConditionOperator, value: &str) -> Condition {
    Condition {
        field: Some(key.to_string()),
        ..Condition::new(kind, operator, value)
    }
}

fn in_prod() -> Vec<Condition> {
    vec![keyed(ConditionType::ContextKey, "env", ConditionOperator::Equals, "prod")]
}

fn prod() -> Context {
    Context::new().with("env", "prod")
}

const APACHE_CONFIG: &str = r#"{
    "version": "1.0",
    "name": "apache",
    "rules": [{
        "id": "apache_fields",
        "name": "Apache access logs",
        "conditions": [{"type": "sourcetype", "operator": "equals", "value": "access_combined"}],
        "mappings": [{"source": "clientip", "target": "source_address"}],
        "priority": 10,
        "enabled": true
    }]
}"#;

// ============================================================================
// Base Mappings
// ============================================================================

#[test]
fn test_no_configuration_is_a_no_op() {
    let mapper = Mapper::new();
    assert_eq!(
        mapper.map_query("search a=1 | stats count by a").unwrap(),
        "search a=1 | stats count by a"
    );
}

#[test]
fn test_base_mappings_rename_everywhere() {
    let mapper = mapper(
        vec![
            Mapping::new("src", "src_ip"),
            Mapping::new("dst", "dest_ip"),
        ],
        vec![],
    );
    let test_cases = vec![
        ("search src=10.0.0.1", "search src_ip=10.0.0.1"),
        ("| where src != dst", "| where src_ip!=dest_ip"),
        ("| eval pair=src . \":\" . dst", "| eval pair=src_ip . \":\" . dest_ip"),
        ("| stats dc(dst) AS n by src", "| stats dc(dest_ip) AS n by src_ip"),
        ("| rename src AS source", "| rename src_ip AS source"),
        ("| table src, dst, other", "| table src_ip, dest_ip, other"),
        ("| fields - src", "| fields - src_ip"),
        ("| lookup geo.csv ip AS src OUTPUT country", "| lookup geo.csv ip AS src_ip OUTPUT country"),
        ("| inputlookup hosts where src=1.2.3.4", "| inputlookup hosts where src_ip=1.2.3.4"),
        ("| tstats count where src=x by dst", "| tstats count where src_ip=x by dest_ip"),
        ("search [search src=1 | fields src]", "search [search src_ip=1 | fields src_ip]"),
        ("search src IN (a, b)", "search src_ip IN (a, b)"),
    ];

    for (input, expected) in test_cases {
        assert_eq!(mapper.map_query(input).unwrap(), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_only_field_references_change() {
    let mapper = mapper(vec![Mapping::new("src", "src_ip")], vec![]);
    let test_cases = vec![
        // literal values
        ("search host=src", "search host=src"),
        (r#"search msg="src""#, r#"search msg="src""#),
        // eval targets and aliases
        ("| eval src=src + 1", "| eval src=src_ip + 1"),
        ("| stats count AS src by host", "| stats count AS src by host"),
        ("| rename a AS src", "| rename a AS src"),
        // opaque commands
        ("| dedup src", "| dedup src"),
        ("| from datamodel:Web.Web | search src=1", "| from datamodel:Web.Web | search src_ip=1"),
        // free-text terms
        ("search src", "search src"),
    ];

    for (input, expected) in test_cases {
        assert_eq!(mapper.map_query(input).unwrap(), expected, "Failed for input: {}", input);
    }
}

#[test]
fn test_targets_with_operator_characters_stay_one_field() {
    let mapper = mapper(
        vec![Mapping::new("src_ip", "src-ip"), Mapping::new("a", "dest-port")],
        vec![],
    );
    let test_cases = vec![
        (
            "search src_ip=1 | eval x=src_ip+1",
            "search src-ip=1 | eval x='src-ip' + 1",
            vec!["src-ip"],
        ),
        ("| where a > 5", "| where 'dest-port'>5", vec!["dest-port"]),
        (
            "| stats avg(a) by src_ip",
            "| stats avg('dest-port') by src-ip",
            vec!["dest-port", "src-ip"],
        ),
        (
            "| where a IN (1, 2) AND [search src_ip=1]",
            "| where 'dest-port' IN (1, 2) AND [search src-ip=1]",
            vec!["dest-port", "src-ip"],
        ),
    ];

    for (input, expected, fields) in test_cases {
        let output = mapper.map_query(input).unwrap();
        assert_eq!(output, expected, "Failed for input: {}", input);
        // reading the output back sees the renamed fields, not arithmetic
        assert_eq!(mapper.input_fields(&output).unwrap(), fields, "Failed for output: {}", output);
    }
}

#[test]
fn test_mapping_is_case_sensitive() {
    let mapper = mapper(vec![Mapping::new("src", "src_ip")], vec![]);
    assert_eq!(mapper.map_query("search SRC=1").unwrap(), "search SRC=1");
}

#[test]
fn test_parse_errors_are_reported() {
    let mapper = Mapper::new();
    assert!(matches!(mapper.map_query("search (a=1"), Err(Error::Parse(_))));
    assert!(matches!(mapper.map_query("search \"a"), Err(Error::Lex(_))));
}

// ============================================================================
// Conditional Rules
// ============================================================================

#[test]
fn test_sourcetype_rule_from_query() {
    let mapper = Mapper::from_json(APACHE_CONFIG).unwrap();
    assert_eq!(
        mapper
            .map_query("search sourcetype=access_combined clientip=192.168.1.1")
            .unwrap(),
        "search sourcetype=access_combined source_address=192.168.1.1"
    );
    assert_eq!(
        mapper
            .map_query("search sourcetype=syslog clientip=192.168.1.1")
            .unwrap(),
        "search sourcetype=syslog clientip=192.168.1.1"
    );
}

#[test]
fn test_context_overrides_query() {
    let mapper = Mapper::from_json(APACHE_CONFIG).unwrap();
    let query = "search sourcetype=access_combined clientip=1.1.1.1";

    let context = Context::new().with("sourcetype", "syslog");
    assert_eq!(
        mapper.map_query_with_context(query, &context).unwrap(),
        "search sourcetype=access_combined clientip=1.1.1.1"
    );

    let context = Context::new().with("sourcetype", "access_combined");
    assert_eq!(
        mapper
            .map_query_with_context("search clientip=1.1.1.1", &context)
            .unwrap(),
        "search source_address=1.1.1.1"
    );
}

#[test]
fn test_higher_priority_wins() {
    // declared low priority first to show order comes from priority
    let mapper = mapper(
        vec![],
        vec![
            rule("R2", 1, in_prod(), vec![Mapping::new("a", "y")]),
            rule("R1", 2, in_prod(), vec![Mapping::new("a", "x")]),
        ],
    );
    assert_eq!(
        mapper.map_query_with_context("search a=1", &prod()).unwrap(),
        "search x=1"
    );
}

#[test]
fn test_rules_layer_over_base() {
    let mapper = mapper(
        vec![Mapping::new("a", "base_a"), Mapping::new("b", "base_b")],
        vec![rule("r", 1, in_prod(), vec![Mapping::new("a", "rule_a")])],
    );
    assert_eq!(
        mapper.map_query_with_context("search a=1 b=2", &prod()).unwrap(),
        "search rule_a=1 base_b=2"
    );
}

#[test]
fn test_disabled_rule_is_inert() {
    let mut disabled = rule("off", 100, in_prod(), vec![Mapping::new("a", "never")]);
    disabled.enabled = false;
    let mapper = mapper(vec![Mapping::new("a", "base")], vec![disabled]);
    assert_eq!(
        mapper.map_query_with_context("search a=1", &prod()).unwrap(),
        "search base=1"
    );
}

#[test]
fn test_field_condition_reads_context() {
    let mapper = mapper(
        vec![],
        vec![rule(
            "prod",
            1,
            vec![keyed(ConditionType::Field, "env", ConditionOperator::Equals, "prod")],
            vec![Mapping::new("host", "hostname")],
        )],
    );

    let prod = Context::new().with("env", "prod");
    let dev = Context::new().with("env", "dev");
    assert_eq!(
        mapper.map_query_with_context("search host=a", &prod).unwrap(),
        "search hostname=a"
    );
    assert_eq!(
        mapper.map_query_with_context("search host=a", &dev).unwrap(),
        "search host=a"
    );
    // field conditions never fall back to the query
    assert_eq!(
        mapper.map_query("search env=prod host=a").unwrap(),
        "search env=prod host=a"
    );
}

#[test]
fn test_all_conditions_must_hold() {
    let mapper = mapper(
        vec![],
        vec![rule(
            "both",
            1,
            vec![
                keyed(ConditionType::ContextKey, "env", ConditionOperator::Equals, "prod"),
                keyed(ConditionType::ContextKey, "region", ConditionOperator::Equals, "eu"),
            ],
            vec![Mapping::new("a", "b")],
        )],
    );
    let one = Context::new().with("env", "prod");
    let both = Context::new().with("env", "prod").with("region", "eu");
    assert_eq!(mapper.map_query_with_context("search a=1", &one).unwrap(), "search a=1");
    assert_eq!(mapper.map_query_with_context("search a=1", &both).unwrap(), "search b=1");
}

#[test]
fn test_operators() {
    let cases = vec![
        (ConditionOperator::Contains, "access", "access_combined", true),
        (ConditionOperator::Contains, "syslog", "access_combined", false),
        (ConditionOperator::Matches, "^access_.*$", "access_combined", true),
        (ConditionOperator::Matches, "^syslog$", "access_combined", false),
        (ConditionOperator::NotEquals, "syslog", "access_combined", true),
        (ConditionOperator::NotEquals, "access_combined", "access_combined", false),
        (ConditionOperator::Equals, "access_combined", "access_combined", true),
    ];

    for (operator, value, fact, applies) in cases {
        let mapper = mapper(
            vec![],
            vec![rule(
                "r",
                1,
                vec![Condition::new(ConditionType::Sourcetype, operator, value)],
                vec![Mapping::new("a", "b")],
            )],
        );
        let context = Context::new().with("sourcetype", fact);
        let expected = if applies { "search b=1" } else { "search a=1" };
        assert_eq!(
            mapper.map_query_with_context("search a=1", &context).unwrap(),
            expected,
            "Failed for {:?} {} against {}",
            operator,
            value,
            fact
        );
    }
}

#[test]
fn test_not_equals_without_facts_does_not_apply() {
    let mapper = mapper(
        vec![],
        vec![rule(
            "r",
            1,
            vec![Condition::new(
                ConditionType::Sourcetype,
                ConditionOperator::NotEquals,
                "syslog",
            )],
            vec![Mapping::new("a", "b")],
        )],
    );
    assert_eq!(mapper.map_query("search a=1").unwrap(), "search a=1");
}

#[test]
fn test_any_context_value_may_match() {
    let mapper = mapper(
        vec![],
        vec![rule(
            "r",
            1,
            vec![Condition::new(
                ConditionType::Source,
                ConditionOperator::Equals,
                "/var/log/secure",
            )],
            vec![Mapping::new("a", "b")],
        )],
    );
    let context = Context::new()
        .with("source", "/var/log/messages")
        .with("source", "/var/log/secure");
    assert_eq!(
        mapper.map_query_with_context("search a=1", &context).unwrap(),
        "search b=1"
    );
}

#[test]
fn test_datamodel_condition_from_tstats() {
    let mapper = mapper(
        vec![],
        vec![rule(
            "web",
            1,
            vec![Condition::new(
                ConditionType::Datamodel,
                ConditionOperator::Equals,
                "Web",
            )],
            vec![Mapping::new("Web.src", "Web.src_ip")],
        )],
    );
    assert_eq!(
        mapper
            .map_query("| tstats count from datamodel=Web.Web by Web.src")
            .unwrap(),
        "| tstats count from datamodel=Web.Web by Web.src_ip"
    );
    assert_eq!(
        mapper
            .map_query("| tstats count from datamodel=Network by Web.src")
            .unwrap(),
        "| tstats count from datamodel=Network by Web.src"
    );
}

#[test]
fn test_effective_mappings() {
    let mapper = Mapper::from_json(APACHE_CONFIG).unwrap();
    let mappings = mapper
        .effective_mappings("search sourcetype=access_combined", &Context::new())
        .unwrap();
    assert_eq!(mappings.get("clientip").map(String::as_str), Some("source_address"));

    let mappings = mapper
        .effective_mappings("search sourcetype=syslog", &Context::new())
        .unwrap();
    assert!(mappings.is_empty());
}

// ============================================================================
// Loading Mappings
// ============================================================================

#[test]
fn test_load_mappings_merges_last_write_wins() {
    let mut mapper = mapper(
        vec![Mapping::new("a", "old"), Mapping::new("b", "kept")],
        vec![],
    );
    mapper
        .load_mappings(&[Mapping::new("a", "new"), Mapping::new("c", "added")])
        .unwrap();
    assert_eq!(
        mapper.map_query("search a=1 b=2 c=3").unwrap(),
        "search new=1 kept=2 added=3"
    );
}

#[test]
fn test_load_mappings_overrides_duplicate_sources() {
    let mut mapper = mapper(vec![Mapping::new("a", "x"), Mapping::new("a", "y")], vec![]);
    assert_eq!(mapper.map_query("search a=1").unwrap(), "search y=1");

    mapper.load_mappings(&[Mapping::new("a", "z")]).unwrap();
    assert_eq!(mapper.map_query("search a=1").unwrap(), "search z=1");
}

#[test]
fn test_load_mappings_keeps_rules() {
    let mut mapper = Mapper::from_json(APACHE_CONFIG).unwrap();
    mapper
        .load_mappings_json(r#"[{"source": "uri", "target": "url"}]"#)
        .unwrap();
    assert_eq!(mapper.configuration().rules.len(), 1);
    assert_eq!(
        mapper
            .map_query("search sourcetype=access_combined clientip=1.1.1.1 uri=/")
            .unwrap(),
        "search sourcetype=access_combined source_address=1.1.1.1 url=/"
    );
}

#[test]
fn test_failed_load_changes_nothing() {
    let mut mapper = mapper(vec![Mapping::new("a", "b")], vec![]);
    let err = mapper
        .load_mappings(&[Mapping::new("c", "d"), Mapping::new("e", "")])
        .unwrap_err();
    assert!(matches!(err, Error::Configuration(ConfigurationError::Invalid(_))));
    assert!(mapper.load_mappings_json("not json").is_err());
    assert_eq!(mapper.configuration().mappings, vec![Mapping::new("a", "b")]);
    assert_eq!(mapper.map_query("search a=1 c=2").unwrap(), "search b=1 c=2");
}

// ============================================================================
// Configuration Errors
// ============================================================================

#[test]
fn test_invalid_configurations_are_rejected_at_load() {
    let test_cases = vec![
        // missing target
        r#"{"version": "1.0", "mappings": [{"source": "a", "target": ""}]}"#,
        // non-positive priority
        r#"{"version": "1.0", "rules": [{"id": "r", "mappings": [{"source": "a", "target": "b"}], "priority": 0,
            "conditions": [{"type": "source", "operator": "equals", "value": "x"}]}]}"#,
        // non-integer priority
        r#"{"version": "1.0", "rules": [{"id": "r", "mappings": [{"source": "a", "target": "b"}], "priority": 2.5,
            "conditions": [{"type": "source", "operator": "equals", "value": "x"}]}]}"#,
        // unknown condition type
        r#"{"version": "1.0", "rules": [{"id": "r", "mappings": [{"source": "a", "target": "b"}], "priority": 1,
            "conditions": [{"type": "host", "operator": "equals", "value": "x"}]}]}"#,
        // rule without mappings
        r#"{"version": "1.0", "rules": [{"id": "r", "mappings": [], "priority": 1,
            "conditions": [{"type": "source", "operator": "equals", "value": "x"}]}]}"#,
        // rule without conditions
        r#"{"version": "1.0", "rules": [{"id": "r", "mappings": [{"source": "a", "target": "b"}], "priority": 1,
            "enabled": true}]}"#,
        // duplicate rule ids
        r#"{"version": "1.0", "rules": [
            {"id": "r", "mappings": [{"source": "a", "target": "b"}], "priority": 1,
                "conditions": [{"type": "source", "operator": "equals", "value": "x"}]},
            {"id": "r", "mappings": [{"source": "c", "target": "d"}], "priority": 2,
                "conditions": [{"type": "source", "operator": "equals", "value": "x"}]}]}"#,
        // bad pattern
        r#"{"version": "1.0", "rules": [{"id": "r", "mappings": [{"source": "a", "target": "b"}], "priority": 1,
            "conditions": [{"type": "source", "operator": "matches", "value": "(["}]}]}"#,
        // not JSON
        "{",
    ];

    for json in test_cases {
        let result = Mapper::from_json(json);
        assert!(
            matches!(result, Err(Error::Configuration(_))),
            "Expected configuration error for: {}",
            json
        );
    }
}

#[test]
fn test_rule_without_enabled_flag_is_disabled() {
    let mapper = Mapper::from_json(
        r#"{"version": "1.0", "rules": [{
            "id": "quiet",
            "conditions": [{"type": "context_key", "field": "env", "operator": "equals", "value": "prod"}],
            "mappings": [{"source": "a", "target": "b"}],
            "priority": 1
        }]}"#,
    )
    .unwrap();
    assert!(!mapper.configuration().rules[0].enabled);
    assert_eq!(
        mapper.map_query_with_context("search a=1", &prod()).unwrap(),
        "search a=1"
    );
}

#[test]
fn test_rule_without_conditions_is_rejected() {
    let result = Mapper::from_json(
        r#"{"version": "1.0", "rules": [{
            "id": "everywhere",
            "mappings": [{"source": "a", "target": "b"}],
            "priority": 1
        }]}"#,
    );
    assert!(matches!(
        result,
        Err(Error::Configuration(ConfigurationError::Invalid(problems)))
            if problems == vec!["rules[0]: at least one condition is required".to_string()]
    ));
}

#[test]
fn test_validation_message_lists_problems() {
    let err = Configuration::from_json(
        r#"{"version": "", "mappings": [{"source": "", "target": "x"}]}"#,
    )
    .unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid configuration: version is required; mappings[0]: source field is required"
    );
}

#[test]
fn test_configuration_json_round_trip() {
    let config = Configuration::from_json(APACHE_CONFIG).unwrap();
    let json = config.to_json().unwrap();
    assert_eq!(Configuration::from_json(&json).unwrap(), config);
    assert!(json.contains("\"enabled\": true"));
}
