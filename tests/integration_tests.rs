use pretty_assertions::assert_eq;
use proptest::prelude::*;
use spl_toolkit::cli::{self, CliError, DiscoverOptions, MapOptions};
use spl_toolkit::config::ConfigurationError;
use spl_toolkit::{Error, Handle, Mapper, Registry, parse};
use std::sync::Arc;
use std::thread;

const CONFIG: &str = r#"{
    "version": "1.0",
    "name": "normalize",
    "mappings": [{"source": "src", "target": "src_ip"}],
    "rules": [{
        "id": "apache",
        "conditions": [{"type": "sourcetype", "operator": "equals", "value": "access_combined"}],
        "mappings": [{"source": "clientip", "target": "source_address"}],
        "priority": 5,
        "enabled": true
    }]
}"#;

// ============================================================================
// Registry
// ============================================================================

#[test]
fn test_registry_lifecycle() {
    let registry = Registry::new();
    let handle = registry.create();
    assert_eq!(handle, Handle(1));
    assert_eq!(registry.len(), 1);

    assert_eq!(
        registry.map_query(handle, "search src=1").unwrap(),
        "search src=1"
    );
    registry
        .load_mappings(handle, r#"[{"source": "src", "target": "src_ip"}]"#)
        .unwrap();
    assert_eq!(
        registry.map_query(handle, "search src=1").unwrap(),
        "search src_ip=1"
    );

    registry.free(handle).unwrap();
    assert!(registry.is_empty());
    assert_eq!(registry.free(handle), Err(Error::InstanceNotFound(handle)));
}

#[test]
fn test_registry_with_config_and_context() {
    let registry = Registry::new();
    let handle = registry.create_with_config(CONFIG).unwrap();

    assert_eq!(
        registry
            .map_query_with_context(handle, "search clientip=1.1.1.1 src=2", r#"{"sourcetype": "access_combined"}"#)
            .unwrap(),
        "search source_address=1.1.1.1 src_ip=2"
    );
    assert_eq!(
        registry
            .map_query_with_context(handle, "search clientip=1.1.1.1", "null")
            .unwrap(),
        "search clientip=1.1.1.1"
    );
    assert!(matches!(
        registry.map_query_with_context(handle, "search a=1", "[1, 2]"),
        Err(Error::Configuration(ConfigurationError::Json(_)))
    ));
}

#[test]
fn test_registry_discover() {
    let registry = Registry::new();
    let handle = registry.create();
    let info = registry
        .discover_query(handle, "| inputlookup ip_geo_lookup.csv | search country=US")
        .unwrap();
    assert_eq!(info.lookups, vec!["ip_geo_lookup.csv"]);
    assert_eq!(info.input_fields, vec!["country"]);
}

#[test]
fn test_registry_instances_are_independent() {
    let registry = Registry::new();
    let first = registry.create();
    let second = registry.create();
    registry
        .load_mappings(first, r#"[{"source": "a", "target": "b"}]"#)
        .unwrap();
    assert_eq!(registry.map_query(first, "search a=1").unwrap(), "search b=1");
    assert_eq!(registry.map_query(second, "search a=1").unwrap(), "search a=1");
}

#[test]
fn test_registry_failed_load_keeps_instance() {
    let registry = Registry::new();
    let handle = registry.create_with_config(CONFIG).unwrap();
    assert!(
        registry
            .load_mappings(handle, r#"[{"source": "", "target": "x"}]"#)
            .is_err()
    );
    assert_eq!(
        registry.map_query(handle, "search src=1").unwrap(),
        "search src_ip=1"
    );
}

#[test]
fn test_registry_concurrent_use() {
    let registry = Arc::new(Registry::new());
    let handle = registry.create_with_config(CONFIG).unwrap();

    let workers: Vec<_> = (0..8)
        .map(|i| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                if i % 2 == 0 {
                    registry
                        .load_mappings(handle, r#"[{"source": "dst", "target": "dest_ip"}]"#)
                        .unwrap();
                }
                let own = registry.create();
                let mapped = registry.map_query(handle, "search src=1").unwrap();
                registry.free(own).unwrap();
                mapped
            })
        })
        .collect();

    for worker in workers {
        assert_eq!(worker.join().unwrap(), "search src_ip=1");
    }
    assert_eq!(registry.len(), 1);
    assert_eq!(
        registry.map_query(handle, "search dst=2").unwrap(),
        "search dest_ip=2"
    );
}

// ============================================================================
// CLI
// ============================================================================

#[test]
fn test_cli_map() {
    let options = MapOptions {
        query: "search sourcetype=access_combined clientip=1.1.1.1 src=2 dst=3".to_string(),
        config: Some(CONFIG.to_string()),
        mappings: Some(r#"[{"source": "dst", "target": "dest_ip"}]"#.to_string()),
        context: vec![],
    };
    assert_eq!(
        cli::execute_map(&options).unwrap(),
        "search sourcetype=access_combined source_address=1.1.1.1 src_ip=2 dest_ip=3"
    );
}

#[test]
fn test_cli_map_context() {
    let options = MapOptions {
        query: "search clientip=1.1.1.1".to_string(),
        config: Some(CONFIG.to_string()),
        context: vec!["sourcetype=access_combined".to_string()],
        ..MapOptions::default()
    };
    assert_eq!(
        cli::execute_map(&options).unwrap(),
        "search source_address=1.1.1.1"
    );

    let bad = MapOptions {
        context: vec!["sourcetype".to_string()],
        ..options
    };
    assert!(matches!(
        cli::execute_map(&bad),
        Err(CliError::InvalidContext(entry)) if entry == "sourcetype"
    ));
}

#[test]
fn test_cli_map_bad_config() {
    let options = MapOptions {
        query: "search a=1".to_string(),
        config: Some(r#"{"version": "1.0", "mappings": [{"source": "a"}]}"#.to_string()),
        ..MapOptions::default()
    };
    assert!(matches!(
        cli::execute_map(&options),
        Err(CliError::Mapper(Error::Configuration(_)))
    ));
}

#[test]
fn test_cli_discover() {
    let json = cli::execute_discover(&DiscoverOptions {
        query: "| tstats count from datamodel=Web.Web by Web.src | lookup geo.csv ip AS Web.src OUTPUT country".to_string(),
        pretty: false,
    })
    .unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["data_models"], serde_json::json!(["Web"]));
    assert_eq!(value["datasets"], serde_json::json!(["Web.Web"]));
    assert_eq!(value["lookups"], serde_json::json!(["geo.csv"]));
    assert_eq!(value["input_fields"], serde_json::json!(["Web.src"]));
}

#[test]
fn test_cli_discover_pretty() {
    let json = cli::execute_discover(&DiscoverOptions {
        query: "search a=1".to_string(),
        pretty: true,
    })
    .unwrap();
    assert!(json.contains('\n'));
}

#[test]
fn test_cli_input_fields_and_validate() {
    assert_eq!(
        cli::execute_input_fields("search a=1 | eval b=a + c").unwrap(),
        vec!["a", "c"]
    );
    assert!(cli::execute_validate("search a=1 | stats count").is_ok());

    let err = cli::execute_validate("search a=1 | | stats count").unwrap_err();
    assert_eq!(
        err.to_string(),
        "parse error at line 1, column 12: missing command after '|'"
    );
}

// ============================================================================
// Properties
// ============================================================================

fn field_name() -> impl Strategy<Value = String> {
    "f_[a-z]{1,8}"
}

fn value() -> impl Strategy<Value = String> {
    prop_oneof!["[0-9]{1,4}", "v_[a-z0-9]{1,6}", "[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}\\.[0-9]{1,3}"]
}

proptest! {
    #[test]
    fn rendering_round_trips(
        field in field_name(),
        other in field_name(),
        value in value(),
        text in "[a-z ]{0,12}",
    ) {
        let input = format!(
            r#"search {field}={value} OR {other}="{text}" | eval t_out={field} * 2 | stats count by {other}"#
        );
        let first = parse(&input).unwrap();
        let rendered = first.to_string();
        let second = parse(&rendered).unwrap();
        prop_assert_eq!(&first, &second);
        prop_assert_eq!(rendered, second.to_string());
    }

    #[test]
    fn rewrite_is_total_and_exact(
        field in field_name(),
        other in field_name(),
        value in value(),
    ) {
        prop_assume!(field != other);
        let mapped = format!("{field}_mapped");
        let json = format!(r#"[{{"source": "{field}", "target": "{mapped}"}}]"#);
        let mut mapper = Mapper::new();
        mapper.load_mappings_json(&json).unwrap();

        let input = format!(
            "search {field}={value} {other}={value} | eval t_out={field} + {other} | stats avg({field}) by {field}, {other}"
        );
        let output = mapper.map_query(&input).unwrap();
        prop_assert_eq!(
            output,
            format!(
                "search {mapped}={value} {other}={value} | eval t_out={mapped} + {other} | stats avg({mapped}) by {mapped}, {other}"
            )
        );
    }
}
