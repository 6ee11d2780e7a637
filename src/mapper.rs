//! The mapper: one configuration, applied to many queries.
//!
//! ```
//! use spl_toolkit::{Mapper, config::{Configuration, Mapping}};
//!
//! let config = Configuration {
//!     mappings: vec![Mapping::new("src_ip", "source_address")],
//!     ..Configuration::default()
//! };
//! let mapper = Mapper::with_config(config).unwrap();
//! assert_eq!(
//!     mapper.map_query("search src_ip=10.0.0.1 | stats count by src_ip").unwrap(),
//!     "search source_address=10.0.0.1 | stats count by source_address",
//! );
//! ```

use indexmap::IndexMap;
use log::{debug, trace};

use crate::{
    config::{self, Configuration, Mapping},
    context::Context,
    engine::RuleEngine,
    error::Result,
    parse,
    rewrite::FieldRewriter,
    tracker::{FieldTracker, QueryInfo},
};

pub struct Mapper {
    config: Configuration,
    engine: RuleEngine,
}

impl Default for Mapper {
    fn default() -> Self {
        Mapper::new()
    }
}

impl Mapper {
    /// Mapper with no mappings and no rules; queries pass through unchanged.
    pub fn new() -> Self {
        Mapper {
            config: Configuration::default(),
            engine: RuleEngine::default(),
        }
    }

    pub fn with_config(config: Configuration) -> Result<Self> {
        let engine = RuleEngine::new(&config)?;
        debug!(
            "mapper created from configuration '{}' (version {})",
            config.name, config.version
        );
        Ok(Mapper { config, engine })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Mapper::with_config(Configuration::from_json(json)?)
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    /// Merges `mappings` into the base mappings, last write wins per source
    /// field. Rules are left as they are. On error nothing changes.
    pub fn load_mappings(&mut self, mappings: &[Mapping]) -> Result<()> {
        let mut config = self.config.clone();
        for mapping in mappings {
            // a configuration may list the same source twice
            let mut found = false;
            for existing in config
                .mappings
                .iter_mut()
                .filter(|m| m.source == mapping.source)
            {
                existing.target = mapping.target.clone();
                found = true;
            }
            if !found {
                config.mappings.push(mapping.clone());
            }
        }

        let engine = RuleEngine::new(&config)?;
        debug!(
            "loaded {} mappings, {} base mappings in total",
            mappings.len(),
            config.mappings.len()
        );
        self.config = config;
        self.engine = engine;
        Ok(())
    }

    pub fn load_mappings_json(&mut self, json: &str) -> Result<()> {
        let mappings = config::mappings_from_json(json)?;
        self.load_mappings(&mappings)
    }

    pub fn map_query(&self, query: &str) -> Result<String> {
        self.resolve(query, &Context::new())
    }

    pub fn map_query_with_context(&self, query: &str, context: &Context) -> Result<String> {
        self.resolve(query, context)
    }

    /// Parse, pick the mapping that applies, rename, render.
    pub fn resolve(&self, query: &str, context: &Context) -> Result<String> {
        let mut ast = parse(query)?;
        let info = self
            .engine
            .needs_query_info()
            .then(|| FieldTracker::analyze(&ast));
        let mappings = self.engine.effective_mappings(context, info.as_ref());

        let renamed = FieldRewriter::new(&mappings).rewrite_query(&mut ast);
        trace!("renamed {renamed} field references");
        Ok(ast.to_string())
    }

    /// The mapping [`Mapper::resolve`] would apply to `query`.
    pub fn effective_mappings(
        &self,
        query: &str,
        context: &Context,
    ) -> Result<IndexMap<String, String>> {
        let ast = parse(query)?;
        let info = FieldTracker::analyze(&ast);
        Ok(self.engine.effective_mappings(context, Some(&info)))
    }

    pub fn discover_query(&self, query: &str) -> Result<QueryInfo> {
        Ok(FieldTracker::analyze(&parse(query)?))
    }

    pub fn input_fields(&self, query: &str) -> Result<Vec<String>> {
        Ok(self.discover_query(query)?.input_fields)
    }

    pub fn validate_query(&self, query: &str) -> Result<()> {
        parse(query).map(|_| ())
    }
}
