//! Rewrite field names in a query

use super::CliError;
use crate::{Context, Mapper};

/// Options for the map command
#[derive(Debug, Clone, Default)]
pub struct MapOptions {
    /// The query to rewrite
    pub query: String,
    /// Configuration document (JSON)
    pub config: Option<String>,
    /// Extra `[{source, target}]` mappings merged over the configuration (JSON)
    pub mappings: Option<String>,
    /// `KEY=VALUE` context entries; a key may repeat
    pub context: Vec<String>,
}

fn parse_context(entries: &[String]) -> Result<Context, CliError> {
    entries
        .iter()
        .map(|entry| match entry.split_once('=') {
            Some((key, value)) if !key.trim().is_empty() => {
                Ok((key.trim().to_string(), value.to_string()))
            }
            _ => Err(CliError::InvalidContext(entry.clone())),
        })
        .collect()
}

/// Execute a map operation, returning the rewritten query
pub fn execute_map(options: &MapOptions) -> Result<String, CliError> {
    let mut mapper = match &options.config {
        Some(json) => Mapper::from_json(json)?,
        None => Mapper::new(),
    };
    if let Some(json) = &options.mappings {
        mapper.load_mappings_json(json)?;
    }

    let context = parse_context(&options.context)?;
    Ok(mapper.map_query_with_context(&options.query, &context)?)
}
