//! Report what a query references

use super::CliError;
use crate::Mapper;

/// Options for the discover command
#[derive(Debug, Clone, Default)]
pub struct DiscoverOptions {
    pub query: String,
    /// Pretty-print the JSON output
    pub pretty: bool,
}

/// Execute a discover operation, returning the query info as JSON
pub fn execute_discover(options: &DiscoverOptions) -> Result<String, CliError> {
    let info = Mapper::new().discover_query(&options.query)?;
    let json = if options.pretty {
        serde_json::to_string_pretty(&info)
    } else {
        serde_json::to_string(&info)
    }?;
    Ok(json)
}

/// Fields the query reads from raw events, in first-seen order
pub fn execute_input_fields(query: &str) -> Result<Vec<String>, CliError> {
    Ok(Mapper::new().input_fields(query)?)
}
