use super::CliError;
use crate::Mapper;

/// Check that a query lexes and parses
pub fn execute_validate(query: &str) -> Result<(), CliError> {
    Ok(Mapper::new().validate_query(query)?)
}
