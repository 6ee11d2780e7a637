use crate::ast::Command;

/// Complete query pipeline.
///
/// The unit the lexer, parser and renderer round-trip.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Pipeline stages in order
    pub commands: Vec<Command>,
}

impl Query {
    pub fn new(commands: Vec<Command>) -> Self {
        Query { commands }
    }
}
