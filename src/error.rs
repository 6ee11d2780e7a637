use thiserror::Error;

use crate::{config::ConfigurationError, lexer::LexError, parser::ParseError, registry::Handle};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error("no mapper instance for handle {0}")]
    InstanceNotFound(Handle),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
