pub mod ast;
pub mod cli;
pub mod config;
pub mod context;
pub mod engine;
pub mod error;
pub mod lexer;
pub mod mapper;
pub mod parser;
pub mod registry;
pub mod render;
pub mod rewrite;
pub mod tracker;

pub use ast::{BinOp, Command, CompareOp, Expr, Literal, Query, Token};
pub use config::{Configuration, ConfigurationError, Mapping};
pub use context::Context;
pub use error::{Error, Result};
pub use lexer::{LexError, Lexer, Position};
pub use mapper::Mapper;
pub use parser::{ParseError, Parser};
pub use registry::{Handle, Registry};
pub use tracker::{FieldTracker, QueryInfo};

/// Lex and parse a complete query.
pub fn parse(query: &str) -> Result<Query> {
    let mut parser = Parser::new(Lexer::new(query))?;
    Ok(parser.parse_query()?)
}
