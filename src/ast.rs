//! # SPL Query Abstract Syntax Tree
//!
//! Structured form of a pipe-delimited search query.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens and source positions
//! - **[expressions]** - Expression nodes (field references, literals, operations)
//! - **[operators]** - Logical, arithmetic and comparison operators
//! - **[commands]** - Pipeline stages (search, eval, stats, lookup, ...)
//! - **[query]** - The ordered pipeline
//!
//! ## Quick Start
//!
//! ```text
//! search sourcetype=access_combined status=404 | stats count by clientip
//! ```
//!
//! parses to a [`Query`] with two commands: a [`Command::Search`] whose filter
//! is an implicit AND of two comparisons, and a [`Command::Stats`] with one
//! aggregation (`count`) grouped by the field `clientip`.
//!
//! ## Core Concepts
//!
//! ### Field references vs. literals
//!
//! Only [`Expr::FieldRef`] nodes name event fields. In search filters the
//! left side of a comparison is a field and the right side is a literal; in
//! eval and where expressions bare words are fields and quoted strings are
//! literals (single quotes name fields).
//!
//! ### Unrecognized commands
//!
//! A segment whose leading word has no typed parser becomes
//! [`Command::Generic`] holding its raw tokens, so every query has a
//! complete parse and renders back unchanged.
pub mod commands;
pub mod expressions;
pub mod operators;
pub mod query;
pub mod tokens;

pub use commands::{
    Aggregation, Argument, Assignment, Command, CommandKeyword, FieldsMode, LookupField,
    LookupOutput, OutputMode, RenamePair, StatsKind,
};
pub use expressions::{Expr, Literal};
pub use operators::{BinOp, CompareOp};
pub use query::Query;
pub use tokens::{Keyword, Position, Token, TokenKind, macro_name};
