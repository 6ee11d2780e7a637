//! Rendering of parsed queries back to query text.
//!
//! Every AST type implements [`std::fmt::Display`]. Rendering is canonical
//! rather than byte-identical: commands are joined with `" | "`, lists with
//! `", "`, comparisons are written without surrounding spaces and logical or
//! arithmetic operators with them. Command order, field names and literal
//! values always survive a parse/render round trip.
//!
//! # Examples
//!
//! ```
//! use spl_toolkit::parse;
//!
//! let query = parse("search  src_ip=10.0.0.1   |stats count by src_ip").unwrap();
//! assert_eq!(query.to_string(), "search src_ip=10.0.0.1 | stats count by src_ip");
//! ```
//!
//! Commands without a typed parser are written token for token:
//!
//! ```
//! use spl_toolkit::parse;
//!
//! let query = parse("| makeresults count=5").unwrap();
//! assert_eq!(query.to_string(), "| makeresults count=5");
//! ```

use std::fmt::{self, Display, Formatter, Write};

use crate::{
    ast::{
        Aggregation, Argument, Assignment, BinOp, Command, Expr, FieldsMode, Keyword, Literal,
        LookupField, LookupOutput, OutputMode, Query, RenamePair, Token,
    },
    lexer::is_word_char,
};

/// Writes `value` between `quote`s so the lexer reads back the same value.
fn write_quoted(f: &mut Formatter<'_>, value: &str, quote: char) -> fmt::Result {
    f.write_char(quote)?;
    let mut chars = value.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            c if c == quote => {
                f.write_char('\\')?;
                f.write_char(c)?;
            }
            '\\' => {
                // a lone backslash is kept as written unless the lexer
                // would take it as an escape
                match chars.peek() {
                    Some(&next) if next != '\\' && next != quote => f.write_char('\\')?,
                    _ => f.write_str("\\\\")?,
                }
            }
            c => f.write_char(c)?,
        }
    }
    f.write_char(quote)
}

fn needs_quotes(name: &str) -> bool {
    name.is_empty()
        || Keyword::from_word(name).is_some()
        || name
            .chars()
            .any(|c| !is_word_char(c) && !matches!(c, '*' | '-' | '+' | '/' | '%'))
}

/// Name in a position where a quoted string is also read as a name.
struct Name<'a>(&'a str);

impl Display for Name<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if needs_quotes(self.0) {
            write_quoted(f, self.0, '"')
        } else {
            f.write_str(self.0)
        }
    }
}

fn write_list<T: Display>(f: &mut Formatter<'_>, items: &[T]) -> fmt::Result {
    for (idx, item) in items.iter().enumerate() {
        if idx > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_options(f: &mut Formatter<'_>, options: &[Argument]) -> fmt::Result {
    for option in options {
        write!(f, " {option}")?;
    }
    Ok(())
}

fn write_alias(f: &mut Formatter<'_>, alias: &Option<String>) -> fmt::Result {
    match alias {
        Some(alias) => write!(f, " AS {}", Name(alias)),
        None => Ok(()),
    }
}

/// Tokens as written, with a space only where the source had whitespace.
fn write_tokens(f: &mut Formatter<'_>, tokens: &[Token]) -> fmt::Result {
    let mut previous: Option<&Token> = None;
    for token in tokens {
        if previous.is_some_and(|p| !p.touches(token)) {
            f.write_char(' ')?;
        }
        f.write_str(&token.raw)?;
        previous = Some(token);
    }
    Ok(())
}

impl Display for Literal {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String { value, quote } => write_quoted(f, value, *quote),
            Literal::Number(raw) | Literal::Bare(raw) => f.write_str(raw),
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::FieldRef { name, quote } => match quote {
                Some(quote) => write_quoted(f, name, *quote),
                None if needs_quotes(name) => write_quoted(f, name, '\''),
                None => f.write_str(name),
            },
            Expr::Literal(literal) => write!(f, "{literal}"),
            Expr::BinaryOp {
                op: BinOp::ImplicitAnd,
                left,
                right,
            } => write!(f, "{left} {right}"),
            Expr::BinaryOp { op, left, right } => write!(f, "{left} {} {right}", op.symbol()),
            Expr::Not(inner) => write!(f, "NOT {inner}"),
            Expr::Negate(inner) => write!(f, "-{inner}"),
            Expr::Group(inner) => write!(f, "({inner})"),
            Expr::FunctionCall { name, args } => {
                write!(f, "{name}(")?;
                write_list(f, args)?;
                f.write_char(')')
            }
            Expr::Comparison { left, op, right } => write!(f, "{left}{}{right}", op.symbol()),
            Expr::In { left, values } => {
                write!(f, "{left} IN (")?;
                write_list(f, values)?;
                f.write_char(')')
            }
            Expr::Macro(text) => write!(f, "`{text}`"),
            Expr::Subsearch(query) => write!(f, "[{query}]"),
        }
    }
}

impl Display for Argument {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

impl Display for Assignment {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", Name(&self.target), self.value)
    }
}

impl Display for Aggregation {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.function)?;
        if let Some(args) = &self.args {
            f.write_char('(')?;
            write_list(f, args)?;
            f.write_char(')')?;
        }
        write_alias(f, &self.alias)
    }
}

impl Display for RenamePair {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} AS {}", self.from, Name(&self.to))
    }
}

impl Display for LookupField {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(column) = &self.column {
            write!(f, "{} AS ", Name(column))?;
        }
        write!(f, "{}", self.field)
    }
}

impl Display for LookupOutput {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Name(&self.field))?;
        write_alias(f, &self.alias)
    }
}

impl Display for Command {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Command::Search {
                explicit: false,
                filter: Some(filter),
            } => write!(f, "{filter}"),
            Command::Search { filter, .. } => {
                f.write_str("search")?;
                match filter {
                    Some(filter) => write!(f, " {filter}"),
                    None => Ok(()),
                }
            }
            Command::Where(condition) => write!(f, "where {condition}"),
            Command::Eval(assignments) => {
                f.write_str("eval ")?;
                write_list(f, assignments)
            }
            Command::Stats {
                kind,
                options,
                aggregations,
                by,
            } => {
                f.write_str(kind.as_str())?;
                write_options(f, options)?;
                f.write_char(' ')?;
                write_list(f, aggregations)?;
                if !by.is_empty() {
                    f.write_str(" by ")?;
                    write_list(f, by)?;
                }
                Ok(())
            }
            Command::Rename(renames) => {
                f.write_str("rename ")?;
                write_list(f, renames)
            }
            Command::Table(fields) => {
                f.write_str("table")?;
                if !fields.is_empty() {
                    f.write_char(' ')?;
                    write_list(f, fields)?;
                }
                Ok(())
            }
            Command::Fields { mode, fields } => {
                f.write_str("fields")?;
                match mode {
                    Some(FieldsMode::Keep) => f.write_str(" +")?,
                    Some(FieldsMode::Remove) => f.write_str(" -")?,
                    None => {}
                }
                if !fields.is_empty() {
                    f.write_char(' ')?;
                    write_list(f, fields)?;
                }
                Ok(())
            }
            Command::Lookup {
                options,
                table,
                inputs,
                output,
            } => {
                f.write_str("lookup")?;
                write_options(f, options)?;
                write!(f, " {}", Name(table))?;
                if !inputs.is_empty() {
                    f.write_char(' ')?;
                    write_list(f, inputs)?;
                }
                if let Some((mode, outputs)) = output {
                    f.write_str(match mode {
                        OutputMode::Output => " OUTPUT",
                        OutputMode::OutputNew => " OUTPUTNEW",
                    })?;
                    if !outputs.is_empty() {
                        f.write_char(' ')?;
                        write_list(f, outputs)?;
                    }
                }
                Ok(())
            }
            Command::InputLookup {
                options,
                table,
                filter,
            } => {
                f.write_str("inputlookup")?;
                write_options(f, options)?;
                write!(f, " {}", Name(table))?;
                match filter {
                    Some(filter) => write!(f, " where {filter}"),
                    None => Ok(()),
                }
            }
            Command::Datamodel {
                model,
                dataset,
                mode,
                options,
            } => {
                f.write_str("datamodel")?;
                for name in [model, dataset, mode].into_iter().flatten() {
                    write!(f, " {}", Name(name))?;
                }
                write_options(f, options)
            }
            Command::Tstats {
                options,
                aggregations,
                datamodel,
                filter,
                by,
                by_options,
            } => {
                f.write_str("tstats")?;
                write_options(f, options)?;
                if !aggregations.is_empty() {
                    f.write_char(' ')?;
                    write_list(f, aggregations)?;
                }
                if let Some(datamodel) = datamodel {
                    write!(f, " from datamodel={}", Name(datamodel))?;
                }
                if let Some(filter) = filter {
                    write!(f, " where {filter}")?;
                }
                if !by.is_empty() {
                    f.write_str(" by ")?;
                    write_list(f, by)?;
                }
                write_options(f, by_options)
            }
            Command::From { tokens, .. } => {
                f.write_str("from ")?;
                write_tokens(f, tokens)
            }
            Command::Pivot { tokens, .. } => {
                f.write_str("pivot ")?;
                write_tokens(f, tokens)
            }
            Command::Generic(tokens) => write_tokens(f, tokens),
        }
    }
}

impl Display for Query {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if let Some(first) = self.commands.first()
            && !matches!(first, Command::Search { .. })
        {
            f.write_str("| ")?;
        }
        for (idx, command) in self.commands.iter().enumerate() {
            if idx > 0 {
                f.write_str(" | ")?;
            }
            write!(f, "{command}")?;
        }
        Ok(())
    }
}
