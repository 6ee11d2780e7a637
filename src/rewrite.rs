use indexmap::IndexMap;

use crate::{
    ast::{Command, Expr, Query},
    lexer::{is_number, is_word_char},
};

/// True when `name` reads back as one field in an eval expression, where
/// `-`, `+`, `*`, `/` and `%` are operators rather than part of a name.
fn is_plain_word(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_word_char) && !is_number(name)
}

/// Renames field references in place.
///
/// Only [`Expr::FieldRef`] nodes whose name is a key of the mapping change;
/// literals, operators, eval targets and aliases are left alone. Opaque
/// commands (`from`, `pivot` and unrecognized ones) are never touched.
///
/// Inside eval, where and aggregation arguments a new name that is not a
/// plain word is single-quoted, so `src-ip` stays one field instead of a
/// subtraction.
pub struct FieldRewriter<'m> {
    mappings: &'m IndexMap<String, String>,
    renamed: usize,
    in_eval: bool,
}

impl<'m> FieldRewriter<'m> {
    pub fn new(mappings: &'m IndexMap<String, String>) -> Self {
        FieldRewriter {
            mappings,
            renamed: 0,
            in_eval: false,
        }
    }

    /// Rewrites `query` and returns how many references were renamed.
    pub fn rewrite_query(&mut self, query: &mut Query) -> usize {
        let before = self.renamed;
        if !self.mappings.is_empty() {
            self.query(query);
        }
        self.renamed - before
    }

    fn query(&mut self, query: &mut Query) {
        for command in &mut query.commands {
            self.command(command);
        }
    }

    fn command(&mut self, command: &mut Command) {
        match command {
            Command::Search { filter, .. } | Command::InputLookup { filter, .. } => {
                if let Some(filter) = filter {
                    self.expr(filter);
                }
            }
            Command::Where(condition) => self.eval_expr(condition),
            Command::Eval(assignments) => {
                for assignment in assignments {
                    self.eval_expr(&mut assignment.value);
                }
            }
            Command::Stats {
                aggregations, by, ..
            } => {
                for arg in aggregations
                    .iter_mut()
                    .flat_map(|a| a.args.iter_mut().flatten())
                {
                    self.eval_expr(arg);
                }
                for field in by {
                    self.expr(field);
                }
            }
            Command::Rename(renames) => {
                for rename in renames {
                    self.expr(&mut rename.from);
                }
            }
            Command::Table(fields) | Command::Fields { fields, .. } => {
                for field in fields {
                    self.expr(field);
                }
            }
            Command::Lookup { inputs, .. } => {
                for input in inputs {
                    self.expr(&mut input.field);
                }
            }
            Command::Tstats {
                aggregations,
                filter,
                by,
                ..
            } => {
                for arg in aggregations
                    .iter_mut()
                    .flat_map(|a| a.args.iter_mut().flatten())
                {
                    self.eval_expr(arg);
                }
                if let Some(filter) = filter {
                    self.expr(filter);
                }
                for field in by {
                    self.expr(field);
                }
            }
            Command::Datamodel { .. }
            | Command::From { .. }
            | Command::Pivot { .. }
            | Command::Generic(_) => {}
        }
    }

    fn eval_expr(&mut self, expr: &mut Expr) {
        let outer = std::mem::replace(&mut self.in_eval, true);
        self.expr(expr);
        self.in_eval = outer;
    }

    fn expr(&mut self, expr: &mut Expr) {
        match expr {
            Expr::FieldRef { name, quote } => {
                if let Some(target) = self.mappings.get(name.as_str()) {
                    *name = target.clone();
                    if self.in_eval && quote.is_none() && !is_plain_word(target) {
                        *quote = Some('\'');
                    }
                    self.renamed += 1;
                }
            }
            Expr::Literal(_) | Expr::Macro(_) => {}
            Expr::BinaryOp { left, right, .. } | Expr::Comparison { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::Not(inner) | Expr::Negate(inner) | Expr::Group(inner) => self.expr(inner),
            Expr::FunctionCall { args, .. } => {
                for arg in args {
                    self.expr(arg);
                }
            }
            Expr::In { left, values } => {
                self.expr(left);
                for value in values {
                    self.expr(value);
                }
            }
            Expr::Subsearch(query) => {
                let outer = std::mem::replace(&mut self.in_eval, false);
                self.query(query);
                self.in_eval = outer;
            }
        }
    }
}
