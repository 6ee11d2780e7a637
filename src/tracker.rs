//! Field usage and resource discovery over a parsed pipeline.
//!
//! [`FieldTracker`] walks the commands in order once, keeping the set of
//! fields produced so far. A field read before anything produced it is an
//! input field: it has to come from the raw events.
//!
//! ```
//! use spl_toolkit::{parse, tracker::FieldTracker};
//!
//! let query = parse("search src_ip=1.1.1.1 | eval computed=src_ip+dst_port | stats count by src_ip, computed").unwrap();
//! let info = FieldTracker::analyze(&query);
//! assert_eq!(info.input_fields, vec!["src_ip", "dst_port"]);
//! ```

use std::collections::HashSet;

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

use crate::ast::{Command, Expr, Literal, Query, Token, TokenKind, macro_name};

/// What a query references, each list de-duplicated in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryInfo {
    #[serde(alias = "datamodels")]
    pub data_models: Vec<String>,
    pub datasets: Vec<String>,
    pub lookups: Vec<String>,
    pub macros: Vec<String>,
    pub sources: Vec<String>,
    #[serde(alias = "sourcetypes")]
    pub source_types: Vec<String>,
    pub input_fields: Vec<String>,
}

#[derive(Debug, Default)]
pub struct FieldTracker {
    data_models: IndexSet<String>,
    datasets: IndexSet<String>,
    lookups: IndexSet<String>,
    macros: IndexSet<String>,
    sources: IndexSet<String>,
    source_types: IndexSet<String>,
    input_fields: IndexSet<String>,
    /// Fields produced so far; a subsearch gets a scope of its own
    scopes: Vec<HashSet<String>>,
}

fn skipped(name: &str) -> bool {
    name.is_empty() || name.contains('*')
}

impl FieldTracker {
    pub fn analyze(query: &Query) -> QueryInfo {
        let mut tracker = FieldTracker::default();
        tracker.scopes.push(HashSet::new());
        tracker.query(query);
        tracker.into_info()
    }

    fn into_info(self) -> QueryInfo {
        QueryInfo {
            data_models: self.data_models.into_iter().collect(),
            datasets: self.datasets.into_iter().collect(),
            lookups: self.lookups.into_iter().collect(),
            macros: self.macros.into_iter().collect(),
            sources: self.sources.into_iter().collect(),
            source_types: self.source_types.into_iter().collect(),
            input_fields: self.input_fields.into_iter().collect(),
        }
    }

    fn consume(&mut self, name: &str) {
        if skipped(name) {
            return;
        }
        let produced = self
            .scopes
            .last()
            .is_some_and(|scope| scope.contains(name));
        if !produced && !self.input_fields.contains(name) {
            self.input_fields.insert(name.to_string());
        }
    }

    fn produce(&mut self, name: &str) {
        if skipped(name) {
            return;
        }
        if let Some(scope) = self.scopes.last_mut() {
            scope.insert(name.to_string());
        }
    }

    fn dataset(&mut self, model: &str, dataset: Option<&str>) {
        self.data_models.insert(model.to_string());
        if let Some(dataset) = dataset {
            self.datasets.insert(format!("{model}.{dataset}"));
        }
    }

    fn raw_macros(&mut self, tokens: &[Token]) {
        for token in tokens {
            if let TokenKind::Macro(text) = &token.kind {
                self.macros.insert(macro_name(text).to_string());
            }
        }
    }

    fn query(&mut self, query: &Query) {
        for command in &query.commands {
            self.command(command);
        }
    }

    fn command(&mut self, command: &Command) {
        match command {
            Command::Search { filter, .. } => {
                if let Some(filter) = filter {
                    self.expr(filter);
                }
            }
            Command::Where(condition) => self.expr(condition),
            Command::Eval(assignments) => {
                for assignment in assignments {
                    self.expr(&assignment.value);
                    self.produce(&assignment.target);
                }
            }
            Command::Stats {
                aggregations, by, ..
            } => {
                for aggregation in aggregations {
                    for arg in aggregation.args.iter().flatten() {
                        self.expr(arg);
                    }
                }
                for field in by {
                    self.expr(field);
                }
                for aggregation in aggregations {
                    self.produce(&aggregation.output_name());
                }
            }
            Command::Rename(renames) => {
                for rename in renames {
                    self.expr(&rename.from);
                    self.produce(&rename.to);
                }
            }
            Command::Table(fields) | Command::Fields { fields, .. } => {
                for field in fields {
                    self.expr(field);
                }
            }
            Command::Lookup {
                table,
                inputs,
                output,
                ..
            } => {
                self.lookups.insert(table.clone());
                for input in inputs {
                    self.expr(&input.field);
                }
                for out in output.iter().flat_map(|(_, outputs)| outputs) {
                    self.produce(out.alias.as_ref().unwrap_or(&out.field));
                }
            }
            Command::InputLookup { table, filter, .. } => {
                self.lookups.insert(table.clone());
                if let Some(filter) = filter {
                    self.expr(filter);
                }
            }
            Command::Datamodel { model, dataset, .. } => {
                if let Some(model) = model {
                    self.dataset(model, dataset.as_deref());
                }
            }
            Command::Tstats {
                aggregations,
                datamodel,
                filter,
                by,
                ..
            } => {
                if let Some(datamodel) = datamodel {
                    match datamodel.split_once('.') {
                        Some((model, _)) => {
                            self.data_models.insert(model.to_string());
                            self.datasets.insert(datamodel.clone());
                        }
                        None => {
                            self.data_models.insert(datamodel.clone());
                        }
                    }
                }
                for aggregation in aggregations {
                    for arg in aggregation.args.iter().flatten() {
                        self.expr(arg);
                    }
                }
                if let Some(filter) = filter {
                    self.expr(filter);
                }
                for field in by {
                    self.expr(field);
                }
                for aggregation in aggregations {
                    self.produce(&aggregation.output_name());
                }
            }
            Command::From {
                datamodel,
                dataset,
                tokens,
            } => {
                if let Some(model) = datamodel {
                    self.dataset(model, dataset.as_deref());
                }
                self.raw_macros(tokens);
            }
            Command::Pivot {
                model,
                dataset,
                tokens,
            } => {
                self.dataset(model, Some(dataset));
                self.raw_macros(tokens);
            }
            Command::Generic(tokens) => self.raw_macros(tokens),
        }
    }

    fn expr(&mut self, expr: &Expr) {
        match expr {
            Expr::FieldRef { name, .. } => self.consume(name),
            Expr::Literal(_) => {}
            Expr::BinaryOp { left, right, .. } => {
                self.expr(left);
                self.expr(right);
            }
            Expr::Not(inner) | Expr::Negate(inner) | Expr::Group(inner) => self.expr(inner),
            Expr::FunctionCall { args, .. } => {
                for arg in args {
                    self.expr(arg);
                }
            }
            Expr::Comparison { left, op, right } => {
                if op.is_equality()
                    && let (Some(field), Expr::Literal(value)) = (left.field_name(), &**right)
                {
                    self.discover(field, value);
                }
                self.expr(left);
                self.expr(right);
            }
            Expr::In { left, values } => {
                self.expr(left);
                for value in values {
                    self.expr(value);
                }
            }
            Expr::Macro(text) => {
                self.macros.insert(macro_name(text).to_string());
            }
            Expr::Subsearch(query) => {
                self.scopes.push(HashSet::new());
                self.query(query);
                self.scopes.pop();
            }
        }
    }

    /// `source=...` and `sourcetype=...` name where the events come from.
    fn discover(&mut self, field: &str, value: &Literal) {
        match field {
            "source" => {
                self.sources.insert(value.value().to_string());
            }
            "sourcetype" => {
                self.source_types.insert(value.value().to_string());
            }
            _ => {}
        }
    }
}
