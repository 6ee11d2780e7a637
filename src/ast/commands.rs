use crate::ast::{Expr, Literal, Token};

/// Which of the stats-family commands a [`Command::Stats`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsKind {
    Stats,
    EventStats,
    StreamStats,
}

impl StatsKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StatsKind::Stats => "stats",
            StatsKind::EventStats => "eventstats",
            StatsKind::StreamStats => "streamstats",
        }
    }
}

/// Leading word of a pipeline segment that selects a typed sub-parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandKeyword {
    Search,
    Where,
    Eval,
    Stats(StatsKind),
    Rename,
    Table,
    Fields,
    Lookup,
    InputLookup,
    Datamodel,
    Tstats,
    From,
    Pivot,
}

impl CommandKeyword {
    pub fn from_name(name: &str) -> Option<CommandKeyword> {
        let keyword = match name.to_ascii_lowercase().as_str() {
            "search" => CommandKeyword::Search,
            "where" => CommandKeyword::Where,
            "eval" => CommandKeyword::Eval,
            "stats" => CommandKeyword::Stats(StatsKind::Stats),
            "eventstats" => CommandKeyword::Stats(StatsKind::EventStats),
            "streamstats" => CommandKeyword::Stats(StatsKind::StreamStats),
            "rename" => CommandKeyword::Rename,
            "table" => CommandKeyword::Table,
            "fields" => CommandKeyword::Fields,
            "lookup" => CommandKeyword::Lookup,
            "inputlookup" => CommandKeyword::InputLookup,
            "datamodel" => CommandKeyword::Datamodel,
            "tstats" => CommandKeyword::Tstats,
            "from" => CommandKeyword::From,
            "pivot" => CommandKeyword::Pivot,
            _ => return None,
        };
        Some(keyword)
    }
}

/// `key=value` option clause, e.g. `local=true` or `summariesonly=t`.
#[derive(Debug, Clone, PartialEq)]
pub struct Argument {
    pub key: String,
    pub value: Literal,
}

/// `target=expr` in an eval command.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub target: String,
    pub value: Expr,
}

/// One aggregation in stats/tstats: `count`, `avg(bytes) AS avg_bytes`.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub function: String,
    /// `None` for a bare function name such as `count`
    pub args: Option<Vec<Expr>>,
    pub alias: Option<String>,
}

/// `old AS new` in a rename command.
#[derive(Debug, Clone, PartialEq)]
pub struct RenamePair {
    pub from: Expr,
    pub to: String,
}

/// Field matched against the lookup table: `[column AS] field`.
///
/// `field` is the event field; `column` names the table column when it
/// differs, as in `lookup users.csv uid AS user_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupField {
    pub column: Option<String>,
    pub field: Expr,
}

/// Field written by a lookup: `description [AS desc]`.
#[derive(Debug, Clone, PartialEq)]
pub struct LookupOutput {
    pub field: String,
    pub alias: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// `OUTPUT`
    Output,
    /// `OUTPUTNEW`
    OutputNew,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldsMode {
    /// `fields + a, b`
    Keep,
    /// `fields - a, b`
    Remove,
}

/// One pipeline stage.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Filter
    ///
    /// `explicit` is false for the implicit search that starts a query
    /// without a command keyword.
    ///
    /// # Examples
    /// ```text
    /// search sourcetype=access_combined status=404
    /// index=main error
    /// ```
    Search { explicit: bool, filter: Option<Expr> },

    /// Filter with eval-style expressions
    ///
    /// # Example
    /// ```text
    /// where bytes > 1000 AND status!=200
    /// ```
    Where(Expr),

    /// Field assignments
    ///
    /// # Example
    /// ```text
    /// eval mb=round(bytes/1048576, 2), kind="web"
    /// ```
    Eval(Vec<Assignment>),

    /// Aggregation (stats, eventstats, streamstats)
    ///
    /// # Example
    /// ```text
    /// stats count, avg(bytes) AS avg_bytes by src_ip, dest_ip
    /// ```
    Stats {
        kind: StatsKind,
        options: Vec<Argument>,
        aggregations: Vec<Aggregation>,
        by: Vec<Expr>,
    },

    /// # Example
    /// ```text
    /// rename src AS source_ip, dst AS dest_ip
    /// ```
    Rename(Vec<RenamePair>),

    Table(Vec<Expr>),

    Fields {
        mode: Option<FieldsMode>,
        fields: Vec<Expr>,
    },

    /// # Example
    /// ```text
    /// lookup local=true users.csv user_id OUTPUT username AS user
    /// ```
    Lookup {
        options: Vec<Argument>,
        table: String,
        inputs: Vec<LookupField>,
        output: Option<(OutputMode, Vec<LookupOutput>)>,
    },

    /// # Example
    /// ```text
    /// inputlookup append=t ip_geo_lookup.csv where country=US
    /// ```
    InputLookup {
        options: Vec<Argument>,
        table: String,
        filter: Option<Expr>,
    },

    /// # Example
    /// ```text
    /// datamodel Network_Traffic All_Traffic search
    /// ```
    Datamodel {
        model: Option<String>,
        dataset: Option<String>,
        mode: Option<String>,
        options: Vec<Argument>,
    },

    /// # Example
    /// ```text
    /// tstats summariesonly=t count from datamodel=Web where Web.status=200 by Web.src_ip
    /// ```
    Tstats {
        options: Vec<Argument>,
        aggregations: Vec<Aggregation>,
        datamodel: Option<String>,
        filter: Option<Expr>,
        by: Vec<Expr>,
        by_options: Vec<Argument>,
    },

    /// `from datamodel:Model.Dataset`, tokens kept verbatim
    From {
        datamodel: Option<String>,
        dataset: Option<String>,
        tokens: Vec<Token>,
    },

    /// `pivot Model Dataset ...`, tokens after the keyword kept verbatim
    Pivot {
        model: String,
        dataset: String,
        tokens: Vec<Token>,
    },

    /// Any command without a typed parser. Holds the whole segment,
    /// command name included, token for token.
    Generic(Vec<Token>),
}

impl Command {
    /// Command name as rendered.
    pub fn name(&self) -> &str {
        match self {
            Command::Search { .. } => "search",
            Command::Where(_) => "where",
            Command::Eval(_) => "eval",
            Command::Stats { kind, .. } => kind.as_str(),
            Command::Rename(_) => "rename",
            Command::Table(_) => "table",
            Command::Fields { .. } => "fields",
            Command::Lookup { .. } => "lookup",
            Command::InputLookup { .. } => "inputlookup",
            Command::Datamodel { .. } => "datamodel",
            Command::Tstats { .. } => "tstats",
            Command::From { .. } => "from",
            Command::Pivot { .. } => "pivot",
            Command::Generic(tokens) => tokens.first().map_or("", |t| t.raw.as_str()),
        }
    }
}

impl Aggregation {
    /// Field name the aggregation produces: its alias, or the call as written.
    pub fn output_name(&self) -> String {
        match &self.alias {
            Some(alias) => alias.clone(),
            None => match &self.args {
                None => self.function.clone(),
                Some(args) => {
                    let args: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                    format!("{}({})", self.function, args.join(", "))
                }
            },
        }
    }
}
