use crate::ast::{BinOp, CompareOp, Query};

/// Literal value as it appeared in the query.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Quoted string, escapes resolved
    ///
    /// # Example
    /// ```text
    /// "error occurred"
    /// ```
    String { value: String, quote: char },

    /// Numeric literal, raw text preserved
    Number(String),

    /// Unquoted value or free-text term
    ///
    /// # Examples
    /// ```text
    /// 192.168.1.1
    /// -24h@h
    /// access_*
    /// ```
    Bare(String),
}

impl Literal {
    /// The literal's value without quotes.
    pub fn value(&self) -> &str {
        match self {
            Literal::String { value, .. } => value,
            Literal::Number(raw) | Literal::Bare(raw) => raw,
        }
    }

    pub fn string(value: impl Into<String>) -> Self {
        Literal::String {
            value: value.into(),
            quote: '"',
        }
    }
}

/// Expression tree node.
///
/// Every node owns its children; rewriting walks the tree mutably and only
/// ever touches [`Expr::FieldRef`] names.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Reference to an event field
    ///
    /// `quote` is set when the name was written quoted, e.g. `'src ip'` in eval.
    FieldRef { name: String, quote: Option<char> },

    Literal(Literal),

    /// Binary operation (logical or arithmetic)
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Logical negation (`NOT expr`)
    Not(Box<Expr>),

    /// Arithmetic negation (`-expr`)
    Negate(Box<Expr>),

    /// Parenthesized group, kept so rendering reproduces the grouping
    Group(Box<Expr>),

    /// Function call
    ///
    /// # Examples
    /// ```text
    /// round(bytes/1048576, 2)
    /// if(status>=500, "error", "ok")
    /// ```
    FunctionCall { name: String, args: Vec<Expr> },

    /// Comparison
    ///
    /// # Examples
    /// ```text
    /// src_ip=10.0.0.1
    /// bytes>1000
    /// ```
    Comparison {
        left: Box<Expr>,
        op: CompareOp,
        right: Box<Expr>,
    },

    /// Membership test (`field IN (a, b, c)`)
    In { left: Box<Expr>, values: Vec<Expr> },

    /// Backtick macro invocation, text between the backticks
    Macro(String),

    /// Nested pipeline (`[search ... | ...]`)
    Subsearch(Box<Query>),
}

impl Expr {
    /// Unquoted field reference.
    pub fn field(name: impl Into<String>) -> Self {
        Expr::FieldRef {
            name: name.into(),
            quote: None,
        }
    }

    pub fn bare(text: impl Into<String>) -> Self {
        Expr::Literal(Literal::Bare(text.into()))
    }

    pub fn binary(op: BinOp, left: Expr, right: Expr) -> Self {
        Expr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn comparison(left: Expr, op: CompareOp, right: Expr) -> Self {
        Expr::Comparison {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn field_name(&self) -> Option<&str> {
        match self {
            Expr::FieldRef { name, .. } => Some(name),
            _ => None,
        }
    }
}
