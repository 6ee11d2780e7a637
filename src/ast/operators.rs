/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Logical
    /// Logical AND (`AND`)
    And,
    /// Adjacent search terms, an AND without the keyword
    ImplicitAnd,
    /// Logical OR (`OR`)
    Or,

    // Arithmetic
    /// Addition (`+`)
    Add,
    /// Subtraction (`-`)
    Subtract,
    /// Multiplication (`*`)
    Multiply,
    /// Division (`/`)
    Divide,
    /// Modulo (`%`)
    Modulo,
    /// String concatenation (`.`)
    Concat,
}

impl BinOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinOp::And => "AND",
            BinOp::ImplicitAnd => "",
            BinOp::Or => "OR",
            BinOp::Add => "+",
            BinOp::Subtract => "-",
            BinOp::Multiply => "*",
            BinOp::Divide => "/",
            BinOp::Modulo => "%",
            BinOp::Concat => ".",
        }
    }
}

/// Comparison operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal (`=`)
    Eq,
    /// Equal (`==`), accepted in eval and where
    EqEq,
    /// Not equal (`!=`)
    NotEq,
    /// Less than (`<`)
    Lt,
    /// Less than or equal (`<=`)
    LtEq,
    /// Greater than (`>`)
    Gt,
    /// Greater than or equal (`>=`)
    GtEq,
}

impl CompareOp {
    pub fn is_equality(&self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::EqEq)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::EqEq => "==",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }
}
