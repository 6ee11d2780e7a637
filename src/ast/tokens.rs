use std::fmt;

/// Location in the query text.
///
/// `offset` counts characters from the start of the query; `line` and
/// `column` are 1-based and meant for humans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Position {
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl Position {
    pub fn start() -> Self {
        Position {
            offset: 0,
            line: 1,
            column: 1,
        }
    }
}

impl Default for Position {
    fn default() -> Self {
        Position::start()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}

/// Boolean keywords. Matched case-insensitively by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keyword {
    /// `AND`
    And,
    /// `OR`
    Or,
    /// `NOT`
    Not,
}

impl Keyword {
    pub fn from_word(word: &str) -> Option<Keyword> {
        if word.eq_ignore_ascii_case("and") {
            Some(Keyword::And)
        } else if word.eq_ignore_ascii_case("or") {
            Some(Keyword::Or)
        } else if word.eq_ignore_ascii_case("not") {
            Some(Keyword::Not)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Keyword::And => "AND",
            Keyword::Or => "OR",
            Keyword::Not => "NOT",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Bare word: a field name, command name, or unquoted search term
    ///
    /// Runs of any character that is not whitespace, a quote, or one of the
    /// operator/punctuation characters.
    ///
    /// # Examples
    /// ```text
    /// src_ip
    /// Web.status
    /// 1.1.1.1
    /// datamodel:Web.Web
    /// ```
    Word(String),

    /// Numeric literal, kept as written
    ///
    /// # Examples
    /// ```text
    /// 42
    /// 3.14
    /// ```
    Number(String),

    /// Quoted string with escapes resolved
    ///
    /// `quote` is the delimiter that was used (`"` or `'`). In eval and
    /// where expressions a single-quoted string names a field.
    Str { value: String, quote: char },

    /// Backtick macro invocation; holds the text between the backticks
    ///
    /// # Examples
    /// ```text
    /// `security_events`
    /// `get_user(admin)`
    /// ```
    Macro(String),

    /// `AND`, `OR`, `NOT`
    Keyword(Keyword),

    /// Pipeline separator
    Pipe,

    Comma,
    LParen,
    RParen,

    /// Subsearch delimiters
    LBracket,
    RBracket,

    // Comparison
    /// `=`
    Eq,
    /// `==`
    EqEq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,

    // Arithmetic
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
}

/// A lexed token: what it is, the exact source text, and where it started.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub raw: String,
    pub position: Position,
}

impl Token {
    /// Character offset just past the end of this token.
    pub fn end(&self) -> usize {
        self.position.offset + self.raw.chars().count()
    }

    /// True when `next` starts exactly where this token ends.
    pub fn touches(&self, next: &Token) -> bool {
        self.end() == next.position.offset
    }

    pub fn word(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Word(w) => Some(w),
            _ => None,
        }
    }

    /// Case-insensitive match against a bare word.
    pub fn is_word(&self, expected: &str) -> bool {
        self.word().is_some_and(|w| w.eq_ignore_ascii_case(expected))
    }
}

/// Name part of a macro invocation: `get_user(admin)` -> `get_user`.
pub fn macro_name(invocation: &str) -> &str {
    invocation
        .find('(')
        .map_or(invocation, |idx| &invocation[..idx])
        .trim()
}
