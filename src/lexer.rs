use thiserror::Error;

pub use crate::ast::Position;
use crate::ast::{Keyword, Token, TokenKind};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("lex error at {position}: {message}")]
pub struct LexError {
    pub position: Position,
    pub message: String,
}

impl LexError {
    fn new(position: Position, message: impl Into<String>) -> Self {
        LexError {
            position,
            message: message.into(),
        }
    }
}

/// True for characters that may appear in a bare word.
pub(crate) fn is_word_char(c: char) -> bool {
    !c.is_whitespace()
        && !c.is_control()
        && !matches!(
            c,
            '"' | '\''
                | '`'
                | '|'
                | '('
                | ')'
                | '['
                | ']'
                | ','
                | '='
                | '!'
                | '<'
                | '>'
                | '+'
                | '-'
                | '*'
                | '/'
                | '%'
        )
}

pub(crate) fn is_number(word: &str) -> bool {
    let mut dots = 0;
    let mut digits = 0;
    for c in word.chars() {
        match c {
            '.' => dots += 1,
            c if c.is_ascii_digit() => digits += 1,
            _ => return false,
        }
    }
    digits > 0 && dots <= 1
}

pub struct Lexer {
    input: Vec<char>,
    position: usize,
    line: usize,
    column: usize,
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 1,
        }
    }

    /// Current position; after the last token this is the end of input.
    pub fn position(&self) -> Position {
        Position {
            offset: self.position,
            line: self.line,
            column: self.column,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.position += 1;
            if ch == '\n' {
                self.line += 1;
                self.column = 1;
            } else {
                self.column += 1;
            }
        }
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.current_char() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn slice(&self, start: usize) -> String {
        self.input[start..self.position].iter().collect()
    }

    fn read_word(&mut self) -> String {
        let start = self.position;
        while let Some(ch) = self.current_char() {
            if is_word_char(ch) {
                self.advance();
            } else {
                break;
            }
        }
        self.slice(start)
    }

    /// Only `\\` and an escaped quote are decoded; any other backslash pair
    /// is kept as written so regex-like values survive untouched.
    fn read_string(&mut self, quote: char) -> Result<String, LexError> {
        let start = self.position();
        let mut result = String::new();
        self.advance(); // opening quote

        while let Some(ch) = self.current_char() {
            match ch {
                c if c == quote => {
                    self.advance();
                    return Ok(result);
                }
                '\\' => match self.peek_char(1) {
                    Some(next) if next == quote || next == '\\' => {
                        result.push(next);
                        self.advance();
                        self.advance();
                    }
                    Some(_) => {
                        result.push('\\');
                        self.advance();
                    }
                    None => break,
                },
                _ => {
                    result.push(ch);
                    self.advance();
                }
            }
        }

        Err(LexError::new(
            start,
            format!("unterminated string, missing closing {quote}"),
        ))
    }

    fn read_macro(&mut self) -> Result<String, LexError> {
        let start = self.position();
        self.advance(); // opening backtick
        let body_start = self.position;

        while let Some(ch) = self.current_char() {
            if ch == '`' {
                let body = self.slice(body_start);
                self.advance();
                if body.trim().is_empty() {
                    return Err(LexError::new(start, "empty macro invocation"));
                }
                return Ok(body);
            }
            self.advance();
        }

        Err(LexError::new(
            start,
            "unterminated macro, missing closing backtick",
        ))
    }

    fn single(&mut self, kind: TokenKind) -> TokenKind {
        self.advance();
        kind
    }

    fn with_eq(&mut self, plain: TokenKind, with_eq: TokenKind) -> TokenKind {
        if self.peek_char(1) == Some('=') {
            self.advance();
            self.advance();
            with_eq
        } else {
            self.advance();
            plain
        }
    }

    /// Next token, or `None` at end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>, LexError> {
        self.skip_whitespace();

        let position = self.position();
        let start = self.position;
        let Some(ch) = self.current_char() else {
            return Ok(None);
        };

        let kind = match ch {
            '|' => self.single(TokenKind::Pipe),
            ',' => self.single(TokenKind::Comma),
            '(' => self.single(TokenKind::LParen),
            ')' => self.single(TokenKind::RParen),
            '[' => self.single(TokenKind::LBracket),
            ']' => self.single(TokenKind::RBracket),
            '+' => self.single(TokenKind::Plus),
            '-' => self.single(TokenKind::Minus),
            '*' => self.single(TokenKind::Star),
            '/' => self.single(TokenKind::Slash),
            '%' => self.single(TokenKind::Percent),
            '=' => self.with_eq(TokenKind::Eq, TokenKind::EqEq),
            '<' => self.with_eq(TokenKind::Lt, TokenKind::LtEq),
            '>' => self.with_eq(TokenKind::Gt, TokenKind::GtEq),
            '!' => {
                if self.peek_char(1) == Some('=') {
                    self.advance();
                    self.advance();
                    TokenKind::NotEq
                } else {
                    return Err(LexError::new(position, "unexpected '!', expected '!='"));
                }
            }
            '"' | '\'' => TokenKind::Str {
                value: self.read_string(ch)?,
                quote: ch,
            },
            '`' => TokenKind::Macro(self.read_macro()?),
            c if c.is_control() => {
                return Err(LexError::new(
                    position,
                    format!("invalid character U+{:04X}", c as u32),
                ));
            }
            _ => {
                let word = self.read_word();
                if let Some(keyword) = Keyword::from_word(&word) {
                    TokenKind::Keyword(keyword)
                } else if is_number(&word) {
                    TokenKind::Number(word)
                } else {
                    TokenKind::Word(word)
                }
            }
        };

        Ok(Some(Token {
            kind,
            raw: self.slice(start),
            position,
        }))
    }

    pub fn tokenize(&mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        while let Some(token) = self.next_token()? {
            tokens.push(token);
        }
        Ok(tokens)
    }
}

#[cfg(test)]
fn kinds(input: &str) -> Vec<TokenKind> {
    Lexer::new(input)
        .tokenize()
        .unwrap()
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

#[test]
fn test_keywords() {
    assert_eq!(
        kinds("and OR Not"),
        vec![
            TokenKind::Keyword(Keyword::And),
            TokenKind::Keyword(Keyword::Or),
            TokenKind::Keyword(Keyword::Not),
        ]
    );
}

#[test]
fn test_pipe() {
    assert_eq!(
        kinds("a | [b] (c)"),
        vec![
            TokenKind::Word("a".to_string()),
            TokenKind::Pipe,
            TokenKind::LBracket,
            TokenKind::Word("b".to_string()),
            TokenKind::RBracket,
            TokenKind::LParen,
            TokenKind::Word("c".to_string()),
            TokenKind::RParen,
        ]
    );
}

#[test]
fn test_lone_bang() {
    let err = Lexer::new("a ! b").tokenize().unwrap_err();
    assert_eq!(err.position.offset, 2);
}

#[test]
fn test_line_tracking() {
    let tokens = Lexer::new("a\n  b").tokenize().unwrap();
    assert_eq!(tokens[1].position.line, 2);
    assert_eq!(tokens[1].position.column, 3);
}
