use thiserror::Error;

use crate::{
    ast::{
        Aggregation, Argument, Assignment, BinOp, Command, CommandKeyword, CompareOp, Expr,
        FieldsMode, Keyword, Literal, LookupField, LookupOutput, OutputMode, Position, Query,
        RenamePair, Token, TokenKind,
    },
    lexer::{LexError, Lexer},
};

#[derive(Debug, Clone, PartialEq, Error)]
#[error("parse error at {position}: {message}")]
pub struct ParseError {
    pub position: Position,
    pub message: String,
}

impl ParseError {
    fn new(position: Position, message: impl Into<String>) -> Self {
        ParseError {
            position,
            message: message.into(),
        }
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    end: Position,
}

impl Parser {
    pub fn new(mut lexer: Lexer) -> Result<Self, LexError> {
        let tokens = lexer.tokenize()?;
        Ok(Parser {
            tokens,
            end: lexer.position(),
        })
    }

    /// Parse a complete query
    pub fn parse_query(&mut self) -> Result<Query, ParseError> {
        parse_pipeline(&self.tokens, self.end)
    }
}

fn compare_op(kind: &TokenKind) -> Option<CompareOp> {
    match kind {
        TokenKind::Eq => Some(CompareOp::Eq),
        TokenKind::EqEq => Some(CompareOp::EqEq),
        TokenKind::NotEq => Some(CompareOp::NotEq),
        TokenKind::Lt => Some(CompareOp::Lt),
        TokenKind::LtEq => Some(CompareOp::LtEq),
        TokenKind::Gt => Some(CompareOp::Gt),
        TokenKind::GtEq => Some(CompareOp::GtEq),
        _ => None,
    }
}

fn starts_glue(kind: &TokenKind) -> bool {
    matches!(
        kind,
        TokenKind::Word(_)
            | TokenKind::Number(_)
            | TokenKind::Star
            | TokenKind::Minus
            | TokenKind::Plus
            | TokenKind::Slash
            | TokenKind::Percent
    )
}

fn continues_glue(kind: &TokenKind) -> bool {
    starts_glue(kind) || matches!(kind, TokenKind::Keyword(_))
}

/// Split `tokens` on top-level pipes and parse each segment.
///
/// `end` is reported for errors that have no token to point at.
pub(crate) fn parse_pipeline(tokens: &[Token], end: Position) -> Result<Query, ParseError> {
    if tokens.is_empty() {
        return Err(ParseError::new(end, "empty query"));
    }

    // (segment start, segment end, pipe before the segment)
    let mut segments: Vec<(usize, usize, Option<&Token>)> = Vec::new();
    let mut openers: Vec<&Token> = Vec::new();
    let mut start = 0;
    let mut pipe: Option<&Token> = None;

    for (idx, token) in tokens.iter().enumerate() {
        match token.kind {
            TokenKind::LParen | TokenKind::LBracket => openers.push(token),
            TokenKind::RParen | TokenKind::RBracket => {
                let expected = if token.kind == TokenKind::RParen {
                    TokenKind::LParen
                } else {
                    TokenKind::LBracket
                };
                match openers.pop() {
                    Some(open) if open.kind == expected => {}
                    _ => {
                        return Err(ParseError::new(
                            token.position,
                            format!("unbalanced '{}'", token.raw),
                        ));
                    }
                }
            }
            TokenKind::Pipe if openers.is_empty() => {
                segments.push((start, idx, pipe));
                start = idx + 1;
                pipe = Some(token);
            }
            _ => {}
        }
    }
    if let Some(open) = openers.last() {
        return Err(ParseError::new(
            open.position,
            format!("unclosed '{}'", open.raw),
        ));
    }
    segments.push((start, tokens.len(), pipe));

    let mut commands = Vec::with_capacity(segments.len());
    for (idx, &(from, to, pipe)) in segments.iter().enumerate() {
        let segment = &tokens[from..to];
        let segment_end = tokens.get(to).map_or(end, |t| t.position);

        if segment.is_empty() {
            // a leading pipe is allowed: `| inputlookup users.csv`
            if idx == 0 {
                continue;
            }
            let position = pipe.map_or(end, |p| p.position);
            return Err(ParseError::new(position, "missing command after '|'"));
        }

        commands.push(parse_segment(segment, segment_end, idx == 0)?);
    }

    Ok(Query::new(commands))
}

/// Keyword heading a segment, unless it is really a field being compared
/// (`search=foo`).
fn command_keyword(segment: &[Token]) -> Option<CommandKeyword> {
    let keyword = CommandKeyword::from_name(segment.first()?.word()?)?;
    match segment.get(1) {
        Some(next) if compare_op(&next.kind).is_some() => None,
        _ => Some(keyword),
    }
}

fn parse_segment(segment: &[Token], end: Position, first: bool) -> Result<Command, ParseError> {
    let mut p = SegmentParser::new(segment, end);

    let command = match command_keyword(segment) {
        None if first => Command::Search {
            explicit: false,
            filter: Some(p.search_or()?),
        },
        None => return Ok(Command::Generic(segment.to_vec())),
        Some(keyword) => {
            p.pos = 1;
            match keyword {
                CommandKeyword::Search => Command::Search {
                    explicit: true,
                    filter: if p.at_end() {
                        None
                    } else {
                        Some(p.search_or()?)
                    },
                },
                CommandKeyword::Where => {
                    if p.at_end() {
                        return Err(p.error("where requires a condition"));
                    }
                    Command::Where(p.eval_or()?)
                }
                CommandKeyword::Eval => Command::Eval(p.eval_assignments()?),
                CommandKeyword::Stats(kind) => {
                    let options = p.arguments()?;
                    let aggregations = p.aggregations(&["by"])?;
                    if aggregations.is_empty() {
                        return Err(p.error(format!(
                            "{} requires at least one aggregation",
                            kind.as_str()
                        )));
                    }
                    let by = if p.eat_word("by") {
                        p.field_list()?
                    } else {
                        Vec::new()
                    };
                    Command::Stats {
                        kind,
                        options,
                        aggregations,
                        by,
                    }
                }
                CommandKeyword::Rename => Command::Rename(p.renames()?),
                CommandKeyword::Table => Command::Table(p.field_list()?),
                CommandKeyword::Fields => {
                    let mode = if p.eat(&TokenKind::Minus) {
                        Some(FieldsMode::Remove)
                    } else if p.eat(&TokenKind::Plus) {
                        Some(FieldsMode::Keep)
                    } else {
                        None
                    };
                    Command::Fields {
                        mode,
                        fields: p.field_list()?,
                    }
                }
                CommandKeyword::Lookup => p.lookup()?,
                CommandKeyword::InputLookup => {
                    let options = p.arguments()?;
                    let (table, _) = p.name("lookup table name")?;
                    let filter = if p.eat_word("where") {
                        Some(p.search_or()?)
                    } else {
                        None
                    };
                    Command::InputLookup {
                        options,
                        table,
                        filter,
                    }
                }
                CommandKeyword::Datamodel => {
                    let mut names = Vec::new();
                    while names.len() < 3 && p.peek_is_name() && !p.next_is_assignment() {
                        names.push(p.name("data model name")?.0);
                    }
                    let mut names = names.into_iter();
                    Command::Datamodel {
                        model: names.next(),
                        dataset: names.next(),
                        mode: names.next(),
                        options: p.arguments()?,
                    }
                }
                CommandKeyword::Tstats => p.tstats()?,
                CommandKeyword::From => {
                    let tokens = segment[1..].to_vec();
                    let (datamodel, dataset) = from_datamodel(&tokens);
                    p.pos = segment.len();
                    Command::From {
                        datamodel,
                        dataset,
                        tokens,
                    }
                }
                CommandKeyword::Pivot => {
                    let (model, _) = p.name("pivot data model")?;
                    let (dataset, _) = p.name("pivot dataset")?;
                    p.pos = segment.len();
                    Command::Pivot {
                        model,
                        dataset,
                        tokens: segment[1..].to_vec(),
                    }
                }
            }
        }
    };

    p.finish()?;
    Ok(command)
}

/// Data model and dataset named by `from datamodel:Model.Dataset` or
/// `from datamodel:"Model"."Dataset"`.
fn from_datamodel(tokens: &[Token]) -> (Option<String>, Option<String>) {
    fn split(name: &str) -> (Option<String>, Option<String>) {
        match name.split_once('.') {
            Some((model, dataset)) => (Some(model.to_string()), Some(dataset.to_string())),
            None if name.is_empty() => (None, None),
            None => (Some(name.to_string()), None),
        }
    }

    let Some(head) = tokens.first().and_then(Token::word) else {
        return (None, None);
    };
    let Some(prefix) = head.get(..10) else {
        return (None, None);
    };
    if !prefix.eq_ignore_ascii_case("datamodel:") {
        return (None, None);
    }

    let rest = &head[10..];
    if !rest.is_empty() {
        return split(rest);
    }

    match tokens.get(1).map(|t| &t.kind) {
        Some(TokenKind::Str { value: model, .. }) => {
            let dataset = match (tokens.get(2), tokens.get(3).map(|t| &t.kind)) {
                (Some(dot), Some(TokenKind::Str { value, .. })) if dot.is_word(".") => {
                    Some(value.clone())
                }
                _ => None,
            };
            if dataset.is_some() {
                (Some(model.clone()), dataset)
            } else {
                split(model)
            }
        }
        _ => (None, None),
    }
}

/// Token text joined from adjacent tokens with no whitespace between them.
struct Glued {
    text: String,
    /// exactly one numeric token
    number: bool,
}

impl Glued {
    fn literal(self) -> Literal {
        if self.number {
            Literal::Number(self.text)
        } else {
            Literal::Bare(self.text)
        }
    }
}

struct SegmentParser<'t> {
    tokens: &'t [Token],
    pos: usize,
    end: Position,
    /// Words that end a search filter (`by` inside tstats)
    stop_words: &'static [&'static str],
}

impl<'t> SegmentParser<'t> {
    fn new(tokens: &'t [Token], end: Position) -> Self {
        SegmentParser {
            tokens,
            pos: 0,
            end,
            stop_words: &[],
        }
    }

    fn peek(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + offset)
    }

    fn advance(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek().is_some_and(|t| &t.kind == kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn check_word(&self, word: &str) -> bool {
        self.peek().is_some_and(|t| t.is_word(word))
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.check_word(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn at_stop_word(&self) -> bool {
        self.stop_words.iter().any(|w| self.check_word(w))
    }

    fn position(&self) -> Position {
        self.peek().map_or(self.end, |t| t.position)
    }

    fn error(&self, message: impl Into<String>) -> ParseError {
        ParseError::new(self.position(), message)
    }

    fn found(&self) -> String {
        match self.peek() {
            Some(token) => format!("'{}'", token.raw),
            None => "end of command".to_string(),
        }
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<&'t Token, ParseError> {
        match self.peek() {
            Some(token) if &token.kind == kind => {
                self.pos += 1;
                Ok(token)
            }
            _ => Err(self.error(format!("expected {what}, found {}", self.found()))),
        }
    }

    fn finish(&self) -> Result<(), ParseError> {
        match self.peek() {
            Some(token) => Err(ParseError::new(
                token.position,
                format!("unexpected '{}'", token.raw),
            )),
            None => Ok(()),
        }
    }

    fn peek_is_name(&self) -> bool {
        self.peek()
            .is_some_and(|t| starts_glue(&t.kind) || matches!(t.kind, TokenKind::Str { .. }))
    }

    /// `key=...` ahead
    fn next_is_assignment(&self) -> bool {
        self.peek().is_some_and(|t| t.word().is_some())
            && self.peek_at(1).is_some_and(|t| t.kind == TokenKind::Eq)
    }

    fn glued(&mut self) -> Option<Glued> {
        let first = self.peek().filter(|t| starts_glue(&t.kind))?;
        self.pos += 1;

        let mut text = first.raw.clone();
        let mut last = first;
        let mut count = 1;
        while let Some(next) = self.peek() {
            if !(last.touches(next) && continues_glue(&next.kind)) {
                break;
            }
            text.push_str(&next.raw);
            last = next;
            self.pos += 1;
            count += 1;
        }

        Some(Glued {
            text,
            number: count == 1 && matches!(first.kind, TokenKind::Number(_)),
        })
    }

    /// Field, table or alias name: a glued word or a quoted string.
    fn name(&mut self, what: &str) -> Result<(String, Option<char>), ParseError> {
        if let Some(token) = self.peek()
            && let TokenKind::Str { value, quote } = &token.kind
        {
            self.pos += 1;
            return Ok((value.clone(), Some(*quote)));
        }
        match self.glued() {
            Some(glued) => Ok((glued.text, None)),
            None => Err(self.error(format!("expected {what}, found {}", self.found()))),
        }
    }

    fn field(&mut self) -> Result<Expr, ParseError> {
        let (name, quote) = self.name("field name")?;
        Ok(Expr::FieldRef { name, quote })
    }

    fn alias(&mut self) -> Result<Option<String>, ParseError> {
        if self.eat_word("as") {
            Ok(Some(self.name("alias after AS")?.0))
        } else {
            Ok(None)
        }
    }

    /// Literal in value position: quoted string or glued bare value.
    fn literal(&mut self) -> Result<Literal, ParseError> {
        if let Some(token) = self.peek()
            && let TokenKind::Str { value, quote } = &token.kind
        {
            self.pos += 1;
            return Ok(Literal::String {
                value: value.clone(),
                quote: *quote,
            });
        }
        match self.glued() {
            Some(glued) => Ok(glued.literal()),
            None => Err(self.error(format!("missing value, found {}", self.found()))),
        }
    }

    /// Leading `key=value` options.
    fn arguments(&mut self) -> Result<Vec<Argument>, ParseError> {
        let mut arguments = Vec::new();
        while self.next_is_assignment() {
            let key = self.advance().map(|t| t.raw.clone()).unwrap_or_default();
            self.pos += 1; // '='
            if self.at_end() {
                return Err(self.error(format!("malformed key=value clause for '{key}'")));
            }
            let value = self.literal()?;
            arguments.push(Argument { key, value });
        }
        Ok(arguments)
    }

    /// Comma-or-space separated field names, ending at an option clause.
    fn field_list(&mut self) -> Result<Vec<Expr>, ParseError> {
        let mut fields = Vec::new();
        while self.peek_is_name() && !self.next_is_assignment() {
            fields.push(self.field()?);
            self.eat(&TokenKind::Comma);
        }
        Ok(fields)
    }

    fn comma_separated<T>(
        &mut self,
        mut item: impl FnMut(&mut Self) -> Result<T, ParseError>,
    ) -> Result<Vec<T>, ParseError> {
        let mut items = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(items);
        }
        loop {
            items.push(item(self)?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(&TokenKind::RParen, "',' or ')'")?;
            return Ok(items);
        }
    }

    fn subsearch(&mut self) -> Result<Expr, ParseError> {
        let open = self.pos;
        let mut depth = 0usize;
        let mut close = None;
        for (idx, token) in self.tokens.iter().enumerate().skip(open) {
            match token.kind {
                TokenKind::LBracket | TokenKind::LParen => depth += 1,
                TokenKind::RBracket | TokenKind::RParen => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        close = Some(idx);
                        break;
                    }
                }
                _ => {}
            }
        }
        let Some(close) = close else {
            return Err(self.error("unclosed '['"));
        };

        let inner = &self.tokens[open + 1..close];
        let end = self.tokens[close].position;
        if inner.is_empty() {
            return Err(ParseError::new(end, "empty subsearch"));
        }
        let query = parse_pipeline(inner, end)?;
        self.pos = close + 1;
        Ok(Expr::Subsearch(Box::new(query)))
    }

    // Search filters: OR < AND (explicit or implicit) < NOT < term

    fn search_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.search_and()?;
        while self.eat(&TokenKind::Keyword(Keyword::Or)) {
            let right = self.search_and()?;
            left = Expr::binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    fn starts_search_term(&self) -> bool {
        let Some(token) = self.peek() else {
            return false;
        };
        if self.at_stop_word() {
            return false;
        }
        starts_glue(&token.kind)
            || matches!(
                token.kind,
                TokenKind::Str { .. }
                    | TokenKind::Macro(_)
                    | TokenKind::LParen
                    | TokenKind::LBracket
                    | TokenKind::Keyword(Keyword::Not)
            )
    }

    fn search_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.search_not()?;
        loop {
            let op = if self.eat(&TokenKind::Keyword(Keyword::And)) {
                BinOp::And
            } else if self.starts_search_term() {
                BinOp::ImplicitAnd
            } else {
                break;
            };
            let right = self.search_not()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn search_not(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&TokenKind::Keyword(Keyword::Not)) {
            return Ok(Expr::Not(Box::new(self.search_not()?)));
        }
        self.search_term()
    }

    fn search_term(&mut self) -> Result<Expr, ParseError> {
        let Some(token) = self.peek() else {
            return Err(self.error("missing operand at end of command"));
        };

        match &token.kind {
            TokenKind::LParen => {
                self.pos += 1;
                let inner = self.search_or()?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(Expr::Group(Box::new(inner)))
            }
            TokenKind::LBracket => self.subsearch(),
            TokenKind::Macro(text) => {
                self.pos += 1;
                Ok(Expr::Macro(text.clone()))
            }
            TokenKind::Str { value, quote } => {
                self.pos += 1;
                match self.peek().and_then(|t| compare_op(&t.kind)) {
                    Some(op) => {
                        self.pos += 1;
                        let field = Expr::FieldRef {
                            name: value.clone(),
                            quote: Some(*quote),
                        };
                        Ok(Expr::comparison(field, op, self.search_value()?))
                    }
                    None => Ok(Expr::Literal(Literal::String {
                        value: value.clone(),
                        quote: *quote,
                    })),
                }
            }
            TokenKind::Word(name)
                if self
                    .peek_at(1)
                    .is_some_and(|next| next.kind == TokenKind::LParen && token.touches(next)) =>
            {
                self.pos += 2;
                let args = self.comma_separated(|p| p.search_or())?;
                Ok(Expr::FunctionCall {
                    name: name.clone(),
                    args,
                })
            }
            kind if starts_glue(kind) => {
                let Some(glued) = self.glued() else {
                    return Err(self.error("missing operand"));
                };

                if let Some(op) = self.peek().and_then(|t| compare_op(&t.kind)) {
                    self.pos += 1;
                    let value = self.search_value()?;
                    return Ok(Expr::comparison(Expr::field(glued.text), op, value));
                }

                if self.check_word("in")
                    && self
                        .peek_at(1)
                        .is_some_and(|t| t.kind == TokenKind::LParen)
                {
                    self.pos += 2;
                    let values = self.comma_separated(|p| p.search_value())?;
                    return Ok(Expr::In {
                        left: Box::new(Expr::field(glued.text)),
                        values,
                    });
                }

                Ok(Expr::Literal(glued.literal()))
            }
            TokenKind::Keyword(keyword) => Err(self.error(format!(
                "missing operand before {}",
                keyword.as_str()
            ))),
            _ => Err(self.error(format!("unexpected '{}'", token.raw))),
        }
    }

    /// Right-hand side of a search comparison.
    fn search_value(&mut self) -> Result<Expr, ParseError> {
        if let Some(token) = self.peek()
            && let TokenKind::Macro(text) = &token.kind
        {
            self.pos += 1;
            return Ok(Expr::Macro(text.clone()));
        }
        if self.peek_is_name() {
            return Ok(Expr::Literal(self.literal()?));
        }
        Err(self.error(format!("missing operand, found {}", self.found())))
    }

    // Eval and where: OR < AND < NOT < comparison < additive < multiplicative < unary

    fn eval_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.eval_and()?;
        while self.eat(&TokenKind::Keyword(Keyword::Or)) {
            let right = self.eval_and()?;
            left = Expr::binary(BinOp::Or, left, right);
        }
        Ok(left)
    }

    fn eval_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.eval_not()?;
        while self.eat(&TokenKind::Keyword(Keyword::And)) {
            let right = self.eval_not()?;
            left = Expr::binary(BinOp::And, left, right);
        }
        Ok(left)
    }

    fn eval_not(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&TokenKind::Keyword(Keyword::Not)) {
            return Ok(Expr::Not(Box::new(self.eval_not()?)));
        }
        self.eval_comparison()
    }

    fn eval_comparison(&mut self) -> Result<Expr, ParseError> {
        let left = self.eval_additive()?;

        if let Some(op) = self.peek().and_then(|t| compare_op(&t.kind)) {
            self.pos += 1;
            let right = self.eval_additive()?;
            return Ok(Expr::comparison(left, op, right));
        }

        if self.check_word("in")
            && self
                .peek_at(1)
                .is_some_and(|t| t.kind == TokenKind::LParen)
        {
            self.pos += 2;
            let values = self.comma_separated(|p| p.eval_or())?;
            return Ok(Expr::In {
                left: Box::new(left),
                values,
            });
        }

        Ok(left)
    }

    fn eval_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.eval_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(t) if t.kind == TokenKind::Plus => BinOp::Add,
                Some(t) if t.kind == TokenKind::Minus => BinOp::Subtract,
                Some(t) if t.is_word(".") => BinOp::Concat,
                _ => break,
            };
            self.pos += 1;
            let right = self.eval_multiplicative()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn eval_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.eval_unary()?;
        loop {
            let op = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Star) => BinOp::Multiply,
                Some(TokenKind::Slash) => BinOp::Divide,
                Some(TokenKind::Percent) => BinOp::Modulo,
                _ => break,
            };
            self.pos += 1;
            let right = self.eval_unary()?;
            left = Expr::binary(op, left, right);
        }
        Ok(left)
    }

    fn eval_unary(&mut self) -> Result<Expr, ParseError> {
        if self.eat(&TokenKind::Minus) {
            return Ok(Expr::Negate(Box::new(self.eval_unary()?)));
        }
        self.eval_primary()
    }

    fn eval_primary(&mut self) -> Result<Expr, ParseError> {
        let Some(token) = self.peek() else {
            return Err(self.error("missing operand at end of command"));
        };

        let expr = match &token.kind {
            TokenKind::Number(raw) => Expr::Literal(Literal::Number(raw.clone())),
            TokenKind::Str { value, quote: '\'' } => Expr::FieldRef {
                name: value.clone(),
                quote: Some('\''),
            },
            TokenKind::Str { value, quote } => Expr::Literal(Literal::String {
                value: value.clone(),
                quote: *quote,
            }),
            TokenKind::Macro(text) => Expr::Macro(text.clone()),
            TokenKind::Star => Expr::bare("*"),
            TokenKind::LParen => {
                self.pos += 1;
                let inner = self.eval_or()?;
                self.expect(&TokenKind::RParen, "')'")?;
                return Ok(Expr::Group(Box::new(inner)));
            }
            TokenKind::LBracket => return self.subsearch(),
            TokenKind::Word(name)
                if self
                    .peek_at(1)
                    .is_some_and(|t| t.kind == TokenKind::LParen) =>
            {
                self.pos += 2;
                let args = self.comma_separated(|p| p.eval_or())?;
                return Ok(Expr::FunctionCall {
                    name: name.clone(),
                    args,
                });
            }
            TokenKind::Word(name) => Expr::field(name.clone()),
            TokenKind::Keyword(keyword) => {
                return Err(self.error(format!("missing operand before {}", keyword.as_str())));
            }
            _ => return Err(self.error(format!("missing operand, found '{}'", token.raw))),
        };

        self.pos += 1;
        Ok(expr)
    }

    // Commands

    fn eval_assignments(&mut self) -> Result<Vec<Assignment>, ParseError> {
        let mut assignments = Vec::new();
        loop {
            let (target, _) = self.name("eval target")?;
            if !self.eat(&TokenKind::Eq) {
                return Err(self.error(format!(
                    "malformed key=value clause, expected '=' after '{target}'"
                )));
            }
            let value = self.eval_or()?;
            assignments.push(Assignment { target, value });
            if !self.eat(&TokenKind::Comma) {
                return Ok(assignments);
            }
        }
    }

    /// Aggregations up to (not including) one of `stop` or the end.
    fn aggregations(&mut self, stop: &[&str]) -> Result<Vec<Aggregation>, ParseError> {
        let mut aggregations = Vec::new();
        while let Some(token) = self.peek() {
            if stop.iter().any(|w| token.is_word(w)) {
                break;
            }
            let Some(function) = token.word() else {
                return Err(self.error(format!(
                    "expected aggregation function, found '{}'",
                    token.raw
                )));
            };
            self.pos += 1;

            let args = if self.eat(&TokenKind::LParen) {
                Some(self.comma_separated(|p| p.eval_or())?)
            } else {
                None
            };
            let alias = self.alias()?;
            aggregations.push(Aggregation {
                function: function.to_string(),
                args,
                alias,
            });
            self.eat(&TokenKind::Comma);
        }
        Ok(aggregations)
    }

    fn renames(&mut self) -> Result<Vec<RenamePair>, ParseError> {
        let mut renames = Vec::new();
        while !self.at_end() {
            let from = self.field()?;
            if !self.eat_word("as") {
                return Err(self.error(format!("expected AS, found {}", self.found())));
            }
            let (to, _) = self.name("new field name")?;
            renames.push(RenamePair { from, to });
            self.eat(&TokenKind::Comma);
        }
        if renames.is_empty() {
            return Err(self.error("rename requires at least one 'field AS name' clause"));
        }
        Ok(renames)
    }

    fn lookup(&mut self) -> Result<Command, ParseError> {
        let options = self.arguments()?;
        let (table, _) = self.name("lookup table name")?;

        let mut inputs = Vec::new();
        while self.peek_is_name() && !self.check_word("output") && !self.check_word("outputnew") {
            let first = self.field()?;
            let input = if self.eat_word("as") {
                LookupField {
                    column: first.field_name().map(str::to_string),
                    field: self.field()?,
                }
            } else {
                LookupField {
                    column: None,
                    field: first,
                }
            };
            inputs.push(input);
            self.eat(&TokenKind::Comma);
        }

        let mode = if self.eat_word("output") {
            Some(OutputMode::Output)
        } else if self.eat_word("outputnew") {
            Some(OutputMode::OutputNew)
        } else {
            None
        };
        let output = match mode {
            Some(mode) => {
                let mut outputs = Vec::new();
                while self.peek_is_name() {
                    let (field, _) = self.name("output field")?;
                    let alias = self.alias()?;
                    outputs.push(LookupOutput { field, alias });
                    self.eat(&TokenKind::Comma);
                }
                Some((mode, outputs))
            }
            None => None,
        };

        Ok(Command::Lookup {
            options,
            table,
            inputs,
            output,
        })
    }

    fn tstats(&mut self) -> Result<Command, ParseError> {
        let options = self.arguments()?;
        let aggregations = self.aggregations(&["from", "where", "by"])?;

        let datamodel = if self.eat_word("from") {
            if !self.eat_word("datamodel") {
                return Err(self.error(format!(
                    "expected 'datamodel=' after from, found {}",
                    self.found()
                )));
            }
            self.expect(&TokenKind::Eq, "'='")?;
            Some(self.name("data model name")?.0)
        } else {
            None
        };

        let filter = if self.eat_word("where") {
            self.stop_words = &["by"];
            let filter = self.search_or();
            self.stop_words = &[];
            Some(filter?)
        } else {
            None
        };

        let by = if self.eat_word("by") {
            self.field_list()?
        } else {
            Vec::new()
        };
        let by_options = self.arguments()?;

        Ok(Command::Tstats {
            options,
            aggregations,
            datamodel,
            filter,
            by,
            by_options,
        })
    }
}
