//! An S-expression parser for KiCad design files that tracks source spans
//! for each node and keeps the exact lexeme of numeric atoms.
//!
//! The parser is iterative: nesting depth is bounded by heap memory, not by
//! the call stack, so pathological input cannot overflow it.
//!
//! - [`parse`] / [`parse_all`] - build a tree from text
//! - [`Sexpr::walk`] - depth-first traversal with ancestor context
//! - [`formatter`] - compact and indented serialization
//! - [`kicad`] and [`board`] - KiCad-specific queries

pub mod board;
pub mod formatter;
pub mod kicad;

use std::fmt;

/// Find a direct child list `(name ...)` within a list of [`Sexpr`] nodes.
pub fn find_child_list<'a>(items: &'a [Sexpr], name: &str) -> Option<&'a [Sexpr]> {
    items.iter().find_map(|item| {
        let list = item.as_list()?;
        (list.first().and_then(Sexpr::as_sym) == Some(name)).then_some(list)
    })
}

/// Find all direct child lists `(name ...)` within a list of [`Sexpr`] nodes.
pub fn find_all_child_lists<'a>(items: &'a [Sexpr], name: &str) -> Vec<&'a [Sexpr]> {
    items
        .iter()
        .filter_map(Sexpr::as_list)
        .filter(|list| list.first().and_then(Sexpr::as_sym) == Some(name))
        .collect()
}

/// Coerce a number atom into f64.
///
/// KiCad writes whole numbers as ints and everything else as floats.
pub fn number_as_f64(node: &Sexpr) -> Option<f64> {
    node.as_float().or_else(|| node.as_int().map(|v| v as f64))
}

/// Context provided while walking the S-expression tree.
#[derive(Debug, Clone)]
pub struct WalkCtx<'a> {
    /// Ancestors from root to parent of the current node (root first).
    pub ancestors: &'a [&'a Sexpr],
    /// Index of this node in its parent list, if it has a parent.
    pub index_in_parent: Option<usize>,
}

impl<'a> WalkCtx<'a> {
    pub fn parent(&self) -> Option<&'a Sexpr> {
        self.ancestors.last().copied()
    }

    /// Tag (first symbol) of the parent list.
    pub fn parent_tag(&self) -> Option<&'a str> {
        self.parent()?.as_list()?.first()?.as_sym()
    }

    pub fn depth(&self) -> usize {
        self.ancestors.len()
    }
}

/// Byte span in source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Span {
    /// Start byte offset (inclusive)
    pub start: usize,
    /// End byte offset (exclusive)
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Span for nodes that were constructed rather than parsed.
    pub fn synthetic() -> Self {
        Self { start: 0, end: 0 }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// The kind of S-expression value
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SexprKind {
    /// An unquoted identifier such as `kicad_sch` or `yes`
    Symbol(String),
    /// Quoted text, already unescaped
    String(String),
    Int(i64),
    F64(f64),
    List(Vec<Sexpr>),
}

/// An S-expression value with source span
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Sexpr {
    pub kind: SexprKind,
    pub span: Span,
    /// Exact source text of a numeric atom, so `1.000000` survives a round trip.
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub raw_atom: Option<String>,
}

impl PartialEq for Sexpr {
    fn eq(&self, other: &Self) -> bool {
        // Spans and raw lexemes are presentation, not value
        self.kind == other.kind
    }
}

// Dropping nested `Vec`s recurses once per level; flatten instead.
impl Drop for Sexpr {
    fn drop(&mut self) {
        let SexprKind::List(items) = &mut self.kind else {
            return;
        };
        if !items.iter().any(Sexpr::is_list) {
            return;
        }
        let mut pending = std::mem::take(items);
        while let Some(mut node) = pending.pop() {
            if let SexprKind::List(children) = &mut node.kind {
                pending.append(children);
            }
        }
    }
}

impl Sexpr {
    pub fn with_span(kind: SexprKind, span: Span) -> Self {
        Self {
            kind,
            span,
            raw_atom: None,
        }
    }

    pub fn symbol(s: impl Into<String>) -> Self {
        Self::with_span(SexprKind::Symbol(s.into()), Span::synthetic())
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::with_span(SexprKind::String(s.into()), Span::synthetic())
    }

    pub fn int(n: i64) -> Self {
        Self::with_span(SexprKind::Int(n), Span::synthetic())
    }

    pub fn float(f: f64) -> Self {
        Self::with_span(SexprKind::F64(f), Span::synthetic())
    }

    pub fn list(items: Vec<Sexpr>) -> Self {
        Self::with_span(SexprKind::List(items), Span::synthetic())
    }

    pub fn is_list(&self) -> bool {
        matches!(self.kind, SexprKind::List(_))
    }

    /// Symbol or string text. KiCad 5 writes many values unquoted that later
    /// versions quote, so most readers should go through this.
    pub fn as_atom(&self) -> Option<&str> {
        match &self.kind {
            SexprKind::Symbol(s) | SexprKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_sym(&self) -> Option<&str> {
        match &self.kind {
            SexprKind::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            SexprKind::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match &self.kind {
            SexprKind::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match &self.kind {
            SexprKind::F64(f) => Some(*f),
            _ => None,
        }
    }

    /// Int or float, widened to f64.
    pub fn as_number(&self) -> Option<f64> {
        number_as_f64(self)
    }

    pub fn as_list(&self) -> Option<&[Sexpr]> {
        match &self.kind {
            SexprKind::List(items) => Some(items),
            _ => None,
        }
    }

    /// Tag of a list node: the symbol in head position.
    pub fn tag(&self) -> Option<&str> {
        self.as_list()?.first()?.as_sym()
    }

    /// Find a child list with the given name (first element)
    pub fn find_list(&self, name: &str) -> Option<&[Sexpr]> {
        find_child_list(self.as_list()?, name)
    }

    /// Find all child lists with the given name
    pub fn find_all_lists(&self, name: &str) -> Vec<&[Sexpr]> {
        self.as_list()
            .map(|items| find_all_child_lists(items, name))
            .unwrap_or_default()
    }

    /// Depth-first, pre-order traversal of the tree, visiting every node once.
    ///
    /// Uses an explicit work stack, so arbitrarily deep trees are safe.
    ///
    /// # Example
    ///
    /// ```
    /// use jbom_sexpr::{parse, SexprKind};
    ///
    /// let sexpr = parse("(a (b c) d)").unwrap();
    /// let mut symbols = Vec::new();
    /// sexpr.walk(|node, _ctx| {
    ///     if let SexprKind::Symbol(s) = &node.kind {
    ///         symbols.push(s.clone());
    ///     }
    /// });
    /// assert_eq!(symbols, vec!["a", "b", "c", "d"]);
    /// ```
    pub fn walk<F>(&self, mut f: F)
    where
        F: FnMut(&Sexpr, WalkCtx<'_>),
    {
        let mut ancestors: Vec<&Sexpr> = Vec::new();
        let mut pending: Vec<(&Sexpr, usize, Option<usize>)> = vec![(self, 0, None)];

        while let Some((node, depth, index_in_parent)) = pending.pop() {
            ancestors.truncate(depth);
            f(
                node,
                WalkCtx {
                    ancestors: &ancestors,
                    index_in_parent,
                },
            );

            if let Some(children) = node.as_list() {
                ancestors.push(node);
                for (i, child) in children.iter().enumerate().rev() {
                    pending.push((child, depth + 1, Some(i)));
                }
            }
        }
    }
}

impl From<&str> for Sexpr {
    fn from(s: &str) -> Self {
        Self::symbol(s)
    }
}

impl From<i64> for Sexpr {
    fn from(n: i64) -> Self {
        Sexpr::int(n)
    }
}

impl From<f64> for Sexpr {
    fn from(n: f64) -> Self {
        Sexpr::float(n)
    }
}

impl fmt::Display for Sexpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&formatter::to_compact_string(self))
    }
}

/// What went wrong while parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ParseErrorKind {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unbalanced ')'")]
    UnbalancedClose,
    #[error("unclosed list")]
    UnclosedList,
    #[error("unterminated string")]
    UnterminatedString,
    #[error("trailing input after expression")]
    TrailingInput,
}

/// A parse failure with the location it refers to.
///
/// `offset` is a byte position into the input; `line` and `column` are
/// 1-based, with the column counted in characters.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind} at line {line}, column {column}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub offset: usize,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    fn at(input: &str, kind: ParseErrorKind, offset: usize) -> Self {
        let (line, column) = line_col(input, offset);
        Self {
            kind,
            offset,
            line,
            column,
        }
    }
}

/// 1-based line and column of a byte offset that lies on a char boundary.
pub fn line_col(input: &str, offset: usize) -> (usize, usize) {
    let before = &input[..offset.min(input.len())];
    let line = before.matches('\n').count() + 1;
    let column = before
        .rsplit('\n')
        .next()
        .map_or(0, |tail| tail.chars().count())
        + 1;
    (line, column)
}

/// A list whose closing parenthesis has not been seen yet.
struct OpenList {
    start: usize,
    items: Vec<Sexpr>,
}

/// Stack-based parser for S-expressions.
pub struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Parser { input, pos: 0 }
    }

    /// Parse exactly one expression. Anything but whitespace after it is an error.
    pub fn parse(&mut self) -> Result<Sexpr, ParseError> {
        let mut roots = self.parse_all()?;
        match roots.len() {
            0 => Err(ParseError::at(
                self.input,
                ParseErrorKind::UnexpectedEof,
                self.input.len(),
            )),
            1 => Ok(roots.remove(0)),
            _ => Err(ParseError::at(
                self.input,
                ParseErrorKind::TrailingInput,
                roots[1].span.start,
            )),
        }
    }

    /// Parse every top-level expression in the input.
    pub fn parse_all(&mut self) -> Result<Vec<Sexpr>, ParseError> {
        let mut roots = Vec::new();
        let mut open: Vec<OpenList> = Vec::new();
        let mut lists_closed = 0usize;

        loop {
            self.skip_whitespace();
            let Some(ch) = self.peek_char() else {
                break;
            };

            let node = match ch {
                '(' => {
                    open.push(OpenList {
                        start: self.pos,
                        items: Vec::new(),
                    });
                    self.pos += 1;
                    continue;
                }
                ')' => {
                    let Some(list) = open.pop() else {
                        return Err(ParseError::at(
                            self.input,
                            ParseErrorKind::UnbalancedClose,
                            self.pos,
                        ));
                    };
                    self.pos += 1;
                    lists_closed += 1;
                    if lists_closed % 10000 == 0 {
                        log::trace!("Closed {lists_closed} lists, now at byte {}", self.pos);
                    }
                    Sexpr::with_span(SexprKind::List(list.items), Span::new(list.start, self.pos))
                }
                '"' => self.parse_string()?,
                _ => self.parse_atom(),
            };

            match open.last_mut() {
                Some(parent) => parent.items.push(node),
                None => roots.push(node),
            }
        }

        if let Some(unclosed) = open.last() {
            return Err(ParseError::at(
                self.input,
                ParseErrorKind::UnclosedList,
                unclosed.start,
            ));
        }

        Ok(roots)
    }

    fn parse_atom(&mut self) -> Sexpr {
        let start = self.pos;
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() || matches!(ch, '(' | ')' | '"') {
                break;
            }
            self.pos += ch.len_utf8();
        }

        let text = &self.input[start..self.pos];
        let span = Span::new(start, self.pos);

        // `f64::from_str` also accepts words like "inf" and "nan"
        let numeric_start = text
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'));

        let kind = if !numeric_start {
            SexprKind::Symbol(text.to_string())
        } else if let Ok(n) = text.parse::<i64>() {
            SexprKind::Int(n)
        } else if let Some(f) = text.parse::<f64>().ok().filter(|f| f.is_finite()) {
            SexprKind::F64(f)
        } else {
            SexprKind::Symbol(text.to_string())
        };

        let raw_atom = matches!(kind, SexprKind::Int(_) | SexprKind::F64(_)).then(|| text.to_string());
        Sexpr {
            kind,
            span,
            raw_atom,
        }
    }

    fn parse_string(&mut self) -> Result<Sexpr, ParseError> {
        let start = self.pos;
        // opening quote
        self.pos += 1;
        let mut result = String::new();

        loop {
            let Some(ch) = self.peek_char() else {
                return Err(ParseError::at(
                    self.input,
                    ParseErrorKind::UnterminatedString,
                    start,
                ));
            };
            self.pos += ch.len_utf8();
            match ch {
                '"' => break,
                '\\' => {
                    let Some(escaped) = self.peek_char() else {
                        return Err(ParseError::at(
                            self.input,
                            ParseErrorKind::UnterminatedString,
                            start,
                        ));
                    };
                    self.pos += escaped.len_utf8();
                    result.push(match escaped {
                        'n' => '\n',
                        'r' => '\r',
                        't' => '\t',
                        other => other,
                    });
                }
                _ => result.push(ch),
            }
        }

        Ok(Sexpr::with_span(
            SexprKind::String(result),
            Span::new(start, self.pos),
        ))
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if !ch.is_whitespace() {
                break;
            }
            self.pos += ch.len_utf8();
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }
}

/// Parse a string into a single S-expression
pub fn parse(input: &str) -> Result<Sexpr, ParseError> {
    log::trace!("Parsing S-expression from {} bytes of input", input.len());
    let result = Parser::new(input).parse();
    if let Err(e) = &result {
        log::trace!("Failed to parse S-expression: {e}");
    }
    result
}

/// Parse a string into every top-level S-expression it contains
pub fn parse_all(input: &str) -> Result<Vec<Sexpr>, ParseError> {
    log::trace!(
        "Parsing multiple S-expressions from {} bytes of input",
        input.len()
    );
    Parser::new(input).parse_all()
}
