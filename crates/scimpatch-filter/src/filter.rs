//! SCIM filter expression parser.
//!
//! Implements the filter syntax of RFC 7644 §3.4.2.2.
//!
//! # Syntax
//!
//! ```text
//! FILTER    = attrExp / logExp / valuePath / *1"not" "(" FILTER ")"
//! valuePath = attrPath "[" valFilter "]"
//! attrExp   = (attrPath SP "pr") / (attrPath SP compareOp SP compValue)
//! logExp    = FILTER SP ("and" / "or") SP FILTER
//! compareOp = "eq" / "ne" / "co" / "sw" / "ew" / "gt" / "lt" / "ge" / "le"
//! compValue = false / null / true / number / string
//! ```
//!
//! `and` binds tighter than `or`. Keywords and operators are
//! case-insensitive.
//!
//! # Examples
//!
//! ```text
//! userName eq "bjensen"
//! name.familyName co "O'Malley"
//! title pr and userType eq "Employee"
//! emails[type eq "work" and value co "@example.com"]
//! not (active eq false)
//! ```

use std::fmt;

use serde_json::Number;

use crate::error::FilterError;
use crate::path::{AttributePath, parse_attr_path};

/// Comparison operators supported in filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Contains
    Co,
    /// Starts with
    Sw,
    /// Ends with
    Ew,
    /// Greater than
    Gt,
    /// Less than
    Lt,
    /// Greater than or equal
    Ge,
    /// Less than or equal
    Le,
}

impl CompareOp {
    fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "eq" => Some(Self::Eq),
            "ne" => Some(Self::Ne),
            "co" => Some(Self::Co),
            "sw" => Some(Self::Sw),
            "ew" => Some(Self::Ew),
            "gt" => Some(Self::Gt),
            "lt" => Some(Self::Lt),
            "ge" => Some(Self::Ge),
            "le" => Some(Self::Le),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::Ne => "ne",
            Self::Co => "co",
            Self::Sw => "sw",
            Self::Ew => "ew",
            Self::Gt => "gt",
            Self::Lt => "lt",
            Self::Ge => "ge",
            Self::Le => "le",
        }
    }

    pub fn is_ordering(self) -> bool {
        matches!(self, Self::Gt | Self::Lt | Self::Ge | Self::Le)
    }

    pub fn is_substring(self) -> bool {
        matches!(self, Self::Co | Self::Sw | Self::Ew)
    }
}

/// Logical operators for combining filter expressions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// Literal on the right-hand side of a comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum CompareValue {
    String(String),
    Number(Number),
    Bool(bool),
    Null,
}

impl fmt::Display for CompareValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) => {
                let quoted = serde_json::to_string(s).map_err(|_| fmt::Error)?;
                f.write_str(&quoted)
            }
            Self::Number(n) => write!(f, "{n}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null => f.write_str("null"),
        }
    }
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    /// `path pr`
    Present(AttributePath),
    /// A comparison: path op value
    Comparison {
        path: AttributePath,
        op: CompareOp,
        value: CompareValue,
    },
    /// Logical AND or OR of two expressions
    Logical {
        op: LogicalOp,
        left: Box<FilterExpression>,
        right: Box<FilterExpression>,
    },
    /// Negation of an expression
    Not(Box<FilterExpression>),
    /// Filter over the items of a multi-valued attribute; paths inside
    /// `filter` are relative to each item.
    ValuePath {
        path: AttributePath,
        filter: Box<FilterExpression>,
    },
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Present(path) => write!(f, "{path} pr"),
            Self::Comparison { path, op, value } => write!(f, "{path} {} {value}", op.as_str()),
            Self::Logical { op, left, right } => {
                let write_operand = |f: &mut fmt::Formatter<'_>, expr: &FilterExpression| {
                    // `or` under `and` needs parentheses to keep its grouping
                    let needs_parens = *op == LogicalOp::And
                        && matches!(
                            expr,
                            FilterExpression::Logical {
                                op: LogicalOp::Or,
                                ..
                            }
                        );
                    if needs_parens {
                        write!(f, "({expr})")
                    } else {
                        write!(f, "{expr}")
                    }
                };
                write_operand(f, left)?;
                match op {
                    LogicalOp::And => f.write_str(" and ")?,
                    LogicalOp::Or => f.write_str(" or ")?,
                }
                write_operand(f, right)
            }
            Self::Not(inner) => write!(f, "not ({inner})"),
            Self::ValuePath { path, filter } => write!(f, "{path}[{filter}]"),
        }
    }
}

/// Tokenizer for filter expressions.
struct Tokenizer<'a> {
    input: &'a str,
    pos: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Identifier(String),
    QuotedString(String),
    Number(Number),
    OpenParen,
    CloseParen,
    OpenBracket,
    CloseBracket,
    And,
    Or,
    Not,
    Present,
    True,
    False,
    Null,
    Operator(CompareOp),
    Eof,
}

impl<'a> Tokenizer<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek_char(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek_char() {
            if ch.is_whitespace() {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
    }

    /// Returns the next token and the byte offset where it starts.
    fn next_token(&mut self) -> Result<(Token, usize), FilterError> {
        self.skip_whitespace();
        let start = self.pos;

        let Some(ch) = self.peek_char() else {
            return Ok((Token::Eof, start));
        };

        let punct = match ch {
            '(' => Some(Token::OpenParen),
            ')' => Some(Token::CloseParen),
            '[' => Some(Token::OpenBracket),
            ']' => Some(Token::CloseBracket),
            _ => None,
        };
        if let Some(token) = punct {
            self.pos += 1;
            return Ok((token, start));
        }

        if ch == '"' {
            return self.quoted_string(start).map(|t| (t, start));
        }

        if ch.is_ascii_digit() || ch == '-' {
            return self.number(start).map(|t| (t, start));
        }

        while let Some(c) = self.peek_char() {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-' | ':' | '$') {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }

        if self.pos == start {
            return Err(FilterError::syntax(
                format!("unexpected character '{ch}'"),
                start,
            ));
        }

        let word = &self.input[start..self.pos];
        let token = match word.to_ascii_lowercase().as_str() {
            "and" => Token::And,
            "or" => Token::Or,
            "not" => Token::Not,
            "pr" => Token::Present,
            "true" => Token::True,
            "false" => Token::False,
            "null" => Token::Null,
            _ => match CompareOp::from_str(word) {
                Some(op) => Token::Operator(op),
                None => Token::Identifier(word.to_string()),
            },
        };
        Ok((token, start))
    }

    /// JSON string literal, unescaped with serde_json.
    fn quoted_string(&mut self, start: usize) -> Result<Token, FilterError> {
        let bytes = self.input.as_bytes();
        let mut i = start + 1;
        while i < bytes.len() {
            match bytes[i] {
                b'\\' => i += 2,
                b'"' => {
                    let literal = &self.input[start..=i];
                    self.pos = i + 1;
                    return serde_json::from_str::<String>(literal)
                        .map(Token::QuotedString)
                        .map_err(|e| FilterError::syntax(format!("invalid string: {e}"), start));
                }
                _ => i += 1,
            }
        }
        Err(FilterError::syntax("unterminated quoted string", start))
    }

    fn number(&mut self, start: usize) -> Result<Token, FilterError> {
        while let Some(c) = self.peek_char() {
            if c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E') {
                self.pos += 1;
            } else {
                break;
            }
        }
        let literal = &self.input[start..self.pos];
        serde_json::from_str::<Number>(literal)
            .map(Token::Number)
            .map_err(|_| FilterError::syntax(format!("invalid number '{literal}'"), start))
    }
}

/// Deepest group nesting accepted before parsing is refused.
const MAX_NESTING: usize = 64;

/// Parser for filter expressions.
struct Parser<'a> {
    tokenizer: Tokenizer<'a>,
    current: Token,
    current_pos: usize,
    in_value_path: bool,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self, FilterError> {
        let mut tokenizer = Tokenizer::new(input);
        let (current, current_pos) = tokenizer.next_token()?;
        Ok(Self {
            tokenizer,
            current,
            current_pos,
            in_value_path: false,
            depth: 0,
        })
    }

    fn advance(&mut self) -> Result<(), FilterError> {
        let (token, pos) = self.tokenizer.next_token()?;
        self.current = token;
        self.current_pos = pos;
        Ok(())
    }

    fn error(&self, message: impl Into<String>) -> FilterError {
        FilterError::syntax(message, self.current_pos)
    }

    fn expect(&mut self, token: Token, what: &str) -> Result<(), FilterError> {
        if self.current != token {
            return Err(self.error(format!("expected {what}")));
        }
        self.advance()
    }

    /// Parse a full filter expression.
    ///
    /// Every parenthesized group and value filter re-enters here, so the
    /// depth counter bounds recursion.
    fn parse(&mut self) -> Result<FilterExpression, FilterError> {
        if self.depth >= MAX_NESTING {
            return Err(self.error("filter nested too deeply"));
        }
        self.depth += 1;
        let expr = self.parse_or();
        self.depth -= 1;
        expr
    }

    /// Parse OR expressions (lowest precedence).
    fn parse_or(&mut self) -> Result<FilterExpression, FilterError> {
        let mut left = self.parse_and()?;

        while self.current == Token::Or {
            self.advance()?;
            let right = self.parse_and()?;
            left = FilterExpression::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Parse AND expressions.
    fn parse_and(&mut self) -> Result<FilterExpression, FilterError> {
        let mut left = self.parse_not()?;

        while self.current == Token::And {
            self.advance()?;
            let right = self.parse_not()?;
            left = FilterExpression::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    /// Parse NOT expressions; `not` must be followed by a parenthesized group.
    fn parse_not(&mut self) -> Result<FilterExpression, FilterError> {
        if self.current == Token::Not {
            self.advance()?;
            if self.current != Token::OpenParen {
                return Err(self.error("expected '(' after 'not'"));
            }
            let expr = self.parse_primary()?;
            return Ok(FilterExpression::Not(Box::new(expr)));
        }
        self.parse_primary()
    }

    /// Parse primary expressions (attribute expressions, value paths and
    /// parenthesized groups).
    fn parse_primary(&mut self) -> Result<FilterExpression, FilterError> {
        if self.current == Token::OpenParen {
            self.advance()?;
            let expr = self.parse()?;
            self.expect(Token::CloseParen, "')'")?;
            return Ok(expr);
        }

        let path_pos = self.current_pos;
        let path = match &self.current {
            Token::Identifier(s) => parse_attr_path(s).map_err(|e| match e {
                FilterError::Syntax { message, position } => {
                    FilterError::syntax(message, path_pos + position)
                }
                other => other,
            })?,
            _ => return Err(self.error("expected attribute path")),
        };
        self.advance()?;

        match self.current.clone() {
            Token::OpenBracket => {
                if self.in_value_path {
                    return Err(self.error("value filters cannot be nested"));
                }
                self.advance()?;
                self.in_value_path = true;
                let filter = self.parse()?;
                self.in_value_path = false;
                self.expect(Token::CloseBracket, "']'")?;
                Ok(FilterExpression::ValuePath {
                    path,
                    filter: Box::new(filter),
                })
            }
            Token::Present => {
                self.advance()?;
                Ok(FilterExpression::Present(path))
            }
            Token::Operator(op) => {
                self.advance()?;
                let value = match &self.current {
                    Token::QuotedString(s) => CompareValue::String(s.clone()),
                    Token::Number(n) => CompareValue::Number(n.clone()),
                    Token::True => CompareValue::Bool(true),
                    Token::False => CompareValue::Bool(false),
                    Token::Null => CompareValue::Null,
                    _ => return Err(self.error("expected comparison value")),
                };
                self.advance()?;
                Ok(FilterExpression::Comparison { path, op, value })
            }
            _ => Err(self.error("expected comparison operator, 'pr' or '['")),
        }
    }
}

/// Parse a filter expression string.
pub fn parse_filter(input: &str) -> Result<FilterExpression, FilterError> {
    let mut parser = Parser::new(input)?;
    let expr = parser.parse()?;

    if parser.current != Token::Eof {
        return Err(parser.error("unexpected tokens after filter expression"));
    }

    Ok(expr)
}
