//! The token definition for the filter language.

use std::borrow::Cow;
use std::fmt;

/// A token is a single unit of the language, with a specific kind and location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'a> {
    pub kind: TokenKind<'a>,
    pub span: Span,
}

/// The kind of a token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind<'a> {
    // Keywords
    And,      // "and"
    Or,       // "or"
    Not,      // "not"
    In,       // "in"
    NotIn,    // "!in"
    Like,     // "like"
    NotLike,  // "!like"
    ILike,    // "ilike"
    NotILike, // "!ilike"
    True,     // "true"
    False,    // "false"
    Null,     // "null"

    // Literals
    Identifier(&'a str),
    /// The unescaped string content, without quotes.
    QuotedString(Cow<'a, str>),
    /// The raw number text, validated by the lexer.
    Number(&'a str),

    // Punctuation
    LParen,   // (
    RParen,   // )
    LBracket, // [
    RBracket, // ]
    Comma,    // ,
    Dot,      // .
    Bang,     // ! (prefix negation)

    // Operators
    Eq,    // =
    NotEq, // !=
    Gt,    // >
    Lt,    // <
    Gte,   // >=
    Lte,   // <=
}

impl fmt::Display for TokenKind<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::And => f.write_str("'and'"),
            TokenKind::Or => f.write_str("'or'"),
            TokenKind::Not => f.write_str("'not'"),
            TokenKind::In => f.write_str("'in'"),
            TokenKind::NotIn => f.write_str("'!in'"),
            TokenKind::Like => f.write_str("'like'"),
            TokenKind::NotLike => f.write_str("'!like'"),
            TokenKind::ILike => f.write_str("'ilike'"),
            TokenKind::NotILike => f.write_str("'!ilike'"),
            TokenKind::True => f.write_str("'true'"),
            TokenKind::False => f.write_str("'false'"),
            TokenKind::Null => f.write_str("'null'"),
            TokenKind::Identifier(name) => write!(f, "identifier '{}'", name),
            TokenKind::QuotedString(s) => write!(f, "string \"{}\"", s),
            TokenKind::Number(n) => write!(f, "number {}", n),
            TokenKind::LParen => f.write_str("'('"),
            TokenKind::RParen => f.write_str("')'"),
            TokenKind::LBracket => f.write_str("'['"),
            TokenKind::RBracket => f.write_str("']'"),
            TokenKind::Comma => f.write_str("','"),
            TokenKind::Dot => f.write_str("'.'"),
            TokenKind::Bang => f.write_str("'!'"),
            TokenKind::Eq => f.write_str("'='"),
            TokenKind::NotEq => f.write_str("'!='"),
            TokenKind::Gt => f.write_str("'>'"),
            TokenKind::Lt => f.write_str("'<'"),
            TokenKind::Gte => f.write_str("'>='"),
            TokenKind::Lte => f.write_str("'<='"),
        }
    }
}

/// Represents a span in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// The starting byte offset.
    pub start: usize,
    /// The ending byte offset.
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// A zero-width span, used for errors reported at the end of input.
    pub fn at(offset: usize) -> Self {
        Self { start: offset, end: offset }
    }
}
