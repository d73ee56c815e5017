//! Error types for parsing and translating filter expressions.

use thiserror::Error;

use crate::ast::ComparisonOp;
use crate::token::Span;

/// Malformed filter text, reported by the lexer or the parser.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message} at offset {}", span.start)]
pub struct SyntaxError {
    pub message: String,
    pub span: Span,
}

impl SyntaxError {
    pub fn new(message: impl Into<String>, span: Span) -> Self {
        Self {
            message: message.into(),
            span,
        }
    }

    /// The byte offset of the offending input.
    pub fn offset(&self) -> usize {
        self.span.start
    }
}

/// Well-formed text that does not describe a legal comparison.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SemanticError {
    /// The left side of a comparison is not a field reference.
    #[error("left side of '{op}' must be a field, found {kind} at offset {}", span.start)]
    InvalidComparisonLeft {
        kind: &'static str,
        op: ComparisonOp,
        span: Span,
    },

    /// An array outside the right side of `in`/`!in`.
    #[error("array operand is only allowed with 'in' or '!in', found '{op}' at offset {}", span.start)]
    MisplacedArray { op: ComparisonOp, span: Span },
}

/// Any failure of [`crate::parse`]. Parsing never yields a partial tree.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("semantic error: {0}")]
    Semantic(#[from] SemanticError),
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::Syntax(e) => e.span,
            ParseError::Semantic(SemanticError::InvalidComparisonLeft { span, .. })
            | ParseError::Semantic(SemanticError::MisplacedArray { span, .. }) => *span,
        }
    }
}

/// A failure while folding an expression into a backend's native query.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TranslationError {
    /// The operator has no mapping in this backend.
    #[error("operator '{op}' is not supported by the {backend} backend")]
    UnsupportedOperator {
        backend: &'static str,
        op: ComparisonOp,
    },

    /// An operand the backend cannot use in this position.
    #[error("invalid operand: {message}")]
    InvalidOperand { message: String },

    /// An expression kind the translator has no rule for.
    #[error("cannot translate {kind} expression as a predicate")]
    UnimplementedExpressionKind { kind: &'static str },
}

impl TranslationError {
    pub fn unsupported(backend: &'static str, op: ComparisonOp) -> Self {
        TranslationError::UnsupportedOperator { backend, op }
    }

    pub fn invalid_operand(message: impl Into<String>) -> Self {
        TranslationError::InvalidOperand {
            message: message.into(),
        }
    }
}

pub type ParseResult<T> = Result<T, ParseError>;
pub type TranslationResult<T> = Result<T, TranslationError>;
