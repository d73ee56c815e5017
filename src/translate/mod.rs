//! Folding an [`Expression`] into a backend's native query.
//!
//! Every backend implements [`Translator`]. The provided methods carry the
//! shared algorithm: a `negative` flag threaded through the recursion, flipped
//! by every `Negative` node, passed unchanged through `Parenthesized`. The
//! tree is never rewritten.
//!
//! A comparison operator written with `!` (`!=`, `!in`, `!like`, `!ilike`) has
//! negated polarity of its own. The effective polarity of a comparison is that
//! polarity XOR the threaded flag, so `not a != 1` means `a = 1` on every
//! backend, whichever way the backend expresses negation.

pub mod document;
pub mod relational;
pub mod search;

pub use document::{translate_document, DocumentTranslator};
pub use relational::{translate_relational, RelationalTranslator, SqlNode, SqlOperand};
pub use search::{translate_search, SearchTranslator};

use crate::ast::{ComparisonOp, Expression, Identifier, Literal, Logical, LogicalOp};
use crate::error::{TranslationError, TranslationResult};

/// How a backend expresses a negated `and`/`or` chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegationStrategy {
    /// Combine the unnegated items, then wrap the result in the native NOT.
    Wrap,
    /// Push the flag into the items and swap `and`/`or`.
    DeMorgan,
}

pub trait Translator {
    /// The native predicate.
    type Output;
    /// The native form of a field reference, a scalar or a list.
    type Operand;

    fn negation_strategy(&self) -> NegationStrategy;

    fn field_operand(&self, field: &Identifier) -> TranslationResult<Self::Operand>;

    fn literal_operand(&self, literal: &Literal) -> TranslationResult<Self::Operand>;

    fn list_operand(&self, items: Vec<Self::Operand>) -> TranslationResult<Self::Operand>;

    /// Joins at least two translated items with the native AND/OR.
    fn combine(&self, op: LogicalOp, items: Vec<Self::Output>) -> Self::Output;

    /// The native NOT.
    fn negate(&self, output: Self::Output) -> Self::Output;

    /// `field = null` (`exists == false`) or `field != null` (`exists == true`),
    /// negation already applied.
    fn exists(&self, field: &Identifier, exists: bool) -> TranslationResult<Self::Output>;

    /// A comparison with an identifier on the left and a non-null right side.
    /// Membership operators always receive a list operand.
    fn compare(
        &self,
        field: &Identifier,
        op: ComparisonOp,
        right: Self::Operand,
        negative: bool,
    ) -> TranslationResult<Self::Output>;

    fn translate(&self, expr: &Expression) -> TranslationResult<Self::Output> {
        self.translate_with(expr, false)
    }

    fn translate_with(&self, expr: &Expression, negative: bool) -> TranslationResult<Self::Output> {
        match expr {
            Expression::Negative(inner) => self.translate_with(inner, !negative),
            Expression::Parenthesized(inner) => self.translate_with(inner, negative),
            Expression::Logical(logical) => self.translate_logical(logical, negative),
            Expression::Comparison(c) => self.translate_comparison(&c.left, c.op, &c.right, negative),
            Expression::Identifier(_) | Expression::Literal(_) | Expression::Array(_) => {
                Err(TranslationError::UnimplementedExpressionKind { kind: expr.kind() })
            }
        }
    }

    fn translate_logical(&self, logical: &Logical, negative: bool) -> TranslationResult<Self::Output> {
        if logical.items.len() < 2 {
            return Err(TranslationError::invalid_operand(format!(
                "'{}' chain needs at least two items, found {}",
                logical.op,
                logical.items.len()
            )));
        }

        let (op, item_negative, wrap) = match (self.negation_strategy(), negative) {
            (_, false) => (logical.op, false, false),
            (NegationStrategy::Wrap, true) => (logical.op, false, true),
            (NegationStrategy::DeMorgan, true) => (logical.op.dual(), true, false),
        };

        let items = logical
            .items
            .iter()
            .map(|item| self.translate_with(item, item_negative))
            .collect::<TranslationResult<Vec<_>>>()?;

        let combined = self.combine(op, items);
        Ok(if wrap { self.negate(combined) } else { combined })
    }

    fn translate_comparison(
        &self,
        left: &Expression,
        op: ComparisonOp,
        right: &Expression,
        negative: bool,
    ) -> TranslationResult<Self::Output> {
        let field = comparison_field(left)?;

        if let Expression::Literal(Literal::Null) = right {
            return match op {
                ComparisonOp::Eq | ComparisonOp::NotEq => {
                    self.exists(&field, (op == ComparisonOp::NotEq) != negative)
                }
                other => Err(TranslationError::invalid_operand(format!(
                    "null can only be compared with '=' or '!=', found '{}'",
                    other
                ))),
            };
        }

        let right = match right {
            Expression::Array(_) if !op.is_membership() => {
                return Err(TranslationError::invalid_operand(format!(
                    "array operand used with '{}'",
                    op
                )));
            }
            Expression::Array(_) => self.operand(right)?,
            // a pattern that happens to look like a date is still a pattern
            Expression::Literal(Literal::Date { raw, .. } | Literal::Time { raw, .. }) if op.is_pattern() => {
                self.literal_operand(&Literal::String(raw.clone()))?
            }
            // a single value on the right of in/!in is a one-element set
            scalar if op.is_membership() => self.list_operand(vec![self.operand(scalar)?])?,
            scalar => self.operand(scalar)?,
        };

        self.compare(&field, op, right, negative)
    }

    /// Identifiers, literals and arrays; arrays are translated element-wise in order.
    fn operand(&self, expr: &Expression) -> TranslationResult<Self::Operand> {
        match expr {
            Expression::Identifier(id) => self.field_operand(id),
            Expression::Literal(literal) => self.literal_operand(literal),
            Expression::Array(items) => {
                let items = items
                    .iter()
                    .map(|item| self.operand(item))
                    .collect::<TranslationResult<Vec<_>>>()?;
                self.list_operand(items)
            }
            other => Err(TranslationError::invalid_operand(format!(
                "{} cannot be used as an operand",
                other.kind()
            ))),
        }
    }
}

/// The left side of a comparison: an identifier, or a string literal naming a raw field.
fn comparison_field(left: &Expression) -> TranslationResult<Identifier> {
    match left {
        Expression::Identifier(id) => Ok(id.clone()),
        Expression::Literal(Literal::String(name)) => Ok(Identifier(vec![name.clone()])),
        other => Err(TranslationError::invalid_operand(format!(
            "left side of a comparison must be a field, found {}",
            other.kind()
        ))),
    }
}
