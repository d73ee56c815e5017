//! The expression tree produced by the parser and consumed by every translator.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// A complete filter, or any node inside one.
///
/// The set of variants is closed: a translator that matches on it exhaustively
/// is checked by the compiler whenever a variant is added.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// A field reference, possibly dotted (`address.city`).
    Identifier(Identifier),
    Literal(Literal),
    /// A bracketed list, only legal on the right of `in`/`!in` or nested in another array.
    Array(Vec<Expression>),
    /// Deferred negation of one operand. `not not x` keeps both nodes.
    Negative(Box<Expression>),
    Logical(Logical),
    /// Explicit grouping, kept so translators can see it.
    Parenthesized(Box<Expression>),
    Comparison(Comparison),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(pub Vec<String>);

impl Identifier {
    /// Builds an identifier from dotted text, e.g. `"address.city"`.
    pub fn from_dotted(path: &str) -> Self {
        Identifier(path.split('.').map(str::to_string).collect())
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// The path joined with dots.
    pub fn dotted(&self) -> String {
        self.0.join(".")
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.dotted())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Number(Number),
    Boolean(bool),
    Null,
    /// A quoted `YYYY-MM-DD[THH:MM:SS[.fff]]`.
    Date { raw: String, value: DateValue },
    /// A quoted `HH:MM:SS[.fff]`.
    Time { raw: String, value: NaiveTime },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateValue {
    Date(NaiveDate),
    DateTime(NaiveDateTime),
}

/// `and` / `or` chain, flattened: `a and b and c` is one node with three items.
#[derive(Debug, Clone, PartialEq)]
pub struct Logical {
    pub op: LogicalOp,
    /// Always at least two items.
    pub items: Vec<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
}

impl LogicalOp {
    /// The De Morgan dual: `and` ↔ `or`.
    pub fn dual(self) -> Self {
        match self {
            LogicalOp::And => LogicalOp::Or,
            LogicalOp::Or => LogicalOp::And,
        }
    }
}

/// The atomic predicate `left op right`.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    /// An [`Expression::Identifier`], or a string literal naming a raw field.
    pub left: Box<Expression>,
    pub op: ComparisonOp,
    pub right: Box<Expression>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,       // =
    NotEq,    // !=
    Gt,       // >
    Gte,      // >=
    Lt,       // <
    Lte,      // <=
    In,       // in
    NotIn,    // !in
    Like,     // like
    NotLike,  // !like
    ILike,    // ilike
    NotILike, // !ilike
}

impl ComparisonOp {
    /// The operator that holds exactly when this one does not.
    pub fn inverse(self) -> Self {
        match self {
            ComparisonOp::Eq => ComparisonOp::NotEq,
            ComparisonOp::NotEq => ComparisonOp::Eq,
            ComparisonOp::Gt => ComparisonOp::Lte,
            ComparisonOp::Lte => ComparisonOp::Gt,
            ComparisonOp::Gte => ComparisonOp::Lt,
            ComparisonOp::Lt => ComparisonOp::Gte,
            ComparisonOp::In => ComparisonOp::NotIn,
            ComparisonOp::NotIn => ComparisonOp::In,
            ComparisonOp::Like => ComparisonOp::NotLike,
            ComparisonOp::NotLike => ComparisonOp::Like,
            ComparisonOp::ILike => ComparisonOp::NotILike,
            ComparisonOp::NotILike => ComparisonOp::ILike,
        }
    }

    /// Applies the threaded negation flag: the operator itself when `negative`
    /// is false, its inverse otherwise.
    pub fn with_negation(self, negative: bool) -> Self {
        if negative {
            self.inverse()
        } else {
            self
        }
    }

    /// `!=`, `!in`, `!like` and `!ilike`.
    pub fn is_negated(self) -> bool {
        matches!(
            self,
            ComparisonOp::NotEq | ComparisonOp::NotIn | ComparisonOp::NotLike | ComparisonOp::NotILike
        )
    }

    pub fn is_membership(self) -> bool {
        matches!(self, ComparisonOp::In | ComparisonOp::NotIn)
    }

    pub fn is_pattern(self) -> bool {
        matches!(
            self,
            ComparisonOp::Like | ComparisonOp::NotLike | ComparisonOp::ILike | ComparisonOp::NotILike
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ComparisonOp::Eq => "=",
            ComparisonOp::NotEq => "!=",
            ComparisonOp::Gt => ">",
            ComparisonOp::Gte => ">=",
            ComparisonOp::Lt => "<",
            ComparisonOp::Lte => "<=",
            ComparisonOp::In => "in",
            ComparisonOp::NotIn => "!in",
            ComparisonOp::Like => "like",
            ComparisonOp::NotLike => "!like",
            ComparisonOp::ILike => "ilike",
            ComparisonOp::NotILike => "!ilike",
        }
    }
}

impl Expression {
    pub fn identifier(path: &str) -> Self {
        Expression::Identifier(Identifier::from_dotted(path))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Expression::Literal(Literal::String(value.into()))
    }

    pub fn int(value: i64) -> Self {
        Expression::Literal(Literal::Number(Number::Int(value)))
    }

    pub fn boolean(value: bool) -> Self {
        Expression::Literal(Literal::Boolean(value))
    }

    pub fn null() -> Self {
        Expression::Literal(Literal::Null)
    }

    pub fn negative(operand: Expression) -> Self {
        Expression::Negative(Box::new(operand))
    }

    pub fn parenthesized(inner: Expression) -> Self {
        Expression::Parenthesized(Box::new(inner))
    }

    pub fn comparison(left: Expression, op: ComparisonOp, right: Expression) -> Self {
        Expression::Comparison(Comparison {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    /// Joins `first` and `rest` with `op`.
    ///
    /// Returns `first` unchanged when `rest` is empty, and splices in the items
    /// of any operand that is already a chain of the same operator. Grouped
    /// operands are left alone.
    pub fn logical(op: LogicalOp, first: Expression, rest: Vec<Expression>) -> Self {
        if rest.is_empty() {
            return first;
        }
        let mut items = Vec::with_capacity(rest.len() + 1);
        for item in std::iter::once(first).chain(rest) {
            match item {
                Expression::Logical(inner) if inner.op == op => items.extend(inner.items),
                other => items.push(other),
            }
        }
        Expression::Logical(Logical { op, items })
    }

    /// A short name of the node kind, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Expression::Identifier(_) => "identifier",
            Expression::Literal(literal) => literal.kind(),
            Expression::Array(_) => "array",
            Expression::Negative(_) => "negation",
            Expression::Logical(_) => "logical",
            Expression::Parenthesized(_) => "parenthesized",
            Expression::Comparison(_) => "comparison",
        }
    }

    /// Total number of nodes in the tree.
    pub fn node_count(&self) -> usize {
        1 + match self {
            Expression::Identifier(_) | Expression::Literal(_) => 0,
            Expression::Array(items) => items.iter().map(Expression::node_count).sum(),
            Expression::Logical(logical) => logical.items.iter().map(Expression::node_count).sum(),
            Expression::Negative(inner) | Expression::Parenthesized(inner) => inner.node_count(),
            Expression::Comparison(c) => c.left.node_count() + c.right.node_count(),
        }
    }
}

impl Literal {
    pub fn kind(&self) -> &'static str {
        match self {
            Literal::String(_) => "string literal",
            Literal::Number(_) => "number literal",
            Literal::Boolean(_) => "boolean literal",
            Literal::Null => "null literal",
            Literal::Date { .. } => "date literal",
            Literal::Time { .. } => "time literal",
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Identifier(id) => write!(f, "{}", id),
            Expression::Literal(literal) => write!(f, "{}", literal),
            Expression::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Expression::Negative(inner) => match inner.as_ref() {
                Expression::Logical(_) => write!(f, "not ({})", inner),
                _ => write!(f, "not {}", inner),
            },
            Expression::Logical(logical) => {
                let sep = match logical.op {
                    LogicalOp::And => " and ",
                    LogicalOp::Or => " or ",
                };
                for (i, item) in logical.items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(sep)?;
                    }
                    // 手工构造的嵌套链没有括号节点
                    match item {
                        Expression::Logical(_) => write!(f, "({})", item)?,
                        _ => write!(f, "{}", item)?,
                    }
                }
                Ok(())
            }
            Expression::Parenthesized(inner) => write!(f, "({})", inner),
            Expression::Comparison(c) => write!(f, "{} {} {}", c.left, c.op, c.right),
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::String(s) => {
                f.write_str("\"")?;
                for c in s.chars() {
                    match c {
                        '"' => f.write_str("\\\"")?,
                        '\\' => f.write_str("\\\\")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                f.write_str("\"")
            }
            Literal::Number(n) => write!(f, "{}", n),
            Literal::Boolean(b) => write!(f, "{}", b),
            Literal::Null => f.write_str("null"),
            Literal::Date { raw, .. } | Literal::Time { raw, .. } => write!(f, "\"{}\"", raw),
        }
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(n) => write!(f, "{}", n),
            // `{}` never uses exponent notation; keep a `.0` so it lexes back as a float
            Number::Float(n) if n.fract() == 0.0 => write!(f, "{}.0", n),
            Number::Float(n) => write!(f, "{}", n),
        }
    }
}

impl fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for LogicalOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicalOp::And => f.write_str("and"),
            LogicalOp::Or => f.write_str("or"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eq(field: &str, value: i64) -> Expression {
        Expression::comparison(Expression::identifier(field), ComparisonOp::Eq, Expression::int(value))
    }

    #[test]
    fn test_logical_single_item_collapses() {
        let expr = Expression::logical(LogicalOp::And, eq("a", 1), vec![]);
        assert_eq!(expr, eq("a", 1));
    }

    #[test]
    fn test_logical_flattens_same_operator() {
        let inner = Expression::logical(LogicalOp::And, eq("b", 2), vec![eq("c", 3)]);
        let expr = Expression::logical(LogicalOp::And, eq("a", 1), vec![inner]);
        match expr {
            Expression::Logical(logical) => {
                assert_eq!(logical.op, LogicalOp::And);
                assert_eq!(logical.items, vec![eq("a", 1), eq("b", 2), eq("c", 3)]);
            }
            other => panic!("Expected logical node, got {:?}", other),
        }
    }

    #[test]
    fn test_logical_keeps_other_operator_and_groups() {
        let or = Expression::logical(LogicalOp::Or, eq("b", 2), vec![eq("c", 3)]);
        let grouped = Expression::parenthesized(Expression::logical(LogicalOp::And, eq("d", 4), vec![eq("e", 5)]));
        let expr = Expression::logical(LogicalOp::And, eq("a", 1), vec![or.clone(), grouped.clone()]);
        if let Expression::Logical(logical) = expr {
            assert_eq!(logical.items, vec![eq("a", 1), or, grouped]);
        } else {
            panic!("Expected logical node");
        }
    }

    #[test]
    fn test_inverse_is_involution() {
        let ops = [
            ComparisonOp::Eq,
            ComparisonOp::NotEq,
            ComparisonOp::Gt,
            ComparisonOp::Gte,
            ComparisonOp::Lt,
            ComparisonOp::Lte,
            ComparisonOp::In,
            ComparisonOp::NotIn,
            ComparisonOp::Like,
            ComparisonOp::NotLike,
            ComparisonOp::ILike,
            ComparisonOp::NotILike,
        ];
        for op in ops {
            assert_eq!(op.inverse().inverse(), op);
            assert_ne!(op.inverse(), op);
        }
        assert!(ComparisonOp::Like.inverse().is_negated());
        assert_eq!(ComparisonOp::Gt.inverse(), ComparisonOp::Lte);
        assert_eq!(ComparisonOp::Gte.with_negation(true), ComparisonOp::Lt);
        assert_eq!(ComparisonOp::Gte.with_negation(false), ComparisonOp::Gte);
    }

    #[test]
    fn test_display() {
        let expr = Expression::logical(
            LogicalOp::And,
            Expression::parenthesized(Expression::logical(LogicalOp::Or, eq("page", 1), vec![eq("page", 2)])),
            vec![Expression::negative(Expression::comparison(
                Expression::identifier("address.city"),
                ComparisonOp::NotIn,
                Expression::Array(vec![Expression::string("a\"b"), Expression::null()]),
            ))],
        );
        assert_eq!(
            expr.to_string(),
            r#"(page = 1 or page = 2) and not address.city !in ["a\"b", null]"#
        );
    }

    #[test]
    fn test_float_display_has_no_exponent() {
        assert_eq!(Number::Float(1e20).to_string(), "100000000000000000000.0");
        assert_eq!(Number::Float(-2.5).to_string(), "-2.5");
        assert_eq!(Number::Float(3.0).to_string(), "3.0");
        assert_eq!(Number::Float(1e-7).to_string(), "0.0000001");
    }

    #[test]
    fn test_node_count_and_kind() {
        let expr = Expression::negative(eq("a", 1));
        assert_eq!(expr.node_count(), 4);
        assert_eq!(expr.kind(), "negation");
        assert_eq!(Expression::int(1).kind(), "number literal");
        assert_eq!(Identifier::from_dotted("address.city").segments().len(), 2);
    }
}
