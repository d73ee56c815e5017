//! Relational backend: folds an expression into a boolean [`SqlNode`] tree and
//! lowers that tree into sea-query expressions.

use sea_query::extension::postgres::PgExpr;
use sea_query::{
    Alias, Asterisk, Expr, Iden, PostgresQueryBuilder, Query, SimpleExpr, Value,
};

use super::{NegationStrategy, Translator};
use crate::ast::{ComparisonOp, DateValue, Expression, Identifier, Literal, LogicalOp, Number};
use crate::config::FilterConfig;
use crate::error::{TranslationError, TranslationResult};

const BACKEND: &str = "relational";

/// Column identifier wrapper
#[derive(Debug, Clone)]
pub struct ColumnName(pub String);

impl Iden for ColumnName {
    fn unquoted(&self, s: &mut dyn std::fmt::Write) {
        let _ = s.write_str(&self.0);
    }
}

/// The right side of a relational comparison.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlOperand {
    Column(String),
    Value(Value),
    List(Vec<SqlOperand>),
}

/// Boolean combinator tree, one node per SQL predicate form.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlNode {
    And(Vec<SqlNode>),
    Or(Vec<SqlNode>),
    Not(Box<SqlNode>),
    Eq(String, SqlOperand),
    Ne(String, SqlOperand),
    Gt(String, SqlOperand),
    Gte(String, SqlOperand),
    Lt(String, SqlOperand),
    Lte(String, SqlOperand),
    In(String, Vec<SqlOperand>),
    Nin(String, Vec<SqlOperand>),
    Like(String, String),
    ILike(String, String),
    NotLike(String, String),
    NotILike(String, String),
    IsNull(String),
    IsNotNull(String),
}

impl From<i64> for SqlOperand {
    fn from(value: i64) -> Self {
        SqlOperand::Value(value.into())
    }
}

impl From<f64> for SqlOperand {
    fn from(value: f64) -> Self {
        SqlOperand::Value(value.into())
    }
}

impl From<bool> for SqlOperand {
    fn from(value: bool) -> Self {
        SqlOperand::Value(value.into())
    }
}

impl From<&str> for SqlOperand {
    fn from(value: &str) -> Self {
        SqlOperand::Value(value.to_string().into())
    }
}

/// `address.city` becomes `"address"."city"`, anything else a single quoted identifier.
fn column(name: &str) -> Expr {
    match name.split_once('.') {
        Some((table, col)) if !col.contains('.') => {
            Expr::col((ColumnName(table.to_string()), ColumnName(col.to_string())))
        }
        _ => Expr::col(ColumnName(name.to_string())),
    }
}

impl SqlOperand {
    pub fn to_simple_expr(&self) -> SimpleExpr {
        match self {
            SqlOperand::Column(name) => column(name).into(),
            SqlOperand::Value(value) => SimpleExpr::Value(value.clone()),
            SqlOperand::List(items) => SimpleExpr::Tuple(items.iter().map(SqlOperand::to_simple_expr).collect()),
        }
    }
}

impl SqlNode {
    /// Lowers the tree into a sea-query expression usable in any statement's WHERE.
    pub fn to_simple_expr(&self) -> SimpleExpr {
        match self {
            SqlNode::And(items) => combine_exprs(items, SimpleExpr::and),
            SqlNode::Or(items) => combine_exprs(items, SimpleExpr::or),
            SqlNode::Not(inner) => inner.to_simple_expr().not(),
            SqlNode::Eq(col, v) => column(col).eq(v.to_simple_expr()),
            SqlNode::Ne(col, v) => column(col).ne(v.to_simple_expr()),
            SqlNode::Gt(col, v) => column(col).gt(v.to_simple_expr()),
            SqlNode::Gte(col, v) => column(col).gte(v.to_simple_expr()),
            SqlNode::Lt(col, v) => column(col).lt(v.to_simple_expr()),
            SqlNode::Lte(col, v) => column(col).lte(v.to_simple_expr()),
            SqlNode::In(col, values) => column(col).is_in(values.iter().map(SqlOperand::to_simple_expr)),
            SqlNode::Nin(col, values) => column(col).is_not_in(values.iter().map(SqlOperand::to_simple_expr)),
            SqlNode::Like(col, pattern) => column(col).like(pattern.as_str()),
            SqlNode::NotLike(col, pattern) => column(col).not_like(pattern.as_str()),
            SqlNode::ILike(col, pattern) => column(col).ilike(pattern.as_str()),
            SqlNode::NotILike(col, pattern) => column(col).not_ilike(pattern.as_str()),
            SqlNode::IsNull(col) => column(col).is_null(),
            SqlNode::IsNotNull(col) => column(col).is_not_null(),
        }
    }

    /// Renders `SELECT * FROM table WHERE ...` for Postgres.
    pub fn to_sql(&self, table: &str) -> String {
        Query::select()
            .column(Asterisk)
            .from(Alias::new(table))
            .and_where(self.to_simple_expr())
            .to_string(PostgresQueryBuilder)
    }
}

fn combine_exprs(items: &[SqlNode], join: fn(SimpleExpr, SimpleExpr) -> SimpleExpr) -> SimpleExpr {
    items
        .iter()
        .map(SqlNode::to_simple_expr)
        .reduce(join)
        .unwrap_or_else(|| Expr::val(true).into())
}

/// SQL compiler that converts filter expressions to [`SqlNode`] trees.
#[derive(Debug, Clone, Default)]
pub struct RelationalTranslator {
    config: FilterConfig,
}

impl RelationalTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FilterConfig) -> Self {
        Self { config }
    }

    fn scalar(&self, op: ComparisonOp, right: SqlOperand) -> TranslationResult<SqlOperand> {
        match right {
            SqlOperand::List(_) => Err(TranslationError::invalid_operand(format!(
                "list operand used with '{}'",
                op
            ))),
            other => Ok(other),
        }
    }

    fn list(&self, right: SqlOperand) -> Vec<SqlOperand> {
        match right {
            SqlOperand::List(items) => items,
            other => vec![other],
        }
    }

    /// LIKE patterns accept `*` as well as `%`.
    fn pattern(&self, op: ComparisonOp, right: SqlOperand) -> TranslationResult<String> {
        match right {
            SqlOperand::Value(Value::String(Some(pattern))) => Ok(pattern.replace('*', "%")),
            SqlOperand::Column(_) => Err(TranslationError::unsupported(BACKEND, op)),
            _ => Err(TranslationError::invalid_operand(format!(
                "'{}' needs a string pattern",
                op
            ))),
        }
    }

    /// An `or` of enough `=` comparisons on one column becomes one IN.
    fn rewrite_or_to_in(&self, items: &[SqlNode]) -> Option<SqlNode> {
        if items.len() < self.config.optimization.min_or_conditions_for_in.max(2) {
            return None;
        }
        let SqlNode::Eq(first_col, _) = &items[0] else {
            return None;
        };
        let mut values = Vec::with_capacity(items.len());
        for item in items {
            match item {
                SqlNode::Eq(col, value @ SqlOperand::Value(_)) if col == first_col => values.push(value.clone()),
                _ => return None,
            }
        }
        tracing::debug!(column = %first_col, values = values.len(), "rewrote OR of equalities into IN");
        Some(SqlNode::In(first_col.clone(), values))
    }
}

impl Translator for RelationalTranslator {
    type Output = SqlNode;
    type Operand = SqlOperand;

    fn negation_strategy(&self) -> NegationStrategy {
        NegationStrategy::Wrap
    }

    fn field_operand(&self, field: &Identifier) -> TranslationResult<SqlOperand> {
        Ok(SqlOperand::Column(self.config.field_name(field)))
    }

    fn literal_operand(&self, literal: &Literal) -> TranslationResult<SqlOperand> {
        let value: Value = match literal {
            Literal::String(s) => s.clone().into(),
            Literal::Number(Number::Int(n)) => (*n).into(),
            Literal::Number(Number::Float(n)) => (*n).into(),
            Literal::Boolean(b) => (*b).into(),
            Literal::Null => Value::String(None),
            Literal::Date { value: DateValue::Date(d), .. } => (*d).into(),
            Literal::Date { value: DateValue::DateTime(dt), .. } => (*dt).into(),
            Literal::Time { value, .. } => (*value).into(),
        };
        Ok(SqlOperand::Value(value))
    }

    fn list_operand(&self, items: Vec<SqlOperand>) -> TranslationResult<SqlOperand> {
        if items.iter().any(|item| matches!(item, SqlOperand::List(_))) {
            return Err(TranslationError::invalid_operand(
                "nested arrays are not supported by the relational backend",
            ));
        }
        Ok(SqlOperand::List(items))
    }

    fn combine(&self, op: LogicalOp, items: Vec<SqlNode>) -> SqlNode {
        match op {
            LogicalOp::And => SqlNode::And(items),
            LogicalOp::Or => self.rewrite_or_to_in(&items).unwrap_or(SqlNode::Or(items)),
        }
    }

    fn negate(&self, output: SqlNode) -> SqlNode {
        SqlNode::Not(Box::new(output))
    }

    fn exists(&self, field: &Identifier, exists: bool) -> TranslationResult<SqlNode> {
        let col = self.config.field_name(field);
        Ok(if exists {
            SqlNode::IsNotNull(col)
        } else {
            SqlNode::IsNull(col)
        })
    }

    fn compare(
        &self,
        field: &Identifier,
        op: ComparisonOp,
        right: SqlOperand,
        negative: bool,
    ) -> TranslationResult<SqlNode> {
        let col = self.config.field_name(field);
        let node = match op {
            ComparisonOp::Eq => SqlNode::Eq(col, self.scalar(op, right)?),
            ComparisonOp::NotEq => SqlNode::Ne(col, self.scalar(op, right)?),
            ComparisonOp::Gt => SqlNode::Gt(col, self.scalar(op, right)?),
            ComparisonOp::Gte => SqlNode::Gte(col, self.scalar(op, right)?),
            ComparisonOp::Lt => SqlNode::Lt(col, self.scalar(op, right)?),
            ComparisonOp::Lte => SqlNode::Lte(col, self.scalar(op, right)?),
            ComparisonOp::In => SqlNode::In(col, self.list(right)),
            ComparisonOp::NotIn => SqlNode::Nin(col, self.list(right)),
            ComparisonOp::Like => SqlNode::Like(col, self.pattern(op, right)?),
            ComparisonOp::NotLike => SqlNode::NotLike(col, self.pattern(op, right)?),
            ComparisonOp::ILike => SqlNode::ILike(col, self.pattern(op, right)?),
            ComparisonOp::NotILike => SqlNode::NotILike(col, self.pattern(op, right)?),
        };
        Ok(if negative { self.negate(node) } else { node })
    }
}

/// Translates with the default configuration.
pub fn translate_relational(expr: &Expression) -> TranslationResult<SqlNode> {
    RelationalTranslator::new().translate(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OptimizationConfig;
    use crate::parser::parse;
    use chrono::NaiveDate;
    use std::collections::HashMap;

    fn translate(input: &str) -> SqlNode {
        translate_relational(&parse(input).unwrap()).unwrap()
    }

    fn eq(col: &str, value: impl Into<SqlOperand>) -> SqlNode {
        SqlNode::Eq(col.to_string(), value.into())
    }

    #[test]
    fn test_or_chain() {
        assert_eq!(translate("page=1 or page=2"), SqlNode::Or(vec![eq("page", 1), eq("page", 2)]));
    }

    #[test]
    fn test_grouped_or_inside_and() {
        assert_eq!(
            translate(r#"(page=1 or page=2) and name="Demons""#),
            SqlNode::And(vec![
                SqlNode::Or(vec![eq("page", 1), eq("page", 2)]),
                eq("name", "Demons"),
            ])
        );
    }

    #[test]
    fn test_not_equal_maps_directly() {
        assert_eq!(
            translate(r#"name!="Demons""#),
            SqlNode::Ne("name".to_string(), "Demons".into())
        );
    }

    #[test]
    fn test_negation_wraps_in_not() {
        assert_eq!(
            translate("not page>=5"),
            SqlNode::Not(Box::new(SqlNode::Gte("page".to_string(), 5.into())))
        );
        assert_eq!(
            translate("not (a=1 and b=2)"),
            SqlNode::Not(Box::new(SqlNode::And(vec![eq("a", 1), eq("b", 2)])))
        );
        assert_eq!(
            translate("not a!=1"),
            SqlNode::Not(Box::new(SqlNode::Ne("a".to_string(), 1.into())))
        );
    }

    #[test]
    fn test_double_negation_cancels() {
        assert_eq!(translate("not not page=1"), translate("page=1"));
        assert_eq!(translate("not (not (a=1 or b=2))"), translate("a=1 or b=2"));
    }

    #[test]
    fn test_membership() {
        assert_eq!(
            translate("page !in [5,6]"),
            SqlNode::Nin("page".to_string(), vec![5.into(), 6.into()])
        );
        assert_eq!(translate("page in 5"), SqlNode::In("page".to_string(), vec![5.into()]));
    }

    #[test]
    fn test_null_checks() {
        assert_eq!(translate("deleted_at = null"), SqlNode::IsNull("deleted_at".to_string()));
        assert_eq!(translate("deleted_at != null"), SqlNode::IsNotNull("deleted_at".to_string()));
        assert_eq!(translate("not deleted_at = null"), SqlNode::IsNotNull("deleted_at".to_string()));
    }

    #[test]
    fn test_patterns() {
        assert_eq!(
            translate(r#"name like "De*""#),
            SqlNode::Like("name".to_string(), "De%".to_string())
        );
        assert_eq!(
            translate(r#"name !ilike "de%""#),
            SqlNode::NotILike("name".to_string(), "de%".to_string())
        );
    }

    #[test]
    fn test_pattern_against_column_is_unsupported() {
        let err = translate_relational(&parse("name like other").unwrap()).unwrap_err();
        assert_eq!(err, TranslationError::unsupported(BACKEND, ComparisonOp::Like));
    }

    #[test]
    fn test_field_to_field_comparison() {
        assert_eq!(
            translate("updated_at > created_at"),
            SqlNode::Gt("updated_at".to_string(), SqlOperand::Column("created_at".to_string()))
        );
    }

    #[test]
    fn test_date_literal_becomes_chrono_value() {
        let expected: Value = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap().into();
        assert_eq!(
            translate(r#"created >= "2024-01-31""#),
            SqlNode::Gte("created".to_string(), SqlOperand::Value(expected))
        );
    }

    #[test]
    fn test_date_shaped_pattern_stays_text() {
        assert_eq!(
            translate(r#"code like "2024-01-31""#),
            SqlNode::Like("code".to_string(), "2024-01-31".to_string())
        );
        assert_eq!(
            translate(r#"at !ilike "10:30:00""#),
            SqlNode::NotILike("at".to_string(), "10:30:00".to_string())
        );
    }

    #[test]
    fn test_nested_array_is_rejected() {
        let err = translate_relational(&parse("a in [[1]]").unwrap()).unwrap_err();
        assert!(matches!(err, TranslationError::InvalidOperand { .. }));
    }

    #[test]
    fn test_or_to_in_optimization() {
        let config = FilterConfig {
            optimization: OptimizationConfig { min_or_conditions_for_in: 3 },
            ..Default::default()
        };
        let translator = RelationalTranslator::with_config(config);

        let expr = parse(r#"status="Open" or status="Pending" or status="Review""#).unwrap();
        assert_eq!(
            translator.translate(&expr).unwrap(),
            SqlNode::In(
                "status".to_string(),
                vec!["Open".into(), "Pending".into(), "Review".into()]
            )
        );

        // mixed columns keep the OR
        let expr = parse(r#"status="Open" or status="Pending" or owner="me""#).unwrap();
        assert!(matches!(translator.translate(&expr).unwrap(), SqlNode::Or(_)));

        // below the threshold
        let expr = parse(r#"status="Open" or status="Pending""#).unwrap();
        assert!(matches!(translator.translate(&expr).unwrap(), SqlNode::Or(_)));
    }

    #[test]
    fn test_field_mapping() {
        let mut field_mapping = HashMap::new();
        field_mapping.insert("id".to_string(), "issue_id".to_string());
        let translator = RelationalTranslator::with_config(FilterConfig {
            field_mapping,
            ..Default::default()
        });
        let node = translator.translate(&parse("id = 7").unwrap()).unwrap();
        assert_eq!(node, eq("issue_id", 7));
    }

    #[test]
    fn test_sql_rendering() {
        let sql = translate(r#"name="Demons""#).to_sql("items");
        assert_eq!(sql, r#"SELECT * FROM "items" WHERE "name" = 'Demons'"#);

        let sql = translate(r#"(page=1 or page=2) and name ilike "de%""#).to_sql("items");
        assert!(sql.contains(r#""page" = 1"#));
        assert!(sql.contains(r#""page" = 2"#));
        assert!(sql.contains("ILIKE 'de%'"));

        let sql = translate("page !in [5,6] and deleted_at = null").to_sql("items");
        assert!(sql.contains("NOT IN (5, 6)"));
        assert!(sql.contains(r#""deleted_at" IS NULL"#));

        let sql = translate(r#"address.city = "Oslo""#).to_sql("items");
        assert!(sql.contains(r#""address"."city" = 'Oslo'"#));

        let sql = translate("not active = true").to_sql("items");
        assert!(sql.contains("NOT"));
    }

    #[test]
    fn test_translation_is_idempotent() {
        let expr = parse(r#"(a=1 or b in [1,2]) and not c like "x%""#).unwrap();
        let translator = RelationalTranslator::new();
        assert_eq!(translator.translate(&expr).unwrap(), translator.translate(&expr).unwrap());
    }
}
