//! Search-engine backend: builds an Elasticsearch-style query container.

use serde_json::{json, Map, Value};

use super::{NegationStrategy, Translator};
use crate::ast::{ComparisonOp, Expression, Identifier, Literal, LogicalOp, Number};
use crate::config::FilterConfig;
use crate::error::{TranslationError, TranslationResult};

#[derive(Debug, Clone, Default)]
pub struct SearchTranslator {
    config: FilterConfig,
}

impl SearchTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FilterConfig) -> Self {
        Self { config }
    }
}

/// `{ kind: { field: body } }`
fn clause(kind: &str, field: String, body: Value) -> Value {
    let mut inner = Map::new();
    inner.insert(field, body);
    let mut outer = Map::new();
    outer.insert(kind.to_string(), Value::Object(inner));
    Value::Object(outer)
}

/// SQL wildcards to search-engine glob: `%` → `*`, `_` → `?`.
/// A literal `?` or backslash is escaped so it only matches itself.
fn like_to_glob(pattern: &str) -> String {
    let mut glob = String::with_capacity(pattern.len());
    for c in pattern.chars() {
        match c {
            '?' | '\\' => {
                glob.push('\\');
                glob.push(c);
            }
            '%' => glob.push('*'),
            '_' => glob.push('?'),
            other => glob.push(other),
        }
    }
    glob
}

impl Translator for SearchTranslator {
    type Output = Value;
    type Operand = Value;

    fn negation_strategy(&self) -> NegationStrategy {
        NegationStrategy::DeMorgan
    }

    fn field_operand(&self, field: &Identifier) -> TranslationResult<Value> {
        Err(TranslationError::invalid_operand(format!(
            "field '{}' cannot be used as a value in search queries",
            field
        )))
    }

    fn literal_operand(&self, literal: &Literal) -> TranslationResult<Value> {
        Ok(match literal {
            Literal::String(s) => json!(s),
            Literal::Number(Number::Int(n)) => json!(n),
            Literal::Number(Number::Float(n)) => json!(n),
            Literal::Boolean(b) => json!(b),
            Literal::Null => Value::Null,
            Literal::Date { raw, .. } | Literal::Time { raw, .. } => json!(raw),
        })
    }

    fn list_operand(&self, items: Vec<Value>) -> TranslationResult<Value> {
        Ok(Value::Array(items))
    }

    fn combine(&self, op: LogicalOp, items: Vec<Value>) -> Value {
        match op {
            LogicalOp::And => json!({ "bool": { "must": items } }),
            LogicalOp::Or => json!({ "bool": { "should": items } }),
        }
    }

    fn negate(&self, output: Value) -> Value {
        json!({ "bool": { "must_not": [output] } })
    }

    fn exists(&self, field: &Identifier, exists: bool) -> TranslationResult<Value> {
        let check = json!({ "exists": { "field": self.config.field_name(field) } });
        Ok(if exists { check } else { self.negate(check) })
    }

    fn compare(
        &self,
        field: &Identifier,
        op: ComparisonOp,
        right: Value,
        negative: bool,
    ) -> TranslationResult<Value> {
        let name = self.config.field_name(field);
        // build the positive clause, then apply the combined polarity
        let base = if op.is_negated() { op.inverse() } else { op };
        let negated = op.is_negated() != negative;

        let query = match base {
            ComparisonOp::Eq => clause("term", name, right),
            ComparisonOp::In => clause("terms", name, right),
            ComparisonOp::Gt => clause("range", name, json!({ "gt": right })),
            ComparisonOp::Gte => clause("range", name, json!({ "gte": right })),
            ComparisonOp::Lt => clause("range", name, json!({ "lt": right })),
            ComparisonOp::Lte => clause("range", name, json!({ "lte": right })),
            ComparisonOp::Like | ComparisonOp::ILike => {
                let Value::String(pattern) = right else {
                    return Err(TranslationError::invalid_operand(format!(
                        "'{}' needs a string pattern",
                        op
                    )));
                };
                let mut body = Map::new();
                body.insert("value".to_string(), Value::String(like_to_glob(&pattern)));
                if base == ComparisonOp::ILike {
                    body.insert("case_insensitive".to_string(), Value::Bool(true));
                }
                clause("wildcard", name, Value::Object(body))
            }
            other => return Err(TranslationError::unsupported("search", other)),
        };

        Ok(if negated { self.negate(query) } else { query })
    }
}

/// Translates with the default configuration.
pub fn translate_search(expr: &Expression) -> TranslationResult<Value> {
    SearchTranslator::new().translate(expr)
}
