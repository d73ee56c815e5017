//! Document-store backend: builds a MongoDB-style filter object.
//!
//! Comparisons are negated by inverting the operator (`$gte` becomes `$lt`),
//! pattern matches by wrapping the `$regex` in `$not`, and chains by De Morgan.

use serde_json::{json, Map, Value};

use super::{NegationStrategy, Translator};
use crate::ast::{ComparisonOp, Expression, Identifier, Literal, LogicalOp, Number};
use crate::config::FilterConfig;
use crate::error::{TranslationError, TranslationResult};

const BACKEND: &str = "document";

/// A field reference (for `$expr` comparisons) or a JSON value.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentOperand {
    Field(String),
    Value(Value),
}

#[derive(Debug, Clone, Default)]
pub struct DocumentTranslator {
    config: FilterConfig,
}

impl DocumentTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FilterConfig) -> Self {
        Self { config }
    }
}

fn field_doc(field: String, condition: Value) -> Value {
    let mut map = Map::new();
    map.insert(field, condition);
    Value::Object(map)
}

fn operator_key(op: ComparisonOp) -> Option<&'static str> {
    match op {
        ComparisonOp::Eq => Some("$eq"),
        ComparisonOp::NotEq => Some("$ne"),
        ComparisonOp::Gt => Some("$gt"),
        ComparisonOp::Gte => Some("$gte"),
        ComparisonOp::Lt => Some("$lt"),
        ComparisonOp::Lte => Some("$lte"),
        ComparisonOp::In => Some("$in"),
        ComparisonOp::NotIn => Some("$nin"),
        _ => None,
    }
}

/// Converts a LIKE pattern into an anchored regex: `%` and `*` match any run,
/// `_` one character, everything else literally.
fn like_to_regex(pattern: &str) -> String {
    let mut regex = String::with_capacity(pattern.len() + 2);
    regex.push('^');
    for c in pattern.chars() {
        match c {
            '%' | '*' => regex.push_str(".*"),
            '_' => regex.push('.'),
            other => regex.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    regex.push('$');
    regex
}

fn text_search(op: ComparisonOp, pattern: &Value) -> TranslationResult<Value> {
    let Value::String(pattern) = pattern else {
        return Err(TranslationError::invalid_operand(format!(
            "'{}' needs a string pattern",
            op
        )));
    };
    let mut search = Map::new();
    search.insert("$regex".to_string(), Value::String(like_to_regex(pattern)));
    if matches!(op, ComparisonOp::ILike | ComparisonOp::NotILike) {
        search.insert("$options".to_string(), json!("i"));
    }
    Ok(if op.is_negated() {
        field_doc("$not".to_string(), Value::Object(search))
    } else {
        Value::Object(search)
    })
}

impl Translator for DocumentTranslator {
    type Output = Value;
    type Operand = DocumentOperand;

    fn negation_strategy(&self) -> NegationStrategy {
        NegationStrategy::DeMorgan
    }

    fn field_operand(&self, field: &Identifier) -> TranslationResult<DocumentOperand> {
        Ok(DocumentOperand::Field(self.config.field_name(field)))
    }

    fn literal_operand(&self, literal: &Literal) -> TranslationResult<DocumentOperand> {
        let value = match literal {
            Literal::String(s) => json!(s),
            Literal::Number(Number::Int(n)) => json!(n),
            Literal::Number(Number::Float(n)) => json!(n),
            Literal::Boolean(b) => json!(b),
            Literal::Null => Value::Null,
            Literal::Date { raw, .. } => json!({ "$date": raw }),
            Literal::Time { raw, .. } => json!(raw),
        };
        Ok(DocumentOperand::Value(value))
    }

    fn list_operand(&self, items: Vec<DocumentOperand>) -> TranslationResult<DocumentOperand> {
        let values = items
            .into_iter()
            .map(|item| match item {
                DocumentOperand::Value(value) => Ok(value),
                DocumentOperand::Field(name) => Err(TranslationError::invalid_operand(format!(
                    "field '{}' cannot appear inside an array",
                    name
                ))),
            })
            .collect::<TranslationResult<Vec<_>>>()?;
        Ok(DocumentOperand::Value(Value::Array(values)))
    }

    fn combine(&self, op: LogicalOp, items: Vec<Value>) -> Value {
        match op {
            LogicalOp::And => json!({ "$and": items }),
            LogicalOp::Or => json!({ "$or": items }),
        }
    }

    fn negate(&self, output: Value) -> Value {
        json!({ "$nor": [output] })
    }

    fn exists(&self, field: &Identifier, exists: bool) -> TranslationResult<Value> {
        Ok(field_doc(self.config.field_name(field), json!({ "$exists": exists })))
    }

    fn compare(
        &self,
        field: &Identifier,
        op: ComparisonOp,
        right: DocumentOperand,
        negative: bool,
    ) -> TranslationResult<Value> {
        let name = self.config.field_name(field);
        let op = op.with_negation(negative);

        match right {
            DocumentOperand::Field(other) => {
                let key = match op {
                    ComparisonOp::In | ComparisonOp::NotIn => None,
                    _ => operator_key(op),
                }
                .ok_or_else(|| TranslationError::unsupported(BACKEND, op))?;
                let operands = json!([format!("${}", name), format!("${}", other)]);
                Ok(field_doc("$expr".to_string(), field_doc(key.to_string(), operands)))
            }
            DocumentOperand::Value(value) if op.is_pattern() => Ok(field_doc(name, text_search(op, &value)?)),
            DocumentOperand::Value(value) if op == ComparisonOp::Eq => Ok(field_doc(name, value)),
            DocumentOperand::Value(value) => {
                let key = operator_key(op).ok_or_else(|| TranslationError::unsupported(BACKEND, op))?;
                Ok(field_doc(name, field_doc(key.to_string(), value)))
            }
        }
    }
}

/// Translates with the default configuration.
pub fn translate_document(expr: &Expression) -> TranslationResult<Value> {
    DocumentTranslator::new().translate(expr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    fn translate(input: &str) -> Value {
        translate_document(&parse(input).unwrap()).unwrap()
    }

    #[test]
    fn test_bare_equality() {
        assert_eq!(translate(r#"name="Demons""#), json!({ "name": "Demons" }));
    }

    #[test]
    fn test_range_operator() {
        assert_eq!(translate("page>=5"), json!({ "page": { "$gte": 5 } }));
        assert_eq!(translate("score < 2.5"), json!({ "score": { "$lt": 2.5 } }));
    }

    #[test]
    fn test_or_chain() {
        assert_eq!(
            translate("page=1 or page=2"),
            json!({ "$or": [{ "page": 1 }, { "page": 2 }] })
        );
    }

    #[test]
    fn test_not_in() {
        assert_eq!(translate("page !in [5,6]"), json!({ "page": { "$nin": [5, 6] } }));
        assert_eq!(translate(r#"tag in "a""#), json!({ "tag": { "$in": ["a"] } }));
    }

    #[test]
    fn test_not_equal() {
        assert_eq!(translate(r#"name!="Demons""#), json!({ "name": { "$ne": "Demons" } }));
    }

    #[test]
    fn test_negation_inverts_operator() {
        assert_eq!(translate("not page>=5"), json!({ "page": { "$lt": 5 } }));
        assert_eq!(translate(r#"not name!="Demons""#), json!({ "name": "Demons" }));
        assert_eq!(translate("not page in [1,2]"), json!({ "page": { "$nin": [1, 2] } }));
    }

    #[test]
    fn test_negated_chain_uses_de_morgan() {
        assert_eq!(
            translate(r#"not (page=1 and name="x")"#),
            json!({ "$or": [{ "page": { "$ne": 1 } }, { "name": { "$ne": "x" } }] })
        );
    }

    #[test]
    fn test_double_negation_cancels() {
        let plain = translate(r#"(page=1 or page=2) and name like "De%""#);
        let doubled = translate(r#"not not ((page=1 or page=2) and name like "De%")"#);
        assert_eq!(plain, doubled);
    }

    #[test]
    fn test_text_search() {
        assert_eq!(
            translate(r#"name like "De%s_""#),
            json!({ "name": { "$regex": "^De.*s.$" } })
        );
        assert_eq!(
            translate(r#"name ilike "a.b*""#),
            json!({ "name": { "$regex": "^a\\.b.*$", "$options": "i" } })
        );
        assert_eq!(
            translate(r#"not name ilike "x%""#),
            json!({ "name": { "$not": { "$regex": "^x.*$", "$options": "i" } } })
        );
        assert_eq!(
            translate(r#"name !like "x%""#),
            json!({ "name": { "$not": { "$regex": "^x.*$" } } })
        );
    }

    #[test]
    fn test_time_shaped_pattern_stays_text() {
        assert_eq!(
            translate(r#"at like "10:30:%""#),
            json!({ "at": { "$regex": "^10:30:.*$" } })
        );
        assert_eq!(
            translate(r#"at like "10:30:00""#),
            json!({ "at": { "$regex": "^10:30:00$" } })
        );
        assert_eq!(translate(r#"at = "10:30:00""#), json!({ "at": "10:30:00" }));
    }

    #[test]
    fn test_existence_checks() {
        assert_eq!(translate("email = null"), json!({ "email": { "$exists": false } }));
        assert_eq!(translate("email != null"), json!({ "email": { "$exists": true } }));
        assert_eq!(translate("not email = null"), json!({ "email": { "$exists": true } }));
    }

    #[test]
    fn test_field_to_field_uses_expr() {
        assert_eq!(
            translate("updated_at > created_at"),
            json!({ "$expr": { "$gt": ["$updated_at", "$created_at"] } })
        );
        assert_eq!(
            translate("not a = b"),
            json!({ "$expr": { "$ne": ["$a", "$b"] } })
        );
        let err = translate_document(&parse("a like b").unwrap()).unwrap_err();
        assert_eq!(err, TranslationError::unsupported(BACKEND, ComparisonOp::Like));
    }

    #[test]
    fn test_dates_and_paths() {
        assert_eq!(
            translate(r#"meta.created >= "2024-01-31""#),
            json!({ "meta.created": { "$gte": { "$date": "2024-01-31" } } })
        );
    }

    #[test]
    fn test_negate_uses_nor() {
        let translator = DocumentTranslator::new();
        assert_eq!(
            translator.negate(json!({ "a": 1 })),
            json!({ "$nor": [{ "a": 1 }] })
        );
    }

    #[test]
    fn test_translation_is_idempotent() {
        let expr = parse(r#"not (a=1 or b in [1,2]) and c like "x%""#).unwrap();
        let translator = DocumentTranslator::new();
        assert_eq!(translator.translate(&expr).unwrap(), translator.translate(&expr).unwrap());
    }
}
