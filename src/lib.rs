//! Filter expression language: parser, expression tree and backend translators.
//!
//! ```
//! use query_filter::{parse, translate_document, translate_relational};
//! use serde_json::json;
//!
//! let expr = parse(r#"(page=1 or page=2) and name="Demons""#).unwrap();
//! assert_eq!(
//!     translate_document(&expr).unwrap(),
//!     json!({ "$and": [{ "$or": [{ "page": 1 }, { "page": 2 }] }, { "name": "Demons" }] })
//! );
//! let sql = translate_relational(&expr).unwrap().to_sql("comics");
//! assert!(sql.starts_with(r#"SELECT * FROM "comics" WHERE"#));
//! ```

pub mod ast;
pub mod config;
pub mod error;
pub mod lexer;
pub mod parser;
pub mod token;
pub mod translate;

pub use ast::{Comparison, ComparisonOp, Expression, Identifier, Literal, Logical, LogicalOp};
pub use config::{ConfigError, FilterConfig, OptimizationConfig};
pub use error::{ParseError, SemanticError, SyntaxError, TranslationError};
pub use lexer::tokenize;
pub use parser::parse;
pub use translate::{
    translate_document, translate_relational, translate_search, DocumentTranslator, NegationStrategy,
    RelationalTranslator, SearchTranslator, SqlNode, SqlOperand, Translator,
};
