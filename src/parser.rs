//! Filter的语法分析器
//!
//! ## 解析流程图
//!
//! ```text
//! parse()
//!   └─ parse_or_expression()
//!        ├─ parse_and_expression()
//!        │    ├─ parse_not_expression()
//!        │    │    ├─ "not" / "!" → Negative (允许 not not x)
//!        │    │    └─ parse_primary_expression()
//!        │    │         ├─ "(" → Parenthesized (递归调用parse_or_expression)
//!        │    │         └─ parse_comparison()
//!        │    │              ├─ parse_operand()  字段 / 字面值 / 数组
//!        │    │              ├─ 比较运算符
//!        │    │              └─ parse_operand()
//!        │    │
//!        │    └─ 遇到and时，收集右侧NOT表达式到同一个链
//!        │
//!        └─ 遇到or时，收集右侧AND表达式到同一个链
//! ```
//!
//! ## 语法优先级（从高到低）
//!
//! 1. **括号分组** `(expression)`
//! 2. **比较操作** `page>=5`, `tag in ["a","b"]`, `name like "De%"`
//! 3. **NOT操作** `not expression`, `!expression`
//! 4. **AND操作** `expr1 and expr2 and ...`
//! 5. **OR操作** `expr1 or expr2 or ...`
//!
//! 同一优先级上连续的 and/or 会被展开为一个 `Logical` 节点，
//! 不会生成嵌套的二叉树。
//!
//! ## 字面值类型
//! - **字符串**: `"quoted string"`，带引号的 `"2024-01-31"`、
//!   `"2024-01-31T10:00:00"` 识别为日期，`"10:30:00"` 识别为时间
//! - **数字**: `123`, `-456`, `3.5`
//! - **布尔**: `true`, `false`
//! - **空值**: `null`
//! - **数组**: `[1, 2, 3]`

use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use regex::Regex;

use crate::ast::{ComparisonOp, DateValue, Expression, Identifier, Literal, LogicalOp, Number};
use crate::error::{ParseResult, SemanticError, SyntaxError};
use crate::lexer::tokenize;
use crate::token::{Span, Token, TokenKind};

/// 括号与数组的最大嵌套深度
const MAX_NESTING_DEPTH: usize = 64;

static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern is valid"));
static DATE_TIME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{4}-\d{2}-\d{2}T\d{2}:\d{2}:\d{2}(\.\d{1,9})?$").expect("date-time pattern is valid")
});
static TIME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}:\d{2}:\d{2}(\.\d{1,9})?$").expect("time pattern is valid"));

/// 解析一个完整的过滤表达式
pub fn parse(input: &str) -> ParseResult<Expression> {
    let tokens = tokenize(input)?;
    let expr = Parser::new(&tokens).parse()?;
    tracing::debug!(nodes = expr.node_count(), "parsed filter");
    Ok(expr)
}

pub struct Parser<'a> {
    tokens: &'a [Token<'a>],
    position: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: &'a [Token<'a>]) -> Self {
        Self {
            tokens,
            position: 0,
            depth: 0,
        }
    }

    /// 返回当前 token，不推进位置
    fn peek(&self) -> Option<&'a Token<'a>> {
        self.tokens.get(self.position)
    }

    /// 返回当前 token 并推进位置
    fn advance(&mut self) -> Option<&'a Token<'a>> {
        let token = self.tokens.get(self.position)?;
        self.position += 1;
        Some(token)
    }

    /// 输入结束处的位置
    fn end_span(&self) -> Span {
        Span::at(self.tokens.last().map(|t| t.span.end).unwrap_or(0))
    }

    /// 期望特定类型的 token 并推进，否则返回错误
    fn expect(&mut self, expected: TokenKind, context: &str) -> Result<&'a Token<'a>, SyntaxError> {
        match self.peek() {
            Some(token) if std::mem::discriminant(&token.kind) == std::mem::discriminant(&expected) => {
                self.position += 1;
                Ok(token)
            }
            Some(token) => Err(SyntaxError::new(
                format!("expected {} {}, found {}", expected, context, token.kind),
                token.span,
            )),
            None => Err(SyntaxError::new(
                format!("expected {} {}, but reached end of input", expected, context),
                self.end_span(),
            )),
        }
    }

    /// 检查当前 token 是否匹配给定类型
    fn match_token(&self, kind: &TokenKind) -> bool {
        self.peek()
            .is_some_and(|token| std::mem::discriminant(&token.kind) == std::mem::discriminant(kind))
    }

    fn enter(&mut self, span: Span) -> Result<(), SyntaxError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(SyntaxError::new(
                format!("expression nested deeper than {} levels", MAX_NESTING_DEPTH),
                span,
            ));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    pub fn parse(&mut self) -> ParseResult<Expression> {
        if self.tokens.is_empty() {
            return Err(SyntaxError::new("filter expression is empty", Span::at(0)).into());
        }

        let expr = self.parse_or_expression()?;

        // 完整表达式之后不允许有多余的 token
        if let Some(token) = self.peek() {
            let message = match token.kind {
                TokenKind::RParen => "unmatched ')'".to_string(),
                TokenKind::RBracket => "unmatched ']'".to_string(),
                ref kind => format!("unexpected {} after end of expression", kind),
            };
            return Err(SyntaxError::new(message, token.span).into());
        }

        Ok(expr)
    }

    /// 解析OR表达式 (最低优先级)
    ///
    /// 语法: `and_expr (or and_expr)*`
    fn parse_or_expression(&mut self) -> ParseResult<Expression> {
        let first = self.parse_and_expression()?;
        let mut rest = Vec::new();

        while self.match_token(&TokenKind::Or) {
            self.advance(); // 消费 or
            rest.push(self.parse_and_expression()?);
        }

        Ok(Expression::logical(LogicalOp::Or, first, rest))
    }

    /// 解析AND表达式 (中等优先级)
    ///
    /// 语法: `not_expr (and not_expr)*`
    fn parse_and_expression(&mut self) -> ParseResult<Expression> {
        let first = self.parse_not_expression()?;
        let mut rest = Vec::new();

        while self.match_token(&TokenKind::And) {
            self.advance(); // 消费 and
            rest.push(self.parse_not_expression()?);
        }

        Ok(Expression::logical(LogicalOp::And, first, rest))
    }

    /// 解析NOT表达式
    ///
    /// 语法: `("not" | "!") not_expr | primary_expr`
    /// 双重否定保留为两个 Negative 节点
    fn parse_not_expression(&mut self) -> ParseResult<Expression> {
        match self.peek() {
            Some(token) if matches!(token.kind, TokenKind::Not | TokenKind::Bang) => {
                self.advance(); // 消费 not / !
                self.enter(token.span)?;
                let operand = self.parse_not_expression()?;
                self.leave();
                Ok(Expression::negative(operand))
            }
            _ => self.parse_primary_expression(),
        }
    }

    /// 解析基础表达式 (最高优先级)
    ///
    /// - `(or_expr)` - 分组表达式
    /// - `operand op operand` - 比较
    fn parse_primary_expression(&mut self) -> ParseResult<Expression> {
        match self.peek() {
            Some(token) if token.kind == TokenKind::LParen => {
                self.advance(); // 消费 (
                self.enter(token.span)?;
                let inner = self.parse_or_expression()?;
                let context = format!("to close '(' at offset {}", token.span.start);
                self.expect(TokenKind::RParen, &context)?;
                self.leave();
                Ok(Expression::parenthesized(inner))
            }
            Some(_) => self.parse_comparison(),
            None => Err(SyntaxError::new("unexpected end of input", self.end_span()).into()),
        }
    }

    /// 语法: `operand comp_op operand`
    fn parse_comparison(&mut self) -> ParseResult<Expression> {
        let left_span = self.peek().map(|t| t.span).unwrap_or_else(|| self.end_span());
        let left = self.parse_operand()?;
        let (op, op_span) = self.parse_comparison_operator()?;
        let right_span = self.peek().map(|t| t.span).unwrap_or_else(|| self.end_span());
        let right = self.parse_operand()?;

        match &left {
            Expression::Identifier(_) | Expression::Literal(Literal::String(_)) => {}
            other => {
                return Err(SemanticError::InvalidComparisonLeft {
                    kind: other.kind(),
                    op,
                    span: left_span,
                }
                .into());
            }
        }
        if matches!(right, Expression::Array(_)) && !op.is_membership() {
            return Err(SemanticError::MisplacedArray {
                op,
                span: Span::new(op_span.start, right_span.end),
            }
            .into());
        }

        Ok(Expression::comparison(left, op, right))
    }

    fn parse_comparison_operator(&mut self) -> Result<(ComparisonOp, Span), SyntaxError> {
        let Some(token) = self.advance() else {
            return Err(SyntaxError::new(
                "expected comparison operator, but reached end of input",
                self.end_span(),
            ));
        };
        let op = match token.kind {
            TokenKind::Eq => ComparisonOp::Eq,
            TokenKind::NotEq => ComparisonOp::NotEq,
            TokenKind::Gt => ComparisonOp::Gt,
            TokenKind::Gte => ComparisonOp::Gte,
            TokenKind::Lt => ComparisonOp::Lt,
            TokenKind::Lte => ComparisonOp::Lte,
            TokenKind::In => ComparisonOp::In,
            TokenKind::NotIn => ComparisonOp::NotIn,
            TokenKind::Like => ComparisonOp::Like,
            TokenKind::NotLike => ComparisonOp::NotLike,
            TokenKind::ILike => ComparisonOp::ILike,
            TokenKind::NotILike => ComparisonOp::NotILike,
            ref other => {
                return Err(SyntaxError::new(
                    format!("expected comparison operator, found {}", other),
                    token.span,
                ));
            }
        };
        Ok((op, token.span))
    }

    /// 语法: `path | literal | array`
    fn parse_operand(&mut self) -> Result<Expression, SyntaxError> {
        let Some(token) = self.advance() else {
            return Err(SyntaxError::new(
                "expected field, literal or array, but reached end of input",
                self.end_span(),
            ));
        };
        match &token.kind {
            TokenKind::Identifier(name) => self.parse_path(name),
            TokenKind::QuotedString(s) => Ok(Expression::Literal(classify_quoted(s))),
            TokenKind::Number(text) => parse_number(text, token.span),
            TokenKind::True => Ok(Expression::boolean(true)),
            TokenKind::False => Ok(Expression::boolean(false)),
            TokenKind::Null => Ok(Expression::null()),
            TokenKind::LBracket => {
                self.enter(token.span)?;
                let array = self.parse_array(token.span)?;
                self.leave();
                Ok(array)
            }
            other => Err(SyntaxError::new(
                format!("expected field, literal or array, found {}", other),
                token.span,
            )),
        }
    }

    /// 解析点号连接的字段路径，例如 `address.city`
    fn parse_path(&mut self, first: &str) -> Result<Expression, SyntaxError> {
        let mut segments = vec![first.to_string()];
        while self.match_token(&TokenKind::Dot) {
            self.advance(); // 消费 .
            match self.advance() {
                Some(Token {
                    kind: TokenKind::Identifier(name),
                    ..
                }) => segments.push(name.to_string()),
                Some(token) => {
                    return Err(SyntaxError::new(
                        format!("expected field name after '.', found {}", token.kind),
                        token.span,
                    ))
                }
                None => {
                    return Err(SyntaxError::new(
                        "expected field name after '.', but reached end of input",
                        self.end_span(),
                    ))
                }
            }
        }
        Ok(Expression::Identifier(Identifier(segments)))
    }

    /// 解析数组 `[operand (, operand)*]`，开始的 `[` 已经被消费
    /// 空数组和末尾逗号都是语法错误
    fn parse_array(&mut self, open: Span) -> Result<Expression, SyntaxError> {
        if let Some(token) = self.peek() {
            if token.kind == TokenKind::RBracket {
                return Err(SyntaxError::new(
                    "empty array is not allowed",
                    Span::new(open.start, token.span.end),
                ));
            }
        }

        let mut items = Vec::new();
        let context = format!("to close '[' at offset {}", open.start);
        loop {
            items.push(self.parse_operand()?);
            if self.match_token(&TokenKind::RBracket) {
                break;
            }
            self.expect(TokenKind::Comma, "between array items")?;
        }
        self.expect(TokenKind::RBracket, &context)?;

        Ok(Expression::Array(items))
    }
}

fn parse_number(text: &str, span: Span) -> Result<Expression, SyntaxError> {
    let number = if text.contains('.') {
        text.parse::<f64>().map(Number::Float).ok()
    } else {
        text.parse::<i64>().map(Number::Int).ok()
    };
    number
        .map(|n| Expression::Literal(Literal::Number(n)))
        .ok_or_else(|| SyntaxError::new(format!("invalid number '{}'", text), span))
}

/// 第二阶段的字面值分类: 日期、日期时间、时间，否则保留为字符串
fn classify_quoted(text: &str) -> Literal {
    if DATE_PATTERN.is_match(text) {
        if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
            return Literal::Date {
                raw: text.to_string(),
                value: DateValue::Date(date),
            };
        }
    } else if DATE_TIME_PATTERN.is_match(text) {
        if let Ok(date_time) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
            return Literal::Date {
                raw: text.to_string(),
                value: DateValue::DateTime(date_time),
            };
        }
    } else if TIME_PATTERN.is_match(text) {
        if let Ok(time) = NaiveTime::parse_from_str(text, "%H:%M:%S%.f") {
            return Literal::Time {
                raw: text.to_string(),
                value: time,
            };
        }
    }
    Literal::String(text.to_string())
}
