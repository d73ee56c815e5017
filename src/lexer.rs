//! Filter的词法分析器
//!
//! 词法分析器保持为正则语言: 带引号的字符串一律产生 `QuotedString`,
//! 日期/时间的识别由语法分析器完成。

use std::borrow::Cow;

use crate::error::SyntaxError;
use crate::token::{Span, Token, TokenKind};

pub struct Lexer<'a> {
    input: &'a str,
    /// 输入字符串中的当前位置（字节索引）
    position: usize,
    /// 出错后停止产生 token
    finished: bool,
}

/// 将整个输入切分为 token 序列，遇到第一个错误即返回
pub fn tokenize(input: &str) -> Result<Vec<Token<'_>>, SyntaxError> {
    let tokens = Lexer::new(input).collect::<Result<Vec<_>, _>>()?;
    tracing::trace!(count = tokens.len(), "tokenized filter");
    Ok(tokens)
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer {
            input,
            position: 0,
            finished: false,
        }
    }

    /// 返回当前位置的字符，不推进位置
    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    /// 返回下一个位置的字符，不推进位置
    fn peek_next(&self) -> Option<char> {
        self.input[self.position..].chars().nth(1)
    }

    /// 推进位置一个字符并返回该字符
    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    /// 跳过空白字符
    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    fn token(&self, kind: TokenKind<'a>, start: usize) -> Token<'a> {
        Token {
            kind,
            span: Span::new(start, self.position),
        }
    }

    /// 读取数字字面量: `-?digits(.digits)?`
    /// 注意：可选的负号已经被调用者消费
    fn read_number(&mut self, start: usize) -> Result<Token<'a>, SyntaxError> {
        self.skip_digits();
        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.bump(); // 消费 '.'
            self.skip_digits();
        }

        let text = &self.input[start..self.position];
        // 整数必须放得进 i64，小数必须是有限的 f64
        let in_range = if is_float {
            text.parse::<f64>().is_ok_and(f64::is_finite)
        } else {
            text.parse::<i64>().is_ok()
        };
        if !in_range {
            return Err(SyntaxError::new(
                format!("number '{}' is out of range", text),
                Span::new(start, self.position),
            ));
        }
        Ok(self.token(TokenKind::Number(text), start))
    }

    fn skip_digits(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// 读取双引号包围的字符串字面量，只支持 `\"` 和 `\\` 转义
    /// 注意：开始的引号已经被调用者消费
    fn read_string(&mut self, start: usize) -> Result<Token<'a>, SyntaxError> {
        let content_start = self.position;
        let mut unescaped: Option<String> = None;

        loop {
            let char_start = self.position;
            match self.bump() {
                None => {
                    return Err(SyntaxError::new(
                        "unterminated string literal",
                        Span::new(start, self.position),
                    ));
                }
                Some('"') => break,
                Some('\\') => {
                    let escaped = match self.bump() {
                        Some(c @ ('"' | '\\')) => c,
                        Some(other) => {
                            return Err(SyntaxError::new(
                                format!("invalid escape sequence '\\{}'", other),
                                Span::new(char_start, self.position),
                            ));
                        }
                        None => {
                            return Err(SyntaxError::new(
                                "unterminated string literal",
                                Span::new(start, self.position),
                            ));
                        }
                    };
                    unescaped
                        .get_or_insert_with(|| self.input[content_start..char_start].to_string())
                        .push(escaped);
                }
                Some(c) => {
                    if let Some(buf) = unescaped.as_mut() {
                        buf.push(c);
                    }
                }
            }
        }

        // 没有转义时直接借用输入
        let content = match unescaped {
            Some(buf) => Cow::Owned(buf),
            None => Cow::Borrowed(&self.input[content_start..self.position - 1]),
        };
        Ok(self.token(TokenKind::QuotedString(content), start))
    }

    /// 读取标识符或关键字
    /// 标识符可以包含字母、数字和下划线，点号作为单独的 token
    fn read_identifier(&mut self, start: usize) -> Token<'a> {
        let word = self.scan_word(start);
        self.position = start + word.len();
        self.token(match_keyword(word), start)
    }

    /// 从 `from` 开始向前扫描一个标识符，不推进位置
    fn scan_word(&self, from: usize) -> &'a str {
        let rest = &self.input[from..];
        let len = rest
            .char_indices()
            .find(|&(_, c)| !is_identifier_char(c))
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        &rest[..len]
    }

    /// `!` 之后可能是 `!=`、`!in`、`!like`、`!ilike`，否则为前缀取反
    fn read_bang(&mut self, start: usize) -> Token<'a> {
        if self.peek() == Some('=') {
            self.bump();
            return self.token(TokenKind::NotEq, start);
        }
        let word = self.scan_word(self.position);
        let kind = match word {
            "in" => Some(TokenKind::NotIn),
            "like" => Some(TokenKind::NotLike),
            "ilike" => Some(TokenKind::NotILike),
            _ => None,
        };
        match kind {
            Some(kind) => {
                self.position += word.len();
                self.token(kind, start)
            }
            None => self.token(TokenKind::Bang, start),
        }
    }
}

fn is_identifier_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn match_keyword(s: &str) -> TokenKind<'_> {
    match s {
        "and" => TokenKind::And,
        "or" => TokenKind::Or,
        "not" => TokenKind::Not,
        "in" => TokenKind::In,
        "like" => TokenKind::Like,
        "ilike" => TokenKind::ILike,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "null" => TokenKind::Null,
        _ => TokenKind::Identifier(s),
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, SyntaxError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        self.skip_whitespace();
        let start = self.position;

        let Some(c) = self.bump() else {
            return None; // 到达输入末尾
        };

        let result = match c {
            '=' => Ok(self.token(TokenKind::Eq, start)),
            '(' => Ok(self.token(TokenKind::LParen, start)),
            ')' => Ok(self.token(TokenKind::RParen, start)),
            '[' => Ok(self.token(TokenKind::LBracket, start)),
            ']' => Ok(self.token(TokenKind::RBracket, start)),
            ',' => Ok(self.token(TokenKind::Comma, start)),
            '.' => Ok(self.token(TokenKind::Dot, start)),
            '<' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Ok(self.token(TokenKind::Lte, start))
                } else {
                    Ok(self.token(TokenKind::Lt, start))
                }
            }
            '>' => {
                if self.peek() == Some('=') {
                    self.bump();
                    Ok(self.token(TokenKind::Gte, start))
                } else {
                    Ok(self.token(TokenKind::Gt, start))
                }
            }
            '!' => Ok(self.read_bang(start)),
            '"' => self.read_string(start),
            '-' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.read_number(start),
            c if c.is_ascii_digit() => self.read_number(start),
            c if is_identifier_start(c) => Ok(self.read_identifier(start)),
            other => Err(SyntaxError::new(
                format!("unrecognized character '{}'", other),
                Span::new(start, self.position),
            )),
        };

        if result.is_err() {
            self.finished = true;
        }
        Some(result)
    }
}
