// Copyright 2025 StrongDM Inc
// SPDX-License-Identifier: Apache-2.0

//! Recursive descent parser for filter predicates.
//!
//! Grammar:
//!   query       = or_expr ;
//!   or_expr     = and_expr { "OR" and_expr } ;
//!   and_expr    = unary_expr { "AND" unary_expr } ;
//!   unary_expr  = "NOT" unary_expr | primary ;
//!   primary     = "(" or_expr ")" | "TRUE" | "FALSE"
//!               | "INTERSECTS" ( "BBOX" | string )
//!               | predicate ;
//!   predicate   = path ( cmp_op value
//!                      | "IN" "(" value { "," value } ")"
//!                      | "LIKE" string
//!                      | "~" regex
//!                      | "IS" [ "NOT" ] "NULL" ) ;
//!   value       = integer | decimal | string | "TRUE" | "FALSE" ;
//!
//! Keywords are case-insensitive. Strings are single-quoted and taken
//! verbatim. Regex literals are delimited by `/`, with `\/` for a slash.

use std::str::FromStr;

use super::ast::{
    BooleanExpr, CompareOp, Position, PropertyExpr, QueryError, QueryErrorType, ValueExpr,
    ValueListExpr,
};

#[derive(Debug, Clone, PartialEq)]
enum TokenType {
    And,
    Or,
    Not,
    In,
    Like,
    Is,
    Null,
    True,
    False,
    Intersects,
    Bbox,
    LParen,
    RParen,
    Comma,
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    Tilde,
    String(String),
    Regex(String),
    Integer(String),
    Decimal(String),
    Ident(String),
    Eof,
}

impl TokenType {
    fn describe(&self) -> String {
        match self {
            TokenType::String(s) => format!("string '{}'", s),
            TokenType::Regex(s) => format!("regex /{}/", s),
            TokenType::Integer(s) | TokenType::Decimal(s) => format!("number {}", s),
            TokenType::Ident(s) => format!("identifier '{}'", s),
            TokenType::Eof => "end of input".to_string(),
            other => format!("{:?}", other).to_uppercase(),
        }
    }
}

#[derive(Debug, Clone)]
struct Token {
    token_type: TokenType,
    position: Position,
}

struct Lexer<'a> {
    input: &'a str,
    chars: std::iter::Peekable<std::str::CharIndices<'a>>,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input,
            chars: input.char_indices().peekable(),
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    fn current_position(&self) -> Position {
        Position {
            line: self.line,
            column: self.column,
            offset: self.pos,
        }
    }

    fn advance(&mut self) -> Option<char> {
        let (pos, ch) = self.chars.next()?;
        self.pos = pos + ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|(_, ch)| *ch)
    }

    fn peek_second(&self) -> Option<char> {
        self.input[self.pos..].chars().nth(1)
    }

    fn skip_whitespace(&mut self) {
        while let Some(ch) = self.peek() {
            if ch.is_whitespace() {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn single(&mut self, token_type: TokenType, position: Position) -> Token {
        self.advance();
        Token {
            token_type,
            position,
        }
    }

    fn read_string(&mut self) -> Result<Token, QueryError> {
        let start_pos = self.current_position();
        self.advance(); // opening quote
        let mut value = String::new();

        loop {
            match self.advance() {
                None => {
                    return Err(QueryError::syntax(
                        format!(
                            "Unterminated string starting at line {}, column {}",
                            start_pos.line, start_pos.column
                        ),
                        start_pos,
                    ));
                }
                Some('\'') => break,
                Some(ch) => value.push(ch),
            }
        }

        Ok(Token {
            token_type: TokenType::String(value),
            position: start_pos,
        })
    }

    fn read_regex(&mut self) -> Result<Token, QueryError> {
        let start_pos = self.current_position();
        self.advance(); // opening slash
        let mut value = String::new();

        loop {
            match self.advance() {
                None => {
                    return Err(QueryError::syntax(
                        format!(
                            "Unterminated regex starting at line {}, column {}",
                            start_pos.line, start_pos.column
                        ),
                        start_pos,
                    ));
                }
                Some('/') => break,
                Some('\\') if self.peek() == Some('/') => {
                    self.advance();
                    value.push('/');
                }
                Some(ch) => value.push(ch),
            }
        }

        Ok(Token {
            token_type: TokenType::Regex(value),
            position: start_pos,
        })
    }

    fn consume_digits(&mut self) -> usize {
        let mut count = 0;
        while let Some(ch) = self.peek() {
            if ch.is_ascii_digit() {
                self.advance();
                count += 1;
            } else {
                break;
            }
        }
        count
    }

    fn read_number(&mut self) -> Result<Token, QueryError> {
        let start_pos = self.current_position();
        let start = self.pos;

        if self.peek() == Some('-') {
            self.advance();
        }
        self.consume_digits();

        let mut is_decimal = false;
        if self.peek() == Some('.') {
            self.advance();
            if self.consume_digits() == 0 {
                return Err(QueryError {
                    error_type: QueryErrorType::InvalidValue,
                    message: format!(
                        "Expected digits after '.' in number at line {}, column {}",
                        start_pos.line, start_pos.column
                    ),
                    position: Some(start_pos),
                });
            }
            is_decimal = true;
        }

        let text = self.input[start..self.pos].to_string();
        let token_type = if is_decimal {
            TokenType::Decimal(text)
        } else {
            TokenType::Integer(text)
        };
        Ok(Token {
            token_type,
            position: start_pos,
        })
    }

    fn read_identifier(&mut self) -> Token {
        let start_pos = self.current_position();
        let start = self.pos;

        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' || ch == '.' {
                self.advance();
            } else {
                break;
            }
        }

        let value = &self.input[start..self.pos];
        let token_type = match value.to_uppercase().as_str() {
            "AND" => TokenType::And,
            "OR" => TokenType::Or,
            "NOT" => TokenType::Not,
            "IN" => TokenType::In,
            "LIKE" => TokenType::Like,
            "IS" => TokenType::Is,
            "NULL" => TokenType::Null,
            "TRUE" => TokenType::True,
            "FALSE" => TokenType::False,
            "INTERSECTS" => TokenType::Intersects,
            "BBOX" => TokenType::Bbox,
            _ => TokenType::Ident(value.to_string()),
        };

        Token {
            token_type,
            position: start_pos,
        }
    }

    fn next_token(&mut self) -> Result<Token, QueryError> {
        self.skip_whitespace();

        let start_pos = self.current_position();

        match self.peek() {
            None => Ok(Token {
                token_type: TokenType::Eof,
                position: start_pos,
            }),
            Some('\'') => self.read_string(),
            Some('/') => self.read_regex(),
            Some(ch)
                if ch.is_ascii_digit()
                    || (ch == '-' && self.peek_second().is_some_and(|c| c.is_ascii_digit())) =>
            {
                self.read_number()
            }
            Some(ch) if ch.is_alphabetic() || ch == '_' => Ok(self.read_identifier()),
            Some('(') => Ok(self.single(TokenType::LParen, start_pos)),
            Some(')') => Ok(self.single(TokenType::RParen, start_pos)),
            Some(',') => Ok(self.single(TokenType::Comma, start_pos)),
            Some('=') => Ok(self.single(TokenType::Eq, start_pos)),
            Some('~') => Ok(self.single(TokenType::Tilde, start_pos)),
            Some('!') => {
                self.advance();
                if self.peek() == Some('=') {
                    Ok(self.single(TokenType::Neq, start_pos))
                } else {
                    Err(QueryError::syntax(
                        format!(
                            "Expected '=' after '!' at line {}, column {}",
                            start_pos.line, start_pos.column
                        ),
                        start_pos,
                    ))
                }
            }
            Some('>') => {
                self.advance();
                if self.peek() == Some('=') {
                    Ok(self.single(TokenType::Gte, start_pos))
                } else {
                    Ok(Token {
                        token_type: TokenType::Gt,
                        position: start_pos,
                    })
                }
            }
            Some('<') => {
                self.advance();
                if self.peek() == Some('=') {
                    Ok(self.single(TokenType::Lte, start_pos))
                } else {
                    Ok(Token {
                        token_type: TokenType::Lt,
                        position: start_pos,
                    })
                }
            }
            Some(ch) => Err(QueryError::syntax(
                format!(
                    "Unexpected character '{}' at line {}, column {}",
                    ch, start_pos.line, start_pos.column
                ),
                start_pos,
            )),
        }
    }

    fn tokenize(&mut self) -> Result<Vec<Token>, QueryError> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token()?;
            let is_eof = matches!(token.token_type, TokenType::Eof);
            tokens.push(token);
            if is_eof {
                break;
            }
        }
        Ok(tokens)
    }
}

/// Parser for filter predicates.
#[derive(Default)]
pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    fn current(&self) -> Token {
        match self.tokens.get(self.pos).or_else(|| self.tokens.last()) {
            Some(token) => token.clone(),
            None => Token {
                token_type: TokenType::Eof,
                position: Position {
                    line: 1,
                    column: 1,
                    offset: 0,
                },
            },
        }
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn check(&self, expected: &TokenType) -> bool {
        std::mem::discriminant(&self.current().token_type) == std::mem::discriminant(expected)
    }

    fn match_token(&mut self, expected: &TokenType) -> bool {
        if self.check(expected) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &TokenType, what: &str) -> Result<(), QueryError> {
        if self.match_token(expected) {
            Ok(())
        } else {
            let token = self.current();
            Err(QueryError::syntax(
                format!("Expected {}, found {}", what, token.token_type.describe()),
                token.position,
            ))
        }
    }

    pub fn parse(&mut self, input: &str) -> Result<BooleanExpr, QueryError> {
        let mut lexer = Lexer::new(input);
        self.tokens = lexer.tokenize()?;
        self.pos = 0;

        if self.check(&TokenType::Eof) {
            return Err(QueryError::syntax("Empty query", self.current().position));
        }

        let ast = self.parse_or_expr()?;

        if !self.check(&TokenType::Eof) {
            let token = self.current();
            return Err(QueryError::syntax(
                format!(
                    "Unexpected {} after expression",
                    token.token_type.describe()
                ),
                token.position,
            ));
        }

        Ok(ast)
    }

    fn parse_or_expr(&mut self) -> Result<BooleanExpr, QueryError> {
        let mut left = self.parse_and_expr()?;

        while self.match_token(&TokenType::Or) {
            let right = self.parse_and_expr()?;
            left = BooleanExpr::or(left, right);
        }

        Ok(left)
    }

    fn parse_and_expr(&mut self) -> Result<BooleanExpr, QueryError> {
        let mut left = self.parse_unary_expr()?;

        while self.match_token(&TokenType::And) {
            let right = self.parse_unary_expr()?;
            left = BooleanExpr::and(left, right);
        }

        Ok(left)
    }

    fn parse_unary_expr(&mut self) -> Result<BooleanExpr, QueryError> {
        if self.match_token(&TokenType::Not) {
            let inner = self.parse_unary_expr()?;
            return Ok(BooleanExpr::not(inner));
        }

        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<BooleanExpr, QueryError> {
        let token = self.current();
        match token.token_type {
            TokenType::LParen => {
                self.advance();
                let expr = self.parse_or_expr()?;
                self.expect(&TokenType::RParen, "')' after expression")?;
                Ok(expr)
            }
            TokenType::True => {
                self.advance();
                Ok(BooleanExpr::Literal { value: true })
            }
            TokenType::False => {
                self.advance();
                Ok(BooleanExpr::Literal { value: false })
            }
            TokenType::Intersects => {
                self.advance();
                self.parse_intersects()
            }
            TokenType::Ident(_) => self.parse_predicate(),
            other => Err(QueryError::syntax(
                format!("Expected expression, found {}", other.describe()),
                token.position,
            )),
        }
    }

    fn parse_intersects(&mut self) -> Result<BooleanExpr, QueryError> {
        let token = self.current();
        match token.token_type {
            TokenType::Bbox => {
                self.advance();
                Ok(BooleanExpr::IntersectsBbox)
            }
            TokenType::String(wkt) => {
                self.advance();
                if let Err(e) = wkt::Wkt::<f64>::from_str(&wkt) {
                    return Err(QueryError {
                        error_type: QueryErrorType::InvalidGeometry,
                        message: format!("Invalid WKT literal: {}", e),
                        position: Some(token.position),
                    });
                }
                Ok(BooleanExpr::IntersectsGeom { wkt })
            }
            other => Err(QueryError::syntax(
                format!(
                    "Expected BBOX or a WKT string after INTERSECTS, found {}",
                    other.describe()
                ),
                token.position,
            )),
        }
    }

    fn parse_predicate(&mut self) -> Result<BooleanExpr, QueryError> {
        let property = self.parse_property()?;

        let op_token = self.current();
        let operator = match op_token.token_type {
            TokenType::Eq => CompareOp::Eq,
            TokenType::Neq => CompareOp::Neq,
            TokenType::Gt => CompareOp::Gt,
            TokenType::Gte => CompareOp::Gte,
            TokenType::Lt => CompareOp::Lt,
            TokenType::Lte => CompareOp::Lte,
            TokenType::In => {
                self.advance();
                let values = self.parse_list()?;
                return Ok(BooleanExpr::In { property, values });
            }
            TokenType::Like => {
                self.advance();
                let pattern = self.parse_string("pattern string after LIKE")?;
                return Ok(BooleanExpr::Like { property, pattern });
            }
            TokenType::Tilde => {
                self.advance();
                let pattern = self.parse_regex()?;
                return Ok(BooleanExpr::Regex { property, pattern });
            }
            TokenType::Is => {
                self.advance();
                let negated = self.match_token(&TokenType::Not);
                self.expect(&TokenType::Null, "NULL after IS")?;
                return Ok(BooleanExpr::NullTest {
                    property,
                    is_null: !negated,
                });
            }
            other => {
                return Err(QueryError::syntax(
                    format!("Expected operator, found {}", other.describe()),
                    op_token.position,
                ));
            }
        };
        self.advance();

        let value = self.parse_value()?;
        Ok(BooleanExpr::Comparison {
            property,
            operator,
            value,
        })
    }

    fn parse_property(&mut self) -> Result<PropertyExpr, QueryError> {
        let token = self.current();
        match token.token_type {
            TokenType::Ident(path) => {
                self.advance();
                PropertyExpr::from_dotted(&path).ok_or_else(|| {
                    QueryError::syntax(
                        format!("Invalid property path '{}': empty segment", path),
                        token.position,
                    )
                })
            }
            other => Err(QueryError::syntax(
                format!("Expected property path, found {}", other.describe()),
                token.position,
            )),
        }
    }

    fn parse_string(&mut self, what: &str) -> Result<String, QueryError> {
        let token = self.current();
        match token.token_type {
            TokenType::String(s) => {
                self.advance();
                Ok(s)
            }
            other => Err(QueryError::syntax(
                format!("Expected {}, found {}", what, other.describe()),
                token.position,
            )),
        }
    }

    fn parse_regex(&mut self) -> Result<String, QueryError> {
        let token = self.current();
        match token.token_type {
            TokenType::Regex(pattern) => {
                self.advance();
                if let Err(e) = regex::Regex::new(&pattern) {
                    return Err(QueryError {
                        error_type: QueryErrorType::InvalidPattern,
                        message: format!("Invalid regex /{}/: {}", pattern, e),
                        position: Some(token.position),
                    });
                }
                Ok(pattern)
            }
            other => Err(QueryError::syntax(
                format!("Expected /pattern/ after '~', found {}", other.describe()),
                token.position,
            )),
        }
    }

    fn parse_value(&mut self) -> Result<ValueExpr, QueryError> {
        let token = self.current();
        let value = match token.token_type {
            TokenType::Integer(text) => ValueExpr::Integer { text },
            TokenType::Decimal(text) => ValueExpr::Decimal { text },
            TokenType::String(value) => ValueExpr::Text { value },
            TokenType::True => ValueExpr::Boolean { value: true },
            TokenType::False => ValueExpr::Boolean { value: false },
            other => {
                return Err(QueryError::syntax(
                    format!("Expected value, found {}", other.describe()),
                    token.position,
                ));
            }
        };
        self.advance();
        Ok(value)
    }

    fn parse_list(&mut self) -> Result<ValueListExpr, QueryError> {
        self.expect(&TokenType::LParen, "'(' after IN")?;

        let mut values = ValueListExpr::new();
        values.insert(self.parse_value()?);
        while self.match_token(&TokenType::Comma) {
            values.insert(self.parse_value()?);
        }

        self.expect(&TokenType::RParen, "')' after list values")?;
        Ok(values)
    }
}

/// Parse query text into an AST.
pub fn parse(input: &str) -> Result<BooleanExpr, QueryError> {
    let mut parser = Parser::new();
    parser.parse(input)
}
