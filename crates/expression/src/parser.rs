//! Parser for converting tokens into an AST
//!
//! Recursive descent over the fragment grammar:
//!
//! ```text
//! fragment := operand EOF
//! operand  := primary postfix*
//! primary  := literal | '[' list ']' | IDENT | IDENT '(' list ')' | '${' operand '}'
//! postfix  := '.' IDENT | '[' operand ']'
//! ```

use crate::core::ast::{Expr, Segment};
use crate::core::token::{Token, TokenKind};
use crate::error::{ExpressionError, ExpressionResult};
use crate::lexer::Lexer;
use serde_json::Value;

static EOF: Token = Token {
    kind: TokenKind::Eof,
    offset: 0,
};

/// Parser for converting tokens into an AST
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
}

impl Parser {
    /// Create a new parser from a list of tokens
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            position: 0,
        }
    }

    /// Parse the tokens into a single operand; trailing tokens are an error
    pub fn parse(&mut self) -> ExpressionResult<Expr> {
        if self.current().kind == TokenKind::Eof {
            return Err(ExpressionError::syntax(
                "empty expression",
                self.current().offset,
            ));
        }
        let expr = self.parse_operand()?;
        let token = self.current();
        if token.kind != TokenKind::Eof {
            return Err(ExpressionError::syntax(
                format!("unexpected trailing content starting at {}", token.kind),
                token.offset,
            ));
        }
        Ok(expr)
    }

    fn parse_operand(&mut self) -> ExpressionResult<Expr> {
        let token = self.current().clone();
        let expr = match token.kind {
            TokenKind::Integer(n) => {
                self.advance();
                Expr::Literal(Value::from(n))
            }
            TokenKind::Float(f) => {
                self.advance();
                Expr::Literal(Value::from(f))
            }
            TokenKind::String(s) => {
                self.advance();
                Expr::Literal(Value::String(s))
            }
            TokenKind::Boolean(b) => {
                self.advance();
                Expr::Literal(Value::Bool(b))
            }
            TokenKind::Null => {
                self.advance();
                Expr::Literal(Value::Null)
            }
            TokenKind::LeftBracket => {
                self.advance();
                let items = self.parse_list(&TokenKind::RightBracket)?;
                Expr::Array(items)
            }
            TokenKind::FragmentStart => {
                self.advance();
                let inner = self.parse_operand()?;
                self.expect(&TokenKind::RightBrace)?;
                Expr::Fragment(Box::new(inner))
            }
            TokenKind::Identifier(name) => {
                self.advance();
                if self.current().kind == TokenKind::LeftParen {
                    self.advance();
                    let args = self.parse_list(&TokenKind::RightParen)?;
                    Expr::Call {
                        name: name.into(),
                        args,
                    }
                } else {
                    let segments = self.parse_segments()?;
                    return Ok(Expr::Path {
                        root: name.into(),
                        segments,
                    });
                }
            }
            other => {
                return Err(ExpressionError::syntax(
                    format!("unexpected {other}"),
                    token.offset,
                ));
            }
        };

        let segments = self.parse_segments()?;
        if segments.is_empty() {
            Ok(expr)
        } else {
            Ok(Expr::Access {
                object: Box::new(expr),
                segments,
            })
        }
    }

    /// Parse `.name` and `[index]` postfix steps
    fn parse_segments(&mut self) -> ExpressionResult<Vec<Segment>> {
        let mut segments = Vec::new();
        loop {
            match self.current().kind {
                TokenKind::Dot => {
                    self.advance();
                    let token = self.current().clone();
                    let name = match token.kind {
                        TokenKind::Identifier(name) => name,
                        other => {
                            return Err(ExpressionError::syntax(
                                format!("expected property name after '.', found {other}"),
                                token.offset,
                            ));
                        }
                    };
                    self.advance();
                    segments.push(Segment::Key(name.into()));
                }
                TokenKind::LeftBracket => {
                    self.advance();
                    let index = self.parse_operand()?;
                    self.expect(&TokenKind::RightBracket)?;
                    segments.push(match index {
                        Expr::Literal(Value::String(key)) => Segment::Key(key.into()),
                        Expr::Literal(Value::Number(n)) if n.is_i64() => {
                            Segment::Index(n.as_i64().unwrap_or_default())
                        }
                        other => Segment::Computed(Box::new(other)),
                    });
                }
                _ => break,
            }
        }
        Ok(segments)
    }

    /// Parse a comma-separated list up to and including `close`
    fn parse_list(&mut self, close: &TokenKind) -> ExpressionResult<Vec<Expr>> {
        let mut items = Vec::new();
        if &self.current().kind == close {
            self.advance();
            return Ok(items);
        }
        loop {
            items.push(self.parse_operand()?);
            if self.current().kind == TokenKind::Comma {
                self.advance();
            } else {
                break;
            }
        }
        self.expect(close)?;
        Ok(items)
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.position).unwrap_or(&EOF)
    }

    fn advance(&mut self) {
        if self.position < self.tokens.len() {
            self.position += 1;
        }
    }

    fn expect(&mut self, expected: &TokenKind) -> ExpressionResult<()> {
        let token = self.current();
        if &token.kind == expected {
            self.advance();
            Ok(())
        } else {
            Err(ExpressionError::syntax(
                format!("expected {expected}, found {}", token.kind),
                token.offset,
            ))
        }
    }
}

/// Tokenize and parse a fragment body.
///
/// `base_offset` is the byte offset of `body` inside the enclosing text so
/// syntax errors point at the original source.
pub fn parse_fragment(body: &str, base_offset: usize) -> ExpressionResult<Expr> {
    let tokens = Lexer::new(body).with_base_offset(base_offset).tokenize()?;
    Parser::new(tokens).parse()
}
