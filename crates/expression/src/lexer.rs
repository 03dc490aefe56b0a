//! Lexer for tokenizing fragment bodies
//!
//! Converts the text between `${` and `}` into tokens. Nested fragments are
//! tokenized in place as `FragmentStart ... RightBrace`.

use crate::core::token::{Token, TokenKind};
use crate::error::{ExpressionError, ExpressionResult};

/// Lexer for tokenizing expression strings
pub struct Lexer<'a> {
    input: &'a str,
    position: usize,
    base_offset: usize,
}

impl<'a> Lexer<'a> {
    /// Create a new lexer from an input string
    pub fn new(input: &'a str) -> Self {
        Self {
            input,
            position: 0,
            base_offset: 0,
        }
    }

    /// Report offsets relative to an enclosing text instead of `input`.
    pub fn with_base_offset(mut self, base_offset: usize) -> Self {
        self.base_offset = base_offset;
        self
    }

    /// Tokenize the entire input string
    pub fn tokenize(&mut self) -> ExpressionResult<Vec<Token>> {
        let mut tokens = Vec::with_capacity((self.input.len() / 4).max(4));

        loop {
            let token = self.next_token()?;
            let done = token.kind == TokenKind::Eof;
            tokens.push(token);
            if done {
                break;
            }
        }

        Ok(tokens)
    }

    /// Get the next token from the input
    pub fn next_token(&mut self) -> ExpressionResult<Token> {
        self.skip_whitespace();

        let start = self.offset();

        let Some(ch) = self.current_char() else {
            return Ok(Token::new(TokenKind::Eof, start));
        };

        let kind = match ch {
            '$' if self.peek() == Some('{') => {
                self.advance();
                self.advance();
                TokenKind::FragmentStart
            }
            '}' => {
                self.advance();
                TokenKind::RightBrace
            }
            '(' => {
                self.advance();
                TokenKind::LeftParen
            }
            ')' => {
                self.advance();
                TokenKind::RightParen
            }
            '[' => {
                self.advance();
                TokenKind::LeftBracket
            }
            ']' => {
                self.advance();
                TokenKind::RightBracket
            }
            ',' => {
                self.advance();
                TokenKind::Comma
            }
            '.' => {
                self.advance();
                TokenKind::Dot
            }

            '"' | '\'' => self.read_string(ch)?,

            '-' if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                self.advance();
                self.read_number(true)?
            }
            ch if ch.is_ascii_digit() => self.read_number(false)?,

            ch if ch.is_alphabetic() || ch == '_' || ch == '$' => self.read_identifier(),

            _ => {
                return Err(ExpressionError::syntax(
                    format!("unexpected character '{ch}'"),
                    start,
                ));
            }
        };

        Ok(Token::new(kind, start))
    }

    fn offset(&self) -> usize {
        self.base_offset + self.position
    }

    fn current_char(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn peek(&self) -> Option<char> {
        let current = self.current_char()?;
        self.input[self.position + current.len_utf8()..].chars().next()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current_char() {
            self.position += ch.len_utf8();
        }
    }

    fn skip_whitespace(&mut self) {
        while self.current_char().is_some_and(char::is_whitespace) {
            self.advance();
        }
    }

    /// Read a quoted string literal, processing escapes
    fn read_string(&mut self, quote: char) -> ExpressionResult<TokenKind> {
        let start = self.offset();
        self.advance();

        let mut result = String::new();
        while let Some(ch) = self.current_char() {
            self.advance();
            if ch == quote {
                return Ok(TokenKind::String(result));
            }
            if ch == '\\' {
                let Some(escaped) = self.current_char() else {
                    break;
                };
                self.advance();
                result.push(match escaped {
                    'n' => '\n',
                    't' => '\t',
                    'r' => '\r',
                    other => other,
                });
            } else {
                result.push(ch);
            }
        }

        Err(ExpressionError::syntax("unterminated string literal", start))
    }

    /// Read an integer or float; the sign has already been consumed
    fn read_number(&mut self, negative: bool) -> ExpressionResult<TokenKind> {
        let start = self.offset();
        let start_pos = self.position;
        let mut is_float = false;

        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() {
                self.advance();
            } else if ch == '.' && !is_float && self.peek().is_some_and(|c| c.is_ascii_digit()) {
                is_float = true;
                self.advance();
            } else {
                break;
            }
        }

        let digits = &self.input[start_pos..self.position];
        let sign = if negative { -1.0 } else { 1.0 };
        if is_float {
            digits
                .parse::<f64>()
                .map(|f| TokenKind::Float(sign * f))
                .map_err(|_| ExpressionError::syntax("invalid float literal", start))
        } else {
            digits
                .parse::<i64>()
                .map(|i| TokenKind::Integer(if negative { -i } else { i }))
                .map_err(|_| ExpressionError::syntax("invalid integer literal", start))
        }
    }

    /// Read an identifier or keyword
    fn read_identifier(&mut self) -> TokenKind {
        let start_pos = self.position;
        while self
            .current_char()
            .is_some_and(|c| c.is_alphanumeric() || c == '_' || c == '$')
        {
            self.advance();
        }

        match &self.input[start_pos..self.position] {
            "true" => TokenKind::Boolean(true),
            "false" => TokenKind::Boolean(false),
            "null" => TokenKind::Null,
            name => TokenKind::Identifier(name.to_string()),
        }
    }
}
