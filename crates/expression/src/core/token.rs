//! Token types for the expression lexer
//!
//! This module defines all tokens that can appear inside a `${...}` fragment.

use std::fmt;

/// A token with the byte offset where it starts
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// The token kind
    pub kind: TokenKind,
    /// Byte offset of the first character
    pub offset: usize,
}

impl Token {
    /// Create a new token
    pub fn new(kind: TokenKind, offset: usize) -> Self {
        Self { kind, offset }
    }
}

/// The kind of token
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    // Literals
    /// Integer literal (e.g., 42, -10)
    Integer(i64),
    /// Float literal (e.g., 3.14, -2.5)
    Float(f64),
    /// String literal (e.g., "hello", 'world')
    String(String),
    /// Boolean literal (true, false)
    Boolean(bool),
    /// Null literal
    Null,

    /// Identifier (variable root, property or function name)
    Identifier(String),

    // Delimiters
    /// `.`
    Dot,
    /// `,`
    Comma,
    /// `(`
    LeftParen,
    /// `)`
    RightParen,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `${` opening a nested fragment
    FragmentStart,
    /// `}` closing a nested fragment
    RightBrace,

    /// End of input
    Eof,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(n) => write!(f, "{n}"),
            Self::String(s) => write!(f, "'{s}'"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Null => f.write_str("null"),
            Self::Identifier(name) => f.write_str(name),
            Self::Dot => f.write_str("'.'"),
            Self::Comma => f.write_str("','"),
            Self::LeftParen => f.write_str("'('"),
            Self::RightParen => f.write_str("')'"),
            Self::LeftBracket => f.write_str("'['"),
            Self::RightBracket => f.write_str("']'"),
            Self::FragmentStart => f.write_str("'${'"),
            Self::RightBrace => f.write_str("'}'"),
            Self::Eof => f.write_str("end of input"),
        }
    }
}
