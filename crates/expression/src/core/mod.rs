//! Core types shared by the lexer, parser and evaluator

pub mod ast;
pub mod token;
