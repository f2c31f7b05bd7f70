//! The parameter expression language: lexing, parsing, and evaluation.

pub mod engine;
pub mod expression;
pub mod lexer;
pub mod parser;
pub mod value;

pub use engine::{Engine, Resolver};
pub use expression::{BinaryOp, Expression, UnaryOp};
pub use parser::parse;
pub use value::{Value, ValueKind};
