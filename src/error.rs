use crate::expr::Value;
use crate::model::{Direction, ElementId};
use thiserror::Error;

/// Errors raised while turning parameter text into an expression tree.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Expression is empty")]
    Empty,

    #[error("Unexpected character '{ch}' at offset {offset}")]
    UnexpectedChar { ch: char, offset: usize },

    #[error("Unterminated string literal starting at offset {offset}")]
    UnterminatedString { offset: usize },

    #[error("Invalid numeric literal '{text}' at offset {offset}")]
    InvalidNumber { text: String, offset: usize },

    #[error("Unexpected token '{found}' at offset {offset}")]
    UnexpectedToken { found: String, offset: usize },

    #[error("Unexpected end of expression, expected {expected}")]
    UnexpectedEnd { expected: String },

    #[error("Expression nests deeper than {limit} levels (at offset {offset})")]
    TooDeep { offset: usize, limit: usize },
}

/// Errors that can occur while resolving a name or evaluating an expression
/// against the flow-graph namespace.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvaluationError {
    #[error("Failed to parse expression: {0}")]
    Parse(#[from] ParseError),

    #[error("Name '{0}' is not defined in the namespace")]
    UnknownName(String),

    #[error("Circular dependency detected while resolving '{key}'")]
    CircularDependency { key: String },

    #[error("Resolving '{key}' requires more than {limit} nested lookups")]
    TooDeep { key: String, limit: usize },

    #[error(
        "Type mismatch during operation '{operation}': expected {expected}, but found value '{found}'"
    )]
    TypeMismatch {
        operation: String,
        expected: String,
        found: Value,
    },

    #[error("Value '{found}' cannot be used as {expected}")]
    KindMismatch { expected: String, found: Value },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Integer overflow during operation '{operation}'")]
    Overflow { operation: String },

    #[error("Unknown function '{0}'")]
    UnknownFunction(String),

    #[error("Invalid arguments for '{function}': {message}")]
    InvalidArguments { function: String, message: String },
}

/// Construction-time errors, fatal to building the block that raised them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SetupError {
    #[error("{element} key '{key}' is not unique within the block")]
    DuplicateKey { element: &'static str, key: String },

    #[error("Unknown port direction '{direction}'")]
    InvalidDirection { direction: String },

    #[error("{element} key must not be empty")]
    EmptyKey { element: &'static str },

    #[error("Element tree rejected the declaration: {0}")]
    Tree(String),
}

/// Errors returned when a block cannot be instantiated in a flow graph.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BlockConstructionError {
    #[error("No block definition registered under key '{key}'")]
    UnknownDefinition { key: String },

    #[error("Failed to set up block '{key}': {error}")]
    Setup {
        key: String,
        #[source]
        error: SetupError,
    },
}

/// A port attribute binding that failed during a block rewrite. Recorded on the
/// block and surfaced through validation; sibling ports are still rewritten.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BlockRewriteError {
    #[error("Block '{block}': failed to resolve {attribute} of port '{port}': {message}")]
    Attribute {
        block: String,
        port: String,
        attribute: String,
        message: String,
    },

    #[error("Block '{block}': {direction} port key '{key}' is produced more than once")]
    DuplicatePortKey {
        block: String,
        direction: Direction,
        key: String,
    },
}

/// Errors rejected by `FlowGraph::make_connection`. The graph is left unchanged.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConnectionError {
    #[error("A connection needs one source and one sink, got {first} and {second}")]
    DirectionMismatch { first: Direction, second: Direction },

    #[error("Element {0} is not a block of this flow graph")]
    UnknownBlock(ElementId),

    #[error("Block '{block}' has no visible {direction} port '{port}'")]
    UnknownPort {
        block: String,
        direction: Direction,
        port: String,
    },

    #[error("Cannot connect a {output_kind} source to a {input_kind} sink")]
    KindMismatch {
        output_kind: String,
        input_kind: String,
    },

    #[error("Incompatible stream types: {output_type} -> {input_type}")]
    IncompatibleTypes {
        output_type: String,
        input_type: String,
    },

    #[error("Connection {output} -> {input} already exists")]
    Duplicate { output: String, input: String },
}

/// Errors raised while populating a block catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Block definition key '{0}' is already registered")]
    DuplicateKey(String),

    #[error("Block definition key '{0}' is not a valid identifier")]
    InvalidKey(String),

    #[error("Failed to parse catalog JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by flow-graph level operations.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("Element {0} does not exist in this flow graph")]
    UnknownElement(ElementId),

    #[error("Element {element} ({kind}) cannot be removed directly")]
    NotRemovable { element: ElementId, kind: String },

    #[error("Block '{block}' has no parameter '{key}'")]
    UnknownParam { block: String, key: String },

    #[error("No block with id '{0}'")]
    UnknownBlockId(String),

    #[error("Variable '{0}' is already defined")]
    DuplicateVariable(String),

    #[error("Variable '{0}' is not defined")]
    UnknownVariable(String),

    #[error("Flow graph is not valid ({count} issues):\n{report}")]
    Invalid { count: usize, report: String },

    #[error(transparent)]
    Evaluation(#[from] EvaluationError),

    #[error(transparent)]
    Construction(#[from] BlockConstructionError),

    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error(transparent)]
    Catalog(#[from] CatalogError),
}
