//! Diagnostics collected by `FlowGraph::validate`.

mod formatter;

pub use formatter::DiagnosticFormatter;

use crate::error::{BlockRewriteError, EvaluationError};
use crate::model::{Direction, ElementId};
use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

static IDENTIFIER: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"^[A-Za-z_]\w*$").ok());

/// Names a block id must not take: expression keywords, builtins and names
/// reserved by generated code.
pub const RESERVED_IDENTIFIERS: &[&str] = &[
    "and", "or", "not", "in", "is", "if", "else", "for", "while", "def", "class", "return",
    "import", "from", "as", "lambda", "pass", "True", "False", "None", "true", "false", "null",
    "abs", "min", "max", "len", "int", "float", "str", "range", "self", "options", "gr", "blks2",
    "math", "numpy", "firdes", "wxgui", "qtgui", "pmt",
];

pub fn is_identifier(text: &str) -> bool {
    IDENTIFIER.as_ref().is_some_and(|re| re.is_match(text))
}

/// Checks the shape of a block id. Uniqueness is a flow-graph concern.
pub fn check_identifier(id: &str) -> Option<ValidationError> {
    if !is_identifier(id) {
        Some(ValidationError::InvalidIdentifier { id: id.to_string() })
    } else if RESERVED_IDENTIFIERS.contains(&id) {
        Some(ValidationError::ReservedIdentifier { id: id.to_string() })
    } else {
        None
    }
}

/// A problem found by validation. These are reported, never raised.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Flow graph has unapplied changes; rewrite it before validating")]
    NotRewritten,

    #[error("Param '{key}': {error}")]
    Evaluation { key: String, error: EvaluationError },

    #[error("Param '{key}' has not been evaluated")]
    NotEvaluated { key: String },

    #[error("Param '{key}': value '{value}' is not one of [{allowed}]")]
    InvalidOption {
        key: String,
        value: String,
        allowed: String,
    },

    #[error("ID '{id}' is not a valid identifier")]
    InvalidIdentifier { id: String },

    #[error("ID '{id}' is reserved")]
    ReservedIdentifier { id: String },

    #[error("ID '{id}' is not unique (also used by block {other})")]
    DuplicateId { id: String, other: ElementId },

    #[error(transparent)]
    Rewrite(#[from] BlockRewriteError),

    #[error("{direction} port '{port}' is not connected")]
    PortNotConnected { port: String, direction: Direction },

    #[error("Sink port '{port}' has {count} incoming connections")]
    TooManyConnections { port: String, count: usize },

    #[error("Port '{port}' has unknown type '{dtype}'")]
    UnknownPortType { port: String, dtype: String },

    #[error("Stream port '{port}' has no resolved type")]
    UnresolvedPortType { port: String },

    #[error("Connection joins a {source_kind} port to a {sink_kind} port")]
    KindMismatch { source_kind: String, sink_kind: String },

    #[error("Connection joins incompatible types {source_type} -> {sink_type}")]
    IncompatibleTypes { source_type: String, sink_type: String },

    #[error("Connection item sizes differ: {source_size} bytes -> {sink_size} bytes")]
    ItemSizeMismatch { source_size: usize, sink_size: usize },
}

/// A validation finding attached to the element it concerns.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub element: ElementId,
    /// Human readable position, e.g. `blk_0` or `blk_0 -> sink_0`.
    pub location: String,
    pub error: ValidationError,
}

impl Diagnostic {
    pub fn new(element: ElementId, location: impl Into<String>, error: ValidationError) -> Self {
        Self {
            element,
            location: location.into(),
            error,
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.error)
    }
}
