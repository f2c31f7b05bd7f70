//! Prelude module for convenient imports
//!
//! This module re-exports the most commonly used types and traits of the crate.
//!
//! # Example
//!
//! ```rust,no_run
//! use flowgraph::prelude::*;
//!
//! # fn run_example() -> Result<()> {
//! let catalog_json = std::fs::read_to_string("path/to/catalog.json")?;
//! let mut platform = Platform::new("example");
//! platform.load_json(&catalog_json)?;
//!
//! let document = FlowGraphDocument::from_file("path/to/graph.json")?;
//! let mut graph = document.instantiate(&platform)?;
//! graph.ensure_valid()?;
//! # Ok(())
//! # }
//! ```

// Model
pub use crate::model::{
    Attr, Block, BlockBuilder, BlockCategory, Connection, Direction, ElementId, ElementKind,
    Endpoint, FlowGraph, GraphState, OptionSource, Param, ParamOption, PortInstance, PortKind,
};

// Expressions and evaluation
pub use crate::expr::{Expression, Value, ValueKind};
pub use crate::namespace::{Definition, Namespace};

// Catalog
pub use crate::platform::{
    BlockDefinition, CatalogDocument, IntoCatalog, ParamDefinition, Platform, PortDefinition,
    PortTypeRegistry,
};

// Documents
pub use crate::document::FlowGraphDocument;

// Validation
pub use crate::validation::{Diagnostic, DiagnosticFormatter, ValidationError};

// Error types
pub use crate::error::{
    BlockConstructionError, BlockRewriteError, CatalogError, ConnectionError, EvaluationError,
    GraphError, ParseError, SetupError,
};

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;
