//! # flowgraph - Signal Flow-Graph Model and Rewrite Engine
//!
//! **flowgraph** models block-based signal-processing designs: blocks with typed
//! ports and user-editable parameter expressions, wired together by connections.
//! Parameter texts are evaluated against a shared namespace with circular
//! dependency detection, and the evaluated values drive the visible structure
//! of every block (number of ports, port types, optional ports).
//!
//! ## Core Workflow
//!
//! The model follows a strict two-phase discipline:
//!
//! 1.  **Describe Your Blocks**: Register `BlockDefinition`s on a `Platform`, either in
//!     code, from JSON, or from your own format through the `IntoCatalog` trait.
//! 2.  **Build a Graph**: Add variables and blocks to a `FlowGraph` and edit parameter texts.
//!     Every edit marks the graph dirty.
//! 3.  **Rewrite**: `FlowGraph::rewrite` re-evaluates every parameter and recomputes the
//!     visible ports of every block. Connections to ports that disappeared are severed.
//! 4.  **Validate**: `FlowGraph::validate` lazily yields diagnostics without changing anything.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use flowgraph::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let mut platform = Platform::new("demo");
//!     platform.register(
//!         BlockDefinition::new("add", "Add")
//!             .param(ParamDefinition::new("num_inputs", ValueKind::Int, "2"))
//!             .port(
//!                 PortDefinition::stream("in", "sink", Attr::Literal("float".to_string()))
//!                     .multiplicity(Attr::param("num_inputs")),
//!             )
//!             .port(PortDefinition::stream("out", "source", Attr::Literal("float".to_string()))),
//!     )?;
//!
//!     let mut graph = platform.new_flow_graph();
//!     graph.add_variable("n", "3")?;
//!     let add = graph.add_block_from(&platform, "add")?;
//!     graph.set_param(add, "num_inputs", "n")?;
//!     graph.rewrite()?;
//!
//!     let block = graph.block(add).ok_or("block vanished")?;
//!     for port in block.visible_ports(Direction::Sink) {
//!         println!("{} ({:?})", port.key, port.dtype);
//!     }
//!
//!     let diagnostics: Vec<Diagnostic> = graph.validate().collect();
//!     println!("{}", DiagnosticFormatter::format_report(&diagnostics));
//!     Ok(())
//! }
//! ```

pub mod document;
pub mod error;
pub mod expr;
pub mod model;
pub mod namespace;
pub mod platform;
pub mod prelude;
pub mod validation;
