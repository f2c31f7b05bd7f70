//! The in-memory flow-graph model.

pub mod block;
pub mod connection;
pub mod element;
pub mod flowgraph;
pub mod param;
pub mod port;

pub use block::{Block, BlockBuilder, BlockCategory, BlockRewrite};
pub use connection::{Connection, Endpoint};
pub use element::{ElementId, ElementKind, ElementTree};
pub use flowgraph::{FlowGraph, GraphState};
pub use param::{OptionSource, Param, ParamOption, ParamVariant};
pub use port::{
    Attr, AttrValue, ComputeFn, Direction, ParamSnapshot, Port, PortInstance, PortKind,
    ResolvedPort,
};
