use super::{Direction, ElementId};
use serde::Serialize;
use std::fmt;

/// One end of a connection: a visible port of a block.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Endpoint {
    pub block: ElementId,
    pub direction: Direction,
    pub port: String,
}

impl Endpoint {
    pub fn new(block: ElementId, direction: Direction, port: impl Into<String>) -> Self {
        Self {
            block,
            direction,
            port: port.into(),
        }
    }

    pub fn source(block: ElementId, port: impl Into<String>) -> Self {
        Self::new(block, Direction::Source, port)
    }

    pub fn sink(block: ElementId, port: impl Into<String>) -> Self {
        Self::new(block, Direction::Sink, port)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.block, self.direction, self.port)
    }
}

/// A directed edge from a source port to a sink port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Connection {
    pub element: ElementId,
    pub source: Endpoint,
    pub sink: Endpoint,
}

impl Connection {
    pub fn touches_block(&self, block: ElementId) -> bool {
        self.source.block == block || self.sink.block == block
    }

    pub fn touches(&self, endpoint: &Endpoint) -> bool {
        &self.source == endpoint || &self.sink == endpoint
    }

    pub fn links(&self, source: &Endpoint, sink: &Endpoint) -> bool {
        &self.source == source && &self.sink == sink
    }
}
