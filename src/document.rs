use crate::error::GraphError;
use crate::model::{Endpoint, FlowGraph};
use crate::platform::Platform;
use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};
use std::fs;

/// A block as stored in a flow-graph document.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct BlockRecord {
    /// Definition key in the platform catalog.
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Parameter texts that differ from the definition defaults.
    #[serde(default)]
    pub params: IndexMap<String, String>,
}

/// A connection as stored in a flow-graph document: `(block id, port key)` pairs.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ConnectionRecord {
    pub source: (String, String),
    pub sink: (String, String),
}

/// The plain data a loader hands to the model.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct FlowGraphDocument {
    #[serde(default)]
    pub variables: IndexMap<String, String>,
    #[serde(default)]
    pub blocks: Vec<BlockRecord>,
    #[serde(default)]
    pub connections: Vec<ConnectionRecord>,
}

impl FlowGraphDocument {
    /// Load a document from a JSON file.
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = fs::read_to_string(path)?;
        let document = serde_json::from_str(&content)?;
        Ok(document)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Builds a flow graph from the document.
    ///
    /// The graph is rewritten once before connecting, since connections
    /// attach to visible ports. A circular dependency does not abort loading;
    /// it is left for validation to report.
    pub fn instantiate(&self, platform: &Platform) -> Result<FlowGraph, GraphError> {
        let mut graph = platform.new_flow_graph();

        for (name, text) in &self.variables {
            graph.add_variable(name, text)?;
        }
        for record in &self.blocks {
            let element = graph.add_block_from(platform, &record.key)?;
            if let Some(id) = &record.id {
                graph.set_param(element, "id", id)?;
            }
            for (key, text) in &record.params {
                graph.set_param(element, key, text)?;
            }
        }

        if let Err(error) = graph.rewrite() {
            warn!("Flow graph loaded with unresolved parameters: {}", error);
        }

        for record in &self.connections {
            let source = Self::lookup(&graph, &record.source.0)?;
            let sink = Self::lookup(&graph, &record.sink.0)?;
            graph.make_connection(
                Endpoint::source(source, record.source.1.clone()),
                Endpoint::sink(sink, record.sink.1.clone()),
            )?;
        }

        Ok(graph)
    }

    /// Captures the current state of `graph`. Parameters still at their
    /// default text are omitted.
    pub fn from_graph(graph: &FlowGraph) -> Self {
        let variables = graph
            .variables()
            .map(|v| (v.key.clone(), v.value.clone()))
            .collect();

        let blocks = graph
            .blocks()
            .iter()
            .map(|block| BlockRecord {
                key: block.class_key.clone(),
                id: Some(block.id().to_string()),
                params: block
                    .params()
                    .filter(|p| p.key != "id" && p.value != p.default)
                    .map(|p| (p.key.clone(), p.value.clone()))
                    .collect(),
            })
            .collect();

        let label = |endpoint: &Endpoint| {
            let id = graph.block(endpoint.block).map(|b| b.id().to_string()).unwrap_or_default();
            (id, endpoint.port.clone())
        };
        let connections = graph
            .connections()
            .iter()
            .map(|c| ConnectionRecord {
                source: label(&c.source),
                sink: label(&c.sink),
            })
            .collect();

        Self {
            variables,
            blocks,
            connections,
        }
    }

    fn lookup(graph: &FlowGraph, id: &str) -> Result<crate::model::ElementId, GraphError> {
        graph
            .block_by_id(id)
            .map(|b| b.element)
            .ok_or_else(|| GraphError::UnknownBlockId(id.to_string()))
    }
}
