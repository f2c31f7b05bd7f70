use super::block::{self, Block};
use super::connection::{Connection, Endpoint};
use super::param::Param;
use super::port::{Direction, PortInstance, PortKind};
use super::{ElementId, ElementKind, ElementTree};
use crate::error::{BlockConstructionError, ConnectionError, EvaluationError, GraphError};
use crate::expr::{Value, ValueKind};
use crate::namespace::Namespace;
use crate::platform::{BlockDefinition, Platform, PortTypeRegistry};
use crate::validation::{Diagnostic, DiagnosticFormatter, ValidationError};
use ahash::AHashSet;
use indexmap::IndexMap;
use log::{debug, warn};

/// Where a flow graph stands in the edit / rewrite / validate cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GraphState {
    /// Edited since the last rewrite.
    #[default]
    Dirty,
    Rewritten,
    /// Rewritten and free of diagnostics.
    Valid,
}

/// The root of the model: blocks, connections, variables and the namespace
/// they are evaluated in.
#[derive(Debug)]
pub struct FlowGraph {
    tree: ElementTree,
    root: ElementId,
    blocks: Vec<Block>,
    connections: Vec<Connection>,
    variables: IndexMap<String, Param>,
    namespace: Namespace,
    state: GraphState,
    types: PortTypeRegistry,
}

impl Default for FlowGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl FlowGraph {
    /// An empty flow graph using the built-in stream types.
    pub fn new() -> Self {
        Self::with_types(PortTypeRegistry::builtin())
    }

    pub fn with_types(types: PortTypeRegistry) -> Self {
        let mut tree = ElementTree::new();
        let root = tree.insert_root(ElementKind::FlowGraph);
        Self {
            tree,
            root,
            blocks: Vec::new(),
            connections: Vec::new(),
            variables: IndexMap::new(),
            namespace: Namespace::new(),
            state: GraphState::Dirty,
            types,
        }
    }

    // --- Accessors ---

    pub fn root(&self) -> ElementId {
        self.root
    }

    pub fn state(&self) -> GraphState {
        self.state
    }

    pub fn tree(&self) -> &ElementTree {
        &self.tree
    }

    pub fn types(&self) -> &PortTypeRegistry {
        &self.types
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, element: ElementId) -> Option<&Block> {
        self.blocks.iter().find(|b| b.element == element)
    }

    /// The first block whose `id` param has the given text.
    pub fn block_by_id(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id() == id)
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn connection(&self, element: ElementId) -> Option<&Connection> {
        self.connections.iter().find(|c| c.element == element)
    }

    /// Connections attached to `endpoint`.
    pub fn connections_of<'a>(
        &'a self,
        endpoint: &'a Endpoint,
    ) -> impl Iterator<Item = &'a Connection> + 'a {
        self.connections.iter().filter(move |c| c.touches(endpoint))
    }

    pub fn variables(&self) -> impl Iterator<Item = &Param> {
        self.variables.values()
    }

    pub fn variable(&self, name: &str) -> Option<&Param> {
        self.variables.get(name)
    }

    /// Evaluated value of a block parameter, if the last rewrite produced one.
    pub fn param_value(&self, block: ElementId, key: &str) -> Option<&Value> {
        self.block(block)?.param(key)?.evaluated()
    }

    /// Every namespace value computed by the last rewrite, sorted by key.
    pub fn namespace_values(&self) -> Vec<(&str, &Value)> {
        self.namespace.values()
    }

    // --- Mutation ---

    pub fn add_variable(&mut self, name: &str, text: &str) -> Result<ElementId, GraphError> {
        if self.variables.contains_key(name) {
            return Err(GraphError::DuplicateVariable(name.to_string()));
        }
        let element = self
            .tree
            .insert(ElementKind::Variable, self.root)
            .ok_or(GraphError::UnknownElement(self.root))?;
        let param = Param::new(element, name, name, ValueKind::Raw, text);
        self.variables.insert(name.to_string(), param);
        self.state = GraphState::Dirty;
        Ok(element)
    }

    pub fn set_variable(&mut self, name: &str, text: &str) -> Result<(), GraphError> {
        let variable = self
            .variables
            .get_mut(name)
            .ok_or_else(|| GraphError::UnknownVariable(name.to_string()))?;
        variable.value = text.to_string();
        self.state = GraphState::Dirty;
        Ok(())
    }

    /// Instantiates `definition` with the next free `{key}_{n}` id.
    pub fn add_block(
        &mut self,
        definition: &BlockDefinition,
    ) -> Result<ElementId, BlockConstructionError> {
        let default_id = self.next_block_id(&definition.key);
        let block = block::construct(&mut self.tree, self.root, definition, default_id)
            .map_err(|error| BlockConstructionError::Setup {
                key: definition.key.clone(),
                error,
            })?;
        debug!("Added block '{}' ({})", block.id(), definition.key);
        let element = block.element;
        self.blocks.push(block);
        self.state = GraphState::Dirty;
        Ok(element)
    }

    pub fn add_block_from(
        &mut self,
        platform: &Platform,
        key: &str,
    ) -> Result<ElementId, BlockConstructionError> {
        platform.construct_block(key, self)
    }

    /// Smallest `n` such that no block is called `{class_key}_{n}`.
    pub fn next_block_id(&self, class_key: &str) -> String {
        let taken: AHashSet<&str> = self.blocks.iter().map(Block::id).collect();
        (0..)
            .map(|n| format!("{}_{}", class_key, n))
            .find(|candidate| !taken.contains(candidate.as_str()))
            .unwrap_or_else(|| class_key.to_string())
    }

    /// Replaces the text of a block parameter.
    pub fn set_param(&mut self, block: ElementId, key: &str, text: &str) -> Result<(), GraphError> {
        let target = self
            .blocks
            .iter_mut()
            .find(|b| b.element == block)
            .ok_or(GraphError::UnknownElement(block))?;
        let block_id = target.id().to_string();
        let param = target.param_mut(key).ok_or_else(|| GraphError::UnknownParam {
            block: block_id,
            key: key.to_string(),
        })?;
        param.value = text.to_string();
        self.state = GraphState::Dirty;
        Ok(())
    }

    pub fn set_block_enabled(&mut self, block: ElementId, enabled: bool) -> Result<(), GraphError> {
        self.set_param(block, "_enabled", if enabled { "True" } else { "False" })
    }

    /// Connects two visible ports. The endpoints may be given in either order.
    pub fn make_connection(
        &mut self,
        a: Endpoint,
        b: Endpoint,
    ) -> Result<ElementId, ConnectionError> {
        if a.direction == b.direction {
            return Err(ConnectionError::DirectionMismatch {
                first: a.direction,
                second: b.direction,
            });
        }
        let (source, sink) = if a.direction == Direction::Source { (a, b) } else { (b, a) };

        let source_port = self.visible_port(&source)?;
        let sink_port = self.visible_port(&sink)?;

        if source_port.kind != sink_port.kind {
            return Err(ConnectionError::KindMismatch {
                output_kind: source_port.kind.to_string(),
                input_kind: sink_port.kind.to_string(),
            });
        }
        if source_port.kind == PortKind::Stream
            && !self.types.compatible(source_port.dtype.as_deref(), sink_port.dtype.as_deref())
        {
            return Err(ConnectionError::IncompatibleTypes {
                output_type: source_port.dtype.clone().unwrap_or_default(),
                input_type: sink_port.dtype.clone().unwrap_or_default(),
            });
        }
        if self.connections.iter().any(|c| c.links(&source, &sink)) {
            return Err(ConnectionError::Duplicate {
                output: self.endpoint_label(&source),
                input: self.endpoint_label(&sink),
            });
        }

        let element = self
            .tree
            .insert(ElementKind::Connection, self.root)
            .ok_or(ConnectionError::UnknownBlock(self.root))?;
        debug!("Connected {} -> {}", self.endpoint_label(&source), self.endpoint_label(&sink));
        self.connections.push(Connection { element, source, sink });
        self.state = GraphState::Dirty;
        Ok(element)
    }

    /// Removes blocks, connections and variables. A block takes its
    /// connections with it. Nothing is removed if any element is rejected.
    pub fn remove(&mut self, elements: &[ElementId]) -> Result<(), GraphError> {
        for &element in elements {
            let kind = self.tree.kind(element).ok_or(GraphError::UnknownElement(element))?;
            if !matches!(
                kind,
                ElementKind::Block | ElementKind::Connection | ElementKind::Variable
            ) {
                return Err(GraphError::NotRemovable {
                    element,
                    kind: kind.to_string(),
                });
            }
        }

        for &element in elements {
            match self.tree.kind(element) {
                Some(ElementKind::Block) => {
                    let attached: Vec<ElementId> = self
                        .connections
                        .iter()
                        .filter(|c| c.touches_block(element))
                        .map(|c| c.element)
                        .collect();
                    self.remove_connections(&attached);
                    self.blocks.retain(|b| b.element != element);
                }
                Some(ElementKind::Connection) => self.remove_connections(&[element]),
                Some(ElementKind::Variable) => self.variables.retain(|_, v| v.element != element),
                // Already removed together with an earlier element of the batch.
                _ => continue,
            }
            self.tree.remove(element);
        }
        self.state = GraphState::Dirty;
        Ok(())
    }

    // --- Rewrite / validate ---

    /// Re-evaluates every parameter and recomputes every block's visible
    /// ports. Connections to ports that disappeared are severed.
    ///
    /// Returns the first circular dependency found. The pass still completes
    /// for everything else but the graph stays [`GraphState::Dirty`].
    pub fn rewrite(&mut self) -> Result<(), EvaluationError> {
        debug!(
            "Rewriting flow graph: {} blocks, {} variables, {} connections",
            self.blocks.len(),
            self.variables.len(),
            self.connections.len()
        );

        self.namespace.clear();
        for (name, variable) in &self.variables {
            self.namespace.define(name.clone(), variable.definition());
        }
        for block in &self.blocks {
            let id = block.id();
            for param in block.params() {
                self.namespace.define(format!("{}.{}", id, param.key), param.definition());
            }
        }

        let mut cycle = None;
        let mut note = |error: EvaluationError, key: &str| {
            debug!("Failed to evaluate '{}': {}", key, error);
            if cycle.is_none() && matches!(error, EvaluationError::CircularDependency { .. }) {
                cycle = Some(error);
            }
        };

        let namespace = &mut self.namespace;
        for (name, variable) in self.variables.iter_mut() {
            if let Err(error) = variable.rewrite(namespace, name) {
                note(error, name.as_str());
            }
        }
        for block in self.blocks.iter_mut() {
            let id = block.id().to_string();
            for param in block.params_mut() {
                let key = format!("{}.{}", id, param.key);
                if let Err(error) = param.rewrite(namespace, &key) {
                    note(error, key.as_str());
                }
            }
        }

        let mut removed = Vec::new();
        for block in self.blocks.iter_mut() {
            for (direction, port) in block.rewrite().removed {
                removed.push(Endpoint::new(block.element, direction, port));
            }
        }
        self.sever(&removed);

        match cycle {
            Some(error) => {
                self.state = GraphState::Dirty;
                Err(error)
            }
            None => {
                self.state = GraphState::Rewritten;
                Ok(())
            }
        }
    }

    /// Lazily yields every diagnostic of the graph. Never rewrites.
    pub fn validate(&self) -> impl Iterator<Item = Diagnostic> + '_ {
        let stale = (self.state == GraphState::Dirty)
            .then(|| Diagnostic::new(self.root, "flow graph", ValidationError::NotRewritten));

        stale
            .into_iter()
            .chain(self.variables.values().flat_map(|variable| {
                variable
                    .validate()
                    .into_iter()
                    .map(move |error| {
                        Diagnostic::new(
                            variable.element,
                            format!("variable {}", variable.key),
                            error,
                        )
                    })
            }))
            .chain(self.blocks.iter().flat_map(move |block| self.validate_block(block)))
            .chain(self.connections.iter().flat_map(move |c| self.validate_connection(c)))
    }

    /// Rewrites if needed and marks the graph [`GraphState::Valid`] when no
    /// diagnostics remain.
    pub fn ensure_valid(&mut self) -> Result<(), GraphError> {
        if self.state == GraphState::Valid {
            return Ok(());
        }
        if self.state == GraphState::Dirty {
            self.rewrite()?;
        }
        let diagnostics: Vec<Diagnostic> = self.validate().collect();
        if diagnostics.is_empty() {
            self.state = GraphState::Valid;
            return Ok(());
        }
        Err(GraphError::Invalid {
            count: diagnostics.len(),
            report: DiagnosticFormatter::format_report(&diagnostics),
        })
    }

    /// Evaluates free-standing expression text against the current namespace.
    pub fn evaluate(&mut self, text: &str) -> Result<Value, EvaluationError> {
        self.namespace.evaluate(text)
    }

    /// A short human readable name for any element of the graph.
    pub fn describe(&self, element: ElementId) -> Option<String> {
        let kind = self.tree.kind(element)?;
        let owner = || {
            self.tree
                .ancestor_of_kind(element, ElementKind::Block)
                .and_then(|b| self.block(b))
        };
        let description = match kind {
            ElementKind::FlowGraph => "flow graph".to_string(),
            ElementKind::Block => format!("block {}", self.block(element)?.id()),
            ElementKind::Param => {
                let block = owner()?;
                let param = block.params().find(|p| p.element == element)?;
                format!("param {}.{}", block.id(), param.key)
            }
            ElementKind::Port => {
                let block = owner()?;
                let port = [Direction::Sink, Direction::Source]
                    .into_iter()
                    .flat_map(|d| block.raw_ports(d))
                    .find(|p| p.element == element)?;
                format!("{} port {}:{}", port.direction, block.id(), port.key)
            }
            ElementKind::Variable => {
                let variable = self.variables().find(|v| v.element == element)?;
                format!("variable {}", variable.key)
            }
            ElementKind::Connection => {
                let connection = self.connection(element)?;
                format!(
                    "connection {} -> {}",
                    self.endpoint_label(&connection.source),
                    self.endpoint_label(&connection.sink)
                )
            }
        };
        Some(description)
    }

    // --- Internals ---

    fn visible_port(&self, endpoint: &Endpoint) -> Result<&PortInstance, ConnectionError> {
        let block = self
            .block(endpoint.block)
            .ok_or(ConnectionError::UnknownBlock(endpoint.block))?;
        block
            .visible_port(endpoint.direction, &endpoint.port)
            .ok_or_else(|| ConnectionError::UnknownPort {
                block: block.id().to_string(),
                direction: endpoint.direction,
                port: endpoint.port.clone(),
            })
    }

    fn endpoint_label(&self, endpoint: &Endpoint) -> String {
        match self.block(endpoint.block) {
            Some(block) => format!("{}:{}", block.id(), endpoint.port),
            None => endpoint.to_string(),
        }
    }

    fn remove_connections(&mut self, elements: &[ElementId]) {
        self.connections.retain(|c| !elements.contains(&c.element));
        for &element in elements {
            self.tree.remove(element);
        }
    }

    fn sever(&mut self, endpoints: &[Endpoint]) {
        if endpoints.is_empty() {
            return;
        }
        let severed: Vec<ElementId> = self
            .connections
            .iter()
            .filter(|c| endpoints.iter().any(|e| c.touches(e)))
            .map(|c| c.element)
            .collect();
        for &element in &severed {
            if let Some(label) = self.describe(element) {
                warn!("Severed {}: port is no longer visible", label);
            }
        }
        self.remove_connections(&severed);
    }

    fn active_connection_count(&self, endpoint: &Endpoint) -> usize {
        self.connections_of(endpoint)
            .filter(|c| {
                let other = if c.source == *endpoint { &c.sink } else { &c.source };
                self.block(other.block).is_some_and(Block::enabled)
            })
            .count()
    }

    fn validate_block(&self, block: &Block) -> Vec<Diagnostic> {
        let location = block.id().to_string();
        let mut diagnostics = Vec::new();

        for param in block.params() {
            for error in param.validate() {
                diagnostics.push(Diagnostic::new(param.element, location.clone(), error));
            }
        }
        if let Some(other) = self
            .blocks
            .iter()
            .find(|b| b.element != block.element && b.id() == block.id())
        {
            diagnostics.push(Diagnostic::new(
                block.element,
                location.clone(),
                ValidationError::DuplicateId {
                    id: location.clone(),
                    other: other.element,
                },
            ));
        }
        for error in block.rewrite_errors() {
            diagnostics.push(Diagnostic::new(
                block.element,
                location.clone(),
                error.clone().into(),
            ));
        }

        if !block.enabled() {
            return diagnostics;
        }

        for direction in [Direction::Sink, Direction::Source] {
            for port in block.visible_ports(direction) {
                let port_location = format!("{}:{}", location, port.key);
                if port.kind == PortKind::Stream {
                    match &port.dtype {
                        None => diagnostics.push(Diagnostic::new(
                            block.element,
                            port_location.clone(),
                            ValidationError::UnresolvedPortType { port: port.key.clone() },
                        )),
                        Some(dtype) if !self.types.is_known(dtype) => {
                            diagnostics.push(Diagnostic::new(
                                block.element,
                                port_location.clone(),
                                ValidationError::UnknownPortType {
                                    port: port.key.clone(),
                                    dtype: dtype.clone(),
                                },
                            ))
                        }
                        Some(_) => {}
                    }
                }

                let endpoint = Endpoint::new(block.element, direction, port.key.clone());
                let count = self.active_connection_count(&endpoint);
                if count == 0 && !port.optional {
                    diagnostics.push(Diagnostic::new(
                        block.element,
                        port_location,
                        ValidationError::PortNotConnected {
                            port: port.key.clone(),
                            direction,
                        },
                    ));
                } else if count > 1
                    && direction == Direction::Sink
                    && port.kind == PortKind::Stream
                {
                    diagnostics.push(Diagnostic::new(
                        block.element,
                        port_location,
                        ValidationError::TooManyConnections {
                            port: port.key.clone(),
                            count,
                        },
                    ));
                }
            }
        }

        diagnostics
    }

    fn validate_connection(&self, connection: &Connection) -> Vec<Diagnostic> {
        let (Some(source_block), Some(sink_block)) =
            (self.block(connection.source.block), self.block(connection.sink.block))
        else {
            return Vec::new();
        };
        if !source_block.enabled() || !sink_block.enabled() {
            return Vec::new();
        }
        let (Some(source), Some(sink)) = (
            source_block.visible_port(Direction::Source, &connection.source.port),
            sink_block.visible_port(Direction::Sink, &connection.sink.port),
        ) else {
            return Vec::new();
        };

        let location = format!(
            "{} -> {}",
            self.endpoint_label(&connection.source),
            self.endpoint_label(&connection.sink)
        );
        let error = if source.kind != sink.kind {
            Some(ValidationError::KindMismatch {
                source_kind: source.kind.to_string(),
                sink_kind: sink.kind.to_string(),
            })
        } else if source.kind == PortKind::Message {
            None
        } else if !self.types.compatible(source.dtype.as_deref(), sink.dtype.as_deref()) {
            Some(ValidationError::IncompatibleTypes {
                source_type: source.dtype.clone().unwrap_or_default(),
                sink_type: sink.dtype.clone().unwrap_or_default(),
            })
        } else {
            let size = |p: &PortInstance| {
                p.dtype
                    .as_deref()
                    .and_then(|d| self.types.item_size(d, p.vlen))
            };
            match (size(source), size(sink)) {
                (Some(source_size), Some(sink_size)) if source_size != sink_size => {
                    Some(ValidationError::ItemSizeMismatch { source_size, sink_size })
                }
                _ => None,
            }
        };

        error
            .map(|e| vec![Diagnostic::new(connection.element, location, e)])
            .unwrap_or_default()
    }
}
