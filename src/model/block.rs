use super::param::{Param, ParamVariant};
use super::port::{Attr, Direction, ParamSnapshot, Port, PortInstance};
use super::{ElementId, ElementKind, ElementTree};
use crate::error::{BlockRewriteError, SetupError};
use crate::expr::{Value, ValueKind};
use crate::platform::{BlockDefinition, ParamDefinition, PortDefinition};
use ahash::AHashSet;
use indexmap::IndexMap;
use log::warn;
use serde::{Deserialize, Serialize};

/// Closed set of block flavours. The category decides which extra
/// parameters a block receives at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockCategory {
    #[default]
    Regular,
    /// Hierarchical block boundary, carries a `label`.
    Pad,
    /// Named stream endpoints that connect without a drawn edge.
    VirtualSource,
    VirtualSink,
}

/// Ports that stopped being visible during a block rewrite.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BlockRewrite {
    pub removed: Vec<(Direction, String)>,
}

/// An instance of a block definition inside a flow graph.
#[derive(Debug, Clone)]
pub struct Block {
    pub element: ElementId,
    pub class_key: String,
    pub name: String,
    pub category: BlockCategory,
    params: IndexMap<String, Param>,
    sinks: Vec<Port>,
    sources: Vec<Port>,
    visible_sinks: Vec<PortInstance>,
    visible_sources: Vec<PortInstance>,
    snapshot: ParamSnapshot,
    rewrite_errors: Vec<BlockRewriteError>,
}

impl Block {
    /// The raw text of the `id` parameter.
    pub fn id(&self) -> &str {
        self.params.get("id").map(|p| p.value.as_str()).unwrap_or_default()
    }

    /// The `alias` of a regular block, falling back to its id.
    pub fn alias(&self) -> &str {
        match self.params.get("alias") {
            Some(p) if !p.value.is_empty() => &p.value,
            _ => self.id(),
        }
    }

    /// A block is enabled unless `_enabled` evaluated to `False`.
    pub fn enabled(&self) -> bool {
        self.params
            .get("_enabled")
            .and_then(Param::evaluated)
            .is_none_or(|v| *v != Value::Bool(false))
    }

    pub fn param(&self, key: &str) -> Option<&Param> {
        self.params.get(key)
    }

    pub fn param_mut(&mut self, key: &str) -> Option<&mut Param> {
        self.params.get_mut(key)
    }

    /// Parameters in declaration order.
    pub fn params(&self) -> impl Iterator<Item = &Param> {
        self.params.values()
    }

    pub(crate) fn params_mut(&mut self) -> impl Iterator<Item = &mut Param> {
        self.params.values_mut()
    }

    pub fn raw_ports(&self, direction: Direction) -> &[Port] {
        match direction {
            Direction::Sink => &self.sinks,
            Direction::Source => &self.sources,
        }
    }

    pub fn visible_ports(&self, direction: Direction) -> &[PortInstance] {
        match direction {
            Direction::Sink => &self.visible_sinks,
            Direction::Source => &self.visible_sources,
        }
    }

    pub fn visible_port(&self, direction: Direction, key: &str) -> Option<&PortInstance> {
        self.visible_ports(direction).iter().find(|p| p.key == key)
    }

    pub fn snapshot(&self) -> &ParamSnapshot {
        &self.snapshot
    }

    pub fn rewrite_errors(&self) -> &[BlockRewriteError] {
        &self.rewrite_errors
    }

    /// Recomputes the visible ports from the raw ports and the evaluated
    /// parameters. Parameters must have been rewritten beforehand.
    pub fn rewrite(&mut self) -> BlockRewrite {
        self.snapshot = self
            .params
            .iter()
            .filter_map(|(k, p)| p.evaluated().map(|v| (k.clone(), v.clone())))
            .collect();
        self.rewrite_errors.clear();

        let mut removed = self.rewrite_direction(Direction::Sink);
        removed.extend(self.rewrite_direction(Direction::Source));
        BlockRewrite { removed }
    }

    fn rewrite_direction(&mut self, direction: Direction) -> Vec<(Direction, String)> {
        let block_id = self.id().to_string();
        let (raw, visible) = match direction {
            Direction::Sink => (&mut self.sinks, &mut self.visible_sinks),
            Direction::Source => (&mut self.sources, &mut self.visible_sources),
        };

        let previous: Vec<String> = visible.drain(..).map(|p| p.key).collect();
        let mut seen = AHashSet::new();

        for port in raw.iter_mut() {
            for failure in port.rewrite(&self.snapshot) {
                let error = BlockRewriteError::Attribute {
                    block: block_id.clone(),
                    port: port.key.clone(),
                    attribute: failure.attribute.to_string(),
                    message: failure.message,
                };
                warn!("{}", error);
                self.rewrite_errors.push(error);
            }
            for instance in port.instances() {
                if !seen.insert(instance.key.clone()) {
                    self.rewrite_errors.push(BlockRewriteError::DuplicatePortKey {
                        block: block_id.clone(),
                        direction,
                        key: instance.key,
                    });
                    continue;
                }
                visible.push(instance);
            }
        }

        previous
            .into_iter()
            .filter(|key| !seen.contains(key))
            .map(|key| (direction, key))
            .collect()
    }
}

/// The setup surface handed to a block definition while the block is built.
pub struct BlockBuilder<'t> {
    tree: &'t mut ElementTree,
    block: Block,
}

impl<'t> BlockBuilder<'t> {
    fn new(tree: &'t mut ElementTree, element: ElementId, definition: &BlockDefinition) -> Self {
        Self {
            tree,
            block: Block {
                element,
                class_key: definition.key.clone(),
                name: definition.name.clone(),
                category: definition.category,
                params: IndexMap::new(),
                sinks: Vec::new(),
                sources: Vec::new(),
                visible_sinks: Vec::new(),
                visible_sources: Vec::new(),
                snapshot: ParamSnapshot::new(),
                rewrite_errors: Vec::new(),
            },
        }
    }

    pub fn block(&self) -> &Block {
        &self.block
    }

    pub fn param_mut(&mut self, key: &str) -> Option<&mut Param> {
        self.block.params.get_mut(key)
    }

    pub fn add_param(&mut self, definition: ParamDefinition) -> Result<&mut Param, SetupError> {
        if definition.key.is_empty() {
            return Err(SetupError::EmptyKey { element: "param" });
        }
        if self.block.params.contains_key(&definition.key) {
            return Err(SetupError::DuplicateKey {
                element: "param",
                key: definition.key,
            });
        }
        let element = self.child(ElementKind::Param)?;
        let variant = match definition.options {
            Some(source) => ParamVariant::Options {
                source,
                options: Vec::new(),
                allow_arbitrary: definition.allow_arbitrary,
            },
            None if definition.kind == ValueKind::Id => ParamVariant::Id,
            None => ParamVariant::Plain,
        };
        let name = if definition.name.is_empty() {
            definition.key.clone()
        } else {
            definition.name
        };
        let param = Param::new(
            element,
            definition.key.clone(),
            name,
            definition.kind,
            definition.default,
        )
        .with_variant(variant);
        Ok(self.block.params.entry(definition.key).or_insert(param))
    }

    pub fn add_port(&mut self, definition: PortDefinition) -> Result<&mut Port, SetupError> {
        let direction: Direction = definition.direction.parse()?;
        if definition.key.is_empty() {
            return Err(SetupError::EmptyKey { element: "port" });
        }
        if self.block.raw_ports(direction).iter().any(|p| p.key == definition.key) {
            return Err(SetupError::DuplicateKey {
                element: "port",
                key: definition.key,
            });
        }
        let element = self.child(ElementKind::Port)?;
        let name = if definition.name.is_empty() {
            definition.key.clone()
        } else {
            definition.name
        };
        let mut port = Port::new(element, definition.key, name, definition.kind, direction);
        port.dtype = definition.dtype;
        port.vlen = definition.vlen;
        port.enabled = definition.enabled;
        port.multiplicity = definition.multiplicity;
        port.optional = definition.optional;

        let ports = match direction {
            Direction::Sink => &mut self.block.sinks,
            Direction::Source => &mut self.block.sources,
        };
        ports.push(port);
        ports.last_mut().ok_or_else(|| SetupError::Tree("port was not stored".to_string()))
    }

    pub fn add_stream_sink(
        &mut self,
        key: &str,
        dtype: Attr<String>,
    ) -> Result<&mut Port, SetupError> {
        self.add_port(PortDefinition::stream(key, "sink", dtype))
    }

    pub fn add_stream_source(
        &mut self,
        key: &str,
        dtype: Attr<String>,
    ) -> Result<&mut Port, SetupError> {
        self.add_port(PortDefinition::stream(key, "source", dtype))
    }

    pub fn add_message_sink(&mut self, key: &str) -> Result<&mut Port, SetupError> {
        self.add_port(PortDefinition::message(key, "sink"))
    }

    pub fn add_message_source(&mut self, key: &str) -> Result<&mut Port, SetupError> {
        self.add_port(PortDefinition::message(key, "source"))
    }

    fn child(&mut self, kind: ElementKind) -> Result<ElementId, SetupError> {
        self.tree
            .insert(kind, self.block.element)
            .ok_or_else(|| {
                SetupError::Tree(format!("block {} is not in the tree", self.block.element))
            })
    }

    fn finish(self) -> Block {
        self.block
    }
}

/// Builds a block under `parent`. On failure the partially built subtree is
/// removed again.
pub(crate) fn construct(
    tree: &mut ElementTree,
    parent: ElementId,
    definition: &BlockDefinition,
    default_id: String,
) -> Result<Block, SetupError> {
    let element = tree
        .insert(ElementKind::Block, parent)
        .ok_or_else(|| SetupError::Tree(format!("parent {} is not in the tree", parent)))?;

    let result = populate(BlockBuilder::new(tree, element, definition), definition, default_id);
    if result.is_err() {
        tree.remove(element);
    }
    result
}

fn populate(
    mut builder: BlockBuilder<'_>,
    definition: &BlockDefinition,
    default_id: String,
) -> Result<Block, SetupError> {
    builder.add_param(ParamDefinition::new("id", ValueKind::Id, default_id).named("ID"))?;
    builder.add_param(ParamDefinition::new("_enabled", ValueKind::Bool, "True").named("Enabled"))?;

    for param in &definition.params {
        builder.add_param(param.clone())?;
    }
    for port in &definition.ports {
        builder.add_port(port.clone())?;
    }
    if let Some(setup) = &definition.setup {
        setup(&mut builder)?;
    }

    match definition.category {
        BlockCategory::Regular => {
            builder.add_param(
                ParamDefinition::new("alias", ValueKind::String, "").named("Block Alias"),
            )?;
        }
        BlockCategory::Pad => {
            builder.add_param(ParamDefinition::new("label", ValueKind::String, "").named("Label"))?;
        }
        BlockCategory::VirtualSource | BlockCategory::VirtualSink => {
            builder.add_param(
                ParamDefinition::new("stream_id", ValueKind::String, "").named("Stream ID"),
            )?;
        }
    }

    let has_sources = !builder.block().sources.is_empty();
    let has_ports = has_sources || !builder.block().sinks.is_empty();
    if has_ports {
        builder.add_param(
            ParamDefinition::new("affinity", ValueKind::List, "[]").named("Core Affinity"),
        )?;
    }
    if has_sources {
        builder.add_param(
            ParamDefinition::new("minoutbuf", ValueKind::Int, "0").named("Min Output Buffer"),
        )?;
        builder.add_param(
            ParamDefinition::new("maxoutbuf", ValueKind::Int, "0").named("Max Output Buffer"),
        )?;
    }

    Ok(builder.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(definition: &BlockDefinition) -> Result<(ElementTree, Block), SetupError> {
        let mut tree = ElementTree::new();
        let root = tree.insert_root(ElementKind::FlowGraph);
        let block = construct(&mut tree, root, definition, format!("{}_0", definition.key))?;
        Ok((tree, block))
    }

    fn keys(block: &Block) -> Vec<&str> {
        block.params().map(|p| p.key.as_str()).collect()
    }

    #[test]
    fn test_default_params_in_order() {
        let definition = BlockDefinition::new("copy", "Copy")
            .param(ParamDefinition::new("type", ValueKind::String, "complex"))
            .port(PortDefinition::stream("in", "sink", Attr::param("type")))
            .port(PortDefinition::stream("out", "source", Attr::param("type")));
        let (_, block) = build(&definition).unwrap();

        assert_eq!(
            keys(&block),
            vec!["id", "_enabled", "type", "alias", "affinity", "minoutbuf", "maxoutbuf"]
        );
        assert_eq!(block.id(), "copy_0");
        assert_eq!(block.alias(), "copy_0");
    }

    #[test]
    fn test_sink_only_block_has_no_buffer_params() {
        let definition = BlockDefinition::new("null_sink", "Null Sink")
            .category(BlockCategory::Regular)
            .port(PortDefinition::stream("in", "sink", Attr::Literal("float".to_string())));
        let (_, block) = build(&definition).unwrap();
        assert_eq!(keys(&block), vec!["id", "_enabled", "alias", "affinity"]);
    }

    #[test]
    fn test_pad_and_virtual_params() {
        let pad = BlockDefinition::new("pad_source", "Pad Source").category(BlockCategory::Pad);
        let (_, block) = build(&pad).unwrap();
        assert!(block.param("label").is_some());
        assert!(block.param("alias").is_none());

        let virt = BlockDefinition::new("virtual_sink", "Virtual Sink")
            .category(BlockCategory::VirtualSink);
        let (_, block) = build(&virt).unwrap();
        assert!(block.param("stream_id").is_some());
    }

    #[test]
    fn test_setup_hook_adds_ports() {
        let definition = BlockDefinition::new("msg", "Message Debug").with_setup(|builder| {
            builder.add_message_sink("print")?;
            builder.add_message_sink("store")?.optional = true;
            Ok(())
        });
        let (_, block) = build(&definition).unwrap();
        assert_eq!(block.raw_ports(Direction::Sink).len(), 2);
        assert!(block.raw_ports(Direction::Sink)[1].optional);
    }

    #[test]
    fn test_duplicate_keys_are_fatal() {
        let definition = BlockDefinition::new("bad", "Bad")
            .param(ParamDefinition::new("gain", ValueKind::Float, "1"))
            .param(ParamDefinition::new("gain", ValueKind::Float, "2"));
        assert!(matches!(
            build(&definition),
            Err(SetupError::DuplicateKey { element: "param", .. })
        ));

        let definition = BlockDefinition::new("bad", "Bad")
            .port(PortDefinition::message("in", "sink"))
            .port(PortDefinition::message("in", "sink"));
        assert!(matches!(
            build(&definition),
            Err(SetupError::DuplicateKey { element: "port", .. })
        ));

        let definition = BlockDefinition::new("bad", "Bad")
            .param(ParamDefinition::new("id", ValueKind::Id, "x"));
        assert!(build(&definition).is_err());
    }

    #[test]
    fn test_invalid_direction_removes_subtree() {
        let definition = BlockDefinition::new("bad", "Bad")
            .param(ParamDefinition::new("gain", ValueKind::Float, "1"))
            .port(PortDefinition::message("in", "upward"));
        let mut tree = ElementTree::new();
        let root = tree.insert_root(ElementKind::FlowGraph);
        let result = construct(&mut tree, root, &definition, "bad_0".to_string());

        assert_eq!(
            result.err(),
            Some(SetupError::InvalidDirection {
                direction: "upward".to_string()
            })
        );
        assert!(tree.children(root).is_empty());
        assert_eq!(tree.len(), 1);
    }
}
