use super::conversion::IntoCatalog;
use super::definition::BlockDefinition;
use super::types::PortTypeRegistry;
use crate::error::{BlockConstructionError, CatalogError};
use crate::model::{ElementId, FlowGraph};
use crate::validation::is_identifier;
use ahash::{AHashMap, AHashSet};
use log::debug;

/// A catalog of block definitions plus the stream types they may use.
#[derive(Debug, Clone)]
pub struct Platform {
    pub name: String,
    pub website: String,
    pub version: String,
    blocks: AHashMap<String, BlockDefinition>,
    types: PortTypeRegistry,
}

impl Default for Platform {
    fn default() -> Self {
        Self::new("flowgraph")
    }
}

impl Platform {
    /// An empty catalog with the built-in stream types.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            website: String::new(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            blocks: AHashMap::new(),
            types: PortTypeRegistry::builtin(),
        }
    }

    pub fn with_website(mut self, website: impl Into<String>) -> Self {
        self.website = website.into();
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// The first two components of the version, e.g. `3.7` for `3.7.2`.
    pub fn version_short(&self) -> String {
        self.version.split('.').take(2).collect::<Vec<_>>().join(".")
    }

    /// Adds a definition. Keys must be identifiers and unique in the catalog.
    pub fn register(&mut self, definition: BlockDefinition) -> Result<(), CatalogError> {
        self.check_key(&definition.key)?;
        debug!("Registered block definition '{}'", definition.key);
        self.blocks.insert(definition.key.clone(), definition);
        Ok(())
    }

    /// Registers every type and block of a converted catalog. Returns the
    /// number of blocks added. Nothing is registered if any key is rejected.
    pub fn load(&mut self, catalog: impl IntoCatalog) -> Result<usize, CatalogError> {
        let document = catalog.into_catalog()?;

        let mut seen = AHashSet::new();
        for definition in &document.blocks {
            self.check_key(&definition.key)?;
            if !seen.insert(definition.key.as_str()) {
                return Err(CatalogError::DuplicateKey(definition.key.clone()));
            }
        }

        for declaration in &document.dtypes {
            let keys: Vec<&str> = declaration.keys.iter().map(String::as_str).collect();
            self.register_port_dtype(
                &declaration.dtype.name,
                declaration.dtype.sizeof,
                &declaration.dtype.color,
                &keys,
            );
        }
        let count = document.blocks.len();
        for definition in document.blocks {
            self.blocks.insert(definition.key.clone(), definition);
        }
        debug!("Loaded {} block definitions into '{}'", count, self.name);
        Ok(count)
    }

    pub fn load_json(&mut self, json: &str) -> Result<usize, CatalogError> {
        self.load(super::CatalogDocument::from_json(json)?)
    }

    fn check_key(&self, key: &str) -> Result<(), CatalogError> {
        if !is_identifier(key) {
            return Err(CatalogError::InvalidKey(key.to_string()));
        }
        if self.blocks.contains_key(key) {
            return Err(CatalogError::DuplicateKey(key.to_string()));
        }
        Ok(())
    }

    pub fn register_port_dtype(&mut self, name: &str, sizeof: usize, color: &str, keys: &[&str]) {
        self.types.register(name, sizeof, color, keys);
    }

    pub fn definition(&self, key: &str) -> Option<&BlockDefinition> {
        self.blocks.get(key)
    }

    /// Definition keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<_> = self.blocks.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    pub fn types(&self) -> &PortTypeRegistry {
        &self.types
    }

    /// An empty flow graph that checks stream types against this catalog.
    pub fn new_flow_graph(&self) -> FlowGraph {
        FlowGraph::with_types(self.types.clone())
    }

    /// Instantiates the definition registered under `key` inside `graph`.
    pub fn construct_block(
        &self,
        key: &str,
        graph: &mut FlowGraph,
    ) -> Result<ElementId, BlockConstructionError> {
        let definition = self
            .definition(key)
            .ok_or_else(|| BlockConstructionError::UnknownDefinition { key: key.to_string() })?;
        graph.add_block(definition)
    }
}
