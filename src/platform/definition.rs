use crate::error::SetupError;
use crate::expr::ValueKind;
use crate::model::{Attr, BlockBuilder, BlockCategory, OptionSource, PortKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Programmatic setup step run after the declared params and ports are added.
pub type SetupHook = Arc<dyn Fn(&mut BlockBuilder<'_>) -> Result<(), SetupError> + Send + Sync>;

/// The declaration of a constructible block kind.
///
/// Definitions are plain data and can be loaded from JSON. Anything that
/// cannot be expressed declaratively goes into the [`SetupHook`].
#[derive(Clone, Serialize, Deserialize)]
pub struct BlockDefinition {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: BlockCategory,
    #[serde(default)]
    pub params: Vec<ParamDefinition>,
    #[serde(default)]
    pub ports: Vec<PortDefinition>,
    #[serde(skip)]
    pub setup: Option<SetupHook>,
}

impl fmt::Debug for BlockDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockDefinition")
            .field("key", &self.key)
            .field("name", &self.name)
            .field("category", &self.category)
            .field("params", &self.params)
            .field("ports", &self.ports)
            .field("setup", &self.setup.is_some())
            .finish()
    }
}

impl BlockDefinition {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            category: BlockCategory::Regular,
            params: Vec::new(),
            ports: Vec::new(),
            setup: None,
        }
    }

    pub fn category(mut self, category: BlockCategory) -> Self {
        self.category = category;
        self
    }

    pub fn param(mut self, param: ParamDefinition) -> Self {
        self.params.push(param);
        self
    }

    pub fn port(mut self, port: PortDefinition) -> Self {
        self.ports.push(port);
        self
    }

    pub fn with_setup<F>(mut self, setup: F) -> Self
    where
        F: Fn(&mut BlockBuilder<'_>) -> Result<(), SetupError> + Send + Sync + 'static,
    {
        self.setup = Some(Arc::new(setup));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDefinition {
    pub key: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub kind: ValueKind,
    #[serde(default)]
    pub default: String,
    /// Turns the param into an enumerated one.
    #[serde(default)]
    pub options: Option<OptionSource>,
    #[serde(default)]
    pub allow_arbitrary: bool,
}

impl ParamDefinition {
    pub fn new(key: impl Into<String>, kind: ValueKind, default: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: String::new(),
            kind,
            default: default.into(),
            options: None,
            allow_arbitrary: false,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn options(mut self, source: OptionSource) -> Self {
        self.options = Some(source);
        self
    }

    pub fn allow_arbitrary(mut self) -> Self {
        self.allow_arbitrary = true;
        self
    }
}

fn default_vlen() -> Attr<usize> {
    Attr::Literal(1)
}

fn default_enabled() -> Attr<bool> {
    Attr::Literal(true)
}

fn default_multiplicity() -> Attr<usize> {
    Attr::Literal(1)
}

fn default_dtype() -> Attr<String> {
    Attr::Literal(String::new())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDefinition {
    pub key: String,
    #[serde(default)]
    pub name: String,
    /// `"sink"` or `"source"`; validated when the block is constructed.
    pub direction: String,
    #[serde(default)]
    pub kind: PortKind,
    #[serde(default = "default_dtype")]
    pub dtype: Attr<String>,
    #[serde(default = "default_vlen")]
    pub vlen: Attr<usize>,
    #[serde(default = "default_enabled")]
    pub enabled: Attr<bool>,
    #[serde(default = "default_multiplicity")]
    pub multiplicity: Attr<usize>,
    #[serde(default)]
    pub optional: bool,
}

impl PortDefinition {
    pub fn new(key: impl Into<String>, direction: impl Into<String>, kind: PortKind) -> Self {
        Self {
            key: key.into(),
            name: String::new(),
            direction: direction.into(),
            kind,
            dtype: default_dtype(),
            vlen: default_vlen(),
            enabled: default_enabled(),
            multiplicity: default_multiplicity(),
            optional: false,
        }
    }

    pub fn stream(
        key: impl Into<String>,
        direction: impl Into<String>,
        dtype: Attr<String>,
    ) -> Self {
        Self {
            dtype,
            ..Self::new(key, direction, PortKind::Stream)
        }
    }

    pub fn message(key: impl Into<String>, direction: impl Into<String>) -> Self {
        Self::new(key, direction, PortKind::Message)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn vlen(mut self, vlen: Attr<usize>) -> Self {
        self.vlen = vlen;
        self
    }

    pub fn enabled(mut self, enabled: Attr<bool>) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn multiplicity(mut self, multiplicity: Attr<usize>) -> Self {
        self.multiplicity = multiplicity;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_from_json() {
        let json = r#"{
            "key": "add_xx",
            "name": "Add",
            "params": [
                {"key": "type", "kind": "string", "default": "complex",
                 "options": [{"key": "complex", "name": "Complex"}, {"key": "float"}]},
                {"key": "num_inputs", "kind": "int", "default": "2"}
            ],
            "ports": [
                {"key": "in", "direction": "sink", "dtype": {"param": "type"},
                 "multiplicity": {"param": "num_inputs"}},
                {"key": "out", "direction": "source", "dtype": {"param": "type"}},
                {"key": "cmd", "direction": "sink", "kind": "message", "optional": true}
            ]
        }"#;
        let definition: BlockDefinition = serde_json::from_str(json).unwrap();

        assert_eq!(definition.category, BlockCategory::Regular);
        assert_eq!(definition.params[1].kind, ValueKind::Int);
        assert!(matches!(
            &definition.params[0].options,
            Some(OptionSource::Fixed(options)) if options.len() == 2
        ));
        assert_eq!(definition.ports[0].multiplicity, Attr::param("num_inputs"));
        assert_eq!(definition.ports[1].vlen, Attr::Literal(1));
        assert_eq!(definition.ports[2].kind, PortKind::Message);
        assert!(definition.setup.is_none());
    }

    #[test]
    fn test_expression_option_source() {
        let json = r#"{"key": "ch", "options": "range(4)"}"#;
        let param: ParamDefinition = serde_json::from_str(json).unwrap();
        assert_eq!(param.options, Some(OptionSource::Expression("range(4)".to_string())));
        assert_eq!(param.kind, ValueKind::Raw);
    }
}
