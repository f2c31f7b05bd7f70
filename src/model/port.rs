use super::ElementId;
use crate::error::SetupError;
use crate::expr::Value;
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Sink,
    Source,
}

impl Direction {
    pub fn name(&self) -> &'static str {
        match self {
            Direction::Sink => "sink",
            Direction::Source => "source",
        }
    }
}

impl FromStr for Direction {
    type Err = SetupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sink" | "in" => Ok(Direction::Sink),
            "source" | "out" => Ok(Direction::Source),
            other => Err(SetupError::InvalidDirection {
                direction: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortKind {
    #[default]
    Stream,
    Message,
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortKind::Stream => f.write_str("stream"),
            PortKind::Message => f.write_str("message"),
        }
    }
}

/// Evaluated parameters of a block, keyed by parameter key.
pub type ParamSnapshot = AHashMap<String, Value>;

/// A port attribute computed from the block's parameter snapshot.
pub type ComputeFn = Arc<dyn Fn(&ParamSnapshot) -> Result<Value, String> + Send + Sync>;

/// A port attribute that is either fixed or derived from block parameters.
#[derive(Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Attr<T> {
    Literal(T),
    /// Reads the evaluated value of a parameter of the owning block.
    Param { param: String },
    #[serde(skip)]
    Computed(ComputeFn),
}

impl<T> Attr<T> {
    pub fn param(key: impl Into<String>) -> Self {
        Attr::Param { param: key.into() }
    }

    pub fn computed<F>(f: F) -> Self
    where
        F: Fn(&ParamSnapshot) -> Result<Value, String> + Send + Sync + 'static,
    {
        Attr::Computed(Arc::new(f))
    }

    pub fn is_dynamic(&self) -> bool {
        !matches!(self, Attr::Literal(_))
    }
}

impl<T: fmt::Debug> fmt::Debug for Attr<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Attr::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            Attr::Param { param } => f.debug_struct("Param").field("param", param).finish(),
            Attr::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl<T: PartialEq> PartialEq for Attr<T> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Attr::Literal(a), Attr::Literal(b)) => a == b,
            (Attr::Param { param: a }, Attr::Param { param: b }) => a == b,
            (Attr::Computed(a), Attr::Computed(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

/// Conversion of an evaluated parameter value into a port attribute.
pub trait AttrValue: Sized + Clone {
    fn from_value(value: &Value) -> Result<Self, String>;
}

impl AttrValue for String {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Str(s) => Ok(s.clone()),
            other => Err(format!("expected a type name, found {} '{}'", other.kind_name(), other)),
        }
    }
}

impl AttrValue for usize {
    fn from_value(value: &Value) -> Result<Self, String> {
        value
            .as_i64()
            .and_then(|i| usize::try_from(i).ok())
            .ok_or_else(|| format!("expected a non-negative integer, found '{}'", value))
    }
}

impl AttrValue for bool {
    fn from_value(value: &Value) -> Result<Self, String> {
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Int(i) => Ok(*i != 0),
            other => Err(format!("expected a boolean, found '{}'", other)),
        }
    }
}

impl<T: AttrValue> Attr<T> {
    /// Resolves the attribute against the block's evaluated parameters.
    pub fn resolve(&self, snapshot: &ParamSnapshot) -> Result<T, String> {
        match self {
            Attr::Literal(v) => Ok(v.clone()),
            Attr::Param { param } => match snapshot.get(param) {
                Some(value) => T::from_value(value),
                None => Err(format!("parameter '{}' has no evaluated value", param)),
            },
            Attr::Computed(f) => T::from_value(&f(snapshot)?),
        }
    }
}

/// Last successfully resolved attribute values of a raw port.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedPort {
    pub dtype: Option<String>,
    pub vlen: usize,
    pub enabled: bool,
    pub multiplicity: usize,
}

/// A port attribute that failed to resolve during a rewrite.
#[derive(Debug, Clone, PartialEq)]
pub struct AttrFailure {
    pub attribute: &'static str,
    pub message: String,
}

/// A declared port of a block. The visible ports are derived from these.
#[derive(Debug, Clone)]
pub struct Port {
    pub element: ElementId,
    pub key: String,
    pub name: String,
    pub kind: PortKind,
    pub direction: Direction,
    pub dtype: Attr<String>,
    pub vlen: Attr<usize>,
    pub enabled: Attr<bool>,
    pub multiplicity: Attr<usize>,
    pub optional: bool,
    resolved: ResolvedPort,
}

impl Port {
    pub fn new(
        element: ElementId,
        key: impl Into<String>,
        name: impl Into<String>,
        kind: PortKind,
        direction: Direction,
    ) -> Self {
        Self {
            element,
            key: key.into(),
            name: name.into(),
            kind,
            direction,
            dtype: Attr::Literal(String::new()),
            vlen: Attr::Literal(1),
            enabled: Attr::Literal(true),
            multiplicity: Attr::Literal(1),
            optional: false,
            resolved: ResolvedPort {
                dtype: None,
                vlen: 1,
                enabled: true,
                multiplicity: 1,
            },
        }
    }

    pub fn resolved(&self) -> &ResolvedPort {
        &self.resolved
    }

    /// Resolves every attribute against `snapshot`. Attributes that fail keep
    /// their previous value and are returned.
    pub fn rewrite(&mut self, snapshot: &ParamSnapshot) -> Vec<AttrFailure> {
        let mut failures = Vec::new();
        let mut fail = |attribute: &'static str, message: String| {
            failures.push(AttrFailure { attribute, message });
        };

        match self.dtype.resolve(snapshot) {
            Ok(dtype) if dtype.is_empty() => self.resolved.dtype = None,
            Ok(dtype) => self.resolved.dtype = Some(dtype),
            Err(message) => fail("dtype", message),
        }
        match self.vlen.resolve(snapshot) {
            Ok(0) => fail("vlen", "vector length must be at least 1".to_string()),
            Ok(vlen) => self.resolved.vlen = vlen,
            Err(message) => fail("vlen", message),
        }
        match self.enabled.resolve(snapshot) {
            Ok(enabled) => self.resolved.enabled = enabled,
            Err(message) => fail("enabled", message),
        }
        match self.multiplicity.resolve(snapshot) {
            Ok(multiplicity) => self.resolved.multiplicity = multiplicity.max(1),
            Err(message) => fail("multiplicity", message),
        }

        failures
    }

    /// The visible instances this port currently contributes.
    pub fn instances(&self) -> Vec<PortInstance> {
        if !self.resolved.enabled {
            return Vec::new();
        }
        (0..self.resolved.multiplicity)
            .map(|index| PortInstance {
                key: clone_key(&self.key, index),
                name: if index == 0 {
                    self.name.clone()
                } else {
                    format!("{}{}", self.name, index)
                },
                kind: self.kind,
                direction: self.direction,
                dtype: self.resolved.dtype.clone(),
                vlen: self.resolved.vlen,
                optional: self.optional,
                raw_key: self.key.clone(),
                clone_index: index,
            })
            .collect()
    }
}

/// Key of the `index`-th instance of raw port `key`; the first instance keeps
/// the raw key.
pub fn clone_key(key: &str, index: usize) -> String {
    if index == 0 {
        key.to_string()
    } else {
        format!("{}_{}", key, index)
    }
}

/// A currently visible port: a raw port or one of its clones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortInstance {
    pub key: String,
    pub name: String,
    pub kind: PortKind,
    pub direction: Direction,
    pub dtype: Option<String>,
    pub vlen: usize,
    pub optional: bool,
    pub raw_key: String,
    pub clone_index: usize,
}

impl PortInstance {
    pub fn is_clone(&self) -> bool {
        self.clone_index > 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ElementKind, ElementTree};

    fn port() -> Port {
        let element = ElementTree::new().insert_root(ElementKind::Port);
        Port::new(element, "in", "in", PortKind::Stream, Direction::Sink)
    }

    #[test]
    fn test_direction_parsing() {
        assert_eq!("sink".parse::<Direction>(), Ok(Direction::Sink));
        assert_eq!("out".parse::<Direction>(), Ok(Direction::Source));
        assert_eq!(
            "sideways".parse::<Direction>(),
            Err(SetupError::InvalidDirection {
                direction: "sideways".to_string()
            })
        );
    }

    #[test]
    fn test_multiplicity_expands_into_clones() {
        let mut port = port();
        port.multiplicity = Attr::param("num_inputs");
        let mut snapshot = ParamSnapshot::new();
        snapshot.insert("num_inputs".to_string(), Value::Int(3));

        assert!(port.rewrite(&snapshot).is_empty());
        let keys: Vec<_> = port.instances().into_iter().map(|p| p.key).collect();
        assert_eq!(keys, vec!["in", "in_1", "in_2"]);
    }

    #[test]
    fn test_computed_attribute() {
        let mut port = port();
        port.vlen = Attr::computed(|params| {
            let n = params.get("taps").and_then(Value::as_i64).unwrap_or(1);
            Ok(Value::Int(n * 2))
        });
        let mut snapshot = ParamSnapshot::new();
        snapshot.insert("taps".to_string(), Value::Int(4));
        port.rewrite(&snapshot);
        assert_eq!(port.resolved().vlen, 8);
    }

    #[test]
    fn test_failed_binding_keeps_last_value() {
        let mut port = port();
        port.dtype = Attr::param("type");
        let mut snapshot = ParamSnapshot::new();
        snapshot.insert("type".to_string(), Value::Str("float".to_string()));
        port.rewrite(&snapshot);

        snapshot.insert("type".to_string(), Value::Int(7));
        let failures = port.rewrite(&snapshot);
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].attribute, "dtype");
        assert_eq!(port.resolved().dtype.as_deref(), Some("float"));
    }

    #[test]
    fn test_disabled_port_has_no_instances() {
        let mut port = port();
        port.enabled = Attr::Literal(false);
        port.rewrite(&ParamSnapshot::new());
        assert!(port.instances().is_empty());
    }

    #[test]
    fn test_attr_deserialization() {
        let literal: Attr<usize> = serde_json::from_str("2").unwrap();
        assert_eq!(literal, Attr::Literal(2));
        let bound: Attr<String> = serde_json::from_str(r#"{"param": "type"}"#).unwrap();
        assert_eq!(bound, Attr::param("type"));
    }
}
