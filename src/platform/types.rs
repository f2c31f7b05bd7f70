use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Data type key accepted on either side of any stream connection.
pub const WILDCARD: &str = "*";

/// A stream item type: display name, item size in bytes and colour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortDType {
    pub name: String,
    pub sizeof: usize,
    pub color: String,
}

/// Registry of stream data types. Several keys may name the same type
/// (`fc32` and `complex`).
#[derive(Debug, Clone, Default)]
pub struct PortTypeRegistry {
    types: Vec<PortDType>,
    keys: AHashMap<String, usize>,
}

impl PortTypeRegistry {
    /// An empty registry. Only the wildcard is accepted.
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in stream types.
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for (name, sizeof, color, keys) in [
            ("Complex Float 64", 16, "#CC8C69", &["fc64"][..]),
            ("Complex Float 32", 8, "#3399FF", &["fc32", "complex"][..]),
            ("Float 64", 8, "#66CCCC", &["f64"][..]),
            ("Float 32", 4, "#FF8C69", &["f32", "float"][..]),
            ("Complex Integer 64", 16, "#66CC00", &["sc64"][..]),
            ("Complex Integer 32", 8, "#33cc66", &["sc32"][..]),
            ("Complex Integer 16", 4, "#cccc00", &["sc16"][..]),
            ("Complex Integer 8", 2, "#cc00cc", &["sc8"][..]),
            ("Integer 64", 8, "#99FF33", &["s64"][..]),
            ("Integer 32", 4, "#00FF99", &["s32", "int"][..]),
            ("Integer 16", 2, "#FFFF66", &["s16", "short"][..]),
            ("Integer 8", 1, "#FF66FF", &["s8", "byte"][..]),
        ] {
            registry.register(name, sizeof, color, keys);
        }
        registry
    }

    /// Registers a type under every key in `keys`. Existing keys are rebound.
    pub fn register(&mut self, name: &str, sizeof: usize, color: &str, keys: &[&str]) {
        let index = self.types.len();
        self.types.push(PortDType {
            name: name.to_string(),
            sizeof,
            color: color.to_string(),
        });
        for key in keys {
            self.keys.insert(key.to_string(), index);
        }
    }

    pub fn get(&self, key: &str) -> Option<&PortDType> {
        self.keys.get(key).and_then(|&i| self.types.get(i))
    }

    /// Whether `key` is registered or the wildcard.
    pub fn is_known(&self, key: &str) -> bool {
        key == WILDCARD || self.keys.contains_key(key)
    }

    /// Registered keys, sorted.
    pub fn keys(&self) -> Vec<&str> {
        let mut keys: Vec<_> = self.keys.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Two stream types are compatible when they name the same type after
    /// alias resolution, or when either side is the wildcard or unresolved.
    pub fn compatible(&self, a: Option<&str>, b: Option<&str>) -> bool {
        match (a, b) {
            (None, _) | (_, None) => true,
            (Some(WILDCARD), _) | (_, Some(WILDCARD)) => true,
            (Some(a), Some(b)) => match (self.keys.get(a), self.keys.get(b)) {
                (Some(x), Some(y)) => x == y,
                _ => a == b,
            },
        }
    }

    /// Bytes per stream item: the type size times the vector length.
    pub fn item_size(&self, key: &str, vlen: usize) -> Option<usize> {
        self.get(key).map(|t| t.sizeof * vlen)
    }
}
