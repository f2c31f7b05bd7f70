use crate::error::EvaluationError;
use crate::expr::{Engine, Resolver, Value, ValueKind, parse};
use ahash::{AHashMap, AHashSet};
use log::trace;

/// Longest chain of lookups one resolution may trigger.
pub const MAX_RESOLVE_DEPTH: usize = 64;

/// How a namespace key obtains its value.
#[derive(Debug, Clone, PartialEq)]
pub enum Definition {
    /// A value known up front, e.g. the text of a string or id parameter.
    Literal(Value),
    /// Expression text evaluated on first lookup and coerced into `kind`.
    Expression { text: String, kind: ValueKind },
}

/// The shared evaluation context of a flow graph.
///
/// Keys are variable names (`samp_rate`) and block parameter paths
/// (`blk_0.freq`). Values are computed lazily on the first [`resolve`] and
/// cached until the next [`clear`]. A key that is looked up again while its
/// own definition is still being evaluated is reported as a
/// [`EvaluationError::CircularDependency`]; a chain of more than
/// [`MAX_RESOLVE_DEPTH`] nested lookups as [`EvaluationError::TooDeep`].
///
/// [`resolve`]: Namespace::resolve
/// [`clear`]: Namespace::clear
#[derive(Debug, Default)]
pub struct Namespace {
    definitions: AHashMap<String, Definition>,
    cache: AHashMap<String, Value>,
    pending: AHashSet<String>,
}

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers (or replaces) the definition of `key`, dropping any cached value.
    pub fn define(&mut self, key: impl Into<String>, definition: Definition) {
        let key = key.into();
        self.cache.remove(&key);
        self.definitions.insert(key, definition);
    }

    /// Forgets every definition, cached value and pending lookup.
    pub fn clear(&mut self) {
        self.definitions.clear();
        self.cache.clear();
        self.pending.clear();
    }

    pub fn is_defined(&self, key: &str) -> bool {
        self.definitions.contains_key(key)
    }

    /// Returns the cached value of `key` without evaluating anything.
    pub fn cached(&self, key: &str) -> Option<&Value> {
        self.cache.get(key)
    }

    /// All values computed since the last clear, sorted by key.
    pub fn values(&self) -> Vec<(&str, &Value)> {
        let mut values: Vec<_> = self
            .cache
            .iter()
            .map(|(k, v)| (k.as_str(), v))
            .collect();
        values.sort_by(|a, b| a.0.cmp(b.0));
        values
    }

    /// Resolves `key`, evaluating its definition on a cache miss.
    ///
    /// On failure the key is neither cached nor left pending.
    pub fn resolve(&mut self, key: &str) -> Result<Value, EvaluationError> {
        if let Some(value) = self.cache.get(key) {
            return Ok(value.clone());
        }
        if self.pending.contains(key) {
            return Err(EvaluationError::CircularDependency {
                key: key.to_string(),
            });
        }
        let definition = self
            .definitions
            .get(key)
            .cloned()
            .ok_or_else(|| EvaluationError::UnknownName(key.to_string()))?;
        if self.pending.len() >= MAX_RESOLVE_DEPTH {
            return Err(EvaluationError::TooDeep {
                key: key.to_string(),
                limit: MAX_RESOLVE_DEPTH,
            });
        }

        trace!("Resolving '{}'", key);
        self.pending.insert(key.to_string());
        let result = self.compute(&definition);
        self.pending.remove(key);

        let value = result?;
        self.cache.insert(key.to_string(), value.clone());
        Ok(value)
    }

    /// Evaluates free-standing expression text against the namespace.
    /// The result itself is not cached.
    pub fn evaluate(&mut self, text: &str) -> Result<Value, EvaluationError> {
        let expression = parse(text)?;
        Engine::new(self).evaluate(&expression)
    }

    fn compute(&mut self, definition: &Definition) -> Result<Value, EvaluationError> {
        match definition {
            Definition::Literal(value) => Ok(value.clone()),
            Definition::Expression { text, kind } => {
                let value = self.evaluate(text)?;
                kind.coerce(value)
            }
        }
    }
}

impl Resolver for Namespace {
    fn resolve(&mut self, name: &str) -> Result<Value, EvaluationError> {
        Namespace::resolve(self, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(text: &str) -> Definition {
        Definition::Expression {
            text: text.to_string(),
            kind: ValueKind::Raw,
        }
    }

    #[test]
    fn test_lazy_resolution_and_cache() {
        let mut ns = Namespace::new();
        ns.define("a", expr("b * 2"));
        ns.define("b", expr("21"));

        assert!(ns.cached("a").is_none());
        assert_eq!(ns.resolve("a"), Ok(Value::Int(42)));
        assert_eq!(ns.cached("b"), Some(&Value::Int(21)));
        assert_eq!(ns.values().len(), 2);
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let mut ns = Namespace::new();
        ns.define("a", expr("a + 1"));
        assert_eq!(
            ns.resolve("a"),
            Err(EvaluationError::CircularDependency {
                key: "a".to_string()
            })
        );
        assert!(ns.cached("a").is_none());
        assert!(ns.pending.is_empty());
    }

    #[test]
    fn test_kind_coercion() {
        let mut ns = Namespace::new();
        ns.define(
            "rate",
            Definition::Expression {
                text: "32000".to_string(),
                kind: ValueKind::Float,
            },
        );
        ns.define(
            "taps",
            Definition::Expression {
                text: "1.5".to_string(),
                kind: ValueKind::Int,
            },
        );
        assert_eq!(ns.resolve("rate"), Ok(Value::Float(32000.0)));
        assert!(matches!(
            ns.resolve("taps"),
            Err(EvaluationError::KindMismatch { .. })
        ));
    }

    #[test]
    fn test_redefine_drops_cache() {
        let mut ns = Namespace::new();
        ns.define("a", Definition::Literal(Value::Int(1)));
        assert_eq!(ns.resolve("a"), Ok(Value::Int(1)));
        ns.define("a", Definition::Literal(Value::Int(2)));
        assert_eq!(ns.resolve("a"), Ok(Value::Int(2)));
    }

    #[test]
    fn test_evaluate_is_not_cached() {
        let mut ns = Namespace::new();
        ns.define("a", expr("3"));
        assert_eq!(ns.evaluate("a * a"), Ok(Value::Int(9)));
        assert_eq!(ns.values().len(), 1);
        assert_eq!(
            ns.evaluate("zzz"),
            Err(EvaluationError::UnknownName("zzz".to_string()))
        );
    }

    #[test]
    fn test_long_lookup_chains_are_bounded() {
        let mut ns = Namespace::new();
        for i in 0..200 {
            ns.define(format!("x{}", i), expr(&format!("x{}", i + 1)));
        }
        ns.define("x200", expr("1"));

        assert!(matches!(
            ns.resolve("x0"),
            Err(EvaluationError::TooDeep { limit: MAX_RESOLVE_DEPTH, .. })
        ));
        assert!(ns.pending.is_empty());
        assert!(ns.cached("x0").is_none());

        // A chain within the limit still resolves.
        assert_eq!(ns.resolve("x150"), Ok(Value::Int(1)));
    }
}
