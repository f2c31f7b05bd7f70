use super::ElementId;
use crate::error::EvaluationError;
use crate::expr::{Value, ValueKind};
use crate::namespace::{Definition, Namespace};
use crate::validation::{ValidationError, check_identifier};
use itertools::Itertools;
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry of an enumerated parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamOption {
    pub key: String,
    #[serde(default)]
    pub name: String,
    /// Free-form attributes carried by the option, e.g. an item size.
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl ParamOption {
    pub fn new(key: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            name: name.into(),
            extra: BTreeMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }

    pub fn display_name(&self) -> &str {
        if self.name.is_empty() { &self.key } else { &self.name }
    }
}

/// Where an enumerated parameter takes its options from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionSource {
    Fixed(Vec<ParamOption>),
    /// Expression evaluated every rewrite; each list item becomes an option.
    Expression(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParamVariant {
    Plain,
    /// The block identifier.
    Id,
    Options {
        source: OptionSource,
        /// Concrete options built by the last rewrite.
        options: Vec<ParamOption>,
        allow_arbitrary: bool,
    },
}

/// A named, typed, textual value attached to a block (or a flow-graph variable).
#[derive(Debug, Clone)]
pub struct Param {
    pub element: ElementId,
    pub key: String,
    pub name: String,
    pub kind: ValueKind,
    /// The raw, user-edited text.
    pub value: String,
    pub default: String,
    pub variant: ParamVariant,
    evaluated: Option<Value>,
    error: Option<EvaluationError>,
}

impl Param {
    pub fn new(
        element: ElementId,
        key: impl Into<String>,
        name: impl Into<String>,
        kind: ValueKind,
        default: impl Into<String>,
    ) -> Self {
        let default = default.into();
        Self {
            element,
            key: key.into(),
            name: name.into(),
            kind,
            value: default.clone(),
            default,
            variant: ParamVariant::Plain,
            evaluated: None,
            error: None,
        }
    }

    pub fn with_variant(mut self, variant: ParamVariant) -> Self {
        self.variant = variant;
        self
    }

    /// The evaluated value, present only when the last rewrite succeeded.
    pub fn evaluated(&self) -> Option<&Value> {
        self.evaluated.as_ref()
    }

    pub fn error(&self) -> Option<&EvaluationError> {
        self.error.as_ref()
    }

    pub fn is_valid(&self) -> bool {
        self.evaluated.is_some()
    }

    /// Options built by the last rewrite. Empty for non-enumerated params.
    pub fn options(&self) -> &[ParamOption] {
        match &self.variant {
            ParamVariant::Options { options, .. } => options,
            _ => &[],
        }
    }

    /// The option key this parameter selects: the text for literal kinds,
    /// otherwise the evaluated value rendered the way option lists are.
    pub fn option_key(&self) -> Option<String> {
        if self.kind.is_literal() {
            return Some(self.value.clone());
        }
        self.evaluated.as_ref().map(Value::to_string)
    }

    /// The option matching [`Param::option_key`], if any.
    pub fn selected_option(&self) -> Option<&ParamOption> {
        let key = self.option_key()?;
        self.options().iter().find(|o| o.key == key)
    }

    /// How the namespace computes this parameter.
    pub fn definition(&self) -> Definition {
        if self.kind.is_literal() {
            return Definition::Literal(Value::Str(self.value.clone()));
        }
        if self.kind == ValueKind::Raw && self.value.trim().is_empty() {
            return Definition::Literal(Value::Null);
        }
        Definition::Expression {
            text: self.value.clone(),
            kind: self.kind,
        }
    }

    /// Clears the cached evaluation state.
    pub fn invalidate(&mut self) {
        self.evaluated = None;
        self.error = None;
    }

    /// Recomputes the option set and the evaluated value through `namespace`,
    /// where this parameter is registered under `ns_key`.
    pub fn rewrite(
        &mut self,
        namespace: &mut Namespace,
        ns_key: &str,
    ) -> Result<(), EvaluationError> {
        self.invalidate();

        if let ParamVariant::Options {
            source: OptionSource::Expression(text),
            options,
            ..
        } = &mut self.variant
        {
            match namespace.evaluate(text) {
                Ok(Value::List(items)) => {
                    *options = items
                        .iter()
                        .map(|item| ParamOption::new(item.to_string(), item.to_string()))
                        .collect();
                }
                Ok(other) => {
                    options.clear();
                    let error = EvaluationError::KindMismatch {
                        expected: "list".to_string(),
                        found: other,
                    };
                    self.error = Some(error.clone());
                    return Err(error);
                }
                Err(error) => {
                    options.clear();
                    self.error = Some(error.clone());
                    return Err(error);
                }
            }
        } else if let ParamVariant::Options {
            source: OptionSource::Fixed(fixed),
            options,
            ..
        } = &mut self.variant
        {
            options.clone_from(fixed);
        }

        match namespace.resolve(ns_key) {
            Ok(value) => {
                trace!("{} = {}", ns_key, value);
                self.evaluated = Some(value);
                Ok(())
            }
            Err(error) => {
                self.error = Some(error.clone());
                Err(error)
            }
        }
    }

    /// Parameter-local checks. Id uniqueness is checked by the flow graph.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        match (&self.evaluated, &self.error) {
            (_, Some(error)) => errors.push(ValidationError::Evaluation {
                key: self.key.clone(),
                error: error.clone(),
            }),
            (None, None) => errors.push(ValidationError::NotEvaluated {
                key: self.key.clone(),
            }),
            _ => {}
        }

        match &self.variant {
            ParamVariant::Plain => {}
            ParamVariant::Id => errors.extend(check_identifier(&self.value)),
            ParamVariant::Options {
                options,
                allow_arbitrary,
                ..
            } if !allow_arbitrary && self.error.is_none() => {
                if let Some(selected) = self.option_key()
                    && !options.iter().any(|o| o.key == selected)
                {
                    errors.push(ValidationError::InvalidOption {
                        key: self.key.clone(),
                        value: selected,
                        allowed: options.iter().map(|o| &o.key).join(", "),
                    });
                }
            }
            ParamVariant::Options { .. } => {}
        }

        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ElementKind, ElementTree};

    fn element() -> ElementId {
        ElementTree::new().insert_root(ElementKind::Param)
    }

    fn rewrite(param: &mut Param, namespace: &mut Namespace) -> Result<(), EvaluationError> {
        namespace.define(param.key.clone(), param.definition());
        let key = param.key.clone();
        param.rewrite(namespace, &key)
    }

    #[test]
    fn test_literal_kinds_are_not_evaluated() {
        let mut ns = Namespace::new();
        let mut param = Param::new(element(), "label", "Label", ValueKind::String, "a + b");
        rewrite(&mut param, &mut ns).unwrap();
        assert_eq!(param.evaluated(), Some(&Value::Str("a + b".to_string())));
        assert!(param.validate().is_empty());
    }

    #[test]
    fn test_failed_evaluation_is_reported() {
        let mut ns = Namespace::new();
        let mut param = Param::new(element(), "gain", "Gain", ValueKind::Float, "missing * 2");
        assert!(rewrite(&mut param, &mut ns).is_err());
        assert!(param.evaluated().is_none());
        assert!(matches!(
            param.validate().as_slice(),
            [ValidationError::Evaluation { .. }]
        ));
    }

    #[test]
    fn test_options_from_expression() {
        let mut ns = Namespace::new();
        ns.define(
            "n",
            Definition::Expression {
                text: "3".to_string(),
                kind: ValueKind::Int,
            },
        );
        let mut param = Param::new(element(), "mode", "Mode", ValueKind::Int, "5").with_variant(
            ParamVariant::Options {
                source: OptionSource::Expression("range(n)".to_string()),
                options: Vec::new(),
                allow_arbitrary: false,
            },
        );
        rewrite(&mut param, &mut ns).unwrap();
        let keys: Vec<_> = param.options().iter().map(|o| o.key.as_str()).collect();
        assert_eq!(keys, vec!["0", "1", "2"]);
        assert!(matches!(
            param.validate().as_slice(),
            [ValidationError::InvalidOption { .. }]
        ));

        param.value = "1".to_string();
        rewrite(&mut param, &mut ns).unwrap();
        assert!(param.validate().is_empty());

        // The evaluated value selects the option, not the text.
        param.value = "n - 1".to_string();
        rewrite(&mut param, &mut ns).unwrap();
        assert!(param.validate().is_empty());
        assert_eq!(param.selected_option().map(|o| o.key.as_str()), Some("2"));
    }

    #[test]
    fn test_arbitrary_option_values() {
        let mut ns = Namespace::new();
        let mut param = Param::new(element(), "type", "Type", ValueKind::String, "custom")
            .with_variant(ParamVariant::Options {
                source: OptionSource::Fixed(vec![ParamOption::new("complex", "Complex")]),
                options: Vec::new(),
                allow_arbitrary: true,
            });
        rewrite(&mut param, &mut ns).unwrap();
        assert!(param.validate().is_empty());
        assert!(param.selected_option().is_none());
    }

    #[test]
    fn test_id_validation() {
        let mut ns = Namespace::new();
        let mut param = Param::new(element(), "id", "ID", ValueKind::Id, "1abc")
            .with_variant(ParamVariant::Id);
        rewrite(&mut param, &mut ns).unwrap();
        assert!(matches!(
            param.validate().as_slice(),
            [ValidationError::InvalidIdentifier { .. }]
        ));
    }
}
