use super::definition::BlockDefinition;
use super::types::PortDType;
use crate::error::CatalogError;
use serde::{Deserialize, Serialize};

/// A trait for foreign block-description formats that can be turned into
/// block definitions.
///
/// This is the extension point for feeding a [`Platform`](super::Platform)
/// from any source. Implement it on the structs your own loader produces.
///
/// # Example
///
/// ```rust,no_run
/// use flowgraph::prelude::*;
/// use flowgraph::error::CatalogError;
///
/// struct MyBlock { key: String, label: String }
/// struct MyLibrary { blocks: Vec<MyBlock> }
///
/// impl IntoCatalog for MyLibrary {
///     fn into_catalog(self) -> std::result::Result<CatalogDocument, CatalogError> {
///         let blocks = self
///             .blocks
///             .into_iter()
///             .map(|b| BlockDefinition::new(b.key, b.label))
///             .collect();
///         Ok(CatalogDocument { blocks, ..Default::default() })
///     }
/// }
/// ```
pub trait IntoCatalog {
    /// Consumes the object and converts it into a catalog document.
    fn into_catalog(self) -> Result<CatalogDocument, CatalogError>;
}

/// Additional stream type declared by a catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DTypeDeclaration {
    #[serde(flatten)]
    pub dtype: PortDType,
    pub keys: Vec<String>,
}

/// The canonical, serializable form of a block catalog.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogDocument {
    #[serde(default)]
    pub blocks: Vec<BlockDefinition>,
    #[serde(default)]
    pub dtypes: Vec<DTypeDeclaration>,
}

impl CatalogDocument {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl IntoCatalog for CatalogDocument {
    fn into_catalog(self) -> Result<CatalogDocument, CatalogError> {
        Ok(self)
    }
}

impl IntoCatalog for Vec<BlockDefinition> {
    fn into_catalog(self) -> Result<CatalogDocument, CatalogError> {
        Ok(CatalogDocument {
            blocks: self,
            dtypes: Vec::new(),
        })
    }
}
