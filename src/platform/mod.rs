//! Block catalogs: definitions, stream types and the platform that holds them.

pub mod catalog;
pub mod conversion;
pub mod definition;
pub mod types;

pub use catalog::Platform;
pub use conversion::{CatalogDocument, DTypeDeclaration, IntoCatalog};
pub use definition::{BlockDefinition, ParamDefinition, PortDefinition, SetupHook};
pub use types::{PortDType, PortTypeRegistry, WILDCARD};
