//! # Dentachart Catalog
//!
//! Static, immutable reference data for odontogram charting:
//! - the procedure catalog of findings, restorations and appliances a clinician can chart
//! - the tooth registry of anatomical tooth definitions in FDI numbering
//!
//! Nothing here has side effects. Lookups return `Option`; [`CatalogError`] exists for callers
//! that want to turn a missing entry into a propagated error.

pub mod procedure;
pub mod tooth;

pub use procedure::{ApplicationType, ProcedureCatalog, ProcedureCategory, ProcedureDefinition};
pub use tooth::{Arch, ToothClass, ToothDefinition, ToothRegistry};

/// Errors returned when a catalog reference cannot be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("unknown procedure '{0}'")]
    UnknownProcedure(String),
    #[error("unknown tooth {0}")]
    UnknownTooth(u8),
}

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown procedure category '{0}'")]
pub struct CategoryError(pub String);
