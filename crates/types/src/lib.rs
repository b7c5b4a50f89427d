//! # Dentachart Types
//!
//! Validated primitives shared by every dentachart crate.
//!
//! Each type here guarantees its invariant once constructed, so the catalog, the chart engine
//! and the persistence layers never re-check tooth codes, surface names or required text.

mod color;
mod patient;
mod surface;
mod text;
mod tooth;

pub use color::{ClinicalColor, MarkColor};
pub use patient::{PatientId, PatientIdError};
pub use surface::{Surface, SurfaceError};
pub use text::{NonEmptyText, TextError};
pub use tooth::{Dentition, ToothNumber, ToothNumberError};
