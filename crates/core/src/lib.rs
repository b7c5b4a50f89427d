//! # Dentachart Core
//!
//! Charting and treatment-plan logic for the dental odontogram.
//!
//! - [`chart`]: persistent chart documents and their YAML/JSON form
//! - [`engine`]: applies catalog procedures, the eraser and cure to a chart
//! - [`findings`]: normalised findings and their stable keys
//! - [`evolution`]: cure semantics, evolution sessions and chart diffs
//! - [`sync`]: synchronises findings with plan items, budgets and plans
//! - [`repositories`]: repository contracts plus in-memory and file back-ends
//!
//! **No API concerns**: HTTP servers and command-line handling belong in `api-rest` and `cli`.
//! Chart editing is synchronous and performs no I/O; only [`sync::PlanSync`] crosses into
//! async repository calls.

pub mod chart;
pub mod config;
pub mod constants;
pub mod engine;
pub mod error;
pub mod evolution;
pub mod findings;
pub mod plan;
pub mod repositories;
pub mod sync;

pub use chart::{ChartDocument, FindingEntry, SurfaceMark, ToothState};
pub use config::{resolve_data_dir, CoreConfig};
pub use engine::{Applied, ApplyOutcome, EditingMode, NoOpReason, Target, Tool, ToolEngine};
pub use error::{DentalError, DentalResult, RepositoryError, RepositoryResult, SyncStep};
pub use evolution::{
    cure_tooth, diff, CureReport, EvolutionDiff, EvolutionSession, FindingChange, SurfaceCure,
};
pub use findings::{extract, summarise, Finding, FindingKey, FindingKeyError, FindingSummary};
pub use plan::{
    Budget, BudgetId, BudgetItem, BudgetItemId, BudgetStatus, NewBudgetItem, NewPlanItem,
    NewTreatmentPlan, PendingService, PlanId, PlanItemId, ServiceOffering, SnapshotId,
    TreatmentPlan, TreatmentPlanItem,
};
pub use repositories::{
    BudgetRepository, FileStore, InMemoryStore, ServiceCatalog, TreatmentPlanRepository,
};
pub use sync::{
    compile_notes, DropReason, DroppedService, PlanSync, SaveTreatmentPlan, SavedTreatmentPlan,
    SyncedPlanItems,
};

pub use dentachart_catalog::{ProcedureCatalog, ToothRegistry};
pub use dentachart_types::{MarkColor, PatientId, Surface, ToothNumber};
