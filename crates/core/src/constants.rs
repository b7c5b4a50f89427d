//! Constants used throughout the dentachart core crate.
//!
//! Path and filename constants live here so both repository back-ends and the binaries agree
//! on the on-disk layout.

/// Default directory for chart and plan storage when no explicit directory is configured.
pub const DEFAULT_DATA_DIR: &str = "dentachart_data";

/// Title given to a draft budget created during a treatment-plan save.
pub const DEFAULT_DRAFT_BUDGET_TITLE: &str = "Treatment plan budget";

/// Directory holding one sub-directory per patient.
pub const PATIENTS_DIR_NAME: &str = "patients";

/// Directory holding one YAML file per saved treatment plan.
pub const PLANS_DIR_NAME: &str = "plans";

/// Per-patient file with plan items and budgets.
pub const LEDGER_FILENAME: &str = "ledger.yaml";

/// Service catalog offered to budgets.
pub const SERVICES_FILENAME: &str = "services.yaml";
