use dentachart_catalog::CatalogError;
use std::fmt;
use std::path::PathBuf;

/// Repository call made during synchronisation or plan maintenance.
///
/// Failures are reported per step so the caller can tell how far a save got; steps that
/// already succeeded are not rolled back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStep {
    LoadPlanItems,
    CreatePlanItem,
    FindDraftBudget,
    CreateBudget,
    LoadServices,
    AddBudgetItems,
    ActivateBudget,
    LoadBudget,
    CreatePlan,
    LoadPlan,
    UpdateEvolution,
    RemoveService,
}

impl fmt::Display for SyncStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SyncStep::LoadPlanItems => "loading treatment plan items",
            SyncStep::CreatePlanItem => "creating treatment plan item",
            SyncStep::FindDraftBudget => "finding draft budget",
            SyncStep::CreateBudget => "creating draft budget",
            SyncStep::LoadServices => "loading service catalog",
            SyncStep::AddBudgetItems => "adding budget items",
            SyncStep::ActivateBudget => "activating budget",
            SyncStep::LoadBudget => "loading budget",
            SyncStep::CreatePlan => "creating treatment plan",
            SyncStep::LoadPlan => "loading treatment plan",
            SyncStep::UpdateEvolution => "updating evolution chart",
            SyncStep::RemoveService => "removing service from finding",
        };
        f.write_str(name)
    }
}

/// Errors raised by repository implementations.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("repository unavailable: {0}")]
    Unavailable(String),
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },
    #[error("failed to read {path}: {source}", path = path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}", path = path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to serialize YAML: {0}")]
    YamlSerialization(serde_yaml::Error),
    #[error("invalid YAML in {path}: {message}", path = path.display())]
    YamlDeserialization { path: PathBuf, message: String },
}

pub type RepositoryResult<T> = std::result::Result<T, RepositoryError>;

#[derive(Debug, thiserror::Error)]
pub enum DentalError {
    /// Input rejected before any side effect took place.
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to prepare data directory {path}: {source}", path = path.display())]
    DataDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{step} failed: {source}")]
    Step {
        step: SyncStep,
        #[source]
        source: RepositoryError,
    },
    #[error("chart document schema mismatch at {path}: {message}")]
    ChartSchema { path: String, message: String },
    #[error("failed to serialize chart document: {0}")]
    ChartSerialization(String),
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

impl DentalError {
    /// Builds a `map_err` adapter that tags a repository failure with its step.
    pub fn at(step: SyncStep) -> impl FnOnce(RepositoryError) -> DentalError {
        move |source| DentalError::Step { step, source }
    }
}

pub type DentalResult<T> = std::result::Result<T, DentalError>;
