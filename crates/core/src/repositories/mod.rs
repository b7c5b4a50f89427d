//! Repository contracts and back-ends.
//!
//! The core talks to persistence only through the three traits below. Calls are async because
//! real back-ends cross a network or disk boundary; the core never retries them and never wraps
//! several of them in a transaction.

pub mod files;
mod ledger;
pub mod memory;

use crate::chart::ChartDocument;
use crate::error::RepositoryResult;
use crate::plan::{
    Budget, BudgetId, BudgetItem, BudgetItemId, BudgetStatus, NewBudgetItem, NewPlanItem,
    NewTreatmentPlan, PlanId, ServiceOffering, TreatmentPlan, TreatmentPlanItem,
};
use async_trait::async_trait;
use dentachart_types::PatientId;

pub use files::FileStore;
pub use memory::InMemoryStore;

#[async_trait]
pub trait TreatmentPlanRepository: Send + Sync {
    /// Plan items of a patient, each carrying the budget items of active budgets linked to it.
    async fn get_by_patient(&self, patient: PatientId) -> RepositoryResult<Vec<TreatmentPlanItem>>;

    async fn create_item(&self, item: NewPlanItem) -> RepositoryResult<TreatmentPlanItem>;

    /// Deletes one budget item, detaching its service from the finding.
    async fn remove_service_from_finding(&self, budget_item: BudgetItemId) -> RepositoryResult<()>;

    async fn create_plan(&self, plan: NewTreatmentPlan) -> RepositoryResult<TreatmentPlan>;

    async fn get_plan(&self, plan: PlanId) -> RepositoryResult<TreatmentPlan>;

    /// Replaces the plan's evolution chart. The previous evolution chart is discarded.
    async fn update_evolution(&self, plan: PlanId, chart: ChartDocument) -> RepositoryResult<()>;
}

#[async_trait]
pub trait BudgetRepository: Send + Sync {
    /// Most recently created budget still in `created` status.
    async fn find_draft_budget(&self, patient: PatientId) -> RepositoryResult<Option<Budget>>;

    async fn create_budget(&self, patient: PatientId, title: &str) -> RepositoryResult<Budget>;

    async fn add_items(
        &self,
        budget: BudgetId,
        items: Vec<NewBudgetItem>,
    ) -> RepositoryResult<Vec<BudgetItem>>;

    async fn set_status(&self, budget: BudgetId, status: BudgetStatus) -> RepositoryResult<()>;

    async fn get_budget(&self, budget: BudgetId) -> RepositoryResult<Budget>;
}

#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    async fn get_all(&self) -> RepositoryResult<Vec<ServiceOffering>>;
}

/// Services offered when no catalog has been configured.
pub fn default_services() -> Vec<ServiceOffering> {
    let service = |id: &str, name: &str, unit_price_cents: u64, category: &str| ServiceOffering {
        id: id.to_owned(),
        name: name.to_owned(),
        unit_price_cents,
        category: category.to_owned(),
    };

    vec![
        service("consulta", "Consulta y diagnóstico", 3_000, "diagnostic"),
        service("resina_simple", "Resina simple", 6_500, "restorative"),
        service("resina_compuesta", "Resina compuesta", 9_000, "restorative"),
        service("sellante", "Sellante de fosas y fisuras", 3_500, "preventive"),
        service("endodoncia_unirradicular", "Endodoncia unirradicular", 25_000, "endodontic"),
        service("endodoncia_multirradicular", "Endodoncia multirradicular", 38_000, "endodontic"),
        service("corona_metal_ceramica", "Corona metal-cerámica", 45_000, "prosthetic"),
        service("exodoncia_simple", "Exodoncia simple", 8_000, "surgical"),
        service("profilaxis", "Profilaxis", 4_000, "preventive"),
    ]
}
