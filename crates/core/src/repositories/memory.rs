//! In-memory repository back-end.
//!
//! Holds every ledger and plan behind one mutex. Used by tests and by the REST server when
//! `DENTACHART_STORE=memory`; nothing survives a restart.

use super::ledger::PatientLedger;
use super::{default_services, BudgetRepository, ServiceCatalog, TreatmentPlanRepository};
use crate::chart::ChartDocument;
use crate::error::{RepositoryError, RepositoryResult};
use crate::plan::{
    Budget, BudgetId, BudgetItem, BudgetItemId, BudgetStatus, NewBudgetItem, NewPlanItem,
    NewTreatmentPlan, PlanId, ServiceOffering, TreatmentPlan, TreatmentPlanItem,
};
use async_trait::async_trait;
use chrono::Utc;
use dentachart_types::PatientId;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct MemoryState {
    ledgers: HashMap<PatientId, PatientLedger>,
    plans: HashMap<PlanId, TreatmentPlan>,
}

impl MemoryState {
    fn ledger_with_budget(&mut self, id: BudgetId) -> Option<&mut PatientLedger> {
        self.ledgers
            .values_mut()
            .find(|ledger| ledger.budget(id).is_some())
    }
}

#[derive(Debug)]
pub struct InMemoryStore {
    state: Mutex<MemoryState>,
    services: Vec<ServiceOffering>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::with_services(default_services())
    }

    pub fn with_services(services: Vec<ServiceOffering>) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            services,
        }
    }

    fn lock(&self) -> RepositoryResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| RepositoryError::Unavailable("in-memory store lock poisoned".into()))
    }

    /// Every budget held for a patient, in creation order.
    pub fn budgets_for(&self, patient: PatientId) -> RepositoryResult<Vec<Budget>> {
        Ok(self
            .lock()?
            .ledgers
            .get(&patient)
            .map(|ledger| ledger.budgets.clone())
            .unwrap_or_default())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn budget_not_found(id: BudgetId) -> RepositoryError {
    RepositoryError::NotFound {
        entity: "budget",
        id: id.to_string(),
    }
}

fn plan_not_found(id: PlanId) -> RepositoryError {
    RepositoryError::NotFound {
        entity: "treatment plan",
        id: id.to_string(),
    }
}

#[async_trait]
impl TreatmentPlanRepository for InMemoryStore {
    async fn get_by_patient(&self, patient: PatientId) -> RepositoryResult<Vec<TreatmentPlanItem>> {
        Ok(self
            .lock()?
            .ledgers
            .get(&patient)
            .map(PatientLedger::plan_items_view)
            .unwrap_or_default())
    }

    async fn create_item(&self, item: NewPlanItem) -> RepositoryResult<TreatmentPlanItem> {
        let mut state = self.lock()?;
        Ok(state.ledgers.entry(item.patient_id).or_default().push_item(item))
    }

    async fn remove_service_from_finding(&self, budget_item: BudgetItemId) -> RepositoryResult<()> {
        let mut state = self.lock()?;
        let removed = state
            .ledgers
            .values_mut()
            .any(|ledger| ledger.remove_budget_item(budget_item));
        if removed {
            Ok(())
        } else {
            Err(RepositoryError::NotFound {
                entity: "budget item",
                id: budget_item.to_string(),
            })
        }
    }

    async fn create_plan(&self, plan: NewTreatmentPlan) -> RepositoryResult<TreatmentPlan> {
        let now = Utc::now();
        let plan = TreatmentPlan {
            id: PlanId::new(),
            patient_id: plan.patient_id,
            title: plan.title,
            notes: plan.notes,
            chart: plan.chart,
            evolution: ChartDocument::new(),
            budget_id: plan.budget_id,
            created_at: now,
            updated_at: now,
        };
        self.lock()?.plans.insert(plan.id, plan.clone());
        Ok(plan)
    }

    async fn get_plan(&self, plan: PlanId) -> RepositoryResult<TreatmentPlan> {
        self.lock()?
            .plans
            .get(&plan)
            .cloned()
            .ok_or_else(|| plan_not_found(plan))
    }

    async fn update_evolution(&self, plan: PlanId, chart: ChartDocument) -> RepositoryResult<()> {
        let mut state = self.lock()?;
        let stored = state.plans.get_mut(&plan).ok_or_else(|| plan_not_found(plan))?;
        stored.evolution = chart;
        stored.updated_at = Utc::now();
        Ok(())
    }
}

#[async_trait]
impl BudgetRepository for InMemoryStore {
    async fn find_draft_budget(&self, patient: PatientId) -> RepositoryResult<Option<Budget>> {
        Ok(self
            .lock()?
            .ledgers
            .get(&patient)
            .and_then(|ledger| ledger.draft_budget().cloned()))
    }

    async fn create_budget(&self, patient: PatientId, title: &str) -> RepositoryResult<Budget> {
        let mut state = self.lock()?;
        Ok(state.ledgers.entry(patient).or_default().push_budget(patient, title))
    }

    async fn add_items(
        &self,
        budget: BudgetId,
        items: Vec<NewBudgetItem>,
    ) -> RepositoryResult<Vec<BudgetItem>> {
        let mut state = self.lock()?;
        state
            .ledger_with_budget(budget)
            .and_then(|ledger| ledger.add_items(budget, items))
            .ok_or_else(|| budget_not_found(budget))
    }

    async fn set_status(&self, budget: BudgetId, status: BudgetStatus) -> RepositoryResult<()> {
        let mut state = self.lock()?;
        let updated = state
            .ledger_with_budget(budget)
            .is_some_and(|ledger| ledger.set_status(budget, status));
        if updated {
            Ok(())
        } else {
            Err(budget_not_found(budget))
        }
    }

    async fn get_budget(&self, budget: BudgetId) -> RepositoryResult<Budget> {
        let mut state = self.lock()?;
        state
            .ledger_with_budget(budget)
            .and_then(|ledger| ledger.budget(budget).cloned())
            .ok_or_else(|| budget_not_found(budget))
    }
}

#[async_trait]
impl ServiceCatalog for InMemoryStore {
    async fn get_all(&self) -> RepositoryResult<Vec<ServiceOffering>> {
        Ok(self.services.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dentachart_types::{NonEmptyText, ToothNumber};

    fn new_item() -> NewPlanItem {
        NewPlanItem {
            patient_id: PatientId(3),
            snapshot_id: None,
            tooth_number: ToothNumber::new(36).unwrap(),
            finding_type: "endodoncia".into(),
            surface: None,
        }
    }

    #[tokio::test]
    async fn plan_items_are_scoped_per_patient() {
        let store = InMemoryStore::new();
        let created = store.create_item(new_item()).await.unwrap();

        let items = store.get_by_patient(PatientId(3)).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, created.id);
        assert!(store.get_by_patient(PatientId(4)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn budget_lifecycle_round_trip() {
        let store = InMemoryStore::new();
        let item = store.create_item(new_item()).await.unwrap();
        let budget = store.create_budget(PatientId(3), "Budget").await.unwrap();
        assert_eq!(
            store.find_draft_budget(PatientId(3)).await.unwrap().map(|b| b.id),
            Some(budget.id)
        );

        let added = store
            .add_items(
                budget.id,
                vec![NewBudgetItem {
                    finding_id: item.id,
                    service_id: "endodoncia_multirradicular".into(),
                    service_name: "Endodoncia multirradicular".into(),
                    unit_price_cents: 38_000,
                    quantity: 1,
                }],
            )
            .await
            .unwrap();
        store.set_status(budget.id, BudgetStatus::Active).await.unwrap();

        assert!(store.find_draft_budget(PatientId(3)).await.unwrap().is_none());
        let items = store.get_by_patient(PatientId(3)).await.unwrap();
        assert_eq!(items[0].budget_items, added);

        store.remove_service_from_finding(added[0].id).await.unwrap();
        assert!(store.get_by_patient(PatientId(3)).await.unwrap()[0]
            .budget_items
            .is_empty());
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .set_status(BudgetId::new(), BudgetStatus::Active)
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { entity: "budget", .. }));

        let err = store
            .remove_service_from_finding(BudgetItemId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));

        let err = store.get_plan(PlanId::new()).await.unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_evolution_replaces_previous_snapshot() {
        let store = InMemoryStore::new();
        let budget = store.create_budget(PatientId(3), "Budget").await.unwrap();
        let plan = store
            .create_plan(NewTreatmentPlan {
                patient_id: PatientId(3),
                title: NonEmptyText::new("Plan").unwrap(),
                notes: String::new(),
                chart: ChartDocument::new(),
                budget_id: budget.id,
            })
            .await
            .unwrap();
        assert!(plan.evolution.is_blank());

        let first = ChartDocument::new().with_specifications("first visit");
        let second = ChartDocument::new().with_specifications("second visit");
        store.update_evolution(plan.id, first).await.unwrap();
        store.update_evolution(plan.id, second.clone()).await.unwrap();

        let stored = store.get_plan(plan.id).await.unwrap();
        assert_eq!(stored.evolution, second);
    }
}
