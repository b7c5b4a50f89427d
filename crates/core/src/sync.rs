//! Treatment-plan synchronisation.
//!
//! [`PlanSync`] turns a frozen chart snapshot into persisted plan items and, on a full save,
//! into a finalised budget and a plan header. The steps are independent repository calls with
//! no transaction around them:
//!
//! 1. extract findings from the chart
//! 2. reuse the plan item stored for each finding key, or create one
//! 3. return every current finding's plan item, keyed by finding key
//! 4. find the patient's latest draft budget, or create one
//! 5. link each pending service to its finding's plan item as a budget item
//! 6. activate the budget
//! 7. persist the plan header with compiled notes and the chart snapshot
//!
//! Steps 1 to 3 are idempotent for an unchanged set of findings. Steps 4 to 6 are not: two
//! concurrent saves can each create a draft budget, and nothing here detects that. A failing
//! step is reported with [`DentalError::Step`]; earlier steps are not rolled back.

use crate::chart::ChartDocument;
use crate::config::CoreConfig;
use crate::engine::ToolEngine;
use crate::error::{DentalError, DentalResult, SyncStep};
use crate::evolution::EvolutionSession;
use crate::findings::{extract, Finding, FindingKey};
use crate::plan::{
    Budget, BudgetItem, BudgetItemId, BudgetStatus, NewBudgetItem, NewPlanItem, NewTreatmentPlan,
    PendingService, PlanId, ServiceOffering, SnapshotId, TreatmentPlan, TreatmentPlanItem,
};
use crate::repositories::{BudgetRepository, ServiceCatalog, TreatmentPlanRepository};
use dentachart_catalog::ProcedureCatalog;
use dentachart_types::{NonEmptyText, PatientId};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Plan items for the current findings, in extraction order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncedPlanItems {
    items: Vec<(FindingKey, TreatmentPlanItem)>,
    created: usize,
}

impl SyncedPlanItems {
    pub fn get(&self, key: &FindingKey) -> Option<&TreatmentPlanItem> {
        self.items
            .iter()
            .find(|(candidate, _)| candidate == key)
            .map(|(_, item)| item)
    }

    pub fn items(&self) -> impl Iterator<Item = &TreatmentPlanItem> {
        self.items.iter().map(|(_, item)| item)
    }

    pub fn keys(&self) -> impl Iterator<Item = &FindingKey> {
        self.items.iter().map(|(key, _)| key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// How many of the items were created by this call rather than reused.
    pub fn created(&self) -> usize {
        self.created
    }

    pub fn into_items(self) -> Vec<TreatmentPlanItem> {
        self.items.into_iter().map(|(_, item)| item).collect()
    }
}

/// Input of a full treatment-plan save.
#[derive(Debug, Clone)]
pub struct SaveTreatmentPlan {
    pub patient_id: PatientId,
    pub snapshot_id: Option<SnapshotId>,
    pub title: String,
    /// Clinician's free text, appended after the generated finding lines.
    pub notes: String,
    pub chart: ChartDocument,
    pub services: Vec<PendingService>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// No plan item exists for the finding key; the chart and the assignment disagree.
    UnknownFinding,
    UnknownService,
}

/// A pending service that was not turned into a budget item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedService {
    pub finding: FindingKey,
    pub service_id: String,
    pub reason: DropReason,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SavedTreatmentPlan {
    pub plan: TreatmentPlan,
    pub budget: Budget,
    pub plan_items: SyncedPlanItems,
    pub budget_items: Vec<BudgetItem>,
    pub dropped: Vec<DroppedService>,
}

/// Builds the notes stored on a plan: one line per finding, then the free text.
pub fn compile_notes(findings: &[Finding], catalog: &ProcedureCatalog, free_text: &str) -> String {
    let mut notes = String::new();
    for finding in findings {
        let name = catalog
            .by_id(&finding.finding_type)
            .map(|p| p.name)
            .unwrap_or(finding.finding_type.as_str());
        let line = match finding.surface {
            Some(surface) => format!("Tooth {} ({}): {}\n", finding.tooth_number, surface, name),
            None => format!("Tooth {}: {}\n", finding.tooth_number, name),
        };
        notes.push_str(&line);
    }

    let free_text = free_text.trim();
    if !free_text.is_empty() {
        if !notes.is_empty() {
            notes.push('\n');
        }
        notes.push_str(free_text);
        notes.push('\n');
    }
    notes
}

/// Synchronises charts with plan items, budgets and plans.
#[derive(Clone)]
pub struct PlanSync {
    cfg: Arc<CoreConfig>,
    catalog: ProcedureCatalog,
    plans: Arc<dyn TreatmentPlanRepository>,
    budgets: Arc<dyn BudgetRepository>,
    services: Arc<dyn ServiceCatalog>,
}

impl PlanSync {
    pub fn new(
        cfg: Arc<CoreConfig>,
        plans: Arc<dyn TreatmentPlanRepository>,
        budgets: Arc<dyn BudgetRepository>,
        services: Arc<dyn ServiceCatalog>,
    ) -> Self {
        Self {
            cfg,
            catalog: ProcedureCatalog::standard(),
            plans,
            budgets,
            services,
        }
    }

    /// Uses one store for all three contracts.
    pub fn with_store<S>(cfg: Arc<CoreConfig>, store: Arc<S>) -> Self
    where
        S: TreatmentPlanRepository + BudgetRepository + ServiceCatalog + 'static,
    {
        Self::new(cfg, store.clone(), store.clone(), store)
    }

    pub fn catalog(&self) -> &ProcedureCatalog {
        &self.catalog
    }

    pub async fn plan_items(&self, patient: PatientId) -> DentalResult<Vec<TreatmentPlanItem>> {
        self.plans
            .get_by_patient(patient)
            .await
            .map_err(DentalError::at(SyncStep::LoadPlanItems))
    }

    pub async fn services(&self) -> DentalResult<Vec<ServiceOffering>> {
        self.services
            .get_all()
            .await
            .map_err(DentalError::at(SyncStep::LoadServices))
    }

    /// Steps 1 to 3: makes sure every finding on `chart` has a stable plan item id.
    pub async fn sync_from_odontogram(
        &self,
        patient: PatientId,
        snapshot: Option<SnapshotId>,
        chart: &ChartDocument,
    ) -> DentalResult<SyncedPlanItems> {
        let findings = extract(chart);
        self.sync_findings(patient, snapshot, &findings).await
    }

    async fn sync_findings(
        &self,
        patient: PatientId,
        snapshot: Option<SnapshotId>,
        findings: &[Finding],
    ) -> DentalResult<SyncedPlanItems> {
        let mut existing: HashMap<FindingKey, TreatmentPlanItem> = self
            .plan_items(patient)
            .await?
            .into_iter()
            .map(|item| (item.key(), item))
            .collect();

        let mut synced = SyncedPlanItems::default();
        for finding in findings {
            let key = finding.key();
            let item = match existing.remove(&key) {
                Some(item) => item,
                None => {
                    let item = self
                        .plans
                        .create_item(NewPlanItem::from_finding(patient, snapshot, finding))
                        .await
                        .map_err(DentalError::at(SyncStep::CreatePlanItem))?;
                    tracing::info!(patient = %patient, item = %item.id, "created plan item for {key}");
                    synced.created += 1;
                    item
                }
            };
            synced.items.push((key, item));
        }

        tracing::debug!(
            patient = %patient,
            findings = synced.len(),
            created = synced.created,
            "synchronised plan items"
        );
        Ok(synced)
    }

    /// Steps 1 to 7. The title is validated before any repository call.
    pub async fn save_treatment_plan(
        &self,
        request: SaveTreatmentPlan,
    ) -> DentalResult<SavedTreatmentPlan> {
        let title = NonEmptyText::new(&request.title)
            .map_err(|_| DentalError::Validation("treatment plan title is required".into()))?;
        if let Some(pending) = request.services.iter().find(|s| s.quantity == 0) {
            return Err(DentalError::Validation(format!(
                "service {} on {} has quantity 0",
                pending.service_id, pending.finding
            )));
        }

        let patient = request.patient_id;
        let findings = extract(&request.chart);
        let plan_items = self
            .sync_findings(patient, request.snapshot_id, &findings)
            .await?;

        let draft = self.draft_budget(patient).await?;

        let (new_items, dropped) = self.resolve_services(&request.services, &plan_items).await?;
        let budget_items = if new_items.is_empty() {
            Vec::new()
        } else {
            self.budgets
                .add_items(draft.id, new_items)
                .await
                .map_err(DentalError::at(SyncStep::AddBudgetItems))?
        };

        self.budgets
            .set_status(draft.id, BudgetStatus::Active)
            .await
            .map_err(DentalError::at(SyncStep::ActivateBudget))?;
        let budget = self
            .budgets
            .get_budget(draft.id)
            .await
            .map_err(DentalError::at(SyncStep::LoadBudget))?;
        tracing::info!(patient = %patient, budget = %budget.id, "activated budget");

        let plan = self
            .plans
            .create_plan(NewTreatmentPlan {
                patient_id: patient,
                title,
                notes: compile_notes(&findings, &self.catalog, &request.notes),
                chart: request.chart,
                budget_id: budget.id,
            })
            .await
            .map_err(DentalError::at(SyncStep::CreatePlan))?;
        tracing::info!(patient = %patient, plan = %plan.id, "saved treatment plan");

        Ok(SavedTreatmentPlan {
            plan,
            budget,
            plan_items,
            budget_items,
            dropped,
        })
    }

    async fn draft_budget(&self, patient: PatientId) -> DentalResult<Budget> {
        let draft = self
            .budgets
            .find_draft_budget(patient)
            .await
            .map_err(DentalError::at(SyncStep::FindDraftBudget))?;
        if let Some(budget) = draft {
            return Ok(budget);
        }

        let budget = self
            .budgets
            .create_budget(patient, self.cfg.draft_budget_title().as_str())
            .await
            .map_err(DentalError::at(SyncStep::CreateBudget))?;
        tracing::info!(patient = %patient, budget = %budget.id, "created draft budget");
        Ok(budget)
    }

    async fn resolve_services(
        &self,
        pending: &[PendingService],
        plan_items: &SyncedPlanItems,
    ) -> DentalResult<(Vec<NewBudgetItem>, Vec<DroppedService>)> {
        if pending.is_empty() {
            return Ok((Vec::new(), Vec::new()));
        }

        let offerings: HashMap<String, ServiceOffering> = self
            .services()
            .await?
            .into_iter()
            .map(|s| (s.id.clone(), s))
            .collect();

        let mut items = Vec::new();
        let mut dropped = Vec::new();
        for assignment in pending {
            let dropped_as = |reason| DroppedService {
                finding: assignment.finding.clone(),
                service_id: assignment.service_id.clone(),
                reason,
            };

            let Some(plan_item) = plan_items.get(&assignment.finding) else {
                tracing::warn!(
                    "no plan item for finding {}; dropping service {}",
                    assignment.finding,
                    assignment.service_id
                );
                dropped.push(dropped_as(DropReason::UnknownFinding));
                continue;
            };
            let Some(service) = offerings.get(&assignment.service_id) else {
                tracing::warn!(
                    "unknown service {} for finding {}; dropping it",
                    assignment.service_id,
                    assignment.finding
                );
                dropped.push(dropped_as(DropReason::UnknownService));
                continue;
            };

            items.push(NewBudgetItem {
                finding_id: plan_item.id,
                service_id: service.id.clone(),
                service_name: service.name.clone(),
                unit_price_cents: service.unit_price_cents,
                quantity: assignment.quantity,
            });
        }

        Ok((items, dropped))
    }

    /// Loads a plan and opens an editing session over its evolution chart.
    pub async fn open_evolution(&self, plan: PlanId) -> DentalResult<EvolutionSession> {
        let plan = self.load_plan(plan).await?;
        Ok(EvolutionSession::open(
            ToolEngine::new(self.catalog),
            plan.chart,
            plan.evolution,
        ))
    }

    pub async fn load_plan(&self, plan: PlanId) -> DentalResult<TreatmentPlan> {
        self.plans
            .get_plan(plan)
            .await
            .map_err(DentalError::at(SyncStep::LoadPlan))
    }

    /// Replaces the plan's evolution chart.
    pub async fn update_evolution(&self, plan: PlanId, chart: ChartDocument) -> DentalResult<()> {
        self.plans
            .update_evolution(plan, chart)
            .await
            .map_err(DentalError::at(SyncStep::UpdateEvolution))?;
        tracing::info!(plan = %plan, "replaced evolution chart");
        Ok(())
    }

    pub async fn remove_service_from_finding(&self, budget_item: BudgetItemId) -> DentalResult<()> {
        self.plans
            .remove_service_from_finding(budget_item)
            .await
            .map_err(DentalError::at(SyncStep::RemoveService))?;
        tracing::info!(budget_item = %budget_item, "removed service from finding");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EditingMode, Target, Tool};
    use crate::error::{RepositoryError, RepositoryResult};
    use crate::evolution::diff;
    use crate::plan::BudgetId;
    use crate::repositories::InMemoryStore;
    use async_trait::async_trait;
    use dentachart_types::{Surface, ToothNumber};
    use std::path::PathBuf;

    fn tooth(code: u8) -> ToothNumber {
        ToothNumber::new(code).unwrap()
    }

    fn cfg() -> Arc<CoreConfig> {
        Arc::new(CoreConfig::new(PathBuf::from("unused"), "Draft budget").unwrap())
    }

    fn charted(steps: &[(&str, Target)]) -> ChartDocument {
        let catalog = ProcedureCatalog::standard();
        let engine = ToolEngine::new(catalog);
        steps.iter().fold(ChartDocument::new(), |chart, (id, target)| {
            let tool = Tool::resolve(&catalog, id).unwrap();
            engine.apply(&chart, tool, *target, EditingMode::Baseline).chart
        })
    }

    fn caries_16() -> ChartDocument {
        charted(&[("caries", Target::surface(tooth(16), Surface::Occlusal))])
    }

    fn key(text: &str) -> FindingKey {
        text.parse().unwrap()
    }

    fn save_request(chart: ChartDocument, services: Vec<PendingService>) -> SaveTreatmentPlan {
        SaveTreatmentPlan {
            patient_id: PatientId(7),
            snapshot_id: None,
            title: "Plan inicial".into(),
            notes: "Control en 6 meses".into(),
            chart,
            services,
        }
    }

    fn pending(finding: &str, service: &str) -> PendingService {
        PendingService {
            finding: key(finding),
            service_id: service.into(),
            quantity: 1,
        }
    }

    #[tokio::test]
    async fn sync_is_idempotent_for_unchanged_findings() {
        let sync = PlanSync::with_store(cfg(), Arc::new(InMemoryStore::new()));
        let chart = caries_16();

        let first = sync.sync_from_odontogram(PatientId(7), None, &chart).await.unwrap();
        let second = sync.sync_from_odontogram(PatientId(7), None, &chart).await.unwrap();

        assert_eq!(first.len(), 1);
        assert_eq!(second.len(), 1);
        assert_eq!(first.created(), 1);
        assert_eq!(second.created(), 0);
        let first_id = first.items().next().unwrap().id;
        assert_eq!(second.get(&key("16|caries|occlusal")).unwrap().id, first_id);
        assert_eq!(sync.plan_items(PatientId(7)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn new_findings_get_new_items_and_old_ids_are_kept() {
        let sync = PlanSync::with_store(cfg(), Arc::new(InMemoryStore::new()));
        let first = sync
            .sync_from_odontogram(PatientId(7), None, &caries_16())
            .await
            .unwrap();

        let snapshot = SnapshotId::new();
        let extended = charted(&[
            ("caries", Target::surface(tooth(16), Surface::Occlusal)),
            ("endodoncia", Target::tooth(tooth(36))),
        ]);
        let second = sync
            .sync_from_odontogram(PatientId(7), Some(snapshot), &extended)
            .await
            .unwrap();

        assert_eq!(second.len(), 2);
        assert_eq!(second.created(), 1);
        assert_eq!(
            second.get(&key("16|caries|occlusal")).unwrap().id,
            first.items().next().unwrap().id
        );
        let endo = second.get(&key("36|endodoncia|")).unwrap();
        assert_eq!(endo.snapshot_id, Some(snapshot));
    }

    #[tokio::test]
    async fn save_links_services_and_activates_budget() {
        let store = Arc::new(InMemoryStore::new());
        let sync = PlanSync::with_store(cfg(), store.clone());

        let saved = sync
            .save_treatment_plan(save_request(
                caries_16(),
                vec![pending("16|caries|occlusal", "resina_simple")],
            ))
            .await
            .unwrap();

        assert_eq!(saved.budget.status, BudgetStatus::Active);
        assert_eq!(saved.budget.title, "Draft budget");
        assert_eq!(saved.budget_items.len(), 1);
        assert!(saved.dropped.is_empty());
        assert_eq!(saved.plan.budget_id, saved.budget.id);
        assert_eq!(
            saved.plan.notes,
            "Tooth 16 (occlusal): Caries\n\nControl en 6 meses\n"
        );

        let items = sync.plan_items(PatientId(7)).await.unwrap();
        assert_eq!(items[0].budget_items[0].service_id, "resina_simple");
        assert_eq!(items[0].budget_items[0].unit_price_cents, 6_500);
        assert!(store.find_draft_budget(PatientId(7)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_reuses_existing_draft_budget() {
        let store = Arc::new(InMemoryStore::new());
        let draft = store.create_budget(PatientId(7), "Pre-existing").await.unwrap();
        let sync = PlanSync::with_store(cfg(), store.clone());

        let saved = sync
            .save_treatment_plan(save_request(caries_16(), Vec::new()))
            .await
            .unwrap();
        assert_eq!(saved.budget.id, draft.id);
        assert_eq!(saved.budget.title, "Pre-existing");
        assert_eq!(saved.budget.status, BudgetStatus::Active);
        assert_eq!(saved.budget, store.get_budget(draft.id).await.unwrap());
        assert_eq!(store.budgets_for(PatientId(7)).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn each_full_save_finalises_a_new_budget() {
        let store = Arc::new(InMemoryStore::new());
        let sync = PlanSync::with_store(cfg(), store.clone());

        let first = sync
            .save_treatment_plan(save_request(caries_16(), Vec::new()))
            .await
            .unwrap();
        let second = sync
            .save_treatment_plan(save_request(caries_16(), Vec::new()))
            .await
            .unwrap();

        assert_ne!(first.budget.id, second.budget.id);
        assert_eq!(store.budgets_for(PatientId(7)).unwrap().len(), 2);
        assert_eq!(
            first.plan_items.items().next().unwrap().id,
            second.plan_items.items().next().unwrap().id
        );
    }

    #[tokio::test]
    async fn blank_title_is_rejected_without_side_effects() {
        let store = Arc::new(InMemoryStore::new());
        let sync = PlanSync::with_store(cfg(), store.clone());
        let mut request = save_request(caries_16(), Vec::new());
        request.title = "  ".into();

        let err = sync.save_treatment_plan(request).await.unwrap_err();
        assert!(matches!(err, DentalError::Validation(_)));
        assert!(sync.plan_items(PatientId(7)).await.unwrap().is_empty());
        assert!(store.budgets_for(PatientId(7)).unwrap().is_empty());
    }

    #[tokio::test]
    async fn unmatched_assignments_are_dropped() {
        let sync = PlanSync::with_store(cfg(), Arc::new(InMemoryStore::new()));
        let saved = sync
            .save_treatment_plan(save_request(
                caries_16(),
                vec![
                    pending("21|caries|mesial", "resina_simple"),
                    pending("16|caries|occlusal", "does_not_exist"),
                    pending("16|caries|occlusal", "resina_compuesta"),
                ],
            ))
            .await
            .unwrap();

        assert_eq!(saved.budget_items.len(), 1);
        assert_eq!(saved.budget_items[0].service_id, "resina_compuesta");
        let reasons: Vec<_> = saved.dropped.iter().map(|d| d.reason).collect();
        assert_eq!(
            reasons,
            vec![DropReason::UnknownFinding, DropReason::UnknownService]
        );
    }

    struct UnavailableBudgets;

    #[async_trait]
    impl BudgetRepository for UnavailableBudgets {
        async fn find_draft_budget(&self, _: PatientId) -> RepositoryResult<Option<Budget>> {
            Err(RepositoryError::Unavailable("budget service offline".into()))
        }

        async fn create_budget(&self, _: PatientId, _: &str) -> RepositoryResult<Budget> {
            Err(RepositoryError::Unavailable("budget service offline".into()))
        }

        async fn add_items(
            &self,
            _: BudgetId,
            _: Vec<NewBudgetItem>,
        ) -> RepositoryResult<Vec<BudgetItem>> {
            Err(RepositoryError::Unavailable("budget service offline".into()))
        }

        async fn set_status(&self, _: BudgetId, _: BudgetStatus) -> RepositoryResult<()> {
            Err(RepositoryError::Unavailable("budget service offline".into()))
        }

        async fn get_budget(&self, _: BudgetId) -> RepositoryResult<Budget> {
            Err(RepositoryError::Unavailable("budget service offline".into()))
        }
    }

    #[tokio::test]
    async fn failures_name_the_step_and_keep_earlier_effects() {
        let store = Arc::new(InMemoryStore::new());
        let sync = PlanSync::new(cfg(), store.clone(), Arc::new(UnavailableBudgets), store.clone());

        let err = sync
            .save_treatment_plan(save_request(caries_16(), Vec::new()))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DentalError::Step {
                step: SyncStep::FindDraftBudget,
                source: RepositoryError::Unavailable(_)
            }
        ));
        assert_eq!(sync.plan_items(PatientId(7)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn evolution_round_trip_through_plan() {
        let sync = PlanSync::with_store(cfg(), Arc::new(InMemoryStore::new()));
        let saved = sync
            .save_treatment_plan(save_request(caries_16(), Vec::new()))
            .await
            .unwrap();

        let mut session = sync.open_evolution(saved.plan.id).await.unwrap();
        assert!(session.seeded_from_baseline());
        session.apply(Tool::Cure, Target::surface(tooth(16), Surface::Occlusal));
        assert!(session.is_dirty());
        sync.update_evolution(saved.plan.id, session.into_chart())
            .await
            .unwrap();

        let plan = sync.load_plan(saved.plan.id).await.unwrap();
        let changes = diff(&plan.chart, &plan.evolution);
        assert_eq!(changes.cured_count(), 1);

        let reopened = sync.open_evolution(saved.plan.id).await.unwrap();
        assert!(!reopened.seeded_from_baseline());
    }

    #[tokio::test]
    async fn removing_a_service_hides_it_from_plan_items() {
        let sync = PlanSync::with_store(cfg(), Arc::new(InMemoryStore::new()));
        let saved = sync
            .save_treatment_plan(save_request(
                caries_16(),
                vec![pending("16|caries|occlusal", "resina_simple")],
            ))
            .await
            .unwrap();

        sync.remove_service_from_finding(saved.budget_items[0].id)
            .await
            .unwrap();
        assert!(sync.plan_items(PatientId(7)).await.unwrap()[0]
            .budget_items
            .is_empty());

        let err = sync
            .remove_service_from_finding(saved.budget_items[0].id)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            DentalError::Step {
                step: SyncStep::RemoveService,
                source: RepositoryError::NotFound { .. }
            }
        ));
    }

    #[test]
    fn notes_fall_back_to_finding_type_for_unknown_procedures() {
        let findings = vec![Finding {
            tooth_number: tooth(36),
            finding_type: "custom_mark".into(),
            surface: None,
            color: dentachart_types::ClinicalColor::AlertYellow.into(),
        }];
        let notes = compile_notes(&findings, &ProcedureCatalog::standard(), "");
        assert_eq!(notes, "Tooth 36: custom_mark\n");
    }
}
