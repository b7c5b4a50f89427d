//! File-backed repository back-end.
//!
//! Layout under the configured data directory:
//!
//! ```text
//! <data_dir>/
//!   services.yaml                 # service catalog, seeded with defaults on first read
//!   patients/<patient_id>/ledger.yaml
//!   plans/<plan_id>.yaml
//! ```
//!
//! Each call reads the affected file, applies the change and writes it back through a
//! temporary file and rename. A process-local lock serialises the read-modify-write cycle.
//! Nothing coordinates separate processes sharing one directory.

use super::ledger::PatientLedger;
use super::{default_services, BudgetRepository, ServiceCatalog, TreatmentPlanRepository};
use crate::chart::ChartDocument;
use crate::config::CoreConfig;
use crate::constants::{LEDGER_FILENAME, PATIENTS_DIR_NAME, PLANS_DIR_NAME, SERVICES_FILENAME};
use crate::error::{RepositoryError, RepositoryResult};
use crate::plan::{
    Budget, BudgetId, BudgetItem, BudgetItemId, BudgetStatus, NewBudgetItem, NewPlanItem,
    NewTreatmentPlan, PlanId, ServiceOffering, TreatmentPlan, TreatmentPlanItem,
};
use async_trait::async_trait;
use chrono::Utc;
use dentachart_types::PatientId;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(cfg: &CoreConfig) -> Self {
        Self::open(cfg.data_dir())
    }

    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn guard(&self) -> RepositoryResult<MutexGuard<'_, ()>> {
        self.write_lock
            .lock()
            .map_err(|_| RepositoryError::Unavailable("file store lock poisoned".into()))
    }

    fn patients_dir(&self) -> PathBuf {
        self.root.join(PATIENTS_DIR_NAME)
    }

    fn ledger_path(&self, patient: PatientId) -> PathBuf {
        self.patients_dir()
            .join(patient.to_string())
            .join(LEDGER_FILENAME)
    }

    fn plan_path(&self, plan: PlanId) -> PathBuf {
        self.root
            .join(PLANS_DIR_NAME)
            .join(format!("{}.yaml", plan.as_uuid().simple()))
    }

    fn services_path(&self) -> PathBuf {
        self.root.join(SERVICES_FILENAME)
    }

    fn load_ledger(&self, patient: PatientId) -> RepositoryResult<PatientLedger> {
        Ok(read_yaml(&self.ledger_path(patient))?.unwrap_or_default())
    }

    fn save_ledger(&self, patient: PatientId, ledger: &PatientLedger) -> RepositoryResult<()> {
        write_yaml(&self.ledger_path(patient), ledger)
    }

    /// Patients that have a ledger directory, in ascending id order.
    fn patients(&self) -> RepositoryResult<Vec<PatientId>> {
        let dir = self.patients_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(RepositoryError::Read { path: dir, source }),
        };

        let mut patients = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| RepositoryError::Read {
                path: dir.clone(),
                source,
            })?;
            if let Some(id) = entry.file_name().to_str().and_then(|n| n.parse().ok()) {
                patients.push(id);
            }
        }
        patients.sort();
        Ok(patients)
    }

    /// Loads the first ledger matching `predicate`, together with its patient.
    fn find_ledger(
        &self,
        predicate: impl Fn(&PatientLedger) -> bool,
    ) -> RepositoryResult<Option<(PatientId, PatientLedger)>> {
        for patient in self.patients()? {
            let ledger = self.load_ledger(patient)?;
            if predicate(&ledger) {
                return Ok(Some((patient, ledger)));
            }
        }
        Ok(None)
    }

    fn find_budget_ledger(&self, budget: BudgetId) -> RepositoryResult<(PatientId, PatientLedger)> {
        self.find_ledger(|ledger| ledger.budget(budget).is_some())?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "budget",
                id: budget.to_string(),
            })
    }

    fn load_plan(&self, plan: PlanId) -> RepositoryResult<TreatmentPlan> {
        read_yaml(&self.plan_path(plan))?.ok_or_else(|| RepositoryError::NotFound {
            entity: "treatment plan",
            id: plan.to_string(),
        })
    }
}

/// Reads and parses a YAML file, returning `None` when it does not exist.
fn read_yaml<T: DeserializeOwned>(path: &Path) -> RepositoryResult<Option<T>> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(RepositoryError::Read {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let deserializer = serde_yaml::Deserializer::from_str(&text);
    serde_path_to_error::deserialize(deserializer)
        .map(Some)
        .map_err(|err| {
            let field = err.path().to_string();
            RepositoryError::YamlDeserialization {
                path: path.to_path_buf(),
                message: format!("{field}: {}", err.into_inner()),
            }
        })
}

fn write_yaml<T: Serialize>(path: &Path, value: &T) -> RepositoryResult<()> {
    let text = serde_yaml::to_string(value).map_err(RepositoryError::YamlSerialization)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| RepositoryError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let tmp = path.with_extension("yaml.tmp");
    fs::write(&tmp, text).map_err(|source| RepositoryError::Write {
        path: tmp.clone(),
        source,
    })?;
    fs::rename(&tmp, path).map_err(|source| RepositoryError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[async_trait]
impl TreatmentPlanRepository for FileStore {
    async fn get_by_patient(&self, patient: PatientId) -> RepositoryResult<Vec<TreatmentPlanItem>> {
        Ok(self.load_ledger(patient)?.plan_items_view())
    }

    async fn create_item(&self, item: NewPlanItem) -> RepositoryResult<TreatmentPlanItem> {
        let _guard = self.guard()?;
        let patient = item.patient_id;
        let mut ledger = self.load_ledger(patient)?;
        let created = ledger.push_item(item);
        self.save_ledger(patient, &ledger)?;
        Ok(created)
    }

    async fn remove_service_from_finding(&self, budget_item: BudgetItemId) -> RepositoryResult<()> {
        let _guard = self.guard()?;
        let (patient, mut ledger) = self
            .find_ledger(|ledger| ledger.holds_budget_item(budget_item))?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "budget item",
                id: budget_item.to_string(),
            })?;
        ledger.remove_budget_item(budget_item);
        self.save_ledger(patient, &ledger)
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
        let _guard = self.guard()?;
        write_yaml(&self.plan_path(plan.id), &plan)?;
        Ok(plan)
    }

    async fn get_plan(&self, plan: PlanId) -> RepositoryResult<TreatmentPlan> {
        self.load_plan(plan)
    }

    async fn update_evolution(&self, plan: PlanId, chart: ChartDocument) -> RepositoryResult<()> {
        let _guard = self.guard()?;
        let mut stored = self.load_plan(plan)?;
        stored.evolution = chart;
        stored.updated_at = Utc::now();
        write_yaml(&self.plan_path(plan), &stored)
    }
}

#[async_trait]
impl BudgetRepository for FileStore {
    async fn find_draft_budget(&self, patient: PatientId) -> RepositoryResult<Option<Budget>> {
        Ok(self.load_ledger(patient)?.draft_budget().cloned())
    }

    async fn create_budget(&self, patient: PatientId, title: &str) -> RepositoryResult<Budget> {
        let _guard = self.guard()?;
        let mut ledger = self.load_ledger(patient)?;
        let budget = ledger.push_budget(patient, title);
        self.save_ledger(patient, &ledger)?;
        Ok(budget)
    }

    async fn add_items(
        &self,
        budget: BudgetId,
        items: Vec<NewBudgetItem>,
    ) -> RepositoryResult<Vec<BudgetItem>> {
        let _guard = self.guard()?;
        let (patient, mut ledger) = self.find_budget_ledger(budget)?;
        let added = ledger.add_items(budget, items).unwrap_or_default();
        self.save_ledger(patient, &ledger)?;
        Ok(added)
    }

    async fn set_status(&self, budget: BudgetId, status: BudgetStatus) -> RepositoryResult<()> {
        let _guard = self.guard()?;
        let (patient, mut ledger) = self.find_budget_ledger(budget)?;
        ledger.set_status(budget, status);
        self.save_ledger(patient, &ledger)
    }

    async fn get_budget(&self, budget: BudgetId) -> RepositoryResult<Budget> {
        let (_, ledger) = self.find_budget_ledger(budget)?;
        ledger
            .budget(budget)
            .cloned()
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "budget",
                id: budget.to_string(),
            })
    }
}

#[async_trait]
impl ServiceCatalog for FileStore {
    async fn get_all(&self) -> RepositoryResult<Vec<ServiceOffering>> {
        let path = self.services_path();
        if let Some(services) = read_yaml(&path)? {
            return Ok(services);
        }

        let _guard = self.guard()?;
        let services = default_services();
        write_yaml(&path, &services)?;
        tracing::info!("seeded service catalog at {}", path.display());
        Ok(services)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dentachart_types::{NonEmptyText, Surface, ToothNumber};
    use tempfile::TempDir;

    fn new_item(patient: u64) -> NewPlanItem {
        NewPlanItem {
            patient_id: PatientId(patient),
            snapshot_id: None,
            tooth_number: ToothNumber::new(16).unwrap(),
            finding_type: "caries".into(),
            surface: Some(Surface::Occlusal),
        }
    }

    #[tokio::test]
    async fn ledger_survives_reopening_the_store() {
        let dir = TempDir::new().unwrap();
        let created = {
            let store = FileStore::open(dir.path());
            store.create_item(new_item(7)).await.unwrap()
        };

        assert!(dir.path().join("patients/7/ledger.yaml").is_file());
        let reopened = FileStore::open(dir.path());
        let items = reopened.get_by_patient(PatientId(7)).await.unwrap();
        assert_eq!(items, vec![created]);
    }

    #[tokio::test]
    async fn budgets_are_located_across_patients() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path());
        store.create_budget(PatientId(1), "One").await.unwrap();
        let item = store.create_item(new_item(2)).await.unwrap();
        let budget = store.create_budget(PatientId(2), "Two").await.unwrap();

        let added = store
            .add_items(
                budget.id,
                vec![NewBudgetItem {
                    finding_id: item.id,
                    service_id: "resina_simple".into(),
                    service_name: "Resina simple".into(),
                    unit_price_cents: 6_500,
                    quantity: 2,
                }],
            )
            .await
            .unwrap();
        store.set_status(budget.id, BudgetStatus::Active).await.unwrap();

        let stored = store.get_budget(budget.id).await.unwrap();
        assert_eq!(stored.status, BudgetStatus::Active);
        assert_eq!(stored.total_cents(), 13_000);
        assert_eq!(
            store.get_by_patient(PatientId(2)).await.unwrap()[0].budget_items,
            added
        );
        assert!(store.find_draft_budget(PatientId(1)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn plans_are_stored_one_file_each() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path());
        let budget = store.create_budget(PatientId(7), "Budget").await.unwrap();
        let plan = store
            .create_plan(NewTreatmentPlan {
                patient_id: PatientId(7),
                title: NonEmptyText::new("Plan A").unwrap(),
                notes: "Tooth 16 (occlusal): Caries".into(),
                chart: ChartDocument::new().with_specifications("baseline"),
                budget_id: budget.id,
            })
            .await
            .unwrap();

        let evolution = ChartDocument::new().with_specifications("after visit");
        store.update_evolution(plan.id, evolution.clone()).await.unwrap();

        let stored = store.get_plan(plan.id).await.unwrap();
        assert_eq!(stored.title.as_str(), "Plan A");
        assert_eq!(stored.chart.specifications(), "baseline");
        assert_eq!(stored.evolution, evolution);
        assert!(store.update_evolution(PlanId::new(), evolution).await.is_err());
    }

    #[tokio::test]
    async fn service_catalog_is_seeded_once() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path());
        let services = store.get_all().await.unwrap();
        assert_eq!(services, default_services());
        assert!(dir.path().join("services.yaml").is_file());

        let custom = vec![ServiceOffering {
            id: "blanqueamiento".into(),
            name: "Blanqueamiento".into(),
            unit_price_cents: 20_000,
            category: "aesthetic".into(),
        }];
        write_yaml(&dir.path().join("services.yaml"), &custom).unwrap();
        assert_eq!(store.get_all().await.unwrap(), custom);
    }

    #[tokio::test]
    async fn malformed_ledger_reports_path() {
        let dir = TempDir::new().unwrap();
        let ledger = dir.path().join("patients/9/ledger.yaml");
        fs::create_dir_all(ledger.parent().unwrap()).unwrap();
        fs::write(&ledger, "plan_items: 12\n").unwrap();

        let store = FileStore::open(dir.path());
        let err = store.get_by_patient(PatientId(9)).await.unwrap_err();
        match err {
            RepositoryError::YamlDeserialization { path, message } => {
                assert_eq!(path, ledger);
                assert!(message.starts_with("plan_items"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }
}
