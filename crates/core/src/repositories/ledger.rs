//! Per-patient plan items and budgets.
//!
//! Both back-ends keep one ledger per patient and delegate the bookkeeping here, so the
//! visibility rules are identical whichever store is used.

use crate::plan::{
    Budget, BudgetId, BudgetItem, BudgetItemId, BudgetStatus, NewBudgetItem, NewPlanItem,
    PlanItemId, TreatmentPlanItem,
};
use chrono::Utc;
use dentachart_types::PatientId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub(crate) struct PatientLedger {
    #[serde(default)]
    pub plan_items: Vec<TreatmentPlanItem>,
    /// In creation order.
    #[serde(default)]
    pub budgets: Vec<Budget>,
}

impl PatientLedger {
    /// Plan items with the budget items of active budgets attached.
    pub fn plan_items_view(&self) -> Vec<TreatmentPlanItem> {
        self.plan_items
            .iter()
            .map(|item| {
                let mut item = item.clone();
                item.budget_items = self.active_items_for(item.id).cloned().collect();
                item
            })
            .collect()
    }

    fn active_items_for(&self, finding: PlanItemId) -> impl Iterator<Item = &BudgetItem> {
        self.budgets
            .iter()
            .filter(|b| b.status == BudgetStatus::Active)
            .flat_map(|b| b.items.iter())
            .filter(move |i| i.finding_id == finding)
    }

    pub fn push_item(&mut self, new: NewPlanItem) -> TreatmentPlanItem {
        let item = TreatmentPlanItem {
            id: PlanItemId::new(),
            patient_id: new.patient_id,
            tooth_number: new.tooth_number,
            finding_type: new.finding_type,
            surface: new.surface,
            snapshot_id: new.snapshot_id,
            budget_items: Vec::new(),
            created_at: Utc::now(),
        };
        self.plan_items.push(item.clone());
        item
    }

    pub fn draft_budget(&self) -> Option<&Budget> {
        self.budgets
            .iter()
            .rev()
            .find(|b| b.status == BudgetStatus::Created)
    }

    pub fn push_budget(&mut self, patient: PatientId, title: &str) -> Budget {
        let budget = Budget {
            id: BudgetId::new(),
            patient_id: patient,
            title: title.to_owned(),
            status: BudgetStatus::Created,
            items: Vec::new(),
            created_at: Utc::now(),
        };
        self.budgets.push(budget.clone());
        budget
    }

    pub fn budget(&self, id: BudgetId) -> Option<&Budget> {
        self.budgets.iter().find(|b| b.id == id)
    }

    fn budget_mut(&mut self, id: BudgetId) -> Option<&mut Budget> {
        self.budgets.iter_mut().find(|b| b.id == id)
    }

    /// Returns `None` when the budget is not in this ledger.
    pub fn add_items(&mut self, id: BudgetId, items: Vec<NewBudgetItem>) -> Option<Vec<BudgetItem>> {
        let budget = self.budget_mut(id)?;
        let created: Vec<BudgetItem> = items
            .into_iter()
            .map(|new| BudgetItem {
                id: BudgetItemId::new(),
                budget_id: id,
                finding_id: new.finding_id,
                service_id: new.service_id,
                service_name: new.service_name,
                unit_price_cents: new.unit_price_cents,
                quantity: new.quantity,
            })
            .collect();
        budget.items.extend(created.iter().cloned());
        Some(created)
    }

    pub fn set_status(&mut self, id: BudgetId, status: BudgetStatus) -> bool {
        match self.budget_mut(id) {
            Some(budget) => {
                budget.status = status;
                true
            }
            None => false,
        }
    }

    pub fn remove_budget_item(&mut self, id: BudgetItemId) -> bool {
        for budget in &mut self.budgets {
            if let Some(index) = budget.items.iter().position(|i| i.id == id) {
                budget.items.remove(index);
                return true;
            }
        }
        false
    }

    pub fn holds_budget_item(&self, id: BudgetItemId) -> bool {
        self.budgets
            .iter()
            .any(|b| b.items.iter().any(|i| i.id == id))
    }
}
