//! Treatment-plan and budget records.
//!
//! These are the values exchanged with the repository contracts in [`crate::repositories`].
//! Identifiers are random v4 UUIDs wrapped in one newtype per entity so a budget id cannot be
//! passed where a plan item id is expected.

use crate::chart::ChartDocument;
use crate::findings::{Finding, FindingKey};
use chrono::{DateTime, Utc};
use dentachart_types::{NonEmptyText, PatientId, Surface, ToothNumber};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// IDENTIFIERS
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Stable id of a treatment-plan item. Budget items link to it as `finding_id`.
    PlanItemId
);
uuid_id!(BudgetId);
uuid_id!(BudgetItemId);
uuid_id!(PlanId);
uuid_id!(
    /// Id of the chart snapshot a plan item was first synchronised from.
    SnapshotId
);

// ============================================================================
// PLAN ITEMS
// ============================================================================

/// One persisted plan item per finding key, created once and reused on later syncs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreatmentPlanItem {
    pub id: PlanItemId,
    pub patient_id: PatientId,
    pub tooth_number: ToothNumber,
    pub finding_type: String,
    #[serde(default)]
    pub surface: Option<Surface>,
    #[serde(default)]
    pub snapshot_id: Option<SnapshotId>,
    #[serde(default)]
    pub budget_items: Vec<BudgetItem>,
    pub created_at: DateTime<Utc>,
}

impl TreatmentPlanItem {
    pub fn key(&self) -> FindingKey {
        FindingKey {
            tooth: self.tooth_number,
            finding_type: self.finding_type.clone(),
            surface: self.surface,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPlanItem {
    pub patient_id: PatientId,
    pub snapshot_id: Option<SnapshotId>,
    pub tooth_number: ToothNumber,
    pub finding_type: String,
    pub surface: Option<Surface>,
}

impl NewPlanItem {
    pub fn from_finding(
        patient_id: PatientId,
        snapshot_id: Option<SnapshotId>,
        finding: &Finding,
    ) -> Self {
        Self {
            patient_id,
            snapshot_id,
            tooth_number: finding.tooth_number,
            finding_type: finding.finding_type.clone(),
            surface: finding.surface,
        }
    }
}

// ============================================================================
// BUDGETS
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetStatus {
    /// Draft. Items are being attached.
    Created,
    /// Finalised.
    Active,
}

impl fmt::Display for BudgetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BudgetStatus::Created => "created",
            BudgetStatus::Active => "active",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BudgetItem {
    pub id: BudgetItemId,
    pub budget_id: BudgetId,
    pub finding_id: PlanItemId,
    pub service_id: String,
    pub service_name: String,
    pub unit_price_cents: u64,
    pub quantity: u32,
}

impl BudgetItem {
    pub fn line_total_cents(&self) -> u64 {
        self.unit_price_cents.saturating_mul(u64::from(self.quantity))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBudgetItem {
    pub finding_id: PlanItemId,
    pub service_id: String,
    pub service_name: String,
    pub unit_price_cents: u64,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Budget {
    pub id: BudgetId,
    pub patient_id: PatientId,
    pub title: String,
    pub status: BudgetStatus,
    #[serde(default)]
    pub items: Vec<BudgetItem>,
    pub created_at: DateTime<Utc>,
}

impl Budget {
    pub fn total_cents(&self) -> u64 {
        self.items
            .iter()
            .fold(0u64, |acc, item| acc.saturating_add(item.line_total_cents()))
    }
}

// ============================================================================
// TREATMENT PLANS
// ============================================================================

/// Plan header persisted by a full save.
///
/// `chart` is the baseline captured at save time. `evolution` starts blank and is replaced
/// wholesale by each evolution save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TreatmentPlan {
    pub id: PlanId,
    pub patient_id: PatientId,
    pub title: NonEmptyText,
    #[serde(default)]
    pub notes: String,
    pub chart: ChartDocument,
    #[serde(default)]
    pub evolution: ChartDocument,
    pub budget_id: BudgetId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTreatmentPlan {
    pub patient_id: PatientId,
    pub title: NonEmptyText,
    pub notes: String,
    pub chart: ChartDocument,
    pub budget_id: BudgetId,
}

// ============================================================================
// SERVICES
// ============================================================================

/// Billable service from the external service catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceOffering {
    pub id: String,
    pub name: String,
    pub unit_price_cents: u64,
    pub category: String,
}

/// A service the clinician attached to a finding before saving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingService {
    pub finding: FindingKey,
    pub service_id: String,
    #[serde(default = "default_quantity")]
    pub quantity: u32,
}

fn default_quantity() -> u32 {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: u32, price: u64) -> BudgetItem {
        BudgetItem {
            id: BudgetItemId::new(),
            budget_id: BudgetId::new(),
            finding_id: PlanItemId::new(),
            service_id: "svc".into(),
            service_name: "Service".into(),
            unit_price_cents: price,
            quantity,
        }
    }

    #[test]
    fn ids_round_trip_through_display() {
        let id = PlanItemId::new();
        let parsed: PlanItemId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
        assert!("not-a-uuid".parse::<BudgetId>().is_err());
    }

    #[test]
    fn budget_total_sums_line_totals() {
        let budget = Budget {
            id: BudgetId::new(),
            patient_id: PatientId(7),
            title: "Plan".into(),
            status: BudgetStatus::Created,
            items: vec![item(2, 4_500), item(1, 12_000)],
            created_at: Utc::now(),
        };
        assert_eq!(budget.total_cents(), 21_000);
    }

    #[test]
    fn plan_item_key_matches_finding_key_format() {
        let plan_item = TreatmentPlanItem {
            id: PlanItemId::new(),
            patient_id: PatientId(7),
            tooth_number: ToothNumber::new(16).unwrap(),
            finding_type: "caries".into(),
            surface: Some(Surface::Occlusal),
            snapshot_id: None,
            budget_items: Vec::new(),
            created_at: Utc::now(),
        };
        assert_eq!(plan_item.key().to_string(), "16|caries|occlusal");
    }

    #[test]
    fn pending_service_defaults_quantity_to_one() {
        let pending: PendingService =
            serde_json::from_str(r#"{"finding":"36|endodoncia|","service_id":"endo-molar"}"#)
                .unwrap();
        assert_eq!(pending.quantity, 1);
        assert_eq!(pending.finding.surface, None);
    }
}
