//! Request and response bodies.
//!
//! Chart documents and core records travel in their own serde form; the OpenAPI schema
//! describes them as opaque objects.

use dentachart_catalog::{ProcedureDefinition, ToothDefinition};
use dentachart_core::{
    ApplyOutcome, Budget, BudgetItem, ChartDocument, DroppedService, EvolutionDiff, Finding,
    FindingSummary, ServiceOffering, TreatmentPlan, TreatmentPlanItem,
};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    pub message: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProcedureQuery {
    /// Only procedures of this category, e.g. `lesion` or `endodontic`.
    pub category: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProceduresRes {
    #[schema(value_type = Vec<Object>)]
    pub procedures: Vec<&'static ProcedureDefinition>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct TeethQuery {
    /// `permanent` or `temporary`.
    pub dentition: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TeethRes {
    #[schema(value_type = Vec<Object>)]
    pub teeth: Vec<&'static ToothDefinition>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ServicesRes {
    #[schema(value_type = Vec<Object>)]
    pub services: Vec<ServiceOffering>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ApplyToolReq {
    #[serde(default)]
    #[schema(value_type = Object)]
    pub chart: ChartDocument,
    /// Catalog procedure id, `eraser` or `cure`.
    pub tool: String,
    pub tooth: u8,
    /// Surface name; aliases such as `buccal` or `palatal` are accepted.
    #[serde(default)]
    pub surface: Option<String>,
    /// Edit the evolution chart instead of the baseline. Required for `cure`.
    #[serde(default)]
    pub evolution: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApplyToolRes {
    #[schema(value_type = Object)]
    pub chart: ChartDocument,
    #[schema(value_type = Object)]
    pub outcome: ApplyOutcome,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ChartReq {
    #[schema(value_type = Object)]
    pub chart: ChartDocument,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct FindingsRes {
    #[schema(value_type = Vec<Object>)]
    pub findings: Vec<Finding>,
    #[schema(value_type = Object)]
    pub summary: FindingSummary,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DiffReq {
    #[schema(value_type = Object)]
    pub baseline: ChartDocument,
    #[schema(value_type = Object)]
    pub evolution: ChartDocument,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DiffRes {
    #[schema(value_type = Object)]
    pub diff: EvolutionDiff,
    pub cured: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SyncReq {
    #[schema(value_type = Object)]
    pub chart: ChartDocument,
    #[serde(default)]
    pub snapshot_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlanItemsRes {
    #[schema(value_type = Vec<Object>)]
    pub items: Vec<TreatmentPlanItem>,
    /// Items created by this request. Zero for plain listings.
    pub created: usize,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct PendingServiceReq {
    /// Finding key, `<tooth>|<finding type>|<surface or empty>`.
    pub finding: String,
    pub service_id: String,
    #[serde(default)]
    pub quantity: Option<u32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SavePlanReq {
    pub title: String,
    #[serde(default)]
    pub notes: String,
    #[schema(value_type = Object)]
    pub chart: ChartDocument,
    #[serde(default)]
    pub snapshot_id: Option<String>,
    #[serde(default)]
    pub services: Vec<PendingServiceReq>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SavePlanRes {
    #[schema(value_type = Object)]
    pub plan: TreatmentPlan,
    #[schema(value_type = Object)]
    pub budget: Budget,
    #[schema(value_type = Vec<Object>)]
    pub plan_items: Vec<TreatmentPlanItem>,
    #[schema(value_type = Vec<Object>)]
    pub budget_items: Vec<BudgetItem>,
    #[schema(value_type = Vec<Object>)]
    pub dropped: Vec<DroppedService>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PlanRes {
    #[schema(value_type = Object)]
    pub plan: TreatmentPlan,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct EvolutionRes {
    pub plan_id: String,
    #[schema(value_type = Object)]
    pub diff: EvolutionDiff,
    pub cured: usize,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
}
