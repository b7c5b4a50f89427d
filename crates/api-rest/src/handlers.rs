//! HTTP handlers.
//!
//! Chart endpoints are stateless: the client sends the chart it holds and receives the new one.
//! Only plan and budget endpoints reach the repositories.

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::Json,
};
use dentachart_catalog::ProcedureCategory;
use dentachart_core::{
    diff, extract, summarise, BudgetItemId, DentalError, FindingKey, PatientId, PendingService,
    PlanId, RepositoryError, SaveTreatmentPlan, SnapshotId, Surface, Target, Tool, ToothNumber,
};
use dentachart_types::Dentition;

use crate::dto::{
    ApplyToolReq, ApplyToolRes, ChartReq, DiffReq, DiffRes, ErrorRes, EvolutionRes, FindingsRes,
    HealthRes, PendingServiceReq, PlanItemsRes, PlanRes, ProcedureQuery, ProceduresRes,
    SavePlanReq, SavePlanRes, ServicesRes, SyncReq, TeethQuery, TeethRes,
};
use crate::AppState;

pub(crate) type ApiError = (StatusCode, Json<ErrorRes>);
pub(crate) type ApiResult<T> = Result<T, ApiError>;

fn bad_request(message: impl Into<String>) -> ApiError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorRes {
            error: message.into(),
        }),
    )
}

/// Maps core errors onto status codes: validation and schema problems are 400, missing
/// records are 404 and everything else is 500.
fn dental_error(err: DentalError) -> ApiError {
    let status = match &err {
        DentalError::Validation(_) | DentalError::ChartSchema { .. } | DentalError::Catalog(_) => {
            StatusCode::BAD_REQUEST
        }
        DentalError::Step {
            source: RepositoryError::NotFound { .. },
            ..
        } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        tracing::error!("request failed: {:?}", err);
    } else {
        tracing::warn!("request rejected: {}", err);
    }
    (
        status,
        Json(ErrorRes {
            error: err.to_string(),
        }),
    )
}

fn parse_snapshot(raw: Option<String>) -> ApiResult<Option<SnapshotId>> {
    raw.filter(|s| !s.trim().is_empty())
        .map(|s| {
            s.parse()
                .map_err(|_| bad_request(format!("invalid snapshot id '{s}'")))
        })
        .transpose()
}

fn parse_pending(req: PendingServiceReq) -> ApiResult<PendingService> {
    let finding: FindingKey = req
        .finding
        .parse()
        .map_err(|e| bad_request(format!("invalid finding key '{}': {e}", req.finding)))?;
    Ok(PendingService {
        finding,
        service_id: req.service_id,
        quantity: req.quantity.unwrap_or(1),
    })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint for monitoring and load balancers.
#[axum::debug_handler]
pub(crate) async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Dentachart REST API is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/catalog/procedures",
    params(ProcedureQuery),
    responses(
        (status = 200, description = "Procedure catalog", body = ProceduresRes),
        (status = 400, description = "Unknown category", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub(crate) async fn list_procedures(
    State(state): State<AppState>,
    Query(query): Query<ProcedureQuery>,
) -> ApiResult<Json<ProceduresRes>> {
    let catalog = state.sync.catalog();
    let procedures = match query.category.as_deref() {
        Some(raw) => {
            let category = raw
                .parse::<ProcedureCategory>()
                .map_err(|e| bad_request(e.to_string()))?;
            catalog.by_category(category).collect()
        }
        None => catalog.all().iter().collect(),
    };
    Ok(Json(ProceduresRes { procedures }))
}

#[utoipa::path(
    get,
    path = "/catalog/teeth",
    params(TeethQuery),
    responses(
        (status = 200, description = "Tooth registry in FDI order", body = TeethRes),
        (status = 400, description = "Unknown dentition", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub(crate) async fn list_teeth(
    State(state): State<AppState>,
    Query(query): Query<TeethQuery>,
) -> ApiResult<Json<TeethRes>> {
    let dentition = match query.dentition.as_deref() {
        None => None,
        Some("permanent") => Some(Dentition::Permanent),
        Some("temporary") => Some(Dentition::Temporary),
        Some(other) => {
            return Err(bad_request(format!(
                "dentition must be 'permanent' or 'temporary', got '{other}'"
            )))
        }
    };
    let teeth = match dentition {
        Some(dentition) => state.registry.by_dentition(dentition).collect(),
        None => state.registry.all().iter().collect(),
    };
    Ok(Json(TeethRes { teeth }))
}

#[utoipa::path(
    get,
    path = "/catalog/services",
    responses(
        (status = 200, description = "Billable services", body = ServicesRes),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
pub(crate) async fn list_services(State(state): State<AppState>) -> ApiResult<Json<ServicesRes>> {
    let services = state.sync.services().await.map_err(dental_error)?;
    Ok(Json(ServicesRes { services }))
}

#[utoipa::path(
    post,
    path = "/charts/apply",
    request_body = ApplyToolReq,
    responses(
        (status = 200, description = "Chart after applying the tool", body = ApplyToolRes),
        (status = 400, description = "Unknown tool, tooth or surface")
    )
)]
/// Apply a procedure, the eraser or cure to one tooth or surface.
///
/// A tool that has nothing to do still answers 200; the outcome says why nothing changed.
#[axum::debug_handler]
pub(crate) async fn apply_tool(
    State(state): State<AppState>,
    Json(req): Json<ApplyToolReq>,
) -> ApiResult<Json<ApplyToolRes>> {
    let tool = Tool::resolve(state.engine.catalog(), &req.tool)
        .ok_or_else(|| bad_request(format!("unknown tool '{}'", req.tool)))?;
    let tooth = ToothNumber::new(req.tooth).map_err(|e| bad_request(e.to_string()))?;
    let target = match req.surface.as_deref() {
        Some(raw) => {
            let surface: Surface = raw.parse().map_err(|e| bad_request(format!("{e}")))?;
            Target::surface(tooth, surface)
        }
        None => Target::tooth(tooth),
    };
    let mode = if req.evolution {
        dentachart_core::EditingMode::Evolution
    } else {
        dentachart_core::EditingMode::Baseline
    };

    let applied = state.engine.apply(&req.chart, tool, target, mode);
    Ok(Json(ApplyToolRes {
        chart: applied.chart,
        outcome: applied.outcome,
    }))
}

#[utoipa::path(
    post,
    path = "/charts/findings",
    request_body = ChartReq,
    responses(
        (status = 200, description = "Findings in tooth and surface order", body = FindingsRes)
    )
)]
#[axum::debug_handler]
pub(crate) async fn chart_findings(Json(req): Json<ChartReq>) -> Json<FindingsRes> {
    let findings = extract(&req.chart);
    let summary = summarise(&findings);
    Json(FindingsRes { findings, summary })
}

#[utoipa::path(
    post,
    path = "/charts/diff",
    request_body = DiffReq,
    responses(
        (status = 200, description = "Changes from baseline to evolution", body = DiffRes)
    )
)]
#[axum::debug_handler]
pub(crate) async fn chart_diff(Json(req): Json<DiffReq>) -> Json<DiffRes> {
    let diff = diff(&req.baseline, &req.evolution);
    let cured = diff.cured_count();
    Json(DiffRes { diff, cured })
}

#[utoipa::path(
    get,
    path = "/patients/{id}/plan-items",
    params(("id" = u64, Path, description = "Patient id")),
    responses(
        (status = 200, description = "Plan items with active budget items", body = PlanItemsRes),
        (status = 500, description = "Internal server error")
    )
)]
#[axum::debug_handler]
pub(crate) async fn list_plan_items(
    State(state): State<AppState>,
    AxumPath(patient): AxumPath<u64>,
) -> ApiResult<Json<PlanItemsRes>> {
    let items = state
        .sync
        .plan_items(PatientId(patient))
        .await
        .map_err(dental_error)?;
    Ok(Json(PlanItemsRes { items, created: 0 }))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/plan-items/sync",
    params(("id" = u64, Path, description = "Patient id")),
    request_body = SyncReq,
    responses(
        (status = 200, description = "Plan items for every current finding", body = PlanItemsRes),
        (status = 400, description = "Bad request"),
        (status = 500, description = "Internal server error")
    )
)]
/// Give every finding on the chart a stable plan item. Repeating the call with the same
/// findings returns the same ids.
#[axum::debug_handler]
pub(crate) async fn sync_plan_items(
    State(state): State<AppState>,
    AxumPath(patient): AxumPath<u64>,
    Json(req): Json<SyncReq>,
) -> ApiResult<Json<PlanItemsRes>> {
    let snapshot = parse_snapshot(req.snapshot_id)?;
    let synced = state
        .sync
        .sync_from_odontogram(PatientId(patient), snapshot, &req.chart)
        .await
        .map_err(dental_error)?;
    let created = synced.created();
    Ok(Json(PlanItemsRes {
        items: synced.into_items(),
        created,
    }))
}

#[utoipa::path(
    post,
    path = "/patients/{id}/treatment-plans",
    params(("id" = u64, Path, description = "Patient id")),
    request_body = SavePlanReq,
    responses(
        (status = 201, description = "Treatment plan saved", body = SavePlanRes),
        (status = 400, description = "Missing title or malformed request"),
        (status = 500, description = "A repository step failed")
    )
)]
#[axum::debug_handler]
pub(crate) async fn save_treatment_plan(
    State(state): State<AppState>,
    AxumPath(patient): AxumPath<u64>,
    Json(req): Json<SavePlanReq>,
) -> ApiResult<(StatusCode, Json<SavePlanRes>)> {
    let snapshot_id = parse_snapshot(req.snapshot_id)?;
    let services = req
        .services
        .into_iter()
        .map(parse_pending)
        .collect::<ApiResult<Vec<_>>>()?;

    let saved = state
        .sync
        .save_treatment_plan(SaveTreatmentPlan {
            patient_id: PatientId(patient),
            snapshot_id,
            title: req.title,
            notes: req.notes,
            chart: req.chart,
            services,
        })
        .await
        .map_err(dental_error)?;

    Ok((
        StatusCode::CREATED,
        Json(SavePlanRes {
            plan: saved.plan,
            budget: saved.budget,
            plan_items: saved.plan_items.into_items(),
            budget_items: saved.budget_items,
            dropped: saved.dropped,
        }),
    ))
}

fn parse_plan_id(raw: &str) -> ApiResult<PlanId> {
    raw.parse()
        .map_err(|_| bad_request(format!("invalid treatment plan id '{raw}'")))
}

#[utoipa::path(
    get,
    path = "/treatment-plans/{id}",
    params(("id" = String, Path, description = "Treatment plan id")),
    responses(
        (status = 200, description = "Treatment plan", body = PlanRes),
        (status = 404, description = "Unknown plan")
    )
)]
#[axum::debug_handler]
pub(crate) async fn get_treatment_plan(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<PlanRes>> {
    let plan = state
        .sync
        .load_plan(parse_plan_id(&id)?)
        .await
        .map_err(dental_error)?;
    Ok(Json(PlanRes { plan }))
}

#[utoipa::path(
    put,
    path = "/treatment-plans/{id}/evolution",
    params(("id" = String, Path, description = "Treatment plan id")),
    request_body = ChartReq,
    responses(
        (status = 200, description = "Evolution chart replaced", body = EvolutionRes),
        (status = 404, description = "Unknown plan")
    )
)]
/// Replace the plan's evolution chart and report how it differs from the baseline.
#[axum::debug_handler]
pub(crate) async fn update_evolution(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
    Json(req): Json<ChartReq>,
) -> ApiResult<Json<EvolutionRes>> {
    let plan_id = parse_plan_id(&id)?;
    let plan = state.sync.load_plan(plan_id).await.map_err(dental_error)?;
    let changes = diff(&plan.chart, &req.chart);
    state
        .sync
        .update_evolution(plan_id, req.chart)
        .await
        .map_err(dental_error)?;

    let cured = changes.cured_count();
    Ok(Json(EvolutionRes {
        plan_id: plan_id.to_string(),
        diff: changes,
        cured,
    }))
}

#[utoipa::path(
    delete,
    path = "/budget-items/{id}",
    params(("id" = String, Path, description = "Budget item id")),
    responses(
        (status = 204, description = "Service removed from its finding"),
        (status = 404, description = "Unknown budget item")
    )
)]
#[axum::debug_handler]
pub(crate) async fn remove_budget_item(
    State(state): State<AppState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<StatusCode> {
    let budget_item: BudgetItemId = id
        .parse()
        .map_err(|_| bad_request(format!("invalid budget item id '{id}'")))?;
    state
        .sync
        .remove_service_from_finding(budget_item)
        .await
        .map_err(dental_error)?;
    Ok(StatusCode::NO_CONTENT)
}
