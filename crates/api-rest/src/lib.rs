//! # API REST
//!
//! REST API for the dental charting engine.
//!
//! Handles:
//! - HTTP endpoints with axum
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (JSON bodies, status codes, CORS)
//!
//! Charting and plan logic live in `dentachart-core`; this crate only translates HTTP.

#![warn(rust_2018_idioms)]

mod dto;
mod handlers;
pub mod settings;

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use dentachart_catalog::ToothRegistry;
use dentachart_core::{PlanSync, ToolEngine};
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use settings::{RestSettings, StoreKind};

/// Shared state for every handler.
#[derive(Clone)]
pub struct AppState {
    sync: PlanSync,
    engine: ToolEngine,
    registry: ToothRegistry,
}

impl AppState {
    pub fn new(sync: PlanSync) -> Self {
        let engine = ToolEngine::new(*sync.catalog());
        Self {
            sync,
            engine,
            registry: ToothRegistry::new(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health,
        handlers::list_procedures,
        handlers::list_teeth,
        handlers::list_services,
        handlers::apply_tool,
        handlers::chart_findings,
        handlers::chart_diff,
        handlers::list_plan_items,
        handlers::sync_plan_items,
        handlers::save_treatment_plan,
        handlers::get_treatment_plan,
        handlers::update_evolution,
        handlers::remove_budget_item,
    ),
    components(schemas(
        dto::HealthRes,
        dto::ProceduresRes,
        dto::TeethRes,
        dto::ServicesRes,
        dto::ApplyToolReq,
        dto::ApplyToolRes,
        dto::ChartReq,
        dto::FindingsRes,
        dto::DiffReq,
        dto::DiffRes,
        dto::SyncReq,
        dto::PlanItemsRes,
        dto::PendingServiceReq,
        dto::SavePlanReq,
        dto::SavePlanRes,
        dto::PlanRes,
        dto::EvolutionRes,
        dto::ErrorRes,
    ))
)]
pub struct ApiDoc;

/// Builds the REST router with Swagger UI and permissive CORS.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/catalog/procedures", get(handlers::list_procedures))
        .route("/catalog/teeth", get(handlers::list_teeth))
        .route("/catalog/services", get(handlers::list_services))
        .route("/charts/apply", post(handlers::apply_tool))
        .route("/charts/findings", post(handlers::chart_findings))
        .route("/charts/diff", post(handlers::chart_diff))
        .route("/patients/:id/plan-items", get(handlers::list_plan_items))
        .route("/patients/:id/plan-items/sync", post(handlers::sync_plan_items))
        .route("/patients/:id/treatment-plans", post(handlers::save_treatment_plan))
        .route("/treatment-plans/:id", get(handlers::get_treatment_plan))
        .route("/treatment-plans/:id/evolution", put(handlers::update_evolution))
        .route("/budget-items/:id", delete(handlers::remove_budget_item))
        .merge(
            SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .layer(CorsLayer::permissive())
        .with_state(state)
}
