//! OpenAPI specification endpoints

use actix_web::{get, HttpResponse, Responder};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "errclass",
        description = "Error classification convergence service for student code submissions"
    ),
    paths(
        crate::api::overview::overview,
        crate::api::clustering::clustering,
        crate::api::health::health,
    ),
    components(schemas(
        crate::api::error::ErrorResponse,
        crate::api::overview::OverviewResponse,
        crate::api::clustering::ClusteringResponse,
        crate::api::clustering::ClusteredResult,
        crate::api::health::HealthStatus,
        crate::db::queries::OverviewRow,
        crate::db::store::StoredResult,
    )),
    tags(
        (name = "overview", description = "Submission statistics"),
        (name = "clustering", description = "Classification results"),
        (name = "health", description = "Service health"),
    )
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
#[get("/openapi.json")]
pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

/// Configure OpenAPI routes
pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(openapi_json);
}
