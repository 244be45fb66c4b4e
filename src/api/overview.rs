//! Overview endpoint: per (term, question) submission statistics

use actix_web::{get, web, HttpResponse};
use serde::Serialize;
use utoipa::ToSchema;

use crate::api::error::ApiError;
use crate::app::AppState;
use crate::db::queries::{self, OverviewRow};

#[derive(Debug, Serialize, ToSchema)]
pub struct OverviewResponse {
    pub questions: Vec<OverviewRow>,
    pub question_count: usize,
    pub total_users: i64,
    pub total_records: i64,
}

/// Submission statistics for every (term, question) pair in the records
/// table
#[utoipa::path(
    get,
    path = "/domain/api/overview",
    responses(
        (status = 200, description = "Overview retrieved", body = OverviewResponse),
        (status = 404, description = "Source records table is missing", body = crate::api::error::ErrorResponse),
        (status = 500, description = "Query failed", body = crate::api::error::ErrorResponse)
    ),
    tag = "overview"
)]
#[get("/domain/api/overview")]
pub async fn overview(state: web::Data<AppState>) -> Result<HttpResponse, ApiError> {
    let tables = &state.config.tables;

    if !queries::table_exists(&state.pool, &tables.records).await? {
        return Err(ApiError::NotFound(format!(
            "records table {} does not exist",
            tables.records
        )));
    }

    let rows = queries::with_retry(|| queries::overview(&state.pool, tables)).await?;

    let total_users = rows.iter().map(|r| r.user_count).sum();
    let total_records = rows.iter().map(|r| r.record_count).sum();

    Ok(HttpResponse::Ok().json(OverviewResponse {
        question_count: rows.len(),
        total_users,
        total_records,
        questions: rows,
    }))
}

/// Configure overview routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(overview);
}
