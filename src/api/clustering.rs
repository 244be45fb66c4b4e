//! Clustering endpoint: classification results joined with submitter lists
//!
//! When no results exist for the requested (term, question) pair the
//! endpoint runs the prepare and classify stages itself before serving,
//! so the first caller pays for the run and every later caller reads the
//! stored rows.

use actix_web::{post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use utoipa::{IntoParams, ToSchema};

use crate::api::error::ApiError;
use crate::app::AppState;
use crate::db::queries;
use crate::db::store::{MySqlResultStore, StoredResult};
use crate::service::trigger::{self, Stage};

#[derive(Debug, Deserialize, IntoParams)]
pub struct ClusteringParams {
    pub term_id: i64,
    pub question_id: i64,
}

/// One stored result with the users whose submissions share its
/// fingerprint.
#[derive(Debug, Serialize, ToSchema)]
pub struct ClusteredResult {
    #[serde(flatten)]
    pub result: StoredResult,
    pub user_ids: Vec<i64>,
    pub user_count: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ClusteringResponse {
    pub term_id: i64,
    pub question_id: i64,
    pub results: Vec<ClusteredResult>,
    pub result_count: usize,
    /// Result rows per top-level category
    pub category_counts: BTreeMap<String, usize>,
    /// Distinct fingerprints among the raw records, for coverage checks
    pub fingerprint_count: i64,
    /// Whether this request triggered a pipeline run
    pub pipeline_ran: bool,
}

/// Classification results for one (term, question) pair, running the
/// pipeline first when none exist yet
#[utoipa::path(
    post,
    path = "/domain/api/clustering",
    params(ClusteringParams),
    responses(
        (status = 200, description = "Results retrieved", body = ClusteringResponse),
        (status = 404, description = "Question not found", body = crate::api::error::ErrorResponse),
        (status = 500, description = "Query or pipeline failure", body = crate::api::error::ErrorResponse)
    ),
    tag = "clustering"
)]
#[post("/domain/api/clustering")]
pub async fn clustering(
    state: web::Data<AppState>,
    params: web::Query<ClusteringParams>,
) -> Result<HttpResponse, ApiError> {
    let term_id = params.term_id;
    let question_id = params.question_id;
    let store = MySqlResultStore::new(state.pool.clone(), term_id, question_id);

    let mut results = load_existing(&state, &store).await?;
    let mut pipeline_ran = false;

    if results.is_empty() {
        tracing::info!(term_id, question_id, "no stored results, running pipeline");

        trigger::prepare(&state.config, &state.pool, question_id, term_id)
            .await
            .map_err(|e| ApiError::from_stage(Stage::Prepare, e))?;
        trigger::classify(&state.config, &state.pool, term_id, question_id)
            .await
            .map_err(|e| ApiError::from_stage(Stage::Classify, e))?;

        pipeline_ran = true;
        results = queries::with_retry(|| store.fetch_results()).await?;
    }

    let fingerprints = queries::with_retry(|| {
        queries::load_user_fingerprints(&state.pool, &state.config.tables, term_id, question_id)
    })
    .await?;

    let mut users_by_fingerprint: HashMap<String, Vec<i64>> = HashMap::new();
    for row in fingerprints {
        users_by_fingerprint
            .entry(row.fingerprint)
            .or_default()
            .push(row.user_id);
    }

    let clustered: Vec<ClusteredResult> = results
        .into_iter()
        .map(|result| {
            let user_ids = users_by_fingerprint
                .remove(&result.fingerprint)
                .unwrap_or_default();
            ClusteredResult {
                user_count: user_ids.len(),
                user_ids,
                result,
            }
        })
        .collect();

    let fingerprint_count = queries::with_retry(|| {
        queries::distinct_fingerprints(&state.pool, &state.config.tables, term_id, question_id)
    })
    .await?;

    let mut category_counts: BTreeMap<String, usize> = BTreeMap::new();
    for clustered_result in &clustered {
        if let Some(category) = &clustered_result.result.category {
            *category_counts.entry(category.clone()).or_default() += 1;
        }
    }

    Ok(HttpResponse::Ok().json(ClusteringResponse {
        term_id,
        question_id,
        result_count: clustered.len(),
        results: clustered,
        category_counts,
        fingerprint_count,
        pipeline_ran,
    }))
}

/// Stored results, or an empty list when the result table does not exist
/// yet. A missing table here means the pipeline has not run, not an error.
async fn load_existing(
    state: &AppState,
    store: &MySqlResultStore,
) -> Result<Vec<StoredResult>, ApiError> {
    if !queries::table_exists(&state.pool, store.result_table()).await? {
        return Ok(Vec::new());
    }
    Ok(queries::with_retry(|| store.fetch_results()).await?)
}

/// Configure clustering routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(clustering);
}
