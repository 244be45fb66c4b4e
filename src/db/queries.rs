//! Read-side queries over the pre-existing LMS tables
//!
//! These back the query API. Connection-level failures are retried with a
//! short backoff; anything else fails the operation immediately.

use serde::Serialize;
use sqlx::mysql::MySqlPool;
use sqlx::{FromRow, Row};
use std::future::Future;
use std::time::Duration;
use utoipa::ToSchema;

use super::StoreError;
use crate::model::{QuestionInfo, RawRecord, TableConfig};

const QUERY_RETRIES: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(100);

/// Retry a read on connection errors. Persistence errors are not retried.
pub async fn with_retry<T, F, Fut>(op: F) -> Result<T, StoreError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(StoreError::Connection(e)) if attempt < QUERY_RETRIES => {
                tracing::warn!(
                    attempt,
                    max = QUERY_RETRIES,
                    error = %e,
                    "query failed on connection error, retrying"
                );
                tokio::time::sleep(RETRY_BACKOFF).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

pub async fn table_exists(pool: &MySqlPool, table: &str) -> Result<bool, StoreError> {
    let row = sqlx::query("SHOW TABLES LIKE ?")
        .bind(table)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

/// Raw answer records for one (term, question) pair. Records without a
/// computed fingerprint are excluded here, not in the aggregator.
pub async fn load_raw_records(
    pool: &MySqlPool,
    tables: &TableConfig,
    term_id: i64,
    question_id: i64,
) -> Result<Vec<RawRecord>, StoreError> {
    let records: Vec<RawRecord> = sqlx::query_as(&format!(
        "SELECT term_id, question_id, user_id, answer_code, error_info, \
         answer_hash AS fingerprint \
         FROM {} WHERE term_id = ? AND question_id = ? AND answer_hash IS NOT NULL",
        tables.records
    ))
    .bind(term_id)
    .bind(question_id)
    .fetch_all(pool)
    .await?;

    Ok(records)
}

pub async fn load_question_info(
    pool: &MySqlPool,
    tables: &TableConfig,
    question_id: i64,
) -> Result<Option<QuestionInfo>, StoreError> {
    let info: Option<QuestionInfo> = sqlx::query_as(&format!(
        "SELECT question_id, name, requirements, standard_code AS reference_code \
         FROM {} WHERE question_id = ?",
        tables.question_info
    ))
    .bind(question_id)
    .fetch_optional(pool)
    .await?;

    Ok(info)
}

/// One (fingerprint, user) pair from the records table, used to join
/// submitter lists onto stored results.
#[derive(Debug, Clone, FromRow)]
pub struct UserFingerprint {
    pub user_id: i64,
    pub fingerprint: String,
}

pub async fn load_user_fingerprints(
    pool: &MySqlPool,
    tables: &TableConfig,
    term_id: i64,
    question_id: i64,
) -> Result<Vec<UserFingerprint>, StoreError> {
    let rows: Vec<UserFingerprint> = sqlx::query_as(&format!(
        "SELECT user_id, answer_hash AS fingerprint FROM {} \
         WHERE term_id = ? AND question_id = ? AND answer_hash IS NOT NULL \
         ORDER BY user_id",
        tables.records
    ))
    .bind(term_id)
    .bind(question_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Per term/question aggregate served by the overview endpoint.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct OverviewRow {
    pub term_id: i64,
    pub question_id: i64,
    pub question_name: Option<String>,
    pub user_count: i64,
    pub record_count: i64,
    pub requirements: Option<String>,
    pub reference_code: Option<String>,
}

pub async fn overview(pool: &MySqlPool, tables: &TableConfig) -> Result<Vec<OverviewRow>, StoreError> {
    let rows: Vec<OverviewRow> = sqlx::query_as(&format!(
        "SELECT r.term_id, r.question_id, q.name AS question_name, \
         COUNT(DISTINCT r.user_id) AS user_count, COUNT(*) AS record_count, \
         q.requirements, q.standard_code AS reference_code \
         FROM {records} r \
         LEFT JOIN {questions} q ON r.question_id = q.question_id \
         WHERE r.answer_hash IS NOT NULL \
         GROUP BY r.term_id, r.question_id, q.name, q.requirements, q.standard_code \
         ORDER BY r.term_id, r.question_id",
        records = tables.records,
        questions = tables.question_info,
    ))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Number of distinct fingerprints among the records of one question.
pub async fn distinct_fingerprints(
    pool: &MySqlPool,
    tables: &TableConfig,
    term_id: i64,
    question_id: i64,
) -> Result<i64, StoreError> {
    let row = sqlx::query(&format!(
        "SELECT COUNT(DISTINCT answer_hash) AS fingerprints FROM {} \
         WHERE term_id = ? AND question_id = ? AND answer_hash IS NOT NULL",
        tables.records
    ))
    .bind(term_id)
    .bind(question_id)
    .fetch_one(pool)
    .await?;

    Ok(row.try_get("fingerprints").unwrap_or(0))
}
