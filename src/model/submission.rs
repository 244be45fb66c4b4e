//! Raw submission records and fingerprint-deduplicated units

use serde::Serialize;
use sqlx::FromRow;

/// One row of the LMS answer-record table. Records whose fingerprint was
/// never computed upstream carry `None` and are excluded from aggregation.
#[derive(Debug, Clone, FromRow)]
pub struct RawRecord {
    pub term_id: i64,
    pub question_id: i64,
    pub user_id: i64,
    pub answer_code: Option<String>,
    pub error_info: Option<String>,
    pub fingerprint: Option<String>,
}

/// One fingerprint-deduplicated submission, classified exactly once.
///
/// Carries the union of submitter ids and the code/diagnostic text of an
/// arbitrary representative member: all records sharing a fingerprint are
/// assumed to carry identical content. That assumption comes from the
/// upstream hashing step and is not re-verified here.
#[derive(Debug, Clone, Serialize)]
pub struct SubmissionUnit {
    pub fingerprint: String,
    pub term_id: i64,
    pub question_id: i64,
    pub user_ids: Vec<i64>,
    pub answer_code: String,
    pub error_info: String,
}

impl SubmissionUnit {
    pub fn user_count(&self) -> usize {
        self.user_ids.len()
    }
}

/// Assignment question metadata used for prompt construction.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct QuestionInfo {
    pub question_id: i64,
    pub name: Option<String>,
    pub requirements: Option<String>,
    pub reference_code: Option<String>,
}
