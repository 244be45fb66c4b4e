//! Entry points for the two pipeline stages
//!
//! `prepare` aggregates raw records and writes the aggregation snapshot;
//! `classify` runs the full convergence pipeline. Both are called from the
//! CLI and from the clustering endpoint.

use chrono::Utc;
use serde::Serialize;
use sqlx::mysql::MySqlPool;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::db::queries::{load_question_info, load_raw_records};
use crate::db::store::{MySqlResultStore, ResultStore};
use crate::db::StoreError;
use crate::model::{Config, ConfigError, RunReport};
use crate::service::aggregator::{aggregate, AggregateError};
use crate::service::classifier::HttpClassifier;
use crate::service::pipeline::Orchestrator;
use crate::service::prompts::PromptTemplates;
use crate::service::taxonomy::TaxonomyManager;

/// Pipeline stage names as they appear in logs and API errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Prepare,
    Classify,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Prepare => write!(f, "prepare"),
            Stage::Classify => write!(f, "classify"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error("question {0} not found")]
    QuestionNotFound(i64),

    #[error("failed to write run artifact: {0}")]
    Io(#[from] std::io::Error),
}

/// Outcome of the prepare stage.
#[derive(Debug, Serialize)]
pub struct PrepareSummary {
    pub term_id: i64,
    pub question_id: i64,
    pub record_count: usize,
    pub unit_count: usize,
    pub artifact: PathBuf,
}

/// Aggregate raw answer records into submission units and write the
/// aggregation snapshot artifact.
pub async fn prepare(
    config: &Config,
    pool: &MySqlPool,
    question_id: i64,
    term_id: i64,
) -> Result<PrepareSummary, RunError> {
    tracing::info!(term_id, question_id, "prepare stage starting");

    let records = load_raw_records(pool, &config.tables, term_id, question_id).await?;
    let record_count = records.len();
    let units = aggregate(records)?;

    std::fs::create_dir_all(&config.report_dir)?;
    let artifact = config.report_dir.join(format!(
        "aggregate_{}_{}_{}.json",
        term_id,
        question_id,
        Utc::now().format("%Y%m%d_%H%M%S")
    ));
    let json = serde_json::to_string_pretty(&units)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
    std::fs::write(&artifact, json)?;

    tracing::info!(
        term_id,
        question_id,
        records = record_count,
        units = units.len(),
        artifact = %artifact.display(),
        "prepare stage complete"
    );

    Ok(PrepareSummary {
        term_id,
        question_id,
        record_count,
        unit_count: units.len(),
        artifact,
    })
}

/// Run the full classification pipeline for one (term, question) pair and
/// write the run report artifact.
pub async fn classify(
    config: &Config,
    pool: &MySqlPool,
    term_id: i64,
    question_id: i64,
) -> Result<RunReport, RunError> {
    tracing::info!(term_id, question_id, "classify stage starting");

    let question = load_question_info(pool, &config.tables, question_id)
        .await?
        .ok_or(RunError::QuestionNotFound(question_id))?;

    let store = Arc::new(MySqlResultStore::new(pool.clone(), term_id, question_id));
    store.ensure_schema().await?;

    let records = load_raw_records(pool, &config.tables, term_id, question_id).await?;
    let units = aggregate(records)?;

    let templates = PromptTemplates::load(&config.prompts)?;
    let classifier = Arc::new(HttpClassifier::new(
        &config.classifier,
        templates,
        question.clone(),
    ));
    let taxonomy = Arc::new(TaxonomyManager::new(store.clone()));

    let orchestrator = Orchestrator::new(
        store,
        taxonomy,
        classifier,
        question,
        config.pipeline.max_workers,
        config.pipeline.request_delay(),
    );

    let report = orchestrator.run(units, term_id, question_id).await;

    match report.write_to(&config.report_dir) {
        Ok(path) => tracing::info!(path = %path.display(), "run report written"),
        Err(e) => tracing::warn!(error = %e, "failed to write run report"),
    }

    Ok(report)
}
