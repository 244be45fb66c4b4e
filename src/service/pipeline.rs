//! Pipeline Orchestrator: drives a bounded worker pool over submission
//! units and assembles the run report.
//!
//! Per-unit state machine: pending -> (skip | classifying -> (committed |
//! failed)). A unit's terminal failure never cancels its siblings; the
//! run always completes over the full unit set and reports partial
//! success. Within one unit, classification strictly precedes the
//! taxonomy update, which strictly precedes result persistence. No
//! ordering holds across units.

use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::db::store::ResultStore;
use crate::model::{
    Classification, ClassificationRecord, QuestionInfo, RunReport, SimilarRejection,
    SubmissionUnit, TaxonomyEntry, UnitFailure,
};
use crate::service::classifier::Classifier;
use crate::service::taxonomy::{ProposalOutcome, TaxonomyManager};

#[derive(Debug)]
enum UnitStatus {
    Committed,
    Skipped,
    Failed(String),
}

#[derive(Debug)]
struct UnitOutcome {
    fingerprint: String,
    status: UnitStatus,
    new_entry: Option<TaxonomyEntry>,
    rejection: Option<SimilarRejection>,
    category: Option<String>,
}

impl UnitOutcome {
    fn skipped(fingerprint: String) -> Self {
        Self {
            fingerprint,
            status: UnitStatus::Skipped,
            new_entry: None,
            rejection: None,
            category: None,
        }
    }

    fn failed(fingerprint: String, reason: String) -> Self {
        Self {
            fingerprint,
            status: UnitStatus::Failed(reason),
            new_entry: None,
            rejection: None,
            category: None,
        }
    }
}

pub struct Orchestrator {
    store: Arc<dyn ResultStore>,
    taxonomy: Arc<TaxonomyManager>,
    classifier: Arc<dyn Classifier>,
    question: QuestionInfo,
    max_workers: usize,
    request_delay: Duration,
}

impl Orchestrator {
    pub fn new(
        store: Arc<dyn ResultStore>,
        taxonomy: Arc<TaxonomyManager>,
        classifier: Arc<dyn Classifier>,
        question: QuestionInfo,
        max_workers: usize,
        request_delay: Duration,
    ) -> Self {
        Self {
            store,
            taxonomy,
            classifier,
            question,
            max_workers: max_workers.max(1),
            request_delay,
        }
    }

    /// Process every unit and return the run report. Never fails as a
    /// whole: per-unit errors become report entries.
    pub async fn run(&self, units: Vec<SubmissionUnit>, term_id: i64, question_id: i64) -> RunReport {
        let total = units.len();
        let started = Instant::now();

        tracing::info!(
            term_id,
            question_id,
            units = total,
            workers = self.max_workers,
            "classification run starting"
        );

        let outcomes: Vec<UnitOutcome> = stream::iter(units)
            .map(|unit| self.process_unit(unit))
            .buffer_unordered(self.max_workers)
            .collect()
            .await;

        let mut report = RunReport::new(term_id, question_id);
        report.total_units = total;

        for outcome in outcomes {
            match outcome.status {
                UnitStatus::Committed => report.processed += 1,
                UnitStatus::Skipped => report.skipped += 1,
                UnitStatus::Failed(reason) => {
                    report.errored += 1;
                    report.failures.push(UnitFailure {
                        fingerprint: outcome.fingerprint,
                        reason,
                    });
                }
            }
            if let Some(entry) = outcome.new_entry {
                report.new_entries.push(entry);
            }
            if let Some(rejection) = outcome.rejection {
                report.similar_rejections.push(rejection);
            }
            if let Some(category) = outcome.category {
                *report.category_usage.entry(category).or_default() += 1;
            }
        }

        report.elapsed = started.elapsed();

        tracing::info!(
            term_id,
            question_id,
            processed = report.processed,
            skipped = report.skipped,
            errored = report.errored,
            elapsed_s = report.elapsed.as_secs_f64(),
            "classification run complete"
        );

        report
    }

    async fn process_unit(&self, unit: SubmissionUnit) -> UnitOutcome {
        let fingerprint = unit.fingerprint.clone();

        // Idempotency gate: a fingerprint that already has a result for
        // this question is never classified again.
        match self.store.result_exists(&fingerprint, unit.question_id).await {
            Ok(true) => {
                tracing::debug!(fingerprint = %fingerprint, "result exists, skipping");
                return UnitOutcome::skipped(fingerprint);
            }
            Ok(false) => {}
            Err(e) => {
                return UnitOutcome::failed(fingerprint, format!("idempotency check failed: {}", e))
            }
        }

        // A fresh snapshot per unit, so entries committed by concurrent
        // workers shape this prompt too.
        let snapshot = match self.taxonomy.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                return UnitOutcome::failed(fingerprint, format!("taxonomy snapshot failed: {}", e))
            }
        };

        let classification = match self.classifier.classify(&snapshot, &unit).await {
            Ok(classification) => classification,
            Err(e) => {
                tracing::warn!(fingerprint = %fingerprint, error = %e, "classification failed");
                return UnitOutcome::failed(fingerprint, e.to_string());
            }
        };

        let category = classification.entry.category.clone();

        let outcome = match self.taxonomy.propose(classification.entry.clone()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                return UnitOutcome::failed(fingerprint, format!("taxonomy update failed: {}", e))
            }
        };

        let (canonical, new_entry, rejection) = match outcome {
            ProposalOutcome::Accepted(entry) => (entry.clone(), Some(entry), None),
            ProposalOutcome::Duplicate => (classification.entry.clone(), None, None),
            ProposalOutcome::Merged {
                canonical,
                rejected,
            } => {
                let rejection = SimilarRejection {
                    category: rejected.category,
                    rejected_subcategory: rejected.subcategory,
                    canonical_subcategory: canonical.subcategory.clone(),
                };
                (canonical, None, Some(rejection))
            }
        };

        let record = self.build_record(&unit, canonical, &classification);
        if let Err(e) = self.store.insert_result(&record).await {
            tracing::error!(fingerprint = %fingerprint, error = %e, "result persistence failed");
            return UnitOutcome::failed(fingerprint, format!("persistence failed: {}", e));
        }

        if !self.request_delay.is_zero() {
            tokio::time::sleep(self.request_delay).await;
        }

        tracing::debug!(fingerprint = %fingerprint, "unit committed");

        UnitOutcome {
            fingerprint,
            status: UnitStatus::Committed,
            new_entry,
            rejection,
            category: Some(category),
        }
    }

    fn build_record(
        &self,
        unit: &SubmissionUnit,
        canonical: TaxonomyEntry,
        classification: &Classification,
    ) -> ClassificationRecord {
        ClassificationRecord {
            fingerprint: unit.fingerprint.clone(),
            question_id: unit.question_id,
            entry: canonical,
            specific_reason: classification.specific_reason.clone(),
            mark_code: classification.mark_code.clone(),
            reference_code: self.question.reference_code.clone().unwrap_or_default(),
            answer_code: unit.answer_code.clone(),
            error_info: unit.error_info.clone(),
            response: classification.raw.clone(),
        }
    }
}
