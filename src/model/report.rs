//! Per-run report assembled by the orchestrator
//!
//! Each run constructs its own report value; there is no process-wide
//! accumulator. The report is rendered to a flat text artifact at run end.

use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::taxonomy::TaxonomyEntry;

/// A unit that failed terminally, with the reason the worker recorded.
#[derive(Debug, Clone, Serialize)]
pub struct UnitFailure {
    pub fingerprint: String,
    pub reason: String,
}

/// A proposed subcategory rejected because an existing one under the same
/// category scored above the similarity threshold.
#[derive(Debug, Clone, Serialize)]
pub struct SimilarRejection {
    pub category: String,
    pub rejected_subcategory: String,
    pub canonical_subcategory: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub term_id: i64,
    pub question_id: i64,
    pub total_units: usize,
    pub processed: usize,
    pub skipped: usize,
    pub errored: usize,
    pub failures: Vec<UnitFailure>,
    pub new_entries: Vec<TaxonomyEntry>,
    pub similar_rejections: Vec<SimilarRejection>,
    pub category_usage: BTreeMap<String, u64>,
    pub elapsed: Duration,
}

impl RunReport {
    pub fn new(term_id: i64, question_id: i64) -> Self {
        Self {
            term_id,
            question_id,
            total_units: 0,
            processed: 0,
            skipped: 0,
            errored: 0,
            failures: Vec::new(),
            new_entries: Vec::new(),
            similar_rejections: Vec::new(),
            category_usage: BTreeMap::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// `rejected / (accepted + rejected)`, or `None` when the run proposed
    /// nothing new at all.
    pub fn duplicate_avoidance_rate(&self) -> Option<f64> {
        let accepted = self.new_entries.len();
        let rejected = self.similar_rejections.len();
        if accepted + rejected == 0 {
            return None;
        }
        Some(rejected as f64 / (accepted + rejected) as f64)
    }

    pub fn success_rate(&self) -> f64 {
        if self.total_units == 0 {
            return 0.0;
        }
        self.processed as f64 / self.total_units as f64 * 100.0
    }

    /// Flat text rendering written as the run artifact.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "Classification run report - {}",
            Utc::now().format("%Y-%m-%d %H:%M:%S")
        );
        let _ = writeln!(
            out,
            "term_id: {}, question_id: {}",
            self.term_id, self.question_id
        );
        out.push('\n');

        let _ = writeln!(out, "=== Processing ===");
        let _ = writeln!(out, "total units: {}", self.total_units);
        let _ = writeln!(out, "processed:   {}", self.processed);
        let _ = writeln!(out, "skipped:     {}", self.skipped);
        let _ = writeln!(out, "errored:     {}", self.errored);
        let _ = writeln!(out, "success rate: {:.1}%", self.success_rate());
        let _ = writeln!(out, "elapsed: {:.2}s", self.elapsed.as_secs_f64());
        out.push('\n');

        if self.failures.is_empty() {
            let _ = writeln!(out, "=== Failures ===\nnone");
        } else {
            let _ = writeln!(out, "=== Failures ({}) ===", self.failures.len());
            for failure in &self.failures {
                let _ = writeln!(out, "  {}: {}", failure.fingerprint, failure.reason);
            }
        }
        out.push('\n');

        let _ = writeln!(out, "=== Taxonomy updates ===");
        if !self.category_usage.is_empty() {
            let _ = writeln!(out, "category usage:");
            for (category, count) in &self.category_usage {
                let _ = writeln!(out, "  {}: {}", category, count);
            }
        }
        if self.new_entries.is_empty() {
            let _ = writeln!(out, "new entries: none");
        } else {
            let _ = writeln!(out, "new entries ({}):", self.new_entries.len());
            for entry in &self.new_entries {
                let _ = writeln!(out, "  + {}", entry);
            }
        }
        if self.similar_rejections.is_empty() {
            let _ = writeln!(out, "rejected as similar: none");
        } else {
            let _ = writeln!(
                out,
                "rejected as similar ({}):",
                self.similar_rejections.len()
            );
            for rejection in &self.similar_rejections {
                let _ = writeln!(
                    out,
                    "  - {} -> {} (kept: {})",
                    rejection.category,
                    rejection.rejected_subcategory,
                    rejection.canonical_subcategory
                );
            }
        }
        if let Some(rate) = self.duplicate_avoidance_rate() {
            let _ = writeln!(out, "duplicate-avoidance rate: {:.1}%", rate * 100.0);
        }

        out
    }

    /// Write the rendered report under `dir`, returning the artifact path.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let filename = format!(
            "report_{}_{}_{}.txt",
            self.term_id,
            self.question_id,
            Utc::now().format("%Y%m%d_%H%M%S")
        );
        let path = dir.join(filename);
        std::fs::write(&path, self.render())?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_report() -> RunReport {
        let mut report = RunReport::new(7, 42);
        report.total_units = 5;
        report.processed = 3;
        report.skipped = 1;
        report.errored = 1;
        report.failures.push(UnitFailure {
            fingerprint: "abc123".to_string(),
            reason: "classifier unavailable after 3 attempts: timeout".to_string(),
        });
        report
            .new_entries
            .push(TaxonomyEntry::new("logic", "off by one", "loop bound"));
        report.similar_rejections.push(SimilarRejection {
            category: "logic".to_string(),
            rejected_subcategory: "one off".to_string(),
            canonical_subcategory: "off by one".to_string(),
        });
        report.category_usage.insert("logic".to_string(), 4);
        report
    }

    #[test]
    fn avoidance_rate_is_rejected_over_total() {
        let report = sample_report();
        let rate = report.duplicate_avoidance_rate().unwrap();
        assert!((rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn avoidance_rate_absent_without_proposals() {
        let report = RunReport::new(1, 1);
        assert!(report.duplicate_avoidance_rate().is_none());
    }

    #[test]
    fn render_contains_counts_and_rejections() {
        let text = sample_report().render();
        assert!(text.contains("total units: 5"));
        assert!(text.contains("processed:   3"));
        assert!(text.contains("abc123"));
        assert!(text.contains("off by one"));
        assert!(text.contains("duplicate-avoidance rate: 50.0%"));
    }

    #[test]
    fn write_to_creates_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = sample_report().write_to(dir.path()).unwrap();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("term_id: 7, question_id: 42"));
    }
}
