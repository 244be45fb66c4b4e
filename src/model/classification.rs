//! Typed classifier output and the persisted result shape

use serde::{Deserialize, Serialize};

use super::taxonomy::TaxonomyEntry;

/// Wire shape of the classifier's JSON answer. Field names follow the
/// prompt contract; everything defaults to empty so that validation can
/// report which fields are missing instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClassifierResponse {
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub subcategory: String,
    #[serde(default, rename = "thirdCategory")]
    pub third_category: String,
    #[serde(default)]
    pub specific_reason: String,
    #[serde(default)]
    pub mark_code: String,
}

impl ClassifierResponse {
    /// Names of required fields that are absent or empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.category.trim().is_empty() {
            missing.push("category");
        }
        if self.subcategory.trim().is_empty() {
            missing.push("subcategory");
        }
        if self.third_category.trim().is_empty() {
            missing.push("thirdCategory");
        }
        if self.specific_reason.trim().is_empty() {
            missing.push("specific_reason");
        }
        if self.mark_code.trim().is_empty() {
            missing.push("mark_code");
        }
        missing
    }
}

/// A validated classification: the proposed taxonomy triple plus the
/// free-text reason and the marked code excerpt, with the raw response
/// retained for auditability.
#[derive(Debug, Clone)]
pub struct Classification {
    pub entry: TaxonomyEntry,
    pub specific_reason: String,
    pub mark_code: String,
    pub raw: serde_json::Value,
}

/// Row persisted into the per-question result table. The triple here is
/// the canonical one: when the taxonomy manager merges the proposed
/// subcategory into an existing similar one, the canonical triple is
/// what gets stored.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationRecord {
    pub fingerprint: String,
    pub question_id: i64,
    pub entry: TaxonomyEntry,
    pub specific_reason: String,
    pub mark_code: String,
    pub reference_code: String,
    pub answer_code: String,
    pub error_info: String,
    pub response: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_response_has_no_missing_fields() {
        let response: ClassifierResponse = serde_json::from_value(serde_json::json!({
            "category": "syntax",
            "subcategory": "unbalanced braces",
            "thirdCategory": "while loop",
            "specific_reason": "closing brace of the loop body is missing",
            "mark_code": "while (i < n) {"
        }))
        .unwrap();

        assert!(response.missing_fields().is_empty());
        assert_eq!(response.third_category, "while loop");
    }

    #[test]
    fn absent_and_empty_fields_are_both_reported() {
        let response: ClassifierResponse = serde_json::from_value(serde_json::json!({
            "category": "syntax",
            "subcategory": "  ",
            "specific_reason": "reason",
            "mark_code": "x = 1"
        }))
        .unwrap();

        assert_eq!(response.missing_fields(), vec!["subcategory", "thirdCategory"]);
    }
}
