//! Classification client for the external reasoning service
//!
//! Drives an OpenAI-compatible chat completions endpoint with a
//! taxonomy-aware prompt. Transport failures, non-success statuses and
//! malformed bodies share one retry budget per submission; a structurally
//! valid response with missing result fields is a terminal failure and is
//! never retried.

use async_trait::async_trait;
use reqwest::Client;
use std::future::Future;
use std::time::Duration;
use url::Url;

use crate::model::config::ClassifierConfig;
use crate::model::{
    Classification, ClassifierResponse, QuestionInfo, SubmissionUnit, TaxonomyEntry, TaxonomyTree,
};
use crate::service::prompts::PromptTemplates;

#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    /// Retry budget exhausted; carries the last observed failure.
    #[error("classifier unavailable after {attempts} attempts: {last_error}")]
    Unavailable { attempts: u32, last_error: String },

    /// The classifier answered with valid JSON that lacks required result
    /// fields. Reflects a malformed answer, not a transient fault.
    #[error("classifier response missing required fields: {}", missing.join(", "))]
    IncompleteResponse { missing: Vec<&'static str> },
}

/// Fixed-delay retry policy shared by all failure types of one submission.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }

    /// Run `op` until it succeeds or the attempt budget is spent.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ClassifyError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, String>>,
    {
        let mut last_error = String::new();
        for attempt in 1..=self.max_attempts {
            match op().await {
                Ok(value) => return Ok(value),
                Err(error) => {
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %error,
                        "classifier attempt failed"
                    );
                    last_error = error;
                }
            }
            if attempt < self.max_attempts {
                tokio::time::sleep(self.delay).await;
            }
        }

        Err(ClassifyError::Unavailable {
            attempts: self.max_attempts,
            last_error,
        })
    }
}

#[async_trait]
pub trait Classifier: Send + Sync {
    /// Classify one submission against the given taxonomy snapshot.
    async fn classify(
        &self,
        taxonomy: &TaxonomyTree,
        unit: &SubmissionUnit,
    ) -> Result<Classification, ClassifyError>;
}

/// HTTP client for the external classifier.
pub struct HttpClassifier {
    client: Client,
    endpoint: Url,
    api_key: String,
    model: String,
    temperature: f32,
    retry: RetryPolicy,
    templates: PromptTemplates,
    question: QuestionInfo,
}

impl HttpClassifier {
    pub fn new(
        config: &ClassifierConfig,
        templates: PromptTemplates,
        question: QuestionInfo,
    ) -> Self {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            endpoint: config.api_url.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
            retry: RetryPolicy::new(config.max_retry, Duration::from_secs(1)),
            templates,
            question,
        }
    }

    /// One request/parse attempt. Every failure mode collapses to a string
    /// so the retry policy treats them uniformly.
    async fn request_once(&self, body: &serde_json::Value) -> Result<serde_json::Value, String> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("transport error: {}", e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!(
                "HTTP {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            ));
        }

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| format!("malformed response body: {}", e))?;

        let content = payload
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| "response carries no message content".to_string())?;

        serde_json::from_str(content).map_err(|e| format!("message content is not JSON: {}", e))
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    async fn classify(
        &self,
        taxonomy: &TaxonomyTree,
        unit: &SubmissionUnit,
    ) -> Result<Classification, ClassifyError> {
        let system_prompt = self.templates.system_prompt(taxonomy);
        let user_prompt = self.templates.user_prompt(&self.question, unit);

        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt },
            ],
        });

        let start = std::time::Instant::now();
        let raw = self.retry.run(|| self.request_once(&body)).await?;

        tracing::debug!(
            fingerprint = %unit.fingerprint,
            model = %self.model,
            elapsed_ms = start.elapsed().as_millis(),
            "classifier call completed"
        );

        parse_classification(raw)
    }
}

/// Validate the raw classifier answer and convert it to a typed result.
pub fn parse_classification(raw: serde_json::Value) -> Result<Classification, ClassifyError> {
    let response: ClassifierResponse = serde_json::from_value(raw.clone()).unwrap_or_default();

    let missing = response.missing_fields();
    if !missing.is_empty() {
        return Err(ClassifyError::IncompleteResponse { missing });
    }

    Ok(Classification {
        entry: TaxonomyEntry {
            category: response.category,
            subcategory: response.subcategory,
            third_category: response.third_category,
        },
        specific_reason: response.specific_reason,
        mark_code: response.mark_code,
        raw,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn complete_raw() -> serde_json::Value {
        serde_json::json!({
            "category": "syntax",
            "subcategory": "unbalanced braces",
            "thirdCategory": "while loop",
            "specific_reason": "closing brace of the loop body is missing",
            "mark_code": "while (i < n) {",
        })
    }

    #[tokio::test]
    async fn retry_makes_exactly_max_attempts_then_fails() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let attempts = AtomicU32::new(0);

        let result: Result<(), _> = policy
            .run(|| {
                attempts.fetch_add(1, Ordering::SeqCst);
                async { Err("request timed out".to_string()) }
            })
            .await;

        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        match result {
            Err(ClassifyError::Unavailable {
                attempts,
                last_error,
            }) => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error, "request timed out");
            }
            other => panic!("expected Unavailable, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn retry_stops_on_first_success() {
        let policy = RetryPolicy::new(3, Duration::ZERO);
        let attempts = AtomicU32::new(0);

        let result = policy
            .run(|| {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 1 {
                        Ok(42)
                    } else {
                        Err("flaky".to_string())
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn complete_response_parses() {
        let classification = parse_classification(complete_raw()).unwrap();
        assert_eq!(classification.entry.category, "syntax");
        assert_eq!(classification.entry.third_category, "while loop");
        assert_eq!(classification.raw, complete_raw());
    }

    #[test]
    fn missing_third_category_is_terminal() {
        let mut raw = complete_raw();
        raw.as_object_mut().unwrap().remove("thirdCategory");

        match parse_classification(raw) {
            Err(ClassifyError::IncompleteResponse { missing }) => {
                assert_eq!(missing, vec!["thirdCategory"]);
            }
            other => panic!("expected IncompleteResponse, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn non_object_response_reports_all_fields_missing() {
        match parse_classification(serde_json::json!(["not", "an", "object"])) {
            Err(ClassifyError::IncompleteResponse { missing }) => {
                assert_eq!(missing.len(), 5);
            }
            other => panic!("expected IncompleteResponse, got {:?}", other.map(|_| ())),
        }
    }
}
