//! Prompt template loading and placeholder substitution

use std::fs;

use crate::model::config::{ConfigError, PromptConfig};
use crate::model::{QuestionInfo, SubmissionUnit, TaxonomyTree};

const TAXONOMY_PLACEHOLDER: &str = "{taxonomy}";
const REQUIREMENTS_PLACEHOLDER: &str = "{requirements}";
const REFERENCE_CODE_PLACEHOLDER: &str = "{reference_code}";
const ANSWER_CODE_PLACEHOLDER: &str = "{answer_code}";
const ERROR_INFO_PLACEHOLDER: &str = "{error_info}";

/// System and user prompt templates, read once per run.
#[derive(Debug, Clone)]
pub struct PromptTemplates {
    system: String,
    user: String,
}

impl PromptTemplates {
    pub fn load(config: &PromptConfig) -> Result<Self, ConfigError> {
        let read = |path: &std::path::Path| {
            fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
                path: path.display().to_string(),
                source,
            })
        };

        Ok(Self {
            system: read(&config.system_prompt_path)?,
            user: read(&config.user_prompt_path)?,
        })
    }

    #[cfg(test)]
    pub fn from_strings(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// System prompt with the current taxonomy snapshot embedded. When the
    /// template carries no placeholder the taxonomy is appended, so the
    /// classifier always sees the existing tree.
    pub fn system_prompt(&self, taxonomy: &TaxonomyTree) -> String {
        let json = taxonomy.to_prompt_json();
        if self.system.contains(TAXONOMY_PLACEHOLDER) {
            self.system.replace(TAXONOMY_PLACEHOLDER, &json)
        } else {
            format!("{}\n\nExisting error taxonomy:\n{}\n", self.system, json)
        }
    }

    /// User prompt for one submission unit.
    pub fn user_prompt(&self, question: &QuestionInfo, unit: &SubmissionUnit) -> String {
        self.user
            .replace(
                REQUIREMENTS_PLACEHOLDER,
                question.requirements.as_deref().unwrap_or(""),
            )
            .replace(
                REFERENCE_CODE_PLACEHOLDER,
                question.reference_code.as_deref().unwrap_or(""),
            )
            .replace(ANSWER_CODE_PLACEHOLDER, &unit.answer_code)
            .replace(ERROR_INFO_PLACEHOLDER, &unit.error_info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TaxonomyEntry;

    fn question() -> QuestionInfo {
        QuestionInfo {
            question_id: 10,
            name: Some("fizzbuzz".to_string()),
            requirements: Some("print fizz for multiples of three".to_string()),
            reference_code: Some("for i in 1..=n {".to_string()),
        }
    }

    fn unit() -> SubmissionUnit {
        SubmissionUnit {
            fingerprint: "hash-a".to_string(),
            term_id: 1,
            question_id: 10,
            user_ids: vec![1],
            answer_code: "println!(\"fizz\")".to_string(),
            error_info: "expected `;`".to_string(),
        }
    }

    #[test]
    fn taxonomy_replaces_placeholder() {
        let templates = PromptTemplates::from_strings("Classify.\n{taxonomy}\nReply JSON.", "");
        let tree =
            TaxonomyTree::from_entries(vec![TaxonomyEntry::new("syntax", "stray semicolon", "x")]);

        let prompt = templates.system_prompt(&tree);

        assert!(prompt.contains("stray semicolon"));
        assert!(!prompt.contains(TAXONOMY_PLACEHOLDER));
    }

    #[test]
    fn taxonomy_is_appended_without_placeholder() {
        let templates = PromptTemplates::from_strings("Classify.", "");
        let prompt = templates.system_prompt(&TaxonomyTree::default());
        assert!(prompt.starts_with("Classify."));
        assert!(prompt.contains("Existing error taxonomy:"));
    }

    #[test]
    fn user_prompt_fills_all_placeholders() {
        let templates = PromptTemplates::from_strings(
            "",
            "Q: {requirements}\nRef: {reference_code}\nCode: {answer_code}\nErr: {error_info}",
        );

        let prompt = templates.user_prompt(&question(), &unit());

        assert!(prompt.contains("multiples of three"));
        assert!(prompt.contains("for i in 1..=n {"));
        assert!(prompt.contains("println!(\"fizz\")"));
        assert!(prompt.contains("expected `;`"));
    }

    #[test]
    fn missing_question_fields_become_empty() {
        let templates = PromptTemplates::from_strings("", "Q: {requirements}!");
        let mut question = question();
        question.requirements = None;
        assert_eq!(templates.user_prompt(&question, &unit()), "Q: !");
    }
}
