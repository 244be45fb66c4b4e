//! Result Store adapter: idempotent persistence of classification results
//! and taxonomy entries into per-(term, question) tables.
//!
//! Schema is ensured lazily on first use per question: tables are created
//! if absent and older result tables are migrated by adding the missing
//! columns. Migrations are additive only.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::mysql::MySqlPool;
use sqlx::{FromRow, Row};
use utoipa::ToSchema;

use super::StoreError;
use crate::model::{ClassificationRecord, TaxonomyEntry, TaxonomyTree};

/// Columns a result table must carry. Older tables are brought up to this
/// shape by `ALTER TABLE ... ADD COLUMN`, never by dropping anything.
const RESULT_COLUMNS: &[(&str, &str)] = &[
    ("question_id", "BIGINT NOT NULL DEFAULT 0"),
    ("category", "VARCHAR(255)"),
    ("subcategory", "VARCHAR(255)"),
    ("third_category", "VARCHAR(255)"),
    ("specific_reason", "VARCHAR(300)"),
    ("mark_code", "LONGTEXT"),
    ("reference_code", "LONGTEXT"),
    ("answer_code", "LONGTEXT"),
    ("error_info", "TEXT"),
    ("response", "JSON"),
    ("created_at", "TIMESTAMP DEFAULT CURRENT_TIMESTAMP"),
];

/// Durable storage contract used by the taxonomy manager and the
/// orchestrator. One store instance is scoped to a single
/// (term, question) pair.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Idempotency check: does a result row already exist for this
    /// fingerprint and question?
    async fn result_exists(&self, fingerprint: &str, question_id: i64)
        -> Result<bool, StoreError>;

    /// Insert a classification result. A concurrent duplicate loses the
    /// race silently: the unique key over (fingerprint, question_id) is
    /// the final arbiter and keeps the row count at one.
    async fn insert_result(&self, record: &ClassificationRecord) -> Result<(), StoreError>;

    async fn taxonomy_entry_exists(&self, entry: &TaxonomyEntry) -> Result<bool, StoreError>;

    /// All distinct subcategories currently stored under a category.
    async fn subcategories(&self, category: &str) -> Result<Vec<String>, StoreError>;

    /// The canonical (oldest) entry for a (category, subcategory) pair.
    async fn canonical_entry(
        &self,
        category: &str,
        subcategory: &str,
    ) -> Result<Option<TaxonomyEntry>, StoreError>;

    /// Insert a taxonomy entry. Returns `false` when the triple already
    /// existed (the unique constraint absorbed the write).
    async fn insert_taxonomy_entry(&self, entry: &TaxonomyEntry) -> Result<bool, StoreError>;

    /// Full taxonomy for prompt construction. Reads the durable tables so
    /// entries committed by concurrent workers in the same run are visible.
    async fn load_taxonomy(&self) -> Result<TaxonomyTree, StoreError>;
}

/// A row of the per-question result table, as served by the query API.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct StoredResult {
    pub id: i64,
    pub fingerprint: String,
    pub question_id: i64,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub third_category: Option<String>,
    pub specific_reason: Option<String>,
    pub mark_code: Option<String>,
    pub answer_code: Option<String>,
    pub error_info: Option<String>,
    #[schema(value_type = Object)]
    pub response: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

/// MySQL-backed store over `classification_{term}_{question}` and
/// `taxonomy_{term}_{question}`.
#[derive(Clone)]
pub struct MySqlResultStore {
    pool: MySqlPool,
    result_table: String,
    taxonomy_table: String,
}

impl MySqlResultStore {
    pub fn new(pool: MySqlPool, term_id: i64, question_id: i64) -> Self {
        Self {
            pool,
            result_table: format!("classification_{}_{}", term_id, question_id),
            taxonomy_table: format!("taxonomy_{}_{}", term_id, question_id),
        }
    }

    pub fn result_table(&self) -> &str {
        &self.result_table
    }

    /// All stored results for this question, ordered for reporting.
    pub async fn fetch_results(&self) -> Result<Vec<StoredResult>, StoreError> {
        let rows: Vec<StoredResult> = sqlx::query_as(&format!(
            "SELECT id, fingerprint, question_id, category, subcategory, third_category, \
             specific_reason, mark_code, answer_code, error_info, response, created_at \
             FROM {} ORDER BY category, subcategory, specific_reason",
            self.result_table
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn ensure_result_table(&self) -> Result<(), StoreError> {
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id BIGINT AUTO_INCREMENT PRIMARY KEY,
                fingerprint VARCHAR(64) NOT NULL,
                question_id BIGINT NOT NULL,
                category VARCHAR(255),
                subcategory VARCHAR(255),
                third_category VARCHAR(255),
                specific_reason VARCHAR(300),
                mark_code LONGTEXT,
                reference_code LONGTEXT,
                answer_code LONGTEXT,
                error_info TEXT,
                response JSON,
                created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP,
                UNIQUE KEY uq_fingerprint_question (fingerprint, question_id),
                INDEX idx_fingerprint (fingerprint),
                INDEX idx_question_id (question_id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci
            "#,
            self.result_table
        ))
        .execute(&self.pool)
        .await?;

        self.migrate_result_columns().await
    }

    /// Additive migration for result tables created by older versions.
    async fn migrate_result_columns(&self) -> Result<(), StoreError> {
        let rows = sqlx::query(&format!("SHOW COLUMNS FROM {}", self.result_table))
            .fetch_all(&self.pool)
            .await?;

        let present: Vec<String> = rows
            .iter()
            .filter_map(|row| row.try_get::<String, _>("Field").ok())
            .collect();

        for (column, definition) in RESULT_COLUMNS {
            if present.iter().any(|c| c == column) {
                continue;
            }
            tracing::info!(
                table = %self.result_table,
                column = %column,
                "adding missing result column"
            );
            sqlx::query(&format!(
                "ALTER TABLE {} ADD COLUMN {} {}",
                self.result_table, column, definition
            ))
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    async fn ensure_taxonomy_table(&self) -> Result<(), StoreError> {
        // Prefix lengths keep the unique key within MySQL's index limit.
        sqlx::query(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {} (
                id BIGINT AUTO_INCREMENT PRIMARY KEY,
                category VARCHAR(100) NOT NULL,
                subcategory VARCHAR(150) NOT NULL,
                third_category VARCHAR(200) NOT NULL,
                UNIQUE KEY uq_triple (category(50), subcategory(80), third_category(100)),
                INDEX idx_category (category)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci
            "#,
            self.taxonomy_table
        ))
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl ResultStore for MySqlResultStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        self.ensure_result_table().await?;
        self.ensure_taxonomy_table().await?;
        tracing::debug!(
            result_table = %self.result_table,
            taxonomy_table = %self.taxonomy_table,
            "schema ensured"
        );
        Ok(())
    }

    async fn result_exists(
        &self,
        fingerprint: &str,
        question_id: i64,
    ) -> Result<bool, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT id FROM {} WHERE fingerprint = ? AND question_id = ?",
            self.result_table
        ))
        .bind(fingerprint)
        .bind(question_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn insert_result(&self, record: &ClassificationRecord) -> Result<(), StoreError> {
        let result = sqlx::query(&format!(
            "INSERT IGNORE INTO {} (fingerprint, question_id, category, subcategory, \
             third_category, specific_reason, mark_code, reference_code, answer_code, \
             error_info, response) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            self.result_table
        ))
        .bind(&record.fingerprint)
        .bind(record.question_id)
        .bind(&record.entry.category)
        .bind(&record.entry.subcategory)
        .bind(&record.entry.third_category)
        .bind(&record.specific_reason)
        .bind(&record.mark_code)
        .bind(&record.reference_code)
        .bind(&record.answer_code)
        .bind(&record.error_info)
        .bind(&record.response)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Persistence(e.to_string()))?;

        if result.rows_affected() == 0 {
            tracing::debug!(
                fingerprint = %record.fingerprint,
                "result row already present, write absorbed by unique key"
            );
        }

        Ok(())
    }

    async fn taxonomy_entry_exists(&self, entry: &TaxonomyEntry) -> Result<bool, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT id FROM {} WHERE category = ? AND subcategory = ? AND third_category = ?",
            self.taxonomy_table
        ))
        .bind(&entry.category)
        .bind(&entry.subcategory)
        .bind(&entry.third_category)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn subcategories(&self, category: &str) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT DISTINCT subcategory FROM {} WHERE category = ?",
            self.taxonomy_table
        ))
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .filter_map(|row| row.try_get::<String, _>("subcategory").ok())
            .collect())
    }

    async fn canonical_entry(
        &self,
        category: &str,
        subcategory: &str,
    ) -> Result<Option<TaxonomyEntry>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT category, subcategory, third_category FROM {} \
             WHERE category = ? AND subcategory = ? ORDER BY id LIMIT 1",
            self.taxonomy_table
        ))
        .bind(category)
        .bind(subcategory)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| TaxonomyEntry {
            category: row.try_get("category").unwrap_or_default(),
            subcategory: row.try_get("subcategory").unwrap_or_default(),
            third_category: row.try_get("third_category").unwrap_or_default(),
        }))
    }

    async fn insert_taxonomy_entry(&self, entry: &TaxonomyEntry) -> Result<bool, StoreError> {
        let result = sqlx::query(&format!(
            "INSERT IGNORE INTO {} (category, subcategory, third_category) VALUES (?, ?, ?)",
            self.taxonomy_table
        ))
        .bind(&entry.category)
        .bind(&entry.subcategory)
        .bind(&entry.third_category)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Persistence(e.to_string()))?;

        Ok(result.rows_affected() > 0)
    }

    async fn load_taxonomy(&self) -> Result<TaxonomyTree, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT category, subcategory, third_category FROM {} ORDER BY id",
            self.taxonomy_table
        ))
        .fetch_all(&self.pool)
        .await?;

        let entries = rows
            .iter()
            .map(|row| TaxonomyEntry {
                category: row.try_get("category").unwrap_or_default(),
                subcategory: row.try_get("subcategory").unwrap_or_default(),
                third_category: row.try_get("third_category").unwrap_or_default(),
            })
            .collect();

        Ok(TaxonomyTree::from_entries(entries))
    }
}
