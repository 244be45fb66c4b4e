//! In-memory `ResultStore` used by the service-layer tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::db::store::ResultStore;
use crate::db::StoreError;
use crate::model::{ClassificationRecord, TaxonomyEntry, TaxonomyTree};

#[derive(Default)]
struct Inner {
    results: Vec<ClassificationRecord>,
    taxonomy: Vec<TaxonomyEntry>,
}

/// Mirrors the MySQL store's observable behavior: unique keys absorb
/// duplicate writes instead of erroring.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    fail_result_inserts: AtomicBool,
}

impl MemoryStore {
    pub fn seed_taxonomy(&self, entries: Vec<TaxonomyEntry>) {
        self.inner.lock().unwrap().taxonomy = entries;
    }

    /// Make every `insert_result` call fail with a persistence error.
    pub fn fail_result_inserts(&self) {
        self.fail_result_inserts.store(true, Ordering::SeqCst);
    }

    pub async fn results(&self) -> Vec<ClassificationRecord> {
        self.inner.lock().unwrap().results.clone()
    }

    pub async fn taxonomy_entries(&self) -> Vec<TaxonomyEntry> {
        self.inner.lock().unwrap().taxonomy.clone()
    }

    pub async fn result_count(&self, fingerprint: &str, question_id: i64) -> usize {
        self.inner
            .lock()
            .unwrap()
            .results
            .iter()
            .filter(|r| r.fingerprint == fingerprint && r.question_id == question_id)
            .count()
    }
}

#[async_trait]
impl ResultStore for MemoryStore {
    async fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn result_exists(
        &self,
        fingerprint: &str,
        question_id: i64,
    ) -> Result<bool, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .results
            .iter()
            .any(|r| r.fingerprint == fingerprint && r.question_id == question_id))
    }

    async fn insert_result(&self, record: &ClassificationRecord) -> Result<(), StoreError> {
        if self.fail_result_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Persistence("insert rejected".to_string()));
        }
        let mut inner = self.inner.lock().unwrap();
        let duplicate = inner
            .results
            .iter()
            .any(|r| r.fingerprint == record.fingerprint && r.question_id == record.question_id);
        if !duplicate {
            inner.results.push(record.clone());
        }
        Ok(())
    }

    async fn taxonomy_entry_exists(&self, entry: &TaxonomyEntry) -> Result<bool, StoreError> {
        Ok(self.inner.lock().unwrap().taxonomy.contains(entry))
    }

    async fn subcategories(&self, category: &str) -> Result<Vec<String>, StoreError> {
        let inner = self.inner.lock().unwrap();
        let mut seen = Vec::new();
        for entry in inner.taxonomy.iter().filter(|e| e.category == category) {
            if !seen.contains(&entry.subcategory) {
                seen.push(entry.subcategory.clone());
            }
        }
        Ok(seen)
    }

    async fn canonical_entry(
        &self,
        category: &str,
        subcategory: &str,
    ) -> Result<Option<TaxonomyEntry>, StoreError> {
        Ok(self
            .inner
            .lock()
            .unwrap()
            .taxonomy
            .iter()
            .find(|e| e.category == category && e.subcategory == subcategory)
            .cloned())
    }

    async fn insert_taxonomy_entry(&self, entry: &TaxonomyEntry) -> Result<bool, StoreError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.taxonomy.contains(entry) {
            return Ok(false);
        }
        inner.taxonomy.push(entry.clone());
        Ok(true)
    }

    async fn load_taxonomy(&self) -> Result<TaxonomyTree, StoreError> {
        Ok(TaxonomyTree::from_entries(
            self.inner.lock().unwrap().taxonomy.clone(),
        ))
    }
}
