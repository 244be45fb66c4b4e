//! Taxonomy Manager: the only writer of taxonomy entries
//!
//! `propose` is a read-then-decide sequence (exact check, similarity scan,
//! insert) that must not interleave with another proposer under the same
//! category, or two distinct-but-similar subcategories could both be
//! accepted. The critical section is scoped per category so unrelated
//! categories keep full throughput; the unique constraint on the full
//! triple in the store remains the backstop for races this process cannot
//! see (other processes, crashed locks).

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::db::store::ResultStore;
use crate::db::StoreError;
use crate::model::{TaxonomyEntry, TaxonomyTree};
use crate::service::similarity::find_similar;

/// Routing outcome of one proposal. `Merged` is not an error; it is
/// recorded for observability and steers the caller to the canonical
/// triple.
#[derive(Debug, Clone)]
pub enum ProposalOutcome {
    /// The triple was new and has been inserted.
    Accepted(TaxonomyEntry),
    /// An existing subcategory under the same category scored above the
    /// similarity threshold; nothing was written.
    Merged {
        canonical: TaxonomyEntry,
        rejected: TaxonomyEntry,
    },
    /// The exact triple already existed; nothing was written.
    Duplicate,
}

pub struct TaxonomyManager {
    store: Arc<dyn ResultStore>,
    category_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl TaxonomyManager {
    pub fn new(store: Arc<dyn ResultStore>) -> Self {
        Self {
            store,
            category_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Current taxonomy tree for prompt construction. Sourced from the
    /// durable store, so entries committed by concurrent workers are
    /// visible to later snapshots.
    pub async fn snapshot(&self) -> Result<TaxonomyTree, StoreError> {
        self.store.load_taxonomy().await
    }

    /// Propose a new triple. See the module docs for the locking scope.
    pub async fn propose(&self, entry: TaxonomyEntry) -> Result<ProposalOutcome, StoreError> {
        let lock = self.category_lock(&entry.category).await;
        let _guard = lock.lock().await;

        if self.store.taxonomy_entry_exists(&entry).await? {
            return Ok(ProposalOutcome::Duplicate);
        }

        let existing = self.store.subcategories(&entry.category).await?;
        if let Some(similar) = find_similar(&entry.subcategory, &existing) {
            // An identical subcategory reaching this point means a new
            // third-category under it: insert, don't merge.
            if similar != entry.subcategory {
                let canonical = self
                    .store
                    .canonical_entry(&entry.category, similar)
                    .await?
                    .unwrap_or_else(|| {
                        TaxonomyEntry::new(&entry.category, similar, &entry.third_category)
                    });

                tracing::info!(
                    category = %entry.category,
                    rejected = %entry.subcategory,
                    canonical = %canonical.subcategory,
                    "similar subcategory already exists, merging"
                );

                return Ok(ProposalOutcome::Merged {
                    canonical,
                    rejected: entry,
                });
            }
        }

        if self.store.insert_taxonomy_entry(&entry).await? {
            tracing::info!(entry = %entry, "taxonomy entry accepted");
            Ok(ProposalOutcome::Accepted(entry))
        } else {
            // Another process inserted the identical triple between our
            // check and write; the unique key absorbed it.
            Ok(ProposalOutcome::Duplicate)
        }
    }

    async fn category_lock(&self, category: &str) -> Arc<Mutex<()>> {
        let mut locks = self.category_locks.lock().await;
        locks
            .entry(category.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MemoryStore;

    fn manager_with(entries: Vec<TaxonomyEntry>) -> (TaxonomyManager, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::default());
        store.seed_taxonomy(entries);
        (TaxonomyManager::new(store.clone()), store)
    }

    #[tokio::test]
    async fn new_triple_is_accepted_and_stored() {
        let (manager, store) = manager_with(vec![]);

        let outcome = manager
            .propose(TaxonomyEntry::new("logic", "off by one", "loop bound"))
            .await
            .unwrap();

        assert!(matches!(outcome, ProposalOutcome::Accepted(_)));
        assert_eq!(store.taxonomy_entries().await.len(), 1);
    }

    #[tokio::test]
    async fn exact_triple_is_duplicate_without_write() {
        let entry = TaxonomyEntry::new("logic", "off by one", "loop bound");
        let (manager, store) = manager_with(vec![entry.clone()]);

        let outcome = manager.propose(entry).await.unwrap();

        assert!(matches!(outcome, ProposalOutcome::Duplicate));
        assert_eq!(store.taxonomy_entries().await.len(), 1);
    }

    #[tokio::test]
    async fn similar_subcategory_merges_to_canonical() {
        let canonical = TaxonomyEntry::new("logic", "loop bound off by one", "for loop");
        let (manager, store) = manager_with(vec![canonical.clone()]);

        let outcome = manager
            .propose(TaxonomyEntry::new(
                "logic",
                "off by one loop bound",
                "while loop",
            ))
            .await
            .unwrap();

        match outcome {
            ProposalOutcome::Merged {
                canonical: kept,
                rejected,
            } => {
                assert_eq!(kept, canonical);
                assert_eq!(rejected.subcategory, "off by one loop bound");
            }
            other => panic!("expected Merged, got {:?}", other),
        }
        assert_eq!(store.taxonomy_entries().await.len(), 1);
    }

    #[tokio::test]
    async fn same_subcategory_new_third_category_is_inserted() {
        let (manager, store) = manager_with(vec![TaxonomyEntry::new(
            "logic",
            "off by one",
            "loop bound",
        )]);

        let outcome = manager
            .propose(TaxonomyEntry::new("logic", "off by one", "array index"))
            .await
            .unwrap();

        assert!(matches!(outcome, ProposalOutcome::Accepted(_)));
        assert_eq!(store.taxonomy_entries().await.len(), 2);
    }

    #[tokio::test]
    async fn same_subcategory_under_other_category_does_not_merge() {
        let (manager, store) = manager_with(vec![TaxonomyEntry::new(
            "syntax",
            "off by one",
            "loop bound",
        )]);

        let outcome = manager
            .propose(TaxonomyEntry::new("logic", "off by one", "loop bound"))
            .await
            .unwrap();

        assert!(matches!(outcome, ProposalOutcome::Accepted(_)));
        assert_eq!(store.taxonomy_entries().await.len(), 2);
    }

    #[tokio::test]
    async fn concurrent_similar_proposals_accept_exactly_one() {
        let (manager, store) = manager_with(vec![]);
        let manager = Arc::new(manager);

        let first = manager.propose(TaxonomyEntry::new(
            "logic",
            "loop bound off by one",
            "for loop",
        ));
        let second = manager.propose(TaxonomyEntry::new(
            "logic",
            "off by one loop bound",
            "while loop",
        ));

        let (a, b) = tokio::join!(first, second);
        let outcomes = [a.unwrap(), b.unwrap()];

        let accepted = outcomes
            .iter()
            .filter(|o| matches!(o, ProposalOutcome::Accepted(_)))
            .count();
        let merged = outcomes
            .iter()
            .filter(|o| matches!(o, ProposalOutcome::Merged { .. }))
            .count();

        assert_eq!(accepted, 1);
        assert_eq!(merged, 1);
        assert_eq!(store.taxonomy_entries().await.len(), 1);
    }
}
