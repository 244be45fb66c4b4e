//! Taxonomy entries and the tree shape embedded into classifier prompts

use serde::{Deserialize, Serialize};
use std::fmt;

/// One row of the taxonomy: a (category, subcategory, third-category)
/// triple. Uniqueness over the full triple is enforced by the store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaxonomyEntry {
    pub category: String,
    pub subcategory: String,
    pub third_category: String,
}

impl TaxonomyEntry {
    pub fn new(
        category: impl Into<String>,
        subcategory: impl Into<String>,
        third_category: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            subcategory: subcategory.into(),
            third_category: third_category.into(),
        }
    }
}

impl fmt::Display for TaxonomyEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} -> {} -> {}",
            self.category, self.subcategory, self.third_category
        )
    }
}

/// Category -> subcategory -> [third-category] view of the taxonomy.
///
/// The serialized form mirrors the JSON contract the classifier is
/// prompted with, so field names here are wire names.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TaxonomyTree {
    pub categories: Vec<CategoryNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryNode {
    pub category: String,
    pub subcategory: Vec<SubcategoryNode>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubcategoryNode {
    pub subcategory: String,
    #[serde(rename = "thirdCategory")]
    pub third_categories: Vec<String>,
}

impl TaxonomyTree {
    /// Build the tree from flat entries, preserving first-seen order.
    pub fn from_entries(entries: Vec<TaxonomyEntry>) -> Self {
        let mut categories: Vec<CategoryNode> = Vec::new();

        for entry in entries {
            let node = match categories
                .iter_mut()
                .find(|c| c.category == entry.category)
            {
                Some(node) => node,
                None => {
                    categories.push(CategoryNode {
                        category: entry.category.clone(),
                        subcategory: Vec::new(),
                    });
                    categories.last_mut().unwrap()
                }
            };

            let sub = match node
                .subcategory
                .iter_mut()
                .find(|s| s.subcategory == entry.subcategory)
            {
                Some(sub) => sub,
                None => {
                    node.subcategory.push(SubcategoryNode {
                        subcategory: entry.subcategory.clone(),
                        third_categories: Vec::new(),
                    });
                    node.subcategory.last_mut().unwrap()
                }
            };

            if !sub.third_categories.contains(&entry.third_category) {
                sub.third_categories.push(entry.third_category);
            }
        }

        Self { categories }
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }

    /// JSON rendering embedded into the system prompt.
    pub fn to_prompt_json(&self) -> String {
        serde_json::to_string_pretty(&self.categories).unwrap_or_else(|_| "[]".to_string())
    }
}
