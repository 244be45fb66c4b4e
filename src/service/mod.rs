//! Convergence pipeline services

pub mod aggregator;
pub mod classifier;
pub mod pipeline;
pub mod prompts;
pub mod similarity;
pub mod taxonomy;
pub mod trigger;

pub use classifier::{Classifier, ClassifyError, HttpClassifier};
pub use pipeline::Orchestrator;
pub use taxonomy::{ProposalOutcome, TaxonomyManager};
pub use trigger::{RunError, Stage};
