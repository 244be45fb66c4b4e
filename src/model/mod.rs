pub mod classification;
pub mod config;
pub mod report;
pub mod submission;
pub mod taxonomy;

pub use classification::{Classification, ClassificationRecord, ClassifierResponse};
pub use config::{ClassifierConfig, Config, ConfigError, DatabaseConfig, TableConfig};
pub use report::{RunReport, SimilarRejection, UnitFailure};
pub use submission::{QuestionInfo, RawRecord, SubmissionUnit};
pub use taxonomy::{TaxonomyEntry, TaxonomyTree};
