//! Categorization and validation core for extracted receipt data.
//!
//! Takes records produced by an upstream extraction step, assigns each
//! one an expense category from a closed taxonomy, validates the fields
//! and plausibility of the record, and cross-checks whole batches for
//! duplicates and outliers. Imaging, OCR and export live elsewhere;
//! this crate owns only the decision logic between them.

pub mod batch;
pub mod categories;
pub mod categorizer;
pub mod error;
pub mod models;
pub mod processor;
pub mod report;
pub mod rules;
pub mod settings;
pub mod validator;

pub use categories::{CategoryDefinition, CategoryStore};
pub use categorizer::Categorizer;
pub use error::{Result, TriageError};
pub use models::{
    CategoryAssignment, ProcessedRecord, Record, RecordStatus, Signal, ValidationVerdict,
};
pub use processor::Processor;
pub use report::ExpenseReport;
pub use rules::{Condition, ConditionValue, ExpenseRule, RuleActions, RuleField, RuleSet};
pub use settings::Settings;
pub use validator::Validator;
