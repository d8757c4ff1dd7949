use tracing::{debug, info};

use crate::batch;
use crate::categories::CategoryStore;
use crate::categorizer::Categorizer;
use crate::models::{CategoryAssignment, ProcessedRecord, Record};
use crate::rules::RuleSet;
use crate::settings::Settings;
use crate::validator::Validator;

/// The full per-record pipeline: categorize, apply expense rules,
/// validate. Batch runs add the cross-record sweep at the end.
pub struct Processor {
    categorizer: Categorizer,
    validator: Validator,
    rules: RuleSet,
    force_review: bool,
}

impl Processor {
    pub fn new(store: CategoryStore, rules: RuleSet, settings: &Settings) -> Processor {
        let validator = Validator::new(&store, settings);
        let categorizer = Categorizer::new(store);
        info!(
            "Processor ready with {} categories and {} rules",
            categorizer.store().len(),
            rules.len()
        );
        Processor {
            categorizer,
            validator,
            rules,
            force_review: settings.require_manual_review,
        }
    }

    /// Wire up a processor from configuration alone, falling back to the
    /// built-in taxonomy and an empty rule set where files are absent.
    pub fn from_settings(settings: &Settings) -> Processor {
        let store = match &settings.categories_path {
            Some(path) => CategoryStore::load(path),
            None => CategoryStore::default_set(),
        };
        let rules = match &settings.rules_path {
            Some(path) => RuleSet::load(path),
            None => RuleSet::empty(),
        };
        Processor::new(store, rules, settings)
    }

    pub fn categorizer(&self) -> &Categorizer {
        &self.categorizer
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// Process one record. Pure apart from logging; safe to run across
    /// records in parallel.
    pub fn process(&self, record: Record) -> ProcessedRecord {
        let record = record.normalized();
        let assignment = self.categorizer.categorize(&record);
        debug!(
            "Record categorized as {} via {:?} signal",
            assignment.category, assignment.signal
        );

        let mut processed = ProcessedRecord::new(record, assignment);
        self.rules.apply(&mut processed);
        if self.force_review {
            processed.requires_review = true;
        }

        // Validate against the post-rule category; a rule override is
        // part of the record's final shape.
        let effective = CategoryAssignment {
            category: processed.category.clone(),
            confidence: processed.confidence,
            signal: processed.signal,
        };
        processed.verdict = self.validator.validate(&processed.record, &effective);
        processed
    }

    /// Process a whole batch: every record individually, then the
    /// cross-record duplicate and outlier sweep. The batch step needs
    /// all verdicts in hand, so it runs strictly after the per-record
    /// work.
    pub fn process_batch(&self, records: Vec<Record>) -> Vec<ProcessedRecord> {
        let mut processed: Vec<ProcessedRecord> =
            records.into_iter().map(|r| self.process(r)).collect();
        batch::check_batch(&mut processed);
        info!(
            "Processed batch of {}: {} valid",
            processed.len(),
            processed.iter().filter(|p| p.verdict.is_valid).count()
        );
        processed
    }
}
