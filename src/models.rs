use serde::{Deserialize, Serialize};

/// Extracted receipt data handed in by the upstream extraction step.
/// The core never mutates a record after construction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub vendor: Option<String>,
    pub amount: Option<f64>,
    pub date: Option<String>,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default)]
    pub recognized_text: String,
    /// Extraction confidence estimate from upstream, 0.0 to 1.0.
    #[serde(default)]
    pub confidence: f64,
}

impl Record {
    /// Trim vendor and item text, drop empty items, flip a negative
    /// amount positive and clamp the confidence estimate into [0, 1].
    pub fn normalized(mut self) -> Record {
        self.vendor = self
            .vendor
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());
        if let Some(amount) = self.amount {
            if amount < 0.0 {
                self.amount = Some(amount.abs());
            }
        }
        self.items = self
            .items
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect();
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self
    }

    pub fn has_minimum_data(&self) -> bool {
        self.vendor.is_some() && self.amount.map_or(false, |a| a > 0.0)
    }
}

/// Which heuristic produced a category assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Vendor,
    Items,
    Text,
    Amount,
    Default,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryAssignment {
    pub category: String,
    pub confidence: f64,
    pub signal: Signal,
}

/// Outcome of validating one record. Errors block, warnings advise;
/// the confidence score starts at 1.0 and only ever goes down.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub confidence: f64,
}

impl ValidationVerdict {
    pub fn new() -> ValidationVerdict {
        ValidationVerdict {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            confidence: 1.0,
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
        self.is_valid = false;
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn reduce_confidence(&mut self, amount: f64) {
        self.confidence = (self.confidence - amount).max(0.0);
    }
}

impl Default for ValidationVerdict {
    fn default() -> ValidationVerdict {
        ValidationVerdict::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Processed,
    Approved,
    Rejected,
    Synced,
}

/// A record after categorization, ready for rule application and
/// validation. The verdict is filled in by the processing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedRecord {
    pub record: Record,
    pub category: String,
    pub confidence: f64,
    pub signal: Signal,
    pub description: String,
    pub account_code: Option<String>,
    pub department: Option<String>,
    pub requires_review: bool,
    pub notes: String,
    pub status: RecordStatus,
    pub verdict: ValidationVerdict,
}

const REVIEW_CONFIDENCE_FLOOR: f64 = 0.7;
const HIGH_AMOUNT_THRESHOLD: f64 = 1000.0;

impl ProcessedRecord {
    pub fn new(record: Record, assignment: CategoryAssignment) -> ProcessedRecord {
        let description = match record.vendor.as_deref() {
            Some(vendor) => format!("{vendor} - {}", assignment.category),
            None => String::new(),
        };
        let mut processed = ProcessedRecord {
            record,
            category: assignment.category,
            confidence: assignment.confidence,
            signal: assignment.signal,
            description,
            account_code: None,
            department: None,
            requires_review: assignment.confidence < REVIEW_CONFIDENCE_FLOOR,
            notes: String::new(),
            status: RecordStatus::Processed,
            verdict: ValidationVerdict::new(),
        };
        if processed.record.amount.map_or(false, |a| a > HIGH_AMOUNT_THRESHOLD) {
            processed.requires_review = true;
            processed.push_note("High amount expense - requires approval.");
        }
        processed
    }

    /// Append to the running notes, space-separated.
    pub fn push_note(&mut self, note: &str) {
        if note.is_empty() {
            return;
        }
        if !self.notes.is_empty() {
            self.notes.push(' ');
        }
        self.notes.push_str(note);
    }

    pub fn approve(&mut self, approved_by: &str) {
        self.status = RecordStatus::Approved;
        self.requires_review = false;
        self.push_note(&format!("Approved by {approved_by} at {}.", timestamp()));
    }

    pub fn reject(&mut self, reason: &str, rejected_by: &str) {
        self.status = RecordStatus::Rejected;
        self.requires_review = false;
        self.push_note(&format!("Rejected by {rejected_by}: {reason}."));
    }

    pub fn mark_synced(&mut self, system: &str) {
        self.status = RecordStatus::Synced;
        self.push_note(&format!("Synced to {system} at {}.", timestamp()));
    }
}

fn timestamp() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}
