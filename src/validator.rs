use chrono::NaiveDate;
use tracing::debug;

use crate::categories::CategoryStore;
use crate::models::{CategoryAssignment, Record, ValidationVerdict};
use crate::settings::Settings;

const MAX_PLAUSIBLE_AMOUNT: f64 = 50_000.0;
const ROUND_AMOUNT_FLOOR: f64 = 100.0;
const MAX_VENDOR_LEN: usize = 100;
const SPECIAL_CHAR_RATIO: f64 = 0.2;
const STALE_DAYS: i64 = 365;
const FUTURE_DAYS: i64 = 30;
const MIN_TEXT_QUALITY: f64 = 0.5;
const MIN_COMPLETENESS: f64 = 0.7;
const ABSOLUTE_MIN_CONFIDENCE: f64 = 0.5;

const PLACEHOLDER_VENDORS: &[&str] = &["unknown", "n/a", "na", "none", "test"];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%Y/%m/%d",
    "%m-%d-%Y",
    "%d-%m-%Y",
];

// Plausible amount band per category: (name, min, max). Outside the
// band is advisory, never blocking.
const AMOUNT_BANDS: &[(&str, f64, f64)] = &[
    ("Office Supplies", 1.0, 500.0),
    ("Meals & Entertainment", 5.0, 200.0),
    ("Travel", 10.0, 2000.0),
    ("Technology", 25.0, 5000.0),
    ("Marketing", 50.0, 10_000.0),
    ("Utilities", 25.0, 1000.0),
    ("Professional Services", 100.0, 50_000.0),
    ("Insurance", 50.0, 5000.0),
    ("Maintenance & Repairs", 25.0, 2000.0),
    ("Miscellaneous", 1.0, 1000.0),
];

/// Per-record field and plausibility checks. Every check runs
/// unconditionally; one failing never short-circuits the rest.
pub struct Validator {
    known_categories: Vec<String>,
    min_confidence: f64,
}

impl Validator {
    pub fn new(store: &CategoryStore, settings: &Settings) -> Validator {
        Validator {
            known_categories: store.names().map(|n| n.to_string()).collect(),
            min_confidence: settings.min_confidence_score,
        }
    }

    pub fn validate(&self, record: &Record, assignment: &CategoryAssignment) -> ValidationVerdict {
        let mut verdict = ValidationVerdict::new();

        check_vendor(record, &mut verdict);
        check_amount(record, &mut verdict);
        check_date(
            record.date.as_deref(),
            chrono::Local::now().date_naive(),
            &mut verdict,
        );
        self.check_category(record, &assignment.category, &mut verdict);
        check_text_quality(&record.recognized_text, &mut verdict);
        check_completeness(record, &assignment.category, &mut verdict);
        self.check_confidence(record.confidence, &mut verdict);

        debug!(
            "Validation completed: valid={}, errors={}, warnings={}",
            verdict.is_valid,
            verdict.errors.len(),
            verdict.warnings.len()
        );
        verdict
    }

    fn check_category(&self, record: &Record, category: &str, verdict: &mut ValidationVerdict) {
        if category.is_empty() {
            verdict.add_error("Category is missing");
            return;
        }
        if !self.known_categories.iter().any(|known| known == category) {
            verdict.add_warning(format!("Unknown category: {category}"));
        }
        let amount = match record.amount {
            Some(amount) => amount,
            None => return,
        };
        if let Some((min, max)) = amount_band(category) {
            if amount < min {
                verdict.add_warning(format!(
                    "Amount ${amount:.2} is low for category '{category}'"
                ));
            } else if amount > max {
                verdict.add_warning(format!(
                    "Amount ${amount:.2} is high for category '{category}'"
                ));
            }
        }
    }

    fn check_confidence(&self, confidence: f64, verdict: &mut ValidationVerdict) {
        if confidence < self.min_confidence {
            verdict.add_warning(format!("Low confidence score: {confidence:.2}"));
            verdict.reduce_confidence(0.2);
        }
        if confidence < ABSOLUTE_MIN_CONFIDENCE {
            verdict.add_error("Very low confidence - manual review required");
        }
    }
}

fn check_vendor(record: &Record, verdict: &mut ValidationVerdict) {
    let vendor = match record.vendor.as_deref() {
        Some(vendor) => vendor,
        None => {
            verdict.add_error("Vendor name is missing");
            return;
        }
    };

    if vendor.trim().chars().count() < 2 {
        verdict.add_error("Vendor name too short");
    }
    let total_chars = vendor.chars().count();
    if total_chars > MAX_VENDOR_LEN {
        verdict.add_warning("Vendor name unusually long");
    }

    if PLACEHOLDER_VENDORS.contains(&vendor.to_lowercase().as_str()) {
        verdict.add_warning("Vendor name appears to be placeholder");
        verdict.reduce_confidence(0.3);
    }

    // A high ratio of odd characters usually means recognition noise.
    let special = vendor
        .chars()
        .filter(|c| !c.is_alphanumeric() && !" -&.".contains(*c))
        .count();
    if total_chars > 0 && special as f64 > total_chars as f64 * SPECIAL_CHAR_RATIO {
        verdict.add_warning("Vendor name contains many special characters");
        verdict.reduce_confidence(0.2);
    }
}

fn check_amount(record: &Record, verdict: &mut ValidationVerdict) {
    let amount = match record.amount {
        Some(amount) => amount,
        None => {
            verdict.add_error("Amount is missing");
            return;
        }
    };

    if amount <= 0.0 {
        verdict.add_error("Amount must be positive");
    }
    if amount > MAX_PLAUSIBLE_AMOUNT {
        verdict.add_warning("Amount is unusually high");
        verdict.reduce_confidence(0.1);
    }
    if amount >= ROUND_AMOUNT_FLOOR && amount.fract() == 0.0 {
        verdict.add_warning("Amount is a round number - verify accuracy");
        verdict.reduce_confidence(0.1);
    }
    let cents = amount * 100.0;
    if (cents - cents.round()).abs() > 1e-6 {
        verdict.add_warning("Amount has more than 2 decimal places");
    }
}

fn check_date(date: Option<&str>, today: NaiveDate, verdict: &mut ValidationVerdict) {
    let raw = match date {
        Some(raw) => raw.trim(),
        None => {
            verdict.add_warning("Date is missing");
            return;
        }
    };

    let parsed = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok());
    let parsed = match parsed {
        Some(parsed) => parsed,
        None => {
            verdict.add_error(format!("Invalid date format: {raw}"));
            return;
        }
    };

    let age_days = today.signed_duration_since(parsed).num_days();
    if age_days > STALE_DAYS {
        verdict.add_warning("Date is more than one year old");
    }
    if age_days < -FUTURE_DAYS {
        verdict.add_warning("Date is in the future");
        verdict.reduce_confidence(0.2);
    }
}

fn check_text_quality(text: &str, verdict: &mut ValidationVerdict) {
    if text.is_empty() {
        return;
    }
    if text_quality(text) < MIN_TEXT_QUALITY {
        verdict.add_warning("Poor OCR text quality detected");
        verdict.reduce_confidence(0.2);
    }
}

/// Readability of recognized text in [0, 1]: the alphanumeric-or-space
/// fraction, less 0.1 per artifact run (capped at 0.5).
pub fn text_quality(text: &str) -> f64 {
    if text.is_empty() {
        return 0.0;
    }
    let total = text.chars().count();
    let readable = text
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .count();
    let readability = readable as f64 / total as f64;

    const ARTIFACTS: &[&str] = &["|||", "~~~", "###", "***"];
    let artifact_count: usize = ARTIFACTS.iter().map(|a| text.matches(a).count()).sum();
    let penalty = (artifact_count as f64 * 0.1).min(0.5);

    (readability - penalty).clamp(0.0, 1.0)
}

fn check_completeness(record: &Record, category: &str, verdict: &mut ValidationVerdict) {
    let mut present = 0;
    if record.vendor.is_some() {
        present += 1;
    }
    if record.amount.is_some() {
        present += 1;
    }
    if record.date.is_some() {
        present += 1;
    }
    if !category.is_empty() {
        present += 1;
    }
    // Description is derived from the vendor, so it is present exactly
    // when a vendor is.
    if record.vendor.is_some() {
        present += 1;
    }

    if present as f64 / 5.0 < MIN_COMPLETENESS {
        verdict.add_warning("Incomplete data - manual review recommended");
        verdict.reduce_confidence(0.3);
    }
}

fn amount_band(category: &str) -> Option<(f64, f64)> {
    AMOUNT_BANDS
        .iter()
        .find(|(name, _, _)| *name == category)
        .map(|(_, min, max)| (*min, *max))
}
