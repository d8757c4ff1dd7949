use tracing::debug;

use crate::models::{ProcessedRecord, Record};

const MIN_BATCH_FOR_OUTLIERS: usize = 5;
const OUTLIER_MULTIPLIER: f64 = 5.0;

const DUPLICATE_WARNING: &str = "Potential duplicate receipt detected";
const OUTLIER_WARNING: &str = "Amount significantly higher than batch average";

/// Cross-record checks over one finished batch. Runs only after every
/// per-record verdict exists, and appends warnings only; validity and
/// confidence are per-record evidence and stay untouched.
pub fn check_batch(batch: &mut [ProcessedRecord]) {
    check_duplicates(batch);
    check_outliers(batch);
}

/// Pairwise duplicate sweep: vendor, amount and date all exactly equal.
/// Both members of each matching pair are warned, once per pair.
pub fn check_duplicates(batch: &mut [ProcessedRecord]) {
    for i in 1..batch.len() {
        for j in 0..i {
            if is_duplicate(&batch[i].record, &batch[j].record) {
                debug!("Records {j} and {i} look like duplicates");
                batch[i].verdict.add_warning(DUPLICATE_WARNING);
                batch[j].verdict.add_warning(DUPLICATE_WARNING);
            }
        }
    }
}

/// Flag amounts more than five times the batch mean. Needs at least
/// five records with a known amount to say anything about the batch.
pub fn check_outliers(batch: &mut [ProcessedRecord]) {
    let amounts: Vec<f64> = batch.iter().filter_map(|p| p.record.amount).collect();
    if amounts.len() < MIN_BATCH_FOR_OUTLIERS {
        return;
    }
    let mean = amounts.iter().sum::<f64>() / amounts.len() as f64;
    let threshold = mean * OUTLIER_MULTIPLIER;

    for entry in batch.iter_mut() {
        if entry.record.amount.map_or(false, |a| a > threshold) {
            entry.verdict.add_warning(OUTLIER_WARNING);
        }
    }
}

fn is_duplicate(a: &Record, b: &Record) -> bool {
    a.vendor == b.vendor && a.amount == b.amount && a.date == b.date
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryAssignment, Signal};

    fn entry(vendor: &str, amount: f64, date: &str) -> ProcessedRecord {
        let record = Record {
            vendor: Some(vendor.to_string()),
            amount: Some(amount),
            date: Some(date.to_string()),
            confidence: 0.9,
            ..Record::default()
        };
        ProcessedRecord::new(
            record,
            CategoryAssignment {
                category: "Miscellaneous".to_string(),
                confidence: 0.9,
                signal: Signal::Default,
            },
        )
    }

    fn duplicate_warnings(entry: &ProcessedRecord) -> usize {
        entry
            .verdict
            .warnings
            .iter()
            .filter(|w| w.contains("duplicate"))
            .count()
    }

    #[test]
    fn test_duplicate_pair_warns_both() {
        let mut batch = vec![
            entry("Acme", 20.0, "2024-01-15"),
            entry("Acme", 20.0, "2024-01-15"),
        ];
        check_duplicates(&mut batch);
        assert_eq!(duplicate_warnings(&batch[0]), 1);
        assert_eq!(duplicate_warnings(&batch[1]), 1);
    }

    #[test]
    fn test_no_duplicate_warning_when_fields_differ() {
        let mut batch = vec![
            entry("Acme", 20.0, "2024-01-15"),
            entry("Acme", 20.0, "2024-01-16"),
            entry("Acme", 21.0, "2024-01-15"),
            entry("Bolt", 20.0, "2024-01-15"),
        ];
        check_duplicates(&mut batch);
        for e in &batch {
            assert_eq!(duplicate_warnings(e), 0);
        }
    }

    #[test]
    fn test_triplicate_warns_once_per_pair() {
        let mut batch = vec![
            entry("Acme", 20.0, "2024-01-15"),
            entry("Acme", 20.0, "2024-01-15"),
            entry("Acme", 20.0, "2024-01-15"),
        ];
        check_duplicates(&mut batch);
        // Three pairs among three records; each member sits in two pairs.
        for e in &batch {
            assert_eq!(duplicate_warnings(e), 2);
        }
    }

    #[test]
    fn test_duplicates_never_flip_validity() {
        let mut batch = vec![
            entry("Acme", 20.0, "2024-01-15"),
            entry("Acme", 20.0, "2024-01-15"),
        ];
        check_batch(&mut batch);
        assert!(batch[0].verdict.is_valid);
        assert_eq!(batch[0].verdict.confidence, 1.0);
    }

    #[test]
    fn test_outliers_skipped_for_small_batch() {
        let mut batch = vec![
            entry("A", 10.0, "2024-01-01"),
            entry("B", 10.0, "2024-01-02"),
            entry("C", 10.0, "2024-01-03"),
            entry("D", 1000.0, "2024-01-04"),
        ];
        check_outliers(&mut batch);
        for e in &batch {
            assert!(e.verdict.warnings.is_empty());
        }
    }

    #[test]
    fn test_spike_in_five_record_batch_cannot_trip_threshold() {
        // The spike is part of its own mean: mean = 208, 5x = 1040 > 1000.
        let mut batch = vec![
            entry("A", 10.0, "2024-01-01"),
            entry("B", 10.0, "2024-01-02"),
            entry("C", 10.0, "2024-01-03"),
            entry("D", 10.0, "2024-01-04"),
            entry("E", 1000.0, "2024-01-05"),
        ];
        check_outliers(&mut batch);
        for e in &batch {
            assert!(e.verdict.warnings.is_empty());
        }
    }

    #[test]
    fn test_outlier_flagged_in_larger_batch() {
        // mean = 350/6 = 58.33, 5x = 291.67 < 300.
        let mut batch = vec![
            entry("A", 10.0, "2024-01-01"),
            entry("B", 10.0, "2024-01-02"),
            entry("C", 10.0, "2024-01-03"),
            entry("D", 10.0, "2024-01-04"),
            entry("E", 10.0, "2024-01-05"),
            entry("F", 300.0, "2024-01-06"),
        ];
        check_outliers(&mut batch);
        assert!(batch[5]
            .verdict
            .warnings
            .iter()
            .any(|w| w.contains("higher than batch average")));
        for e in &batch[..5] {
            assert!(e.verdict.warnings.is_empty());
        }
    }

    #[test]
    fn test_outliers_ignore_missing_amounts() {
        let mut batch = vec![
            entry("A", 10.0, "2024-01-01"),
            entry("B", 10.0, "2024-01-02"),
            entry("C", 10.0, "2024-01-03"),
            entry("D", 10.0, "2024-01-04"),
        ];
        let mut no_amount = entry("E", 0.0, "2024-01-05");
        no_amount.record.amount = None;
        batch.push(no_amount);
        // Only four known amounts: below the minimum, so nothing flags.
        check_outliers(&mut batch);
        for e in &batch {
            assert!(e.verdict.warnings.is_empty());
        }
    }
}
