use regex::Regex;
use tracing::{debug, warn};

use crate::categories::{CategoryStore, MISCELLANEOUS, UNCATEGORIZED};
use crate::models::{CategoryAssignment, Record, Signal};

const EXACT_VENDOR_CONFIDENCE: f64 = 0.9;
const PARTIAL_VENDOR_CONFIDENCE: f64 = 0.7;
const NO_VENDOR_CONFIDENCE: f64 = 0.1;
const TEXT_SCORE_THRESHOLD: f64 = 0.1;
const TEXT_HIT_WEIGHT: f64 = 0.2;
const SMALL_AMOUNT_CUTOFF: f64 = 10.0;
const LARGE_AMOUNT_CUTOFF: f64 = 500.0;

/// Assigns one category per record from a cascade of independent
/// signals, and scores categories for ranked suggestions.
pub struct Categorizer {
    store: CategoryStore,
    // Whole-word keyword patterns, parallel to store order.
    patterns: Vec<Vec<Regex>>,
}

impl Categorizer {
    pub fn new(store: CategoryStore) -> Categorizer {
        let patterns = store
            .definitions()
            .iter()
            .map(|def| compile_keywords(&def.keywords))
            .collect();
        Categorizer { store, patterns }
    }

    pub fn store(&self) -> &CategoryStore {
        &self.store
    }

    /// Assign a category. Total: always returns an assignment, degrading
    /// to the catch-all (or "Uncategorized" if the store lost it) rather
    /// than failing.
    pub fn categorize(&self, record: &Record) -> CategoryAssignment {
        if let Some(vendor) = record.vendor.as_deref() {
            if let Some((category, confidence)) = self.match_vendor(vendor) {
                debug!("Categorized by vendor: {category}");
                return CategoryAssignment {
                    category,
                    confidence,
                    signal: Signal::Vendor,
                };
            }
        }

        if !record.items.is_empty() {
            if let Some(category) = self.match_items(&record.items) {
                debug!("Categorized by items: {category}");
                let confidence = self.score(record, &category);
                return CategoryAssignment {
                    category,
                    confidence,
                    signal: Signal::Items,
                };
            }
        }

        if let Some(category) = self.match_full_text(record) {
            debug!("Categorized by text analysis: {category}");
            let confidence = self.score(record, &category);
            return CategoryAssignment {
                category,
                confidence,
                signal: Signal::Text,
            };
        }

        if let Some(category) = match_amount(record.amount) {
            debug!("Categorized by amount: {category}");
            let confidence = self.score(record, category);
            return CategoryAssignment {
                category: category.to_string(),
                confidence,
                signal: Signal::Amount,
            };
        }

        if self.store.contains(MISCELLANEOUS) {
            CategoryAssignment {
                category: MISCELLANEOUS.to_string(),
                confidence: self.score(record, MISCELLANEOUS),
                signal: Signal::Default,
            }
        } else {
            // Violated store invariant; degrade instead of panicking.
            warn!("Category store has no catch-all entry");
            CategoryAssignment {
                category: UNCATEGORIZED.to_string(),
                confidence: 0.0,
                signal: Signal::Default,
            }
        }
    }

    /// Blended confidence that `category` fits `record`: the mean of the
    /// vendor, item and text components that apply. With no applicable
    /// signal the score is a neutral 0.5.
    pub fn score(&self, record: &Record, category: &str) -> f64 {
        let mut components: Vec<f64> = Vec::new();

        if let Some(vendor) = record.vendor.as_deref() {
            components.push(self.vendor_component(vendor, category));
        }
        if !record.items.is_empty() {
            components.push(self.item_component(&record.items, category));
        }
        if record.vendor.is_some() || !record.recognized_text.is_empty() {
            components.push(self.text_component(record, category));
        }

        if components.is_empty() {
            0.5
        } else {
            components.iter().sum::<f64>() / components.len() as f64
        }
    }

    /// Score every category and return the `top_n` best, descending.
    /// Stable on ties, so equal scores keep store order; deterministic
    /// for a fixed store and record.
    pub fn suggest(&self, record: &Record, top_n: usize) -> Vec<(String, f64)> {
        let mut scored: Vec<(String, f64)> = self
            .store
            .definitions()
            .iter()
            .map(|def| (def.name.clone(), self.score(record, &def.name)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(top_n);
        scored
    }

    fn match_vendor(&self, vendor: &str) -> Option<(String, f64)> {
        let vendor = vendor.to_lowercase();
        if vendor.is_empty() {
            return None;
        }

        for def in self.store.definitions() {
            if def.vendors.iter().any(|known| known.to_lowercase() == vendor) {
                return Some((def.name.clone(), EXACT_VENDOR_CONFIDENCE));
            }
        }

        // Substring match in either direction.
        for def in self.store.definitions() {
            for known in &def.vendors {
                let known = known.to_lowercase();
                if known.is_empty() {
                    continue;
                }
                if known.contains(&vendor) || vendor.contains(&known) {
                    return Some((def.name.clone(), PARTIAL_VENDOR_CONFIDENCE));
                }
            }
        }

        None
    }

    fn match_items(&self, items: &[String]) -> Option<String> {
        let text = items.join(" ").to_lowercase();
        let mut best: Option<(usize, usize)> = None;

        for (idx, patterns) in self.patterns.iter().enumerate() {
            let count = count_matches(patterns, &text);
            if count == 0 {
                continue;
            }
            // Strictly-greater keeps the first category in store order on
            // a tie.
            match best {
                Some((_, top)) if count <= top => {}
                _ => best = Some((idx, count)),
            }
        }

        best.map(|(idx, _)| self.store.definitions()[idx].name.clone())
    }

    fn match_full_text(&self, record: &Record) -> Option<String> {
        let mut parts: Vec<&str> = Vec::new();
        if let Some(vendor) = record.vendor.as_deref() {
            parts.push(vendor);
        }
        parts.extend(record.items.iter().map(String::as_str));
        if !record.recognized_text.is_empty() {
            parts.push(&record.recognized_text);
        }
        let combined = parts.join(" ").to_lowercase();
        if combined.trim().is_empty() {
            return None;
        }
        let word_count = combined.split_whitespace().count().max(1);

        let mut best: Option<(usize, f64)> = None;
        for (idx, patterns) in self.patterns.iter().enumerate() {
            let count = count_matches(patterns, &combined);
            // Normalize by word count so long text blobs don't dominate.
            let score = count as f64 / word_count as f64 * 100.0;
            match best {
                Some((_, top)) if score <= top => {}
                _ => best = Some((idx, score)),
            }
        }

        match best {
            Some((idx, score)) if score > TEXT_SCORE_THRESHOLD => {
                Some(self.store.definitions()[idx].name.clone())
            }
            _ => None,
        }
    }

    fn vendor_component(&self, vendor: &str, category: &str) -> f64 {
        let vendor = vendor.to_lowercase();
        let vendors = match self.store.get(category) {
            Some(def) => &def.vendors,
            None => return NO_VENDOR_CONFIDENCE,
        };

        if vendors.iter().any(|known| known.to_lowercase() == vendor) {
            return EXACT_VENDOR_CONFIDENCE;
        }
        for known in vendors {
            let known = known.to_lowercase();
            if known.is_empty() {
                continue;
            }
            if known.contains(&vendor) || vendor.contains(&known) {
                return PARTIAL_VENDOR_CONFIDENCE;
            }
        }
        NO_VENDOR_CONFIDENCE
    }

    fn item_component(&self, items: &[String], category: &str) -> f64 {
        let patterns = match self.category_patterns(category) {
            Some(patterns) => patterns,
            None => return 0.0,
        };
        let text = items.join(" ").to_lowercase();
        let matches = count_matches(patterns, &text);
        (matches as f64 / items.len() as f64).min(1.0)
    }

    fn text_component(&self, record: &Record, category: &str) -> f64 {
        let patterns = match self.category_patterns(category) {
            Some(patterns) if !patterns.is_empty() => patterns,
            _ => return 0.0,
        };

        let mut hits = 0;
        if let Some(vendor) = record.vendor.as_deref() {
            hits += count_matches(patterns, &vendor.to_lowercase());
        }
        if !record.recognized_text.is_empty() {
            hits += count_matches(patterns, &record.recognized_text.to_lowercase());
        }

        (hits as f64 * TEXT_HIT_WEIGHT).min(1.0)
    }

    fn category_patterns(&self, category: &str) -> Option<&[Regex]> {
        self.store
            .index_of(category)
            .map(|idx| self.patterns[idx].as_slice())
    }
}

fn compile_keywords(keywords: &[String]) -> Vec<Regex> {
    keywords
        .iter()
        .filter_map(|keyword| {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(keyword));
            match Regex::new(&pattern) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Skipping unusable keyword '{keyword}': {e}");
                    None
                }
            }
        })
        .collect()
}

fn count_matches(patterns: &[Regex], text: &str) -> usize {
    patterns.iter().map(|re| re.find_iter(text).count()).sum()
}

fn match_amount(amount: Option<f64>) -> Option<&'static str> {
    let amount = amount?;
    if amount <= 0.0 {
        return None;
    }
    if amount < SMALL_AMOUNT_CUTOFF {
        Some("Office Supplies")
    } else if amount > LARGE_AMOUNT_CUTOFF {
        Some("Technology")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categories::CategoryDefinition;

    fn categorizer() -> Categorizer {
        Categorizer::new(CategoryStore::default_set())
    }

    fn record(vendor: Option<&str>, amount: Option<f64>) -> Record {
        Record {
            vendor: vendor.map(|v| v.to_string()),
            amount,
            ..Record::default()
        }
    }

    #[test]
    fn test_exact_vendor_match_wins() {
        let c = categorizer();
        let assignment = c.categorize(&record(Some("Staples"), Some(45.99)));
        assert_eq!(assignment.category, "Office Supplies");
        assert_eq!(assignment.confidence, 0.9);
        assert_eq!(assignment.signal, Signal::Vendor);
    }

    #[test]
    fn test_vendor_match_is_case_insensitive() {
        let c = categorizer();
        let assignment = c.categorize(&record(Some("STARBUCKS"), None));
        assert_eq!(assignment.category, "Meals & Entertainment");
        assert_eq!(assignment.confidence, 0.9);
    }

    #[test]
    fn test_partial_vendor_match() {
        let c = categorizer();
        let assignment = c.categorize(&record(Some("Starbucks #1234"), None));
        assert_eq!(assignment.category, "Meals & Entertainment");
        assert_eq!(assignment.confidence, 0.7);
        assert_eq!(assignment.signal, Signal::Vendor);
    }

    #[test]
    fn test_item_keywords_categorize() {
        let c = categorizer();
        let rec = Record {
            items: vec!["copy paper".to_string(), "stapler refill".to_string()],
            ..Record::default()
        };
        let assignment = c.categorize(&rec);
        assert_eq!(assignment.category, "Office Supplies");
        assert_eq!(assignment.signal, Signal::Items);
    }

    #[test]
    fn test_item_tie_breaks_by_store_order() {
        // Both categories match exactly one whole word; the store sorts
        // lexicographically, so "Alpha" must win over "Beta".
        let store = CategoryStore::new(vec![
            CategoryDefinition {
                name: "Beta".to_string(),
                keywords: vec!["widget".to_string()],
                vendors: Vec::new(),
                description: String::new(),
            },
            CategoryDefinition {
                name: "Alpha".to_string(),
                keywords: vec!["gadget".to_string()],
                vendors: Vec::new(),
                description: String::new(),
            },
        ]);
        let c = Categorizer::new(store);
        let rec = Record {
            items: vec!["gadget widget".to_string()],
            ..Record::default()
        };
        let assignment = c.categorize(&rec);
        assert_eq!(assignment.category, "Alpha");
    }

    #[test]
    fn test_keywords_match_whole_words_only() {
        let c = categorizer();
        let rec = Record {
            // "penne" must not match the keyword "pen".
            items: vec!["penne arrabbiata".to_string()],
            ..Record::default()
        };
        let assignment = c.categorize(&rec);
        assert_ne!(assignment.category, "Office Supplies");
    }

    #[test]
    fn test_text_analysis_categorizes() {
        let c = categorizer();
        let rec = Record {
            recognized_text: "hotel stay two nights parking included".to_string(),
            ..Record::default()
        };
        let assignment = c.categorize(&rec);
        assert_eq!(assignment.category, "Travel");
        assert_eq!(assignment.signal, Signal::Text);
    }

    #[test]
    fn test_small_amount_heuristic() {
        let c = categorizer();
        let assignment = c.categorize(&record(None, Some(4.5)));
        assert_eq!(assignment.category, "Office Supplies");
        assert_eq!(assignment.signal, Signal::Amount);
    }

    #[test]
    fn test_large_amount_heuristic() {
        let c = categorizer();
        let assignment = c.categorize(&record(None, Some(999.0)));
        assert_eq!(assignment.category, "Technology");
        assert_eq!(assignment.signal, Signal::Amount);
    }

    #[test]
    fn test_mid_amount_falls_to_default() {
        let c = categorizer();
        let assignment = c.categorize(&record(None, Some(50.0)));
        assert_eq!(assignment.category, "Miscellaneous");
        assert_eq!(assignment.signal, Signal::Default);
    }

    #[test]
    fn test_empty_record_defaults_to_miscellaneous() {
        let c = categorizer();
        let assignment = c.categorize(&Record::default());
        assert_eq!(assignment.category, "Miscellaneous");
        assert_eq!(assignment.signal, Signal::Default);
    }

    #[test]
    fn test_score_neutral_with_no_signals() {
        let c = categorizer();
        assert_eq!(c.score(&Record::default(), "Travel"), 0.5);
    }

    #[test]
    fn test_score_exact_vendor_alone() {
        let c = categorizer();
        // Vendor and text components both apply; the vendor name carries
        // no category keywords, so the mean is (0.9 + 0.0) / 2.
        let score = c.score(&record(Some("Staples"), None), "Office Supplies");
        assert!((score - 0.45).abs() < 1e-9);
    }

    #[test]
    fn test_score_counts_item_matches() {
        let c = categorizer();
        let rec = Record {
            items: vec!["paper".to_string(), "pen".to_string()],
            ..Record::default()
        };
        // Item component 2/2 = 1.0; no vendor, no text. Mean = 1.0.
        assert_eq!(c.score(&rec, "Office Supplies"), 1.0);
    }

    #[test]
    fn test_suggest_returns_top_n_sorted() {
        let c = categorizer();
        let rec = Record {
            vendor: Some("Staples".to_string()),
            items: vec!["paper".to_string(), "binder".to_string()],
            ..Record::default()
        };
        let suggestions = c.suggest(&rec, 3);
        assert_eq!(suggestions.len(), 3);
        assert_eq!(suggestions[0].0, "Office Supplies");
        assert!(suggestions[0].1 >= suggestions[1].1);
        assert!(suggestions[1].1 >= suggestions[2].1);
    }

    #[test]
    fn test_suggest_is_deterministic() {
        let c = categorizer();
        let rec = Record {
            recognized_text: "lunch meeting downtown".to_string(),
            ..Record::default()
        };
        let first = c.suggest(&rec, 5);
        for _ in 0..10 {
            assert_eq!(c.suggest(&rec, 5), first);
        }
    }

    #[test]
    fn test_suggest_may_disagree_with_categorize() {
        // The direct assignment takes the vendor fast-path with its
        // calibrated confidence, while suggestions rank by the blended
        // score; the two need not crown the same category.
        let c = categorizer();
        let rec = record(Some("Staples"), None);
        let assignment = c.categorize(&rec);
        assert_eq!(assignment.category, "Office Supplies");
        assert_eq!(assignment.confidence, 0.9);
        let top = &c.suggest(&rec, 1)[0];
        assert!(top.1 <= assignment.confidence);
    }

    #[test]
    fn test_missing_catchall_degrades_to_uncategorized() {
        // A store that lost its catch-all invariant; only constructible
        // inside the crate.
        let store = CategoryStore { categories: Vec::new() };
        let c = Categorizer::new(store);
        let assignment = c.categorize(&Record::default());
        assert_eq!(assignment.category, "Uncategorized");
        assert_eq!(assignment.confidence, 0.0);
        assert_eq!(assignment.signal, Signal::Default);
    }
}
