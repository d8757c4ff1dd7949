use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{ProcessedRecord, RecordStatus};

/// Aggregated batch summary handed to the export side. Pure running
/// totals; nothing here re-validates records.
#[derive(Debug, Clone, Serialize)]
pub struct ExpenseReport {
    pub title: String,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub total_expenses: f64,
    pub expense_count: usize,
    pub average_expense: f64,
    pub largest_expense: f64,
    pub smallest_expense: f64,
    pub approved_amount: f64,
    pub pending_amount: f64,
    pub rejected_amount: f64,
    pub categories: BTreeMap<String, f64>,
    pub vendors: BTreeMap<String, f64>,
}

impl ExpenseReport {
    pub fn new(title: &str, period_start: NaiveDate, period_end: NaiveDate) -> ExpenseReport {
        ExpenseReport {
            title: title.to_string(),
            period_start,
            period_end,
            total_expenses: 0.0,
            expense_count: 0,
            average_expense: 0.0,
            largest_expense: 0.0,
            smallest_expense: 0.0,
            approved_amount: 0.0,
            pending_amount: 0.0,
            rejected_amount: 0.0,
            categories: BTreeMap::new(),
            vendors: BTreeMap::new(),
        }
    }

    pub fn add(&mut self, processed: &ProcessedRecord) {
        let amount = processed.record.amount.unwrap_or(0.0);

        self.total_expenses += amount;
        self.expense_count += 1;
        self.average_expense = self.total_expenses / self.expense_count as f64;
        self.largest_expense = self.largest_expense.max(amount);
        if self.smallest_expense == 0.0 || amount < self.smallest_expense {
            self.smallest_expense = amount;
        }

        *self
            .categories
            .entry(processed.category.clone())
            .or_insert(0.0) += amount;
        let vendor = processed
            .record
            .vendor
            .clone()
            .unwrap_or_else(|| "Unknown".to_string());
        *self.vendors.entry(vendor).or_insert(0.0) += amount;

        match processed.status {
            RecordStatus::Approved => self.approved_amount += amount,
            RecordStatus::Rejected => self.rejected_amount += amount,
            RecordStatus::Processed | RecordStatus::Synced => self.pending_amount += amount,
        }
    }

    pub fn top_categories(&self, limit: usize) -> Vec<(String, f64)> {
        top_by_amount(&self.categories, limit)
    }

    pub fn top_vendors(&self, limit: usize) -> Vec<(String, f64)> {
        top_by_amount(&self.vendors, limit)
    }
}

// Descending by amount; the BTreeMap walk plus stable sort makes ties
// resolve by name.
fn top_by_amount(totals: &BTreeMap<String, f64>, limit: usize) -> Vec<(String, f64)> {
    let mut entries: Vec<(String, f64)> = totals
        .iter()
        .map(|(name, amount)| (name.clone(), *amount))
        .collect();
    entries.sort_by(|a, b| b.1.total_cmp(&a.1));
    entries.truncate(limit);
    entries
}
