use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::categories::CategoryStore;
use crate::error::{Result, TriageError};
use crate::models::ProcessedRecord;

/// The record fields a rule condition can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleField {
    Vendor,
    Amount,
    Date,
    Category,
    Description,
    AccountCode,
    Department,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConditionValue {
    Number(f64),
    Text(String),
}

/// One condition over one field. A bare scalar is shorthand for
/// equality; the structured form combines bounds and containment, all
/// of which must hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Condition {
    Equals(ConditionValue),
    Clauses {
        #[serde(default)]
        equals: Option<ConditionValue>,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
        #[serde(default)]
        contains: Option<String>,
    },
}

#[derive(Debug, Clone)]
enum FieldValue {
    Text(String),
    Number(f64),
}

impl FieldValue {
    fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }

    fn display(&self) -> String {
        match self {
            FieldValue::Text(s) => s.clone(),
            FieldValue::Number(n) => n.to_string(),
        }
    }
}

impl Condition {
    fn holds(&self, value: &FieldValue) -> bool {
        match self {
            Condition::Equals(expected) => value_equals(value, expected),
            Condition::Clauses {
                equals,
                min,
                max,
                contains,
            } => {
                if let Some(expected) = equals {
                    if !value_equals(value, expected) {
                        return false;
                    }
                }
                if let Some(min) = min {
                    match value.as_number() {
                        Some(n) if n >= *min => {}
                        _ => return false,
                    }
                }
                if let Some(max) = max {
                    match value.as_number() {
                        Some(n) if n <= *max => {}
                        _ => return false,
                    }
                }
                if let Some(fragment) = contains {
                    let haystack = value.display().to_lowercase();
                    if !haystack.contains(&fragment.to_lowercase()) {
                        return false;
                    }
                }
                true
            }
        }
    }
}

fn value_equals(value: &FieldValue, expected: &ConditionValue) -> bool {
    match (value, expected) {
        (FieldValue::Text(have), ConditionValue::Text(want)) => have == want,
        (FieldValue::Number(have), ConditionValue::Number(want)) => have == want,
        _ => false,
    }
}

/// Rule actions, applied in this fixed field order. `add_note` appends
/// to existing notes rather than replacing them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuleActions {
    pub set_category: Option<String>,
    pub set_account_code: Option<String>,
    pub set_department: Option<String>,
    pub require_approval: Option<bool>,
    pub add_note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRule {
    pub name: String,
    /// Target category label, informational alongside `set_category`.
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub conditions: BTreeMap<RuleField, Condition>,
    #[serde(default)]
    pub actions: RuleActions,
    #[serde(default)]
    pub priority: i64,
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl ExpenseRule {
    /// A rule applies when every condition holds; a missing field value
    /// means it does not apply.
    pub fn applies_to(&self, processed: &ProcessedRecord) -> bool {
        self.conditions.iter().all(|(field, condition)| {
            match field_value(processed, *field) {
                Some(value) => condition.holds(&value),
                None => false,
            }
        })
    }

    pub fn apply(&self, processed: &mut ProcessedRecord) {
        if let Some(category) = &self.actions.set_category {
            processed.category = category.clone();
        }
        if let Some(code) = &self.actions.set_account_code {
            processed.account_code = Some(code.clone());
        }
        if let Some(department) = &self.actions.set_department {
            processed.department = Some(department.clone());
        }
        if let Some(flag) = self.actions.require_approval {
            processed.requires_review = flag;
        }
        if let Some(note) = &self.actions.add_note {
            processed.push_note(note);
        }
    }
}

fn field_value(processed: &ProcessedRecord, field: RuleField) -> Option<FieldValue> {
    match field {
        RuleField::Vendor => processed.record.vendor.clone().map(FieldValue::Text),
        RuleField::Amount => processed.record.amount.map(FieldValue::Number),
        RuleField::Date => processed.record.date.clone().map(FieldValue::Text),
        RuleField::Category => Some(FieldValue::Text(processed.category.clone())),
        RuleField::Description => {
            if processed.description.is_empty() {
                None
            } else {
                Some(FieldValue::Text(processed.description.clone()))
            }
        }
        RuleField::AccountCode => processed.account_code.clone().map(FieldValue::Text),
        RuleField::Department => processed.department.clone().map(FieldValue::Text),
    }
}

/// An ordered rule collection. Rules evaluate in priority-descending
/// order and only the first matching active rule applies.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ExpenseRule>,
}

impl RuleSet {
    pub fn new(mut rules: Vec<ExpenseRule>) -> RuleSet {
        // Stable sort: equal priorities keep file order.
        rules.sort_by(|a, b| b.priority.cmp(&a.priority));
        RuleSet { rules }
    }

    pub fn empty() -> RuleSet {
        RuleSet { rules: Vec::new() }
    }

    /// Strict loader: a JSON array of rules.
    pub fn from_file(path: &Path) -> Result<RuleSet> {
        let content = std::fs::read_to_string(path)?;
        let rules: Vec<ExpenseRule> = serde_json::from_str(&content)?;
        Ok(RuleSet::new(rules))
    }

    /// Load from a rule file, falling back to no rules on a missing or
    /// malformed file. Never fails; failures are logged.
    pub fn load(path: &Path) -> RuleSet {
        if !path.exists() {
            debug!("No rule file at {}, running without rules", path.display());
            return RuleSet::empty();
        }
        match RuleSet::from_file(path) {
            Ok(rules) => {
                debug!("Loaded {} expense rules", rules.len());
                rules
            }
            Err(e) => {
                warn!("Failed to load rule file {}: {}", path.display(), e);
                RuleSet::empty()
            }
        }
    }

    /// Every category a rule can assign must exist in the store.
    pub fn validate_against(&self, store: &CategoryStore) -> Result<()> {
        for rule in &self.rules {
            if let Some(target) = &rule.actions.set_category {
                if !store.contains(target) {
                    return Err(TriageError::UnknownCategory(target.clone()));
                }
            }
            if !rule.category.is_empty() && !store.contains(&rule.category) {
                return Err(TriageError::UnknownCategory(rule.category.clone()));
            }
        }
        Ok(())
    }

    /// Apply the first matching active rule, returning it if one fired.
    pub fn apply(&self, processed: &mut ProcessedRecord) -> Option<&ExpenseRule> {
        for rule in &self.rules {
            if !rule.active {
                continue;
            }
            if rule.applies_to(processed) {
                debug!("Expense rule matched: {}", rule.name);
                rule.apply(processed);
                return Some(rule);
            }
        }
        None
    }

    pub fn rules(&self) -> &[ExpenseRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
