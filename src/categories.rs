use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

pub const MISCELLANEOUS: &str = "Miscellaneous";
pub const UNCATEGORIZED: &str = "Uncategorized";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDefinition {
    pub name: String,
    pub keywords: Vec<String>,
    pub vendors: Vec<String>,
    pub description: String,
}

/// On-disk shape: a mapping keyed by category name.
#[derive(Debug, Clone, Default, Deserialize)]
struct CategoryEntry {
    #[serde(default)]
    keywords: Vec<String>,
    #[serde(default)]
    vendors: Vec<String>,
    #[serde(default)]
    description: String,
}

// (name, keywords, vendors, description)
const DEFAULT_CATEGORIES: &[(&str, &[&str], &[&str], &str)] = &[
    (
        "Office Supplies",
        &["paper", "pen", "pencil", "stapler", "folder", "binder", "supplies"],
        &["staples", "office depot", "best buy"],
        "General office supplies and materials",
    ),
    (
        "Meals & Entertainment",
        &["restaurant", "food", "lunch", "dinner", "coffee", "catering"],
        &["mcdonalds", "starbucks", "subway", "dominos"],
        "Business meals and entertainment expenses",
    ),
    (
        "Travel",
        &["hotel", "flight", "airline", "uber", "taxi", "gas", "parking"],
        &["hilton", "marriott", "delta", "united", "shell", "exxon"],
        "Travel and transportation expenses",
    ),
    (
        "Technology",
        &["computer", "software", "laptop", "phone", "tablet", "tech"],
        &["apple", "microsoft", "amazon", "best buy"],
        "Technology equipment and software",
    ),
    (
        "Marketing",
        &["advertising", "marketing", "promotion", "print", "design"],
        &["facebook", "google", "adobe"],
        "Marketing and advertising expenses",
    ),
    (
        "Utilities",
        &["electric", "water", "gas", "internet", "phone", "utility"],
        &["verizon", "att", "comcast"],
        "Utility bills and services",
    ),
    (
        "Professional Services",
        &["consultant", "legal", "accounting", "professional", "service"],
        &["law", "cpa", "consulting"],
        "Professional services and consulting",
    ),
    (
        MISCELLANEOUS,
        &["misc", "other", "various"],
        &[],
        "Other business expenses",
    ),
];

/// The closed category taxonomy. Iteration order is lexicographic by
/// name, which is also the tie-break order used during categorization.
#[derive(Debug, Clone)]
pub struct CategoryStore {
    pub(crate) categories: Vec<CategoryDefinition>,
}

impl CategoryStore {
    pub fn new(definitions: Vec<CategoryDefinition>) -> CategoryStore {
        let mut categories = definitions;
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        categories.dedup_by(|a, b| a.name == b.name);
        if !categories.iter().any(|c| c.name == MISCELLANEOUS) {
            categories.push(CategoryDefinition {
                name: MISCELLANEOUS.to_string(),
                keywords: vec!["misc".to_string(), "other".to_string(), "various".to_string()],
                vendors: Vec::new(),
                description: "Other business expenses".to_string(),
            });
            categories.sort_by(|a, b| a.name.cmp(&b.name));
        }
        CategoryStore { categories }
    }

    /// The built-in taxonomy used whenever no configuration is supplied.
    pub fn default_set() -> CategoryStore {
        let definitions = DEFAULT_CATEGORIES
            .iter()
            .map(|(name, keywords, vendors, description)| CategoryDefinition {
                name: name.to_string(),
                keywords: keywords.iter().map(|k| k.to_string()).collect(),
                vendors: vendors.iter().map(|v| v.to_string()).collect(),
                description: description.to_string(),
            })
            .collect();
        CategoryStore::new(definitions)
    }

    /// Strict loader: IO and parse failures surface to the caller.
    pub fn from_file(path: &Path) -> Result<CategoryStore> {
        let content = std::fs::read_to_string(path)?;
        let entries: BTreeMap<String, CategoryEntry> = serde_json::from_str(&content)?;
        let definitions = entries
            .into_iter()
            .map(|(name, entry)| CategoryDefinition {
                name,
                keywords: entry.keywords,
                vendors: entry.vendors,
                description: entry.description,
            })
            .collect();
        Ok(CategoryStore::new(definitions))
    }

    /// Load from a config file, falling back to the built-in set on a
    /// missing or malformed file. Never fails; failures are logged.
    pub fn load(path: &Path) -> CategoryStore {
        if !path.exists() {
            debug!("No category config at {}, using built-in set", path.display());
            return CategoryStore::default_set();
        }
        match CategoryStore::from_file(path) {
            Ok(store) => {
                debug!("Loaded {} categories from config", store.len());
                store
            }
            Err(e) => {
                warn!("Failed to load category config {}: {}", path.display(), e);
                CategoryStore::default_set()
            }
        }
    }

    pub fn definitions(&self) -> &[CategoryDefinition] {
        &self.categories
    }

    pub fn get(&self, name: &str) -> Option<&CategoryDefinition> {
        self.categories.iter().find(|c| c.name == name)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.categories.iter().position(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.categories.iter().map(|c| c.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.categories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl Default for CategoryStore {
    fn default() -> CategoryStore {
        CategoryStore::default_set()
    }
}
