use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, TriageError};

/// Immutable processing configuration, passed into components at
/// construction. Nothing in the crate reads ambient global state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Extraction confidence below this draws a warning during
    /// validation.
    #[serde(default = "default_min_confidence")]
    pub min_confidence_score: f64,
    /// Force every processed record into the review queue.
    #[serde(default)]
    pub require_manual_review: bool,
    /// Category taxonomy file; built-in set when absent.
    #[serde(default)]
    pub categories_path: Option<PathBuf>,
    /// Expense rule file; no rules when absent.
    #[serde(default)]
    pub rules_path: Option<PathBuf>,
}

fn default_min_confidence() -> f64 {
    0.8
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            min_confidence_score: default_min_confidence(),
            require_manual_review: false,
            categories_path: None,
            rules_path: None,
        }
    }
}

pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("receipt-triage")
}

impl Settings {
    /// Load settings from a JSON file. Missing, unreadable or invalid
    /// files fall back to the defaults; processing never halts on
    /// configuration problems.
    pub fn load(path: &Path) -> Settings {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => {
                debug!("No settings file at {}, using defaults", path.display());
                return Settings::default();
            }
        };
        let settings: Settings = match serde_json::from_str(&content) {
            Ok(settings) => settings,
            Err(e) => {
                warn!("Failed to parse settings file {}: {}", path.display(), e);
                return Settings::default();
            }
        };
        if let Err(e) = settings.validate() {
            warn!("Rejecting settings file: {e}");
            return Settings::default();
        }
        settings
    }

    /// Load from the conventional location under the user config dir.
    pub fn load_default() -> Settings {
        Settings::load(&config_dir().join("settings.json"))
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.min_confidence_score) {
            return Err(TriageError::Config(format!(
                "min_confidence_score must be between 0.0 and 1.0, got {}",
                self.min_confidence_score
            )));
        }
        Ok(())
    }
}
