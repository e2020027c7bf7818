//! Persisted dashboard settings.
//!
//! Targets live in a small TOML file that is read once at startup and
//! rewritten whenever they change. The pipeline never reads the file itself;
//! callers load [`Settings`] through a [`SettingsStore`] and pass the
//! resulting [`Thresholds`] in.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::SettingsError;
use crate::models::Thresholds;

pub const DEFAULT_SETTINGS_PATH: &str = ".store-quadrant.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub targets: TargetSettings,

    #[serde(default)]
    pub report: ReportSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSettings {
    /// Revenue score a store must reach, as a percentage of its goal.
    #[serde(default = "default_target_revenue")]
    pub revenue: f64,

    /// Compliance score a store must reach (0-100).
    #[serde(default = "default_target_compliance")]
    pub compliance: f64,
}

impl Default for TargetSettings {
    fn default() -> Self {
        Self {
            revenue: default_target_revenue(),
            compliance: default_target_compliance(),
        }
    }
}

fn default_target_revenue() -> f64 {
    100.0
}

fn default_target_compliance() -> f64 {
    85.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSettings {
    #[serde(default = "default_output")]
    pub output: PathBuf,

    /// Stores listed per quadrant in the markdown report.
    #[serde(default = "default_top_stores")]
    pub top_stores: usize,
}

impl Default for ReportSettings {
    fn default() -> Self {
        Self {
            output: default_output(),
            top_stores: default_top_stores(),
        }
    }
}

fn default_output() -> PathBuf {
    PathBuf::from("quadrant_report.md")
}

fn default_top_stores() -> usize {
    10
}

impl Settings {
    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            target_revenue: self.targets.revenue,
            target_compliance: self.targets.compliance,
        }
    }

    pub fn with_thresholds(mut self, thresholds: Thresholds) -> Self {
        self.targets.revenue = thresholds.target_revenue;
        self.targets.compliance = thresholds.target_compliance;
        self
    }
}

/// Where settings are persisted between runs.
pub trait SettingsStore {
    fn load(&self) -> Result<Settings, SettingsError>;
    fn save(&self, settings: &Settings) -> Result<(), SettingsError>;
}

pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for FileSettingsStore {
    /// A missing file yields the defaults.
    fn load(&self) -> Result<Settings, SettingsError> {
        if !self.path.exists() {
            tracing::debug!("no settings file at {}, using defaults", self.path.display());
            return Ok(Settings::default());
        }

        let content = std::fs::read_to_string(&self.path).map_err(|source| SettingsError::Read {
            path: self.path.clone(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| SettingsError::Parse {
            path: self.path.clone(),
            source,
        })
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let content = toml::to_string_pretty(settings)?;
        std::fs::write(&self.path, content).map_err(|source| SettingsError::Write {
            path: self.path.clone(),
            source,
        })?;
        tracing::info!("settings saved to {}", self.path.display());
        Ok(())
    }
}

/// Loads settings, falling back to the defaults when the stored copy is
/// unreadable. Used by commands that are about to overwrite it.
pub fn load_or_default(store: &dyn SettingsStore) -> Settings {
    store.load().unwrap_or_else(|err| {
        tracing::warn!("{err}; starting from default settings");
        Settings::default()
    })
}

#[derive(Default)]
pub struct MemorySettingsStore {
    settings: Mutex<Option<Settings>>,
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<Settings, SettingsError> {
        let guard = self.settings.lock().unwrap_or_else(|e| e.into_inner());
        Ok(guard.clone().unwrap_or_default())
    }

    fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        let mut guard = self.settings.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path().join("settings.toml"));

        let settings = store.load().unwrap();
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.thresholds().target_revenue, 100.0);
        assert_eq!(settings.thresholds().target_compliance, 85.0);
    }

    #[test]
    fn saved_targets_survive_reload() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSettingsStore::new(dir.path().join("settings.toml"));
        let updated = Settings::default().with_thresholds(Thresholds {
            target_revenue: 90.0,
            target_compliance: 87.5,
        });

        store.save(&updated).unwrap();
        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.thresholds().target_revenue, 90.0);
        assert_eq!(reloaded.thresholds().target_compliance, 87.5);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "[targets]\ncompliance = 70.0\n").unwrap();

        let settings = FileSettingsStore::new(&path).load().unwrap();
        assert_eq!(settings.targets.revenue, 100.0);
        assert_eq!(settings.targets.compliance, 70.0);
        assert_eq!(settings.report.top_stores, 10);
    }

    #[test]
    fn malformed_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "targets = [").unwrap();

        let err = FileSettingsStore::new(&path).load().unwrap_err();
        assert!(matches!(err, SettingsError::Parse { .. }));
    }

    #[test]
    fn malformed_file_can_still_be_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "targets = [").unwrap();
        let store = FileSettingsStore::new(&path);

        let settings = load_or_default(&store);
        assert_eq!(settings, Settings::default());

        let updated = settings.with_thresholds(Thresholds {
            target_revenue: 95.0,
            target_compliance: 80.0,
        });
        store.save(&updated).unwrap();
        assert_eq!(store.load().unwrap(), updated);
    }

    #[test]
    fn memory_store_round_trips() {
        let store = MemorySettingsStore::default();
        assert_eq!(store.load().unwrap(), Settings::default());

        let updated = Settings::default().with_thresholds(Thresholds {
            target_revenue: -5.0,
            target_compliance: 150.0,
        });
        store.save(&updated).unwrap();
        assert_eq!(store.load().unwrap(), updated);
    }
}
