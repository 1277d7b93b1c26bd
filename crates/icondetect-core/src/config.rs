//! Configuration types for icon-detect.
//!
//! Every section deserializes with defaults so a partial YAML file (or no file
//! at all) yields a complete configuration.

use crate::error::{Error, Result};
use crate::models::{Hive, KeyLocation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Application name, also used as URI scheme and notification app id.
pub const APP_NAME: &str = "icon-detect";

/// Explorer's overlay identifier list under `HKEY_LOCAL_MACHINE`.
pub const OVERLAY_KEY: &str =
    r"SOFTWARE\Microsoft\Windows\CurrentVersion\Explorer\ShellIconOverlayIdentifiers";

/// Handlers that must win the overlay priority race.
pub const DEFAULT_BOOST: &[&str] = &[
    "Tortoise1Normal",
    "Tortoise2Modified",
    "Tortoise3Conflict",
    "Tortoise6Deleted",
    "Tortoise7Added",
    "Tortoise8Ignored",
    "Tortoise9Unversioned",
    "DropboxExt01",
    "DropboxExt02",
    "DropboxExt07",
    "OneDrive4",
];

/// Which entry survives when several raw names share a canonical name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SurvivorOrder {
    /// First entry in store enumeration order
    #[default]
    Enumeration,
    /// First entry after sorting raw names ascending
    Sorted,
}

/// Settings consumed by the detector and the repair applier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectConfig {
    pub hive: Hive,
    pub parent_path: String,
    /// Canonical names forced ahead of every other handler
    pub boost: BTreeSet<String>,
    pub survivor_order: SurvivorOrder,
}

impl Default for DetectConfig {
    fn default() -> Self {
        Self {
            hive: Hive::LocalMachine,
            parent_path: OVERLAY_KEY.to_string(),
            boost: DEFAULT_BOOST.iter().map(|s| s.to_string()).collect(),
            survivor_order: SurvivorOrder::Enumeration,
        }
    }
}

impl DetectConfig {
    /// Create a new detect config with builder
    pub fn builder() -> DetectConfigBuilder {
        DetectConfigBuilder::new()
    }

    pub fn location(&self) -> KeyLocation {
        KeyLocation::new(self.hive, self.parent_path.clone())
    }

    /// Validate the detect configuration
    pub fn validate(&self) -> Result<()> {
        if self.parent_path.trim().is_empty() {
            return Err(Error::config_error("Parent key path cannot be empty"));
        }
        if self.parent_path.ends_with('\\') || self.parent_path.starts_with('\\') {
            return Err(Error::config_error(format!(
                "Parent key path must not start or end with a separator: {}",
                self.parent_path
            )));
        }
        for name in &self.boost {
            if name.is_empty() || name.trim() != name {
                return Err(Error::config_error(format!(
                    "Boost name must be canonical (no surrounding whitespace): {:?}",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Builder for DetectConfig
pub struct DetectConfigBuilder {
    config: DetectConfig,
}

impl DetectConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: DetectConfig::default(),
        }
    }

    pub fn location(mut self, location: KeyLocation) -> Self {
        self.config.hive = location.hive;
        self.config.parent_path = location.path;
        self
    }

    /// Replace the boost set
    pub fn boost<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.boost = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn survivor_order(mut self, order: SurvivorOrder) -> Self {
        self.config.survivor_order = order;
        self
    }

    /// Build and validate
    pub fn build(self) -> Result<DetectConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for DetectConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Log file settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub file: PathBuf,
    pub level: String,
    pub max_size_bytes: u64,
    pub max_backups: usize,
    pub max_age_days: u32,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from(format!("{APP_NAME}.log")),
            level: "info".to_string(),
            max_size_bytes: 1024 * 1024, // 1MB
            max_backups: 3,
            max_age_days: 15,
        }
    }
}

/// Desktop notification settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    pub enabled: bool,
    pub app_id: String,
    pub title: String,
    /// Image name the "Restart" action is allowed to restart
    pub restart_target: String,
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            app_id: APP_NAME.to_string(),
            title: "icon changes detected".to_string(),
            restart_target: "TOTALCMD64.EXE".to_string(),
        }
    }
}

/// Global application configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub detect: DetectConfig,
    pub backup_dir: PathBuf,
    pub log: LogConfig,
    pub notify: NotifyConfig,
    /// URI scheme used for relaunch callbacks
    pub scheme: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            detect: DetectConfig::default(),
            backup_dir: PathBuf::from("."),
            log: LogConfig::default(),
            notify: NotifyConfig::default(),
            scheme: APP_NAME.to_string(),
        }
    }
}

impl AppConfig {
    /// Create new configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        self.detect.validate()?;

        if self.log.max_size_bytes == 0 {
            return Err(Error::config_error("Log max_size_bytes must be positive"));
        }

        if self.scheme.is_empty()
            || !self
                .scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
        {
            return Err(Error::config_error(format!(
                "Invalid URI scheme: {:?}",
                self.scheme
            )));
        }

        if self.notify.restart_target.trim().is_empty() {
            return Err(Error::config_error("Restart target cannot be empty"));
        }

        Ok(())
    }

    /// Expand `~` and environment variables in configured paths
    pub fn expand_paths(mut self) -> Result<Self> {
        self.backup_dir = expand_path(&self.backup_dir)?;
        self.log.file = expand_path(&self.log.file)?;
        Ok(self)
    }

    /// Serialize the configuration as YAML
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self)
            .map_err(|e| Error::config_error(format!("Failed to serialize config: {}", e)))
    }

    /// Parse a configuration from YAML text
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: AppConfig = serde_yaml::from_str(yaml)
            .map_err(|e| Error::config_error(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    let raw = path.to_string_lossy();
    let expanded = shellexpand::full(&raw).map_err(|e| {
        Error::config_error(format!("Failed to expand path {}: {}", path.display(), e))
    })?;
    Ok(PathBuf::from(expanded.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.detect.boost.len(), DEFAULT_BOOST.len());
        assert!(config.detect.boost.contains("OneDrive4"));
        assert_eq!(config.log.file, PathBuf::from("icon-detect.log"));
    }

    #[test]
    fn test_detect_config_builder() {
        let config = DetectConfig::builder()
            .location(KeyLocation::new(Hive::CurrentUser, "Software\\Test"))
            .boost(["Foo"])
            .survivor_order(SurvivorOrder::Sorted)
            .build()
            .unwrap();

        assert_eq!(config.hive, Hive::CurrentUser);
        assert_eq!(config.parent_path, "Software\\Test");
        assert_eq!(config.boost.len(), 1);
        assert_eq!(config.survivor_order, SurvivorOrder::Sorted);
    }

    #[test]
    fn test_boost_names_must_be_canonical() {
        assert!(DetectConfig::builder().boost([" Foo"]).build().is_err());
        assert!(DetectConfig::builder().boost([""]).build().is_err());
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config = AppConfig::from_yaml_str(
            "detect:\n  boost: [Foo, Bar]\n  survivor_order: sorted\nbackup_dir: backups\n",
        )
        .unwrap();

        assert_eq!(config.detect.parent_path, OVERLAY_KEY);
        assert_eq!(config.detect.boost.len(), 2);
        assert_eq!(config.detect.survivor_order, SurvivorOrder::Sorted);
        assert_eq!(config.backup_dir, PathBuf::from("backups"));
        assert_eq!(config.scheme, APP_NAME);
    }

    #[test]
    fn test_yaml_round_trip() {
        let config = AppConfig::new();
        let yaml = config.to_yaml().unwrap();
        assert_eq!(AppConfig::from_yaml_str(&yaml).unwrap(), config);
    }

    #[test]
    fn test_invalid_scheme_rejected() {
        let mut config = AppConfig::new();
        config.scheme = "icon detect".to_string();
        assert!(config.validate().is_err());
    }
}
