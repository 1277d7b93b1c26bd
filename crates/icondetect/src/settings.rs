//! Layered configuration loading.
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in defaults ([`AppConfig::default`])
//! 2. an optional YAML file (`--config <path>`)
//! 3. `ICONDETECT__SECTION__KEY` environment variables, e.g.
//!    `ICONDETECT__LOG__LEVEL=debug` or
//!    `ICONDETECT__DETECT__BOOST=Tortoise1Normal,OneDrive4`

use config::{Config, Environment, File, FileFormat};
use icondetect_core::{AppConfig, Error, Result};
use std::path::Path;

/// Prefix of configuration environment variables
pub const ENV_PREFIX: &str = "ICONDETECT";

const ENV_SEPARATOR: &str = "__";

/// Load the effective configuration from defaults, `file` and the process
/// environment.
pub fn load(file: Option<&Path>) -> Result<AppConfig> {
    build(file, None)
}

/// Like [`load`], reading environment variables from `env` instead of the
/// process environment.
pub fn load_with_env<I>(file: Option<&Path>, env: I) -> Result<AppConfig>
where
    I: IntoIterator<Item = (String, String)>,
{
    build(file, Some(env.into_iter().collect()))
}

fn build(file: Option<&Path>, env: Option<config::Map<String, String>>) -> Result<AppConfig> {
    let defaults = Config::try_from(&AppConfig::default())
        .map_err(|e| Error::config_error(format!("Failed to load defaults: {}", e)))?;

    let mut builder = Config::builder().add_source(defaults);
    if let Some(path) = file {
        log::debug!("loading configuration from {}", path.display());
        builder = builder.add_source(File::from(path).format(FileFormat::Yaml).required(true));
    }
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator(ENV_SEPARATOR)
            .separator(ENV_SEPARATOR)
            .list_separator(",")
            .with_list_parse_key("detect.boost")
            .try_parsing(true)
            .source(env),
    );

    let config: AppConfig = builder
        .build()
        .and_then(|c| c.try_deserialize())
        .map_err(|e| Error::config_error(e.to_string()))?;

    let config = config.expand_paths()?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use icondetect_core::{DEFAULT_BOOST, Hive, SurvivorOrder};
    use std::path::PathBuf;

    fn no_env() -> Vec<(String, String)> {
        Vec::new()
    }

    #[test]
    fn test_defaults_without_file() {
        let config = load_with_env(None, no_env()).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.detect.boost.len(), DEFAULT_BOOST.len());
    }

    #[test]
    fn test_yaml_file_overrides_defaults() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("icon-detect.yaml");
        std::fs::write(
            &path,
            "detect:\n  hive: current_user\n  survivor_order: sorted\n  boost: [Foo, Bar]\nlog:\n  level: debug\n",
        )
        .unwrap();

        let config = load_with_env(Some(&path), no_env()).unwrap();
        assert_eq!(config.detect.hive, Hive::CurrentUser);
        assert_eq!(config.detect.survivor_order, SurvivorOrder::Sorted);
        assert_eq!(config.detect.boost.len(), 2);
        assert_eq!(config.log.level, "debug");
        // untouched sections keep their defaults
        assert_eq!(config.log.max_backups, 3);
        assert_eq!(config.scheme, "icon-detect");
    }

    #[test]
    fn test_env_overrides_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("icon-detect.yaml");
        std::fs::write(&path, "log:\n  level: debug\n").unwrap();

        let env = vec![
            ("ICONDETECT__LOG__LEVEL".to_string(), "warn".to_string()),
            ("ICONDETECT__LOG__MAX_BACKUPS".to_string(), "7".to_string()),
            ("ICONDETECT__DETECT__BOOST".to_string(), "Foo,Bar".to_string()),
            ("ICONDETECT__NOTIFY__ENABLED".to_string(), "false".to_string()),
        ];
        let config = load_with_env(Some(&path), env).unwrap();
        assert_eq!(config.log.level, "warn");
        assert_eq!(config.log.max_backups, 7);
        assert!(!config.notify.enabled);
        assert_eq!(
            config.detect.boost.into_iter().collect::<Vec<_>>(),
            vec!["Bar".to_string(), "Foo".to_string()]
        );
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = load_with_env(Some(Path::new("/nonexistent/icon-detect.yaml")), no_env())
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let env = vec![("ICONDETECT__LOG__MAX_SIZE_BYTES".to_string(), "0".to_string())];
        assert!(load_with_env(None, env).is_err());

        let env = vec![("ICONDETECT__SCHEME".to_string(), "icon detect".to_string())];
        assert!(load_with_env(None, env).is_err());
    }

    #[test]
    fn test_paths_are_expanded() {
        let env = vec![("ICONDETECT__BACKUP_DIR".to_string(), "~/backups".to_string())];
        let config = load_with_env(None, env).unwrap();
        assert!(!config.backup_dir.starts_with("~"));
        assert!(config.backup_dir.ends_with(PathBuf::from("backups")));
    }
}
