use crate::errors::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "config.json";
pub const DATA_DIR_ENV: &str = "TASKBOARD_DATA_DIR";
const DEFAULT_LOG_FILTER: &str = "info";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ConfigOverrides {
    data_dir: Option<PathBuf>,
    settings_db: Option<PathBuf>,
    log_filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShellConfig {
    pub data_dir: PathBuf,
    pub settings_db: PathBuf,
    pub log_dir: PathBuf,
    pub log_filter: String,
}

impl ShellConfig {
    pub fn default_for(app_data_dir: &Path) -> Self {
        Self {
            data_dir: app_data_dir.join("data"),
            settings_db: app_data_dir.join("settings.sqlite"),
            log_dir: app_data_dir.join("logs"),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
        }
    }

    // defaults, then config.json, then environment
    pub fn load(app_data_dir: &Path) -> AppResult<Self> {
        let env_data_dir = std::env::var_os(DATA_DIR_ENV).map(PathBuf::from);
        Self::resolve(app_data_dir, env_data_dir)
    }

    fn resolve(app_data_dir: &Path, env_data_dir: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default_for(app_data_dir);

        let config_path = app_data_dir.join(CONFIG_FILE_NAME);
        if config_path.is_file() {
            let raw = std::fs::read_to_string(&config_path)?;
            let overrides: ConfigOverrides = serde_json::from_str(&raw).map_err(|error| {
                AppError::Parse(format!("{}: {}", config_path.display(), error))
            })?;
            if let Some(data_dir) = overrides.data_dir {
                config.data_dir = absolutize(app_data_dir, data_dir);
            }
            if let Some(settings_db) = overrides.settings_db {
                config.settings_db = absolutize(app_data_dir, settings_db);
            }
            if let Some(log_filter) = overrides.log_filter.filter(|value| !value.trim().is_empty()) {
                config.log_filter = log_filter;
            }
        }

        if let Some(data_dir) = env_data_dir.filter(|value| !value.as_os_str().is_empty()) {
            config.data_dir = absolutize(app_data_dir, data_dir);
        }

        Ok(config)
    }
}

fn absolutize(base: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::{ShellConfig, CONFIG_FILE_NAME};
    use crate::errors::ErrorKind;
    use std::path::PathBuf;

    #[test]
    fn defaults_live_under_app_data_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = ShellConfig::resolve(dir.path(), None).expect("config");
        assert_eq!(config.data_dir, dir.path().join("data"));
        assert_eq!(config.settings_db, dir.path().join("settings.sqlite"));
        assert_eq!(config.log_dir, dir.path().join("logs"));
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn config_file_overrides_are_applied_relative_to_app_data_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            r#"{ "dataDir": "records", "logFilter": "debug" }"#,
        )
        .expect("write config");

        let config = ShellConfig::resolve(dir.path(), None).expect("config");
        assert_eq!(config.data_dir, dir.path().join("records"));
        assert_eq!(config.settings_db, dir.path().join("settings.sqlite"));
        assert_eq!(config.log_filter, "debug");
    }

    #[test]
    fn environment_data_dir_wins_over_config_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), r#"{ "dataDir": "records" }"#)
            .expect("write config");
        let override_dir = dir.path().join("elsewhere");

        let config = ShellConfig::resolve(dir.path(), Some(PathBuf::from(&override_dir))).expect("config");
        assert_eq!(config.data_dir, override_dir);
    }

    #[test]
    fn malformed_config_file_is_a_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{ dataDir: ").expect("write config");

        let error = ShellConfig::resolve(dir.path(), None).expect_err("malformed config");
        assert_eq!(error.kind(), ErrorKind::Parse);
    }
}
