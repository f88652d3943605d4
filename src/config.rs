//! Configuration module
//!
//! This module provides the immutable configuration snapshot every component
//! reads its policy from. Configuration is stored as JSON, by default in the
//! system's standard configuration directory. A reload means building a new
//! [`Config`]; nothing here is mutated in place.

use crate::ordering::{GroupFilter, OrderingPolicy};
use crate::synopsis::SynopsisConfig;
use crate::titles::{JoinPolicy, TitleLanguage};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the configuration file inside the configuration directory
const CONFIG_FILE_NAME: &str = "config.json";

/// Errors that can occur while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to determine configuration directory location
    #[error("Failed to determine configuration directory location")]
    ConfigDirectoryNotFound,

    /// Failed to read the configuration file
    #[error("Failed to read configuration file {path}: {source}")]
    ReadFailed {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to deserialize the configuration file
    #[error("Failed to parse configuration file {path}: {source}")]
    DeserializationFailed {
        path: PathBuf,
        source: serde_json::Error,
    },

    /// The configuration parsed but holds unusable values
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration snapshot consumed by the synthesizer and the merge manager
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Preference list for display titles, most preferred first
    pub title_languages: Vec<TitleLanguage>,
    /// Preference list for descriptions, most preferred first
    pub description_languages: Vec<TitleLanguage>,
    pub synopsis: SynopsisConfig,
    /// Prefix non-normal episodes with a type tag such as `S3`
    pub mark_specials_when_grouped: bool,
    pub add_anidb_id: bool,
    pub add_tmdb_id: bool,
    pub add_tvdb_id: bool,
    /// Number the seasons of a show as one continuous run
    pub use_groups: bool,
    pub group_filter: GroupFilter,
    pub join: JoinPolicy,
    /// Root of the virtual library; the video provider ignores other paths
    pub virtual_root: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            title_languages: vec![
                TitleLanguage::Metadata,
                TitleLanguage::Code("en".to_string()),
                TitleLanguage::Code("x-jat".to_string()),
            ],
            description_languages: vec![
                TitleLanguage::Metadata,
                TitleLanguage::Code("en".to_string()),
            ],
            synopsis: SynopsisConfig::default(),
            mark_specials_when_grouped: false,
            add_anidb_id: true,
            add_tmdb_id: true,
            add_tvdb_id: true,
            use_groups: false,
            group_filter: GroupFilter::Default,
            join: JoinPolicy::default(),
            virtual_root: None,
        }
    }
}

impl Config {
    /// Returns the default configuration file location
    ///
    /// The file lives in the system's standard configuration directory for
    /// this application, e.g. `~/.config/anisynth/config.json` on Linux.
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        let proj_dirs = directories::ProjectDirs::from("org", "anisynth", "anisynth")
            .ok_or(ConfigError::ConfigDirectoryNotFound)?;

        Ok(proj_dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Loads and validates the configuration stored at `path`
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::ReadFailed {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config =
            serde_json::from_str(&content).map_err(|e| ConfigError::DeserializationFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        config.validate()?;
        log::debug!("Loaded configuration from {}", path.display());

        Ok(config)
    }

    /// Loads the configuration from the default location
    ///
    /// A missing file is not an error; the defaults are used instead.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path()?;

        if !path.exists() {
            log::debug!(
                "No configuration at {}; using defaults",
                path.display()
            );
            return Ok(Self::default());
        }

        Self::load(&path)
    }

    /// Checks values serde can't check on its own
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.join.title_separator.is_empty() {
            return Err(ConfigError::Invalid(
                "join.title_separator must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// The numbering policy slice of the configuration
    pub fn ordering(&self) -> OrderingPolicy {
        OrderingPolicy {
            use_groups: self.use_groups,
            group_filter: self.group_filter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_keeps_defaults() {
        let config: Config = serde_json::from_str(
            r#"{
                "title_languages": ["origin", "en"],
                "synopsis": { "clean_links": false },
                "use_groups": true,
                "group_filter": "others"
            }"#,
        )
        .unwrap();

        assert_eq!(
            config.title_languages,
            vec![TitleLanguage::Origin, TitleLanguage::Code("en".to_string())]
        );
        assert!(!config.synopsis.clean_links);
        assert!(config.synopsis.remove_summary);
        assert!(config.add_anidb_id);
        assert_eq!(
            config.ordering(),
            OrderingPolicy {
                use_groups: true,
                group_filter: GroupFilter::Others,
            }
        );
        assert_eq!(config.join, JoinPolicy::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "mark_specials_when_grouped": true }"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert!(config.mark_specials_when_grouped);
    }

    #[test]
    fn test_load_rejects_empty_separator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{ "join": { "title_separator": "" } }"#).unwrap();

        assert!(matches!(Config::load(&path), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = Config::load(Path::new("/nonexistent/anisynth/config.json"));
        assert!(matches!(result, Err(ConfigError::ReadFailed { .. })));
    }
}
