/// CLI configuration
use crate::error::{CliError, Result};
use muman_core::LibraryConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "muman.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MumanConfig {
    #[serde(default = "default_storage")]
    pub storage: StorageSettings,

    #[serde(default)]
    pub library: LibraryConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageSettings {
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

impl MumanConfig {
    /// Load configuration from an optional TOML file and the environment.
    ///
    /// Variables are prefixed with `MUMAN_` and nest with `__`, e.g.
    /// `MUMAN_STORAGE__DATABASE_URL` or `MUMAN_LIBRARY__ROOTS=/a,/b`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut settings = config::Config::builder();

        match path {
            Some(path) => {
                settings = settings.add_source(config::File::from(path.to_path_buf()).required(true));
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    settings = settings.add_source(config::File::from(default_path));
                }
            }
        }

        settings = settings.add_source(
            config::Environment::with_prefix("MUMAN")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("library.roots")
                .with_list_parse_key("library.extensions")
                .try_parsing(true),
        );

        let config = settings
            .build()
            .map_err(|e| CliError::Config(e.to_string()))?;

        config
            .try_deserialize()
            .map_err(|e| CliError::Config(e.to_string()))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.storage.database_url.trim().is_empty() {
            return Err(CliError::Config(
                "database URL is required (set MUMAN_STORAGE__DATABASE_URL)".to_string(),
            ));
        }

        if self.library.workers == 0 {
            return Err(CliError::Config("library.workers must be at least 1".to_string()));
        }

        if self.library.extensions.is_empty() {
            return Err(CliError::Config(
                "library.extensions must list at least one extension".to_string(),
            ));
        }

        if let Some(ext) = self
            .library
            .extensions
            .iter()
            .find(|ext| ext.is_empty() || ext.starts_with('.'))
        {
            return Err(CliError::Config(format!(
                "invalid extension {ext:?} (use e.g. \"mp3\", without the dot)"
            )));
        }

        Ok(())
    }
}

// Default values
fn default_storage() -> StorageSettings {
    StorageSettings {
        database_url: default_database_url(),
    }
}

fn default_database_url() -> String {
    "sqlite://./muman.db".to_string()
}

impl Default for MumanConfig {
    fn default() -> Self {
        Self {
            storage: default_storage(),
            library: LibraryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use muman_core::ResolutionPolicy;

    #[test]
    fn defaults_are_valid() {
        let config = MumanConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.library.policy, ResolutionPolicy::ReportOnly);
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("muman.toml");
        std::fs::write(
            &path,
            r#"
[storage]
database_url = "sqlite:///tmp/library.db"

[library]
roots = ["/srv/music"]
policy = "keep-shortest-path"
workers = 3
"#,
        )
        .unwrap();

        let config = MumanConfig::load(Some(&path)).unwrap();
        assert_eq!(config.storage.database_url, "sqlite:///tmp/library.db");
        assert_eq!(config.library.roots, vec![PathBuf::from("/srv/music")]);
        assert_eq!(config.library.policy, ResolutionPolicy::KeepShortestPath);
        assert_eq!(config.library.workers, 3);
        assert!(config.library.extensions.contains(&"flac".to_string()));
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = MumanConfig::load(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(matches!(err, CliError::Config(_)));
    }

    #[test]
    fn zero_workers_is_rejected() {
        let mut config = MumanConfig::default();
        config.library.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn dotted_extension_is_rejected() {
        let mut config = MumanConfig::default();
        config.library.extensions = vec![".mp3".to_string()];
        assert!(config.validate().is_err());
    }
}
