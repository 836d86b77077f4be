//! Configuration loader: defaults merged with an optional project override.

use super::merge::shallow_merge;
use super::types::Config;
use crate::error::ConfigError;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Override file names looked up in the working directory, in order.
pub const CONFIG_FILE_NAMES: &[&str] = &["page.config.yaml", "page.config.yml", "page.config.json"];

/// Where the resolved configuration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSource {
    /// No usable override; defaults only.
    Defaults,
    /// Defaults merged with an override file.
    Override,
}

/// Configuration loader.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    config: Config,
    config_path: Option<PathBuf>,
    source: ConfigSource,
}

impl ConfigLoader {
    /// Resolve configuration for `cwd`, falling back to defaults on any failure.
    pub fn resolve(cwd: &Path) -> Self {
        Self::resolve_with(cwd, None)
    }

    /// Resolve with an explicit override path in place of the well-known names.
    pub fn resolve_with(cwd: &Path, explicit: Option<&Path>) -> Self {
        match Self::resolve_strict_with(cwd, explicit) {
            Ok(loader) => loader,
            Err(e) => {
                warn!("Ignoring project config, using defaults: {}", e);
                Self::defaults()
            }
        }
    }

    /// Resolve configuration for `cwd`, surfacing errors from a present but broken file.
    ///
    /// Finding no override file by discovery is not an error.
    pub fn resolve_strict(cwd: &Path) -> Result<Self, ConfigError> {
        Self::resolve_strict_with(cwd, None)
    }

    /// Strict resolution with an optional explicit override path.
    ///
    /// An explicit path that does not name a file is an error.
    pub fn resolve_strict_with(cwd: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => {
                let path = if path.is_absolute() {
                    path.to_path_buf()
                } else {
                    cwd.join(path)
                };
                if !path.is_file() {
                    return Err(ConfigError::Missing { path });
                }
                path
            }
            None => match find_config_file(cwd) {
                Some(path) => path,
                None => {
                    debug!("No project config found in {}", cwd.display());
                    return Ok(Self::defaults());
                }
            },
        };

        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let overlay: Value =
            serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;

        let base = serde_json::to_value(Config::default()).map_err(|source| ConfigError::Shape {
            path: path.clone(),
            source,
        })?;
        let merged = shallow_merge(base, overlay);
        let config: Config =
            serde_json::from_value(merged).map_err(|source| ConfigError::Shape {
                path: path.clone(),
                source,
            })?;

        debug!("Loaded project config from {}", path.display());
        Ok(Self {
            config,
            config_path: Some(path),
            source: ConfigSource::Override,
        })
    }

    fn defaults() -> Self {
        Self {
            config: Config::default(),
            config_path: None,
            source: ConfigSource::Defaults,
        }
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Consume the loader and return the configuration.
    pub fn into_config(self) -> Config {
        self.config
    }

    /// Get the override file that was applied, if any.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn source(&self) -> ConfigSource {
        self.source
    }
}

fn find_config_file(cwd: &Path) -> Option<PathBuf> {
    CONFIG_FILE_NAMES
        .iter()
        .map(|name| cwd.join(name))
        .find(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_yaml_preferred_over_json() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("page.config.json"), r#"{"data": {"n": 1}}"#).unwrap();
        std::fs::write(temp.path().join("page.config.yaml"), "data:\n  n: 2\n").unwrap();

        let loader = ConfigLoader::resolve(temp.path());
        assert_eq!(loader.config().data["n"], 2);
        assert!(loader.config_path().unwrap().ends_with("page.config.yaml"));
    }

    #[test]
    fn test_json_override_is_accepted() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("page.config.json"),
            r#"{"server": {"port": 4000}}"#,
        )
        .unwrap();

        let loader = ConfigLoader::resolve(temp.path());
        assert_eq!(loader.source(), ConfigSource::Override);
        assert_eq!(loader.config().server.port, 4000);
    }

    #[test]
    fn test_explicit_path_relative_to_cwd() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("site.yaml"), "build:\n  dist: public_html\n").unwrap();

        let loader = ConfigLoader::resolve_with(temp.path(), Some(Path::new("site.yaml")));
        assert_eq!(loader.config().build.dist, PathBuf::from("public_html"));
    }

    #[test]
    fn test_missing_explicit_path_is_strict_error() {
        let temp = TempDir::new().unwrap();
        let err = ConfigLoader::resolve_strict_with(temp.path(), Some(Path::new("nope.yaml")))
            .unwrap_err();
        match err {
            ConfigError::Missing { path } => assert_eq!(path, temp.path().join("nope.yaml")),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_missing_explicit_path_is_lenient_defaults() {
        let temp = TempDir::new().unwrap();
        let loader = ConfigLoader::resolve_with(temp.path(), Some(Path::new("nope.yaml")));
        assert_eq!(loader.source(), ConfigSource::Defaults);
        assert_eq!(loader.config(), &Config::default());
    }

    #[test]
    fn test_explicit_directory_is_strict_error() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir(temp.path().join("conf")).unwrap();
        let err = ConfigLoader::resolve_strict_with(temp.path(), Some(Path::new("conf")))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Missing { .. }));
    }
}
