//! Structured error types for pipeline stages and configuration.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while locating or reading an override file.
///
/// The lenient resolver swallows these; strict resolution returns them.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file {} does not exist", path.display())]
    Missing { path: PathBuf },

    #[error("failed to read config file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("config file {} has an invalid shape: {source}", path.display())]
    Shape {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Error produced by a stage, a task composite, or the dev server.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("{transform} failed on {}: {message}", path.display())]
    Transform {
        transform: &'static str,
        path: PathBuf,
        message: String,
    },

    #[error("cannot resolve bundle reference '{reference}' in {}", page.display())]
    BundleReference { page: PathBuf, reference: String },

    #[error("bundle target '{target}' in {} leaves the output directory", page.display())]
    BundleTarget { page: PathBuf, target: String },

    #[error("{} is outside its base directory {}", path.display(), base.display())]
    OutsideBase { path: PathBuf, base: PathBuf },

    #[error("command '{command}' failed on {}: {message}", path.display())]
    Command {
        command: String,
        path: PathBuf,
        message: String,
    },

    #[error("dev server error: {0}")]
    Server(String),
}

impl BuildError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn transform(
        transform: &'static str,
        path: impl AsRef<Path>,
        message: impl ToString,
    ) -> Self {
        Self::Transform {
            transform,
            path: path.as_ref().to_path_buf(),
            message: message.to_string(),
        }
    }

    pub fn server(err: impl std::fmt::Display) -> Self {
        Self::Server(err.to_string())
    }
}

/// Result type for pipeline operations.
pub type BuildResult<T> = std::result::Result<T, BuildError>;
