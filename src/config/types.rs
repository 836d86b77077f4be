//! Configuration types and structures.
//!
//! Every section carries its own field defaults so that a section replaced
//! wholesale by an override still deserializes when it omits fields.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

/// Default port for the dev server.
pub const DEFAULT_SERVER_PORT: u16 = 3000;

/// Resolved project configuration. Built once at startup, then shared read-only.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Directory roots and per-asset-class globs.
    #[serde(default)]
    pub build: BuildConfig,

    /// Arbitrary data handed to the page templates.
    #[serde(default)]
    pub data: Map<String, Value>,

    /// Dev server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Optional external commands replacing built-in transforms.
    #[serde(default)]
    pub transforms: TransformsConfig,
}

/// Directory layout of a project, relative to the working directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_src")]
    pub src: PathBuf,

    #[serde(default = "default_dist")]
    pub dist: PathBuf,

    #[serde(default = "default_temp")]
    pub temp: PathBuf,

    #[serde(default = "default_public")]
    pub public: PathBuf,

    #[serde(default)]
    pub paths: PathsConfig,
}

fn default_src() -> PathBuf {
    PathBuf::from("src")
}

fn default_dist() -> PathBuf {
    PathBuf::from("dist")
}

fn default_temp() -> PathBuf {
    PathBuf::from("temp")
}

fn default_public() -> PathBuf {
    PathBuf::from("public")
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            src: default_src(),
            dist: default_dist(),
            temp: default_temp(),
            public: default_public(),
            paths: PathsConfig::default(),
        }
    }
}

/// Glob patterns per asset class, relative to the source root.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_styles")]
    pub styles: String,

    #[serde(default = "default_scripts")]
    pub scripts: String,

    #[serde(default = "default_pages")]
    pub pages: String,

    #[serde(default = "default_images")]
    pub images: String,

    #[serde(default = "default_fonts")]
    pub fonts: String,
}

fn default_styles() -> String {
    "assets/styles/*.scss".to_string()
}

fn default_scripts() -> String {
    "assets/scripts/*.js".to_string()
}

fn default_pages() -> String {
    "*.html".to_string()
}

fn default_images() -> String {
    "assets/images/**".to_string()
}

fn default_fonts() -> String {
    "assets/fonts/**".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            styles: default_styles(),
            scripts: default_scripts(),
            pages: default_pages(),
            images: default_images(),
            fonts: default_fonts(),
        }
    }
}

/// Dev server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Port the dev server listens on (default: 3000).
    #[serde(default = "default_server_port")]
    pub port: u16,

    /// Directory exposed under the `/node_modules` URL prefix.
    #[serde(default = "default_node_modules")]
    pub node_modules: PathBuf,
}

fn default_server_port() -> u16 {
    DEFAULT_SERVER_PORT
}

fn default_node_modules() -> PathBuf {
    PathBuf::from("node_modules")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_server_port(),
            node_modules: default_node_modules(),
        }
    }
}

/// An external program that reads a file on stdin and writes the result to stdout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandSpec {
    pub command: String,

    #[serde(default)]
    pub args: Vec<String>,

    /// Replacement extension for the output file, without the dot.
    #[serde(default)]
    pub extension: Option<String>,
}

/// Per-asset-class transform overrides. `None` keeps the built-in transform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransformsConfig {
    #[serde(default)]
    pub style: Option<CommandSpec>,
    #[serde(default)]
    pub script: Option<CommandSpec>,
    #[serde(default)]
    pub page: Option<CommandSpec>,
    #[serde(default)]
    pub image: Option<CommandSpec>,
    #[serde(default)]
    pub font: Option<CommandSpec>,
}

/// Absolute directory roots, resolved against the working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectDirs {
    pub root: PathBuf,
    pub src: PathBuf,
    pub dist: PathBuf,
    pub temp: PathBuf,
    pub public: PathBuf,
    pub node_modules: PathBuf,
}

impl Config {
    /// Resolve every configured directory against `root`.
    pub fn dirs(&self, root: &Path) -> ProjectDirs {
        ProjectDirs {
            root: root.to_path_buf(),
            src: root.join(&self.build.src),
            dist: root.join(&self.build.dist),
            temp: root.join(&self.build.temp),
            public: root.join(&self.build.public),
            node_modules: root.join(&self.server.node_modules),
        }
    }
}
