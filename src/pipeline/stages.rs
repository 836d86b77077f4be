//! The pipeline stages: clean, the five asset-class stages, the static copy,
//! and bundling.

use super::stream::{self, SourceFile};
use crate::bundle::Bundler;
use crate::config::{Config, ProjectDirs};
use crate::error::{BuildError, BuildResult};
use crate::transforms::{Transform, Transforms, minify_by_extension};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Every stage the task graph can schedule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Clean,
    Style,
    Script,
    Page,
    Image,
    Font,
    Extra,
    Bundle,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::Clean,
        Stage::Style,
        Stage::Script,
        Stage::Page,
        Stage::Image,
        Stage::Font,
        Stage::Extra,
        Stage::Bundle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::Clean => "clean",
            Stage::Style => "style",
            Stage::Script => "script",
            Stage::Page => "page",
            Stage::Image => "image",
            Stage::Font => "font",
            Stage::Extra => "extra",
            Stage::Bundle => "bundle",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Configuration and transforms shared by every stage of one process.
pub struct Pipeline {
    config: Arc<Config>,
    dirs: ProjectDirs,
    transforms: Transforms,
}

impl Pipeline {
    /// Pipeline rooted at `root` with the built-in (or configured) transforms.
    pub fn new(config: Arc<Config>, root: &Path) -> Self {
        let dirs = config.dirs(root);
        let transforms = Transforms::from_config(&config, &dirs.src);
        Self::with_transforms(config, root, transforms)
    }

    pub fn with_transforms(config: Arc<Config>, root: &Path, transforms: Transforms) -> Self {
        let dirs = config.dirs(root);
        Self {
            config,
            dirs,
            transforms,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn dirs(&self) -> &ProjectDirs {
        &self.dirs
    }

    pub fn transforms(&self) -> &Transforms {
        &self.transforms
    }

    /// Run one stage to completion. Returns the files it wrote (or removed, for clean).
    pub async fn run(&self, stage: Stage) -> BuildResult<Vec<PathBuf>> {
        let paths = &self.config.build.paths;
        let dirs = &self.dirs;
        let written = match stage {
            Stage::Clean => self.clean().await?,
            Stage::Style => {
                self.compile(&paths.styles, &self.transforms.style, &dirs.temp)
                    .await?
            }
            Stage::Script => {
                self.compile(&paths.scripts, &self.transforms.script, &dirs.temp)
                    .await?
            }
            Stage::Page => {
                self.compile(&paths.pages, &self.transforms.page, &dirs.temp)
                    .await?
            }
            Stage::Image => {
                self.compile(&paths.images, &self.transforms.image, &dirs.dist)
                    .await?
            }
            Stage::Font => {
                self.compile(&paths.fonts, &self.transforms.font, &dirs.dist)
                    .await?
            }
            Stage::Extra => self.extra().await?,
            Stage::Bundle => self.bundle().await?,
        };
        info!(stage = %stage, files = written.len(), "Stage complete");
        Ok(written)
    }

    /// Select `pattern` under the source root, apply `transform`, write to `dest`.
    async fn compile(
        &self,
        pattern: &str,
        transform: &Arc<dyn Transform>,
        dest: &Path,
    ) -> BuildResult<Vec<PathBuf>> {
        let src = &self.dirs.src;
        let inputs = stream::select(src, pattern, src).await?;

        let mut outputs = Vec::with_capacity(inputs.len());
        for file in inputs {
            if let Some(out) = transform.apply(file).await? {
                outputs.push(out);
            }
        }
        stream::write(dest, &outputs).await
    }

    async fn clean(&self) -> BuildResult<Vec<PathBuf>> {
        let mut removed = Vec::new();
        for dir in [&self.dirs.dist, &self.dirs.temp] {
            match tokio::fs::remove_dir_all(dir).await {
                Ok(()) => {
                    debug!(dir = %dir.display(), "Removed");
                    removed.push(dir.clone());
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(BuildError::io(dir, e)),
            }
        }
        Ok(removed)
    }

    async fn extra(&self) -> BuildResult<Vec<PathBuf>> {
        let public = &self.dirs.public;
        let files = stream::select(public, "**", public).await?;
        stream::write(&self.dirs.dist, &files).await
    }

    async fn bundle(&self) -> BuildResult<Vec<PathBuf>> {
        let temp = &self.dirs.temp;
        let pages = stream::select(temp, &self.config.build.paths.pages, temp).await?;
        let bundler = Bundler::new(vec![temp.clone(), self.dirs.root.clone()]);

        // Pages sharing a bundle target produce the same file; keep one.
        let mut outputs: BTreeMap<PathBuf, SourceFile> = BTreeMap::new();
        for page in pages {
            let bundle = bundler.bundle(page).await?;
            for file in std::iter::once(bundle.page).chain(bundle.assets) {
                if let Some(min) = minify_by_extension(&self.transforms, file).await? {
                    let key = min.relative()?.to_path_buf();
                    outputs.insert(key, min);
                }
            }
        }

        let files: Vec<SourceFile> = outputs.into_values().collect();
        stream::write(&self.dirs.dist, &files).await
    }
}
