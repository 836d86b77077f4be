//! File transforms.
//!
//! A [`Transform`] takes one file and returns the transformed file, or `None`
//! when the file is consumed without output (Sass partials). Stages treat
//! transforms as opaque; the built-ins wrap ecosystem crates and any of the
//! per-asset-class ones can be replaced by an external command.

mod command;
mod image;
mod minify;
mod page;
mod script;
mod style;

pub use command::CommandTransform;
pub use image::ImageTransform;
pub use minify::{CssMinifier, HtmlMinifier, JsMinifier, minify_by_extension};
pub use page::PageTransform;
pub use script::ScriptTransform;
pub use style::StyleTransform;

use crate::config::{CommandSpec, Config};
use crate::error::{BuildError, BuildResult};
use crate::pipeline::SourceFile;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

#[async_trait]
pub trait Transform: Send + Sync {
    /// Short name used in logs and errors.
    fn name(&self) -> &'static str;

    async fn apply(&self, file: SourceFile) -> BuildResult<Option<SourceFile>>;
}

/// The transform bound to each stage.
#[derive(Clone)]
pub struct Transforms {
    pub style: Arc<dyn Transform>,
    pub script: Arc<dyn Transform>,
    pub page: Arc<dyn Transform>,
    pub image: Arc<dyn Transform>,
    pub font: Arc<dyn Transform>,
    pub minify_js: Arc<dyn Transform>,
    pub minify_css: Arc<dyn Transform>,
    pub minify_html: Arc<dyn Transform>,
}

impl Transforms {
    /// Built-in transforms, with command overrides from `config.transforms`.
    pub fn from_config(config: &Config, src_root: &Path) -> Self {
        let overrides = &config.transforms;
        let image: Arc<dyn Transform> = Arc::new(ImageTransform::new());

        Self {
            style: pick(&overrides.style, || Arc::new(StyleTransform::new())),
            script: pick(&overrides.script, || Arc::new(ScriptTransform::new())),
            page: pick(&overrides.page, || {
                Arc::new(PageTransform::new(src_root, config.data.clone()))
            }),
            image: pick(&overrides.image, || Arc::clone(&image)),
            font: pick(&overrides.font, || image),
            minify_js: Arc::new(JsMinifier),
            minify_css: Arc::new(CssMinifier),
            minify_html: Arc::new(HtmlMinifier::new()),
        }
    }
}

/// Run CPU-bound transform work on the blocking pool so sibling stages keep running.
async fn blocking<T, F>(transform: &'static str, path: &Path, work: F) -> BuildResult<T>
where
    F: FnOnce() -> BuildResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| BuildError::transform(transform, path, e))?
}

fn pick(
    spec: &Option<CommandSpec>,
    builtin: impl FnOnce() -> Arc<dyn Transform>,
) -> Arc<dyn Transform> {
    match spec {
        Some(spec) => Arc::new(CommandTransform::new(spec.clone())),
        None => builtin(),
    }
}
