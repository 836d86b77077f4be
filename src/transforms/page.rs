//! Page templates rendered with `minijinja`.
//!
//! `extends`/`include` resolve against the source root. A fresh environment is
//! built for every file so edited layouts are always picked up.

use super::{Transform, blocking};
use crate::error::{BuildError, BuildResult};
use crate::pipeline::SourceFile;
use async_trait::async_trait;
use minijinja::Environment;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const NAME: &str = "template";

pub struct PageTransform {
    root: Arc<PathBuf>,
    data: Arc<Map<String, Value>>,
}

impl PageTransform {
    pub fn new(root: &Path, data: Map<String, Value>) -> Self {
        Self {
            root: Arc::new(root.to_path_buf()),
            data: Arc::new(data),
        }
    }
}

fn render(root: &Path, data: &Map<String, Value>, file: &SourceFile) -> BuildResult<String> {
    let source = file.text(NAME)?;
    let name = template_name(file)?;

    let mut env = Environment::new();
    env.set_loader(minijinja::path_loader(root));
    env.add_template_owned(name.clone(), source.to_string())
        .map_err(|e| BuildError::transform(NAME, &file.path, e))?;

    let template = env
        .get_template(&name)
        .map_err(|e| BuildError::transform(NAME, &file.path, e))?;
    template
        .render(data)
        .map_err(|e| BuildError::transform(NAME, &file.path, e))
}

/// Template name: the base-relative path with forward slashes.
fn template_name(file: &SourceFile) -> BuildResult<String> {
    Ok(file
        .relative()?
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}

#[async_trait]
impl Transform for PageTransform {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn apply(&self, file: SourceFile) -> BuildResult<Option<SourceFile>> {
        let root = Arc::clone(&self.root);
        let data = Arc::clone(&self.data);
        let path = file.path.clone();
        blocking(NAME, &path, move || {
            let html = render(&root, &data, &file)?;
            Ok(Some(file.with_contents(html)))
        })
        .await
    }
}
