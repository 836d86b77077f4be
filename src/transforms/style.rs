//! SCSS compilation via `grass`, expanded output.

use super::{Transform, blocking};
use crate::error::{BuildError, BuildResult};
use crate::pipeline::SourceFile;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy)]
pub struct StyleTransform;

impl StyleTransform {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StyleTransform {
    fn default() -> Self {
        Self::new()
    }
}

/// Sass partials (`_name.scss`) are only imported, never emitted.
fn is_partial(file: &SourceFile) -> bool {
    file.path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('_'))
}

#[async_trait]
impl Transform for StyleTransform {
    fn name(&self) -> &'static str {
        "sass"
    }

    async fn apply(&self, file: SourceFile) -> BuildResult<Option<SourceFile>> {
        if is_partial(&file) {
            return Ok(None);
        }

        let name = self.name();
        let path = file.path.clone();
        blocking(name, &path, move || {
            let source = file.text(name)?.to_string();
            let mut options = grass::Options::default().style(grass::OutputStyle::Expanded);
            if let Some(dir) = file.path.parent() {
                options = options.load_path(dir);
            }
            let css = grass::from_string(source, &options)
                .map_err(|e| BuildError::transform(name, &file.path, e))?;
            Ok(Some(file.with_contents(css).with_extension("css")))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_compiles_nested_rules_expanded() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("main.scss");
        std::fs::write(&path, "$c: red;\nbody { p { color: $c; } }\n").unwrap();
        let file = SourceFile::new(&path, temp.path(), std::fs::read(&path).unwrap());

        let out = StyleTransform::new().apply(file).await.unwrap().unwrap();
        assert_eq!(out.relative().unwrap(), std::path::Path::new("main.css"));
        let css = String::from_utf8(out.contents).unwrap();
        assert!(css.contains("body p {\n  color: red;\n}"));
    }

    #[tokio::test]
    async fn test_imports_partials_relative_to_file() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("_vars.scss"), "$w: 10px;").unwrap();
        let path = temp.path().join("main.scss");
        let file = SourceFile::new(&path, temp.path(), b"@import 'vars';\na { width: $w; }".to_vec());

        let out = StyleTransform::new().apply(file).await.unwrap().unwrap();
        assert!(String::from_utf8(out.contents).unwrap().contains("width: 10px;"));
    }

    #[tokio::test]
    async fn test_partial_is_dropped() {
        let file = SourceFile::new("/p/src/_vars.scss", "/p/src", b"$a: 1;".to_vec());
        assert!(StyleTransform::new().apply(file).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_syntax_error_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.scss");
        let file = SourceFile::new(&path, temp.path(), b"a { color: ".to_vec());

        let err = StyleTransform::new().apply(file).await.unwrap_err();
        assert!(matches!(err, BuildError::Transform { transform: "sass", .. }));
    }

    #[tokio::test]
    async fn test_compiles_stream_contents_not_disk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("main.scss");
        std::fs::write(&path, "a { color: red; }").unwrap();
        let file = SourceFile::new(&path, temp.path(), b"a { color: blue; }".to_vec());

        let out = StyleTransform::new().apply(file).await.unwrap().unwrap();
        let css = String::from_utf8(out.contents).unwrap();
        assert!(css.contains("blue"));
        assert!(!css.contains("red"));
    }
}
