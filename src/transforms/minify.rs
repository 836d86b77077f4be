//! Minifiers used by the bundling stage, one per output file type.

use super::{Transform, blocking};
use crate::error::{BuildError, BuildResult};
use crate::pipeline::SourceFile;
use async_trait::async_trait;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use std::sync::Arc;

fn minify_script(transform: &'static str, file: &SourceFile) -> BuildResult<Vec<u8>> {
    let session = minify_js::Session::new();
    let mut out = Vec::new();
    minify_js::minify(
        &session,
        minify_js::TopLevelMode::Global,
        &file.contents,
        &mut out,
    )
    .map_err(|e| BuildError::transform(transform, &file.path, format!("{:?}", e)))?;
    Ok(out)
}

fn minify_stylesheet(transform: &'static str, file: &SourceFile) -> BuildResult<Vec<u8>> {
    let source = file.text(transform)?;
    let options = ParserOptions {
        filename: file.path.display().to_string(),
        ..ParserOptions::default()
    };
    let mut sheet = StyleSheet::parse(source, options)
        .map_err(|e| BuildError::transform(transform, &file.path, e))?;
    sheet
        .minify(MinifyOptions::default())
        .map_err(|e| BuildError::transform(transform, &file.path, e))?;
    let printed = sheet
        .to_css(PrinterOptions {
            minify: true,
            ..PrinterOptions::default()
        })
        .map_err(|e| BuildError::transform(transform, &file.path, e))?;
    Ok(printed.code.into_bytes())
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsMinifier;

#[async_trait]
impl Transform for JsMinifier {
    fn name(&self) -> &'static str {
        "minify-js"
    }

    async fn apply(&self, file: SourceFile) -> BuildResult<Option<SourceFile>> {
        let name = self.name();
        let path = file.path.clone();
        blocking(name, &path, move || {
            let out = minify_script(name, &file)?;
            Ok(Some(file.with_contents(out)))
        })
        .await
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CssMinifier;

#[async_trait]
impl Transform for CssMinifier {
    fn name(&self) -> &'static str {
        "minify-css"
    }

    async fn apply(&self, file: SourceFile) -> BuildResult<Option<SourceFile>> {
        let name = self.name();
        let path = file.path.clone();
        blocking(name, &path, move || {
            let out = minify_stylesheet(name, &file)?;
            Ok(Some(file.with_contents(out)))
        })
        .await
    }
}

/// Markup minifier with whitespace collapsing and embedded CSS/JS minification.
pub struct HtmlMinifier {
    cfg: Arc<minify_html::Cfg>,
}

impl HtmlMinifier {
    pub fn new() -> Self {
        let mut cfg = minify_html::Cfg::new();
        cfg.minify_css = true;
        cfg.minify_js = true;
        Self { cfg: Arc::new(cfg) }
    }
}

impl Default for HtmlMinifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transform for HtmlMinifier {
    fn name(&self) -> &'static str {
        "minify-html"
    }

    async fn apply(&self, file: SourceFile) -> BuildResult<Option<SourceFile>> {
        let cfg = Arc::clone(&self.cfg);
        let path = file.path.clone();
        blocking(self.name(), &path, move || {
            let out = minify_html::minify(&file.contents, &cfg);
            Ok(Some(file.with_contents(out)))
        })
        .await
    }
}

/// Apply the minifier matching the file extension; other files pass through.
pub async fn minify_by_extension(
    transforms: &super::Transforms,
    file: SourceFile,
) -> BuildResult<Option<SourceFile>> {
    match file.extension().as_deref() {
        Some("js") => transforms.minify_js.apply(file).await,
        Some("css") => transforms.minify_css.apply(file).await,
        Some("html") | Some("htm") => transforms.minify_html.apply(file).await,
        _ => Ok(Some(file)),
    }
}
