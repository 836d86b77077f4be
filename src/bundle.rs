//! Build-block resolution for compiled pages.
//!
//! A page marks groups of assets that should ship as one file:
//!
//! ```html
//! <!-- build:css assets/styles/vendor.css -->
//! <link rel="stylesheet" href="/node_modules/bootstrap/dist/css/bootstrap.css">
//! <!-- endbuild -->
//! ```
//!
//! Each referenced file is looked up in the search path, the contents are
//! concatenated into the block's target, and the block is replaced by a single
//! tag pointing at the target. `build:remove` blocks are dropped; blocks of any
//! other type keep their inner markup.

use crate::error::{BuildError, BuildResult};
use crate::pipeline::SourceFile;
use crate::pipeline::stream::normalize_path;
use regex_lite::Regex;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;

fn block_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"(?s)<!--\s*build:(\w+)(?:\(([^)]*)\))?\s+(\S+)\s*-->(.*?)<!--\s*endbuild\s*-->",
        )
        .expect("block pattern is valid")
    })
}

fn reference_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?i)<(?:script|link)\b[^>]*?\b(?:src|href)\s*=\s*["']([^"']+)["']"#)
            .expect("reference pattern is valid")
    })
}

/// Asset type of a build block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockKind {
    Css,
    Js,
    Remove,
    Other(String),
}

impl BlockKind {
    fn parse(kind: &str) -> Self {
        match kind {
            "css" => BlockKind::Css,
            "js" => BlockKind::Js,
            "remove" => BlockKind::Remove,
            other => BlockKind::Other(other.to_string()),
        }
    }
}

/// One `<!-- build:... -->` region of a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildBlock {
    pub kind: BlockKind,
    /// Extra search directory given as `build:css(dir)`.
    pub alternate_search: Option<String>,
    pub target: String,
    pub references: Vec<String>,
    /// Markup between the opening and closing comments.
    pub inner: String,
    /// Byte range of the whole block in the page.
    pub span: Range<usize>,
}

impl BuildBlock {
    /// The single tag that replaces the block.
    pub fn replacement(&self) -> String {
        match self.kind {
            BlockKind::Css => format!(r#"<link rel="stylesheet" href="{}">"#, self.target),
            BlockKind::Js => format!(r#"<script src="{}"></script>"#, self.target),
            BlockKind::Remove => String::new(),
            BlockKind::Other(_) => self.inner.clone(),
        }
    }

    fn bundles_assets(&self) -> bool {
        matches!(self.kind, BlockKind::Css | BlockKind::Js)
    }
}

/// Find every build block in `html`, in document order.
pub fn parse_blocks(html: &str) -> Vec<BuildBlock> {
    block_regex()
        .captures_iter(html)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let inner = caps.get(4).map_or("", |m| m.as_str());
            let references = reference_regex()
                .captures_iter(inner)
                .filter_map(|r| r.get(1).map(|m| m.as_str().to_string()))
                .collect();
            Some(BuildBlock {
                kind: BlockKind::parse(caps.get(1)?.as_str()),
                alternate_search: caps
                    .get(2)
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|s| !s.is_empty()),
                target: caps.get(3)?.as_str().to_string(),
                references,
                inner: inner.to_string(),
                span: whole.range(),
            })
        })
        .collect()
}

/// Rewrite `html`, replacing each block with its replacement tag.
pub fn rewrite(html: &str, blocks: &[BuildBlock]) -> String {
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;
    for block in blocks {
        out.push_str(&html[cursor..block.span.start]);
        out.push_str(&block.replacement());
        cursor = block.span.end;
    }
    out.push_str(&html[cursor..]);
    out
}

/// A page with its blocks resolved, plus the concatenated assets it points to.
#[derive(Debug, Clone)]
pub struct Bundle {
    pub page: SourceFile,
    pub assets: Vec<SourceFile>,
}

/// Resolves build blocks against an ordered list of search directories.
#[derive(Debug, Clone)]
pub struct Bundler {
    search_paths: Vec<PathBuf>,
}

impl Bundler {
    pub fn new(search_paths: Vec<PathBuf>) -> Self {
        Self { search_paths }
    }

    pub async fn bundle(&self, page: SourceFile) -> BuildResult<Bundle> {
        let html = page.text("bundle")?.to_string();
        let blocks = parse_blocks(&html);
        if blocks.is_empty() {
            return Ok(Bundle {
                page,
                assets: Vec::new(),
            });
        }

        let page_dir = page.path.parent().unwrap_or(&page.base).to_path_buf();
        let mut assets = Vec::new();
        for block in blocks.iter().filter(|b| b.bundles_assets()) {
            let target = target_path(&page, &page_dir, block)?;
            let mut contents: Vec<u8> = Vec::new();
            for (i, reference) in block.references.iter().enumerate() {
                let path = self.resolve(&page, block, reference)?;
                let bytes = tokio::fs::read(&path)
                    .await
                    .map_err(|e| BuildError::io(&path, e))?;
                if i > 0 {
                    contents.push(b'\n');
                }
                contents.extend_from_slice(&bytes);
            }

            debug!(
                page = %page.path.display(),
                target = %block.target,
                inputs = block.references.len(),
                "Bundled assets"
            );
            assets.push(SourceFile::new(target, &page.base, contents));
        }

        let rewritten = rewrite(&html, &blocks);
        Ok(Bundle {
            page: page.with_contents(rewritten),
            assets,
        })
    }

    /// Locate a referenced asset. The page's own directory is tried before the
    /// search root for relative references; the first existing file wins.
    fn resolve(&self, page: &SourceFile, block: &BuildBlock, reference: &str) -> BuildResult<PathBuf> {
        let clean = strip_query(reference);
        let page_rel_dir = page.relative()?.parent().unwrap_or(Path::new(""));
        let page_dir = page.path.parent().unwrap_or(&page.base);

        let mut dirs: Vec<PathBuf> = Vec::new();
        if let Some(ref alt) = block.alternate_search {
            dirs.push(page_dir.join(alt));
        }
        dirs.extend(self.search_paths.iter().cloned());

        for dir in &dirs {
            let candidates = match clean.strip_prefix('/') {
                Some(rooted) => vec![dir.join(rooted)],
                None => vec![dir.join(page_rel_dir).join(clean), dir.join(clean)],
            };
            if let Some(found) = candidates.into_iter().find(|c| c.is_file()) {
                return Ok(found);
            }
        }

        Err(BuildError::BundleReference {
            page: page.path.clone(),
            reference: reference.to_string(),
        })
    }
}

/// Where a block's bundle is written: below the page's base directory, never outside it.
fn target_path(page: &SourceFile, page_dir: &Path, block: &BuildBlock) -> BuildResult<PathBuf> {
    let joined = match block.target.strip_prefix('/') {
        Some(rooted) => page.base.join(rooted),
        None => page_dir.join(&block.target),
    };
    let base = normalize_path(&page.base);
    let target = normalize_path(&joined);
    if target.starts_with(&base) && target != base {
        Ok(target)
    } else {
        Err(BuildError::BundleTarget {
            page: page.path.clone(),
            target: block.target.clone(),
        })
    }
}

fn strip_query(reference: &str) -> &str {
    let end = reference.find(['?', '#']).unwrap_or(reference.len());
    &reference[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const PAGE: &str = r#"<html><head>
<!-- build:css assets/styles/vendor.css -->
<link rel="stylesheet" href="/node_modules/lib/lib.css">
<!-- endbuild -->
<!-- build:css assets/styles/main.css -->
<link rel="stylesheet" href="assets/styles/main.css?v=1">
<!-- endbuild -->
</head><body>
<!-- build:js assets/scripts/main.js -->
<script src="assets/scripts/a.js"></script>
<script src='assets/scripts/b.js'></script>
<!-- endbuild -->
<!-- build:remove dev -->
<script src="/dev-only.js"></script>
<!-- endbuild -->
</body></html>"#;

    #[test]
    fn test_parse_blocks() {
        let blocks = parse_blocks(PAGE);
        assert_eq!(blocks.len(), 4);

        assert_eq!(blocks[0].kind, BlockKind::Css);
        assert_eq!(blocks[0].target, "assets/styles/vendor.css");
        assert_eq!(blocks[0].references, vec!["/node_modules/lib/lib.css"]);

        assert_eq!(blocks[2].kind, BlockKind::Js);
        assert_eq!(
            blocks[2].references,
            vec!["assets/scripts/a.js", "assets/scripts/b.js"]
        );
        assert_eq!(blocks[3].kind, BlockKind::Remove);
    }

    #[test]
    fn test_alternate_search_path() {
        let html = "<!-- build:js(vendor) lib.js --><script src=\"x.js\"></script><!-- endbuild -->";
        let blocks = parse_blocks(html);
        assert_eq!(blocks[0].alternate_search.as_deref(), Some("vendor"));
        assert_eq!(blocks[0].target, "lib.js");
    }

    #[test]
    fn test_rewrite_replaces_blocks() {
        let blocks = parse_blocks(PAGE);
        let out = rewrite(PAGE, &blocks);
        assert!(out.contains(r#"<link rel="stylesheet" href="assets/styles/vendor.css">"#));
        assert!(out.contains(r#"<script src="assets/scripts/main.js"></script>"#));
        assert!(!out.contains("build:"));
        assert!(!out.contains("dev-only.js"));
        assert!(!out.contains("a.js"));
    }

    #[test]
    fn test_unknown_block_keeps_inner_markup() {
        let html = "a<!-- build:img x.png --><img src=\"x.png\"><!-- endbuild -->b";
        let out = rewrite(html, &parse_blocks(html));
        assert_eq!(out, "a<img src=\"x.png\">b");
    }

    #[test]
    fn test_page_without_blocks_unchanged() {
        let html = "<p>plain</p>";
        assert!(parse_blocks(html).is_empty());
        assert_eq!(rewrite(html, &[]), html);
    }

    #[test]
    fn test_strip_query() {
        assert_eq!(strip_query("a.css?v=1"), "a.css");
        assert_eq!(strip_query("a.js#top"), "a.js");
        assert_eq!(strip_query("a.js"), "a.js");
    }

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn test_bundle_concatenates_from_search_paths() {
        let project = TempDir::new().unwrap();
        let temp = project.path().join("temp");
        write(&temp, "assets/styles/main.css", "b{}");
        write(&temp, "assets/scripts/a.js", "var a;");
        write(&temp, "assets/scripts/b.js", "var b;");
        write(project.path(), "node_modules/lib/lib.css", "lib{}");

        let page = SourceFile::new(temp.join("index.html"), &temp, PAGE.as_bytes().to_vec());
        let bundler = Bundler::new(vec![temp.clone(), project.path().to_path_buf()]);
        let bundle = bundler.bundle(page).await.unwrap();

        let assets: Vec<(PathBuf, String)> = bundle
            .assets
            .iter()
            .map(|a| {
                (
                    a.relative().unwrap().to_path_buf(),
                    String::from_utf8(a.contents.clone()).unwrap(),
                )
            })
            .collect();
        assert_eq!(
            assets,
            vec![
                (PathBuf::from("assets/styles/vendor.css"), "lib{}".to_string()),
                (PathBuf::from("assets/styles/main.css"), "b{}".to_string()),
                (PathBuf::from("assets/scripts/main.js"), "var a;\nvar b;".to_string()),
            ]
        );
        let html = String::from_utf8(bundle.page.contents).unwrap();
        assert!(html.contains(r#"href="assets/styles/main.css""#));
    }

    #[tokio::test]
    async fn test_missing_reference_fails() {
        let project = TempDir::new().unwrap();
        let temp = project.path().join("temp");
        let html = "<!-- build:js app.js --><script src=\"missing.js\"></script><!-- endbuild -->";
        let page = SourceFile::new(temp.join("index.html"), &temp, html.as_bytes().to_vec());

        let err = Bundler::new(vec![temp.clone()]).bundle(page).await.unwrap_err();
        match err {
            BuildError::BundleReference { reference, .. } => assert_eq!(reference, "missing.js"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_relative_reference_from_nested_page() {
        let project = TempDir::new().unwrap();
        let temp = project.path().join("temp");
        write(&temp, "docs/local.js", "local();");
        let html = "<!-- build:js bundle.js --><script src=\"local.js\"></script><!-- endbuild -->";
        let page = SourceFile::new(temp.join("docs/page.html"), &temp, html.as_bytes().to_vec());

        let bundle = Bundler::new(vec![temp.clone()]).bundle(page).await.unwrap();
        assert_eq!(bundle.assets[0].relative().unwrap(), Path::new("docs/bundle.js"));
        assert_eq!(bundle.assets[0].contents, b"local();");
    }

    #[tokio::test]
    async fn test_target_may_climb_within_base() {
        let project = TempDir::new().unwrap();
        let temp = project.path().join("temp");
        write(&temp, "docs/local.js", "local();");
        let html = "<!-- build:js ../shared/app.js --><script src=\"local.js\"></script><!-- endbuild -->";
        let page = SourceFile::new(temp.join("docs/page.html"), &temp, html.as_bytes().to_vec());

        let bundle = Bundler::new(vec![temp.clone()]).bundle(page).await.unwrap();
        assert_eq!(bundle.assets[0].relative().unwrap(), Path::new("shared/app.js"));
    }

    #[tokio::test]
    async fn test_target_escaping_base_fails() {
        let project = TempDir::new().unwrap();
        let temp = project.path().join("temp");
        write(&temp, "a.js", "a();");

        for target in ["../../escaped.js", "/../escaped.js", "docs/../../escaped.js"] {
            let html = format!(
                "<!-- build:js {} --><script src=\"a.js\"></script><!-- endbuild -->",
                target
            );
            let page = SourceFile::new(temp.join("index.html"), &temp, html.into_bytes());
            let err = Bundler::new(vec![temp.clone()]).bundle(page).await.unwrap_err();
            match err {
                BuildError::BundleTarget { target: t, .. } => assert_eq!(t, target),
                other => panic!("unexpected error: {other}"),
            }
        }
    }
}
