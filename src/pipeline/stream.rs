//! File streams: glob selection relative to a base directory and writing
//! results under a destination root.

use crate::error::{BuildError, BuildResult};
use glob::{MatchOptions, Pattern};
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// One file flowing through a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Absolute path of the input (or of the output it stands for).
    pub path: PathBuf,
    /// Prefix stripped from `path` to form the output-relative path.
    pub base: PathBuf,
    pub contents: Vec<u8>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, base: impl Into<PathBuf>, contents: Vec<u8>) -> Self {
        Self {
            path: path.into(),
            base: base.into(),
            contents,
        }
    }

    /// Path relative to the base directory.
    ///
    /// Fails when `path` is not below `base` or climbs out of it with `..`.
    pub fn relative(&self) -> BuildResult<&Path> {
        let outside = || BuildError::OutsideBase {
            path: self.path.clone(),
            base: self.base.clone(),
        };
        let relative = self.path.strip_prefix(&self.base).map_err(|_| outside())?;
        if relative
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
        {
            Ok(relative)
        } else {
            Err(outside())
        }
    }

    /// Lowercased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
    }

    pub fn with_extension(mut self, extension: &str) -> Self {
        self.path.set_extension(extension);
        self
    }

    pub fn with_contents(mut self, contents: impl Into<Vec<u8>>) -> Self {
        self.contents = contents.into();
        self
    }

    /// Contents as UTF-8 text, or a transform error naming `transform`.
    pub fn text(&self, transform: &'static str) -> BuildResult<&str> {
        std::str::from_utf8(&self.contents)
            .map_err(|e| BuildError::transform(transform, &self.path, e))
    }
}

/// Lexically resolve `.` and `..` components without touching the filesystem.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Match options shared by stage selection and watcher classification.
///
/// `*` does not cross directory separators, so `*.html` only matches pages at
/// the root of the source directory.
pub fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    }
}

/// Expand a trailing `**` to `**/*` so the pattern yields files, not only directories.
pub fn normalize_pattern(pattern: &str) -> String {
    let pattern = pattern.trim_start_matches("./");
    if pattern == "**" || pattern.ends_with("/**") {
        format!("{}/*", pattern)
    } else {
        pattern.to_string()
    }
}

/// Select the files matching `pattern` under `cwd`, with paths made relative to `base`.
///
/// Directories matched by the pattern are skipped. A missing `cwd` yields an
/// empty stream. Files come back in sorted path order.
pub async fn select(cwd: &Path, pattern: &str, base: &Path) -> BuildResult<Vec<SourceFile>> {
    let full_pattern = format!(
        "{}/{}",
        Pattern::escape(&cwd.to_string_lossy()),
        normalize_pattern(pattern)
    );
    let entries =
        glob::glob_with(&full_pattern, match_options()).map_err(|source| BuildError::Pattern {
            pattern: pattern.to_string(),
            source,
        })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| {
            let path = e.path().to_path_buf();
            BuildError::io(path, e.into_error())
        })?;
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort();

    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let contents = tokio::fs::read(&path)
            .await
            .map_err(|e| BuildError::io(&path, e))?;
        files.push(SourceFile::new(path, base, contents));
    }

    debug!(
        cwd = %cwd.display(),
        pattern = %pattern,
        count = files.len(),
        "Selected files"
    );
    Ok(files)
}

/// Write every file to `dest`, keeping its base-relative path. Returns the written paths.
pub async fn write(dest: &Path, files: &[SourceFile]) -> BuildResult<Vec<PathBuf>> {
    let mut written = Vec::with_capacity(files.len());
    for file in files {
        let target = dest.join(file.relative()?);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BuildError::io(parent, e))?;
        }
        tokio::fs::write(&target, &file.contents)
            .await
            .map_err(|e| BuildError::io(&target, e))?;
        written.push(target);
    }
    Ok(written)
}
