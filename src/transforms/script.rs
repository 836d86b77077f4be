//! Script transpiling via `oxc`, lowered to a fixed ES5 target.
//!
//! Syntax the target lacks (arrow functions and the like) is rewritten; the
//! rest is printed back unchanged. An external transpiler configured under
//! `transforms.script` replaces this pass entirely.

use super::{Transform, blocking};
use crate::error::{BuildError, BuildResult};
use crate::pipeline::SourceFile;
use async_trait::async_trait;
use oxc::allocator::Allocator;
use oxc::codegen::Codegen;
use oxc::parser::Parser;
use oxc::semantic::SemanticBuilder;
use oxc::span::SourceType;
use oxc::transformer::{TransformOptions, Transformer};

const NAME: &str = "script";

/// Output language level for every script.
pub const SCRIPT_TARGET: &str = "es5";

#[derive(Debug, Clone, Copy, Default)]
pub struct ScriptTransform;

impl ScriptTransform {
    pub fn new() -> Self {
        Self
    }
}

fn transpile(file: &SourceFile) -> BuildResult<String> {
    let source = file.text(NAME)?;
    let allocator = Allocator::default();

    let parsed = Parser::new(&allocator, source, SourceType::default()).parse();
    if let Some(error) = parsed.errors.first() {
        return Err(BuildError::transform(NAME, &file.path, error));
    }
    let mut program = parsed.program;

    let scoping = SemanticBuilder::new()
        .build(&program)
        .semantic
        .into_scoping();
    let options = TransformOptions::from_target(SCRIPT_TARGET)
        .map_err(|e| BuildError::transform(NAME, &file.path, e))?;
    let transformed = Transformer::new(&allocator, &file.path, &options)
        .build_with_scoping(scoping, &mut program);
    if let Some(error) = transformed.errors.first() {
        return Err(BuildError::transform(NAME, &file.path, error));
    }

    Ok(Codegen::new().build(&program).code)
}

#[async_trait]
impl Transform for ScriptTransform {
    fn name(&self) -> &'static str {
        NAME
    }

    async fn apply(&self, file: SourceFile) -> BuildResult<Option<SourceFile>> {
        let path = file.path.clone();
        blocking(NAME, &path, move || {
            let code = transpile(&file)?;
            Ok(Some(file.with_contents(code)))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn script(source: &str) -> SourceFile {
        SourceFile::new("/p/src/main.js", "/p/src", source.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn test_arrow_functions_are_lowered() {
        let file = script("const add = (a, b) => a + b;\nconsole.log(add(1, 2));\n");
        let out = ScriptTransform::new().apply(file).await.unwrap().unwrap();
        let code = String::from_utf8(out.contents).unwrap();
        assert!(!code.contains("=>"), "arrow survived: {}", code);
        assert!(code.contains("function"));
        assert!(code.contains("console.log(add(1, 2))"));
    }

    #[tokio::test]
    async fn test_plain_es5_keeps_its_statements() {
        let file = script("var total = 1 + 2;\nfunction show(x) { return x; }\nshow(total);\n");
        let out = ScriptTransform::new().apply(file).await.unwrap().unwrap();
        let code = String::from_utf8(out.contents).unwrap();
        assert!(code.contains("var total = 1 + 2;"));
        assert!(code.contains("function show(x)"));
    }

    #[tokio::test]
    async fn test_syntax_error_fails() {
        let err = ScriptTransform::new()
            .apply(script("const = ;"))
            .await
            .unwrap_err();
        assert!(matches!(err, BuildError::Transform { transform: "script", .. }));
    }
}
