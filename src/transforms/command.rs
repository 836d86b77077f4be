//! External command transform.
//!
//! The file contents are piped to the command's stdin and its stdout becomes
//! the new contents. The input path is exported as `NYL_PAGES_FILE`. A
//! non-zero exit fails the stage with the command's stderr.

use super::Transform;
use crate::config::CommandSpec;
use crate::error::{BuildError, BuildResult};
use crate::pipeline::SourceFile;
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

pub struct CommandTransform {
    spec: CommandSpec,
}

impl CommandTransform {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }

    fn error(&self, file: &SourceFile, message: impl ToString) -> BuildError {
        BuildError::Command {
            command: self.spec.command.clone(),
            path: file.path.clone(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl Transform for CommandTransform {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn apply(&self, file: SourceFile) -> BuildResult<Option<SourceFile>> {
        debug!(
            command = %self.spec.command,
            file = %file.path.display(),
            "Running external transform"
        );

        let mut child = Command::new(&self.spec.command)
            .args(&self.spec.args)
            .env("NYL_PAGES_FILE", &file.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| self.error(&file, e))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| self.error(&file, "stdin not captured"))?;
        let input = file.contents.clone();
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        });

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| self.error(&file, e))?;
        // A command may exit without reading all of stdin; its exit status decides.
        let _ = writer.await;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(self.error(
                &file,
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        let mut file = file.with_contents(output.stdout);
        if let Some(ref extension) = self.spec.extension {
            file = file.with_extension(extension);
        }
        Ok(Some(file))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn spec(command: &str, args: &[&str]) -> CommandSpec {
        CommandSpec {
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            extension: None,
        }
    }

    #[tokio::test]
    async fn test_pipes_contents_through_command() {
        let transform = CommandTransform::new(spec("tr", &["a-z", "A-Z"]));
        let file = SourceFile::new("/p/src/a.js", "/p/src", b"let x;".to_vec());
        let out = transform.apply(file).await.unwrap().unwrap();
        assert_eq!(out.contents, b"LET X;");
    }

    #[tokio::test]
    async fn test_extension_is_replaced() {
        let mut spec = spec("cat", &[]);
        spec.extension = Some("css".to_string());
        let file = SourceFile::new("/p/src/a.less", "/p/src", b"a{}".to_vec());
        let out = CommandTransform::new(spec).apply(file).await.unwrap().unwrap();
        assert_eq!(out.relative().unwrap(), std::path::Path::new("a.css"));
    }

    #[tokio::test]
    async fn test_failing_command_fails() {
        let transform = CommandTransform::new(spec("sh", &["-c", "echo broken >&2; exit 3"]));
        let file = SourceFile::new("/p/src/a.js", "/p/src", vec![]);
        let err = transform.apply(file).await.unwrap_err();
        match err {
            BuildError::Command { message, .. } => assert!(message.contains("broken")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_missing_program_fails() {
        let transform = CommandTransform::new(spec("definitely-not-a-real-program-xyz", &[]));
        let file = SourceFile::new("/p/src/a.js", "/p/src", vec![]);
        assert!(transform.apply(file).await.is_err());
    }
}
