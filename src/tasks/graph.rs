//! The fixed task graphs exposed to the command line.

use super::{Job, Task};
use crate::error::BuildResult;
use crate::pipeline::{Pipeline, Stage};
use async_trait::async_trait;
use std::sync::Arc;

/// Runs one pipeline stage.
pub struct StageJob {
    stage: Stage,
    pipeline: Arc<Pipeline>,
}

impl StageJob {
    pub fn new(stage: Stage, pipeline: &Arc<Pipeline>) -> Self {
        Self {
            stage,
            pipeline: Arc::clone(pipeline),
        }
    }

    pub fn task(stage: Stage, pipeline: &Arc<Pipeline>) -> Task {
        Task::job(Self::new(stage, pipeline))
    }
}

#[async_trait]
impl Job for StageJob {
    fn name(&self) -> &str {
        self.stage.name()
    }

    async fn run(&self) -> BuildResult<()> {
        self.pipeline.run(self.stage).await.map(|_| ())
    }
}

/// `style`, `script`, and `page` concurrently.
pub fn compile(pipeline: &Arc<Pipeline>) -> Task {
    Task::parallel(
        "compile",
        vec![
            StageJob::task(Stage::Style, pipeline),
            StageJob::task(Stage::Script, pipeline),
            StageJob::task(Stage::Page, pipeline),
        ],
    )
}

pub fn clean(pipeline: &Arc<Pipeline>) -> Task {
    StageJob::task(Stage::Clean, pipeline)
}

/// `clean`, then `(compile, then bundle)` alongside `extra`, `image`, and `font`.
pub fn build(pipeline: &Arc<Pipeline>) -> Task {
    Task::series(
        "build",
        vec![
            clean(pipeline),
            Task::parallel(
                "package",
                vec![
                    Task::series(
                        "compile-and-bundle",
                        vec![compile(pipeline), StageJob::task(Stage::Bundle, pipeline)],
                    ),
                    StageJob::task(Stage::Extra, pipeline),
                    StageJob::task(Stage::Image, pipeline),
                    StageJob::task(Stage::Font, pipeline),
                ],
            ),
        ],
    )
}

/// `compile` once, then hand over to the long-running `serve` task.
pub fn develop(pipeline: &Arc<Pipeline>, serve: Task) -> Task {
    Task::series("develop", vec![compile(pipeline), serve])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    fn leaf_names(task: &Task, out: &mut Vec<String>) {
        match task {
            Task::Job(job) => out.push(job.name().to_string()),
            Task::Series(_, children) | Task::Parallel(_, children) => {
                children.iter().for_each(|c| leaf_names(c, out))
            }
        }
    }

    #[test]
    fn test_build_graph_covers_every_stage() {
        let pipeline = Arc::new(Pipeline::new(
            Arc::new(Config::default()),
            std::path::Path::new("/project"),
        ));
        let mut names = Vec::new();
        leaf_names(&build(&pipeline), &mut names);
        assert_eq!(
            names,
            vec!["clean", "style", "script", "page", "bundle", "extra", "image", "font"]
        );
    }

    #[test]
    fn test_build_graph_shape() {
        let pipeline = Arc::new(Pipeline::new(
            Arc::new(Config::default()),
            std::path::Path::new("/project"),
        ));
        let Task::Series(name, children) = build(&pipeline) else {
            panic!("build must be a series");
        };
        assert_eq!(name, "build");
        assert_eq!(children[0].name(), "clean");
        assert!(matches!(children[1], Task::Parallel(..)));
    }
}
