//! Task composition.
//!
//! A [`Task`] is either a single [`Job`] or a named composite: `Series` runs
//! children one after another and stops at the first failure; `Parallel`
//! starts all children at once, lets every started child finish, and fails if
//! any of them failed. Running a task records start/finish events into a
//! [`Trace`].

mod graph;
mod trace;

pub use graph::{StageJob, build, clean, compile, develop};
pub use trace::{Trace, TraceEvent, TraceKind};

use crate::error::BuildResult;
use async_trait::async_trait;
use futures::future::{BoxFuture, join_all};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info};

/// A named unit of asynchronous work.
#[async_trait]
pub trait Job: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self) -> BuildResult<()>;
}

#[derive(Clone)]
pub enum Task {
    Job(Arc<dyn Job>),
    Series(String, Vec<Task>),
    Parallel(String, Vec<Task>),
}

impl Task {
    pub fn job(job: impl Job + 'static) -> Self {
        Task::Job(Arc::new(job))
    }

    pub fn series(name: impl Into<String>, children: Vec<Task>) -> Self {
        Task::Series(name.into(), children)
    }

    pub fn parallel(name: impl Into<String>, children: Vec<Task>) -> Self {
        Task::Parallel(name.into(), children)
    }

    pub fn name(&self) -> &str {
        match self {
            Task::Job(job) => job.name(),
            Task::Series(name, _) | Task::Parallel(name, _) => name,
        }
    }

    /// Run the task tree, recording events into `trace`.
    pub fn run<'a>(&'a self, trace: &'a Trace) -> BoxFuture<'a, BuildResult<()>> {
        Box::pin(async move {
            let name = self.name();
            let start = Instant::now();
            info!("Starting '{}'...", name);
            trace.record(name, TraceKind::Started);

            let result = match self {
                Task::Job(job) => job.run().await,
                Task::Series(_, children) => {
                    let mut result = Ok(());
                    for child in children {
                        result = child.run(trace).await;
                        if result.is_err() {
                            break;
                        }
                    }
                    result
                }
                Task::Parallel(_, children) => {
                    let results = join_all(children.iter().map(|c| c.run(trace))).await;
                    results.into_iter().collect::<BuildResult<Vec<()>>>().map(|_| ())
                }
            };

            let elapsed_ms = start.elapsed().as_millis() as u64;
            match &result {
                Ok(()) => {
                    info!("Finished '{}' after {} ms", name, elapsed_ms);
                    trace.record(name, TraceKind::Finished);
                }
                Err(e) => {
                    error!("'{}' errored after {} ms: {}", name, elapsed_ms, e);
                    trace.record(name, TraceKind::Failed);
                }
            }
            result
        })
    }
}
