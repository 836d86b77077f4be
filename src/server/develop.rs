//! The dev server controller: HTTP, watchers, and stage re-runs.

use super::http::start_server;
use super::watcher::{
    ChangeKind, SourceWatcherHandle, WatchPaths, WatcherConfig, start_source_watcher,
};
use crate::error::{BuildError, BuildResult};
use crate::pipeline::Pipeline;
use crate::tasks::Job;
use async_trait::async_trait;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast, oneshot, watch};
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Running,
}

/// Serializes stage re-runs: a change arriving mid-build waits for the
/// running one instead of writing the same outputs concurrently.
#[derive(Debug, Default)]
pub struct BuildGuard {
    lock: Mutex<()>,
}

impl BuildGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run<F, T>(&self, work: F) -> T
    where
        F: Future<Output = T>,
    {
        let _held = self.lock.lock().await;
        work.await
    }
}

/// A started server. Dropping it stops the watcher; `shutdown` stops HTTP.
pub struct RunningServer {
    pub addr: SocketAddr,
    pub shutdown: oneshot::Sender<()>,
    pub watcher: SourceWatcherHandle,
}

pub struct DevServer {
    pipeline: Arc<Pipeline>,
    guard: BuildGuard,
    reload: broadcast::Sender<()>,
    state: watch::Sender<ServerState>,
    watcher_config: WatcherConfig,
}

impl DevServer {
    pub fn new(pipeline: Arc<Pipeline>) -> Self {
        let (reload, _) = broadcast::channel(16);
        let (state, _) = watch::channel(ServerState::Stopped);
        Self {
            pipeline,
            guard: BuildGuard::new(),
            reload,
            state,
            watcher_config: WatcherConfig::default(),
        }
    }

    pub fn with_watcher_config(mut self, config: WatcherConfig) -> Self {
        self.watcher_config = config;
        self
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    pub fn guard(&self) -> &BuildGuard {
        &self.guard
    }

    pub fn subscribe_reload(&self) -> broadcast::Receiver<()> {
        self.reload.subscribe()
    }

    /// Tell every connected browser to reload.
    pub fn reload(&self) {
        // No subscribers is fine: nobody has the page open.
        let _ = self.reload.send(());
    }

    /// React to one classified change.
    pub async fn handle_change(&self, change: ChangeKind) -> BuildResult<()> {
        match change {
            ChangeKind::Rebuild(stage) => {
                self.guard.run(self.pipeline.run(stage)).await?;
                self.reload();
            }
            ChangeKind::Reload => self.reload(),
        }
        Ok(())
    }

    /// Bind the HTTP server and register the watchers.
    pub async fn start(&self, port: u16) -> BuildResult<RunningServer> {
        let dirs = self.pipeline.dirs();
        let (shutdown, addr) = start_server(dirs, port, self.reload.clone()).await?;

        let paths = WatchPaths::new(&dirs.src, &dirs.public, &self.pipeline.config().build.paths)
            .map_err(BuildError::server)?;
        let watcher = start_source_watcher(paths, self.watcher_config.clone())
            .map_err(BuildError::server)?;

        self.state.send_replace(ServerState::Running);
        Ok(RunningServer {
            addr,
            shutdown,
            watcher,
        })
    }

    /// Start on the configured port and process changes until the process exits.
    pub async fn run(self: Arc<Self>) -> BuildResult<()> {
        let port = self.pipeline.config().server.port;
        let mut running = self.start(port).await?;
        info!("Serving at http://{}", running.addr);

        while let Some(change) = running.watcher.events.recv().await {
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = server.handle_change(change).await {
                    error!("Rebuild failed: {}", e);
                }
            });
        }
        Err(BuildError::server("file watcher stopped"))
    }
}

/// The `serve` leaf of the develop graph.
pub struct ServeJob {
    server: Arc<DevServer>,
}

impl ServeJob {
    pub fn new(server: Arc<DevServer>) -> Self {
        Self { server }
    }
}

#[async_trait]
impl Job for ServeJob {
    fn name(&self) -> &str {
        "serve"
    }

    async fn run(&self) -> BuildResult<()> {
        Arc::clone(&self.server).run().await
    }
}
