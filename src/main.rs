//! nyl-pages
//!
//! Compiles a static site from styles, scripts, page templates, images, and
//! fonts, and serves it with live reload during development.

use anyhow::{Context, Result};
use clap::Parser;
use nyl_pages::cli::{Cli, Command};
use nyl_pages::config::{Config, ConfigLoader, ConfigSource};
use nyl_pages::logging::{self, LogTarget};
use nyl_pages::pipeline::Pipeline;
use nyl_pages::server::{DevServer, ServeJob};
use nyl_pages::tasks::{self, Task, Trace};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

fn resolve_config(cli: &Cli, cwd: &std::path::Path) -> Result<Config> {
    let explicit = cli.config.as_deref();
    let loader = if cli.strict_config {
        ConfigLoader::resolve_strict_with(cwd, explicit)?
    } else {
        ConfigLoader::resolve_with(cwd, explicit)
    };
    match (loader.source(), loader.config_path()) {
        (ConfigSource::Override, Some(path)) => info!("Using config {}", path.display()),
        _ => debug!("Using default config"),
    }
    Ok(loader.into_config())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let target: LogTarget = cli.log.parse()?;
    logging::init(&target, cli.verbose)?;

    let cwd = match &cli.cwd {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("cannot read current directory")?,
    };
    // Watcher events carry canonical paths; keep the roots comparable.
    let cwd: PathBuf = cwd
        .canonicalize()
        .with_context(|| format!("project directory {} not found", cwd.display()))?;

    let config = Arc::new(resolve_config(&cli, &cwd)?);
    let pipeline = Arc::new(Pipeline::new(config, &cwd));

    let task = match cli.command {
        Command::Clean => tasks::clean(&pipeline),
        Command::Build => tasks::build(&pipeline),
        Command::Develop => {
            let server = Arc::new(DevServer::new(Arc::clone(&pipeline)));
            tasks::develop(&pipeline, Task::job(ServeJob::new(server)))
        }
    };

    let trace = Trace::new();
    task.run(&trace).await?;
    Ok(())
}
