//! nyl-pages library
//!
//! This module exports the build pipeline, task graphs, and dev server for
//! the binary and for integration tests.

pub mod bundle;
pub mod cli;
pub mod config;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod server;
pub mod tasks;
pub mod transforms;
