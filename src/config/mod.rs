//! Project configuration.
//!
//! Resolution merges two tiers:
//! 1. **Defaults** - `Config::default()`
//! 2. **Project** - `page.config.yaml` (or `.yml` / `.json`) in the working directory
//!
//! ## Merge Strategy
//! Top-level keys from the project file replace the defaults wholesale. Fields
//! omitted inside a replaced section fall back to that section's own defaults.
//!
//! ## Error Policy
//! `ConfigLoader::resolve` never fails: an absent or broken project file yields
//! the defaults. `ConfigLoader::resolve_strict` reports broken files.
//!
//! ## Environment Variables
//! - `NYL_PAGES_CONFIG` - Explicit override file (read by the CLI)

mod loader;
mod merge;
mod types;

pub use loader::{CONFIG_FILE_NAMES, ConfigLoader, ConfigSource};
pub use merge::shallow_merge;
pub use types::*;
