//! # Symptom Triage (library root)
//!
//! A symptom-triage assistant: free-text symptoms in, a short second-person
//! reply (or a pair of markdown reports) out.
//!
//! ```text
//!             ┌──────────────┐   ┌───────────────┐   ┌──────────────┐
//!  phrases ──►│   matcher    │──►│    fetcher    │──►│  generation  │──► reply / reports
//!             │ (embeddings) │   │ (reference    │   │ (4 personas) │
//!             └──────┬───────┘   │  pages, HTML) │   └──────────────┘
//!                    │           └───────────────┘
//!             ┌──────▼───────┐
//!             │ embedding    │  catalog vectors, built once, persisted with bincode
//!             │ cache        │
//!             └──────────────┘
//! ```
//!
//! ## Modules
//! - [`api`]: embedding and generation seams, plus the OpenAI-compatible backend.
//! - [`embedding_cache`], [`matcher`], [`fetcher`], [`research`]: symptom resolution.
//! - [`prompts`], [`template`], [`reasoning`], [`reports`]: generation and the offline report flow.
//! - [`session`], [`chat_log`], [`pipeline`]: the conversation state machine.
//! - [`server`]: axum HTTP surface.
//! - [`commands`], [`config`], [`pretty`]: CLI plumbing.

use std::error::Error;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;

pub mod api;
pub mod chat_log;
pub mod commands;
pub mod config;
pub mod embedding_cache;
pub mod error;
pub mod fetcher;
pub mod matcher;
pub mod pipeline;
pub mod pretty;
pub mod prompts;
pub mod reasoning;
pub mod reports;
pub mod research;
pub mod server;
pub mod session;
pub mod template;

#[cfg(test)]
mod testing;

/// Return the per-platform configuration directory used by `triage`.
///
/// Uses [`directories::ProjectDirs`] with the triple `("com", "awful-sec", "triage")`,
/// e.g. `~/.config/triage` on Linux. The directory is not created.
///
/// # Errors
/// Returns an error if the platform configuration directory cannot be determined.
pub fn config_dir() -> Result<PathBuf, Box<dyn Error>> {
    let proj_dirs = ProjectDirs::from("com", "awful-sec", "triage")
        .ok_or("Unable to determine config directory")?;
    Ok(proj_dirs.config_dir().to_path_buf())
}

/// The config file to use: an explicit path wins, otherwise `config_dir()/config.yaml`.
pub fn resolve_config_path(explicit: Option<&Path>) -> Result<PathBuf, Box<dyn Error>> {
    match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => Ok(config_dir()?.join("config.yaml")),
    }
}
