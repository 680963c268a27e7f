//! This module provides functionality for loading and handling the application's configuration.
//!
//! It defines the `TriageConfig` struct, which holds the configuration parameters,
//! and a `load_config` function to load the configuration from a YAML file.
//!
//! Every field except the API credentials has a default, so a minimal file only
//! needs to say where the OpenAI-compatible endpoint lives.
//!
//! # Examples
//!
//! ```no_run
//! use symptom_triage::config::{TriageConfig, load_config};
//!
//! let config: TriageConfig = load_config("/path/to/config.yaml").unwrap();
//! println!("{:?}", config);
//! ```

use serde::{Deserialize, Serialize};
use std::{error::Error, fs, path::PathBuf, time::Duration};

use tracing::*;

/// What to do with user phrases that match no catalog symptom.
#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Copy, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnmatchedPhrases {
    /// Silently drop them; they never reach a prompt.
    #[default]
    Drop,
    /// Carry them into the follow-up and synthesis prompts so the reply can mention them.
    Report,
}

/// Represents the application's configuration.
#[derive(Serialize, Deserialize, Debug, PartialEq, Clone)]
#[serde(default)]
pub struct TriageConfig {
    /// The API key used to authenticate requests to the API.
    pub api_key: String,

    /// The base URL of the OpenAI-compatible API.
    pub api_base: String,

    /// The model used for every generative step.
    pub model: String,

    /// The model used to embed symptom phrases.
    pub embedding_model: String,

    /// Sampling temperature for generative calls.
    pub temperature: f32,

    /// Base URL of the reference site; pages live at `<base><slug>.html`.
    pub reference_base_url: String,

    /// Per-request socket timeout for reference fetches.
    pub fetch_timeout_secs: u64,

    /// A phrase matches only when its best cosine similarity is strictly above this.
    pub similarity_threshold: f32,

    /// Canonical symptom names the system can reason about.
    pub catalog: Vec<String>,

    /// Binary file holding the catalog embeddings.
    pub embedding_cache_path: PathBuf,

    /// Newline-delimited JSON log of chat turns.
    pub log_path: PathBuf,

    /// Where the offline report flow writes its markdown reports.
    pub report_dir: PathBuf,

    /// Address the HTTP server binds to.
    pub bind_addr: String,

    /// Sessions idle for longer than this are evicted.
    pub session_ttl_secs: u64,

    pub unmatched_phrases: UnmatchedPhrases,

    /// Optional directory of persona overrides (`<name>.yaml`).
    pub templates_dir: Option<PathBuf>,
}

impl Default for TriageConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-small".to_string(),
            temperature: 0.3,
            reference_base_url: "https://medlineplus.gov/".to_string(),
            fetch_timeout_secs: 10,
            similarity_threshold: 0.6,
            catalog: ["headache", "cough", "gas", "fever"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            embedding_cache_path: PathBuf::from("symptom_embeddings.bin"),
            log_path: PathBuf::from("log.json"),
            report_dir: PathBuf::from("."),
            bind_addr: "0.0.0.0:5000".to_string(),
            session_ttl_secs: 3600,
            unmatched_phrases: UnmatchedPhrases::Drop,
            templates_dir: None,
        }
    }
}

impl TriageConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

/// Loads the application's configuration from a YAML file.
///
/// # Parameters
///
/// - `file`: The path to the YAML configuration file.
///
/// # Returns
///
/// - `Ok(TriageConfig)`: The loaded configuration, with defaults for any omitted field.
/// - `Err(Box<dyn Error>)`: An error occurred while reading the file or parsing the YAML.
pub fn load_config(file: &str) -> Result<TriageConfig, Box<dyn Error>> {
    debug!("Loading config: {:?}", file);
    let content = fs::read_to_string(file)?;
    let config: TriageConfig = serde_yaml::from_str(&content)?;
    Ok(config)
}
