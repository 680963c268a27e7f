//! Command-line interface for `triage`.
//!
//! ```sh
//! triage init                          # write config.yaml and persona templates
//! triage serve                         # HTTP service on bind_addr
//! triage chat -s alice                 # terminal conversation
//! triage research "headache, cough"    # offline summary + treatment plan reports
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about,
    long_about = None,
    propagate_version = true,
    color = clap::ColorChoice::Always
)]
pub struct Cli {
    /// Config file; defaults to config.yaml in the per-platform config directory.
    #[arg(long, short = 'c', global = true, env = "TRIAGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Overrides `api_key` from the config file.
    #[arg(long, global = true, env = "TRIAGE_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(about, long_about = None, color = clap::ColorChoice::Always)]
pub enum Commands {
    /// Run the HTTP triage service.
    #[clap(name = "serve", alias = "s")]
    Serve {
        /// Overrides `bind_addr`, e.g. 127.0.0.1:8080.
        #[arg(long, short = 'b')]
        bind: Option<String>,
    },

    /// Generate the symptom summary and treatment plan reports.
    ///
    /// Prompts for symptoms on stdin when none are given.
    #[clap(name = "research", alias = "r")]
    Research {
        /// Comma-separated symptoms, e.g. "headache, cough".
        symptoms: Option<String>,

        /// Overrides `report_dir`.
        #[arg(long, short = 'o')]
        out_dir: Option<PathBuf>,
    },

    /// Talk to the triage assistant in the terminal.
    #[clap(name = "chat", alias = "i")]
    Chat {
        #[arg(name = "session", short = 's')]
        session: Option<String>,
    },

    /// Write a default config.yaml and persona templates.
    Init,
}
