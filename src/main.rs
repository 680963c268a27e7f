//! Entry point for the `triage` binary.
//!
//! ```sh
//! triage init
//! triage serve --bind 127.0.0.1:5000
//! triage research "headache, high temperature"
//! triage chat -s alice
//! ```

use std::error::Error;
use std::fs;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use once_cell::sync::OnceCell;
use serde_json::Map;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, info, warn};

use symptom_triage::api::{Embedder, Generator, OpenAiBackend};
use symptom_triage::commands::{Cli, Commands};
use symptom_triage::config::{TriageConfig, load_config};
use symptom_triage::error::TriageError;
use symptom_triage::pipeline::{DEFAULT_SESSION, TriagePipeline};
use symptom_triage::pretty::{print_label, print_pretty};
use symptom_triage::reports::{ReportOutcome, process_symptoms};
use symptom_triage::research::SymptomResearch;
use symptom_triage::template::Personas;
use symptom_triage::{config_dir, resolve_config_path, server};

static TRACING: OnceCell<()> = OnceCell::new();

fn main() -> Result<(), Box<dyn Error>> {
    TRACING.get_or_init(|| {
        tracing_subscriber::fmt::init();
    });
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(run())
}

async fn run() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    let config_path = resolve_config_path(cli.config.as_deref())?;

    let mut config = if config_path.exists() {
        load_config(&config_path.to_string_lossy())?
    } else {
        warn!(
            "No config at {}; using defaults (run `triage init` to create one)",
            config_path.display()
        );
        TriageConfig::default()
    };
    if let Some(key) = cli.api_key {
        config.api_key = key;
    }
    debug!("Config loaded: {:?}", config);

    let backend = Arc::new(OpenAiBackend::new(&config));
    let embedder: Arc<dyn Embedder> = backend.clone();
    let generator: Arc<dyn Generator> = backend;
    let personas = Personas::load(config.templates_dir.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            let pipeline = TriagePipeline::from_config(&config, embedder, generator, personas)?;
            server::serve(&config, Arc::new(pipeline)).await?;
        }
        Commands::Research { symptoms, out_dir } => {
            let input = match symptoms {
                Some(symptoms) => symptoms,
                None => prompt_line("Enter symptoms (comma-separated): ").await?,
            };
            let report_dir = out_dir.unwrap_or_else(|| config.report_dir.clone());
            let research = SymptomResearch::from_config(&config, embedder)?;
            let outcome = process_symptoms(
                &input,
                &research,
                generator.as_ref(),
                &personas.researcher,
                &report_dir,
            )
            .await?;
            print_outcome(&outcome)?;
        }
        Commands::Chat { session } => {
            let pipeline = TriagePipeline::from_config(&config, embedder, generator, personas)?;
            chat_loop(&pipeline, session.as_deref().unwrap_or(DEFAULT_SESSION)).await?;
        }
        Commands::Init => init(&config_path)?,
    }

    Ok(())
}

async fn prompt_line(prompt: &str) -> Result<String, Box<dyn Error>> {
    let mut stdout = tokio::io::stdout();
    stdout.write_all(prompt.as_bytes()).await?;
    stdout.flush().await?;
    let mut line = String::new();
    BufReader::new(tokio::io::stdin()).read_line(&mut line).await?;
    Ok(line.trim().to_string())
}

fn print_outcome(outcome: &ReportOutcome) -> Result<(), Box<dyn Error>> {
    match outcome {
        ReportOutcome::NoMatch => print_pretty(&format!("**{}.**", TriageError::NoMatchFound)),
        ReportOutcome::NoReferenceText { matched } => print_pretty(&format!(
            "**No reference text could be fetched for:** {}",
            matched.join(", ")
        )),
        ReportOutcome::Written {
            matched,
            skipped,
            summary_path,
            treatment_path,
        } => {
            let mut text = format!("# Reports ready\n\n- Symptoms: {}\n", matched.join(", "));
            if !skipped.is_empty() {
                text.push_str(&format!("- Skipped (no reference page): {}\n", skipped.join(", ")));
            }
            text.push_str(&format!(
                "- {}\n- {}\n\n---\n",
                summary_path.display(),
                treatment_path.display()
            ));
            text.push_str(&fs::read_to_string(treatment_path)?);
            print_pretty(&text)
        }
    }
}

/// Read lines until `exit`; `reset` starts the session over.
async fn chat_loop(pipeline: &TriagePipeline, session: &str) -> Result<(), Box<dyn Error>> {
    print_pretty(
        "# Symptom triage\n\nDescribe your symptoms, separated by commas. \
         Type **reset** to start over or **exit** to quit.",
    )?;
    pipeline.research().warm_up().await?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        match line.trim() {
            "exit" | "quit" => break,
            "reset" => {
                pipeline.reset(Some(session)).await;
                print_label("(session reset)")?;
            }
            "" => continue,
            message => match pipeline.handle_turn(message, Some(session), &Map::new()).await {
                Ok(turn) => {
                    print_label(&format!("[{} · {:.2}s]", turn.stage, turn.latency))?;
                    print_pretty(&turn.reply)?;
                }
                Err(err) => {
                    warn!("Turn failed: {}", err);
                    print_pretty(&format!("**Error:** {err}"))?;
                }
            },
        }
    }
    Ok(())
}

/// Write a default config and the built-in persona templates.
fn init(config_path: &Path) -> Result<(), Box<dyn Error>> {
    let templates_dir = config_dir()?.join("templates");
    info!("Creating template directory: {}", templates_dir.display());
    Personas::default().write_all(&templates_dir)?;

    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)?;
    }
    if config_path.exists() {
        warn!("Keeping existing config file: {}", config_path.display());
        return Ok(());
    }

    info!("Creating config file: {}", config_path.display());
    let config = TriageConfig {
        api_key: "CHANGEME".to_string(),
        templates_dir: Some(templates_dir),
        ..TriageConfig::default()
    };
    fs::write(config_path, serde_yaml::to_string(&config)?)?;
    Ok(())
}
