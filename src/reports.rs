//! # Offline report flow
//!
//! Backs the `triage research` command: take a comma-separated symptom list,
//! resolve it onto the catalog, fetch reference text and write two markdown
//! reports into the report directory, overwriting earlier runs:
//!
//! - `symptom_summary.md`: combined clinical summary
//! - `treatment_plan.md`: stepwise treatment plan
//!
//! Each report ends with a fixed disclaimer footer. Unrecognised symptoms and
//! unreachable reference pages end the flow gracefully instead of failing.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::api::Generator;
use crate::error::{TriageError, TriageResult};
use crate::matcher::normalize_phrases;
use crate::reasoning::{generate_treatment_plan, summarize_combined};
use crate::research::SymptomResearch;
use crate::template::AgentTemplate;

pub const SUMMARY_FILE: &str = "symptom_summary.md";
pub const TREATMENT_FILE: &str = "treatment_plan.md";

const SUMMARY_TITLE: &str = "# 🩺 Combined Symptom Summary\n\n";
const SUMMARY_FOOTER: &str = "\n\n---\n\n*AI-generated for educational purposes only.*";
const TREATMENT_TITLE: &str = "# 💊 Treatment Plan & Medical Reasoning\n\n";
const TREATMENT_FOOTER: &str =
    "\n\n---\n\n*Always consult a licensed healthcare provider before acting on this information.*";

#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    /// No phrase matched the catalog.
    NoMatch,
    /// Symptoms matched but every reference fetch failed.
    NoReferenceText { matched: Vec<String> },
    Written {
        matched: Vec<String>,
        skipped: Vec<String>,
        summary_path: PathBuf,
        treatment_path: PathBuf,
    },
}

/// Write both reports with their titles and disclaimer footers.
pub fn write_reports(
    dir: &Path,
    combined_summary: &str,
    treatment_plan: &str,
) -> TriageResult<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir)?;

    let summary_path = dir.join(SUMMARY_FILE);
    fs::write(
        &summary_path,
        format!("{SUMMARY_TITLE}{combined_summary}{SUMMARY_FOOTER}"),
    )?;

    let treatment_path = dir.join(TREATMENT_FILE);
    fs::write(
        &treatment_path,
        format!("{TREATMENT_TITLE}{treatment_plan}{TREATMENT_FOOTER}"),
    )?;

    Ok((summary_path, treatment_path))
}

/// Run the whole offline flow for one line of user input.
///
/// # Errors
/// Embedding and generation failures propagate; unmatched input and failed
/// fetches are reported through [`ReportOutcome`] instead.
pub async fn process_symptoms(
    input: &str,
    research: &SymptomResearch,
    generator: &dyn Generator,
    persona: &AgentTemplate,
    report_dir: &Path,
) -> TriageResult<ReportOutcome> {
    let phrases = normalize_phrases(input);
    let bundle = research.gather(&phrases).await?;

    if bundle.outcome.is_empty() {
        warn!("{}", TriageError::NoMatchFound);
        return Ok(ReportOutcome::NoMatch);
    }

    if bundle.batch.fetched.is_empty() {
        warn!("No data fetched for any symptom.");
        return Ok(ReportOutcome::NoReferenceText {
            matched: bundle.outcome.matched,
        });
    }

    let texts = bundle.batch.texts();
    let matched = bundle.outcome.matched.clone();

    let combined_summary = summarize_combined(generator, persona, &matched, &texts).await?;
    let treatment_plan = generate_treatment_plan(generator, persona, &matched, &texts).await?;

    let (summary_path, treatment_path) =
        write_reports(report_dir, &combined_summary, &treatment_plan)?;
    info!(
        "Generated {} and {}",
        summary_path.display(),
        treatment_path.display()
    );

    Ok(ReportOutcome::Written {
        matched,
        skipped: bundle.batch.skipped,
        summary_path,
        treatment_path,
    })
}
