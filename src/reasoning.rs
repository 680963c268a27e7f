//! # Reasoning step
//!
//! The two report variants produced over the same reference text: a combined
//! clinical summary and a stepwise treatment plan. Each is a single generative
//! call with a fixed prompt (see [`crate::prompts`]); there is no retry, so a
//! transient failure surfaces to the caller as-is.

use tracing::info;

use crate::api::Generator;
use crate::error::TriageResult;
use crate::prompts::{summary_prompt, treatment_plan_prompt};
use crate::template::AgentTemplate;

pub async fn summarize_combined(
    generator: &dyn Generator,
    persona: &AgentTemplate,
    symptoms: &[String],
    texts: &[&str],
) -> TriageResult<String> {
    info!("Generating combined summary for {:?}", symptoms);
    let text = generator
        .generate(&persona.system_prompt(), &summary_prompt(symptoms, texts))
        .await?;
    Ok(text.trim().to_string())
}

pub async fn generate_treatment_plan(
    generator: &dyn Generator,
    persona: &AgentTemplate,
    symptoms: &[String],
    texts: &[&str],
) -> TriageResult<String> {
    info!("Generating treatment plan for {:?}", symptoms);
    let text = generator
        .generate(&persona.system_prompt(), &treatment_plan_prompt(symptoms, texts))
        .await?;
    Ok(text.trim().to_string())
}
