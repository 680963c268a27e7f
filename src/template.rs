//! # Persona templates
//!
//! Each reasoning task speaks through a persona: a small YAML document with a
//! `role`, a `goal` and a `backstory`. The persona is rendered into the system
//! prompt of the generative call; the task-specific instructions travel in the
//! user prompt (see [`crate::prompts`]).
//!
//! Four personas ship built in:
//!
//! | Name | Task |
//! |------|------|
//! | `researcher` | research summary / offline reports |
//! | `followup` | missing-information questions |
//! | `medication` | medication suggestion |
//! | `physician` | final synthesis |
//!
//! Any of them can be overridden by dropping `<name>.yaml` into the configured
//! `templates_dir`.
//!
//! ## Minimal YAML example
//!
//! ```yaml
//! # <templates_dir>/physician.yaml
//! role: "Primary Care Physician"
//! goal: "Give short, safe advice"
//! backstory: "You have twenty years of family practice behind you."
//! ```

use serde::{Deserialize, Serialize};
use std::{error::Error, fs, path::Path};

/// A reusable persona for one reasoning task.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AgentTemplate {
    pub role: String,
    pub goal: String,
    pub backstory: String,
}

impl AgentTemplate {
    pub fn new(role: &str, goal: &str, backstory: &str) -> Self {
        Self {
            role: role.to_string(),
            goal: goal.to_string(),
            backstory: backstory.to_string(),
        }
    }

    /// Render the persona as a system prompt.
    pub fn system_prompt(&self) -> String {
        format!(
            "You are a {}.\nYour goal: {}\n\n{}",
            self.role, self.goal, self.backstory
        )
    }

    pub fn researcher() -> Self {
        Self::new(
            "Medical Information Researcher",
            "Extract and summarize relevant medical information from trusted reference pages",
            "You are a medical research specialist who excels at finding and summarizing \
             accurate medical information. You use reliable sources and present information \
             in a clear, concise manner relevant to the patient's symptoms.",
        )
    }

    pub fn followup() -> Self {
        Self::new(
            "Patient Information Collector",
            "Identify missing patient information needed for accurate diagnosis",
            "You are a thorough medical assistant who knows what information is crucial for \
             diagnosis. You ask clear, specific questions about age, weight, medical history, \
             current medications, symptom duration, and severity. You ask only necessary \
             questions and avoid overwhelming the patient.",
        )
    }

    pub fn medication() -> Self {
        Self::new(
            "Medication Specialist",
            "Suggest appropriate medications based on patient condition, \
             avoiding drug interactions",
            "You are a pharmaceutical expert who recommends medications using common brand \
             names (not chemical names). You consider patient age, weight, medical history, \
             and current medications to avoid interactions. You provide clear dosage \
             instructions based on patient specifics.",
        )
    }

    pub fn physician() -> Self {
        Self::new(
            "Primary Care Physician",
            "Provide accurate diagnosis and treatment recommendations in simple, clear language",
            "You are an experienced primary care physician who synthesizes information from \
             specialists to provide clear diagnoses. You communicate in second person, keeping \
             responses under 50 words when possible. You know when to recommend seeing a \
             doctor in person for serious conditions.",
        )
    }
}

/// The four personas used by the pipeline.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Personas {
    pub researcher: AgentTemplate,
    pub followup: AgentTemplate,
    pub medication: AgentTemplate,
    pub physician: AgentTemplate,
}

impl Default for Personas {
    fn default() -> Self {
        Self {
            researcher: AgentTemplate::researcher(),
            followup: AgentTemplate::followup(),
            medication: AgentTemplate::medication(),
            physician: AgentTemplate::physician(),
        }
    }
}

impl Personas {
    pub const NAMES: [&'static str; 4] = ["researcher", "followup", "medication", "physician"];

    /// Built-in personas, with any `<name>.yaml` found in `dir` taking precedence.
    pub fn load(dir: Option<&Path>) -> Result<Self, Box<dyn Error>> {
        let mut personas = Self::default();
        let Some(dir) = dir else {
            return Ok(personas);
        };

        for name in Self::NAMES {
            let path = dir.join(format!("{name}.yaml"));
            if !path.exists() {
                continue;
            }
            tracing::info!("Loading template: {}", path.display());
            let template = load_template(&path)?;
            match name {
                "researcher" => personas.researcher = template,
                "followup" => personas.followup = template,
                "medication" => personas.medication = template,
                _ => personas.physician = template,
            }
        }

        Ok(personas)
    }

    /// Write every persona as `<name>.yaml` into `dir`.
    pub fn write_all(&self, dir: &Path) -> Result<(), Box<dyn Error>> {
        fs::create_dir_all(dir)?;
        for (name, template) in Self::NAMES.iter().zip([
            &self.researcher,
            &self.followup,
            &self.medication,
            &self.physician,
        ]) {
            fs::write(dir.join(format!("{name}.yaml")), serde_yaml::to_string(template)?)?;
        }
        Ok(())
    }
}

/// Load a single persona from a YAML file.
pub fn load_template(path: &Path) -> Result<AgentTemplate, Box<dyn Error>> {
    let content = fs::read_to_string(path)?;
    let template: AgentTemplate = serde_yaml::from_str(&content)?;
    Ok(template)
}
