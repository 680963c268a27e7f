//! # Prompt construction
//!
//! Pure functions from structured records to prompt text. Nothing here touches
//! the network, so every prompt the pipeline sends can be asserted on directly.
//!
//! The records double as the interface between pipeline stages:
//!
//! ```text
//! PatientSnapshot ──► ResearchFindings ──► FollowUpFindings ─┐
//!        │                   │                               ├──► synthesis
//!        └───────────────────┴──────────► MedicationFindings ─┘
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

/// Phrase the follow-up step uses when nothing else needs asking.
pub const NO_QUESTIONS_NEEDED: &str = "No additional information needed";

/// Symptoms plus accumulated patient details, frozen for one turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PatientSnapshot {
    pub symptoms: Vec<String>,
    pub patient_info: Map<String, Value>,
}

/// Output of the research stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResearchFindings {
    /// Canonical symptoms the user's phrases resolved to.
    pub matched: Vec<String>,
    /// Phrases that matched nothing; only populated when configured to report them.
    pub unmatched: Vec<String>,
    /// Matched symptoms whose reference page could not be fetched.
    pub skipped: Vec<String>,
    /// Researcher output; grounded in reference text only when something was fetched.
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FollowUpFindings {
    pub questions: String,
    pub needs_more_info: bool,
}

impl FollowUpFindings {
    pub fn from_text(text: String) -> Self {
        let needs_more_info = !text
            .to_lowercase()
            .contains(&NO_QUESTIONS_NEEDED.to_lowercase());
        Self {
            questions: text,
            needs_more_info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicationFindings {
    pub advice: String,
}

fn join_or(items: &[String], empty: &str) -> String {
    if items.is_empty() {
        empty.to_string()
    } else {
        items.join(", ")
    }
}

/// `- key: value` lines, or a placeholder when nothing is known yet.
pub fn render_patient_info(info: &Map<String, Value>) -> String {
    if info.is_empty() {
        return "Not provided yet".to_string();
    }
    info.iter()
        .map(|(key, value)| match value {
            Value::String(s) => format!("- {key}: {s}"),
            other => format!("- {key}: {other}"),
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_research(research: &ResearchFindings) -> String {
    let mut out = research.summary.clone();
    if research.matched.is_empty() {
        out.push_str(
            "\n\nNone of the reported symptoms matched our reference catalog; \
             this research is not backed by reference material.",
        );
    } else if !research.skipped.is_empty() {
        out.push_str(&format!(
            "\n\nNo reference page could be retrieved for: {}.",
            research.skipped.join(", ")
        ));
    }
    if !research.unmatched.is_empty() {
        out.push_str(&format!(
            "\n\nThe patient also mentioned symptoms outside our reference catalog: {}.",
            research.unmatched.join(", ")
        ));
    }
    out
}

/// Combined clinical summary over reference text (offline report).
pub fn summary_prompt(symptoms: &[String], texts: &[&str]) -> String {
    format!(
        r#"You are a professional medical summarizer.

Combine and summarize the following medical reference content
for these symptoms: {symptoms}.

Provide a structured report including:
- Overview
- Likely combined causes or conditions
- Risk factors or triggers
- Diagnostic guidance (what doctors usually check)
- Prevention and general care advice
- When to seek urgent care

Source material:
{source}
"#,
        symptoms = symptoms.join(", "),
        source = texts.join("\n\n"),
    )
}

/// Stepwise treatment plan over the same reference text (offline report).
pub fn treatment_plan_prompt(symptoms: &[String], texts: &[&str]) -> String {
    format!(
        r#"You are acting as an experienced general physician.

Patient reports: {symptoms}.

Start your answer like:
"Ok, so if these are the issues then it could be due to..."

Then explain:
1. Possible underlying causes (reason medically)
2. If diagnostic tests are needed, list them in logical order
   (for example: blood test → imaging → specialist consult)
3. If no tests needed, describe likely first-line treatments and medications
4. Give simple advice or home remedies (if safe)
5. Mention when the patient should seek immediate care

Use both your medical knowledge and the following reference data:
{source}
"#,
        symptoms = symptoms.join(", "),
        source = texts.join("\n\n"),
    )
}

/// Research stage: condense reference text for the matched symptoms.
pub fn research_prompt(matched: &[String], texts: &[&str]) -> String {
    format!(
        r#"Research the following symptoms: {symptoms}.
Summarize only the most relevant information for these specific symptoms.
Focus on: common causes, when to see a doctor, and typical characteristics.
Expected output: concise summary of medical information for the given symptoms.

Reference material:
{source}
"#,
        symptoms = matched.join(", "),
        source = texts.join("\n\n"),
    )
}

/// Research stage without reference text: a general summary from medical knowledge.
pub fn unreferenced_research_prompt(symptoms: &[String]) -> String {
    format!(
        r#"Research the following symptoms: {symptoms}.
No reference material was found for these symptoms.
Using general medical knowledge, summarize common causes, when to see a doctor,
and typical characteristics.
Expected output: concise summary of medical information for the given symptoms.
"#,
        symptoms = join_or(symptoms, "none reported"),
    )
}

/// Follow-up stage: decide which patient details are still missing.
pub fn follow_up_prompt(snapshot: &PatientSnapshot, research: &ResearchFindings) -> String {
    format!(
        r#"Based on these symptoms: {symptoms} and the medical research below,
identify what patient information is missing.

Known patient information:
{info}

Medical research:
{research}

Check if we have:
- Patient age and weight
- Duration and severity of symptoms
- Previous medical conditions or illnesses
- Current medications
- Allergies

Generate 2-3 specific questions to ask the patient. Keep questions clear and concise.
If sufficient information is already available, state "{none}".
"#,
        symptoms = join_or(&snapshot.symptoms, "none reported"),
        info = render_patient_info(&snapshot.patient_info),
        research = render_research(research),
        none = NO_QUESTIONS_NEEDED,
    )
}

/// Medication stage: brand names and dosages, or a request for what is missing.
pub fn medication_prompt(snapshot: &PatientSnapshot, research: &ResearchFindings) -> String {
    format!(
        r#"Based on:
- Symptoms: {symptoms}
- Patient info:
{info}
- Medical research:
{research}

Recommend appropriate over-the-counter or common prescription medications.
Use brand names (e.g., "Tylenol" not "acetaminophen").
Consider age, weight, and any mentioned current medications to avoid interactions.
Provide dosage based on patient specifics.

If patient information is insufficient, state what's needed before prescribing.
"#,
        symptoms = join_or(&snapshot.symptoms, "none reported"),
        info = render_patient_info(&snapshot.patient_info),
        research = render_research(research),
    )
}

/// Final stage: a short second-person reply built from every earlier finding.
pub fn synthesis_prompt(
    snapshot: &PatientSnapshot,
    research: &ResearchFindings,
    follow_up: &FollowUpFindings,
    medication: &MedicationFindings,
) -> String {
    let questions = if follow_up.needs_more_info {
        format!(
            "Follow-up questions to present to the user in a friendly way:\n{}",
            follow_up.questions
        )
    } else {
        "No follow-up questions are needed.".to_string()
    };

    format!(
        r#"Synthesize all information from the research, follow-up, and medication specialists.

Context:
- Symptoms: {symptoms}
- Patient info:
{info}

Research findings:
{research}

{questions}

Medication specialist:
{medication}

Provide a clear response that:
1. Addresses the likely condition
2. Includes medication recommendations if appropriate
3. Advises whether to see a doctor in person
4. Is written in second person (you, your)
5. Is concise (aim for under 50 words unless more detail is critical)
"#,
        symptoms = join_or(&snapshot.symptoms, "none reported"),
        info = render_patient_info(&snapshot.patient_info),
        research = render_research(research),
        medication = medication.advice,
    )
}
