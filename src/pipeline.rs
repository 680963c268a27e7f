//! # Conversation pipeline
//!
//! One call to [`TriagePipeline::handle_turn`] is one user turn:
//!
//! 1. Reject blank input with [`TriageError::EmptyInput`] before touching any state.
//! 2. Lock the session (default id `"default"`) for the rest of the turn.
//! 3. Apply the message by stage, then shallow-merge request `patient_info`.
//! 4. Run the four stages in order: research, follow-up, medication, synthesis.
//!    Each later stage sees the structured output of the earlier ones.
//! 5. Append the turn to the chat log and return the synthesis text.
//!
//! Any stage failing aborts the turn with no reply and no log entry. Session
//! changes made in step 3 stay in place.

use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, info, instrument};

use crate::api::{Embedder, Generator};
use crate::chat_log::{ChatLog, LogEntry, TurnMeta};
use crate::config::{TriageConfig, UnmatchedPhrases};
use crate::error::{TriageError, TriageResult};
use crate::matcher::normalize_phrase;
use crate::prompts::{
    FollowUpFindings, MedicationFindings, PatientSnapshot, ResearchFindings, follow_up_prompt,
    medication_prompt, research_prompt, synthesis_prompt, unreferenced_research_prompt,
};
use crate::research::SymptomResearch;
use crate::session::{SessionStore, Stage};
use crate::template::Personas;

pub const DEFAULT_SESSION: &str = "default";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnReply {
    pub reply: String,
    /// Wall-clock seconds for the turn, rounded to two decimals.
    pub latency: f64,
    pub session_id: String,
    pub stage: Stage,
}

pub struct TriagePipeline {
    research: SymptomResearch,
    generator: Arc<dyn Generator>,
    personas: Personas,
    sessions: SessionStore,
    log: ChatLog,
    unmatched: UnmatchedPhrases,
}

fn round_latency(seconds: f64) -> f64 {
    (seconds * 100.0).round() / 100.0
}

impl TriagePipeline {
    pub fn new(
        research: SymptomResearch,
        generator: Arc<dyn Generator>,
        personas: Personas,
        sessions: SessionStore,
        log: ChatLog,
        unmatched: UnmatchedPhrases,
    ) -> Self {
        Self {
            research,
            generator,
            personas,
            sessions,
            log,
            unmatched,
        }
    }

    pub fn from_config(
        config: &TriageConfig,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
        personas: Personas,
    ) -> TriageResult<Self> {
        Ok(Self::new(
            SymptomResearch::from_config(config, embedder)?,
            generator,
            personas,
            SessionStore::new(config.session_ttl()),
            ChatLog::new(&config.log_path),
            config.unmatched_phrases,
        ))
    }

    pub fn research(&self) -> &SymptomResearch {
        &self.research
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn chat_log(&self) -> &ChatLog {
        &self.log
    }

    /// Forget a session; unknown ids are fine. Returns the id that was reset.
    pub async fn reset(&self, session_id: Option<&str>) -> String {
        let id = session_id.unwrap_or(DEFAULT_SESSION);
        if self.sessions.remove(id).await {
            info!("Session {} reset", id);
        }
        id.to_string()
    }

    #[instrument(skip_all, fields(session = session_id.unwrap_or(DEFAULT_SESSION)))]
    pub async fn handle_turn(
        &self,
        message: &str,
        session_id: Option<&str>,
        patient_info: &Map<String, Value>,
    ) -> TriageResult<TurnReply> {
        let message = message.trim();
        if message.is_empty() {
            return Err(TriageError::EmptyInput);
        }

        let started = Instant::now();
        let session_id = session_id.unwrap_or(DEFAULT_SESSION);

        let handle = self.sessions.get_or_create(session_id).await;
        let mut state = handle.lock().await;
        state.absorb_message(message);
        state.merge_patient_info(patient_info);

        let snapshot = state.snapshot();
        let stage = state.stage;
        debug!("Turn context: {:?}", snapshot);

        let research = self.research_stage(&snapshot).await?;
        let follow_up = self.follow_up_stage(&snapshot, &research).await?;
        let medication = self.medication_stage(&snapshot, &research).await?;
        let reply = self
            .synthesis_stage(&snapshot, &research, &follow_up, &medication)
            .await?;

        let latency = round_latency(started.elapsed().as_secs_f64());
        let meta = TurnMeta {
            latency,
            symptoms: snapshot.symptoms.clone(),
            stage,
        };
        self.log
            .append(&LogEntry::new(session_id, message, &reply, meta))
            .await?;
        info!("Turn answered in {:.2}s", latency);

        Ok(TurnReply {
            reply,
            latency,
            session_id: session_id.to_string(),
            stage,
        })
    }

    async fn research_stage(&self, snapshot: &PatientSnapshot) -> TriageResult<ResearchFindings> {
        let phrases: Vec<String> = snapshot
            .symptoms
            .iter()
            .map(|s| normalize_phrase(s))
            .filter(|s| !s.is_empty())
            .collect();

        let bundle = self.research.gather(&phrases).await?;
        let unmatched = match self.unmatched {
            UnmatchedPhrases::Drop => Vec::new(),
            UnmatchedPhrases::Report => bundle
                .outcome
                .unmatched
                .iter()
                .map(|u| u.phrase.clone())
                .collect(),
        };

        let prompt = if bundle.batch.fetched.is_empty() {
            let symptoms = if bundle.outcome.matched.is_empty() {
                &snapshot.symptoms
            } else {
                &bundle.outcome.matched
            };
            unreferenced_research_prompt(symptoms)
        } else {
            research_prompt(&bundle.batch.symptoms(), &bundle.batch.texts())
        };
        let summary = self
            .generator
            .generate(&self.personas.researcher.system_prompt(), &prompt)
            .await?;

        Ok(ResearchFindings {
            matched: bundle.outcome.matched,
            unmatched,
            skipped: bundle.batch.skipped,
            summary,
        })
    }

    async fn follow_up_stage(
        &self,
        snapshot: &PatientSnapshot,
        research: &ResearchFindings,
    ) -> TriageResult<FollowUpFindings> {
        let text = self
            .generator
            .generate(
                &self.personas.followup.system_prompt(),
                &follow_up_prompt(snapshot, research),
            )
            .await?;
        Ok(FollowUpFindings::from_text(text))
    }

    async fn medication_stage(
        &self,
        snapshot: &PatientSnapshot,
        research: &ResearchFindings,
    ) -> TriageResult<MedicationFindings> {
        let advice = self
            .generator
            .generate(
                &self.personas.medication.system_prompt(),
                &medication_prompt(snapshot, research),
            )
            .await?;
        Ok(MedicationFindings { advice })
    }

    async fn synthesis_stage(
        &self,
        snapshot: &PatientSnapshot,
        research: &ResearchFindings,
        follow_up: &FollowUpFindings,
        medication: &MedicationFindings,
    ) -> TriageResult<String> {
        self.generator
            .generate(
                &self.personas.physician.system_prompt(),
                &synthesis_prompt(snapshot, research, follow_up, medication),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ADDITIONAL_INFO;
    use crate::testing::{FakeEmbedder, RecordingGenerator};
    use httpmock::prelude::*;
    use serde_json::json;
    use std::path::Path;

    fn pipeline(
        base_url: String,
        dir: &Path,
        generator: Arc<RecordingGenerator>,
        unmatched: UnmatchedPhrases,
    ) -> TriagePipeline {
        let config = TriageConfig {
            reference_base_url: base_url,
            embedding_cache_path: dir.join("embeddings.bin"),
            log_path: dir.join("log.json"),
            fetch_timeout_secs: 5,
            unmatched_phrases: unmatched,
            ..TriageConfig::default()
        };
        TriagePipeline::from_config(
            &config,
            Arc::new(FakeEmbedder::catalog()),
            generator,
            Personas::default(),
        )
        .unwrap()
    }

    async fn reference_server() -> MockServer {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/headache.html");
                then.status(200).body("<p>Tension headaches are common.</p>");
            })
            .await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/fever.html");
                then.status(500);
            })
            .await;
        server
    }

    #[test]
    fn latency_rounds_to_two_decimals() {
        assert_eq!(round_latency(1.23456), 1.23);
        assert_eq!(round_latency(0.005), 0.01);
    }

    #[tokio::test]
    async fn first_turn_parses_symptoms_and_runs_four_stages() {
        let server = reference_server().await;
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(RecordingGenerator::default());
        let pipeline = pipeline(
            format!("{}/", server.base_url()),
            dir.path(),
            generator.clone(),
            UnmatchedPhrases::Drop,
        );

        let info = json!({"age": 30}).as_object().cloned().unwrap();
        let reply = pipeline
            .handle_turn("  Headache, high temperature ", Some("s1"), &info)
            .await
            .unwrap();

        assert_eq!(reply.stage, Stage::Diagnosis);
        assert_eq!(reply.session_id, "s1");
        assert_eq!(reply.reply, "generated #4");

        let prompts = generator.recorded();
        assert_eq!(prompts.len(), 4);
        assert!(prompts[0].1.contains("Tension headaches are common."));
        assert!(prompts[0].0.contains("Medical Information Researcher"));
        assert!(prompts[1].1.contains("- age: 30"));
        assert!(prompts[1].1.contains("No reference page could be retrieved for: fever."));
        assert!(prompts[3].1.contains("generated #1"));
        assert!(prompts[3].1.contains("generated #3"));

        let state = pipeline.sessions().get("s1").await.unwrap();
        assert_eq!(state.symptoms, vec!["Headache", "high temperature"]);

        let log = pipeline.chat_log().read_all().await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].user, "Headache, high temperature");
        assert_eq!(log[0].bot, "generated #4");
        assert_eq!(log[0].meta.stage, Stage::Diagnosis);
    }

    #[tokio::test]
    async fn later_turns_become_additional_info() {
        let server = reference_server().await;
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(RecordingGenerator::default());
        let pipeline = pipeline(
            format!("{}/", server.base_url()),
            dir.path(),
            generator.clone(),
            UnmatchedPhrases::Drop,
        );

        pipeline
            .handle_turn("headache", None, &Map::new())
            .await
            .unwrap();
        let reply = pipeline
            .handle_turn("it began two days ago, and it throbs", None, &Map::new())
            .await
            .unwrap();

        assert_eq!(reply.session_id, DEFAULT_SESSION);
        let state = pipeline.sessions().get(DEFAULT_SESSION).await.unwrap();
        assert_eq!(state.symptoms, vec!["headache"]);
        assert_eq!(
            state.patient_info[ADDITIONAL_INFO],
            json!("it began two days ago, and it throbs")
        );

        let prompts = generator.recorded();
        assert_eq!(prompts.len(), 8);
        assert!(prompts[5].1.contains("additional_info: it began two days ago"));
    }

    #[tokio::test]
    async fn blank_message_is_rejected_without_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(RecordingGenerator::default());
        let pipeline = pipeline(
            "http://127.0.0.1:9/".into(),
            dir.path(),
            generator.clone(),
            UnmatchedPhrases::Drop,
        );

        let err = pipeline
            .handle_turn("   ", Some("s1"), &Map::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TriageError::EmptyInput));
        assert!(pipeline.sessions().is_empty().await);
        assert!(generator.recorded().is_empty());
        assert!(!dir.path().join("log.json").exists());
    }

    #[tokio::test]
    async fn unmatched_symptoms_still_run_all_four_stages() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(RecordingGenerator::default());
        let pipeline = pipeline(
            "http://127.0.0.1:9/".into(),
            dir.path(),
            generator.clone(),
            UnmatchedPhrases::Report,
        );

        let reply = pipeline
            .handle_turn("itchy elbow", None, &Map::new())
            .await
            .unwrap();

        assert_eq!(reply.reply, "generated #4");
        let prompts = generator.recorded();
        assert_eq!(prompts.len(), 4);
        assert!(prompts[0].0.contains("Medical Information Researcher"));
        assert!(prompts[0].1.contains("Research the following symptoms: itchy elbow."));
        assert!(prompts[0].1.contains("No reference material was found"));
        assert!(prompts[1].1.contains("generated #1"));
        assert!(prompts[1].1.contains("not backed by reference material"));
        assert!(prompts[1].1.contains("outside our reference catalog: itchy elbow"));
    }

    #[tokio::test]
    async fn failed_fetches_research_matched_names_without_reference_text() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(RecordingGenerator::default());
        let pipeline = pipeline(
            "http://127.0.0.1:9/".into(),
            dir.path(),
            generator.clone(),
            UnmatchedPhrases::Drop,
        );

        pipeline
            .handle_turn("Coughing", None, &Map::new())
            .await
            .unwrap();

        let prompts = generator.recorded();
        assert_eq!(prompts.len(), 4);
        assert!(prompts[0].1.contains("Research the following symptoms: cough."));
        assert!(prompts[0].1.contains("No reference material was found"));
        assert!(prompts[1].1.contains("No reference page could be retrieved for: cough."));
    }

    #[tokio::test]
    async fn stage_failure_aborts_turn_but_keeps_session_changes() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(RecordingGenerator::failing_on("over-the-counter"));
        let pipeline = pipeline(
            "http://127.0.0.1:9/".into(),
            dir.path(),
            generator.clone(),
            UnmatchedPhrases::Drop,
        );

        let err = pipeline
            .handle_turn("itchy elbow", Some("s1"), &Map::new())
            .await
            .unwrap_err();

        assert!(matches!(err, TriageError::RemoteService(_)));
        // research and follow-up ran, medication failed, synthesis never started
        assert_eq!(generator.recorded().len(), 3);
        assert!(pipeline.chat_log().read_all().await.unwrap().is_empty());

        let state = pipeline.sessions().get("s1").await.unwrap();
        assert_eq!(state.stage, Stage::Diagnosis);
    }

    #[tokio::test]
    async fn concurrent_turns_on_one_session_both_land() {
        let dir = tempfile::tempdir().unwrap();
        let generator = Arc::new(RecordingGenerator::default());
        let pipeline = Arc::new(pipeline(
            "http://127.0.0.1:9/".into(),
            dir.path(),
            generator,
            UnmatchedPhrases::Drop,
        ));

        let a = {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move { pipeline.handle_turn("alpha", Some("s"), &Map::new()).await })
        };
        let b = {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move { pipeline.handle_turn("beta", Some("s"), &Map::new()).await })
        };
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let state = pipeline.sessions().get("s").await.unwrap();
        let symptom = state.symptoms[0].clone();
        let extra = state.patient_info[ADDITIONAL_INFO].as_str().unwrap().to_string();
        let mut seen = vec![symptom, extra];
        seen.sort();
        assert_eq!(seen, vec!["alpha", "beta"]);
        assert_eq!(pipeline.chat_log().read_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn reset_defaults_and_tolerates_unknown_ids() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(
            "http://127.0.0.1:9/".into(),
            dir.path(),
            Arc::new(RecordingGenerator::default()),
            UnmatchedPhrases::Drop,
        );

        assert_eq!(pipeline.reset(None).await, DEFAULT_SESSION);

        pipeline
            .handle_turn("itchy elbow", Some("s2"), &Map::new())
            .await
            .unwrap();
        assert_eq!(pipeline.reset(Some("s2")).await, "s2");
        assert!(pipeline.sessions().get("s2").await.is_none());

        // a fresh session starts over at the initial stage
        pipeline
            .handle_turn("cough", Some("s2"), &Map::new())
            .await
            .unwrap();
        let state = pipeline.sessions().get("s2").await.unwrap();
        assert_eq!(state.symptoms, vec!["cough"]);
    }
}
