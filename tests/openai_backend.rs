use std::sync::Arc;

use httpmock::prelude::*;
use serde_json::{Map, json};
use symptom_triage::api::{Embedder, Generator, OpenAiBackend};
use symptom_triage::config::TriageConfig;
use symptom_triage::error::TriageError;
use symptom_triage::pipeline::TriagePipeline;
use symptom_triage::reports::{ReportOutcome, SUMMARY_FILE, process_symptoms};
use symptom_triage::research::SymptomResearch;
use symptom_triage::session::Stage;
use symptom_triage::template::Personas;

fn embedding_body(vector: [f32; 2]) -> serde_json::Value {
    json!({
        "object": "list",
        "data": [{"object": "embedding", "index": 0, "embedding": vector}],
        "model": "text-embedding-3-small",
        "usage": {"prompt_tokens": 1, "total_tokens": 1}
    })
}

fn completion_body(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 1_700_000_000,
        "model": "gpt-4o-mini",
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop",
            "logprobs": null
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    })
}

async fn mock_services(server: &MockServer) {
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/embeddings")
                .body_includes(r#""input":"headache""#);
            then.status(200).json_body(embedding_body([1.0, 0.0]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST)
                .path("/v1/embeddings")
                .body_includes(r#""input":"cough""#);
            then.status(200).json_body(embedding_body([0.0, 1.0]));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(200)
                .json_body(completion_body("  Rest, fluids and Tylenol.  "));
        })
        .await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/pages/headache.html");
            then.status(200)
                .body("<html><body><p>Most headaches are not serious.</p></body></html>");
        })
        .await;
}

fn config(server: &MockServer, dir: &std::path::Path) -> TriageConfig {
    TriageConfig {
        api_key: "test-key".into(),
        api_base: format!("{}/v1", server.base_url()),
        reference_base_url: format!("{}/pages/", server.base_url()),
        catalog: vec!["headache".into(), "cough".into()],
        embedding_cache_path: dir.join("embeddings.bin"),
        log_path: dir.join("log.json"),
        report_dir: dir.to_path_buf(),
        fetch_timeout_secs: 5,
        ..TriageConfig::default()
    }
}

#[tokio::test]
async fn offline_reports_are_written_through_the_backend() {
    let server = MockServer::start_async().await;
    mock_services(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&server, dir.path());

    let backend = Arc::new(OpenAiBackend::new(&config));
    let research = SymptomResearch::from_config(&config, backend.clone()).unwrap();

    let outcome = process_symptoms(
        "Headache",
        &research,
        backend.as_ref(),
        &Personas::default().researcher,
        dir.path(),
    )
    .await
    .unwrap();

    match outcome {
        ReportOutcome::Written { matched, .. } => assert_eq!(matched, vec!["headache"]),
        other => panic!("unexpected outcome {other:?}"),
    }
    let summary = std::fs::read_to_string(dir.path().join(SUMMARY_FILE)).unwrap();
    assert!(summary.contains("\n\nRest, fluids and Tylenol.\n\n---"));
    assert!(dir.path().join("embeddings.bin").exists());
}

#[tokio::test]
async fn conversation_turn_runs_against_the_backend() {
    let server = MockServer::start_async().await;
    mock_services(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let config = config(&server, dir.path());

    let backend = Arc::new(OpenAiBackend::new(&config));
    let pipeline = TriagePipeline::from_config(
        &config,
        backend.clone(),
        backend,
        Personas::default(),
    )
    .unwrap();

    let turn = pipeline
        .handle_turn("headache", Some("it"), &Map::new())
        .await
        .unwrap();

    assert_eq!(turn.reply, "Rest, fluids and Tylenol.");
    assert_eq!(turn.stage, Stage::Diagnosis);

    let log = std::fs::read_to_string(dir.path().join("log.json")).unwrap();
    assert_eq!(log.lines().count(), 1);
}

#[tokio::test]
async fn embedding_is_the_first_vector_returned() {
    let server = MockServer::start_async().await;
    mock_services(&server).await;
    let dir = tempfile::tempdir().unwrap();
    let backend = OpenAiBackend::new(&config(&server, dir.path()));

    assert_eq!(backend.embed("cough").await.unwrap(), vec![0.0, 1.0]);
}

#[tokio::test]
async fn api_errors_surface_as_remote_service_failures() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/v1/chat/completions");
            then.status(400).json_body(json!({
                "error": {
                    "message": "model not found",
                    "type": "invalid_request_error",
                    "param": null,
                    "code": null
                }
            }));
        })
        .await;
    let dir = tempfile::tempdir().unwrap();
    let backend = OpenAiBackend::new(&config(&server, dir.path()));

    let err = backend.generate("system", "prompt").await.unwrap_err();

    match err {
        TriageError::RemoteService(message) => assert!(message.contains("model not found")),
        other => panic!("unexpected error {other:?}"),
    }
}
