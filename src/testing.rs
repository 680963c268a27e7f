//! In-process fakes for the remote service seams, shared by unit tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::api::{Embedder, Generator};
use crate::error::{TriageError, TriageResult};

/// Embeds from a fixed lookup table; unknown text embeds to `fallback`.
pub struct FakeEmbedder {
    vectors: HashMap<String, Vec<f32>>,
    fallback: Vec<f32>,
    pub calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new(entries: &[(&str, Vec<f32>)], fallback: Vec<f32>) -> Self {
        Self {
            vectors: entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
            fallback,
            calls: AtomicUsize::new(0),
        }
    }

    /// Orthogonal unit vectors for the default catalog plus a few synonyms.
    pub fn catalog() -> Self {
        Self::new(
            &[
                ("headache", vec![1.0, 0.0, 0.0, 0.0]),
                ("cough", vec![0.0, 1.0, 0.0, 0.0]),
                ("gas", vec![0.0, 0.0, 1.0, 0.0]),
                ("fever", vec![0.0, 0.0, 0.0, 1.0]),
                ("head pain", vec![0.9, 0.1, 0.0, 0.0]),
                ("migraine", vec![0.8, 0.0, 0.2, 0.0]),
                ("high temperature", vec![0.0, 0.0, 0.1, 0.95]),
                ("coughing", vec![0.05, 0.99, 0.0, 0.0]),
            ],
            vec![0.5, 0.5, 0.5, 0.5],
        )
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FakeEmbedder {
    async fn embed(&self, text: &str) -> TriageResult<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .vectors
            .get(text)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

/// Embedder whose every call fails.
pub struct FailingEmbedder;

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> TriageResult<Vec<f32>> {
        Err(TriageError::RemoteService("embedding service down".into()))
    }
}

/// Records every prompt and answers `generated #n`, where `n` counts calls so far.
#[derive(Default)]
pub struct RecordingGenerator {
    pub prompts: Mutex<Vec<(String, String)>>,
    /// When set, the call whose prompt contains this marker fails.
    pub fail_on: Option<String>,
}

impl RecordingGenerator {
    pub fn failing_on(marker: &str) -> Self {
        Self {
            prompts: Mutex::new(Vec::new()),
            fail_on: Some(marker.to_string()),
        }
    }

    pub fn recorded(&self) -> Vec<(String, String)> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Generator for RecordingGenerator {
    async fn generate(&self, system_prompt: &str, prompt: &str) -> TriageResult<String> {
        self.prompts
            .lock()
            .unwrap()
            .push((system_prompt.to_string(), prompt.to_string()));

        if let Some(marker) = &self.fail_on {
            if prompt.contains(marker.as_str()) {
                return Err(TriageError::RemoteService("generation failed".into()));
            }
        }

        let n = self.prompts.lock().unwrap().len();
        Ok(format!("generated #{n}"))
    }
}
