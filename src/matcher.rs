//! # Symptom matcher
//!
//! Resolves free-text symptom phrases onto the canonical catalog.
//!
//! For each phrase the matcher embeds the phrase, scores it against every cached
//! catalog vector with cosine similarity and keeps the best entry. Ties go to the
//! first maximum in catalog order. The best entry counts as a match only when its
//! score is **strictly** above the threshold (0.6 by default); otherwise the
//! phrase is reported as unmatched and contributes nothing.
//!
//! The output set of canonical names is deduplicated and ordered by first match.
//!
//! This is a linear scan (`phrases × catalog`). The catalog is tiny and fixed, so
//! no index structure is involved.

use serde::Serialize;
use tracing::info;

use crate::api::Embedder;
use crate::embedding_cache::EmbeddingCache;
use crate::error::TriageResult;

/// Cosine similarity of two vectors in `[-1, 1]`.
///
/// Vectors of different length, or with a zero norm, score `0.0`.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Split comma-separated input into lowercased, trimmed, non-empty phrases.
pub fn normalize_phrases(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(normalize_phrase)
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn normalize_phrase(phrase: &str) -> String {
    phrase.trim().to_lowercase()
}

/// Best catalog entry for a phrase (stable argmax).
pub fn best_match<'a>(vector: &[f32], cache: &'a EmbeddingCache) -> Option<(&'a str, f32)> {
    let mut best: Option<(&str, f32)> = None;
    for entry in cache.entries() {
        let score = cosine_similarity(vector, &entry.vector);
        if best.is_none_or(|(_, b)| score > b) {
            best = Some((entry.name.as_str(), score));
        }
    }
    best
}

/// A phrase that fell below the threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnmatchedPhrase {
    pub phrase: String,
    pub closest: Option<String>,
    pub score: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MatchOutcome {
    /// Deduplicated canonical names, in order of first match.
    pub matched: Vec<String>,
    pub unmatched: Vec<UnmatchedPhrase>,
}

impl MatchOutcome {
    pub fn is_empty(&self) -> bool {
        self.matched.is_empty()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SymptomMatcher {
    threshold: f32,
}

impl Default for SymptomMatcher {
    fn default() -> Self {
        Self { threshold: 0.6 }
    }
}

impl SymptomMatcher {
    pub fn new(threshold: f32) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Classify an already-embedded phrase.
    pub fn classify(&self, vector: &[f32], cache: &EmbeddingCache) -> Option<(String, f32)> {
        match best_match(vector, cache) {
            Some((name, score)) if score > self.threshold => Some((name.to_string(), score)),
            _ => None,
        }
    }

    /// Embed every phrase and map it onto the catalog.
    ///
    /// Phrases are expected to be normalized already (see [`normalize_phrases`]).
    ///
    /// # Errors
    /// Propagates embedding failures; a phrase that simply matches nothing is not an error.
    pub async fn match_phrases(
        &self,
        phrases: &[String],
        cache: &EmbeddingCache,
        embedder: &dyn Embedder,
    ) -> TriageResult<MatchOutcome> {
        let mut outcome = MatchOutcome::default();

        for phrase in phrases {
            let vector = embedder.embed(phrase).await?;
            let best = best_match(&vector, cache);

            match best {
                Some((name, score)) if score > self.threshold => {
                    info!("'{}' matched with '{}' ({:.2})", phrase, name, score);
                    if !outcome.matched.iter().any(|m| m == name) {
                        outcome.matched.push(name.to_string());
                    }
                }
                _ => {
                    let score = best.map(|(_, s)| s).unwrap_or(0.0);
                    info!("'{}' has no good match ({:.2})", phrase, score);
                    outcome.unmatched.push(UnmatchedPhrase {
                        phrase: phrase.clone(),
                        closest: best.map(|(n, _)| n.to_string()),
                        score,
                    });
                }
            }
        }

        Ok(outcome)
    }
}
