//! # Symptom research
//!
//! Glue between the matcher and the fetcher: resolve phrases onto the catalog,
//! then pull reference text for every matched symptom. Shared by the
//! conversation pipeline and the offline report flow.

use std::sync::Arc;

use tracing::info;

use crate::api::Embedder;
use crate::config::TriageConfig;
use crate::embedding_cache::SharedEmbeddingCache;
use crate::error::TriageResult;
use crate::fetcher::{FetchBatch, ReferenceFetcher};
use crate::matcher::{MatchOutcome, SymptomMatcher};

#[derive(Debug, Clone, Default)]
pub struct ResearchBundle {
    pub outcome: MatchOutcome,
    pub batch: FetchBatch,
}

pub struct SymptomResearch {
    embedder: Arc<dyn Embedder>,
    cache: SharedEmbeddingCache,
    matcher: SymptomMatcher,
    fetcher: ReferenceFetcher,
}

impl SymptomResearch {
    pub fn new(
        embedder: Arc<dyn Embedder>,
        cache: SharedEmbeddingCache,
        matcher: SymptomMatcher,
        fetcher: ReferenceFetcher,
    ) -> Self {
        Self {
            embedder,
            cache,
            matcher,
            fetcher,
        }
    }

    pub fn from_config(config: &TriageConfig, embedder: Arc<dyn Embedder>) -> TriageResult<Self> {
        Ok(Self::new(
            embedder,
            SharedEmbeddingCache::new(&config.embedding_cache_path, config.catalog.clone()),
            SymptomMatcher::new(config.similarity_threshold),
            ReferenceFetcher::new(&config.reference_base_url, config.fetch_timeout())?,
        ))
    }

    /// Build or load the embedding cache ahead of the first request.
    pub async fn warm_up(&self) -> TriageResult<usize> {
        let cache = self.cache.get(self.embedder.as_ref()).await?;
        info!("Embedding cache ready with {} catalog entries", cache.len());
        Ok(cache.len())
    }

    /// Match normalized phrases, then fetch reference text for each match.
    pub async fn gather(&self, phrases: &[String]) -> TriageResult<ResearchBundle> {
        let cache = self.cache.get(self.embedder.as_ref()).await?;
        let outcome = self
            .matcher
            .match_phrases(phrases, cache, self.embedder.as_ref())
            .await?;

        if outcome.is_empty() {
            return Ok(ResearchBundle {
                outcome,
                batch: FetchBatch::default(),
            });
        }

        let batch = self.fetcher.fetch_all(&outcome.matched).await;
        Ok(ResearchBundle { outcome, batch })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeEmbedder;
    use httpmock::prelude::*;

    fn research(
        base_url: String,
        dir: &std::path::Path,
        embedder: Arc<FakeEmbedder>,
    ) -> SymptomResearch {
        let config = TriageConfig {
            reference_base_url: base_url,
            embedding_cache_path: dir.join("embeddings.bin"),
            fetch_timeout_secs: 5,
            ..TriageConfig::default()
        };
        SymptomResearch::from_config(&config, embedder).unwrap()
    }

    #[tokio::test]
    async fn gather_matches_then_fetches() {
        let server = MockServer::start_async().await;
        let headache = server
            .mock_async(|when, then| {
                when.method(GET).path("/headache.html");
                then.status(200).body("<p>Head pain overview.</p>");
            })
            .await;
        let dir = tempfile::tempdir().unwrap();
        let embedder = Arc::new(FakeEmbedder::catalog());
        let research = research(format!("{}/", server.base_url()), dir.path(), embedder.clone());

        let bundle = research
            .gather(&["head pain".to_string(), "itchy elbow".to_string()])
            .await
            .unwrap();

        headache.assert_async().await;
        assert_eq!(bundle.outcome.matched, vec!["headache"]);
        assert_eq!(bundle.outcome.unmatched.len(), 1);
        assert_eq!(bundle.batch.texts(), vec!["Head pain overview."]);
        // 4 catalog entries + 2 phrases
        assert_eq!(embedder.call_count(), 6);
    }

    #[tokio::test]
    async fn no_match_skips_fetching() {
        let server = MockServer::start_async().await;
        let any_page = server
            .mock_async(|when, then| {
                when.method(GET);
                then.status(200).body("<p>x</p>");
            })
            .await;
        let dir = tempfile::tempdir().unwrap();
        let research = research(
            format!("{}/", server.base_url()),
            dir.path(),
            Arc::new(FakeEmbedder::catalog()),
        );

        let bundle = research.gather(&["itchy elbow".to_string()]).await.unwrap();

        assert!(bundle.outcome.is_empty());
        assert!(bundle.batch.fetched.is_empty());
        assert_eq!(any_page.calls_async().await, 0);
    }

    #[tokio::test]
    async fn warm_up_builds_cache_once() {
        let dir = tempfile::tempdir().unwrap();
        let embedder = Arc::new(FakeEmbedder::catalog());
        let research = research("http://127.0.0.1:9/".into(), dir.path(), embedder.clone());

        assert_eq!(research.warm_up().await.unwrap(), 4);
        assert_eq!(research.warm_up().await.unwrap(), 4);
        assert_eq!(embedder.call_count(), 4);
    }
}
