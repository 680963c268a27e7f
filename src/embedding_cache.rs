//! # Embedding cache
//!
//! Maps every canonical symptom in the catalog to its embedding vector.
//!
//! ## Lifecycle
//! - If the cache file exists it is loaded **verbatim**: no check that it still
//!   matches the configured catalog, and vectors are never recomputed. Delete
//!   the file to force a rebuild.
//! - Otherwise every catalog name is embedded once, in catalog order, and the
//!   result is written to disk before being returned.
//!
//! ## Serialization layout
//! The file is a `bincode` (standard config) encoding of [`EmbeddingCache`]: an
//! ordered list of `(name, vector)` entries. Order is preserved so that the
//! matcher's tie-break (first maximum wins) is stable across reloads.
//!
//! ## Sharing
//! [`SharedEmbeddingCache`] wraps the build in a `tokio::sync::OnceCell`, so the
//! first caller builds or loads and concurrent first callers wait for that
//! single initialisation instead of racing.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::info;

use crate::api::Embedder;
use crate::error::TriageResult;

/// One canonical symptom and its vector.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CatalogEntry {
    pub name: String,
    pub vector: Vec<f32>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct EmbeddingCache {
    entries: Vec<CatalogEntry>,
}

impl EmbeddingCache {
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// Embed every catalog name, once each, in order.
    pub async fn build(catalog: &[String], embedder: &dyn Embedder) -> TriageResult<Self> {
        let mut entries = Vec::with_capacity(catalog.len());
        for name in catalog {
            let vector = embedder.embed(name).await?;
            entries.push(CatalogEntry {
                name: name.clone(),
                vector,
            });
        }
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> TriageResult<Self> {
        let bytes = fs::read(path)?;
        let (cache, _read): (EmbeddingCache, usize) =
            bincode::serde::decode_from_slice(&bytes, bincode::config::standard())?;
        Ok(cache)
    }

    pub fn save(&self, path: &Path) -> TriageResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let bytes = bincode::serde::encode_to_vec(self, bincode::config::standard())?;
        fs::write(path, bytes)?;
        Ok(())
    }

    /// Load the persisted cache if present, otherwise build and persist it.
    pub async fn get_or_build(
        path: &Path,
        catalog: &[String],
        embedder: &dyn Embedder,
    ) -> TriageResult<Self> {
        if path.exists() {
            info!("Loading cached embeddings from {}", path.display());
            return Self::load(path);
        }

        info!("Generating new embeddings and caching...");
        let cache = Self::build(catalog, embedder).await?;
        cache.save(path)?;
        info!("Saved embeddings to {}", path.display());
        Ok(cache)
    }

    pub fn get(&self, name: &str) -> Option<&[f32]> {
        self.entries
            .iter()
            .find(|e| e.name == name)
            .map(|e| e.vector.as_slice())
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Process-wide, lazily initialised cache.
pub struct SharedEmbeddingCache {
    cell: OnceCell<EmbeddingCache>,
    path: PathBuf,
    catalog: Vec<String>,
}

impl SharedEmbeddingCache {
    pub fn new(path: impl Into<PathBuf>, catalog: Vec<String>) -> Self {
        Self {
            cell: OnceCell::new(),
            path: path.into(),
            catalog,
        }
    }

    /// Return the cache, building or loading it on first use.
    pub async fn get(&self, embedder: &dyn Embedder) -> TriageResult<&EmbeddingCache> {
        self.cell
            .get_or_try_init(|| EmbeddingCache::get_or_build(&self.path, &self.catalog, embedder))
            .await
    }

    pub fn is_initialized(&self) -> bool {
        self.cell.initialized()
    }
}
