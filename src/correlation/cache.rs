//! Bounded in-memory store of ingested images

use axum::body::Bytes;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::CacheConfig;
use crate::correlation::metadata::{timestamp_of, CorrelationMetadata};

/// An ingested image and its correlation metadata
#[derive(Debug, Clone)]
pub struct CorrelationEntry {
    pub bytes: Bytes,
    pub metadata: CorrelationMetadata,
    inserted_at: Instant,
}

/// Chooses which cached image a completed image belongs to
pub trait Correlator: Send + Sync {
    /// Pick among `candidates` (a consistent snapshot of the cached ids).
    /// `hint` is an id the completing client claims to be answering, if any.
    fn select(&self, candidates: &[&str], hint: Option<&str>) -> Option<String>;
}

/// The most recently ingested image wins; ignores hints
#[derive(Debug, Default, Clone, Copy)]
pub struct LatestIngested;

impl Correlator for LatestIngested {
    fn select(&self, candidates: &[&str], _hint: Option<&str>) -> Option<String> {
        candidates
            .iter()
            .filter_map(|id| timestamp_of(id).map(|ts| (ts, *id)))
            .max_by(|a, b| a.0.cmp(b.0))
            .map(|(_, id)| id.to_string())
    }
}

/// Honours an explicit id when it is cached, otherwise falls back to
/// [`LatestIngested`]
#[derive(Debug, Default, Clone, Copy)]
pub struct ExplicitOrLatest;

impl Correlator for ExplicitOrLatest {
    fn select(&self, candidates: &[&str], hint: Option<&str>) -> Option<String> {
        if let Some(hint) = hint {
            if candidates.contains(&hint) {
                return Some(hint.to_string());
            }
            debug!(hint = %hint, "Explicit image id not cached, using latest");
        }
        LatestIngested.select(candidates, None)
    }
}

/// Image id → (bytes, metadata), bounded by age and entry count
pub struct CorrelationCache {
    entries: RwLock<BTreeMap<String, CorrelationEntry>>,
    max_entries: usize,
    ttl: Duration,
    correlator: Box<dyn Correlator>,
}

impl CorrelationCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        Self::with_correlator(max_entries, ttl, Box::new(ExplicitOrLatest))
    }

    pub fn with_correlator(max_entries: usize, ttl: Duration, correlator: Box<dyn Correlator>) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            max_entries: max_entries.max(1),
            ttl,
            correlator,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(config.max_entries, Duration::from_secs(config.ttl_secs))
    }

    fn is_live(&self, entry: &CorrelationEntry) -> bool {
        entry.inserted_at.elapsed() < self.ttl
    }

    /// Store bytes and metadata together, replacing any entry under the same id
    pub fn insert(&self, image_id: &str, bytes: Bytes, metadata: CorrelationMetadata) {
        let mut entries = self.entries.write();

        let before = entries.len();
        entries.retain(|_, entry| entry.inserted_at.elapsed() < self.ttl);
        let expired = before - entries.len();

        entries.insert(
            image_id.to_string(),
            CorrelationEntry {
                bytes,
                metadata,
                inserted_at: Instant::now(),
            },
        );

        let mut evicted = 0;
        while entries.len() > self.max_entries {
            // Ids embed their ingestion time, so the smallest key is the oldest
            let oldest = entries
                .keys()
                .find(|id| id.as_str() != image_id)
                .cloned();
            match oldest {
                Some(id) => {
                    entries.remove(&id);
                    evicted += 1;
                }
                None => break,
            }
        }

        debug!(
            image_id = %image_id,
            size = entries.len(),
            expired = expired,
            evicted = evicted,
            "Cached image"
        );
    }

    /// Bytes stored under `image_id`
    pub fn get(&self, image_id: &str) -> Option<Bytes> {
        self.entries
            .read()
            .get(image_id)
            .filter(|entry| self.is_live(entry))
            .map(|entry| entry.bytes.clone())
    }

    pub fn metadata(&self, image_id: &str) -> Option<CorrelationMetadata> {
        self.entries
            .read()
            .get(image_id)
            .filter(|entry| self.is_live(entry))
            .map(|entry| entry.metadata.clone())
    }

    /// Pick the entry a completed image belongs to.
    ///
    /// The candidate set and the chosen metadata come from the same read
    /// lock, so concurrent ingestions cannot change the answer mid-choice.
    pub fn select_pending(&self, hint: Option<&str>) -> Option<(String, CorrelationMetadata)> {
        let entries = self.entries.read();
        let candidates: Vec<&str> = entries
            .iter()
            .filter(|(_, entry)| self.is_live(entry))
            .map(|(id, _)| id.as_str())
            .collect();

        let chosen = self.correlator.select(&candidates, hint)?;
        let metadata = entries.get(&chosen)?.metadata.clone();
        Some((chosen, metadata))
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
