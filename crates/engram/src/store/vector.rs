//! Long-term vector store (L tier)
//!
//! Namespaced long-term records, either opaque values or embedded
//! (vector, payload) pairs. Supports cosine top-k search over the embedded
//! records; plain values are ignored by search. FIFO capacity eviction, no
//! TTL.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::clock::{Clock, SystemClock};
use crate::error::Result;
use crate::memory::MemoryItem;
use crate::store::fifo::FifoMap;
use crate::store::{TierStore, namespaced};

/// A record stored in the long-term tier.
#[derive(Debug, Clone)]
pub enum VectorRecord {
    /// An opaque value with no embedding; invisible to similarity search
    Value(MemoryItem),
    /// An embedded record searchable by cosine similarity
    Vector {
        /// The embedding vector
        embedding: Vec<f32>,
        /// The item the embedding describes
        payload: MemoryItem,
    },
}

impl VectorRecord {
    /// The payload item regardless of record form.
    pub fn payload(&self) -> &MemoryItem {
        match self {
            VectorRecord::Value(item) => item,
            VectorRecord::Vector { payload, .. } => payload,
        }
    }
}

/// One similarity-search result.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// Key of the matching record
    pub key: String,
    /// Cosine similarity against the query vector
    pub score: f32,
    /// The matching record's payload
    pub payload: MemoryItem,
}

/// Long-term store with approximate nearest-neighbor search.
pub struct LongTermVector {
    inner: Mutex<FifoMap<VectorRecord>>,
    clock: Arc<dyn Clock>,
    namespace: Option<String>,
}

impl LongTermVector {
    /// Create a store with an optional capacity.
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            inner: Mutex::new(FifoMap::new(capacity, None)),
            clock: Arc::new(SystemClock),
            namespace: None,
        }
    }

    /// Prefix all keys with a namespace.
    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Store an embedded record.
    pub fn put_vector(&self, key: &str, embedding: Vec<f32>, payload: MemoryItem) -> Result<()> {
        self.put(key, VectorRecord::Vector { embedding, payload })
    }

    /// Cosine top-k over embedded records, descending score, ties broken by
    /// insertion order. Records without embeddings never match.
    pub fn search(&self, query: &[f32], top_k: usize) -> Vec<SearchHit> {
        let now = self.clock.now();
        let inner = self.inner.lock();
        let mut hits: Vec<SearchHit> = inner
            .iter_in_order(now)
            .filter_map(|(key, record)| match record {
                VectorRecord::Vector { embedding, payload } => Some(SearchHit {
                    key: key.to_string(),
                    score: cosine_similarity(query, embedding),
                    payload: payload.clone(),
                }),
                VectorRecord::Value(_) => None,
            })
            .collect();
        // Stable sort keeps insertion order among equal scores.
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        hits
    }
}

impl TierStore for LongTermVector {
    type Value = VectorRecord;

    fn get(&self, key: &str) -> Option<VectorRecord> {
        let key = namespaced(self.namespace.as_deref(), key);
        let now = self.clock.now();
        self.inner.lock().get(&key, now).cloned()
    }

    fn put(&self, key: &str, value: VectorRecord) -> Result<()> {
        let key = namespaced(self.namespace.as_deref(), key);
        let now = self.clock.now();
        self.inner.lock().insert(&key, value, None, now);
        Ok(())
    }

    fn delete(&self, key: &str) {
        let key = namespaced(self.namespace.as_deref(), key);
        self.inner.lock().remove(&key);
    }

    fn len(&self) -> usize {
        self.inner.lock().len()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
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
