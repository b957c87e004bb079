//! Versioned artifacts
//!
//! Large text/structured objects with append-only version histories. Every
//! commit creates a new version; nothing is mutated in place. Payloads are
//! archived through the cold store, and delta commits store a unified diff
//! against the previous version instead of the full payload.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::compress::unified_diff;
use crate::error::Result;
use crate::store::{ColdStore, TierStore};
use crate::text::content_hash;

/// Kind of artifact payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactKind {
    /// Plain text
    Text,
    /// JSON document
    Json,
    /// Source code
    Code,
}

/// One artifact version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    /// Stable id shared by all versions
    pub id: String,
    /// Payload kind
    pub kind: ArtifactKind,
    /// Payload (full content, or a unified diff for delta commits)
    pub data: String,
    /// SHA-1 checksum of `data`
    pub checksum: String,
    /// When this version was committed
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// New artifact with a fresh id and computed checksum.
    pub fn new(kind: ArtifactKind, data: impl Into<String>) -> Self {
        let data = data.into();
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            checksum: content_hash(&data),
            data,
            created_at: Utc::now(),
        }
    }

    fn next_version(&self, data: String) -> Self {
        Self {
            id: self.id.clone(),
            kind: self.kind,
            checksum: content_hash(&data),
            data,
            created_at: Utc::now(),
        }
    }
}

/// Append-only artifact version manager.
pub struct ArtifactVersions {
    versions: Mutex<HashMap<String, Vec<Artifact>>>,
    archive: Arc<ColdStore>,
}

impl ArtifactVersions {
    /// Manager archiving payloads into the given cold store.
    pub fn new(archive: Arc<ColdStore>) -> Self {
        Self {
            versions: Mutex::new(HashMap::new()),
            archive,
        }
    }

    /// Append a version. The artifact's id groups it with prior versions.
    pub fn commit(&self, artifact: Artifact) -> Result<()> {
        let mut versions = self.versions.lock();
        let entry = versions.entry(artifact.id.clone()).or_default();
        let key = format!("artifact:{}:v{}", artifact.id, entry.len() + 1);
        self.archive.put(&key, Value::String(artifact.data.clone()))?;
        entry.push(artifact);
        Ok(())
    }

    /// Append a delta version: the stored payload is a unified diff of the
    /// previous version's data against `data`.
    ///
    /// With no prior version this is a plain commit of the full payload
    /// under the given id.
    pub fn delta_commit(&self, id: &str, data: impl Into<String>) -> Result<Artifact> {
        let data = data.into();
        let artifact = match self.latest(id) {
            Some(previous) => previous.next_version(unified_diff(&previous.data, &data)),
            None => {
                let mut artifact = Artifact::new(ArtifactKind::Text, data);
                artifact.id = id.to_string();
                artifact
            }
        };
        self.commit(artifact.clone())?;
        Ok(artifact)
    }

    /// The most recent version, if any.
    pub fn latest(&self, id: &str) -> Option<Artifact> {
        self.versions.lock().get(id).and_then(|v| v.last().cloned())
    }

    /// All versions of an artifact, oldest first.
    pub fn history(&self, id: &str) -> Vec<Artifact> {
        self.versions.lock().get(id).cloned().unwrap_or_default()
    }

    /// Number of committed versions for an id.
    pub fn version_count(&self, id: &str) -> usize {
        self.versions.lock().get(id).map(Vec::len).unwrap_or(0)
    }
}
