//! Negative-example vault
//!
//! An explicitly owned, injectable store of negative examples (content the
//! model must not emulate). No process-wide state: callers construct a vault
//! and pass it where needed. Optionally backed by an append-only
//! newline-delimited JSON log, one `{role, content, metadata}` object per
//! line, loaded at open time.

use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{EngramError, Result};

/// One vaulted example.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultEntry {
    /// Role the offending content carried
    pub role: String,
    /// The example text
    pub content: String,
    /// Arbitrary annotations
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl VaultEntry {
    /// Entry with empty metadata.
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
            metadata: BTreeMap::new(),
        }
    }
}

/// Ordered, content-deduplicated negative-example store.
#[derive(Debug)]
pub struct NegativeVault {
    entries: Mutex<Vec<VaultEntry>>,
    log_path: Option<PathBuf>,
}

impl NegativeVault {
    /// Purely in-memory vault.
    pub fn in_memory() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            log_path: None,
        }
    }

    /// Vault backed by an append-only JSONL log.
    ///
    /// Existing log lines are loaded (and deduplicated) first; subsequent
    /// adds append one line each. Removals only affect the in-memory view;
    /// the log itself is never rewritten.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut entries: Vec<VaultEntry> = Vec::new();
        if path.exists() {
            let file = File::open(&path)?;
            for (number, line) in BufReader::new(file).lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let entry: VaultEntry = serde_json::from_str(&line).map_err(|e| {
                    EngramError::Vault(format!("bad log line {}: {e}", number + 1))
                })?;
                if !entries.iter().any(|e| e.content == entry.content) {
                    entries.push(entry);
                }
            }
        }
        Ok(Self {
            entries: Mutex::new(entries),
            log_path: Some(path),
        })
    }

    /// Add an entry. Duplicate content is ignored. Returns whether the entry
    /// was added.
    pub fn add(&self, entry: VaultEntry) -> Result<bool> {
        let mut entries = self.entries.lock();
        if entries.iter().any(|e| e.content == entry.content) {
            return Ok(false);
        }
        if let Some(path) = &self.log_path {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            let line = serde_json::to_string(&entry)?;
            writeln!(file, "{line}")?;
        }
        entries.push(entry);
        Ok(true)
    }

    /// Add a bare example with a `system` role.
    pub fn add_example(&self, content: impl Into<String>) -> Result<bool> {
        self.add(VaultEntry::new("system", content))
    }

    /// Remove an example by content. Removing an absent example is a no-op.
    pub fn remove_example(&self, content: &str) -> bool {
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|e| e.content != content);
        entries.len() != before
    }

    /// Example texts in insertion order.
    pub fn examples(&self) -> Vec<String> {
        self.entries.lock().iter().map(|e| e.content.clone()).collect()
    }

    /// Full entries in insertion order.
    pub fn entries(&self) -> Vec<VaultEntry> {
        self.entries.lock().clone()
    }

    /// Number of stored examples.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the vault is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}
