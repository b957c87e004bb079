//! Context engine
//!
//! The orchestrator: `write_turn` annotates a dialogue turn and fans it out
//! across the session, buffer, and long-term tiers; `get_context_for_scope`
//! reads back a filtered, compressed item sequence for a scope. There is no
//! ambient "current session" state beyond the documented default key for the
//! task scope (the last-written session id); session identity is always an
//! explicit parameter.

mod observer;

pub use observer::EngineObserver;

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Duration;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;

use crate::clock::{Clock, SystemClock};
use crate::compress::{Compressor, DedupStrategy, TrimPolicy};
use crate::config::EngramConfig;
use crate::error::{EngramError, Result};
use crate::memory::lifecycle::LifecycleManager;
use crate::memory::{META_ROLE, META_STATUS, MemoryItem, TurnStatus};
use crate::store::{LongTermVector, SessionCache, ShortTermBuffer, TierStore, VectorRecord};

/// Session key used when metadata names none.
pub const DEFAULT_SESSION_KEY: &str = "default";
/// Most-recent item cap applied before compression on task-scope reads.
const MAX_CONTEXT_ITEMS: usize = 50;

const DEFAULT_MAX_MESSAGES: usize = 50;
const DEFAULT_MAX_TOKENS: usize = 2048;
const DEFAULT_TTL_MINUTES: i64 = 30;

/// Assistant phrasings treated as refusals.
const REFUSAL_MARKERS: [&str; 3] = ["sorry", "cannot", "unable to"];
/// Substrings treated as error output.
const ERROR_MARKERS: [&str; 3] = ["error", "exception", "traceback"];

/// Read scope for [`ContextEngine::get_context_for_scope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// Full session history by conversation key
    Task,
    /// Long-term entries by user key
    User,
    /// Reserved for retrieval integration; always empty here
    Topic,
    /// Short-term buffer contents in insertion order
    Recent,
}

impl Scope {
    /// Parse a scope name; unknown names fall back to [`Scope::Recent`].
    pub fn parse(name: &str) -> Self {
        match name {
            "task" => Scope::Task,
            "user" => Scope::User,
            "topic" => Scope::Topic,
            _ => Scope::Recent,
        }
    }
}

/// Boolean context filters for task-scope reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContextFilters {
    /// Drop turns annotated WARN
    pub exclude_warn: bool,
    /// Drop turns annotated ERR
    pub exclude_err: bool,
}

impl ContextFilters {
    fn admits(&self, item: &MemoryItem) -> bool {
        match item.status() {
            Some(TurnStatus::Warn) if self.exclude_warn => false,
            Some(TurnStatus::Err) if self.exclude_err => false,
            _ => true,
        }
    }
}

/// One session's turns in a debug dump.
#[derive(Debug, Clone, Serialize)]
pub struct SessionDump {
    /// Session key
    pub session_id: String,
    /// Turns in write order
    pub turns: Vec<TurnDump>,
}

/// One turn in a debug dump.
#[derive(Debug, Clone, Serialize)]
pub struct TurnDump {
    /// Recorded role
    pub role: Option<String>,
    /// Turn text
    pub content: String,
    /// Recorded status label
    pub status: Option<String>,
}

/// Orchestrates writes and reads across the memory tiers.
pub struct ContextEngine {
    sessions: Arc<SessionCache<Vec<MemoryItem>>>,
    buffer: Arc<ShortTermBuffer>,
    vector: Arc<LongTermVector>,
    buffer_enabled: bool,
    vector_enabled: bool,
    compressor: Compressor,
    clock: Arc<dyn Clock>,
    observers: Vec<Box<dyn EngineObserver>>,
    last_session: Mutex<Option<String>>,
    /// Serializes the read-modify-write of a session's history so concurrent
    /// writers cannot lose turns.
    write_serial: Mutex<()>,
}

impl std::fmt::Debug for ContextEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextEngine")
            .field("buffer_enabled", &self.buffer_enabled)
            .field("vector_enabled", &self.vector_enabled)
            .field("observers", &self.observers.len())
            .finish_non_exhaustive()
    }
}

impl ContextEngine {
    /// Engine with default bounds: 50 buffered messages, 2048 buffered
    /// tokens, 30-minute session TTL.
    pub fn new() -> Self {
        Self::with_clock(&EngramConfig::default(), Arc::new(SystemClock))
            .expect("default config is valid")
    }

    /// Engine from a parsed configuration.
    ///
    /// Unset buffer bounds fall back to the 50-message / 2048-token
    /// defaults, and unset S/M TTLs to 30 minutes. The session tier cannot
    /// be disabled; the buffer and vector tiers can, in which case the
    /// engine skips their reads and writes.
    pub fn from_config(config: &EngramConfig) -> Result<Self> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Engine reading time from an injected clock.
    pub fn with_clock(config: &EngramConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        if !config.session.enabled {
            return Err(EngramError::Config(
                "the session tier cannot be disabled".to_string(),
            ));
        }

        let default_ttl = Duration::minutes(DEFAULT_TTL_MINUTES);
        let session_ttl = ttl_from_secs(config.session.ttl_secs).or(Some(default_ttl));
        let buffer_ttl = ttl_from_secs(config.buffer.ttl_secs).or(Some(default_ttl));

        let mut sessions =
            SessionCache::with_clock(config.session.capacity, session_ttl, clock.clone());
        if let Some(ns) = &config.session.namespace {
            sessions = sessions.with_namespace(ns.clone());
        }

        let mut buffer = ShortTermBuffer::with_clock(
            Some(config.buffer.max_messages.unwrap_or(DEFAULT_MAX_MESSAGES)),
            Some(config.buffer.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS)),
            buffer_ttl,
            clock.clone(),
        );
        if let Some(ns) = &config.buffer.namespace {
            buffer = buffer.with_namespace(ns.clone());
        }

        let mut vector = LongTermVector::new(config.vector.capacity);
        if let Some(ns) = &config.vector.namespace {
            vector = vector.with_namespace(ns.clone());
        }

        Ok(Self {
            sessions: Arc::new(sessions),
            buffer: Arc::new(buffer),
            vector: Arc::new(vector),
            buffer_enabled: config.buffer.enabled,
            vector_enabled: config.vector.enabled,
            // Dedup-only by default: task-scope reads must hand back stored
            // turn content verbatim. Diff-patch stays opt-in via
            // `with_compressor`.
            compressor: Compressor::new(DedupStrategy::Hash, TrimPolicy::KeepTail),
            clock,
            observers: Vec::new(),
            last_session: Mutex::new(None),
            write_serial: Mutex::new(()),
        })
    }

    /// Replace the read-time compressor.
    pub fn with_compressor(mut self, compressor: Compressor) -> Self {
        self.compressor = compressor;
        self
    }

    /// Register an observer; dispatch is synchronous, in registration order.
    pub fn add_observer(&mut self, observer: Box<dyn EngineObserver>) {
        self.observers.push(observer);
    }

    /// Lifecycle manager over this engine's tiers.
    pub fn lifecycle(&self) -> LifecycleManager {
        LifecycleManager::new(
            self.sessions.clone(),
            self.buffer.clone(),
            self.vector.clone(),
        )
    }

    /// The long-term tier, for direct vector writes and similarity search.
    pub fn vector_store(&self) -> &Arc<LongTermVector> {
        &self.vector
    }

    /// Record a conversation turn: annotate status, append to the session
    /// history, mirror into the short-term buffer, and archive under the
    /// user key when metadata carries `user_id`.
    ///
    /// # Errors
    /// [`EngramError::Oversize`] when the content exceeds the buffer's token
    /// bound. The check runs before any tier is touched, so a failed write
    /// leaves every tier unchanged.
    pub fn write_turn(
        &self,
        role: &str,
        content: &str,
        metadata: BTreeMap<String, Value>,
    ) -> Result<()> {
        if self.buffer_enabled {
            self.buffer.check_fits(content)?;
        }

        let session_id = metadata
            .get("session_id")
            .or_else(|| metadata.get("conv_id"))
            .and_then(Value::as_str)
            .unwrap_or(DEFAULT_SESSION_KEY)
            .to_string();

        let status = classify_status(role, content);
        let mut metadata = metadata;
        metadata.insert(META_ROLE.to_string(), Value::from(role));
        metadata.insert(META_STATUS.to_string(), Value::from(status.as_str()));
        let item = MemoryItem::with_timestamp(content, metadata, self.clock.now());

        let position = {
            let _guard = self.write_serial.lock();
            let mut history = self.sessions.get(&session_id).unwrap_or_default();
            history.push(item.clone());
            let position = history.len();
            self.sessions.put(&session_id, history)?;
            position
        };

        if self.buffer_enabled {
            self.buffer
                .put(&format!("{session_id}:{position}"), content.to_string())?;
        }

        if self.vector_enabled {
            if let Some(user_id) = item.metadata.get("user_id").and_then(Value::as_str) {
                self.vector
                    .put(&format!("user:{user_id}"), VectorRecord::Value(item.clone()))?;
            }
        }

        *self.last_session.lock() = Some(session_id.clone());
        tracing::debug!(session = %session_id, role, status = status.as_str(), "turn written");
        for observer in &self.observers {
            observer.on_turn_written(&session_id, &item);
        }
        Ok(())
    }

    /// Retrieve context for a scope.
    ///
    /// Task scope reads the session history under `key` (default: the
    /// last-written session), applies the filters, caps at the most recent
    /// 50 items, and compresses. User scope reads the long-term entry under
    /// `key`, normalized to a one-element sequence. Topic scope is reserved
    /// for retrieval integration and returns an empty sequence. Any other
    /// scope returns the buffer's contents as items with empty metadata.
    pub fn get_context_for_scope(
        &self,
        scope: Scope,
        key: Option<&str>,
        query_text: Option<&str>,
        filters: ContextFilters,
    ) -> Vec<MemoryItem> {
        match scope {
            Scope::Task => {
                let session_id = key
                    .map(str::to_string)
                    .or_else(|| self.last_session.lock().clone())
                    .unwrap_or_else(|| DEFAULT_SESSION_KEY.to_string());
                let history = self.sessions.get(&session_id).unwrap_or_default();
                let mut filtered: Vec<MemoryItem> =
                    history.into_iter().filter(|i| filters.admits(i)).collect();
                if filtered.len() > MAX_CONTEXT_ITEMS {
                    filtered.drain(..filtered.len() - MAX_CONTEXT_ITEMS);
                }
                let before = filtered.len();
                let compressed = self.compressor.compress_items(&filtered);
                if compressed.len() != before {
                    for observer in &self.observers {
                        observer.on_context_compressed(before, compressed.len());
                    }
                }
                compressed
            }
            Scope::User => {
                if !self.vector_enabled {
                    return Vec::new();
                }
                key.and_then(|k| self.vector.get(&format!("user:{k}")))
                    .map(|record| vec![record.payload().clone()])
                    .unwrap_or_default()
            }
            Scope::Topic => {
                // Retrieval is an external collaborator; nothing is wired here.
                let _ = query_text;
                Vec::new()
            }
            Scope::Recent => {
                if !self.buffer_enabled {
                    return Vec::new();
                }
                let now = self.clock.now();
                self.buffer
                    .contents()
                    .into_iter()
                    .map(|text| MemoryItem::with_timestamp(text, BTreeMap::new(), now))
                    .collect()
            }
        }
    }

    /// Export every session's history for inspection.
    ///
    /// O(total stored turns); not for hot paths.
    pub fn dump_memory(&self) -> Vec<SessionDump> {
        self.sessions
            .snapshot()
            .into_iter()
            .map(|(session_id, turns)| SessionDump {
                session_id,
                turns: turns
                    .into_iter()
                    .map(|item| TurnDump {
                        role: item.role().map(str::to_string),
                        status: item.status().map(|s| s.as_str().to_string()),
                        content: item.content,
                    })
                    .collect(),
            })
            .collect()
    }
}

impl Default for ContextEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn ttl_from_secs(secs: Option<u64>) -> Option<Duration> {
    secs.map(|s| Duration::seconds(s as i64))
}

/// Heuristic status annotation. Assistant refusals rank WARN, error output
/// ERR; every other role is OK by construction.
fn classify_status(role: &str, content: &str) -> TurnStatus {
    if !role.eq_ignore_ascii_case("assistant") {
        return TurnStatus::Ok;
    }
    let text = content.to_lowercase();
    if REFUSAL_MARKERS.iter().any(|m| text.contains(m)) {
        return TurnStatus::Warn;
    }
    if ERROR_MARKERS.iter().any(|m| text.contains(m)) {
        return TurnStatus::Err;
    }
    TurnStatus::Ok
}
