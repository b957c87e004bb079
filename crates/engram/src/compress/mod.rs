//! Context compression
//!
//! A read-time transform over sequences of text chunks: an optional
//! hash-dedup pass followed by one trim policy. The canonical stored history
//! is never mutated by compression; callers receive new values, and items
//! whose content was rewritten carry their original text in metadata.

mod diff;

pub use diff::unified_diff;

use crate::memory::{META_COMPRESSED, META_ORIGINAL_CONTENT, MemoryItem};
use crate::text::{content_hash, count_tokens};

/// Deduplication strategy for the first compression pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DedupStrategy {
    /// No deduplication
    None,
    /// SHA-1 content hash; first occurrence wins, relative order preserved
    #[default]
    Hash,
}

/// Trim policy for the second compression pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrimPolicy {
    /// Keep chunk 0 verbatim; replace each later chunk with a unified line
    /// diff against the immediately preceding *original* chunk
    #[default]
    DiffPatch,
    /// Keep chunks from the front while a token budget holds
    KeepHead,
    /// Keep chunks from the back while a token budget holds
    KeepTail,
}

/// Configurable two-pass compressor.
#[derive(Debug, Clone, Default)]
pub struct Compressor {
    dedup: DedupStrategy,
    trim: TrimPolicy,
    /// Token budget for the head/tail policies; `None` disables trimming
    /// for those policies.
    budget: Option<usize>,
}

impl Compressor {
    /// Compressor with explicit passes.
    pub fn new(dedup: DedupStrategy, trim: TrimPolicy) -> Self {
        Self {
            dedup,
            trim,
            budget: None,
        }
    }

    /// Set the token budget used by the head/tail trim policies.
    pub fn with_budget(mut self, budget: usize) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Compress a sequence of text chunks.
    pub fn compress(&self, chunks: &[String]) -> Vec<String> {
        let chunks: Vec<String> = match self.dedup {
            DedupStrategy::Hash => dedupe_by_hash(chunks, |c| c.as_str())
                .into_iter()
                .cloned()
                .collect(),
            DedupStrategy::None => chunks.to_vec(),
        };

        match self.trim {
            TrimPolicy::DiffPatch => diff_patch(&chunks),
            TrimPolicy::KeepHead => keep_head(&chunks, self.budget),
            TrimPolicy::KeepTail => keep_tail(&chunks, self.budget),
        }
    }

    /// Compress memory items, preserving metadata and recording a
    /// back-reference to the original content on every rewritten item.
    pub fn compress_items(&self, items: &[MemoryItem]) -> Vec<MemoryItem> {
        let kept: Vec<&MemoryItem> = match self.dedup {
            DedupStrategy::Hash => dedupe_by_hash(items, |item| item.content.as_str()),
            DedupStrategy::None => items.iter().collect(),
        };

        let out = match self.trim {
            TrimPolicy::DiffPatch => {
                let mut out: Vec<MemoryItem> = Vec::with_capacity(kept.len());
                for (idx, item) in kept.iter().enumerate() {
                    if idx == 0 {
                        out.push((*item).clone());
                        continue;
                    }
                    let delta = unified_diff(&kept[idx - 1].content, &item.content);
                    if delta.is_empty() {
                        out.push((*item).clone());
                    } else {
                        let original = item.content.clone();
                        let mut rewritten = (*item).clone();
                        rewritten.content = delta;
                        rewritten = rewritten
                            .with_meta(META_COMPRESSED, "diff-patch")
                            .with_meta(META_ORIGINAL_CONTENT, original);
                        out.push(rewritten);
                    }
                }
                out
            }
            TrimPolicy::KeepHead => {
                let texts: Vec<String> = kept.iter().map(|i| i.content.clone()).collect();
                let keep = keep_head(&texts, self.budget).len();
                kept[..keep].iter().map(|i| (*i).clone()).collect()
            }
            TrimPolicy::KeepTail => {
                let texts: Vec<String> = kept.iter().map(|i| i.content.clone()).collect();
                let keep = keep_tail(&texts, self.budget).len();
                kept[kept.len() - keep..]
                    .iter()
                    .map(|i| (*i).clone())
                    .collect()
            }
        };

        if out.len() < items.len() {
            tracing::debug!(before = items.len(), after = out.len(), "context compressed");
        }
        out
    }
}

fn dedupe_by_hash<'a, T>(values: &'a [T], text_of: impl Fn(&T) -> &str) -> Vec<&'a T> {
    let mut seen = std::collections::HashSet::new();
    let mut kept = Vec::new();
    for value in values {
        if seen.insert(content_hash(text_of(value))) {
            kept.push(value);
        }
    }
    kept
}

fn diff_patch(chunks: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(chunks.len());
    for (idx, chunk) in chunks.iter().enumerate() {
        if idx == 0 {
            out.push(chunk.clone());
        } else {
            // Diff against the preceding original, never the previous diff.
            out.push(unified_diff(&chunks[idx - 1], chunk));
        }
    }
    out
}

fn keep_head(chunks: &[String], budget: Option<usize>) -> Vec<String> {
    let Some(budget) = budget else {
        return chunks.to_vec();
    };
    let mut acc = 0;
    let mut out = Vec::new();
    for chunk in chunks {
        acc += count_tokens(chunk);
        if acc > budget {
            break;
        }
        out.push(chunk.clone());
    }
    out
}

fn keep_tail(chunks: &[String], budget: Option<usize>) -> Vec<String> {
    let Some(budget) = budget else {
        return chunks.to_vec();
    };
    let mut acc = 0;
    let mut out = Vec::new();
    for chunk in chunks.iter().rev() {
        acc += count_tokens(chunk);
        if acc > budget {
            break;
        }
        out.insert(0, chunk.clone());
    }
    out
}
