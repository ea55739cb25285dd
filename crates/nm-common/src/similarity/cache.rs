use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::{DashMap, mapref::entry::Entry};

use crate::matching::MatchCandidate;

/// Ranked similarity pool for one requester, before threshold and size cuts.
#[derive(Debug, Clone)]
pub struct CachedSimilarity {
    /// When the computation that produced this entry started.
    pub computed_at: DateTime<Utc>,
    pub candidates: Vec<MatchCandidate>,
}

impl CachedSimilarity {
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        (now - self.computed_at).to_std().unwrap_or_default()
    }
}

/// Per-requester similarity results.
///
/// Entries are immutable once inserted and handed out as `Arc` snapshots, so a
/// reader never observes a partially written pool: invalidation removes the key
/// and refills replace the whole entry.
#[derive(Debug, Default)]
pub struct SimilarityCache {
    entries: DashMap<String, Arc<CachedSimilarity>>,
    ttl: Option<Duration>,
}

impl SimilarityCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
        }
    }

    /// Returns the entry when it is newer than the requester's embedding and
    /// within the TTL. Stale entries are evicted on the way out.
    pub fn get_fresh(
        &self,
        requester_id: &str,
        embedding_generated_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Option<Arc<CachedSimilarity>> {
        let entry = self.entries.get(requester_id).map(|e| Arc::clone(e.value()))?;

        let newer_than_embedding = entry.computed_at > embedding_generated_at;
        let within_ttl = self.ttl.is_none_or(|ttl| entry.age(now) <= ttl);

        if newer_than_embedding && within_ttl {
            return Some(entry);
        }

        // Only drop the snapshot we judged; a concurrent refill may already have replaced it.
        self.entries
            .remove_if(requester_id, |_, current| Arc::ptr_eq(current, &entry));
        None
    }

    /// Stores a freshly computed pool. An older computation finishing late never
    /// overwrites a newer one.
    pub fn insert(&self, requester_id: &str, value: CachedSimilarity) {
        let value = Arc::new(value);
        match self.entries.entry(requester_id.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().computed_at <= value.computed_at {
                    occupied.insert(value);
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(value);
            }
        }
    }

    pub fn invalidate(&self, requester_id: &str) {
        self.entries.remove(requester_id);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
