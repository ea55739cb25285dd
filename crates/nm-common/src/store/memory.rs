use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::{RwLock, RwLockReadGuard};

use async_trait::async_trait;
use serde::Deserialize;

use super::{EmbeddingStore, ProfileStore};
use crate::{
    Profile,
    error::StoreError,
    similarity::{Embedding, cosine_similarity},
};

/// Profiles and embeddings loaded from a JSON seed file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedData {
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub embeddings: Vec<Embedding>,
}

impl SeedData {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|err| StoreError::Unavailable(format!("failed to read seed file: {err}")))?;
        serde_json::from_str(&raw)
            .map_err(|err| StoreError::Mapping(format!("invalid seed file: {err}")))
    }
}

fn read_guard<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, StoreError> {
    lock.read()
        .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".into()))
}

/// Profile store backed by a sorted map; used for local runs and tests.
#[derive(Debug, Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<BTreeMap<String, Profile>>,
}

impl InMemoryProfileStore {
    pub fn new(profiles: impl IntoIterator<Item = Profile>) -> Self {
        Self {
            profiles: RwLock::new(
                profiles
                    .into_iter()
                    .map(|profile| (profile.id.clone(), profile))
                    .collect(),
            ),
        }
    }

    pub fn upsert(&self, profile: Profile) -> Result<(), StoreError> {
        let mut guard = self
            .profiles
            .write()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".into()))?;
        guard.insert(profile.id.clone(), profile);
        Ok(())
    }
}

#[async_trait]
impl ProfileStore for InMemoryProfileStore {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        Ok(read_guard(&self.profiles)?.get(id).cloned())
    }

    async fn list_profiles(&self, exclude_id: &str, limit: usize) -> Result<Vec<Profile>, StoreError> {
        Ok(read_guard(&self.profiles)?
            .values()
            .filter(|profile| profile.id != exclude_id)
            .take(limit)
            .cloned()
            .collect())
    }

    async fn count_profiles(&self, exclude_id: &str) -> Result<u64, StoreError> {
        let guard = read_guard(&self.profiles)?;
        let total = guard.len() - usize::from(guard.contains_key(exclude_id));
        Ok(total as u64)
    }

    async fn get_profiles(&self, ids: &[String]) -> Result<Vec<Profile>, StoreError> {
        let guard = read_guard(&self.profiles)?;
        Ok(ids.iter().filter_map(|id| guard.get(id).cloned()).collect())
    }
}

/// Embedding store with brute-force cosine search.
#[derive(Debug, Default)]
pub struct InMemoryEmbeddingStore {
    embeddings: RwLock<HashMap<String, Embedding>>,
}

impl InMemoryEmbeddingStore {
    pub fn new(embeddings: impl IntoIterator<Item = Embedding>) -> Self {
        let store = Self::default();
        if let Ok(mut guard) = store.embeddings.write() {
            for embedding in embeddings {
                keep_latest(&mut guard, embedding);
            }
        }
        store
    }

    /// Stores `embedding` unless a newer one already exists for the user.
    pub fn upsert(&self, embedding: Embedding) -> Result<(), StoreError> {
        let mut guard = self
            .embeddings
            .write()
            .map_err(|_| StoreError::Unavailable("in-memory store lock poisoned".into()))?;
        keep_latest(&mut guard, embedding);
        Ok(())
    }
}

fn keep_latest(map: &mut HashMap<String, Embedding>, embedding: Embedding) {
    match map.get(&embedding.user_id) {
        Some(existing) if existing.generated_at > embedding.generated_at => {}
        _ => {
            map.insert(embedding.user_id.clone(), embedding);
        }
    }
}

#[async_trait]
impl EmbeddingStore for InMemoryEmbeddingStore {
    async fn get_embedding(&self, user_id: &str) -> Result<Option<Embedding>, StoreError> {
        Ok(read_guard(&self.embeddings)?.get(user_id).cloned())
    }

    async fn search_similar(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<(String, f32)>, StoreError> {
        let guard = read_guard(&self.embeddings)?;
        let mut scored: Vec<(String, f32)> = guard
            .values()
            .map(|embedding| {
                (
                    embedding.user_id.clone(),
                    cosine_similarity(vector, &embedding.vector),
                )
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(limit);
        Ok(scored)
    }
}
