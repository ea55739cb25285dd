use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info};

use super::{
    cache::{CachedSimilarity, SimilarityCache},
    vector::similarity_to_score,
};
use crate::{
    Profile,
    config::EngineConfig,
    error::StoreError,
    matching::{
        CompatibilityScorer, MatchCandidate,
        ranking::sort_candidates,
    },
    store::{EmbeddingStore, ProfileStore, with_deadline},
};

/// Result of one similarity lookup. An empty `matches` list means "no data",
/// which callers treat as a signal to fall back, not as a failure.
#[derive(Debug, Clone, Default)]
pub struct RetrievalOutcome {
    pub matches: Vec<MatchCandidate>,
    pub cache_used: bool,
    pub cache_age: Option<Duration>,
}

impl RetrievalOutcome {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Embedding-similarity search over the embedding store, with a per-requester cache.
pub struct SimilarityRetriever {
    embeddings: Arc<dyn EmbeddingStore>,
    profiles: Arc<dyn ProfileStore>,
    scorer: CompatibilityScorer,
    cache: SimilarityCache,
    config: EngineConfig,
}

impl SimilarityRetriever {
    pub fn new(
        embeddings: Arc<dyn EmbeddingStore>,
        profiles: Arc<dyn ProfileStore>,
        scorer: CompatibilityScorer,
        config: EngineConfig,
    ) -> Self {
        Self {
            embeddings,
            profiles,
            scorer,
            cache: SimilarityCache::new(config.cache_ttl),
            config,
        }
    }

    pub fn cache(&self) -> &SimilarityCache {
        &self.cache
    }

    /// Up to `max_results` candidates scoring at least `min_compatibility`,
    /// ordered by similarity score with the usual tie-break. The requester is
    /// never part of the result.
    pub async fn retrieve(
        &self,
        requester: &Profile,
        max_results: usize,
        min_compatibility: f64,
        force_refresh: bool,
    ) -> Result<RetrievalOutcome, StoreError> {
        let deadline = self.config.store_timeout;
        let Some(embedding) =
            with_deadline(deadline, self.embeddings.get_embedding(&requester.id)).await?
        else {
            debug!(requester_id = %requester.id, "requester has no embedding");
            return Ok(RetrievalOutcome::empty());
        };

        let now = Utc::now();
        if force_refresh {
            self.cache.invalidate(&requester.id);
        } else if let Some(hit) = self
            .cache
            .get_fresh(&requester.id, embedding.generated_at, now)
        {
            metrics::counter!("similarity_cache_hits_total").increment(1);
            let age = hit.age(now);
            debug!(requester_id = %requester.id, cache_age_ms = age.as_millis() as u64, "similarity cache hit");
            return Ok(select(
                &hit.candidates,
                max_results,
                min_compatibility,
                true,
                Some(age),
            ));
        }
        metrics::counter!("similarity_cache_misses_total").increment(1);

        let started_at = Utc::now();
        let pool = self.compute_pool(requester, &embedding.vector).await?;
        if pool.is_empty() {
            return Ok(RetrievalOutcome::empty());
        }

        info!(
            requester_id = %requester.id,
            pool_size = pool.len(),
            dimension = embedding.dimension(),
            "similarity pool computed"
        );

        let outcome = select(&pool, max_results, min_compatibility, false, None);
        self.cache.insert(
            &requester.id,
            CachedSimilarity {
                computed_at: started_at,
                candidates: pool,
            },
        );

        Ok(outcome)
    }

    async fn compute_pool(
        &self,
        requester: &Profile,
        vector: &[f32],
    ) -> Result<Vec<MatchCandidate>, StoreError> {
        let deadline = self.config.store_timeout;

        // One extra slot since the requester usually comes back as its own nearest neighbour.
        let neighbours = with_deadline(
            deadline,
            self.embeddings
                .search_similar(vector, self.config.similarity_pool + 1),
        )
        .await?;

        let similarities: HashMap<String, f32> = neighbours
            .into_iter()
            .filter(|(user_id, _)| *user_id != requester.id)
            .collect();
        if similarities.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<String> = similarities.keys().cloned().collect();
        let profiles = with_deadline(deadline, self.profiles.get_profiles(&ids)).await?;

        let mut pool: Vec<MatchCandidate> = profiles
            .into_iter()
            .filter(|profile| profile.id != requester.id)
            .filter_map(|profile| {
                let similarity = *similarities.get(&profile.id)?;
                Some(self.similarity_candidate(requester, profile, similarity))
            })
            .collect();

        sort_candidates(&mut pool);
        pool.truncate(self.config.similarity_pool);
        Ok(pool)
    }

    /// Scores an embedding hit by similarity and reconstructs its match types
    /// from the two profiles so category filtering still applies.
    fn similarity_candidate(
        &self,
        requester: &Profile,
        profile: Profile,
        similarity: f32,
    ) -> MatchCandidate {
        let signals = self.scorer.signals(requester, &profile);
        let score = similarity_to_score(similarity);

        let mut reasons = Vec::with_capacity(signals.reasons.len() + 1);
        reasons.push(format!("Profile similarity {score:.0}%"));
        reasons.extend(signals.reasons);

        MatchCandidate {
            profile,
            score,
            reasons,
            shared_interests: signals.shared_interests,
            complementary_skills: signals.complementary_skills,
            match_types: signals.match_types,
        }
    }
}

fn select(
    pool: &[MatchCandidate],
    max_results: usize,
    min_compatibility: f64,
    cache_used: bool,
    cache_age: Option<Duration>,
) -> RetrievalOutcome {
    RetrievalOutcome {
        matches: pool
            .iter()
            .filter(|candidate| candidate.score >= min_compatibility)
            .take(max_results)
            .cloned()
            .collect(),
        cache_used,
        cache_age,
    }
}
