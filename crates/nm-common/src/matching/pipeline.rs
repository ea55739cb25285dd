use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{info, warn};

use super::{
    category::filter_by_category,
    match_type::Category,
    ranking::rank_profiles,
    scoring::{CompatibilityScorer, MatchCandidate},
};
use crate::{
    Profile,
    api::{
        Algorithm, BatchMatchingRequest, BatchMatchingResponse, FALLBACK_REASON, MatchingRequest,
        MatchingResponse, Strategy,
    },
    config::EngineConfig,
    error::MatchingError,
    similarity::{RetrievalOutcome, SimilarityRetriever},
    store::{EmbeddingStore, ProfileStore, with_deadline},
};

/// Where a request currently stands. A RAG attempt that finds nothing moves to
/// the fallback state exactly once; every other path is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StrategyState {
    Traditional,
    RagAttempt,
    TraditionalFallback,
}

impl StrategyState {
    fn initial(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Traditional => StrategyState::Traditional,
            Strategy::Rag => StrategyState::RagAttempt,
        }
    }
}

pub struct MatchingEngine {
    profiles: Arc<dyn ProfileStore>,
    retriever: SimilarityRetriever,
    scorer: CompatibilityScorer,
    config: EngineConfig,
}

impl MatchingEngine {
    pub fn new(
        profiles: Arc<dyn ProfileStore>,
        embeddings: Arc<dyn EmbeddingStore>,
        config: EngineConfig,
    ) -> Self {
        Self::with_scorer(profiles, embeddings, CompatibilityScorer::default(), config)
    }

    pub fn with_scorer(
        profiles: Arc<dyn ProfileStore>,
        embeddings: Arc<dyn EmbeddingStore>,
        scorer: CompatibilityScorer,
        config: EngineConfig,
    ) -> Self {
        let retriever =
            SimilarityRetriever::new(embeddings, Arc::clone(&profiles), scorer, config.clone());
        Self {
            profiles,
            retriever,
            scorer,
            config,
        }
    }

    pub async fn run(&self, request: &MatchingRequest) -> Result<MatchingResponse, MatchingError> {
        request.validate()?;
        let requester = self.load_requester(&request.requester_id).await?;
        self.run_for(&requester, request).await
    }

    /// Sequential RAG runs, one per distinct category. `force_refresh` only
    /// applies to the first run so the rest reuse the refreshed pool.
    pub async fn run_batch(
        &self,
        request: &BatchMatchingRequest,
    ) -> Result<BatchMatchingResponse, MatchingError> {
        request.validate()?;
        let requester = self.load_requester(&request.requester_id).await?;

        let mut results = BTreeMap::new();
        for (index, category) in request.distinct_categories().into_iter().enumerate() {
            let single = request.request_for(category, request.force_refresh && index == 0);
            let response = self.run_for(&requester, &single).await?;
            results.insert(category, response);
        }

        Ok(BatchMatchingResponse { results })
    }

    async fn load_requester(&self, requester_id: &str) -> Result<Profile, MatchingError> {
        with_deadline(self.config.store_timeout, self.profiles.get_profile(requester_id))
            .await?
            .ok_or_else(|| MatchingError::ProfileNotFound(requester_id.to_string()))
    }

    async fn run_for(
        &self,
        requester: &Profile,
        request: &MatchingRequest,
    ) -> Result<MatchingResponse, MatchingError> {
        let mut state = StrategyState::initial(request.strategy);

        let response = loop {
            match state {
                StrategyState::Traditional => {
                    break self.traditional(requester, request, Algorithm::Traditional).await?;
                }
                StrategyState::RagAttempt => {
                    let outcome = self
                        .retriever
                        .retrieve(
                            requester,
                            self.config.similarity_pool,
                            request.score_threshold(),
                            request.force_refresh,
                        )
                        .await?;

                    if outcome.matches.is_empty() {
                        state = StrategyState::TraditionalFallback;
                        continue;
                    }
                    break rag_response(outcome, request);
                }
                StrategyState::TraditionalFallback => {
                    metrics::counter!("matching_fallback_total").increment(1);
                    warn!(requester_id = %requester.id, "no similarity matches, falling back to traditional");

                    let mut response = self
                        .traditional(requester, request, Algorithm::RagFallbackTraditional)
                        .await?;
                    response.fallback_reason = Some(FALLBACK_REASON.to_string());
                    break response;
                }
            }
        };

        metrics::counter!("matching_requests_total", "algorithm" => response.algorithm.as_str())
            .increment(1);
        info!(
            requester_id = %requester.id,
            algorithm = %response.algorithm,
            category = %request.category,
            returned = response.matches.len(),
            total_found = response.total_found,
            cache_used = response.cache_used,
            "matching completed"
        );

        Ok(response)
    }

    async fn traditional(
        &self,
        requester: &Profile,
        request: &MatchingRequest,
        algorithm: Algorithm,
    ) -> Result<MatchingResponse, MatchingError> {
        let deadline = self.config.store_timeout;
        let (listed, counted) = tokio::join!(
            with_deadline(
                deadline,
                self.profiles
                    .list_profiles(&requester.id, self.config.candidate_cap)
            ),
            with_deadline(deadline, self.profiles.count_profiles(&requester.id)),
        );
        let profiles = listed?;

        let profiles_analyzed = match counted {
            Ok(count) => Some(count),
            Err(err) => {
                warn!(requester_id = %requester.id, error = %err, "failed to count profiles");
                None
            }
        };

        let ranked = rank_profiles(&self.scorer, requester, &profiles, request.score_threshold());
        let (matches, total_found) = finish(ranked, request.category, request.result_limit());

        Ok(MatchingResponse {
            algorithm,
            matches,
            total_found,
            cache_used: false,
            cache_age: None,
            fallback_reason: None,
            profiles_analyzed,
        })
    }
}

fn rag_response(outcome: RetrievalOutcome, request: &MatchingRequest) -> MatchingResponse {
    let (matches, total_found) = finish(outcome.matches, request.category, request.result_limit());

    MatchingResponse {
        algorithm: Algorithm::Rag,
        matches,
        total_found,
        cache_used: outcome.cache_used,
        cache_age: outcome.cache_age,
        fallback_reason: None,
        profiles_analyzed: None,
    }
}

/// Category filter, then truncation. Returns the kept matches and the filtered size.
fn finish(
    ranked: Vec<MatchCandidate>,
    category: Category,
    max_results: usize,
) -> (Vec<MatchCandidate>, usize) {
    let mut filtered = filter_by_category(ranked, category);
    let total_found = filtered.len();
    filtered.truncate(max_results);
    (filtered, total_found)
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};

    use super::*;
    use crate::{
        Preferences,
        error::StoreError,
        matching::MatchType,
        similarity::Embedding,
        store::{InMemoryEmbeddingStore, InMemoryProfileStore},
    };

    fn profile(id: &str) -> Profile {
        Profile {
            id: id.into(),
            name: id.into(),
            ..Profile::default()
        }
    }

    fn embedding(user_id: &str, vector: Vec<f32>) -> Embedding {
        Embedding {
            user_id: user_id.into(),
            vector,
            generated_at: Utc::now() - ChronoDuration::minutes(5),
        }
    }

    fn engine(profiles: Vec<Profile>, embeddings: Vec<Embedding>) -> MatchingEngine {
        MatchingEngine::new(
            Arc::new(InMemoryProfileStore::new(profiles)),
            Arc::new(InMemoryEmbeddingStore::new(embeddings)),
            EngineConfig::default(),
        )
    }

    fn mentor_seeker() -> Profile {
        Profile {
            location: Some("Berlin".into()),
            preferences: Preferences {
                mentor: true,
                ..Preferences::default()
            },
            ..profile("me")
        }
    }

    fn network() -> Vec<Profile> {
        vec![
            mentor_seeker(),
            Profile {
                location: Some("Berlin".into()),
                connections: 3,
                ..profile("ada")
            },
            Profile {
                preferences: Preferences {
                    hire: true,
                    ..Preferences::default()
                },
                connections: 12,
                ..profile("grace")
            },
            profile("nobody"),
        ]
    }

    fn request(strategy: Strategy) -> MatchingRequest {
        MatchingRequest {
            strategy,
            ..MatchingRequest::new("me")
        }
    }

    #[tokio::test]
    async fn traditional_scores_mentor_and_location() {
        let engine = engine(network(), vec![]);

        let response = engine.run(&request(Strategy::Traditional)).await.unwrap();

        assert_eq!(response.algorithm, Algorithm::Traditional);
        let ids: Vec<_> = response.matches.iter().map(|m| m.profile.id.as_str()).collect();
        assert_eq!(ids, vec!["grace", "ada", "nobody"]);

        let ada = &response.matches[1];
        assert_eq!(ada.score, 35.0);
        assert!(ada.match_types.contains(&MatchType::Mentor));
        assert_eq!(response.profiles_analyzed, Some(3));
        assert!(response.fallback_reason.is_none());
    }

    #[tokio::test]
    async fn requester_is_never_returned() {
        let engine = engine(network(), vec![]);
        let mut req = request(Strategy::Traditional);
        req.min_compatibility = 10;

        let response = engine.run(&req).await.unwrap();

        assert!(response.matches.iter().all(|m| m.profile.id != "me"));
    }

    #[tokio::test]
    async fn category_filter_applies_before_truncation() {
        let engine = engine(network(), vec![]);
        let mut req = request(Strategy::Traditional);
        req.category = Category::Hiring;

        let response = engine.run(&req).await.unwrap();

        let ids: Vec<_> = response.matches.iter().map(|m| m.profile.id.as_str()).collect();
        assert_eq!(ids, vec!["grace"]);
        assert_eq!(response.total_found, 1);
    }

    #[tokio::test]
    async fn max_results_truncates_after_counting() {
        let engine = engine(network(), vec![]);
        let mut req = request(Strategy::Traditional);
        req.max_results = 1;

        let response = engine.run(&req).await.unwrap();

        assert_eq!(response.matches.len(), 1);
        assert_eq!(response.total_found, 3);
    }

    #[tokio::test]
    async fn rag_without_embeddings_falls_back() {
        let engine = engine(network(), vec![]);

        let response = engine.run(&request(Strategy::Rag)).await.unwrap();

        assert_eq!(response.algorithm, Algorithm::RagFallbackTraditional);
        assert_eq!(response.fallback_reason.as_deref(), Some(FALLBACK_REASON));
        assert_eq!(response.matches[0].profile.id, "grace");
    }

    #[tokio::test]
    async fn rag_uses_similarity_and_then_the_cache() {
        let engine = engine(
            network(),
            vec![
                embedding("me", vec![1.0, 0.0]),
                embedding("ada", vec![0.9, 0.2]),
                embedding("grace", vec![0.4, 0.6]),
            ],
        );
        let req = request(Strategy::Rag);

        let first = engine.run(&req).await.unwrap();
        let second = engine.run(&req).await.unwrap();

        assert_eq!(first.algorithm, Algorithm::Rag);
        assert!(!first.cache_used);
        assert_eq!(first.matches[0].profile.id, "ada");
        assert!(second.cache_used);
        assert!(second.cache_age.is_some());
        assert_eq!(second.matches.len(), first.matches.len());
    }

    #[tokio::test]
    async fn rag_matches_keep_match_types_for_category_filter() {
        let engine = engine(
            network(),
            vec![
                embedding("me", vec![1.0, 0.0]),
                embedding("ada", vec![0.9, 0.2]),
                embedding("grace", vec![0.4, 0.6]),
            ],
        );
        let mut req = request(Strategy::Rag);
        req.category = Category::Hiring;

        let response = engine.run(&req).await.unwrap();

        assert_eq!(response.algorithm, Algorithm::Rag);
        assert_eq!(response.matches.len(), 1);
        assert_eq!(response.matches[0].profile.id, "grace");
    }

    #[tokio::test]
    async fn missing_requester_is_not_found() {
        let engine = engine(network(), vec![]);

        let result = engine.run(&MatchingRequest::new("ghost")).await;

        assert!(matches!(result, Err(MatchingError::ProfileNotFound(id)) if id == "ghost"));
    }

    #[tokio::test]
    async fn invalid_limits_are_rejected_before_store_access() {
        let engine = engine(vec![], vec![]);
        let mut req = request(Strategy::Traditional);
        req.max_results = 500;

        assert!(matches!(engine.run(&req).await, Err(MatchingError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn batch_returns_one_response_per_distinct_category() {
        let engine = engine(network(), vec![]);
        let batch = BatchMatchingRequest {
            requester_id: "me".into(),
            categories: vec![Category::Mentorship, Category::Hiring, Category::Mentorship],
            max_results: 10,
            min_compatibility: 20,
            force_refresh: true,
        };

        let response = engine.run_batch(&batch).await.unwrap();

        assert_eq!(response.results.len(), 2);
        let mentorship = &response.results[&Category::Mentorship];
        assert_eq!(mentorship.algorithm, Algorithm::RagFallbackTraditional);
        assert_eq!(mentorship.total_found, 3);
        assert_eq!(response.results[&Category::Hiring].matches[0].profile.id, "grace");
    }

    struct FlakyCount(InMemoryProfileStore);

    #[async_trait]
    impl ProfileStore for FlakyCount {
        async fn get_profile(&self, id: &str) -> Result<Option<Profile>, StoreError> {
            self.0.get_profile(id).await
        }

        async fn list_profiles(&self, exclude_id: &str, limit: usize) -> Result<Vec<Profile>, StoreError> {
            self.0.list_profiles(exclude_id, limit).await
        }

        async fn count_profiles(&self, _exclude_id: &str) -> Result<u64, StoreError> {
            Err(StoreError::Unavailable("count timed out upstream".into()))
        }
    }

    #[tokio::test]
    async fn count_failure_only_drops_profiles_analyzed() {
        let engine = MatchingEngine::new(
            Arc::new(FlakyCount(InMemoryProfileStore::new(network()))),
            Arc::new(InMemoryEmbeddingStore::default()),
            EngineConfig::default(),
        );

        let response = engine.run(&request(Strategy::Traditional)).await.unwrap();

        assert!(response.profiles_analyzed.is_none());
        assert!(!response.matches.is_empty());
    }
}
