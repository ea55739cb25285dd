pub mod memory;
pub mod pool;
pub mod postgres;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use crate::{Profile, error::StoreError, similarity::Embedding};

pub use memory::{InMemoryEmbeddingStore, InMemoryProfileStore, SeedData};
pub use pool::{DbPoolError, PgPool, create_pool_from_url};
pub use postgres::{PgEmbeddingStore, PgProfileStore};

/// Read-only view of the profile records owned by the surrounding application.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, StoreError>;

    /// Up to `limit` profiles, never including `exclude_id`.
    async fn list_profiles(&self, exclude_id: &str, limit: usize) -> Result<Vec<Profile>, StoreError>;

    async fn count_profiles(&self, exclude_id: &str) -> Result<u64, StoreError>;

    /// Batch lookup; ids without a profile are skipped. Order is not guaranteed.
    async fn get_profiles(&self, ids: &[String]) -> Result<Vec<Profile>, StoreError> {
        let mut profiles = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(profile) = self.get_profile(id).await? {
                profiles.push(profile);
            }
        }
        Ok(profiles)
    }
}

/// Read-only view of the embeddings written by the profile intelligence job.
#[async_trait]
pub trait EmbeddingStore: Send + Sync {
    async fn get_embedding(&self, user_id: &str) -> Result<Option<Embedding>, StoreError>;

    /// Nearest stored embeddings to `vector` as `(user_id, cosine similarity)`,
    /// most similar first. May include the owner of `vector`.
    async fn search_similar(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<(String, f32)>, StoreError>;
}

/// Applies the per-call store deadline.
pub async fn with_deadline<T, F>(deadline: Duration, fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(deadline.as_millis() as u64)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn deadline_converts_elapsed_calls_into_timeouts() {
        let result: Result<(), StoreError> = with_deadline(Duration::from_millis(5), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok(())
        })
        .await;

        assert!(matches!(result, Err(StoreError::Timeout(5))));
    }

    #[tokio::test]
    async fn deadline_passes_through_results() {
        let result = with_deadline(Duration::from_secs(1), async { Ok::<_, StoreError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
