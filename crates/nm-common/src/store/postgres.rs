use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::{Row, types::FromSql};
use tracing::instrument;

use super::{EmbeddingStore, PgPool, ProfileStore};
use crate::{
    Preferences, Profile,
    error::StoreError,
    similarity::{Embedding, cosine_similarity},
};

const PROFILE_COLUMNS: &str = "id, name, title, company, location, bio, skills, interests, \
     wants_mentor, wants_invest, wants_discuss, wants_collaborate, wants_hire, connections";

fn column<'a, T: FromSql<'a>>(row: &'a Row, name: &str) -> Result<T, StoreError> {
    row.try_get(name)
        .map_err(|err| StoreError::Mapping(format!("{name}: {err}")))
}

fn map_profile(row: &Row) -> Result<Profile, StoreError> {
    let flag = |name: &str| -> Result<bool, StoreError> {
        Ok(column::<Option<bool>>(row, name)?.unwrap_or(false))
    };
    let tags = |name: &str| -> Result<Vec<String>, StoreError> {
        Ok(column::<Option<Vec<String>>>(row, name)?.unwrap_or_default())
    };

    Ok(Profile {
        id: column(row, "id")?,
        name: column::<Option<String>>(row, "name")?.unwrap_or_default(),
        title: column(row, "title")?,
        company: column(row, "company")?,
        location: column(row, "location")?,
        bio: column(row, "bio")?,
        skills: tags("skills")?.into_iter().collect(),
        interests: tags("interests")?.into_iter().collect(),
        preferences: Preferences {
            mentor: flag("wants_mentor")?,
            invest: flag("wants_invest")?,
            discuss: flag("wants_discuss")?,
            collaborate: flag("wants_collaborate")?,
            hire: flag("wants_hire")?,
        },
        connections: column::<Option<i32>>(row, "connections")?
            .unwrap_or(0)
            .max(0) as u32,
    })
}

fn map_embedding(row: &Row) -> Result<Embedding, StoreError> {
    Ok(Embedding {
        user_id: column(row, "user_id")?,
        vector: column(row, "vector")?,
        generated_at: column::<DateTime<Utc>>(row, "generated_at")?,
    })
}

/// Profile records in the `profiles` table.
#[derive(Clone)]
pub struct PgProfileStore {
    pool: PgPool,
}

impl PgProfileStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProfileStore for PgProfileStore {
    #[instrument(skip(self))]
    async fn get_profile(&self, id: &str) -> Result<Option<Profile>, StoreError> {
        let client = self.pool.get().await?;
        let query = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = $1");
        let row = client.query_opt(&query, &[&id]).await?;
        row.as_ref().map(map_profile).transpose()
    }

    #[instrument(skip(self))]
    async fn list_profiles(&self, exclude_id: &str, limit: usize) -> Result<Vec<Profile>, StoreError> {
        let client = self.pool.get().await?;
        let query = format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE id <> $1 ORDER BY id LIMIT $2"
        );
        let limit = limit.min(i64::MAX as usize) as i64;
        let rows = client.query(&query, &[&exclude_id, &limit]).await?;
        rows.iter().map(map_profile).collect()
    }

    #[instrument(skip(self))]
    async fn count_profiles(&self, exclude_id: &str) -> Result<u64, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_one("SELECT COUNT(*) AS count FROM profiles WHERE id <> $1", &[&exclude_id])
            .await?;
        let count: i64 = column(&row, "count")?;
        Ok(count.max(0) as u64)
    }

    #[instrument(skip(self, ids), fields(ids = ids.len()))]
    async fn get_profiles(&self, ids: &[String]) -> Result<Vec<Profile>, StoreError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let client = self.pool.get().await?;
        let query = format!("SELECT {PROFILE_COLUMNS} FROM profiles WHERE id = ANY($1)");
        let rows = client.query(&query, &[&ids]).await?;
        rows.iter().map(map_profile).collect()
    }
}

/// Embeddings in the `profile_embeddings` table (`vector real[]`, one row per user).
#[derive(Clone)]
pub struct PgEmbeddingStore {
    pool: PgPool,
}

impl PgEmbeddingStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EmbeddingStore for PgEmbeddingStore {
    #[instrument(skip(self))]
    async fn get_embedding(&self, user_id: &str) -> Result<Option<Embedding>, StoreError> {
        let client = self.pool.get().await?;
        let row = client
            .query_opt(
                "SELECT user_id, vector, generated_at FROM profile_embeddings WHERE user_id = $1",
                &[&user_id],
            )
            .await?;

        row.as_ref().map(map_embedding).transpose()
    }

    // Similarity is computed in-process over the stored vectors.
    #[instrument(skip(self, vector), fields(dimension = vector.len()))]
    async fn search_similar(
        &self,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<(String, f32)>, StoreError> {
        let client = self.pool.get().await?;
        let rows = client
            .query("SELECT user_id, vector FROM profile_embeddings", &[])
            .await?;

        let mut scored = Vec::with_capacity(rows.len());
        for row in rows {
            let user_id: String = column(&row, "user_id")?;
            let stored: Vec<f32> = column(&row, "vector")?;
            scored.push((user_id, cosine_similarity(vector, &stored)));
        }

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scored.truncate(limit);
        Ok(scored)
    }
}
