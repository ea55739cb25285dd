use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Latest embedding produced for a user by the profile intelligence job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Embedding {
    pub user_id: String,
    pub vector: Vec<f32>,
    pub generated_at: DateTime<Utc>,
}

impl Embedding {
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}
