use serde::Deserialize;
use strum::{AsRefStr, Display};

use crate::{error::MatchingError, matching::Category};

pub const DEFAULT_MAX_RESULTS: i64 = 10;
pub const MAX_RESULTS_LIMIT: i64 = 50;
pub const DEFAULT_MIN_COMPATIBILITY: i64 = 20;
pub const MIN_COMPATIBILITY_FLOOR: i64 = 10;
pub const MIN_COMPATIBILITY_CEILING: i64 = 100;
pub const MAX_BATCH_CATEGORIES: usize = 6;

const fn default_max_results() -> i64 {
    DEFAULT_MAX_RESULTS
}

const fn default_min_compatibility() -> i64 {
    DEFAULT_MIN_COMPATIBILITY
}

/// Requested matching strategy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Strategy {
    #[default]
    Traditional,
    Rag,
}

/// Body of `POST /api/matches`. The requester comes from authentication.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequestBody {
    #[serde(default)]
    pub algorithm: Strategy,
    #[serde(default)]
    pub category: Category,
    #[serde(default = "default_max_results")]
    pub max_results: i64,
    #[serde(default = "default_min_compatibility")]
    pub min_compatibility: i64,
    #[serde(default)]
    pub force_refresh: bool,
}

impl Default for MatchRequestBody {
    fn default() -> Self {
        Self {
            algorithm: Strategy::default(),
            category: Category::default(),
            max_results: DEFAULT_MAX_RESULTS,
            min_compatibility: DEFAULT_MIN_COMPATIBILITY,
            force_refresh: false,
        }
    }
}

impl MatchRequestBody {
    pub fn into_request(self, requester_id: impl Into<String>) -> MatchingRequest {
        MatchingRequest {
            requester_id: requester_id.into(),
            strategy: self.algorithm,
            category: self.category,
            max_results: self.max_results,
            min_compatibility: self.min_compatibility,
            force_refresh: self.force_refresh,
        }
    }
}

/// Body of `POST /api/matches/batch`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMatchRequestBody {
    pub categories: Vec<Category>,
    #[serde(default = "default_max_results")]
    pub max_results: i64,
    #[serde(default = "default_min_compatibility")]
    pub min_compatibility: i64,
    #[serde(default)]
    pub force_refresh: bool,
}

impl BatchMatchRequestBody {
    pub fn into_request(self, requester_id: impl Into<String>) -> BatchMatchingRequest {
        BatchMatchingRequest {
            requester_id: requester_id.into(),
            categories: self.categories,
            max_results: self.max_results,
            min_compatibility: self.min_compatibility,
            force_refresh: self.force_refresh,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchingRequest {
    pub requester_id: String,
    pub strategy: Strategy,
    pub category: Category,
    pub max_results: i64,
    pub min_compatibility: i64,
    pub force_refresh: bool,
}

impl MatchingRequest {
    pub fn new(requester_id: impl Into<String>) -> Self {
        MatchRequestBody::default().into_request(requester_id)
    }

    pub fn validate(&self) -> Result<(), MatchingError> {
        validate_requester(&self.requester_id)?;
        validate_limits(self.max_results, self.min_compatibility)
    }

    /// `max_results` after validation.
    pub fn result_limit(&self) -> usize {
        self.max_results.clamp(1, MAX_RESULTS_LIMIT) as usize
    }

    /// `min_compatibility` after validation, on the 0-100 score scale.
    pub fn score_threshold(&self) -> f64 {
        self.min_compatibility
            .clamp(MIN_COMPATIBILITY_FLOOR, MIN_COMPATIBILITY_CEILING) as f64
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchMatchingRequest {
    pub requester_id: String,
    pub categories: Vec<Category>,
    pub max_results: i64,
    pub min_compatibility: i64,
    pub force_refresh: bool,
}

impl BatchMatchingRequest {
    pub fn validate(&self) -> Result<(), MatchingError> {
        validate_requester(&self.requester_id)?;
        validate_limits(self.max_results, self.min_compatibility)?;

        if self.categories.is_empty() {
            return Err(MatchingError::InvalidInput(
                "categories must not be empty".into(),
            ));
        }
        if self.categories.len() > MAX_BATCH_CATEGORIES {
            return Err(MatchingError::InvalidInput(format!(
                "at most {MAX_BATCH_CATEGORIES} categories per batch"
            )));
        }
        Ok(())
    }

    /// Requested categories in order, duplicates removed.
    pub fn distinct_categories(&self) -> Vec<Category> {
        let mut seen = Vec::with_capacity(self.categories.len());
        for category in &self.categories {
            if !seen.contains(category) {
                seen.push(*category);
            }
        }
        seen
    }

    /// Single RAG request for one category of the batch.
    pub fn request_for(&self, category: Category, force_refresh: bool) -> MatchingRequest {
        MatchingRequest {
            requester_id: self.requester_id.clone(),
            strategy: Strategy::Rag,
            category,
            max_results: self.max_results,
            min_compatibility: self.min_compatibility,
            force_refresh,
        }
    }
}

fn validate_requester(requester_id: &str) -> Result<(), MatchingError> {
    if requester_id.trim().is_empty() {
        return Err(MatchingError::InvalidInput("requester id is required".into()));
    }
    Ok(())
}

fn validate_limits(max_results: i64, min_compatibility: i64) -> Result<(), MatchingError> {
    if !(1..=MAX_RESULTS_LIMIT).contains(&max_results) {
        return Err(MatchingError::InvalidInput(format!(
            "maxResults must be between 1 and {MAX_RESULTS_LIMIT}"
        )));
    }

    if !(MIN_COMPATIBILITY_FLOOR..=MIN_COMPATIBILITY_CEILING).contains(&min_compatibility) {
        return Err(MatchingError::InvalidInput(format!(
            "minCompatibility must be between {MIN_COMPATIBILITY_FLOOR} and {MIN_COMPATIBILITY_CEILING}"
        )));
    }

    Ok(())
}
