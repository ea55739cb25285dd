use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Serialize, Serializer};
use strum::{AsRefStr, Display};

use crate::matching::{Category, MatchCandidate};

pub const FALLBACK_REASON: &str = "No vector embeddings found, used traditional matching";

/// Strategy that actually produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, AsRefStr, Display)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum Algorithm {
    Traditional,
    Rag,
    RagFallbackTraditional,
}

impl Algorithm {
    /// Metric label value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::Traditional => "traditional",
            Algorithm::Rag => "rag",
            Algorithm::RagFallbackTraditional => "rag-fallback-traditional",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingResponse {
    pub algorithm: Algorithm,
    pub matches: Vec<MatchCandidate>,
    pub total_found: usize,
    pub cache_used: bool,
    #[serde(
        rename = "cacheAge",
        serialize_with = "serialize_millis",
        skip_serializing_if = "Option::is_none"
    )]
    pub cache_age: Option<Duration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    /// Candidate population of the traditional scan, when it could be counted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profiles_analyzed: Option<u64>,
}

fn serialize_millis<S>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match value {
        Some(age) => serializer.serialize_u64(age.as_millis() as u64),
        None => serializer.serialize_none(),
    }
}

/// One response per distinct requested category.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchMatchingResponse {
    pub results: BTreeMap<Category, MatchingResponse>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn empty(algorithm: Algorithm) -> MatchingResponse {
        MatchingResponse {
            algorithm,
            matches: Vec::new(),
            total_found: 0,
            cache_used: false,
            cache_age: None,
            fallback_reason: None,
            profiles_analyzed: None,
        }
    }

    #[test]
    fn serializes_camel_case_and_skips_absent_fields() {
        let response = empty(Algorithm::Traditional);
        let value = serde_json::to_value(&response).unwrap();

        assert_eq!(
            value,
            json!({
                "algorithm": "traditional",
                "matches": [],
                "totalFound": 0,
                "cacheUsed": false
            })
        );
    }

    #[test]
    fn cache_age_is_reported_in_milliseconds() {
        let mut response = empty(Algorithm::Rag);
        response.cache_used = true;
        response.cache_age = Some(Duration::from_millis(1500));

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["cacheAge"], json!(1500));
        assert_eq!(value["algorithm"], json!("rag"));
    }

    #[test]
    fn fallback_label_matches_metric_label() {
        let algorithm = Algorithm::RagFallbackTraditional;
        assert_eq!(algorithm.to_string(), algorithm.as_str());
        assert_eq!(
            serde_json::to_value(algorithm).unwrap(),
            json!("rag-fallback-traditional")
        );
    }

    #[test]
    fn batch_results_are_keyed_by_category() {
        let mut results = BTreeMap::new();
        results.insert(Category::Hiring, empty(Algorithm::Rag));

        let value = serde_json::to_value(BatchMatchingResponse { results }).unwrap();
        assert!(value["results"]["hiring"].is_object());
    }
}
