use std::time::Duration;

/// Engine tunables, read from `NM_*` environment variables with fixed defaults.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Upper bound on profiles loaded for rule-based matching.
    pub candidate_cap: usize,
    /// Number of nearest neighbours requested from the embedding store.
    pub similarity_pool: usize,
    /// Deadline applied to each store call.
    pub store_timeout: Duration,
    /// Maximum age of a similarity cache entry; `None` keeps entries until they go stale.
    pub cache_ttl: Option<Duration>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            candidate_cap: 1000,
            similarity_pool: 200,
            store_timeout: Duration::from_millis(5000),
            cache_ttl: Some(Duration::from_secs(3600)),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cache_ttl = match env_u64("NM_SIMILARITY_CACHE_TTL_SECS") {
            Some(0) => None,
            Some(secs) => Some(Duration::from_secs(secs)),
            None => defaults.cache_ttl,
        };

        Self {
            candidate_cap: env_u64("NM_CANDIDATE_CAP")
                .filter(|v| *v > 0)
                .map(|v| v as usize)
                .unwrap_or(defaults.candidate_cap),
            similarity_pool: env_u64("NM_SIMILARITY_POOL")
                .filter(|v| *v > 0)
                .map(|v| v as usize)
                .unwrap_or(defaults.similarity_pool),
            store_timeout: env_u64("NM_STORE_TIMEOUT_MS")
                .filter(|v| *v > 0)
                .map(Duration::from_millis)
                .unwrap_or(defaults.store_timeout),
            cache_ttl,
        }
    }
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|raw| raw.trim().parse().ok())
}
