use std::env;
use std::net::{IpAddr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{State, connect_info::ConnectInfo},
    http::Request,
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter, clock::DefaultClock, middleware::NoOpMiddleware,
    state::keyed::DashMapStateStore,
};
use tracing::warn;

use crate::{SharedState, auth::USER_ID_HEADER, error::ApiError};

type IpRateLimiter = RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock, NoOpMiddleware>;

/// Which budget a request draws from. Every request spends from `Any`; batch
/// runs several matchings per call and also spends from `Batch`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    Any,
    Batch,
}

impl RouteClass {
    pub fn of(path: &str) -> &'static [RouteClass] {
        if path.trim_end_matches('/').ends_with("/matches/batch") {
            &[RouteClass::Any, RouteClass::Batch]
        } else {
            &[RouteClass::Any]
        }
    }

    fn as_str(self) -> &'static str {
        match self {
            RouteClass::Any => "any",
            RouteClass::Batch => "batch",
        }
    }
}

/// Tokens per second and burst for both budgets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub per_sec: u64,
    pub burst: u32,
    pub batch_per_sec: u64,
    pub batch_burst: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_sec: 20,
            burst: 40,
            batch_per_sec: 2,
            batch_burst: 5,
        }
    }
}

impl RateLimitConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Unset, unparsable and zero values keep the default.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        fn positive<T: std::str::FromStr + PartialOrd + Default>(raw: Option<String>) -> Option<T> {
            raw?.trim().parse::<T>().ok().filter(|value| *value > T::default())
        }

        let defaults = Self::default();
        Self {
            per_sec: positive(lookup("NM_RATE_LIMIT_PER_SEC")).unwrap_or(defaults.per_sec),
            burst: positive(lookup("NM_RATE_LIMIT_BURST")).unwrap_or(defaults.burst),
            batch_per_sec: positive(lookup("NM_RATE_LIMIT_BATCH_PER_SEC"))
                .unwrap_or(defaults.batch_per_sec),
            batch_burst: positive(lookup("NM_RATE_LIMIT_BATCH_BURST"))
                .unwrap_or(defaults.batch_burst),
        }
    }
}

/// Per-client-IP limiters, one per [`RouteClass`].
#[derive(Clone)]
pub struct RateLimits {
    any: Arc<IpRateLimiter>,
    batch: Arc<IpRateLimiter>,
}

impl RateLimits {
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            any: Arc::new(keyed_limiter(config.per_sec, config.burst)),
            batch: Arc::new(keyed_limiter(config.batch_per_sec, config.batch_burst)),
        }
    }

    pub fn from_env() -> Self {
        Self::new(&RateLimitConfig::from_env())
    }

    fn limiter(&self, class: RouteClass) -> &IpRateLimiter {
        match class {
            RouteClass::Any => &self.any,
            RouteClass::Batch => &self.batch,
        }
    }

    /// First exhausted budget for `ip`, if any. Requests without a peer
    /// address (in-process calls) are never limited.
    pub fn exhausted(&self, path: &str, ip: Option<IpAddr>) -> Option<RouteClass> {
        let ip = ip?;
        RouteClass::of(path)
            .iter()
            .copied()
            .find(|class| self.limiter(*class).check_key(&ip).is_err())
    }
}

fn keyed_limiter(per_sec: u64, burst: u32) -> IpRateLimiter {
    let period = Duration::from_nanos((1_000_000_000 / per_sec.max(1)).max(1));
    let quota = Quota::with_period(period)
        .unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
        .allow_burst(NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN));
    RateLimiter::keyed(quota)
}

pub(crate) async fn enforce(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());

    if let Some(class) = state.rate_limits.exhausted(req.uri().path(), ip) {
        let requester = req
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");
        warn!(
            route_class = class.as_str(),
            client_ip = ?ip,
            requester_id = requester,
            path = req.uri().path(),
            "match request rate limited"
        );
        return Err(ApiError::TooManyRequests(format!(
            "{} budget exhausted",
            class.as_str()
        )));
    }

    Ok(next.run(req).await)
}
