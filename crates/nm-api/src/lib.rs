use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    extract::DefaultBodyLimit,
    http::Method,
    http::Request,
    http::header::{AUTHORIZATION, CONTENT_TYPE, HeaderName, HeaderValue},
    middleware,
    middleware::Next,
    response::Response,
    routing::{get, post},
};
use clap::Parser;
use dotenvy::dotenv;
use nm_common::{
    config::EngineConfig,
    logging::{self, LogSettings},
    matching::MatchingEngine,
    store::{
        EmbeddingStore, InMemoryEmbeddingStore, InMemoryProfileStore, PgEmbeddingStore, PgPool,
        PgProfileStore, ProfileStore, SeedData, pool::create_pool_from_url_checked,
    },
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

pub mod auth;
pub mod error;
pub mod handlers;
pub mod rate_limit;

use auth::{API_KEY_HEADER, AuthConfig, AuthMode, JwtAlgorithm, JwtKeyKind, USER_ID_HEADER};
use error::ApiError;
use handlers::{health, matches};
use rate_limit::RateLimits;

const SHUTDOWN_DRAIN_GRACE: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, Parser)]
#[command(name = "nm-api", about = "HTTP API serving networking match recommendations")]
struct Cli {
    /// PostgreSQL connection string; in-memory stores are used when absent
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// JSON file with `profiles` and `embeddings` for the in-memory stores
    #[arg(long, env = "NM_SEED_FILE")]
    seed_file: Option<PathBuf>,

    /// Server port
    #[arg(long, env = "PORT", default_value_t = 3001)]
    port: u16,

    /// API key for X-API-Key authentication
    #[arg(long, env = "NM_API_KEY")]
    api_key: Option<String>,

    /// Authentication mode: api_key | jwt
    #[arg(long, env = "AUTH_MODE", default_value = "api_key", value_enum)]
    auth_mode: AuthMode,

    /// JWT secret for AUTH_MODE=jwt
    #[arg(long, env = "JWT_SECRET")]
    jwt_secret: Option<String>,

    /// PEM public key for AUTH_MODE=jwt when using an asymmetric algorithm
    #[arg(long, env = "JWT_PUBLIC_KEY")]
    jwt_public_key: Option<String>,

    #[arg(long, env = "JWT_ALGORITHM", default_value = "hs512", value_enum)]
    jwt_algorithm: JwtAlgorithm,

    /// Comma separated list of allowed CORS origins
    #[arg(long, env = "NM_CORS_ORIGINS", default_value = "http://localhost:3000")]
    cors_origins: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: Option<String>,
    pub seed_file: Option<PathBuf>,
    pub port: u16,
    pub cors_origins: Vec<HeaderValue>,
    pub auth: AuthConfig,
}

impl AppConfig {
    fn from_cli(cli: Cli) -> Result<Self, ApiError> {
        let cors_origins = parse_cors_origins(&cli.cors_origins)?;

        let auth = AuthConfig {
            mode: cli.auth_mode,
            api_key: cli.api_key,
            jwt_secret: cli.jwt_secret,
            jwt_public_key: cli.jwt_public_key,
            jwt_algorithm: cli.jwt_algorithm,
        };
        validate_auth(&auth)?;

        Ok(Self {
            database_url: cli.database_url.filter(|url| !url.trim().is_empty()),
            seed_file: cli.seed_file,
            port: cli.port,
            cors_origins,
            auth,
        })
    }

    pub fn for_tests(auth: AuthConfig) -> Self {
        Self {
            database_url: None,
            seed_file: None,
            port: 3001,
            cors_origins: vec![HeaderValue::from_static("http://localhost:3000")],
            auth,
        }
    }
}

fn validate_auth(auth: &AuthConfig) -> Result<(), ApiError> {
    match auth.mode {
        AuthMode::ApiKey if auth.api_key.is_none() => Err(ApiError::BadRequest(
            "NM_API_KEY is required when AUTH_MODE=api_key".into(),
        )),
        AuthMode::Jwt => match auth.jwt_algorithm.key_kind() {
            JwtKeyKind::Secret if auth.jwt_secret.is_none() => Err(ApiError::BadRequest(
                "JWT_SECRET is required when AUTH_MODE=jwt with symmetric algorithms".into(),
            )),
            JwtKeyKind::Secret => Ok(()),
            _ if auth.jwt_public_key.is_none() => Err(ApiError::BadRequest(
                "JWT_PUBLIC_KEY is required when AUTH_MODE=jwt with asymmetric algorithms".into(),
            )),
            _ => Ok(()),
        },
        _ => Ok(()),
    }
}

/// Browser origins allowed to call the match endpoints with credentials. Every
/// entry must be a concrete origin; a wildcard or an unparsable value fails startup.
fn parse_cors_origins(raw: &str) -> Result<Vec<HeaderValue>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(|origin| {
            if origin == "*" {
                return Err(ApiError::BadRequest(
                    "NM_CORS_ORIGINS must list explicit origins when credentials are enabled"
                        .into(),
                ));
            }
            origin.parse::<HeaderValue>().map_err(|_| {
                ApiError::BadRequest(format!("NM_CORS_ORIGINS has an invalid origin: {origin}"))
            })
        })
        .collect()
}

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<MatchingEngine>,
    pub pool: Option<PgPool>,
    pub config: AppConfig,
    pub(crate) rate_limits: RateLimits,
    pub readiness: Arc<AtomicBool>,
}

pub type SharedState = Arc<AppState>;

impl axum::extract::FromRef<SharedState> for AuthConfig {
    fn from_ref(input: &SharedState) -> AuthConfig {
        input.config.auth.clone()
    }
}

fn cors_layer(origins: &[HeaderValue]) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(origins.to_vec())
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            AUTHORIZATION,
            CONTENT_TYPE,
            HeaderName::from_static(API_KEY_HEADER),
            HeaderName::from_static(USER_ID_HEADER),
        ])
        .allow_credentials(true)
}

async fn attach_request_id_context(req: Request<Body>, next: Next) -> Result<Response, ApiError> {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.to_string());

    Ok(error::with_request_id(request_id, next.run(req)).await)
}

pub fn create_router(state: SharedState) -> Router {
    let cors = cors_layer(&state.config.cors_origins);

    let request_id_header = HeaderName::from_static("x-request-id");
    let trace_header = request_id_header.clone();

    let trace = TraceLayer::new_for_http().make_span_with(move |request: &Request<Body>| {
        let request_id = request
            .headers()
            .get(&trace_header)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");

        tracing::info_span!(
            "http_request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = %request_id,
            status = tracing::field::Empty,
        )
    });

    let api_routes = Router::new()
        .route("/matches", post(matches::find_matches))
        .route("/matches/batch", post(matches::find_matches_batch));

    Router::new()
        .route("/livez", get(health::livez))
        .route("/readyz", get(health::readyz))
        .nest("/api", api_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            rate_limit::enforce,
        ))
        .layer(middleware::from_fn(attach_request_id_context))
        .layer(DefaultBodyLimit::max(64 * 1024))
        .layer(trace)
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(
            request_id_header,
            MakeRequestUuid::default(),
        ))
        .layer(cors)
        .with_state(state)
}

/// In-memory state around `seed`, authenticated by `api_key`.
pub fn test_state_with(api_key: &str, seed: SeedData) -> SharedState {
    test_state_limited(api_key, seed, RateLimits::from_env())
}

/// Like [`test_state_with`] with explicit rate limits.
pub fn test_state_limited(api_key: &str, seed: SeedData, rate_limits: RateLimits) -> SharedState {
    let engine = MatchingEngine::new(
        Arc::new(InMemoryProfileStore::new(seed.profiles)),
        Arc::new(InMemoryEmbeddingStore::new(seed.embeddings)),
        EngineConfig::default(),
    );

    Arc::new(AppState {
        engine: Arc::new(engine),
        pool: None,
        config: AppConfig::for_tests(AuthConfig::api_key(api_key)),
        rate_limits,
        readiness: Arc::new(AtomicBool::new(true)),
    })
}

pub fn test_state(api_key: &str) -> SharedState {
    test_state_with(api_key, SeedData::default())
}

type Stores = (Arc<dyn ProfileStore>, Arc<dyn EmbeddingStore>, Option<PgPool>);

async fn build_stores(config: &AppConfig) -> Result<Stores, ApiError> {
    if let Some(url) = config.database_url.as_deref() {
        let pool = create_pool_from_url_checked(url)
            .await
            .map_err(|err| ApiError::Dependency(format!("failed to create pool: {err}")))?;

        let profiles: Arc<dyn ProfileStore> = Arc::new(PgProfileStore::new(pool.clone()));
        let embeddings: Arc<dyn EmbeddingStore> = Arc::new(PgEmbeddingStore::new(pool.clone()));
        return Ok((profiles, embeddings, Some(pool)));
    }

    let seed = match config.seed_file.as_deref() {
        Some(path) => SeedData::from_path(path)?,
        None => {
            warn!("DATABASE_URL and NM_SEED_FILE unset; serving empty in-memory stores");
            SeedData::default()
        }
    };
    info!(
        profiles = seed.profiles.len(),
        embeddings = seed.embeddings.len(),
        "using in-memory stores"
    );

    let profiles: Arc<dyn ProfileStore> = Arc::new(InMemoryProfileStore::new(seed.profiles));
    let embeddings: Arc<dyn EmbeddingStore> =
        Arc::new(InMemoryEmbeddingStore::new(seed.embeddings));
    Ok((profiles, embeddings, None))
}

pub async fn run() -> Result<(), ApiError> {
    dotenv().ok();
    logging::init(&LogSettings::from_env(env!("CARGO_PKG_NAME")));
    nm_metrics::init_metrics();

    let cli = Cli::parse();
    let config = AppConfig::from_cli(cli)?;
    let (profiles, embeddings, pool) = build_stores(&config).await?;

    let engine_config = EngineConfig::from_env();
    info!(
        candidate_cap = engine_config.candidate_cap,
        similarity_pool = engine_config.similarity_pool,
        store_timeout_ms = engine_config.store_timeout.as_millis() as u64,
        cache_ttl_secs = engine_config.cache_ttl.map(|ttl| ttl.as_secs()),
        "matching engine configured"
    );

    let state = Arc::new(AppState {
        engine: Arc::new(MatchingEngine::new(profiles, embeddings, engine_config)),
        pool,
        config: config.clone(),
        rate_limits: RateLimits::from_env(),
        readiness: Arc::new(AtomicBool::new(true)),
    });

    let addr: SocketAddr = ([0, 0, 0, 0], config.port).into();
    let app = create_router(state.clone());

    info!(%addr, auth_mode = ?config.auth.mode, "nm-api listening");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    let service = app.into_make_service_with_connect_info::<SocketAddr>();

    axum::serve(listener, service)
        .with_graceful_shutdown(shutdown_signal(state.clone()))
        .await
        .map_err(|err| ApiError::Internal(err.to_string()))?;

    Ok(())
}

/// Resolves on SIGTERM or Ctrl-C, after flipping `/readyz` to unavailable and
/// giving load balancers `SHUTDOWN_DRAIN_GRACE` to stop routing match traffic.
async fn shutdown_signal(state: SharedState) {
    let signal = termination().await;

    state.readiness.store(false, Ordering::SeqCst);
    info!(
        signal,
        drain_ms = SHUTDOWN_DRAIN_GRACE.as_millis() as u64,
        "shutdown requested; draining match requests"
    );
    tokio::time::sleep(SHUTDOWN_DRAIN_GRACE).await;
}

#[cfg(unix)]
async fn termination() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => tokio::select! {
            _ = tokio::signal::ctrl_c() => "ctrl_c",
            _ = sigterm.recv() => "sigterm",
        },
        Err(err) => {
            warn!(error = %err, "SIGTERM handler unavailable; waiting for Ctrl-C only");
            let _ = tokio::signal::ctrl_c().await;
            "ctrl_c"
        }
    }
}

#[cfg(not(unix))]
async fn termination() -> &'static str {
    let _ = tokio::signal::ctrl_c().await;
    "ctrl_c"
}
