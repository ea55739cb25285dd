use axum::async_trait;
use axum::extract::FromRef;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use clap::ValueEnum;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::Deserialize;

use crate::error::ApiError;

pub const API_KEY_HEADER: &str = "x-api-key";
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum AuthMode {
    ApiKey,
    Jwt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "lower")]
pub enum JwtAlgorithm {
    Hs256,
    Hs384,
    Hs512,
    Rs256,
    Rs384,
    Rs512,
    Es256,
    Es384,
    EdDsa,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JwtKeyKind {
    Secret,
    Rsa,
    Ec,
    Ed,
}

impl JwtAlgorithm {
    pub fn key_kind(self) -> JwtKeyKind {
        match self {
            JwtAlgorithm::Hs256 | JwtAlgorithm::Hs384 | JwtAlgorithm::Hs512 => JwtKeyKind::Secret,
            JwtAlgorithm::Rs256 | JwtAlgorithm::Rs384 | JwtAlgorithm::Rs512 => JwtKeyKind::Rsa,
            JwtAlgorithm::Es256 | JwtAlgorithm::Es384 => JwtKeyKind::Ec,
            JwtAlgorithm::EdDsa => JwtKeyKind::Ed,
        }
    }

    fn algorithm(self) -> Algorithm {
        match self {
            JwtAlgorithm::Hs256 => Algorithm::HS256,
            JwtAlgorithm::Hs384 => Algorithm::HS384,
            JwtAlgorithm::Hs512 => Algorithm::HS512,
            JwtAlgorithm::Rs256 => Algorithm::RS256,
            JwtAlgorithm::Rs384 => Algorithm::RS384,
            JwtAlgorithm::Rs512 => Algorithm::RS512,
            JwtAlgorithm::Es256 => Algorithm::ES256,
            JwtAlgorithm::Es384 => Algorithm::ES384,
            JwtAlgorithm::EdDsa => Algorithm::EdDSA,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub mode: AuthMode,
    pub api_key: Option<String>,
    pub jwt_secret: Option<String>,
    pub jwt_public_key: Option<String>,
    pub jwt_algorithm: JwtAlgorithm,
}

impl AuthConfig {
    pub fn api_key(key: impl Into<String>) -> Self {
        Self {
            mode: AuthMode::ApiKey,
            api_key: Some(key.into()),
            jwt_secret: None,
            jwt_public_key: None,
            jwt_algorithm: JwtAlgorithm::Hs512,
        }
    }

    fn decoding_key(&self) -> Result<DecodingKey, ApiError> {
        let public_key = || {
            self.jwt_public_key
                .as_deref()
                .map(str::as_bytes)
                .ok_or_else(|| ApiError::Unauthorized("missing JWT_PUBLIC_KEY".into()))
        };

        let key = match self.jwt_algorithm.key_kind() {
            JwtKeyKind::Secret => {
                let secret = self
                    .jwt_secret
                    .as_deref()
                    .ok_or_else(|| ApiError::Unauthorized("missing JWT_SECRET".into()))?;
                return Ok(DecodingKey::from_secret(secret.as_bytes()));
            }
            JwtKeyKind::Rsa => DecodingKey::from_rsa_pem(public_key()?),
            JwtKeyKind::Ec => DecodingKey::from_ec_pem(public_key()?),
            JwtKeyKind::Ed => DecodingKey::from_ed_pem(public_key()?),
        };

        key.map_err(|err| ApiError::Unauthorized(format!("invalid JWT_PUBLIC_KEY: {err}")))
    }
}

/// The authenticated requester. Matching always runs for this subject.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub subject: String,
}

#[derive(Debug, Deserialize)]
struct Claims {
    sub: String,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    AuthConfig: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let config = AuthConfig::from_ref(state);

        match config.mode {
            AuthMode::ApiKey => authorize_api_key(parts, &config),
            AuthMode::Jwt => authorize_jwt(parts, &config),
        }
    }
}

fn header<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn authorize_api_key(parts: &Parts, config: &AuthConfig) -> Result<AuthUser, ApiError> {
    let expected = config
        .api_key
        .as_deref()
        .ok_or_else(|| ApiError::Unauthorized("missing NM_API_KEY".into()))?;

    let provided = header(parts, API_KEY_HEADER)
        .ok_or_else(|| ApiError::Unauthorized("missing X-API-Key header".into()))?;

    if provided != expected {
        return Err(ApiError::Unauthorized("invalid API key".into()));
    }

    let subject = header(parts, USER_ID_HEADER)
        .ok_or_else(|| ApiError::Unauthorized("missing X-User-Id header".into()))?;

    Ok(AuthUser {
        subject: subject.to_string(),
    })
}

fn authorize_jwt(parts: &Parts, config: &AuthConfig) -> Result<AuthUser, ApiError> {
    let header = header(parts, AUTHORIZATION.as_str())
        .ok_or_else(|| ApiError::Unauthorized("missing Authorization header".into()))?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or_else(|| ApiError::Unauthorized("expected Bearer token".into()))?;

    let validation = Validation::new(config.jwt_algorithm.algorithm());
    let data = decode::<Claims>(token, &config.decoding_key()?, &validation)
        .map_err(|err| ApiError::Unauthorized(format!("invalid token: {err}")))?;

    if data.claims.sub.trim().is_empty() {
        return Err(ApiError::Unauthorized("token subject is empty".into()));
    }

    Ok(AuthUser {
        subject: data.claims.sub,
    })
}

#[cfg(test)]
mod tests {
    use axum::http::Request;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde::Serialize;

    use super::*;

    fn parts(headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri("/api/matches");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn jwt_config() -> AuthConfig {
        AuthConfig {
            mode: AuthMode::Jwt,
            api_key: None,
            jwt_secret: Some("topsecret".into()),
            jwt_public_key: None,
            jwt_algorithm: JwtAlgorithm::Hs512,
        }
    }

    #[derive(Serialize)]
    struct TestClaims<'a> {
        sub: &'a str,
        exp: usize,
    }

    fn token(sub: &str, secret: &str) -> String {
        encode(
            &Header::new(Algorithm::HS512),
            &TestClaims {
                sub,
                exp: 4_102_444_800,
            },
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn api_key_mode_takes_subject_from_user_header() {
        let config = AuthConfig::api_key("k");

        let user = authorize_api_key(&parts(&[("x-api-key", "k"), ("x-user-id", "u42")]), &config)
            .unwrap();
        assert_eq!(user.subject, "u42");

        assert!(authorize_api_key(&parts(&[("x-api-key", "k")]), &config).is_err());
        assert!(
            authorize_api_key(&parts(&[("x-api-key", "wrong"), ("x-user-id", "u42")]), &config)
                .is_err()
        );
    }

    #[test]
    fn jwt_mode_uses_sub_claim() {
        let config = jwt_config();
        let bearer = format!("Bearer {}", token("u7", "topsecret"));

        let user = authorize_jwt(&parts(&[("authorization", bearer.as_str())]), &config).unwrap();
        assert_eq!(user.subject, "u7");
    }

    #[test]
    fn jwt_mode_rejects_foreign_signatures() {
        let config = jwt_config();
        let bearer = format!("Bearer {}", token("u7", "other"));

        assert!(matches!(
            authorize_jwt(&parts(&[("authorization", bearer.as_str())]), &config),
            Err(ApiError::Unauthorized(_))
        ));
    }

    #[test]
    fn key_kinds_follow_algorithm_family() {
        assert_eq!(JwtAlgorithm::Hs256.key_kind(), JwtKeyKind::Secret);
        assert_eq!(JwtAlgorithm::Rs512.key_kind(), JwtKeyKind::Rsa);
        assert_eq!(JwtAlgorithm::Es256.key_kind(), JwtKeyKind::Ec);
    }
}
