use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::Serialize;

use nm_common::api::{
    BatchMatchRequestBody, BatchMatchingResponse, MatchRequestBody, MatchingResponse,
};

use crate::SharedState;
use crate::auth::AuthUser;
use crate::error::ApiError;

/// Successful responses carry `success: true` next to the payload fields.
#[derive(Debug, Serialize)]
pub struct Success<T> {
    success: bool,
    #[serde(flatten)]
    data: T,
}

impl<T> Success<T> {
    fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

pub async fn find_matches(
    State(state): State<SharedState>,
    auth: AuthUser,
    body: Result<Json<MatchRequestBody>, JsonRejection>,
) -> Result<Json<Success<MatchingResponse>>, ApiError> {
    let Json(body) = body?;
    let request = body.into_request(auth.subject);

    let response = state.engine.run(&request).await?;
    Ok(Json(Success::new(response)))
}

pub async fn find_matches_batch(
    State(state): State<SharedState>,
    auth: AuthUser,
    body: Result<Json<BatchMatchRequestBody>, JsonRejection>,
) -> Result<Json<Success<BatchMatchingResponse>>, ApiError> {
    let Json(body) = body?;
    let request = body.into_request(auth.subject);

    let response = state.engine.run_batch(&request).await?;
    Ok(Json(Success::new(response)))
}
