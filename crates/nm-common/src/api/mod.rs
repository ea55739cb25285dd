pub mod match_request;
pub mod match_response;

pub use match_request::{
    BatchMatchRequestBody, BatchMatchingRequest, MatchRequestBody, MatchingRequest, Strategy,
};
pub use match_response::{Algorithm, BatchMatchingResponse, FALLBACK_REASON, MatchingResponse};
