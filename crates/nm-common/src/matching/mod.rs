pub mod category;
pub mod match_type;
pub mod pipeline;
pub mod ranking;
pub mod scoring;
pub mod weights;

pub use category::{classify, filter_by_category};
pub use match_type::{Category, MatchType};
pub use pipeline::MatchingEngine;
pub use scoring::{CompatibilityScorer, MatchCandidate, MatchSignals};
