use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Why two profiles fit together. Produced by the scorer, consumed by the
/// category classifier; the human-readable label only appears on the wire.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, AsRefStr, Display,
)]
pub enum MatchType {
    /// The candidate can mentor the requester.
    #[serde(rename = "Mentor")]
    #[strum(serialize = "Mentor")]
    Mentor,
    /// The candidate is looking for the mentoring the requester could give.
    #[serde(rename = "Mentee")]
    #[strum(serialize = "Mentee")]
    Mentee,
    /// The requester wants to invest and the candidate does not.
    #[serde(rename = "Investment Opportunity")]
    #[strum(serialize = "Investment Opportunity")]
    InvestmentOpportunity,
    /// The candidate wants to invest.
    #[serde(rename = "Investor")]
    #[strum(serialize = "Investor")]
    Investor,
    /// The requester is hiring and the candidate is not.
    #[serde(rename = "Potential Hire")]
    #[strum(serialize = "Potential Hire")]
    PotentialHire,
    /// The candidate is hiring.
    #[serde(rename = "Hiring Manager")]
    #[strum(serialize = "Hiring Manager")]
    HiringManager,
    #[serde(rename = "Collaborator")]
    #[strum(serialize = "Collaborator")]
    Collaborator,
    #[serde(rename = "Discussion Partner")]
    #[strum(serialize = "Discussion Partner")]
    DiscussionPartner,
}

impl MatchType {
    /// Rule evaluation order; reasons and tags are emitted in this order.
    pub const ALL: [MatchType; 8] = [
        MatchType::Mentor,
        MatchType::Mentee,
        MatchType::InvestmentOpportunity,
        MatchType::Investor,
        MatchType::PotentialHire,
        MatchType::HiringManager,
        MatchType::Collaborator,
        MatchType::DiscussionPartner,
    ];
}

/// Networking intent used to filter a ranked match list.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    AsRefStr,
    Display,
    EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Category {
    #[default]
    All,
    Mentorship,
    Collaboration,
    Investment,
    Hiring,
    Discussion,
}

impl Category {
    pub fn is_all(self) -> bool {
        matches!(self, Category::All)
    }
}
