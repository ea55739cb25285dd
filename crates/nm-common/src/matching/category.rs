use std::collections::BTreeSet;

use super::{
    match_type::{Category, MatchType},
    scoring::MatchCandidate,
};

/// Categories a single match type belongs to.
pub fn categories_for(match_type: MatchType) -> &'static [Category] {
    match match_type {
        MatchType::Mentor | MatchType::Mentee => &[Category::Mentorship],
        MatchType::Investor | MatchType::InvestmentOpportunity => &[Category::Investment],
        MatchType::HiringManager | MatchType::PotentialHire => &[Category::Hiring],
        MatchType::Collaborator => &[Category::Collaboration],
        MatchType::DiscussionPartner => &[Category::Collaboration, Category::Discussion],
    }
}

/// Every concrete category the candidate qualifies for. Never contains `All`.
pub fn classify(candidate: &MatchCandidate) -> BTreeSet<Category> {
    candidate
        .match_types
        .iter()
        .flat_map(|match_type| categories_for(*match_type).iter().copied())
        .collect()
}

pub fn in_category(candidate: &MatchCandidate, category: Category) -> bool {
    category.is_all()
        || candidate
            .match_types
            .iter()
            .any(|match_type| categories_for(*match_type).contains(&category))
}

/// Keeps the candidates belonging to `category`, preserving their order.
pub fn filter_by_category(candidates: Vec<MatchCandidate>, category: Category) -> Vec<MatchCandidate> {
    if category.is_all() {
        return candidates;
    }

    candidates
        .into_iter()
        .filter(|candidate| in_category(candidate, category))
        .collect()
}
