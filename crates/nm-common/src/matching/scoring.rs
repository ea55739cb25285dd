use std::collections::BTreeSet;

use serde::Serialize;

use super::{
    match_type::MatchType,
    weights::{DEFAULT_WEIGHTS, Weights},
};
use crate::{
    Preferences, Profile,
    normalize::{same_location, shared_tags},
};

pub const MIN_SCORE: f64 = 0.0;
pub const MAX_SCORE: f64 = 100.0;

/// A scored recommendation for one requester. Lives for a single request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchCandidate {
    pub profile: Profile,
    /// Compatibility in `[0, 100]`.
    pub score: f64,
    pub reasons: Vec<String>,
    pub shared_interests: BTreeSet<String>,
    pub complementary_skills: BTreeSet<String>,
    pub match_types: BTreeSet<MatchType>,
}

/// Rule evaluation for a pair of profiles, before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchSignals {
    pub points: f64,
    pub reasons: Vec<String>,
    pub shared_interests: BTreeSet<String>,
    pub complementary_skills: BTreeSet<String>,
    pub match_types: BTreeSet<MatchType>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompatibilityScorer {
    weights: Weights,
}

impl CompatibilityScorer {
    pub fn new(weights: Weights) -> Self {
        Self { weights }
    }

    /// Rule-based compatibility of `candidate` for `requester`.
    /// Pure: the same pair always yields the same candidate.
    pub fn score(&self, requester: &Profile, candidate: &Profile) -> MatchCandidate {
        let signals = self.signals(requester, candidate);

        MatchCandidate {
            profile: candidate.clone(),
            score: signals.points.clamp(MIN_SCORE, MAX_SCORE),
            reasons: signals.reasons,
            shared_interests: signals.shared_interests,
            complementary_skills: signals.complementary_skills,
            match_types: signals.match_types,
        }
    }

    /// Evaluates every rule without collapsing into a score. Used directly by
    /// the similarity path to reconstruct match types for embedding hits.
    pub fn signals(&self, requester: &Profile, candidate: &Profile) -> MatchSignals {
        let mut signals = MatchSignals::default();

        self.score_preferences(&requester.preferences, &candidate.preferences, &mut signals);
        self.score_interests(requester, candidate, &mut signals);
        self.score_skills(requester, candidate, &mut signals);
        self.score_location(requester, candidate, &mut signals);

        signals
    }

    fn score_preferences(&self, ours: &Preferences, theirs: &Preferences, signals: &mut MatchSignals) {
        for match_type in MatchType::ALL {
            if !rule_applies(match_type, ours, theirs) {
                continue;
            }

            signals.points += self.rule_weight(match_type);
            signals.reasons.push(rule_reason(match_type).to_string());
            signals.match_types.insert(match_type);
        }
    }

    fn score_interests(&self, requester: &Profile, candidate: &Profile, signals: &mut MatchSignals) {
        let shared = shared_tags(&requester.interests, &candidate.interests);
        if shared.is_empty() {
            return;
        }

        signals.points += capped(
            shared.len(),
            self.weights.shared_interest,
            self.weights.shared_interest_cap,
        );
        signals.reasons.push(format!(
            "Shared interests: {}",
            shared.iter().cloned().collect::<Vec<_>>().join(", ")
        ));
        signals.shared_interests = shared;
    }

    fn score_skills(&self, requester: &Profile, candidate: &Profile, signals: &mut MatchSignals) {
        let shared = shared_tags(&requester.skills, &candidate.skills);
        if shared.is_empty() {
            return;
        }

        signals.points += capped(
            shared.len(),
            self.weights.shared_skill,
            self.weights.shared_skill_cap,
        );
        signals.reasons.push(format!(
            "Common skills: {}",
            shared.iter().cloned().collect::<Vec<_>>().join(", ")
        ));
        signals.complementary_skills = shared;
    }

    fn score_location(&self, requester: &Profile, candidate: &Profile, signals: &mut MatchSignals) {
        if !same_location(requester.location.as_deref(), candidate.location.as_deref()) {
            return;
        }

        signals.points += self.weights.location;
        signals.reasons.push(format!(
            "Both based in {}",
            candidate.location.as_deref().unwrap_or_default().trim()
        ));
    }

    fn rule_weight(&self, match_type: MatchType) -> f64 {
        match match_type {
            MatchType::Mentor | MatchType::Mentee => self.weights.mentorship,
            MatchType::InvestmentOpportunity | MatchType::Investor => self.weights.investment,
            MatchType::PotentialHire | MatchType::HiringManager => self.weights.hiring,
            MatchType::Collaborator => self.weights.collaboration,
            MatchType::DiscussionPartner => self.weights.discussion,
        }
    }
}

/// Scores with the canonical weights.
pub fn score_pair(requester: &Profile, candidate: &Profile) -> MatchCandidate {
    CompatibilityScorer::new(DEFAULT_WEIGHTS).score(requester, candidate)
}

fn rule_applies(match_type: MatchType, ours: &Preferences, theirs: &Preferences) -> bool {
    match match_type {
        MatchType::Mentor => ours.mentor && !theirs.mentor,
        MatchType::Mentee => !ours.mentor && theirs.mentor,
        MatchType::InvestmentOpportunity => ours.invest && !theirs.invest,
        MatchType::Investor => !ours.invest && theirs.invest,
        MatchType::PotentialHire => ours.hire && !theirs.hire,
        MatchType::HiringManager => !ours.hire && theirs.hire,
        MatchType::Collaborator => ours.collaborate && theirs.collaborate,
        MatchType::DiscussionPartner => ours.discuss && theirs.discuss,
    }
}

fn rule_reason(match_type: MatchType) -> &'static str {
    match match_type {
        MatchType::Mentor => "Can offer the mentorship you are looking for",
        MatchType::Mentee => "Is looking for mentorship you could provide",
        MatchType::InvestmentOpportunity => "Could be an investment opportunity for you",
        MatchType::Investor => "Is interested in investing",
        MatchType::PotentialHire => "Could be a fit for the roles you are hiring for",
        MatchType::HiringManager => "Is currently hiring",
        MatchType::Collaborator => "You are both open to collaboration",
        MatchType::DiscussionPartner => "You both enjoy discussing ideas",
    }
}

fn capped(count: usize, per_item: f64, cap: f64) -> f64 {
    (count as f64 * per_item).min(cap)
}
