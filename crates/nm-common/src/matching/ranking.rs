use std::cmp::Ordering;

use super::scoring::{CompatibilityScorer, MatchCandidate};
use crate::Profile;

/// Score descending, then connections descending, then id ascending.
pub fn compare_candidates(a: &MatchCandidate, b: &MatchCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.profile.connections.cmp(&a.profile.connections))
        .then_with(|| a.profile.id.cmp(&b.profile.id))
}

pub fn sort_candidates(candidates: &mut [MatchCandidate]) {
    candidates.sort_by(compare_candidates);
}

/// Scores every profile against the requester, drops the requester itself and
/// anything under `min_score`, and returns the survivors in ranking order.
pub fn rank_profiles(
    scorer: &CompatibilityScorer,
    requester: &Profile,
    profiles: &[Profile],
    min_score: f64,
) -> Vec<MatchCandidate> {
    let mut ranked: Vec<_> = profiles
        .iter()
        .filter(|profile| profile.id != requester.id)
        .map(|profile| scorer.score(requester, profile))
        .filter(|candidate| candidate.score >= min_score)
        .collect();

    sort_candidates(&mut ranked);
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(id: &str, score: f64, connections: u32) -> MatchCandidate {
        MatchCandidate {
            profile: Profile {
                id: id.into(),
                connections,
                ..Profile::default()
            },
            score,
            reasons: vec![],
            shared_interests: Default::default(),
            complementary_skills: Default::default(),
            match_types: Default::default(),
        }
    }

    fn ids(candidates: &[MatchCandidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.profile.id.as_str()).collect()
    }

    #[test]
    fn ties_break_on_connections_then_id() {
        let mut list = vec![
            candidate("b", 70.0, 10),
            candidate("c", 70.0, 12),
            candidate("a", 70.0, 10),
            candidate("z", 90.0, 0),
        ];

        sort_candidates(&mut list);

        assert_eq!(ids(&list), vec!["z", "c", "a", "b"]);
    }

    #[test]
    fn ranking_is_independent_of_input_order() {
        let mut forward = vec![
            candidate("a", 40.0, 1),
            candidate("b", 40.0, 1),
            candidate("c", 55.0, 3),
        ];
        let mut reversed: Vec<_> = forward.iter().rev().cloned().collect();

        sort_candidates(&mut forward);
        sort_candidates(&mut reversed);

        assert_eq!(ids(&forward), ids(&reversed));
    }

    #[test]
    fn nan_scores_do_not_break_the_sort() {
        let mut list = vec![
            candidate("a", 40.0, 1),
            candidate("nan", f64::NAN, 0),
            candidate("b", 80.0, 1),
            candidate("c", 40.0, 5),
        ];

        sort_candidates(&mut list);

        let finite: Vec<_> = list
            .iter()
            .filter(|c| c.score.is_finite())
            .map(|c| c.profile.id.as_str())
            .collect();
        assert_eq!(finite, vec!["b", "c", "a"]);
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn rank_profiles_excludes_requester_and_low_scores() {
        let mut requester = Profile {
            id: "me".into(),
            ..Profile::default()
        };
        requester.preferences.mentor = true;

        let mut mentor = Profile {
            id: "mentor".into(),
            ..Profile::default()
        };
        mentor.preferences.mentor = false;

        let mut peer = Profile {
            id: "peer".into(),
            ..Profile::default()
        };
        peer.preferences.mentor = true;

        let ranked = rank_profiles(
            &CompatibilityScorer::default(),
            &requester,
            &[requester.clone(), mentor, peer],
            20.0,
        );

        assert_eq!(ids(&ranked), vec!["mentor"]);
    }
}
