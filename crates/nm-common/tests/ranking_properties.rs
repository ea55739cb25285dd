use std::collections::BTreeSet;
use std::sync::Arc;

use nm_common::{
    Preferences, Profile,
    api::{Algorithm, MatchingRequest, Strategy as MatchStrategy},
    config::EngineConfig,
    matching::{
        Category, CompatibilityScorer, MatchingEngine, filter_by_category, ranking::rank_profiles,
    },
    store::{InMemoryEmbeddingStore, InMemoryProfileStore},
};
use proptest::prelude::*;

const TAGS: &[&str] = &["rust", "go", "design", "climate", "fintech", "music"];
const CITIES: &[&str] = &["Berlin", "Lisbon", "Osaka"];

fn tag_set() -> impl Strategy<Value = BTreeSet<String>> {
    proptest::sample::subsequence(TAGS, 0..=TAGS.len())
        .prop_map(|tags| tags.into_iter().map(str::to_string).collect())
}

fn preferences() -> impl Strategy<Value = Preferences> {
    any::<[bool; 5]>().prop_map(|[mentor, invest, discuss, collaborate, hire]| Preferences {
        mentor,
        invest,
        discuss,
        collaborate,
        hire,
    })
}

fn profile(id: String) -> impl Strategy<Value = Profile> {
    (
        tag_set(),
        tag_set(),
        proptest::option::of(proptest::sample::select(CITIES)),
        preferences(),
        0u32..20,
    )
        .prop_map(move |(skills, interests, city, preferences, connections)| Profile {
            id: id.clone(),
            name: id.to_uppercase(),
            location: city.map(str::to_string),
            skills,
            interests,
            preferences,
            connections,
            ..Profile::default()
        })
}

fn network() -> impl Strategy<Value = (Profile, Vec<Profile>)> {
    (1usize..12).prop_flat_map(|size| {
        let others: Vec<_> = (0..size).map(|i| profile(format!("u{i:02}"))).collect();
        (profile("me".to_string()), others)
    })
}

fn category() -> impl Strategy<Value = Category> {
    proptest::sample::select(vec![
        Category::All,
        Category::Mentorship,
        Category::Collaboration,
        Category::Investment,
        Category::Hiring,
        Category::Discussion,
    ])
}

proptest! {
    #[test]
    fn scores_stay_in_range_and_scoring_is_pure((me, others) in network()) {
        let scorer = CompatibilityScorer::default();
        for other in &others {
            let first = scorer.score(&me, other);
            let second = scorer.score(&me, other);

            prop_assert!((0.0..=100.0).contains(&first.score));
            prop_assert_eq!(first, second);
        }
    }

    #[test]
    fn ranking_excludes_requester_and_is_ordered(
        (me, mut others) in network(),
        min_score in 0.0f64..60.0,
    ) {
        others.push(me.clone());
        let ranked = rank_profiles(&CompatibilityScorer::default(), &me, &others, min_score);

        prop_assert!(ranked.iter().all(|c| c.profile.id != me.id));
        prop_assert!(ranked.iter().all(|c| c.score >= min_score));
        for pair in ranked.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            prop_assert!(a.score >= b.score);
            if a.score == b.score {
                prop_assert!(
                    a.profile.connections > b.profile.connections
                        || (a.profile.connections == b.profile.connections
                            && a.profile.id < b.profile.id)
                );
            }
        }
    }

    #[test]
    fn category_filter_never_expands((me, others) in network(), category in category()) {
        let ranked = rank_profiles(&CompatibilityScorer::default(), &me, &others, 0.0);
        let before = ranked.len();
        let filtered = filter_by_category(ranked, category);

        prop_assert!(filtered.len() <= before);
        if category.is_all() {
            prop_assert_eq!(filtered.len(), before);
        }
    }

    #[test]
    fn requests_without_embeddings_never_report_rag(
        (me, mut others) in network(),
        rag in any::<bool>(),
        max_results in 1i64..=50,
        min_compatibility in 10i64..=100,
        category in category(),
    ) {
        others.push(me.clone());
        let engine = MatchingEngine::new(
            Arc::new(InMemoryProfileStore::new(others)),
            Arc::new(InMemoryEmbeddingStore::default()),
            EngineConfig::default(),
        );
        let request = MatchingRequest {
            strategy: if rag { MatchStrategy::Rag } else { MatchStrategy::Traditional },
            category,
            max_results,
            min_compatibility,
            ..MatchingRequest::new("me")
        };

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let response = runtime.block_on(engine.run(&request)).unwrap();

        prop_assert_ne!(response.algorithm, Algorithm::Rag);
        prop_assert!(response.matches.iter().all(|m| m.profile.id != "me"));
        prop_assert!(response.matches.len() <= response.total_found.min(max_results as usize));
    }
}
