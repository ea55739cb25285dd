use std::collections::{BTreeMap, BTreeSet};

use unicode_normalization::UnicodeNormalization;

/// Normalizes a skill, interest or location for comparison (NFKC, trimmed, lowercase,
/// inner whitespace collapsed). Returns `None` for blank input.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let folded: String = raw.nfkc().collect::<String>().to_lowercase();
    let collapsed = folded.split_whitespace().collect::<Vec<_>>().join(" ");

    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed)
    }
}

/// Intersection of two tag sets compared in normalized form.
/// The returned values keep the spelling used in `theirs`.
pub fn shared_tags(ours: &BTreeSet<String>, theirs: &BTreeSet<String>) -> BTreeSet<String> {
    let ours: BTreeSet<String> = ours.iter().filter_map(|tag| normalize_tag(tag)).collect();
    if ours.is_empty() {
        return BTreeSet::new();
    }

    // First spelling wins when several of theirs normalize to the same key.
    let mut by_key: BTreeMap<String, &String> = BTreeMap::new();
    for tag in theirs {
        if let Some(key) = normalize_tag(tag) {
            by_key.entry(key).or_insert(tag);
        }
    }

    by_key
        .into_iter()
        .filter(|(key, _)| ours.contains(key))
        .map(|(_, original)| original.clone())
        .collect()
}

pub fn same_location(a: Option<&str>, b: Option<&str>) -> bool {
    match (a.and_then(normalize_tag), b.and_then(normalize_tag)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}
