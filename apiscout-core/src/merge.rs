//! Collapse per-page observations into a single endpoint list.

use apiscout_scanner::ObservationMap;
use std::collections::BTreeSet;

/// Union of every page's responses that start with `domain`, sorted.
pub fn merge_responses(observations: &ObservationMap, domain: &str) -> Vec<String> {
    observations
        .values()
        .flat_map(|observation| observation.responses.iter())
        .filter(|url| url.starts_with(domain))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Like [`merge_responses`] but folds requests in as well. This is what the
/// single-page extraction endpoint reports.
pub fn merge_all(observations: &ObservationMap, domain: &str) -> Vec<String> {
    observations
        .values()
        .flat_map(|observation| observation.requests.iter().chain(observation.responses.iter()))
        .filter(|url| url.starts_with(domain))
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
