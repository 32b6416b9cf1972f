use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::Duration;

/// Everything one crawl run produced.
///
/// `pages` holds the raw URLs that were fetched successfully, in visit
/// order; these are what the observer loads. `visited` and `failed` hold
/// normalized forms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlOutcome {
    pub base_url: String,
    pub pages: Vec<String>,
    pub visited: BTreeSet<String>,
    pub failed: BTreeSet<String>,
    pub elapsed: Duration,
}

impl CrawlOutcome {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            ..Default::default()
        }
    }

    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }
}
