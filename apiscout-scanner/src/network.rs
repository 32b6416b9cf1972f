use chromiumoxide::cdp::browser_protocol::network::ResourceType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Requests and responses seen while a single page was loading.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageObservation {
    pub requests: BTreeSet<String>,
    pub responses: BTreeSet<String>,
}

/// Observations keyed by the page URL that produced them.
pub type ObservationMap = BTreeMap<String, PageObservation>;

/// XHR and fetch are the only resource types treated as API traffic.
pub fn is_async_fetch(resource_type: &ResourceType) -> bool {
    matches!(resource_type, ResourceType::Xhr | ResourceType::Fetch)
}

/// One CDP network event, reduced to what the log needs.
#[derive(Debug, Clone)]
pub enum NetworkEvent {
    Request {
        id: String,
        url: String,
        resource_type: Option<ResourceType>,
    },
    /// `resource_type` is that of the request which produced the response.
    Response {
        url: String,
        resource_type: ResourceType,
    },
    /// loadingFinished or loadingFailed.
    Settled { id: String },
}

/// Bookkeeping for one page's network activity.
///
/// Tracks which XHR/fetch requests are still in flight so the observer can
/// tell when the page has gone quiet. Events arrive on separate CDP channels,
/// so a request may be settled before its start is recorded; such a request
/// never counts as in flight.
#[derive(Debug, Default)]
pub struct NetworkLog {
    observation: PageObservation,
    in_flight: HashSet<String>,
    settled: HashSet<String>,
    events: usize,
}

impl NetworkLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&mut self, request_id: &str, url: &str, resource_type: Option<&ResourceType>) {
        self.events += 1;
        if resource_type.is_some_and(is_async_fetch) {
            self.observation.requests.insert(url.to_string());
            if !self.settled.contains(request_id) {
                self.in_flight.insert(request_id.to_string());
            }
        }
    }

    /// `resource_type` is that of the request which produced the response.
    pub fn record_response(&mut self, url: &str, resource_type: &ResourceType) {
        self.events += 1;
        if is_async_fetch(resource_type) {
            self.observation.responses.insert(url.to_string());
        }
    }

    /// Called on both loadingFinished and loadingFailed.
    pub fn record_settled(&mut self, request_id: &str) {
        self.events += 1;
        self.in_flight.remove(request_id);
        self.settled.insert(request_id.to_string());
    }

    pub fn record(&mut self, event: NetworkEvent) {
        match event {
            NetworkEvent::Request {
                id,
                url,
                resource_type,
            } => self.record_request(&id, &url, resource_type.as_ref()),
            NetworkEvent::Response { url, resource_type } => {
                self.record_response(&url, &resource_type)
            }
            NetworkEvent::Settled { id } => self.record_settled(&id),
        }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    /// Total number of network events seen, API or not.
    pub fn event_count(&self) -> usize {
        self.events
    }

    pub fn into_observation(self) -> PageObservation {
        self.observation
    }
}
