pub mod browser;
pub mod crawler;
pub mod error;
pub mod network;
pub mod normalize;
pub mod observer;
pub mod result;

pub use crawler::{CrawlConfig, Crawler, ProgressCallback};
pub use error::ScanError;
pub use network::{NetworkEvent, NetworkLog, ObservationMap, PageObservation};
pub use observer::{ApiObserver, NetworkObserver, ObserveProgressCallback, ObserverConfig};
pub use result::CrawlOutcome;
