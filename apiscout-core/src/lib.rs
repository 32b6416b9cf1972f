pub mod discover;
pub mod merge;
pub mod report;

pub use discover::{
    DiscoveryOptions, DiscoveryProgressCallback, execute_browser_observe, execute_crawl,
    execute_discovery, execute_discovery_with, execute_observe,
};
pub use merge::{merge_all, merge_responses};
pub use report::{DiscoveryReport, ReportFormat};

pub fn print_banner() {
    println!(
        r#"
   __ _ _ __ (_)___  ___ ___  _   _| |_
  / _` | '_ \| / __|/ __/ _ \| | | | __|
 | (_| | |_) | \__ \ (_| (_) | |_| | |_
  \__,_| .__/|_|___/\___\___/ \__,_|\__|
       |_|          v{}
"#,
        env!("CARGO_PKG_VERSION")
    );
}
