// Report generation for discovery runs

use apiscout_scanner::{CrawlOutcome, ObservationMap};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryReport {
    pub target: String,
    /// Normalized URLs of every page crawled successfully
    pub crawled_pages: Vec<String>,
    pub failed_pages: Vec<String>,
    pub crawl_seconds: f64,
    pub observations: ObservationMap,
    /// Sorted, deduplicated responses under `target`
    pub endpoints: Vec<String>,
}

impl DiscoveryReport {
    pub fn new(
        target: String,
        outcome: &CrawlOutcome,
        observations: ObservationMap,
        endpoints: Vec<String>,
    ) -> Self {
        Self {
            target,
            crawled_pages: outcome.visited.iter().cloned().collect(),
            failed_pages: outcome.failed.iter().cloned().collect(),
            crawl_seconds: outcome.elapsed.as_secs_f64(),
            observations,
            endpoints,
        }
    }

    pub fn total_requests(&self) -> usize {
        self.observations.values().map(|o| o.requests.len()).sum()
    }

    pub fn total_responses(&self) -> usize {
        self.observations.values().map(|o| o.responses.len()).sum()
    }
}

fn group_by_host(urls: &[String]) -> BTreeMap<String, Vec<&String>> {
    let mut by_host: BTreeMap<String, Vec<&String>> = BTreeMap::new();
    for url in urls {
        let host = Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        by_host.entry(host).or_default().push(url);
    }
    by_host
}

pub fn generate_text_report(report: &DiscoveryReport) -> String {
    let mut out = String::new();

    out.push_str("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    out.push_str("# Summary:\n");
    out.push_str(&format!("  Target: {}\n", report.target));
    out.push_str(&format!("  Pages crawled: {}\n", report.crawled_pages.len()));
    out.push_str(&format!("  Pages failed: {}\n", report.failed_pages.len()));
    out.push_str(&format!("  Crawl time: {:.2} seconds\n", report.crawl_seconds));
    out.push_str(&format!("  Pages observed: {}\n", report.observations.len()));
    out.push_str(&format!("  API requests seen: {}\n", report.total_requests()));
    out.push_str(&format!("  API responses seen: {}\n", report.total_responses()));
    out.push_str(&format!("  Endpoints under target: {}\n", report.endpoints.len()));

    out.push_str("\n━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n\n");
    out.push_str("## Crawled URLs:\n");
    for url in &report.crawled_pages {
        out.push_str(&format!("  {}\n", url));
    }

    if !report.failed_pages.is_empty() {
        out.push_str("\n## Failed URLs:\n");
        for url in &report.failed_pages {
            out.push_str(&format!("  {}\n", url));
        }
    }

    out.push_str("\n## Filtered and Combined Responses:\n");
    if report.endpoints.is_empty() {
        out.push_str("  (none)\n");
    }
    for (host, urls) in group_by_host(&report.endpoints) {
        out.push_str(&format!("\n  {}\n", host));
        out.push_str(&format!("  {}\n", "─".repeat(host.len())));
        for url in urls {
            out.push_str(&format!("  {}\n", url));
        }
    }
    out.push('\n');

    out
}

pub fn generate_json_report(report: &DiscoveryReport) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "apiscout",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": chrono::Utc::now().to_rfc3339(),
                "format": "json"
            },
            "target": report.target,
            "summary": {
                "pages_crawled": report.crawled_pages.len(),
                "pages_failed": report.failed_pages.len(),
                "crawl_seconds": report.crawl_seconds,
                "pages_observed": report.observations.len(),
                "api_requests": report.total_requests(),
                "api_responses": report.total_responses(),
                "endpoints": report.endpoints.len()
            },
            "crawled_pages": report.crawled_pages,
            "failed_pages": report.failed_pages,
            "observations": report.observations,
            "endpoints": report.endpoints
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn render_report(report: &DiscoveryReport, format: &ReportFormat) -> Result<String, serde_json::Error> {
    match format {
        ReportFormat::Text => Ok(generate_text_report(report)),
        ReportFormat::Json => generate_json_report(report),
    }
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}
