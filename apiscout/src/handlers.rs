use crate::server::{ExtractState, serve};
use anyhow::Context;
use apiscout_core::discover::{
    DiscoveryOptions, execute_browser_observe, execute_crawl, execute_discovery,
};
use apiscout_core::merge::merge_responses;
use apiscout_core::report::{ReportFormat, generate_text_report, render_report, save_report};
use apiscout_scanner::normalize::validate_base_url;
use apiscout_scanner::{ApiObserver, CrawlConfig, ObserverConfig};
use clap::ArgMatches;
use colored::Colorize;
use std::fs;
use std::io::{self, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Install the stderr log subscriber. `RUST_LOG` wins over `--verbose`.
pub fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

// Helper functions for argument handling

/// Load page URLs from either a file or the repeated --url argument
pub fn load_urls_from_source(
    urls: &[String],
    hosts_file: Option<&PathBuf>,
) -> Result<Vec<String>, String> {
    if let Some(hosts_file_path) = hosts_file {
        load_urls_from_file(hosts_file_path)
    } else if !urls.is_empty() {
        Ok(urls
            .iter()
            .filter_map(|url| parse_url_line(url.trim()))
            .collect())
    } else {
        Err("Either --url or --hosts-file must be provided".to_string())
    }
}

/// Load and parse URLs from a file, skipping blank lines and `#` comments
pub fn load_urls_from_file(path: &Path) -> Result<Vec<String>, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read hosts file {}: {}", path.display(), e))?;

    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(parse_url_line)
        .collect();

    if urls.is_empty() {
        return Err(format!("No valid URLs found in {}", path.display()));
    }

    Ok(urls)
}

/// Parse a single line as a page URL, trying to add http:// if needed
pub fn parse_url_line(line: &str) -> Option<String> {
    if validate_base_url(line).is_ok() {
        return Some(line.to_string());
    }

    let with_scheme = format!("http://{}", line);
    if validate_base_url(&with_scheme).is_ok() {
        return Some(with_scheme);
    }

    eprintln!("{} Skipping invalid URL '{}'", "⚠".yellow(), line);
    None
}

/// Check a user-supplied base URL; the trimmed input is kept verbatim
/// because it doubles as the crawl's scope prefix.
pub fn validate_domain(input: &str) -> Result<String, String> {
    let trimmed = input.trim();
    let parsed = validate_base_url(trimmed).map_err(|e| e.to_string())?;

    if let Some(canonical) = scope_rewritten(trimmed, &parsed) {
        warn!(
            "'{}' is written as '{}' in resolved links; nothing will match it as a prefix, use the second form",
            trimmed, canonical
        );
    }
    Ok(trimmed.to_string())
}

/// The serialized form of `parsed` when it no longer starts with `input`
/// (upper-case host, default port, ...). Discovered links are always in
/// serialized form, so such an input puts every link out of scope.
pub fn scope_rewritten(input: &str, parsed: &Url) -> Option<String> {
    (!parsed.as_str().starts_with(input)).then(|| parsed.as_str().to_string())
}

pub fn crawl_config_from(args: &ArgMatches) -> CrawlConfig {
    let mut config = CrawlConfig::default();
    if let Some(millis) = args.get_one::<u64>("delay-ms") {
        config.delay = Duration::from_millis(*millis);
    }
    if let Some(secs) = args.get_one::<u64>("timeout") {
        config.request_timeout = Duration::from_secs(*secs);
    }
    config.max_pages = args.get_one::<usize>("max-pages").copied();
    config
}

pub fn observer_config_from(args: &ArgMatches) -> ObserverConfig {
    let mut config = ObserverConfig::default();
    if let Some(millis) = args.get_one::<u64>("idle-ms") {
        config.idle_window = Duration::from_millis(*millis);
    }
    if let Some(secs) = args.get_one::<u64>("nav-timeout") {
        config.navigation_timeout = Duration::from_secs(*secs);
    }
    config.headless = !args.get_flag("headful");
    config.chrome_path = args.get_one::<PathBuf>("chrome-path").cloned();
    config
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> io::Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_string())
}

pub fn prompt_for_domain() -> io::Result<String> {
    print_prompt("Enter the domain to crawl (e.g., https://example.com):")
}

// ============================================================================
// Subcommand handlers
// ============================================================================

pub async fn handle_discover(args: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let input = match args.get_one::<String>("url") {
        Some(url) => url.clone(),
        None => prompt_for_domain().context("Failed to read the domain from stdin")?,
    };

    let base_url = match validate_domain(&input) {
        Ok(url) => url,
        Err(e) => {
            println!("{} {}", "✗".red().bold(), e);
            return Ok(());
        }
    };

    let mut options = DiscoveryOptions::new(base_url.clone());
    options.crawl = crawl_config_from(args);
    options.observer = observer_config_from(args);
    options.show_progress_bars = !quiet;

    if !quiet {
        println!("\n{} Discovering API endpoints under {}\n", "→".blue(), base_url.bright_white());
    }

    let report = execute_discovery(options, None).await?;

    let format = args
        .get_one::<String>("format")
        .and_then(|f| ReportFormat::from_str(f))
        .unwrap_or(ReportFormat::Text);

    match args.get_one::<String>("output") {
        Some(output) => {
            let expanded = shellexpand::tilde(output);
            let path = Path::new(expanded.as_ref());
            let rendered = render_report(&report, &format)?;
            save_report(&rendered, path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            print!("{}", generate_text_report(&report));
            println!(
                "{} Report saved to {}",
                "✓".green().bold(),
                path.display().to_string().bright_white()
            );
        }
        None => print!("{}", render_report(&report, &format)?),
    }

    Ok(())
}

pub async fn handle_crawl(args: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let input = args
        .get_one::<String>("url")
        .context("--url is required")?;
    let base_url = validate_domain(input).map_err(anyhow::Error::msg)?;

    let outcome = execute_crawl(&base_url, crawl_config_from(args), !quiet).await?;

    print_divider();
    println!("{}", "  CRAWLED URLS".bright_white().bold());
    print_divider();
    for url in &outcome.visited {
        println!("{}", url);
    }
    println!();
    println!(
        "{} {} URLs crawled in {:.2} seconds",
        "✓".green().bold(),
        outcome.visited_count().to_string().cyan(),
        outcome.elapsed.as_secs_f64()
    );
    if outcome.failed_count() > 0 {
        println!(
            "{} {} URLs failed",
            "⚠".yellow().bold(),
            outcome.failed_count().to_string().yellow()
        );
    }

    if let Some(endpoint) = args.get_one::<String>("post-to") {
        post_crawled_pages(endpoint, &outcome.pages).await?;
    }

    Ok(())
}

/// Hand the crawled pages to a running extraction service and print its answer.
async fn post_crawled_pages(endpoint: &str, pages: &[String]) -> anyhow::Result<()> {
    println!();
    println!(
        "{} Sending {} pages to {}",
        "→".blue(),
        pages.len(),
        endpoint.bright_white()
    );

    let response = reqwest::Client::new()
        .post(endpoint)
        .json(pages)
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", endpoint))?;

    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .with_context(|| format!("{} did not answer with JSON", endpoint))?;

    if !status.is_success() {
        anyhow::bail!("{} answered {}: {}", endpoint, status, body);
    }

    println!("{}", serde_json::to_string_pretty(&body)?);
    Ok(())
}

pub async fn handle_observe(args: &ArgMatches, quiet: bool) -> anyhow::Result<()> {
    let urls: Vec<String> = args
        .get_many::<String>("url")
        .map(|values| values.cloned().collect())
        .unwrap_or_default();
    let hosts_file = args.get_one::<PathBuf>("hosts-file");

    let pages = load_urls_from_source(&urls, hosts_file).map_err(anyhow::Error::msg)?;
    let domain = match args.get_one::<String>("domain") {
        Some(domain) => domain.clone(),
        None => pages.first().cloned().unwrap_or_default(),
    };

    let observations = execute_browser_observe(observer_config_from(args), &pages, !quiet).await?;

    print_divider();
    println!("{}", "  OBSERVED PAGES".bright_white().bold());
    print_divider();
    for (page, observation) in &observations {
        println!(
            "{}  {} requests, {} responses",
            page,
            observation.requests.len().to_string().cyan(),
            observation.responses.len().to_string().cyan()
        );
    }

    println!();
    println!("{}", "Filtered and Combined Responses:".bright_white().bold());
    for url in merge_responses(&observations, &domain) {
        println!("{}", url);
    }

    Ok(())
}

pub async fn handle_serve(args: &ArgMatches) -> anyhow::Result<()> {
    let host = args
        .get_one::<String>("host")
        .context("--host has a default")?;
    let port = *args
        .get_one::<u16>("port")
        .context("--port has a default")?;
    let page = args
        .get_one::<String>("page")
        .context("--page has a default")?;

    let page_url = validate_domain(page).map_err(anyhow::Error::msg)?;
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;

    let observer = ApiObserver::with_config(observer_config_from(args));
    serve(addr, Arc::new(ExtractState::new(observer, page_url))).await
}
