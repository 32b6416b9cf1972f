use clap::{ArgAction, arg, command};
use std::path::PathBuf;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("apiscout")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("apiscout")
        .about("Crawl a site, load every page in headless Chromium, and list the API endpoints it calls")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-v --"verbose" "Log every link decision (same as RUST_LOG=debug)")
                .required(false)
                .global(true),
        )
        .subcommand_required(false)
        .subcommand(report_args(observer_args(crawl_args(
            command!("discover")
                .about(
                    "Crawl a site, then observe the XHR/fetch traffic of every crawled page. \
                Prompts for the site when --url is omitted.",
                )
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("Base URL; only links starting with it are followed"),
                ),
        ))))
        .subcommand(crawl_args(
            command!("crawl")
                .about("Crawl a site and list every page reached, without launching a browser")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(true)
                        .help("Base URL; only links starting with it are followed"),
                )
                .arg(
                    arg!(--"post-to" <ENDPOINT>)
                        .required(false)
                        .help(
                            "POST the crawled pages as a JSON array to a running `apiscout serve` \
                        (e.g. http://127.0.0.1:3000/extract-urls)",
                        ),
                ),
        ))
        .subcommand(observer_args(
            command!("observe")
                .about("Observe the XHR/fetch traffic of an explicit list of pages")
                .arg(
                    arg!(-u --"url" <URL>)
                        .required(false)
                        .help("A page to observe; may be repeated")
                        .action(ArgAction::Append)
                        .conflicts_with("hosts-file"),
                )
                .arg(
                    arg!(-H --"hosts-file" <PATH>)
                        .required(false)
                        .help("Path to a newline-delimited file of page URLs")
                        .value_parser(clap::value_parser!(PathBuf))
                        .conflicts_with("url"),
                )
                .arg(
                    arg!(-d --"domain" <PREFIX>)
                        .required(false)
                        .help("Keep only endpoints starting with this prefix (default: the first page)"),
                ),
        ))
        .subcommand(observer_args(
            command!("serve")
                .about("Serve /extract-urls over HTTP")
                .arg(
                    arg!(--"host" <HOST>)
                        .required(false)
                        .help("Address to bind")
                        .default_value("127.0.0.1"),
                )
                .arg(
                    arg!(-p --"port" <PORT>)
                        .required(false)
                        .help("Port to listen on")
                        .value_parser(clap::value_parser!(u16))
                        .default_value("3000"),
                )
                .arg(
                    arg!(--"page" <URL>)
                        .required(false)
                        .help("Page observed by GET /extract-urls, also the filter prefix")
                        .default_value(crate::server::DEFAULT_PAGE_URL),
                ),
        ))
}

fn crawl_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(--"delay-ms" <MILLIS>)
            .required(false)
            .help("Pause after every fetched page (default: 1000)")
            .value_parser(clap::value_parser!(u64)),
    )
    .arg(
        arg!(--"timeout" <SECONDS>)
            .required(false)
            .help("Per-request timeout in seconds (default: 10)")
            .value_parser(clap::value_parser!(u64)),
    )
    .arg(
        arg!(--"max-pages" <COUNT>)
            .required(false)
            .help("Stop after this many pages have been fetched (default: unlimited)")
            .value_parser(clap::value_parser!(usize)),
    )
}

fn observer_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(--"idle-ms" <MILLIS>)
            .required(false)
            .help("Quiet period with no XHR/fetch in flight before a page counts as loaded (default: 500)")
            .value_parser(clap::value_parser!(u64)),
    )
    .arg(
        arg!(--"nav-timeout" <SECONDS>)
            .required(false)
            .help("Upper bound for loading one page (default: 30)")
            .value_parser(clap::value_parser!(u64)),
    )
    .arg(
        arg!(--"headful")
            .required(false)
            .help("Show the browser window")
            .action(ArgAction::SetTrue),
    )
    .arg(
        arg!(--"chrome-path" <PATH>)
            .required(false)
            .help("Chrome/Chromium executable (default: $CHROMIUM_PATH, then well-known locations)")
            .value_parser(clap::value_parser!(PathBuf)),
    )
}

fn report_args(cmd: clap::Command) -> clap::Command {
    cmd.arg(
        arg!(-o --"output" <PATH>)
            .required(false)
            .help("Save report to file (default: display to screen)"),
    )
    .arg(
        arg!(-f --"format" <FORMAT>)
            .required(false)
            .help("Report format: text, json")
            .value_parser(["text", "json"])
            .default_value("text"),
    )
}
