use apiscout::commands::command_argument_builder;
use apiscout::handlers::{
    handle_crawl, handle_discover, handle_observe, handle_serve, init_logging,
};
use apiscout_core::print_banner;
use colored::Colorize;

#[tokio::main]
async fn main() {
    let cmd = command_argument_builder();
    let chosen_command = cmd.get_matches();
    let quiet = chosen_command.get_flag("quiet");
    let verbose = chosen_command.get_flag("verbose");

    init_logging(verbose);

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    let result = match chosen_command.subcommand() {
        Some(("discover", primary_command)) => handle_discover(primary_command, quiet).await,
        Some(("crawl", primary_command)) => handle_crawl(primary_command, quiet).await,
        Some(("observe", primary_command)) => handle_observe(primary_command, quiet).await,
        Some(("serve", primary_command)) => handle_serve(primary_command).await,
        // No subcommand provided, just show the banner
        None => return,
        _ => unreachable!("clap should ensure we don't get here"),
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}
