use colored::Colorize;
use lightmap::{command_argument_builder, run};
use lightmap_core::print_banner;
use tracing_subscriber::EnvFilter;

fn init_tracing(quiet: bool) {
    let default_level = if quiet { "warn" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let chosen_command = command_argument_builder().get_matches();
    let quiet = chosen_command.get_flag("quiet");

    init_tracing(quiet);

    // Show banner unless --quiet flag is set
    if !quiet {
        print_banner();
    }

    if chosen_command.subcommand().is_none() {
        // No subcommand provided, just show the banner
        return;
    }

    if let Err(e) = run(&chosen_command).await {
        eprintln!("{} {}", "✗".red().bold(), e.to_string().red());
        for cause in e.chain().skip(1) {
            eprintln!("  {} {}", "caused by:".red(), cause);
        }
        std::process::exit(1);
    }
}
