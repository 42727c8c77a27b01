use anyhow::{Context, Result, bail};
use clap::ArgMatches;
use colored::Colorize;
use lightmap_core::artifact::{
    load_dataset, load_raw_names, save_dataset, save_raw_names, write_json,
};
use lightmap_core::config::{PipelineConfig, default_config_path};
use lightmap_core::geocode::{GeocodeProvider, build_geocoder, geocode_entries};
use lightmap_core::map::{MapExtent, MapOptions, OutputFormat, render_map, write_map};
use lightmap_core::model::LighthouseDataset;
use lightmap_core::report::{
    ReportFormat, gather_report_data, generate_json_report, generate_text_report, save_report,
};
use lightmap_core::scrape::{ScrapeOptions, execute_scrape};
use lightmap_scanner::crawler::STATE_PLACEHOLDER;
use lightmap_scanner::{ListingLayout, build_client};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use url::Url;

pub fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).as_ref())
}

/// Flags win over the configured path; `~` is expanded either way.
pub fn resolve_path(flag: Option<&PathBuf>, configured: &Path) -> PathBuf {
    expand_path(flag.map(PathBuf::as_path).unwrap_or(configured))
}

/// Map format precedence: `--format`, then the output extension, then the
/// config file, then SVG.
pub fn select_map_format(
    flag: Option<&str>,
    output: &Path,
    configured: Option<OutputFormat>,
) -> OutputFormat {
    flag.and_then(OutputFormat::from_str)
        .or_else(|| OutputFormat::from_path(output))
        .or(configured)
        .unwrap_or_default()
}

/// Reject listing URLs that cannot be fetched before any request is made.
pub fn validate_listing_url(url: &str) -> Result<()> {
    let probe = url.replace(STATE_PLACEHOLDER, "XX");
    let parsed = Url::parse(&probe).with_context(|| format!("Invalid listing URL '{}'", url))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("Invalid listing URL '{}': only http and https are supported", url);
    }
    Ok(())
}

fn print_success(quiet: bool, msg: String) {
    if !quiet {
        println!("{} {}", "✓".green().bold(), msg);
    }
}

fn print_step(quiet: bool, msg: String) {
    if !quiet {
        println!("{} {}", "→".blue(), msg);
    }
}

fn display(path: &Path) -> String {
    path.display().to_string().bright_white().to_string()
}

/// Dispatch a parsed command line.
pub async fn run(matches: &ArgMatches) -> Result<()> {
    let quiet = matches.get_flag("quiet");
    let config_path = matches.get_one::<PathBuf>("config");

    match matches.subcommand() {
        Some(("init", args)) => handle_init(args, config_path, quiet),
        Some((name, args)) => {
            let config = PipelineConfig::load(config_path.map(PathBuf::as_path))
                .context("Failed to load configuration")?;
            match name {
                "scrape" => handle_scrape(args, &config, quiet).await,
                "geocode" => handle_geocode(args, &config, quiet).await,
                "render" => handle_render(args, &config, quiet),
                "report" => handle_report(args, &config, quiet),
                _ => unreachable!("clap should ensure we don't get here"),
            }
        }
        None => Ok(()),
    }
}

pub fn handle_init(args: &ArgMatches, config_flag: Option<&PathBuf>, quiet: bool) -> Result<()> {
    let force = args.get_flag("force");
    let path = match args.get_one::<PathBuf>("PATH").or(config_flag) {
        Some(path) => expand_path(path),
        None => default_config_path(),
    };

    if path.exists() && !force {
        bail!(
            "Config file already exists at {} (use --force to overwrite)",
            path.display()
        );
    }

    print_step(quiet, format!("Writing default configuration to {}", display(&path)));
    PipelineConfig::default()
        .save(&path)
        .with_context(|| format!("Failed to write config to {}", path.display()))?;
    print_success(quiet, format!("Config written: {}", display(&path)));
    Ok(())
}

pub async fn handle_scrape(args: &ArgMatches, config: &PipelineConfig, quiet: bool) -> Result<()> {
    let url = args
        .get_one::<String>("URL")
        .context("A listing URL is required")?
        .trim()
        .to_string();
    validate_listing_url(&url)?;
    let output = resolve_path(args.get_one::<PathBuf>("output"), &config.paths.raw);

    let mut options = ScrapeOptions::new(url.clone());
    options.layout = args
        .get_one::<String>("layout")
        .and_then(|s| ListingLayout::from_str(s))
        .unwrap_or(config.scrape.layout);
    options.states = match args.get_many::<String>("state") {
        Some(states) => states.cloned().collect(),
        None => config.scrape.states.clone(),
    };
    options.keep_going = args.get_flag("keep-going") || config.scrape.keep_going;
    options.page_delay = Duration::from_millis(config.scrape.page_delay_ms);
    options.http = config.http_options();
    options.show_progress_bars = !quiet;

    print_step(
        quiet,
        format!(
            "Scraping {} ({} page(s), layout: {})",
            url.bright_white(),
            options.pages().len(),
            options.layout.as_str()
        ),
    );

    let result = execute_scrape(options)
        .await
        .with_context(|| format!("Failed to scrape {}", url))?;

    save_raw_names(&output, &result.names)
        .with_context(|| format!("Failed to write raw names to {}", output.display()))?;

    for (page, error) in &result.failed_pages {
        if !quiet {
            println!("{} Skipped {}: {}", "⚠".yellow().bold(), page, error);
        }
    }
    print_success(
        quiet,
        format!(
            "{} names from {} page(s) ({} duplicates dropped) -> {}",
            result.names.len().to_string().cyan(),
            result.pages_fetched,
            result.duplicates_dropped,
            display(&output)
        ),
    );
    Ok(())
}

pub async fn handle_geocode(args: &ArgMatches, config: &PipelineConfig, quiet: bool) -> Result<()> {
    let input = resolve_path(args.get_one::<PathBuf>("input"), &config.paths.raw);
    let output = resolve_path(args.get_one::<PathBuf>("output"), &config.paths.processed);

    let names = load_raw_names(&input)
        .with_context(|| format!("Failed to read raw names from {}", input.display()))?;
    if names.is_empty() {
        warn!("{} contains no names", input.display());
    }

    let provider = args
        .get_one::<String>("provider")
        .and_then(|s| GeocodeProvider::from_str(s))
        .unwrap_or(config.geocode.provider);

    let mut options = config.geocode_options();
    if let Some(&workers) = args.get_one::<usize>("threads") {
        options.workers = workers.max(1);
    }
    if let Some(&retries) = args.get_one::<u32>("retries") {
        options.max_retries = retries;
    }
    options.delay = args
        .get_one::<u64>("delay-ms")
        .copied()
        .or(config.geocode.delay_ms)
        .map(Duration::from_millis)
        .unwrap_or_else(|| provider.default_delay());
    options.show_progress_bars = !quiet;

    let endpoint = args
        .get_one::<String>("endpoint")
        .cloned()
        .or_else(|| config.geocode.endpoint.clone());
    let client = build_client(&config.http_options()).context("Failed to create HTTP client")?;
    let geocoder = build_geocoder(provider, client, endpoint.as_deref());

    print_step(
        quiet,
        format!(
            "Geocoding {} names via {} ({} worker(s), {}ms spacing)",
            names.len().to_string().cyan(),
            provider.as_str(),
            options.workers,
            options.delay.as_millis()
        ),
    );

    let dataset = geocode_entries(&names, geocoder, &options).await;
    save_dataset(&output, &dataset)
        .with_context(|| format!("Failed to write dataset to {}", output.display()))?;

    let unresolved: Vec<_> = dataset.unresolved().cloned().collect();
    if let Some(failures_path) = args.get_one::<PathBuf>("failures") {
        let failures_path = expand_path(failures_path);
        let failures = LighthouseDataset::new(dataset.source.clone(), unresolved.clone());
        write_json(&failures_path, &failures)
            .with_context(|| format!("Failed to write failures to {}", failures_path.display()))?;
        print_step(
            quiet,
            format!("{} unresolved -> {}", unresolved.len(), display(&failures_path)),
        );
    }

    print_success(
        quiet,
        format!(
            "Resolved {}/{} -> {}",
            dataset.resolved().count().to_string().green(),
            dataset.len(),
            display(&output)
        ),
    );
    if !unresolved.is_empty() && !quiet {
        println!(
            "{} {} names could not be geocoded (see `lightmap report`)",
            "⚠".yellow().bold(),
            unresolved.len()
        );
    }
    Ok(())
}

pub fn handle_render(args: &ArgMatches, config: &PipelineConfig, quiet: bool) -> Result<()> {
    let input = resolve_path(args.get_one::<PathBuf>("input"), &config.paths.processed);
    let output = resolve_path(args.get_one::<PathBuf>("output"), &config.paths.map);

    let dataset = load_dataset(&input)
        .with_context(|| format!("Failed to read dataset from {}", input.display()))?;

    let mut style = config.map.style.clone();
    if args.get_flag("no-glow") {
        style.glow_effect = false;
    }
    let options = MapOptions {
        format: select_map_format(
            args.get_one::<String>("format").map(String::as_str),
            &output,
            config.map.format,
        ),
        extent: args
            .get_one::<String>("extent")
            .and_then(|s| MapExtent::from_str(s))
            .unwrap_or(config.map.extent),
        style,
    };

    if OutputFormat::from_path(&output).is_some_and(|ext| ext != options.format) {
        warn!(
            "Writing {} output to {}",
            options.format.extension(),
            output.display()
        );
    }

    let rendered = render_map(&dataset, &options).context("Failed to render map")?;
    write_map(&output, &rendered)
        .with_context(|| format!("Failed to write map to {}", output.display()))?;

    let summary = rendered.summary;
    print_success(
        quiet,
        format!(
            "Plotted {}/{} lighthouses ({} unresolved, {} outside the {} extent) -> {}",
            summary.plotted.to_string().green(),
            summary.total,
            summary.unresolved,
            summary.out_of_extent,
            options.extent.as_str(),
            display(&output)
        ),
    );
    Ok(())
}

pub fn handle_report(args: &ArgMatches, config: &PipelineConfig, quiet: bool) -> Result<()> {
    let input = resolve_path(args.get_one::<PathBuf>("input"), &config.paths.processed);
    let format = args
        .get_one::<String>("format")
        .and_then(|s| ReportFormat::from_str(s))
        .unwrap_or(ReportFormat::Text);

    let dataset = load_dataset(&input)
        .with_context(|| format!("Failed to read dataset from {}", input.display()))?;
    let data = gather_report_data(&dataset);

    let report = match format {
        ReportFormat::Text => generate_text_report(&data),
        ReportFormat::Json => generate_json_report(&data).context("Failed to build JSON report")?,
    };

    match args.get_one::<PathBuf>("output") {
        Some(path) => {
            let path = expand_path(path);
            save_report(&report, &path)
                .with_context(|| format!("Failed to write report to {}", path.display()))?;
            print_success(quiet, format!("Report saved to {}", display(&path)));
        }
        None => print!("{}", report),
    }
    Ok(())
}
