use crate::CLAP_STYLING;
use clap::{arg, command};
use std::path::PathBuf;

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("lightmap")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("lightmap")
        .about("Scrape lighthouse listings, geocode them and draw a glowing map")
        .styles(CLAP_STYLING)
        .arg(
            arg!(-q --"quiet" "Suppress banner and non-essential output")
                .required(false)
                .global(true),
        )
        .arg(
            arg!(-c --"config" <PATH>)
                .required(false)
                .global(true)
                .help("Config file (default: ~/.config/lightmap/config.json)")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .subcommand_required(false)
        .subcommand(
            command!("init")
                .about("Writes a default configuration file")
                .arg(
                    arg!([PATH])
                        .required(false)
                        .help("Where to write the config file")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-f --"force")
                        .help("Overwrite an existing config file")
                        .required(false),
                ),
        )
        .subcommand(
            command!("scrape")
                .about(
                    "Scrape a lighthouse listing into a raw name list. A {state} placeholder \
                in the URL is expanded once per state.",
                )
                .arg(
                    arg!(<URL>)
                        .required(true)
                        .help("Listing page URL, e.g. https://www.lighthousefriends.com/list.asp?state={state}"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Raw name list to write (default: data/raw/lighthouses.json)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"layout" <LAYOUT>)
                        .required(false)
                        .help("Page layout (default: picked from the host)")
                        .value_parser(["auto", "uscg", "lighthousefriends"]),
                )
                .arg(
                    arg!(-s --"state" <STATE>)
                        .required(false)
                        .help("State code to substitute for {state}; repeatable (default: all)")
                        .action(clap::ArgAction::Append),
                )
                .arg(
                    arg!(--"keep-going")
                        .required(false)
                        .help("Skip pages that fail instead of aborting")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("geocode")
                .about("Resolve every name in a raw name list to coordinates")
                .arg(
                    arg!(-i --"input" <PATH>)
                        .required(false)
                        .help("Raw name list: scrape output, JSON array or one name per line")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Dataset to write (default: data/processed/lighthouses.json)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(--"provider" <PROVIDER>)
                        .required(false)
                        .help("Geocoding service (default: nominatim)")
                        .value_parser(["nominatim", "detail-page"]),
                )
                .arg(
                    arg!(--"endpoint" <URL>)
                        .required(false)
                        .help("Override the Nominatim search endpoint"),
                )
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("Number of concurrent lookup workers")
                        .value_parser(clap::value_parser!(usize)),
                )
                .arg(
                    arg!(--"delay-ms" <MILLIS>)
                        .required(false)
                        .help("Minimum spacing between requests")
                        .value_parser(clap::value_parser!(u64)),
                )
                .arg(
                    arg!(--"retries" <NUM>)
                        .required(false)
                        .help("Retries per name for transient failures")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    arg!(--"failures" <PATH>)
                        .required(false)
                        .help("Also write unresolved records to this file")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            command!("render")
                .about("Draw resolved lighthouses as a glowing map")
                .arg(
                    arg!(-i --"input" <PATH>)
                        .required(false)
                        .help("Geocoded dataset (default: data/processed/lighthouses.json)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Map file to write (default: maps/lighthouses.svg)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Output format (default: from the output extension)")
                        .value_parser(["svg", "png", "html"]),
                )
                .arg(
                    arg!(--"extent" <EXTENT>)
                        .required(false)
                        .help("Map area (default: conus)")
                        .value_parser(["conus", "world"]),
                )
                .arg(
                    arg!(--"no-glow")
                        .required(false)
                        .help("Draw plain markers without halos")
                        .action(clap::ArgAction::SetTrue),
                ),
        )
        .subcommand(
            command!("report")
                .about("Summarise how complete a geocoded dataset is")
                .arg(
                    arg!(-i --"input" <PATH>)
                        .required(false)
                        .help("Geocoded dataset (default: data/processed/lighthouses.json)")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .arg(
                    arg!(-f --"format" <FORMAT>)
                        .required(false)
                        .help("Report format: text, json")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    arg!(-o --"output" <PATH>)
                        .required(false)
                        .help("Save report to file (default: display to screen)")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
}
