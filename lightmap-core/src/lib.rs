pub mod artifact;
pub mod config;
pub mod geocode;
pub mod map;
pub mod model;
pub mod report;
pub mod scrape;

use colored::Colorize;

pub use artifact::ArtifactError;
pub use config::{ConfigError, PipelineConfig};
pub use model::{LighthouseDataset, LighthouseRecord, LighthouseStatus, RawNameList, Resolution};

const BANNER: &str = r"
   _ _       _     _
  | (_) __ _| |__ | |_ _ __ ___   __ _ _ __
  | | |/ _` | '_ \| __| '_ ` _ \ / _` | '_ \
  | | | (_| | | | | |_| | | | | | (_| | |_) |
  |_|_|\__, |_| |_|\__|_| |_| |_|\__,_| .__/
       |___/                          |_|
";

pub fn print_banner() {
    println!("{}", BANNER.bright_yellow().bold());
    println!(
        "  {} {}\n",
        "scrape, geocode and map lighthouses".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
