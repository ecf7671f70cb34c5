use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::audit::AuditField;

#[derive(Debug, Parser)]
#[command(
    author,
    version,
    about = "Audit, clean and flatten OpenStreetMap XML exports",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Normalize an OSM export and write node/way tables as CSV
    Shape(ShapeArgs),
    /// Report invalid postcodes or value frequencies for an address field
    Audit(AuditArgs),
    /// Write a small and a medium sample of an OSM export
    Sample(SampleArgs),
}

#[derive(Debug, Args)]
pub struct ShapeArgs {
    /// OSM XML file to shape ('-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Directory receiving nodes.csv, nodes_tags.csv, ways.csv, ways_nodes.csv and ways_tags.csv
    #[arg(short = 'o', long = "output-dir")]
    pub output_dir: PathBuf,
    /// YAML file overriding the built-in normalization tables
    #[arg(short, long)]
    pub rules: Option<PathBuf>,
    /// Stop after this many top-level elements
    #[arg(long)]
    pub limit: Option<usize>,
    /// Abort on the first malformed element instead of skipping it
    #[arg(long = "fail-on-malformed")]
    pub fail_on_malformed: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
#[value(rename_all = "kebab-case")]
pub enum AuditFormat {
    #[default]
    Table,
    Json,
}

#[derive(Debug, Args)]
pub struct AuditArgs {
    /// OSM XML file to audit ('-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Address field to audit: postcode, street, or any other addr:* field (state, city, ...)
    #[arg(short = 'f', long = "field")]
    pub field: AuditField,
    /// YAML file overriding the built-in normalization tables
    #[arg(short, long)]
    pub rules: Option<PathBuf>,
    /// Maximum rows to display (0 = all)
    #[arg(long, default_value_t = 0)]
    pub top: usize,
    /// Output format
    #[arg(long, value_enum, default_value = "table")]
    pub format: AuditFormat,
}

#[derive(Debug, Args)]
pub struct SampleArgs {
    /// Full OSM XML file to sample ('-' for stdin)
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Destination of the small sample
    #[arg(long)]
    pub small: PathBuf,
    /// Destination of the medium sample
    #[arg(long)]
    pub medium: PathBuf,
    /// Keep every k-th element in the small sample
    #[arg(short = 'k', long = "small-every", default_value_t = 1000, value_parser = parse_ratio)]
    pub small_every: usize,
    /// Keep every m-th element in the medium sample
    #[arg(short = 'm', long = "medium-every", default_value_t = 10, value_parser = parse_ratio)]
    pub medium_every: usize,
}

pub fn parse_ratio(value: &str) -> Result<usize, String> {
    let ratio = value
        .trim()
        .parse::<usize>()
        .map_err(|err| format!("Invalid ratio '{value}': {err}"))?;
    if ratio == 0 {
        return Err("Ratio must be at least 1".to_string());
    }
    Ok(ratio)
}
