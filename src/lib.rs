pub mod audit;
pub mod classify;
pub mod cli;
pub mod io_utils;
pub mod normalize;
pub mod osm;
pub mod pipeline;
pub mod rules;
pub mod sample;
pub mod shape;
pub mod street;
pub mod table;

use std::{env, sync::OnceLock};

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;

use crate::cli::{Cli, Commands};

static LOGGER: OnceLock<()> = OnceLock::new();

fn init_logging() {
    LOGGER.get_or_init(|| {
        let mut builder = env_logger::Builder::from_env(env_logger::Env::default());
        if env::var("RUST_LOG").is_err() {
            builder.filter_module("osm_wrangle", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Shape(args) => pipeline::execute(&args),
        Commands::Audit(args) => audit::execute(&args),
        Commands::Sample(args) => sample::execute(&args),
    }
}
