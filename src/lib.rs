pub mod cli;
pub mod db;
mod db_cmd;
pub mod diff;
mod diff_cmd;
pub mod error;
pub mod frame;
pub mod insert;
pub mod io_utils;
pub mod report;
pub mod schema;
pub mod sqlite;
pub mod table_def;
pub mod value;

pub use error::{Error, Result as CoreResult};

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
            builder.filter_module("datautils", LevelFilter::Info);
        }
        let _ = builder.format_timestamp_millis().try_init();
    });
}

pub fn run() -> Result<()> {
    init_logging();
    let cli = Cli::parse();
    match cli.command {
        Commands::Diff(args) => diff_cmd::execute_diff(&args),
        Commands::Dups(args) => diff_cmd::execute_dups(&args),
        Commands::Insert(args) => db_cmd::execute_insert(&args),
        Commands::Schema(args) => db_cmd::execute_schema(&args),
        Commands::Create(args) => db_cmd::execute_create(&args),
        Commands::Query(args) => db_cmd::execute_query(&args),
    }
}

pub(crate) fn printable_delimiter(delimiter: u8) -> String {
    match delimiter {
        b',' => ",".to_string(),
        b'\t' => "\\t".to_string(),
        b'\n' => "\\n".to_string(),
        other => (other as char).to_string(),
    }
}
