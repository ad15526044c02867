//! Show command - print a previously written table.

use std::path::PathBuf;

use clap::Args;
use console::style;

use docket_core::{DocumentFile, TableCodec};

use super::config;

/// Arguments for the show command.
#[derive(Args)]
pub struct ShowArgs {
    /// Table file written by `process`
    #[arg(required = true)]
    table: PathBuf,

    /// Keep the header row as an entry with an empty value
    #[arg(long)]
    include_header: bool,

    /// Print JSON instead of aligned text
    #[arg(long)]
    json: bool,
}

pub async fn run(args: ShowArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = config::load(config_path)?;
    let codec = TableCodec::from_config(&config.output);

    if !args.table.exists() {
        anyhow::bail!("Table not found: {}", args.table.display());
    }

    let table = DocumentFile::open(&args.table)?;

    let mut data = codec.read(&table)?;
    if !args.include_header {
        data = data.into_iter().skip(1).collect();
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if data.is_empty() {
        eprintln!("{} {} has no entries", style("ℹ").blue(), table.name());
        return Ok(());
    }

    let width = data.keys().map(|k| k.chars().count()).max().unwrap_or(0);
    for (key, value) in data.iter() {
        println!("{:<width$}  {}", key, value, width = width);
    }

    Ok(())
}
