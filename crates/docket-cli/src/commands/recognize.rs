//! Recognize command - run OCR on an image without extracting keywords.

use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::info;

use docket_core::{DocumentFile, OcrAdapter};

use super::config;

/// Arguments for the recognize command.
#[derive(Args)]
pub struct RecognizeArgs {
    /// Raster image (png, jpg or jpeg)
    #[arg(required = true)]
    input: PathBuf,

    /// Read the image as a single line of text
    #[arg(long)]
    line: bool,

    /// Print every token, empty rows included, as JSON
    #[arg(long, conflicts_with = "line")]
    json: bool,
}

pub async fn run(args: RecognizeArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = config::load(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let doc = DocumentFile::open(&args.input)?;
    let adapter = OcrAdapter::from_config(&config.ocr);

    if args.line {
        println!("{}", adapter.recognize_line(&doc)?);
        return Ok(());
    }

    let result = adapter.recognize(&doc)?;
    info!("{} tokens in {}ms", result.tokens.len(), result.processing_time_ms);

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.tokens)?);
        return Ok(());
    }

    let words: Vec<&str> = result.texts().into_iter().filter(|t| !t.is_empty()).collect();
    if words.is_empty() {
        eprintln!("{} No text recognized in {}", style("ℹ").blue(), doc.name());
    }
    for word in words {
        println!("{}", word);
    }

    Ok(())
}
