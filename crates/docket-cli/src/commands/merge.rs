//! Merge command - concatenate PDF files.

use std::path::PathBuf;

use clap::Args;
use console::style;
use tracing::info;

use docket_core::DocumentFile;
use docket_core::pdf::merge_files;

/// Arguments for the merge command.
#[derive(Args)]
pub struct MergeArgs {
    /// PDF files in page order; the result is written next to the first
    #[arg(required = true, num_args = 2..)]
    inputs: Vec<PathBuf>,
}

pub async fn run(args: MergeArgs) -> anyhow::Result<()> {
    let mut files = Vec::with_capacity(args.inputs.len());
    for input in &args.inputs {
        if !input.exists() {
            anyhow::bail!("Input file not found: {}", input.display());
        }
        files.push(DocumentFile::open(input)?);
    }

    info!("Merging {} files", files.len());
    let merged = merge_files(&files)?;

    println!(
        "{} Merged {} files into {}",
        style("✓").green(),
        files.len(),
        merged.path().display()
    );

    Ok(())
}
