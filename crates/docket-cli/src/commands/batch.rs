//! Batch processing command for multiple documents.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tracing::{debug, error, warn};

use docket_core::models::config::OutputNaming;
use docket_core::{DocumentFile, DocumentType, Pipeline, PipelineOutput};

use super::config;
use super::process::{ExtractionOptions, OutputFormat, format_output};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input glob pattern (e.g. "scans/*.pdf")
    #[arg(required = true)]
    input: String,

    /// Directory for per-file reports
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Report format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also generate a summary CSV
    #[arg(long)]
    summary: bool,

    /// Number of parallel workers
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,

    #[command(flatten)]
    extraction: ExtractionOptions,
}

/// Result of processing a single file.
struct ProcessResult {
    path: PathBuf,
    output: Option<PipelineOutput>,
    error: Option<String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = config::load(config_path)?;
    args.extraction.apply(&mut config);

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| is_candidate(p))
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }
    let root = common_root(&files);

    // Two inputs sharing a stem would otherwise write the same table.
    if has_duplicate_stems(&files) && config.output.naming == OutputNaming::SourceStem {
        warn!("Inputs share file stems; switching to per-run output names");
        config.output.naming = OutputNaming::PerRun;
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")
            .unwrap()
            .progress_chars("=>-"),
    );

    let pipeline = Arc::new(Pipeline::from_config(&config)?);
    let semaphore = Arc::new(Semaphore::new(args.jobs.max(1)));

    let mut handles = Vec::with_capacity(files.len());
    for path in files {
        let pipeline = Arc::clone(&pipeline);
        let permit = Arc::clone(&semaphore).acquire_owned().await?;
        handles.push(tokio::task::spawn_blocking(move || {
            let file_start = Instant::now();
            let result = DocumentFile::open(&path)
                .and_then(|doc| pipeline.run(&doc))
                .map_err(|e| e.to_string());
            drop(permit);
            (path, result, file_start.elapsed().as_millis() as u64)
        }));
    }

    let mut results = Vec::with_capacity(handles.len());
    for handle in handles {
        let (path, result, processing_time_ms) = handle.await?;
        pb.inc(1);

        match result {
            Ok(output) => results.push(ProcessResult {
                path,
                output: Some(output),
                error: None,
                processing_time_ms,
            }),
            Err(error_msg) => {
                if args.continue_on_error {
                    warn!("Failed to process {}: {}", path.display(), error_msg);
                    results.push(ProcessResult {
                        path,
                        output: None,
                        error: Some(error_msg),
                        processing_time_ms,
                    });
                } else {
                    error!("Failed to process {}: {}", path.display(), error_msg);
                    pb.abandon();
                    anyhow::bail!("Processing failed for {}: {}", path.display(), error_msg);
                }
            }
        }
    }

    pb.finish_with_message("Complete");

    let successful: Vec<_> = results.iter().filter(|r| r.output.is_some()).collect();
    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    if let Some(output_dir) = &args.output_dir {
        let mut used = HashSet::new();
        for result in &successful {
            if let Some(output) = &result.output {
                let mut stem = report_stem(&root, &result.path, output);
                if !used.insert(stem.clone()) {
                    let mut n = 2;
                    while !used.insert(format!("{}-{}", stem, n)) {
                        n += 1;
                    }
                    warn!("Report name {} already taken, using {}-{}", stem, stem, n);
                    stem = format!("{}-{}", stem, n);
                }

                let output_path = output_dir.join(format!("{}.{}", stem, args.format.extension()));
                fs::write(&output_path, format_output(output, args.format)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(successful.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

/// Uploadable by extension; content is sniffed again when opened.
fn is_candidate(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|e| e.to_str())
            .and_then(DocumentType::from_extension)
            .is_some_and(DocumentType::is_uploadable)
}

fn has_duplicate_stems(files: &[PathBuf]) -> bool {
    let mut seen = HashSet::new();
    files.iter().any(|p| {
        let key = (p.parent().map(Path::to_path_buf), p.file_stem().map(|s| s.to_os_string()));
        !seen.insert(key)
    })
}

/// Deepest directory containing every input.
fn common_root(files: &[PathBuf]) -> PathBuf {
    let mut root = match files.first().and_then(|p| p.parent()) {
        Some(parent) => parent.to_path_buf(),
        None => return PathBuf::new(),
    };
    for file in &files[1..] {
        let parent = file.parent().unwrap_or_else(|| Path::new(""));
        while !parent.starts_with(&root) {
            if !root.pop() {
                return PathBuf::new();
            }
        }
    }
    root
}

/// Report name for one input: its folders below `root`, then the table stem
/// (which carries the run id under per-run naming).
fn report_stem(root: &Path, input: &Path, output: &PipelineOutput) -> String {
    let stem = output
        .table
        .path()
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| output.source.name().to_string());

    let folders: Vec<String> = input
        .parent()
        .and_then(|p| p.strip_prefix(root).ok())
        .map(|rel| {
            rel.components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect()
        })
        .unwrap_or_default();

    if folders.is_empty() {
        stem
    } else {
        format!("{}_{}", folders.join("_"), stem)
    }
}

fn write_summary(path: &Path, results: &[ProcessResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "token_source",
        "values",
        "table",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let filename = result.path.file_name().and_then(|s| s.to_str()).unwrap_or("");

        if let Some(output) = &result.output {
            wtr.write_record([
                filename,
                "success",
                output.token_source.as_str(),
                &output.data.len().to_string(),
                &output.table.path().display().to_string(),
                &result.processing_time_ms.to_string(),
                "",
            ])?;
        } else {
            wtr.write_record([
                filename,
                "error",
                "",
                "",
                "",
                &result.processing_time_ms.to_string(),
                result.error.as_deref().unwrap_or(""),
            ])?;
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_stems_detected() {
        let files = vec![PathBuf::from("/in/a.pdf"), PathBuf::from("/in/a.png")];
        assert!(has_duplicate_stems(&files));

        let files = vec![PathBuf::from("/in/a.pdf"), PathBuf::from("/other/a.png")];
        assert!(!has_duplicate_stems(&files));
    }

    #[test]
    fn test_common_root_of_sibling_folders() {
        let files = vec![
            PathBuf::from("/scans/jan/invoice.pdf"),
            PathBuf::from("/scans/feb/invoice.pdf"),
            PathBuf::from("/scans/jan/receipt.png"),
        ];
        assert_eq!(common_root(&files), PathBuf::from("/scans"));

        let flat = vec![PathBuf::from("/scans/a.pdf"), PathBuf::from("/scans/b.pdf")];
        assert_eq!(common_root(&flat), PathBuf::from("/scans"));
    }

    #[test]
    fn test_generated_tables_are_not_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let csv = dir.path().join("invoice.csv");
        let txt = dir.path().join("invoice.txt");
        fs::write(&csv, "Extracted File Data\n").unwrap();
        fs::write(&txt, "Discount 5%").unwrap();

        assert!(!is_candidate(&csv));
        assert!(is_candidate(&txt));
    }
}
