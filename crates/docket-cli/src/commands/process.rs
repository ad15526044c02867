//! Process command - extract keyword values from a single document.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use docket_core::models::config::OutputNaming;
use docket_core::{DocketConfig, DocumentFile, Pipeline, PipelineOutput, TailPolicy};

use super::config;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (pdf, png, jpg, jpeg or txt)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Show processing time
    #[arg(long)]
    show_timing: bool,

    #[command(flatten)]
    extraction: ExtractionOptions,
}

/// Overrides shared by the commands that run the pipeline.
#[derive(Args, Clone)]
pub struct ExtractionOptions {
    /// Keyword to look for (repeatable; replaces the configured list)
    #[arg(short, long = "keyword")]
    keywords: Vec<String>,

    /// What to do with a keyword that ends the token sequence
    #[arg(long, value_enum)]
    tail_policy: Option<TailArg>,

    /// Append a run id to generated file names
    #[arg(long)]
    per_run: bool,

    /// Use the PDF text layer instead of OCR when it is long enough
    #[arg(long)]
    text_layer: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum TailArg {
    /// Leave the keyword out
    Skip,
    /// Record the keyword with an empty value
    EmptyValue,
    /// Fail the document
    Error,
}

impl From<TailArg> for TailPolicy {
    fn from(arg: TailArg) -> Self {
        match arg {
            TailArg::Skip => TailPolicy::Skip,
            TailArg::EmptyValue => TailPolicy::EmptyValue,
            TailArg::Error => TailPolicy::Error,
        }
    }
}

impl ExtractionOptions {
    pub fn apply(&self, config: &mut DocketConfig) {
        if !self.keywords.is_empty() {
            config.extraction.keywords = self.keywords.clone();
        }
        if let Some(tail) = self.tail_policy {
            config.extraction.tail_policy = tail.into();
        }
        if self.per_run {
            config.output.naming = OutputNaming::PerRun;
        }
        if self.text_layer {
            config.pdf.prefer_text_layer = true;
        }
    }
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON report
    Json,
    /// key,value rows
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = config::load(config_path)?;
    args.extraction.apply(&mut config);

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let doc = DocumentFile::open(&args.input)?;
    doc.ensure_uploadable()?;
    info!("Processing file: {}", doc.path().display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!("Extracting from {}...", doc.name()));

    let pipeline = Pipeline::from_config(&config)?;
    let result = pipeline.run(&doc);
    pb.finish_and_clear();
    let output = result?;

    let rendered = format_output(&output, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &rendered)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        print!("{}", rendered);
    }

    eprintln!(
        "{} Table written to {}",
        style("✓").green(),
        output.table.path().display()
    );

    if args.show_timing {
        eprintln!(
            "{} Processing time: {}ms",
            style("ℹ").blue(),
            output.processing_time_ms
        );
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

pub fn format_output(output: &PipelineOutput, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(output)? + "\n"),
        OutputFormat::Csv => format_csv(output),
        OutputFormat::Text => Ok(format_text(output)),
    }
}

fn format_csv(output: &PipelineOutput) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    wtr.write_record(["key", "value"])?;
    for (key, value) in output.data.iter() {
        wtr.write_record([key, value])?;
    }

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(output: &PipelineOutput) -> String {
    let mut text = String::new();

    text.push_str(&format!("Document: {}\n", output.source));
    text.push_str(&format!(
        "Tokens: {} ({})\n",
        output.token_count,
        output.token_source.as_str()
    ));
    text.push('\n');

    if output.data.is_empty() {
        text.push_str("No keywords found.\n");
    }
    let width = output.data.keys().map(|k| k.chars().count()).max().unwrap_or(0);
    for (key, value) in output.data.iter() {
        text.push_str(&format!("  {:<width$}  {}\n", key, value, width = width));
    }

    text
}
