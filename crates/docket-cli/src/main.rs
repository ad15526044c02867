//! CLI application for keyword extraction from scanned documents.

mod commands;

use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use commands::{batch, config, engines, merge, process, recognize, show};

/// docket - Pull labelled values out of invoices and receipts
#[derive(Parser)]
#[command(name = "docket")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract keyword values from a single document
    Process(process::ProcessArgs),

    /// Extract keyword values from many documents
    Batch(batch::BatchArgs),

    /// Print the words OCR finds in an image
    Recognize(recognize::RecognizeArgs),

    /// Print a previously written table
    Show(show::ShowArgs),

    /// Concatenate PDF files
    Merge(merge::MergeArgs),

    /// Check that the external engines can be started
    Engines,

    /// Manage configuration
    Config(config::ConfigArgs),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Process(args) => process::run(args, config_path).await,
        Commands::Batch(args) => batch::run(args, config_path).await,
        Commands::Recognize(args) => recognize::run(args, config_path).await,
        Commands::Show(args) => show::run(args, config_path).await,
        Commands::Merge(args) => merge::run(args).await,
        Commands::Engines => engines::run(config_path).await,
        Commands::Config(args) => config::run(args, config_path).await,
    }
}
