//! Process command - extract a register row from a single SDS file.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use sds_core::models::record::Column;
use sds_core::{CancelFlag, DocumentOutcome, RecordOverrides, SdsPipeline};

use super::{append_register, load_config, records_to_csv, RegisterEntry};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input SDS file (PDF)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Field pattern file merged over the built-in rules
    #[arg(long)]
    patterns: Option<PathBuf>,

    /// Consequence level used for the risk rating
    #[arg(long)]
    consequence: Option<String>,

    /// Likelihood level used for the risk rating
    #[arg(long)]
    likelihood: Option<String>,

    /// Skip optical recognition of low-text pages
    #[arg(long)]
    no_ocr: bool,

    /// Also append the row to the register CSV
    #[arg(long)]
    register: bool,

    /// Register CSV path (overrides config and SDS_REGISTER_CSV)
    #[arg(long)]
    csv: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// CSV output
    Csv,
    /// Plain text summary
    Text,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(patterns) = &args.patterns {
        config.extraction.patterns_path = Some(patterns.clone());
    }
    if args.no_ocr {
        config.pdf.ocr_low_density_pages = false;
    }

    // Invalid patterns abort before the document is touched
    let pipeline = SdsPipeline::from_config(&config)?.with_overrides(RecordOverrides::new(
        args.consequence.clone(),
        args.likelihood.clone(),
    ));

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(120));
    pb.set_message(format!("Extracting {}", args.input.display()));

    let input = args.input.clone();
    let outcome = tokio::task::spawn_blocking(move || {
        pipeline.process_path(&input, &CancelFlag::new())
    })
    .await?;

    pb.finish_and_clear();

    if !outcome.is_ok() {
        anyhow::bail!(
            "Failed to process {}: {}",
            outcome.source,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }

    let output = format_outcome(&outcome, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if args.register {
        let register = args
            .csv
            .clone()
            .unwrap_or_else(|| config.output.resolved_register_csv());
        let summary = append_register(&register, [RegisterEntry::from(&outcome)])?;
        if summary.written > 0 {
            eprintln!(
                "{} Appended to register {}",
                style("✓").green(),
                register.display()
            );
        } else {
            eprintln!(
                "{} Already in register {}",
                style("ℹ").blue(),
                register.display()
            );
        }
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

/// Render one outcome in the requested format.
pub fn format_outcome(outcome: &DocumentOutcome, format: OutputFormat) -> anyhow::Result<String> {
    Ok(match format {
        OutputFormat::Json => serde_json::to_string_pretty(outcome)?,
        OutputFormat::Csv => records_to_csv([&outcome.record])?,
        OutputFormat::Text => format_outcome_text(outcome),
    })
}

fn format_outcome_text(outcome: &DocumentOutcome) -> String {
    let mut output = String::new();

    output.push_str(&format!("Source: {}\n", outcome.source));
    if let Some(error) = &outcome.error {
        output.push_str(&format!("Error: {}\n", error));
    }
    output.push('\n');

    for column in Column::ALL {
        let value = outcome.record.get(column);
        if !value.is_empty() {
            output.push_str(&format!("{}: {}\n", column.header(), value));
        }
    }

    if let Some(provenance) = &outcome.provenance {
        output.push('\n');
        output.push_str(&format!("Pages: {}\n", provenance.page_count));
        if !provenance.ocr_pages.is_empty() {
            output.push_str(&format!(
                "Low-text pages: {:?} (recognized: {:?})\n",
                provenance.ocr_pages, provenance.recognized_pages
            ));
        }
    }

    output
}
