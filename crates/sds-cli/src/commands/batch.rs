//! Batch processing command for multiple SDS files.

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

use sds_core::{CancelFlag, DocumentOutcome, RecordOverrides, SdsPipeline};

use super::{append_register, load_config, RegisterEntry};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Input files, directories or glob patterns
    #[arg(required = true)]
    inputs: Vec<String>,

    /// Register CSV path (overrides config and SDS_REGISTER_CSV)
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Also write every outcome as a JSON array
    #[arg(long)]
    json_out: Option<PathBuf>,

    /// Number of documents processed at once
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Field pattern file merged over the built-in rules
    #[arg(long)]
    patterns: Option<PathBuf>,

    /// Consequence level applied to every record
    #[arg(long)]
    consequence: Option<String>,

    /// Likelihood level applied to every record
    #[arg(long)]
    likelihood: Option<String>,

    /// Skip optical recognition of low-text pages
    #[arg(long)]
    no_ocr: bool,

    /// Do not append to the register CSV
    #[arg(long)]
    no_register: bool,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    if let Some(patterns) = &args.patterns {
        config.extraction.patterns_path = Some(patterns.clone());
    }
    if args.no_ocr {
        config.pdf.ocr_low_density_pages = false;
    }

    // A broken rule table fails the run before any document is read
    let pipeline = SdsPipeline::from_config(&config)?.with_overrides(RecordOverrides::new(
        args.consequence.clone(),
        args.likelihood.clone(),
    ));

    let status = pipeline.backend_status();
    if !status.is_available() {
        warn!(
            "recognition unavailable ({}); low-text pages keep their native text",
            status.error.as_deref().unwrap_or("unknown reason")
        );
    }

    let files = expand_inputs(&args.inputs)?;
    if files.is_empty() {
        anyhow::bail!("No matching files found for: {}", args.inputs.join(" "));
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    let cancel = CancelFlag::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupted; cancelling remaining documents");
                cancel.cancel();
            }
        });
    }

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let outcomes = process_all(files, pipeline, args.jobs.max(1), &cancel, &pb).await;
    pb.finish_and_clear();

    let failed: Vec<&DocumentOutcome> = outcomes
        .iter()
        .filter(|o| !o.is_ok() && !o.is_cancelled())
        .collect();
    let cancelled = outcomes.iter().filter(|o| o.is_cancelled()).count();

    if !args.no_register {
        let register = args
            .csv
            .clone()
            .unwrap_or_else(|| config.output.resolved_register_csv());
        // Cancelled documents are left for the next run.
        let entries = outcomes
            .iter()
            .filter(|o| !o.is_cancelled())
            .map(RegisterEntry::from);
        let summary = append_register(&register, entries)?;
        println!(
            "{} Appended {} rows to {} ({} already present)",
            style("✓").green(),
            summary.written,
            register.display(),
            summary.duplicates
        );
    }

    if let Some(json_path) = &args.json_out {
        if let Some(parent) = json_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(json_path, serde_json::to_string_pretty(&outcomes)?)?;
        println!(
            "{} JSON written to {}",
            style("✓").green(),
            json_path.display()
        );
    }

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        outcomes.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed, {} cancelled",
        style(outcomes.len() - failed.len() - cancelled).green(),
        style(failed.len()).red(),
        style(cancelled).yellow()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for outcome in &failed {
            println!(
                "  - {}: {}",
                outcome.source,
                outcome.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

/// Process documents concurrently, returning outcomes in input order.
async fn process_all(
    files: Vec<PathBuf>,
    pipeline: SdsPipeline,
    jobs: usize,
    cancel: &CancelFlag,
    pb: &ProgressBar,
) -> Vec<DocumentOutcome> {
    let semaphore = Arc::new(Semaphore::new(jobs));
    let pipeline = Arc::new(pipeline);

    let mut handles = Vec::with_capacity(files.len());
    for path in files {
        let semaphore = Arc::clone(&semaphore);
        let pipeline = Arc::clone(&pipeline);
        let cancel = cancel.clone();
        let pb = pb.clone();
        let source = path.display().to_string();

        let handle = tokio::spawn(async move {
            let _permit = semaphore.acquire_owned().await;
            let outcome = tokio::task::spawn_blocking(move || {
                let file_start = Instant::now();
                let outcome = pipeline.process_path(&path, &cancel);
                debug!(
                    "{} processed in {}ms",
                    path.display(),
                    file_start.elapsed().as_millis()
                );
                outcome
            })
            .await;
            pb.inc(1);
            outcome
        });
        handles.push((source, handle));
    }

    let mut outcomes = Vec::with_capacity(handles.len());
    for (source, handle) in handles {
        let outcome = match handle.await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(e)) | Err(e) => {
                error!("Worker for {} did not finish: {}", source, e);
                DocumentOutcome::failed(source, format!("worker failed: {}", e))
            }
        };
        outcomes.push(outcome);
    }
    outcomes
}

/// Expand literal paths, directories and glob patterns into a de-duplicated
/// file list in argument order.
///
/// Literal paths are kept even when missing so they surface as failed records.
fn expand_inputs(inputs: &[String]) -> anyhow::Result<Vec<PathBuf>> {
    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for input in inputs {
        let path = Path::new(input);
        let matches: Vec<PathBuf> = if is_glob(input) {
            glob(input)?.filter_map(|r| r.ok()).filter(|p| p.is_file()).collect()
        } else if path.is_dir() {
            let pattern = path.join("*.pdf");
            let mut found: Vec<PathBuf> = glob(&pattern.to_string_lossy())?
                .filter_map(|r| r.ok())
                .collect();
            found.sort();
            found
        } else {
            vec![path.to_path_buf()]
        };

        for file in matches {
            if seen.insert(file.clone()) {
                files.push(file);
            }
        }
    }

    Ok(files)
}

fn is_glob(input: &str) -> bool {
    input.contains(['*', '?', '['])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_inputs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.pdf"), b"").unwrap();
        fs::write(dir.path().join("b.pdf"), b"").unwrap();
        fs::write(dir.path().join("notes.txt"), b"").unwrap();

        let dir_arg = dir.path().display().to_string();
        let glob_arg = format!("{}/*.pdf", dir_arg);
        let missing = format!("{}/missing.pdf", dir_arg);

        let files = expand_inputs(&[dir_arg, glob_arg, missing.clone()]).unwrap();
        assert_eq!(files.len(), 3);
        assert!(files[0].ends_with("a.pdf"));
        assert!(files[1].ends_with("b.pdf"));
        assert_eq!(files[2], PathBuf::from(missing));
    }

    #[test]
    fn test_is_glob() {
        assert!(is_glob("docs/*.pdf"));
        assert!(!is_glob("docs/acetone.pdf"));
    }
}
