//! Subcommands and the helpers they share.

pub mod batch;
pub mod config;
pub mod ocr_status;
pub mod process;

use std::collections::HashSet;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::{debug, info, warn};

use sds_core::models::config::SdsConfig;
use sds_core::models::record::{headers, Column, Record};
use sds_core::DocumentOutcome;

/// Default location of the configuration file.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("sds")
        .join("config.json")
}

/// Config file to use: the explicit `--config` path, else the default path.
pub fn config_file(config_path: Option<&str>) -> PathBuf {
    config_path
        .map(PathBuf::from)
        .unwrap_or_else(default_config_path)
}

/// Load configuration. An explicit path must exist; the default path is optional.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<SdsConfig> {
    if let Some(path) = config_path {
        let path = Path::new(path);
        return SdsConfig::from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Using config at {}", default_path.display());
        SdsConfig::from_file(&default_path)
            .with_context(|| format!("Failed to load config from {}", default_path.display()))
    } else {
        Ok(SdsConfig::default())
    }
}

/// A row offered to the register, with the fingerprint of its source document.
pub struct RegisterEntry<'a> {
    pub record: &'a Record,
    pub document_hash: Option<&'a str>,
}

impl<'a> From<&'a DocumentOutcome> for RegisterEntry<'a> {
    fn from(outcome: &'a DocumentOutcome) -> Self {
        Self {
            record: &outcome.record,
            document_hash: outcome.document_hash(),
        }
    }
}

/// What an append did.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RegisterSummary {
    pub written: usize,
    pub duplicates: usize,
}

/// Append entries to the register CSV, writing the header row only for a new file.
///
/// An entry is skipped when its [`Record::register_key`] is already in the
/// register, or when a document with the same fingerprint was appended earlier
/// in the same call. Rows without a key are always written.
pub fn append_register<'a>(
    path: &Path,
    entries: impl IntoIterator<Item = RegisterEntry<'a>>,
) -> anyhow::Result<RegisterSummary> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let is_new = fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);
    let mut keys = if is_new {
        HashSet::new()
    } else {
        existing_keys(path)?
    };
    let mut hashes = HashSet::new();

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open register {}", path.display()))?;

    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    if is_new {
        wtr.write_record(headers())?;
    }

    let mut summary = RegisterSummary::default();
    for entry in entries {
        if let Some(hash) = entry.document_hash {
            if !hashes.insert(hash.to_string()) {
                info!("Skipping duplicate document {}", hash);
                summary.duplicates += 1;
                continue;
            }
        }
        if let Some(key) = entry.record.register_key() {
            if !keys.insert(key) {
                info!(
                    "Skipping duplicate register row for {}",
                    entry.record.get(Column::ProductName)
                );
                summary.duplicates += 1;
                continue;
            }
        }
        wtr.write_record(entry.record.to_row())?;
        summary.written += 1;
    }

    wtr.flush()?;
    debug!(
        "Appended {} rows to {} ({} duplicates skipped)",
        summary.written,
        path.display(),
        summary.duplicates
    );
    Ok(summary)
}

/// Register keys of the rows already in the register.
fn existing_keys(path: &Path) -> anyhow::Result<HashSet<String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .with_context(|| format!("Failed to read register {}", path.display()))?;

    let mut keys = HashSet::new();
    for row in rdr.records() {
        let row = row.with_context(|| format!("Failed to read register {}", path.display()))?;
        match Record::from_row(row.iter()) {
            Some(record) => keys.extend(record.register_key()),
            None => warn!("Ignoring register row with {} columns", row.len()),
        }
    }
    Ok(keys)
}

/// Header row plus one row per record, as CSV text.
pub fn records_to_csv<'a>(records: impl IntoIterator<Item = &'a Record>) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(headers())?;
    for record in records {
        wtr.write_record(record.to_row())?;
    }
    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}
