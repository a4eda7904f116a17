//! OCR status command - report whether recognition can run.

use clap::Args;

use sds_core::models::config::OcrBackendKind;
use sds_core::ocr::create_backend;

use super::load_config;

/// Arguments for the ocr-status command.
#[derive(Args)]
pub struct OcrStatusArgs {
    /// Backend to check instead of the configured one
    #[arg(short, long, value_enum)]
    backend: Option<BackendArg>,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum BackendArg {
    /// External tesseract executable
    Tesseract,
    /// ONNX models from the configured model directory
    Onnx,
    /// Recognition switched off
    Disabled,
}

impl From<BackendArg> for OcrBackendKind {
    fn from(arg: BackendArg) -> Self {
        match arg {
            BackendArg::Tesseract => OcrBackendKind::Tesseract,
            BackendArg::Onnx => OcrBackendKind::Onnx,
            BackendArg::Disabled => OcrBackendKind::Disabled,
        }
    }
}

pub async fn run(args: OcrStatusArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    if let Some(backend) = args.backend {
        config.ocr.backend = backend.into();
    }

    let status = tokio::task::spawn_blocking(move || create_backend(&config.ocr).status()).await?;
    println!("{}", serde_json::to_string_pretty(&status)?);

    Ok(())
}
