//! Recognition through an external `tesseract` executable.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use image::DynamicImage;
use tracing::{debug, info, warn};

use super::{OcrStatus, PageDeadline, RecognitionBackend};
use crate::error::OcrError;

const EXECUTABLE: &str = "tesseract";

/// How often a running tesseract child is checked against its deadline.
const WAIT_POLL: Duration = Duration::from_millis(50);

/// Default install location of the Windows installer.
const WINDOWS_DEFAULT: &str = r"C:\Program Files\Tesseract-OCR\tesseract.exe";

/// Tesseract CLI backend.
pub struct TesseractBackend {
    executable: Option<PathBuf>,
    language: String,
}

impl TesseractBackend {
    /// Resolve the executable from an explicit path, then PATH, then the
    /// platform default install location.
    pub fn new(explicit: Option<PathBuf>, language: String) -> Self {
        let executable = resolve_executable(explicit.as_deref());
        match &executable {
            Some(path) => debug!("Using tesseract at {}", path.display()),
            None => info!("tesseract executable not found; OCR fallback disabled"),
        }
        Self {
            executable,
            language,
        }
    }

    /// Version string reported by `tesseract --version`.
    pub fn version(&self) -> Result<String, OcrError> {
        let executable = self.executable()?;
        let output = Command::new(executable)
            .arg("--version")
            .output()
            .map_err(|e| OcrError::Unavailable(format!("failed to run tesseract: {}", e)))?;

        // Older releases print the banner on stderr.
        let banner = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };

        parse_version(&banner)
            .ok_or_else(|| OcrError::Recognition(format!("unrecognized version banner: {}", banner.trim())))
    }

    fn executable(&self) -> Result<&Path, OcrError> {
        self.executable
            .as_deref()
            .ok_or_else(|| OcrError::Unavailable("tesseract executable not found".to_string()))
    }
}

impl RecognitionBackend for TesseractBackend {
    fn name(&self) -> &str {
        EXECUTABLE
    }

    fn status(&self) -> OcrStatus {
        let mut status = OcrStatus {
            backend: EXECUTABLE.to_string(),
            importable: true,
            executable_found: self.executable.is_some(),
            version: None,
            error: None,
        };

        if status.executable_found {
            match self.version() {
                Ok(version) => status.version = Some(version),
                Err(e) => status.error = Some(e.to_string()),
            }
        } else {
            status.error = Some("tesseract executable not found".to_string());
        }

        status
    }

    fn recognize(&self, image: &DynamicImage, deadline: &PageDeadline) -> Result<String, OcrError> {
        let executable = self.executable()?;

        // Removed on drop, including when the child is killed.
        let workdir = tempfile::Builder::new()
            .prefix("sds-page-")
            .tempdir()
            .map_err(|e| OcrError::Recognition(format!("failed to create temp dir: {}", e)))?;
        let input = workdir.path().join("page.png");
        let output_base = workdir.path().join("page");
        let stderr_path = workdir.path().join("stderr.txt");

        image
            .save_with_format(&input, image::ImageFormat::Png)
            .map_err(|e| OcrError::Recognition(format!("failed to write temp image: {}", e)))?;

        let stderr = File::create(&stderr_path)
            .map_err(|e| OcrError::Recognition(format!("failed to create temp file: {}", e)))?;

        let mut child = Command::new(executable)
            .arg(&input)
            .arg(&output_base)
            .arg("-l")
            .arg(&self.language)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|e| OcrError::Recognition(format!("failed to run tesseract: {}", e)))?;

        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    stop_child(&mut child);
                    return Err(OcrError::Recognition(format!("failed to wait for tesseract: {}", e)));
                }
            }
            if let Err(e) = deadline.check() {
                debug!("Stopping tesseract (pid {}): {}", child.id(), e);
                stop_child(&mut child);
                return Err(e);
            }
            thread::sleep(deadline.remaining().min(WAIT_POLL));
        };

        if !status.success() {
            let stderr = std::fs::read_to_string(&stderr_path).unwrap_or_default();
            warn!("tesseract exited with {}: {}", status, stderr.trim());
            return Err(OcrError::Recognition(stderr.trim().to_string()));
        }

        std::fs::read_to_string(output_base.with_extension("txt"))
            .map_err(|e| OcrError::Recognition(format!("failed to read tesseract output: {}", e)))
    }
}

fn stop_child(child: &mut Child) {
    if let Err(e) = child.kill() {
        debug!("tesseract already exited: {}", e);
    }
    // Reap so no zombie is left behind.
    let _ = child.wait();
}

fn resolve_executable(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        warn!("Configured tesseract path {} does not exist", path.display());
    }

    find_on_path(EXECUTABLE).or_else(|| {
        let fallback = Path::new(WINDOWS_DEFAULT);
        (cfg!(windows) && fallback.is_file()).then(|| fallback.to_path_buf())
    })
}

fn find_on_path(name: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        let candidate = dir.join(format!("{}.exe", name));
        candidate.is_file().then_some(candidate)
    })
}

/// Extract `5.3.0` from a banner like `tesseract 5.3.0\n leptonica-1.82.0 ...`.
fn parse_version(banner: &str) -> Option<String> {
    let first = banner.lines().find(|l| !l.trim().is_empty())?;
    let mut parts = first.split_whitespace();
    let name = parts.next()?;
    if !name.eq_ignore_ascii_case(EXECUTABLE) {
        return None;
    }
    parts.next().map(|v| v.trim_start_matches('v').to_string())
}
