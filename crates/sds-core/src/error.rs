//! Error types for the sds-core library.

use thiserror::Error;

/// Main error type for the sds library.
#[derive(Error, Debug)]
pub enum SdsError {
    /// The document could not be read. Fatal for that document only.
    #[error("document error: {0}")]
    Document(#[from] DocumentReadError),

    /// Pattern configuration error. Fatal for the whole run.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Processing was cancelled before the document finished.
    #[error("processing cancelled")]
    Cancelled,
}

/// Errors raised while opening a document or reading its text layer.
#[derive(Error, Debug)]
pub enum DocumentReadError {
    /// The source is not a readable PDF container.
    #[error("failed to parse PDF: {0}")]
    Parse(String),

    /// The PDF is encrypted with a non-empty password.
    #[error("PDF is encrypted")]
    Encrypted,

    /// The PDF has no pages.
    #[error("PDF has no pages")]
    NoPages,

    /// Invalid page number requested.
    #[error("invalid page number: {0}")]
    InvalidPage(u32),

    /// Failed to decode a page image.
    #[error("failed to extract page image: {0}")]
    ImageExtraction(String),

    /// The source file could not be opened.
    #[error("failed to open {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors related to optical recognition.
#[derive(Error, Debug)]
pub enum OcrError {
    /// The recognition backend is not usable in this process.
    #[error("recognition unavailable: {0}")]
    Unavailable(String),

    /// Failed to load OCR models.
    #[error("failed to load model: {0}")]
    ModelLoad(String),

    /// Recognition ran and failed.
    #[error("text recognition failed: {0}")]
    Recognition(String),

    /// Recognition did not finish in time.
    #[error("recognition timed out after {0}s")]
    Timeout(u64),

    /// The run was cancelled while the page was being recognized.
    #[error("recognition cancelled")]
    Cancelled,
}

/// Errors in the pattern configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// A rule expression failed to compile.
    #[error("invalid rule {index} for field '{field}': {source}")]
    InvalidRule {
        field: String,
        index: usize,
        #[source]
        source: regex::Error,
    },

    /// A rule names a capture group the expression does not have.
    #[error("rule {index} for field '{field}' selects group {group} but the expression has {available}")]
    MissingGroup {
        field: String,
        index: usize,
        group: usize,
        available: usize,
    },

    /// A rule entry, or a field's rule list, has the wrong shape.
    #[error("{}", invalid_spec_message(.field, .index, .reason))]
    InvalidSpec {
        field: String,
        index: Option<usize>,
        reason: String,
    },

    /// The pattern file could not be parsed.
    #[error("failed to parse pattern file: {0}")]
    Parse(String),

    /// The pattern file could not be read.
    #[error("failed to read pattern file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

fn invalid_spec_message(field: &str, index: &Option<usize>, reason: &str) -> String {
    match index {
        Some(index) => format!("invalid rule {} for field '{}': {}", index, field, reason),
        None => format!("invalid rules for field '{}': {}", field, reason),
    }
}

/// Result type for the sds library.
pub type Result<T> = std::result::Result<T, SdsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_rule_names_field_and_index() {
        let source = regex::Regex::new("(").unwrap_err();
        let err = ConfigError::InvalidRule {
            field: "vendor".to_string(),
            index: 2,
            source,
        };
        let message = err.to_string();
        assert!(message.contains("vendor"));
        assert!(message.contains("rule 2"));
    }
}
