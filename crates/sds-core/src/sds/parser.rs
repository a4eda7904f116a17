//! Text-to-fields parsing for safety data sheets.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info};

use super::rules::{
    dates::{normalize_date, normalize_date_with_reference, DateLabel},
    flags::{infer_dangerous_good, infer_hazardous, normalize_yes_no},
    hazard::summarize_hazards,
    matcher::{match_field, ExtractionResult},
    normalize::normalize_text,
    patterns::*,
    FieldConfig,
};

/// Fields the register is built from, whether or not they are configured.
const REGISTER_FIELDS: [&str; 12] = [
    PRODUCT_NAME,
    VENDOR,
    ISSUE_DATE,
    UN_NUMBER,
    DANGEROUS_GOODS_CLASS,
    PACKING_GROUP,
    SUBSIDIARY_RISKS,
    CAS_NUMBER,
    HAZARDOUS_SUBSTANCE,
    DANGEROUS_GOOD,
    CONSEQUENCE,
    LIKELIHOOD,
];

/// Everything extracted from one document's text.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ParsedSds {
    /// Per-field match results, keyed by field name.
    pub fields: BTreeMap<String, ExtractionResult>,
    /// Hazard summary.
    pub description: String,
    /// Issue date in `DD/MM/YYYY` when it could be read, otherwise as written.
    pub issue_date: Option<String>,
    /// Labelled or inferred hazardous substance flag.
    pub hazardous_substance: Option<String>,
    /// Labelled or inferred dangerous good flag.
    pub dangerous_good: Option<String>,
    /// Whether the text included recognized content.
    pub from_recognition: bool,
    /// Fields the register expects that no rule matched.
    pub missing_fields: Vec<String>,
    /// Parse time in milliseconds.
    pub processing_time_ms: u64,
}

impl ParsedSds {
    /// Matched value of a field, if any.
    pub fn value(&self, field: &str) -> Option<&str> {
        self.fields.get(field).and_then(|r| r.value.as_deref())
    }
}

/// Rule-driven SDS parser. Cheap to clone; the rules are shared.
#[derive(Debug, Clone)]
pub struct SdsParser {
    config: Arc<FieldConfig>,
    /// Year two-digit dates are resolved against; the current year when unset.
    reference_year: Option<i32>,
}

impl SdsParser {
    pub fn new(config: Arc<FieldConfig>) -> Self {
        Self {
            config,
            reference_year: None,
        }
    }

    pub fn with_reference_year(mut self, year: i32) -> Self {
        self.reference_year = Some(year);
        self
    }

    pub fn config(&self) -> &FieldConfig {
        &self.config
    }

    /// Parse merged document text.
    pub fn parse(&self, text: &str, from_recognition: bool) -> ParsedSds {
        let start = Instant::now();
        let text = normalize_text(text);
        info!("Parsing SDS from {} characters of text", text.len());

        let names: Vec<String> = self
            .config
            .fields()
            .map(str::to_string)
            .chain(REGISTER_FIELDS.iter().map(|f| f.to_string()))
            .collect();

        let mut fields = BTreeMap::new();
        for field in names {
            if fields.contains_key(&field) {
                continue;
            }
            let result = match_field(&self.config, &field, &text, from_recognition);
            fields.insert(field, result);
        }

        let lookup = |field: &str| fields.get(field).and_then(|r: &ExtractionResult| r.value.as_deref());

        let issue_date = fields.get(ISSUE_DATE).and_then(|result| {
            let raw = result.value.as_deref()?;
            let label = DateLabel::from_label(result.label.as_deref());
            Some(match self.reference_year {
                Some(year) => normalize_date_with_reference(raw, label, year),
                None => normalize_date(raw, label),
            })
        });

        let hazardous_substance = lookup(HAZARDOUS_SUBSTANCE)
            .map(normalize_yes_no)
            .or_else(|| infer_hazardous(&text).map(str::to_string));

        let has_class = lookup(DANGEROUS_GOODS_CLASS).is_some();
        let dangerous_good = lookup(DANGEROUS_GOOD)
            .map(normalize_yes_no)
            .or_else(|| infer_dangerous_good(&text, has_class).map(str::to_string));

        let description = summarize_hazards(&text);

        let missing_fields: Vec<String> = REGISTER_FIELDS
            .iter()
            .filter(|&&f| lookup(f).is_none())
            .map(|f| f.to_string())
            .collect();

        debug!(
            "Matched {} of {} fields ({} missing)",
            fields.values().filter(|r| r.is_match()).count(),
            fields.len(),
            missing_fields.len()
        );

        ParsedSds {
            fields,
            description,
            issue_date,
            hazardous_substance,
            dangerous_good,
            from_recognition,
            missing_fields,
            processing_time_ms: start.elapsed().as_millis() as u64,
        }
    }
}
