//! First-match-wins evaluation of field rules.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::Serialize;
use tracing::trace;

use super::config::{FieldConfig, FieldRule};

lazy_static! {
    static ref TRAILING_PUNCT: Regex = Regex::new(r"[\s;:]+$").unwrap();
}

/// Result of matching one field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionResult {
    /// Field name.
    pub field: String,
    /// Matched value, `None` when no rule produced a non-empty capture.
    pub value: Option<String>,
    /// Index of the rule that produced the value.
    pub rule_index: Option<usize>,
    /// Leading label capture of the winning rule, when it has one.
    pub label: Option<String>,
    /// Whether the searched text included recognized content.
    pub from_recognition: bool,
}

impl ExtractionResult {
    fn empty(field: &str, from_recognition: bool) -> Self {
        Self {
            field: field.to_string(),
            from_recognition,
            ..Default::default()
        }
    }

    /// The matched value or an empty string.
    pub fn value_or_empty(&self) -> &str {
        self.value.as_deref().unwrap_or("")
    }

    pub fn is_match(&self) -> bool {
        self.value.is_some()
    }
}

/// Evaluate the rules for `field` in order; the first non-empty value wins.
pub fn match_field(
    config: &FieldConfig,
    field: &str,
    text: &str,
    from_recognition: bool,
) -> ExtractionResult {
    for rule in config.rules(field) {
        if let Some((value, label)) = evaluate_rule(rule, text) {
            trace!("Field '{}' matched by rule {}: {}", field, rule.index(), value);
            return ExtractionResult {
                field: field.to_string(),
                value: Some(value),
                rule_index: Some(rule.index()),
                label,
                from_recognition,
            };
        }
    }
    ExtractionResult::empty(field, from_recognition)
}

/// Value of the rule's first match in `text`, with its label.
///
/// Only the first match counts: an empty value there means the rule does
/// not apply, even if a later match would yield text.
fn evaluate_rule(rule: &FieldRule, text: &str) -> Option<(String, Option<String>)> {
    let caps = rule.regex().captures(text)?;
    let (group, raw) = designated_capture(rule, &caps)?;
    let value = clean_value(raw);
    if value.is_empty() {
        return None;
    }
    Some((value, leading_label(&caps, group)))
}

/// The configured group, else the last participating non-empty group, else
/// the whole match.
fn designated_capture<'t>(rule: &FieldRule, caps: &Captures<'t>) -> Option<(usize, &'t str)> {
    if let Some(group) = rule.group() {
        return caps.get(group).map(|m| (group, m.as_str()));
    }

    (1..caps.len())
        .rev()
        .find_map(|i| {
            caps.get(i)
                .filter(|m| !m.as_str().trim().is_empty())
                .map(|m| (i, m.as_str()))
        })
        .or_else(|| caps.get(0).map(|m| (0, m.as_str())))
}

/// First participating group before the value group.
fn leading_label(caps: &Captures<'_>, value_group: usize) -> Option<String> {
    (1..value_group)
        .find_map(|i| caps.get(i))
        .map(|m| m.as_str().trim().to_string())
        .filter(|label| !label.is_empty())
}

/// Strip trailing whitespace, `;` and `:`, then trim.
pub fn clean_value(raw: &str) -> String {
    TRAILING_PUNCT.replace(raw, "").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sds::rules::patterns::{DANGEROUS_GOODS_CLASS, ISSUE_DATE, PACKING_GROUP, VENDOR};
    use pretty_assertions::assert_eq;

    fn builtin() -> FieldConfig {
        FieldConfig::builtin().unwrap()
    }

    #[test]
    fn test_manufacturer_supplier() {
        let result = match_field(
            &builtin(),
            VENDOR,
            "Manufacturer/Supplier: Acme Chemicals Pty Ltd\nAddress: 1 Main St",
            false,
        );
        assert_eq!(result.value.as_deref(), Some("Acme Chemicals Pty Ltd"));
        assert_eq!(result.rule_index, Some(0));
    }

    #[test]
    fn test_earlier_rule_wins() {
        let config = FieldConfig::from_json(
            r#"{ "vendor": ["Distributor:\\s*(.+)", "Supplier:\\s*(.+)"] }"#,
        )
        .unwrap();
        let text = "Supplier: Second Co\nDistributor: First Co";
        let result = match_field(&config, VENDOR, text, false);
        assert_eq!(result.value.as_deref(), Some("First Co"));
        assert_eq!(result.rule_index, Some(0));
    }

    #[test]
    fn test_empty_capture_falls_through() {
        let config = FieldConfig::from_json(
            r#"{ "vendor": ["(?m)Supplier:([ ;]*)$", "Company:\\s*(.+)"] }"#,
        )
        .unwrap();
        let result = match_field(&config, VENDOR, "Supplier: ;\nCompany: Acme", false);
        assert_eq!(result.value.as_deref(), Some("Acme"));
        assert_eq!(result.rule_index, Some(1));
    }

    #[test]
    fn test_empty_first_match_yields_to_next_rule() {
        let config = FieldConfig::from_json(
            r#"{ "vendor": [{ "expression": "Supplier:[ ]*(\\w*)", "group": 1 }, "Company:\\s*(.+)"] }"#,
        )
        .unwrap();
        let result = match_field(
            &config,
            VENDOR,
            "Supplier: \nCompany: Acme\nSee Supplier: Beta",
            false,
        );
        assert_eq!(result.value.as_deref(), Some("Acme"));
        assert_eq!(result.rule_index, Some(1));
    }

    #[test]
    fn test_no_match_is_empty() {
        let result = match_field(&builtin(), VENDOR, "nothing to see", true);
        assert_eq!(result.value, None);
        assert_eq!(result.rule_index, None);
        assert!(result.from_recognition);
        assert_eq!(result.value_or_empty(), "");
    }

    #[test]
    fn test_unknown_field_is_empty() {
        let result = match_field(&builtin(), "flash_point", "Flash point: 12C", false);
        assert!(!result.is_match());
    }

    #[test]
    fn test_label_capture() {
        let result = match_field(&builtin(), ISSUE_DATE, "Revision date: 12/04/2023", false);
        assert_eq!(result.value.as_deref(), Some("12/04/2023"));
        assert_eq!(result.label.as_deref(), Some("Revision"));
    }

    #[test]
    fn test_explicit_group() {
        let config = FieldConfig::from_json(
            r#"{ "vendor": [{ "expression": "Made by (\\w+) in (\\w+)", "group": 1 }] }"#,
        )
        .unwrap();
        let result = match_field(&config, VENDOR, "Made by Acme in Sydney", false);
        assert_eq!(result.value.as_deref(), Some("Acme"));
        assert_eq!(result.label, None);
    }

    #[test]
    fn test_whole_match_without_groups() {
        let config = FieldConfig::from_json(r#"{ "vendor": ["Acme \\w+"] }"#).unwrap();
        let result = match_field(&config, VENDOR, "by Acme Chemicals;", false);
        assert_eq!(result.value.as_deref(), Some("Acme Chemicals"));
    }

    #[test]
    fn test_dangerous_goods_class() {
        let config = builtin();
        let class = |text: &str| match_field(&config, DANGEROUS_GOODS_CLASS, text, false).value;

        assert_eq!(class("Class: 3"), Some("3".to_string()));
        assert_eq!(class("Class/Division: 2.1"), Some("2.1".to_string()));
        assert_eq!(class("Dangerous Goods Class 3"), Some("3".to_string()));
        assert_eq!(class("Classification: 2 of the GHS"), None);
        assert_eq!(class("Classified as flammable liquid category 2"), None);
    }

    #[test]
    fn test_packing_group() {
        let result = match_field(&builtin(), PACKING_GROUP, "Packing Group: II\n", false);
        assert_eq!(result.value.as_deref(), Some("II"));
    }

    #[test]
    fn test_clean_value() {
        assert_eq!(clean_value("  Acme Ltd ;: \n"), "Acme Ltd");
        assert_eq!(clean_value(";"), "");
    }
}
