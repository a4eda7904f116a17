//! Field rule configuration: an ordered list of compiled rules per field.
//!
//! A pattern file is a JSON object mapping a field name to its rules, most
//! specific first:
//!
//! ```json
//! {
//!   "vendor": [
//!     "Manufacturer(?:/Supplier)?\\s*[:\\-]?\\s*(.+)",
//!     { "expression": "^Supplier\\s*:\\s*(.+)$", "flags": ["case_insensitive", "multi_line"] }
//!   ]
//! }
//! ```
//!
//! A bare string is case-insensitive. An object without `flags` is too; an
//! explicit empty `flags` list means no flags.

use std::collections::BTreeMap;
use std::path::Path;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::patterns::BUILTIN_RULES;
use crate::error::ConfigError;
use crate::models::config::ExtractionConfig;

/// A single regex option.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleFlag {
    CaseInsensitive,
    MultiLine,
    DotMatchesNewLine,
}

/// The closed set of options a rule may combine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RuleFlags {
    pub case_insensitive: bool,
    pub multi_line: bool,
    pub dot_matches_new_line: bool,
}

impl RuleFlags {
    pub const NONE: RuleFlags = RuleFlags {
        case_insensitive: false,
        multi_line: false,
        dot_matches_new_line: false,
    };

    pub const CASE_INSENSITIVE: RuleFlags = RuleFlags {
        case_insensitive: true,
        multi_line: false,
        dot_matches_new_line: false,
    };

    pub const CASE_INSENSITIVE_MULTI_LINE: RuleFlags = RuleFlags {
        case_insensitive: true,
        multi_line: true,
        dot_matches_new_line: false,
    };

    pub fn with(mut self, flag: RuleFlag) -> Self {
        match flag {
            RuleFlag::CaseInsensitive => self.case_insensitive = true,
            RuleFlag::MultiLine => self.multi_line = true,
            RuleFlag::DotMatchesNewLine => self.dot_matches_new_line = true,
        }
        self
    }
}

impl FromIterator<RuleFlag> for RuleFlags {
    fn from_iter<I: IntoIterator<Item = RuleFlag>>(iter: I) -> Self {
        iter.into_iter().fold(RuleFlags::NONE, RuleFlags::with)
    }
}

/// A rule as authored in a pattern file.
#[derive(Debug, Clone)]
pub enum RuleSpec {
    /// Bare expression, case-insensitive.
    Expression(String),
    /// Expression with explicit options.
    Detailed {
        expression: String,
        flags: Vec<RuleFlag>,
        group: Option<usize>,
    },
}

/// Object form of a rule entry.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct DetailedRule {
    #[serde(alias = "regex", alias = "pattern")]
    expression: String,
    #[serde(default = "default_flags")]
    flags: Vec<RuleFlag>,
    #[serde(default)]
    group: Option<usize>,
}

fn default_flags() -> Vec<RuleFlag> {
    vec![RuleFlag::CaseInsensitive]
}

impl TryFrom<Value> for RuleSpec {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::String(expression) => Ok(RuleSpec::Expression(expression)),
            Value::Object(_) => {
                let rule: DetailedRule = serde_json::from_value(value).map_err(|e| e.to_string())?;
                Ok(RuleSpec::Detailed {
                    expression: rule.expression,
                    flags: rule.flags,
                    group: rule.group,
                })
            }
            other => Err(format!(
                "expected an expression string or a rule object, found {}",
                json_kind(&other)
            )),
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}

/// A compiled matcher for one field.
#[derive(Debug, Clone)]
pub struct FieldRule {
    index: usize,
    expression: String,
    flags: RuleFlags,
    group: Option<usize>,
    regex: Regex,
}

impl FieldRule {
    /// Compile a rule. `index` is its priority within the field.
    pub fn compile(
        field: &str,
        index: usize,
        expression: &str,
        flags: RuleFlags,
        group: Option<usize>,
    ) -> Result<Self, ConfigError> {
        let regex = RegexBuilder::new(expression)
            .case_insensitive(flags.case_insensitive)
            .multi_line(flags.multi_line)
            .dot_matches_new_line(flags.dot_matches_new_line)
            .build()
            .map_err(|source| ConfigError::InvalidRule {
                field: field.to_string(),
                index,
                source,
            })?;

        if let Some(group) = group {
            let available = regex.captures_len() - 1;
            if group > available {
                return Err(ConfigError::MissingGroup {
                    field: field.to_string(),
                    index,
                    group,
                    available,
                });
            }
        }

        Ok(Self {
            index,
            expression: expression.to_string(),
            flags,
            group,
            regex,
        })
    }

    fn from_spec(field: &str, index: usize, spec: &RuleSpec) -> Result<Self, ConfigError> {
        match spec {
            RuleSpec::Expression(expression) => {
                Self::compile(field, index, expression, RuleFlags::CASE_INSENSITIVE, None)
            }
            RuleSpec::Detailed {
                expression,
                flags,
                group,
            } => Self::compile(
                field,
                index,
                expression,
                flags.iter().copied().collect(),
                *group,
            ),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub fn flags(&self) -> RuleFlags {
        self.flags
    }

    /// Explicitly designated capture group, if any.
    pub fn group(&self) -> Option<usize> {
        self.group
    }

    pub fn regex(&self) -> &Regex {
        &self.regex
    }
}

/// Field name to ordered rules. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct FieldConfig {
    fields: BTreeMap<String, Vec<FieldRule>>,
}

impl FieldConfig {
    /// The built-in rule table.
    pub fn builtin() -> Result<Self, ConfigError> {
        let mut fields = BTreeMap::new();
        for (field, rules) in BUILTIN_RULES {
            let compiled = rules
                .iter()
                .enumerate()
                .map(|(index, (expression, flags))| {
                    FieldRule::compile(field, index, expression, *flags, None)
                })
                .collect::<Result<Vec<_>, _>>()?;
            fields.insert(field.to_string(), compiled);
        }
        Ok(Self { fields })
    }

    /// Compile authored rules, keeping their order.
    pub fn from_specs<I>(specs: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (String, Vec<RuleSpec>)>,
    {
        let mut fields = BTreeMap::new();
        for (field, rules) in specs {
            let compiled = rules
                .iter()
                .enumerate()
                .map(|(index, spec)| FieldRule::from_spec(&field, index, spec))
                .collect::<Result<Vec<_>, _>>()?;
            fields.insert(field, compiled);
        }
        Ok(Self { fields })
    }

    /// Parse a JSON pattern document.
    ///
    /// Entries are read one at a time so a bad entry is reported with its
    /// field and position.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let document: BTreeMap<String, Value> =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;

        let mut specs = Vec::with_capacity(document.len());
        for (field, rules) in document {
            let entries = match rules {
                Value::Array(entries) => entries,
                other => {
                    return Err(ConfigError::InvalidSpec {
                        field,
                        index: None,
                        reason: format!("expected a list of rules, found {}", json_kind(&other)),
                    });
                }
            };

            let mut field_specs = Vec::with_capacity(entries.len());
            for (index, entry) in entries.into_iter().enumerate() {
                let spec = RuleSpec::try_from(entry).map_err(|reason| ConfigError::InvalidSpec {
                    field: field.clone(),
                    index: Some(index),
                    reason,
                })?;
                field_specs.push(spec);
            }
            specs.push((field, field_specs));
        }

        Self::from_specs(specs)
    }

    /// Load a JSON pattern file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content)
    }

    /// Replace whole fields of `self` with the fields defined in `overrides`.
    ///
    /// Rule lists are never interleaved: an overridden field uses only the
    /// override's rules, in the override's order.
    pub fn merged_with(mut self, overrides: FieldConfig) -> Self {
        for (field, rules) in overrides.fields {
            debug!("Pattern file overrides field '{}' ({} rules)", field, rules.len());
            self.fields.insert(field, rules);
        }
        self
    }

    /// Build the run's configuration from the extraction settings.
    pub fn load(config: &ExtractionConfig) -> Result<Self, ConfigError> {
        let Some(path) = &config.patterns_path else {
            return Self::builtin();
        };

        let overrides = Self::from_file(path)?;
        if config.replace_builtin {
            Ok(overrides)
        } else {
            Ok(Self::builtin()?.merged_with(overrides))
        }
    }

    /// Rules for a field in priority order; empty when the field is unknown.
    pub fn rules(&self, field: &str) -> &[FieldRule] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Configured field names.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }
}
