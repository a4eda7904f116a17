//! Rule-based field extraction for safety data sheets.

pub mod config;
pub mod dates;
pub mod flags;
pub mod hazard;
pub mod matcher;
pub mod normalize;
pub mod patterns;
pub mod risk;

pub use config::{FieldConfig, FieldRule, RuleFlag, RuleFlags, RuleSpec};
pub use dates::{normalize_date, normalize_date_with_reference, DateLabel};
pub use flags::{infer_dangerous_good, infer_hazardous, normalize_yes_no};
pub use hazard::summarize_hazards;
pub use matcher::{match_field, ExtractionResult};
pub use normalize::normalize_text;
pub use risk::risk_rating;
