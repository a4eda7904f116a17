//! Builds a register record from parsed fields.

use serde::{Deserialize, Serialize};

use super::parser::ParsedSds;
use super::rules::flags::YES;
use super::rules::patterns::*;
use super::rules::risk::risk_rating;
use crate::models::record::{Column, Record};

/// Values supplied by the caller instead of the document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordOverrides {
    pub consequence: Option<String>,
    pub likelihood: Option<String>,
}

impl RecordOverrides {
    pub fn new(consequence: Option<String>, likelihood: Option<String>) -> Self {
        Self {
            consequence: consequence.filter(|c| !c.trim().is_empty()),
            likelihood: likelihood.filter(|l| !l.trim().is_empty()),
        }
    }
}

/// Merge parsed fields, overrides and placeholders into a full record.
pub fn assemble(parsed: &ParsedSds, overrides: &RecordOverrides) -> Record {
    let mut record = Record::empty();
    let value = |field: &str| parsed.value(field).unwrap_or("").to_string();

    record.set(Column::ProductName, value(PRODUCT_NAME));
    record.set(Column::Vendor, value(VENDOR));
    record.set(Column::SdsAvailable, YES);
    record.set(
        Column::IssueDate,
        parsed.issue_date.clone().unwrap_or_default(),
    );
    record.set(
        Column::HazardousSubstance,
        parsed.hazardous_substance.clone().unwrap_or_default(),
    );
    record.set(
        Column::DangerousGood,
        parsed.dangerous_good.clone().unwrap_or_default(),
    );
    record.set(Column::DangerousGoodsClass, value(DANGEROUS_GOODS_CLASS));
    record.set(Column::Description, parsed.description.clone());
    record.set(Column::PackingGroup, value(PACKING_GROUP).to_uppercase());
    record.set(Column::SubsidiaryRisks, value(SUBSIDIARY_RISKS));

    let consequence = overrides
        .consequence
        .clone()
        .unwrap_or_else(|| value(CONSEQUENCE));
    let likelihood = overrides
        .likelihood
        .clone()
        .unwrap_or_else(|| value(LIKELIHOOD));
    record.set(Column::RiskRating, risk_rating(&consequence, &likelihood));
    record.set(Column::Consequence, consequence);
    record.set(Column::Likelihood, likelihood);

    record
}
