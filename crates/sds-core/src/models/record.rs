//! Chemical register record with a fixed, ordered column set.

use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

/// A column of the chemical register, in output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    ProductName,
    Vendor,
    Quantity,
    Location,
    SdsAvailable,
    IssueDate,
    HazardousSubstance,
    DangerousGood,
    DangerousGoodsClass,
    Description,
    PackingGroup,
    SubsidiaryRisks,
    Consequence,
    Likelihood,
    RiskRating,
    SwpRequirement,
    Comments,
}

/// Number of register columns.
pub const COLUMN_COUNT: usize = 17;

impl Column {
    /// Every column in output order. This order is part of the CSV contract.
    pub const ALL: [Column; COLUMN_COUNT] = [
        Column::ProductName,
        Column::Vendor,
        Column::Quantity,
        Column::Location,
        Column::SdsAvailable,
        Column::IssueDate,
        Column::HazardousSubstance,
        Column::DangerousGood,
        Column::DangerousGoodsClass,
        Column::Description,
        Column::PackingGroup,
        Column::SubsidiaryRisks,
        Column::Consequence,
        Column::Likelihood,
        Column::RiskRating,
        Column::SwpRequirement,
        Column::Comments,
    ];

    /// Header text used in CSV and JSON output.
    pub fn header(self) -> &'static str {
        match self {
            Column::ProductName => "Product Name",
            Column::Vendor => "Vendor / Manufacturer",
            Column::Quantity => "Quantity",
            Column::Location => "Location",
            Column::SdsAvailable => "SDS Available",
            Column::IssueDate => "Issue Date (DD/MM/YYYY)",
            Column::HazardousSubstance => "Hazardous Substance",
            Column::DangerousGood => "Dangerous Good",
            Column::DangerousGoodsClass => "Dangerous Goods Class",
            Column::Description => "Description",
            Column::PackingGroup => "Packing Group",
            Column::SubsidiaryRisks => "Subsidiary Risk(s)",
            Column::Consequence => "Consequence",
            Column::Likelihood => "Likelihood",
            Column::RiskRating => "Risk Rating",
            Column::SwpRequirement => "Safe Work Procedure (SWP) Requirement",
            Column::Comments => "Comments/SWP",
        }
    }

    fn position(self) -> usize {
        self as usize
    }
}

/// Headers of every column in output order.
pub fn headers() -> [&'static str; COLUMN_COUNT] {
    Column::ALL.map(Column::header)
}

/// A register row. Always holds a value for every column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    values: [String; COLUMN_COUNT],
}

impl Record {
    /// A record with every column empty.
    pub fn empty() -> Self {
        Self {
            values: std::array::from_fn(|_| String::new()),
        }
    }

    /// A record marking a document that could not be processed.
    pub fn failed(reason: &str) -> Self {
        let mut record = Self::empty();
        record.set(Column::Comments, format!("Extraction failed: {}", reason));
        record
    }

    pub fn get(&self, column: Column) -> &str {
        &self.values[column.position()]
    }

    pub fn set(&mut self, column: Column, value: impl Into<String>) {
        self.values[column.position()] = value.into();
    }

    /// Values in column order, ready for a CSV row.
    pub fn to_row(&self) -> Vec<&str> {
        self.values.iter().map(String::as_str).collect()
    }

    /// Rebuild a record from a register row. `None` unless the row has every column.
    pub fn from_row<'a>(row: impl IntoIterator<Item = &'a str>) -> Option<Self> {
        let values: Vec<String> = row.into_iter().map(str::to_string).collect();
        let values: [String; COLUMN_COUNT] = values.try_into().ok()?;
        Some(Self { values })
    }

    /// Key identifying the same sheet across register rows: product, vendor
    /// and issue date, case- and whitespace-insensitive.
    ///
    /// Rows without a product name have no key.
    pub fn register_key(&self) -> Option<String> {
        let product = key_part(self.get(Column::ProductName));
        if product.is_empty() {
            return None;
        }
        Some(format!(
            "{}|{}|{}",
            product,
            key_part(self.get(Column::Vendor)),
            key_part(self.get(Column::IssueDate))
        ))
    }

    /// Iterate `(header, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &str)> {
        Column::ALL
            .iter()
            .map(move |c| (c.header(), self.get(*c)))
    }
}

impl Default for Record {
    fn default() -> Self {
        Self::empty()
    }
}

fn key_part(value: &str) -> String {
    value
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(COLUMN_COUNT))?;
        for (header, value) in self.iter() {
            map.serialize_entry(header, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_record_has_every_column() {
        let record = Record::empty();
        assert_eq!(record.to_row().len(), COLUMN_COUNT);
        assert!(record.to_row().iter().all(|v| v.is_empty()));
    }

    #[test]
    fn test_column_positions_follow_all() {
        for (i, column) in Column::ALL.iter().enumerate() {
            assert_eq!(column.position(), i);
        }
        assert_eq!(headers()[0], "Product Name");
        assert_eq!(headers()[COLUMN_COUNT - 1], "Comments/SWP");
    }

    #[test]
    fn test_json_keeps_column_order() {
        let mut record = Record::empty();
        record.set(Column::Vendor, "Acme");
        let json = serde_json::to_string(&record).unwrap();
        let product = json.find("Product Name").unwrap();
        let vendor = json.find("Vendor / Manufacturer").unwrap();
        let comments = json.find("Comments/SWP").unwrap();
        assert!(product < vendor && vendor < comments);
        assert!(json.contains("\"Vendor / Manufacturer\":\"Acme\""));
    }

    #[test]
    fn test_failed_record_carries_reason() {
        let record = Record::failed("PDF has no pages");
        assert_eq!(record.get(Column::Comments), "Extraction failed: PDF has no pages");
        assert_eq!(record.get(Column::ProductName), "");
    }

    #[test]
    fn test_register_key_ignores_case_and_spacing() {
        let mut first = Record::empty();
        first.set(Column::ProductName, "Acetone");
        first.set(Column::Vendor, "Acme  Chemicals");
        first.set(Column::IssueDate, "12/04/2023");

        let mut second = first.clone();
        second.set(Column::ProductName, " ACETONE ");
        second.set(Column::Vendor, "acme chemicals");
        assert_eq!(first.register_key(), second.register_key());
        assert_eq!(
            first.register_key().as_deref(),
            Some("acetone|acme chemicals|12/04/2023")
        );

        second.set(Column::IssueDate, "01/01/2024");
        assert_ne!(first.register_key(), second.register_key());
        assert_eq!(Record::failed("broken").register_key(), None);
    }

    #[test]
    fn test_from_row() {
        let mut record = Record::empty();
        record.set(Column::ProductName, "Acetone");
        record.set(Column::Comments, "Keep cool");
        let row = record.to_row();
        assert_eq!(Record::from_row(row.iter().copied()), Some(record));
        assert_eq!(Record::from_row(["only", "three", "cells"]), None);
    }
}
