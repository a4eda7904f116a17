//! Built-in field rules and shared regex patterns for SDS extraction.

use lazy_static::lazy_static;
use regex::Regex;

use super::config::RuleFlags;

pub const PRODUCT_NAME: &str = "product_name";
pub const VENDOR: &str = "vendor";
pub const ISSUE_DATE: &str = "issue_date";
pub const UN_NUMBER: &str = "un_number";
pub const DANGEROUS_GOODS_CLASS: &str = "dangerous_goods_class";
pub const PACKING_GROUP: &str = "packing_group";
pub const SUBSIDIARY_RISKS: &str = "subsidiary_risks";
pub const CAS_NUMBER: &str = "cas_number";
pub const HAZARDOUS_SUBSTANCE: &str = "hazardous_substance";
pub const DANGEROUS_GOOD: &str = "dangerous_good";
/// Not built in; available to pattern files.
pub const CONSEQUENCE: &str = "consequence";
/// Not built in; available to pattern files.
pub const LIKELIHOOD: &str = "likelihood";

const I: RuleFlags = RuleFlags::CASE_INSENSITIVE;
const IM: RuleFlags = RuleFlags::CASE_INSENSITIVE_MULTI_LINE;

/// Field rules in priority order, most specific first.
pub const BUILTIN_RULES: &[(&str, &[(&str, RuleFlags)])] = &[
    (
        PRODUCT_NAME,
        &[
            (r"Product Identifier\s*[:\-]?\s*(.+)", I),
            (r"^\s*Product Name\s*[:\-]?\s*(.+)$", IM),
            (r"^\s*Trade Name\s*[:\-]?\s*(.+)$", IM),
        ],
    ),
    (
        VENDOR,
        &[
            (r"Manufacturer(?:/Supplier)?\s*[:\-]?\s*(.+)", I),
            (r"Company Name\s*[:\-]?\s*(.+)", I),
            (r"Supplier\s*[:\-]?\s*(.+)", I),
        ],
    ),
    (
        ISSUE_DATE,
        &[
            (
                r"\b(Revision|Issue|Date of issue|Version date)(?:\s+date)?\s*[:\-]?\s*(\d{1,2}[/.\-]\d{1,2}[/.\-]\d{2,4})",
                I,
            ),
            (
                r"\b(Prepared|Last revised)(?:\s+on)?\s*[:\-]?\s*(\d{1,2}[/.\-]\d{1,2}[/.\-]\d{2,4})",
                I,
            ),
            (
                r"\b(Revision|Issue|Date of issue|Version date|Prepared|Last revised)(?:\s+date|\s+on)?\s*[:\-]?\s*(\d{4}-\d{1,2}-\d{1,2})",
                I,
            ),
        ],
    ),
    (UN_NUMBER, &[(r"\bUN\s*(\d{3,4})\b", I)]),
    (
        DANGEROUS_GOODS_CLASS,
        &[(
            r"\b(?:Dangerous\s+Goods\s*)?Class(?:/Division)?\b\s*[:\-]?\s*([1-9](?:\.[1-9])?)\b",
            I,
        )],
    ),
    (
        PACKING_GROUP,
        &[(r"Packing\s+Group\s*[:\-]?\s*(III|II|I)\b", I)],
    ),
    (SUBSIDIARY_RISKS, &[(r"Subsidiary Risks?\s*[:\-]?\s*(.+)", I)]),
    (
        CAS_NUMBER,
        &[(r"\bCAS(?: No\.?| Number)?\s*[:\-]?\s*([0-9]{2,7}-[0-9]{2}-[0-9])\b", I)],
    ),
    (
        HAZARDOUS_SUBSTANCE,
        &[(r"Hazardous Substance\s*[:\-]?\s*(Yes|No)\b", I)],
    ),
    (
        DANGEROUS_GOOD,
        &[(r"Dangerous Goods?\s*[:\-]?\s*(Yes|No)\b", I)],
    ),
];

lazy_static! {
    // Hazard section heading
    pub static ref HAZARD_HEADING: Regex = Regex::new(
        r"(?i)\bSection\s*2\b|\bHazards?\s+Identification\b"
    ).unwrap();

    pub static ref SIGNAL_WORD: Regex = Regex::new(
        r"(?i)\b(Danger|Warning)\b"
    ).unwrap();

    pub static ref HAZARD_STATEMENT: Regex = Regex::new(
        r"\bH\d{3}\b"
    ).unwrap();

    // Classification statements
    pub static ref NOT_HAZARDOUS: Regex = Regex::new(
        r"(?i)\bnot\s+classified\s+as\s+(?:a\s+)?hazardous\b"
    ).unwrap();

    pub static ref IS_HAZARDOUS: Regex = Regex::new(
        r"(?i)\bclassified\s+as\s+(?:a\s+)?hazardous\b|\bhazardous\s+according\s+to\b"
    ).unwrap();

    pub static ref NOT_DANGEROUS_GOODS: Regex = Regex::new(
        r"(?i)\bnot\s+classified\s+as\s+(?:a\s+)?dangerous\s+goods?\b"
    ).unwrap();

    pub static ref IS_DANGEROUS_GOODS: Regex = Regex::new(
        r"(?i)\bclassified\s+as\s+(?:a\s+)?dangerous\s+goods?\b|\bdangerous\s+goods?\s+according\s+to\b"
    ).unwrap();

    // Date shapes
    pub static ref DATE_DMY: Regex = Regex::new(
        r"^(\d{1,2})[./\-](\d{1,2})[./\-](\d{4}|\d{2})$"
    ).unwrap();

    pub static ref DATE_YMD: Regex = Regex::new(
        r"^(\d{4})[./\-](\d{1,2})[./\-](\d{1,2})$"
    ).unwrap();
}
